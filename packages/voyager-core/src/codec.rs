//! Length-delimited framing over a raw TCP connection.
//!
//! Wraps [`tokio_util::codec::LengthDelimitedCodec`] with `MsgPack`
//! encode/decode for [`Request`](crate::wire::Request) and
//! [`WireResponse`](crate::wire::WireResponse), giving both the server and
//! the client a single `Framed<TcpStream, _>` type to read and write whole
//! messages against.

use bytes::{Bytes, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::codec::LengthDelimitedCodec;

/// Errors that can occur while framing or encoding/decoding a wire message.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("msgpack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("msgpack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Builds the length-delimited codec shared by server and client.
///
/// A generous 16 MiB frame cap guards against a misbehaving peer claiming
/// an unbounded frame length.
#[must_use]
pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(16 * 1024 * 1024)
        .new_codec()
}

/// Serializes a message to a length-delimited-ready `MsgPack` payload.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode<T: Serialize>(msg: &T) -> Result<Bytes, CodecError> {
    let bytes = rmp_serde::to_vec_named(msg)?;
    Ok(Bytes::from(bytes))
}

/// Deserializes a single decoded frame's bytes into a message.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the payload is not valid `MsgPack` for
/// `T`.
pub fn decode<T: DeserializeOwned>(frame: &BytesMut) -> Result<T, CodecError> {
    Ok(rmp_serde::from_slice(frame)?)
}
