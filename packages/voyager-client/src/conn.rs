//! The discovery client's single long-lived connection to the registry
//! server.
//!
//! Mirrors [`voyager_server::network::wire_server`]'s framing on the other
//! end of the wire: one `Framed<TcpStream, LengthDelimitedCodec>`, requests
//! and responses encoded with the same `MsgPack` codec. Requests are
//! serialized by an internal mutex -- the wire protocol has no pipelining,
//! so Register/Discover/HealthCheck/Deregister calls from different callers
//! (the health-check loop and application threads) take turns on the one
//! socket, exactly as the server processes them sequentially per
//! connection.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use voyager_core::{decode, encode, frame_codec, Request, WireResponse};

use crate::error::ClientError;

/// A single request/response round trip over the framed connection, bounded
/// by `deadline`.
#[derive(Debug)]
pub struct ServerConnection {
    framed: Mutex<Framed<TcpStream, tokio_util::codec::LengthDelimitedCodec>>,
    addr: String,
}

impl ServerConnection {
    /// Dials `addr`, retrying up to `max_retries` times separated by
    /// `retry_delay`. The final attempt's error is returned on exhaustion.
    pub async fn connect(
        addr: &str,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<Self, ClientError> {
        let mut attempt = 0;
        loop {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    debug!(%addr, "connected to registry server");
                    return Ok(Self {
                        framed: Mutex::new(Framed::new(stream, frame_codec())),
                        addr: addr.to_string(),
                    });
                }
                Err(err) if attempt < max_retries => {
                    attempt += 1;
                    warn!(%addr, attempt, %err, "retrying registry server connection");
                    tokio::time::sleep(retry_delay).await;
                }
                Err(err) => {
                    return Err(ClientError::Connect {
                        addr: addr.to_string(),
                        source: err,
                    })
                }
            }
        }
    }

    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Sends `request` and awaits the matching response, bounded by `deadline`.
    pub async fn call(
        &self,
        request: Request,
        deadline: Duration,
    ) -> Result<WireResponse, ClientError> {
        timeout(deadline, self.call_inner(request))
            .await
            .map_err(|_| ClientError::Timeout)?
    }

    async fn call_inner(&self, request: Request) -> Result<WireResponse, ClientError> {
        let mut framed = self.framed.lock().await;
        let bytes = encode(&request)?;
        framed.send(bytes).await?;
        let frame = framed
            .next()
            .await
            .ok_or_else(|| ClientError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "registry server closed the connection",
            )))??;
        let response: WireResponse = decode(&frame)?;
        if let WireResponse::Error(err) = response {
            return Err(err.into());
        }
        Ok(response)
    }

    /// Closes the underlying socket. Idempotent: a second call is a no-op
    /// error-wise since `shutdown` on an already-shut socket simply succeeds.
    pub async fn close(&self) {
        let mut framed = self.framed.lock().await;
        let _ = framed.close().await;
    }
}
