//! Error taxonomy surfaced by the discovery client.
//!
//! Mirrors the server's [`voyager_core::WireError`] kinds plus the
//! client-local failure modes (dial/transport/codec) that never reach the
//! wire at all.

use thiserror::Error;

use voyager_core::WireError;

/// Errors returned by [`crate::client::DiscoveryClient`] and its
/// collaborators.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("permission denied")]
    PermissionDenied,
    #[error("internal error: {0}")]
    Internal(String),
    #[error("no instances available")]
    Unavailable,
    #[error("request timed out")]
    Timeout,
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] voyager_core::CodecError),
    #[error("server response did not match the request's operation")]
    UnexpectedResponse,
}

impl From<WireError> for ClientError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            WireError::Unauthenticated => Self::Unauthenticated,
            WireError::PermissionDenied => Self::PermissionDenied,
            WireError::Internal(msg) => Self::Internal(msg),
            WireError::Unavailable => Self::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_error_maps_to_matching_client_error() {
        assert!(matches!(
            ClientError::from(WireError::Unauthenticated),
            ClientError::Unauthenticated
        ));
        assert!(matches!(
            ClientError::from(WireError::PermissionDenied),
            ClientError::PermissionDenied
        ));
        assert!(matches!(
            ClientError::from(WireError::Unavailable),
            ClientError::Unavailable
        ));
        assert!(matches!(
            ClientError::from(WireError::InvalidArgument("x".into())),
            ClientError::InvalidArgument(m) if m == "x"
        ));
    }
}
