//! Server-side error taxonomy, mapped to the wire [`WireError`](voyager_core::WireError)
//! shape at the dispatch boundary.

use voyager_core::WireError;

/// Errors produced by the Registry Core and Auth Gate.
///
/// Mirrors spec.md §7's error table: each variant maps one-to-one onto a
/// [`WireError`] surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
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
}

impl From<&RegistryError> for WireError {
    fn from(err: &RegistryError) -> Self {
        match err {
            RegistryError::InvalidArgument(msg) => WireError::InvalidArgument(msg.clone()),
            RegistryError::Unauthenticated => WireError::Unauthenticated,
            RegistryError::PermissionDenied => WireError::PermissionDenied,
            RegistryError::Internal(msg) => WireError::Internal(msg.clone()),
            RegistryError::Unavailable => WireError::Unavailable,
        }
    }
}
