//! Auth Gate: shared-bearer-token check applied to every wire request.
//!
//! An empty configured token disables auth entirely (every request passes),
//! per spec.md §4.4. Otherwise a missing token is `Unauthenticated` and a
//! present-but-wrong token is `PermissionDenied`, matching the wire error
//! taxonomy in [`crate::error::RegistryError`]. The comparison runs in
//! constant time via `subtle` to avoid leaking the token through response
//! latency. Grounded in the teacher's `service/middleware/metrics.rs`
//! instrument-every-call shape, here reduced to a single gate function
//! since the wire dispatch loop calls it directly rather than through a
//! Tower `Layer` stack.

use subtle::ConstantTimeEq;

use crate::error::RegistryError;

/// Checks `token` against the configured `expected` token.
///
/// # Errors
///
/// `RegistryError::Unauthenticated` when auth is required but no token was
/// presented; `RegistryError::PermissionDenied` when a token was presented
/// but does not match.
pub fn check(expected: &str, token: Option<&str>) -> Result<(), RegistryError> {
    if expected.is_empty() {
        return Ok(());
    }

    let Some(token) = token else {
        return Err(RegistryError::Unauthenticated);
    };

    if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(RegistryError::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_expected_token_disables_auth() {
        assert!(check("", None).is_ok());
        assert!(check("", Some("anything")).is_ok());
    }

    #[test]
    fn missing_token_is_unauthenticated() {
        assert!(matches!(
            check("secret", None),
            Err(RegistryError::Unauthenticated)
        ));
    }

    #[test]
    fn mismatched_token_is_permission_denied() {
        assert!(matches!(
            check("secret", Some("wrong")),
            Err(RegistryError::PermissionDenied)
        ));
    }

    #[test]
    fn matching_token_is_ok() {
        assert!(check("secret", Some("secret")).is_ok());
    }

    #[test]
    fn empty_presented_token_is_unauthenticated_not_denied() {
        assert!(matches!(
            check("secret", Some("")),
            Err(RegistryError::PermissionDenied)
        ));
    }
}
