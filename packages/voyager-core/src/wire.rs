//! Wire-compatible message schemas for the `VoyagerSD` discovery protocol.
//!
//! All structs use `#[serde(rename_all = "camelCase")]` to produce
//! wire-compatible `MsgPack` output via `rmp_serde::to_vec_named()`, matching
//! the language-neutral field names from the protocol description.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The atomic record identifying one running service instance.
///
/// Immutable once stored; re-registering the same `(service_name,
/// instance_id)` replaces the prior record and refreshes its lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub service_name: String,
    pub instance_id: String,
    pub address: String,
    pub port: u16,
    pub metadata: HashMap<String, String>,
}

impl Registration {
    /// Validates the required, non-empty/non-zero fields per the Register
    /// contract. Does not validate metadata -- it is opaque to the system.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.service_name.is_empty() {
            return Err(ValidationError::Empty("serviceName"));
        }
        if self.instance_id.is_empty() {
            return Err(ValidationError::Empty("instanceId"));
        }
        if self.address.is_empty() {
            return Err(ValidationError::Empty("address"));
        }
        if self.port == 0 {
            return Err(ValidationError::ZeroPort);
        }
        Ok(())
    }

    /// The `/services/<serviceName>/<instanceId>` key this registration
    /// occupies in the external KV store.
    #[must_use]
    pub fn store_key(&self) -> String {
        format!("/services/{}/{}", self.service_name, self.instance_id)
    }

    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Raised by [`Registration::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("required field `{0}` must not be empty")]
    Empty(&'static str),
    #[error("port must be non-zero")]
    ZeroPort,
}

/// Identifies a single instance for Deregister/HealthCheck requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceId {
    pub service_name: String,
    pub instance_id: String,
}

/// A Discover request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceQuery {
    pub service_name: String,
    /// Hint: the server filters to lease/heartbeat-fresh entries when set.
    pub healthy_only: bool,
}

/// The result of a Discover call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceList {
    pub instances: Vec<Registration>,
}

/// A HealthCheck request, renewing the lease for `instance_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRequest {
    pub service_name: String,
    pub instance_id: String,
}

/// Health status returned by HealthCheck.
///
/// `Unknown` is part of the wire contract for forward compatibility but is
/// never emitted by this implementation -- every known instance resolves to
/// `Healthy` or `Unhealthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
}

/// Generic success/error acknowledgement for Register/Deregister.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    pub error: String,
}

impl Response {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            error: String::new(),
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Error kinds carried in the wire-level `Error` envelope variant.
///
/// Mirrors the taxonomy surfaced to RPC callers: credential and argument
/// failures are distinguished from opaque internal failures so the client
/// can decide whether to retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
pub enum WireError {
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

/// Request envelope. Every request-shaped message carries an optional
/// bearer token in lieu of an HTTP `authorization` header, since this
/// protocol runs over a raw framed TCP connection rather than HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "op")]
pub enum Request {
    Register {
        auth_token: Option<String>,
        registration: Registration,
    },
    Deregister {
        auth_token: Option<String>,
        instance: InstanceId,
    },
    Discover {
        auth_token: Option<String>,
        query: ServiceQuery,
    },
    HealthCheck {
        auth_token: Option<String>,
        request: HealthRequest,
    },
}

/// Response envelope, matching one variant per [`Request`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "op")]
pub enum WireResponse {
    Register(Response),
    Deregister(Response),
    Discover(ServiceList),
    HealthCheck(HealthResponse),
    Error(WireError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg() -> Registration {
        Registration {
            service_name: "order".to_string(),
            instance_id: "inst-1".to_string(),
            address: "10.0.0.1".to_string(),
            port: 8080,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn validate_accepts_well_formed_registration() {
        assert!(reg().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_service_name() {
        let mut r = reg();
        r.service_name.clear();
        assert_eq!(r.validate(), Err(ValidationError::Empty("serviceName")));
    }

    #[test]
    fn validate_rejects_empty_instance_id() {
        let mut r = reg();
        r.instance_id.clear();
        assert_eq!(r.validate(), Err(ValidationError::Empty("instanceId")));
    }

    #[test]
    fn validate_rejects_empty_address() {
        let mut r = reg();
        r.address.clear();
        assert_eq!(r.validate(), Err(ValidationError::Empty("address")));
    }

    #[test]
    fn validate_rejects_zero_port() {
        let mut r = reg();
        r.port = 0;
        assert_eq!(r.validate(), Err(ValidationError::ZeroPort));
    }

    #[test]
    fn store_key_matches_layout() {
        assert_eq!(reg().store_key(), "/services/order/inst-1");
    }

    #[test]
    fn socket_addr_formats_host_port() {
        assert_eq!(reg().socket_addr(), "10.0.0.1:8080");
    }

    #[test]
    fn registration_msgpack_round_trip() {
        let r = reg();
        let bytes = rmp_serde::to_vec_named(&r).unwrap();
        let decoded: Registration = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(r, decoded);
    }

    #[test]
    fn request_envelope_round_trip() {
        let req = Request::Discover {
            auth_token: Some("T".to_string()),
            query: ServiceQuery {
                service_name: "order".to_string(),
                healthy_only: true,
            },
        };
        let bytes = rmp_serde::to_vec_named(&req).unwrap();
        let decoded: Request = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(req, decoded);
    }

    #[test]
    fn response_ok_and_failed() {
        let ok = Response::ok();
        assert!(ok.success);
        assert!(ok.error.is_empty());

        let failed = Response::failed("boom");
        assert!(!failed.success);
        assert_eq!(failed.error, "boom");
    }
}
