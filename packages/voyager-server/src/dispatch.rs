//! Request dispatch: the single point where a decoded [`Request`] is
//! authenticated, routed to a [`RegistryCore`] operation, and turned into a
//! [`WireResponse`].
//!
//! Factored out of the wire-protocol accept loop so it can be unit tested
//! without a live TCP connection.

use voyager_core::{HealthResponse, Request, Response, WireResponse};

use crate::auth;
use crate::error::RegistryError;
use crate::metrics;
use crate::registry::RegistryCore;

/// Authenticates and executes a single [`Request`] against `registry`.
pub async fn handle(registry: &RegistryCore, auth_token: &str, request: Request) -> WireResponse {
    match request {
        Request::Register {
            auth_token: token,
            registration,
        } => {
            if let Err(err) = auth::check(auth_token, token.as_deref()) {
                return wire_error(&err);
            }
            let service_name = registration.service_name.clone();
            match registry.register(registration).await {
                Ok(()) => {
                    metrics::record_registration(&service_name);
                    WireResponse::Register(Response::ok())
                }
                Err(err) => wire_error(&err),
            }
        }
        Request::Deregister {
            auth_token: token,
            instance,
        } => {
            if let Err(err) = auth::check(auth_token, token.as_deref()) {
                return wire_error(&err);
            }
            match registry
                .deregister(&instance.service_name, &instance.instance_id)
                .await
            {
                Ok(()) => {
                    metrics::record_deregistration(&instance.service_name);
                    WireResponse::Deregister(Response::ok())
                }
                Err(err) => wire_error(&err),
            }
        }
        Request::Discover {
            auth_token: token,
            query,
        } => {
            if let Err(err) = auth::check(auth_token, token.as_deref()) {
                return wire_error(&err);
            }
            let list = registry.discover(&query.service_name, query.healthy_only);
            let outcome = if list.instances.is_empty() {
                "not_found"
            } else {
                "success"
            };
            metrics::record_discovery(&query.service_name, outcome);
            WireResponse::Discover(list)
        }
        Request::HealthCheck {
            auth_token: token,
            request,
        } => {
            if let Err(err) = auth::check(auth_token, token.as_deref()) {
                return wire_error(&err);
            }
            let status = registry
                .health_check(&request.service_name, &request.instance_id)
                .await;
            WireResponse::HealthCheck(HealthResponse { status })
        }
    }
}

fn wire_error(err: &RegistryError) -> WireResponse {
    WireResponse::Error(err.into())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use voyager_core::{HealthStatus, InstanceId, Registration, ServiceQuery, WireError};

    use super::*;
    use crate::kv::NullKvStore;

    fn registry() -> RegistryCore {
        RegistryCore::new(Arc::new(NullKvStore), Duration::from_secs(30))
    }

    fn reg() -> Registration {
        Registration {
            service_name: "order".to_string(),
            instance_id: "inst-1".to_string(),
            address: "10.0.0.1".to_string(),
            port: 8080,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn register_with_no_auth_configured_succeeds_without_token() {
        let r = registry();
        let resp = handle(
            &r,
            "",
            Request::Register {
                auth_token: None,
                registration: reg(),
            },
        )
        .await;
        assert!(matches!(resp, WireResponse::Register(Response { success: true, .. })));
    }

    #[tokio::test]
    async fn register_with_auth_configured_rejects_missing_token() {
        let r = registry();
        let resp = handle(
            &r,
            "secret",
            Request::Register {
                auth_token: None,
                registration: reg(),
            },
        )
        .await;
        assert!(matches!(
            resp,
            WireResponse::Error(WireError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn register_with_auth_configured_accepts_matching_token() {
        let r = registry();
        let resp = handle(
            &r,
            "secret",
            Request::Register {
                auth_token: Some("secret".to_string()),
                registration: reg(),
            },
        )
        .await;
        assert!(matches!(resp, WireResponse::Register(Response { success: true, .. })));
    }

    #[tokio::test]
    async fn discover_after_register_returns_instance() {
        let r = registry();
        handle(
            &r,
            "",
            Request::Register {
                auth_token: None,
                registration: reg(),
            },
        )
        .await;

        let resp = handle(
            &r,
            "",
            Request::Discover {
                auth_token: None,
                query: ServiceQuery {
                    service_name: "order".to_string(),
                    healthy_only: false,
                },
            },
        )
        .await;

        match resp {
            WireResponse::Discover(list) => assert_eq!(list.instances.len(), 1),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn health_check_unknown_instance_is_unhealthy() {
        let r = registry();
        let resp = handle(
            &r,
            "",
            Request::HealthCheck {
                auth_token: None,
                request: voyager_core::HealthRequest {
                    service_name: "order".to_string(),
                    instance_id: "ghost".to_string(),
                },
            },
        )
        .await;
        assert!(matches!(
            resp,
            WireResponse::HealthCheck(HealthResponse {
                status: HealthStatus::Unhealthy
            })
        ));
    }

    #[tokio::test]
    async fn deregister_is_idempotent() {
        let r = registry();
        let resp = handle(
            &r,
            "",
            Request::Deregister {
                auth_token: None,
                instance: InstanceId {
                    service_name: "order".to_string(),
                    instance_id: "ghost".to_string(),
                },
            },
        )
        .await;
        assert!(matches!(resp, WireResponse::Deregister(Response { success: true, .. })));
    }

    #[tokio::test]
    async fn register_with_invalid_argument_maps_to_wire_error() {
        let r = registry();
        let mut bad = reg();
        bad.port = 0;
        let resp = handle(
            &r,
            "",
            Request::Register {
                auth_token: None,
                registration: bad,
            },
        )
        .await;
        assert!(matches!(
            resp,
            WireResponse::Error(WireError::InvalidArgument(_))
        ));
    }
}
