//! Framed TCP listener serving the discovery wire protocol.
//!
//! Deferred startup, mirroring [`super::module::NetworkModule`]: `new()`
//! allocates shared state, `start()` binds the listener, `serve()` accepts
//! connections until shutdown. Each connection gets its own
//! `Framed<TcpStream, LengthDelimitedCodec>` and its requests are dispatched
//! sequentially -- every Registry Core operation is lock-bound and
//! microsecond-scale, so per-connection pipelining buys nothing here.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use voyager_core::{decode, encode, frame_codec, Request};

use crate::dispatch;
use crate::registry::RegistryCore;

/// The discovery protocol's framed TCP listener.
pub struct WireServer {
    bind_addr: String,
    listener: Option<TcpListener>,
    registry: Arc<RegistryCore>,
    auth_token: String,
}

impl WireServer {
    #[must_use]
    pub fn new(bind_addr: String, registry: Arc<RegistryCore>, auth_token: String) -> Self {
        Self {
            bind_addr,
            listener: None,
            registry,
            auth_token,
        }
    }

    /// Binds the TCP listener to the configured address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        let port = listener.local_addr()?.port();
        info!(addr = %self.bind_addr, "wire protocol listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Accepts connections until `shutdown` fires.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) {
        let listener = self
            .listener
            .expect("start() must be called before serve()");
        let registry = self.registry;
        let auth_token = Arc::new(self.auth_token);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "accepted wire connection");
                            let registry = Arc::clone(&registry);
                            let auth_token = Arc::clone(&auth_token);
                            let conn_shutdown = shutdown.clone();
                            tokio::spawn(serve_connection(stream, registry, auth_token, conn_shutdown));
                        }
                        Err(err) => warn!(%err, "failed to accept wire connection"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("wire protocol listener stopping on shutdown signal");
                    return;
                }
            }
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    registry: Arc<RegistryCore>,
    auth_token: Arc<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut framed = Framed::new(stream, frame_codec());

    loop {
        tokio::select! {
            frame = framed.next() => {
                let Some(frame) = frame else { return };
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(%err, "wire frame i/o error");
                        return;
                    }
                };

                let request: Request = match decode(&frame) {
                    Ok(req) => req,
                    Err(err) => {
                        warn!(%err, "dropping unparseable wire frame");
                        continue;
                    }
                };

                let response = dispatch::handle(&registry, &auth_token, request).await;
                let Ok(bytes) = encode(&response) else {
                    warn!("failed to encode wire response");
                    return;
                };
                if framed.send(bytes).await.is_err() {
                    return;
                }
            }
            _ = shutdown.changed() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use voyager_core::{Registration, Request, ServiceQuery, WireResponse};

    use super::*;
    use crate::kv::NullKvStore;

    #[tokio::test]
    async fn round_trips_a_register_then_discover_over_the_wire() {
        let registry = Arc::new(RegistryCore::new(
            Arc::new(NullKvStore),
            Duration::from_secs(30),
        ));
        let mut server = WireServer::new("127.0.0.1:0".to_string(), registry, String::new());
        let port = server.start().await.unwrap();

        let (_tx, rx) = watch::channel(false);
        tokio::spawn(server.serve(rx));

        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut framed = Framed::new(stream, frame_codec());

        let registration = Registration {
            service_name: "order".to_string(),
            instance_id: "inst-1".to_string(),
            address: "10.0.0.1".to_string(),
            port: 8080,
            metadata: std::collections::HashMap::new(),
        };
        framed
            .send(
                encode(&Request::Register {
                    auth_token: None,
                    registration,
                })
                .unwrap(),
            )
            .await
            .unwrap();
        let frame = framed.next().await.unwrap().unwrap();
        let response: WireResponse = decode(&frame).unwrap();
        assert!(matches!(response, WireResponse::Register(r) if r.success));

        framed
            .send(
                encode(&Request::Discover {
                    auth_token: None,
                    query: ServiceQuery {
                        service_name: "order".to_string(),
                        healthy_only: false,
                    },
                })
                .unwrap(),
            )
            .await
            .unwrap();
        let frame = framed.next().await.unwrap().unwrap();
        let response: WireResponse = decode(&frame).unwrap();
        match response {
            WireResponse::Discover(list) => assert_eq!(list.instances.len(), 1),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
