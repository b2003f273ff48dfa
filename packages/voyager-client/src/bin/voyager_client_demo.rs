//! Demo/smoke-test binary: registers a service instance against a running
//! registry server, discovers it back, and then holds the process open
//! (health-checking in the background) until `SIGINT`/`SIGTERM`.

use std::collections::HashMap;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use voyager_client::{ClientConfig, DiscoveryClient};

/// Extra, demo-only flags layered on top of [`ClientConfig`].
#[derive(Debug, Parser)]
#[command(name = "voyager-client-demo")]
struct DemoArgs {
    #[command(flatten)]
    client: ClientConfig,

    /// Service name this demo instance registers under.
    #[arg(long, default_value = "demo-service")]
    service_name: String,

    /// Address this demo instance advertises to other clients.
    #[arg(long, default_value = "127.0.0.1")]
    advertise_address: String,

    /// Port this demo instance advertises to other clients.
    #[arg(long, default_value_t = 9000)]
    advertise_port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = DemoArgs::parse();
    let client = DiscoveryClient::connect(args.client).await?;

    client
        .register(
            args.service_name.clone(),
            args.advertise_address,
            args.advertise_port,
            HashMap::new(),
        )
        .await?;
    info!(service = %args.service_name, "registered");

    match client.discover(&args.service_name).await {
        Ok(conn) => info!(address = %conn.address(), "discovered self"),
        Err(err) => error!(%err, "discover failed"),
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    client.deregister().await?;
    client.close().await;
    Ok(())
}
