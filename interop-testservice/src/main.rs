use std::error::Error;
use std::sync::Arc;

use interop_testservice::{receiver, Config, HopRegistry, ServiceHopper};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let registry = HopRegistry::with_defaults(&config)?;
    let hopper = Arc::new(ServiceHopper::new(registry));

    let grpc = receiver::grpc::start(config.grpc_addr, hopper.clone()).await?;
    let http = receiver::http::start(config.http_addr, hopper).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    grpc.shutdown().await;
    http.shutdown().await;

    Ok(())
}
