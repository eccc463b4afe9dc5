use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::server::{self, App};
use crate::{Config, Result};
use anyhow::Context;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Runs the HTTP server until Ctrl-C is received.
///
/// # Arguments
/// - `listen_addr` - Overrides the `listen_addr` in `config.json`.
///
/// # Errors
/// - `ErrorType::Service` if the address cannot be bound or accepting connections fails.
pub async fn serve(config: &Config, listen_addr: Option<SocketAddr>) -> Result<Out<()>> {
    let count = config
        .db()
        .count_students()
        .await
        .pub_result(ErrorType::Storage)?;
    info!("Serving {count} students");

    let addr = listen_addr.unwrap_or_else(|| config.listen_addr());
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Unable to listen on {addr}"))
        .pub_result(ErrorType::Service)?;

    server::serve(listener, App::from_config(config), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Unable to listen for Ctrl-C, shutting down: {e}");
        }
    })
    .await
    .pub_result(ErrorType::Service)?;

    Ok("The server has stopped".into())
}
