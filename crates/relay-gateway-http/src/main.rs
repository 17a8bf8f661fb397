use std::net::SocketAddr;

use relay_gateway::Gateway;
use relay_store::MemoryStore;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tracing_subscriber::EnvFilter;

fn bind_addr() -> Result<SocketAddr, String> {
    let addr = match std::env::var("RELAY_ADDR") {
        Ok(addr) => addr,
        Err(_) => {
            let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
            format!("0.0.0.0:{port}")
        }
    };
    addr.parse()
        .map_err(|e| format!("invalid listen address {addr}: {e}"))
}

async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable; ctrl-c only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let gateway = Gateway::from_env(MemoryStore::new()).unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(1);
    });

    let addr = bind_addr().unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(1);
    });
    let listener = TcpListener::bind(addr).await.unwrap_or_else(|e| {
        eprintln!("failed to bind {addr}: {e}");
        std::process::exit(1);
    });

    tracing::info!(%addr, "relay gateway listening");
    relay_gateway_http::serve(listener, gateway, shutdown_signal()).await;
}
