use clap::Parser;
use tracing_subscriber::EnvFilter;

use sigrelay_server::config::ServerConfig;
use sigrelay_server::{build_app, spawn_idle_sweeper};

#[derive(Parser, Debug)]
#[command(name = "sigrelay")]
struct Args {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = ServerConfig::load(args.config.as_deref());
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate();

    let (app, state) = build_app(config);
    spawn_idle_sweeper(&state);

    let listen_addr = state.config.listen_addr();
    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %listen_addr, error = %e, "failed to bind");
            std::process::exit(1);
        },
    };

    tracing::info!(addr = %listen_addr, "sigrelay listening");

    let shutdown = state.shutdown.clone();
    if let Err(e) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown_signal(shutdown))
        .await
    {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}

/// Waits for SIGINT/SIGTERM, then cancels the shared shutdown token so every
/// live connection's read/write loops and the idle sweeper unwind cleanly.
async fn wait_for_shutdown_signal(shutdown: tokio_util::sync::CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
    shutdown.cancel();
}
