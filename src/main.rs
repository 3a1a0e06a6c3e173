//! OAuth Redirect Gateway — process entry point.

use std::process::ExitCode;

use clap::Parser;
use tokio::sync::broadcast;
use tracing::{error, info};

use oauth_redirect_gateway::cli::Cli;
use oauth_redirect_gateway::loader::ConfigLoader;
use oauth_redirect_gateway::listener::ListenerSupervisor;
use oauth_redirect_gateway::server::{AppState, build_router};
use oauth_redirect_gateway::setup_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let (loader, desired_port) = match ConfigLoader::load_initial(cli.config.clone()) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!(config = %cli.config.display(), error = %e, "Failed to load initial configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "Starting OAuth redirect gateway"
    );

    let state = AppState::new(loader.live_config());
    let router = build_router(state);
    let supervisor = ListenerSupervisor::new(router, desired_port);

    let (shutdown_tx, _) = broadcast::channel(1);

    let loader_task = tokio::spawn(loader.run(shutdown_tx.subscribe()));
    let listener_task = tokio::spawn(supervisor.run(shutdown_tx.subscribe()));

    shutdown_signal().await;
    info!("Shutdown signal received, draining in-flight requests");
    let _ = shutdown_tx.send(());

    if let Err(e) = loader_task.await {
        error!(error = %e, "config loader task panicked");
    }
    if let Err(e) = listener_task.await {
        error!(error = %e, "listener supervisor task panicked");
    }

    info!("OAuth redirect gateway shutdown complete");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
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
        () = ctrl_c => {},
        () = terminate => {},
    }
}
