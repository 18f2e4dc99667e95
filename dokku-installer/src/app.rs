//! Process lifecycle: tracing setup, mode dispatch, and serving until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use crate::config::{Config, Settings};
use crate::lifecycle::{Controller, Mode};
use crate::server;
use crate::state::AppState;

/// Run the installer in the mode selected on the command line.
pub async fn run(config: Config) -> anyhow::Result<()> {
    init_tracing(&config);

    let mode = config.mode();
    let settings = Arc::new(Settings::from_env());
    let controller = Controller::new(settings, mode);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?mode,
        state = %controller.state(),
        dokku_root = %controller.settings().paths.dokku_root.display(),
        "dokku-installer starting"
    );

    if mode == Mode::OnBoot {
        let registrar = controller.clone();
        let result = tokio::task::spawn_blocking(move || registrar.register()).await?;
        match result {
            Ok(state) => {
                info!(state = %state, "boot registration complete");
                std::process::exit(0);
            }
            Err(e) => {
                error!(error = %e, "boot registration failed");
                std::process::exit(1);
            }
        }
    }

    serve(controller).await
}

async fn serve(controller: Controller) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], controller.settings().listen_port));
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, self_destruct = controller.mode() == Mode::SelfDestruct, "installer listening");

    let state = Arc::new(AppState {
        controller,
        version: concat!("v", env!("CARGO_PKG_VERSION")),
    });

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    info!("dokku-installer stopped");
    Ok(())
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
