use crate::{create_router, AppState};
use moodscape_core::{ConfigManager, MoodscapeError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

pub const LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

pub struct Server {
    addr: SocketAddr,
    state: AppState,
}

impl Server {
    pub async fn new(config: Arc<ConfigManager>) -> Result<Self> {
        let server = &config.config().server;
        let addr: SocketAddr = format!("{}:{}", server.host, server.port)
            .parse()
            .map_err(|e| {
                MoodscapeError::Config(moodscape_core::ConfigError::ValidationError(format!(
                    "invalid listen address {}:{}: {e}",
                    server.host, server.port
                )))
            })?;

        let state = AppState::new(config.clone()).await?;
        Ok(Self { addr, state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run(self) -> Result<()> {
        let pruner = spawn_limiter_pruner(self.state.clone());
        let router = create_router(self.state);

        let listener = {
            let socket = if self.addr.is_ipv6() {
                tokio::net::TcpSocket::new_v6()
            } else {
                tokio::net::TcpSocket::new_v4()
            }?;

            if let Err(e) = socket.set_reuseaddr(true) {
                warn!(error = %e, "Could not set SO_REUSEADDR");
            }
            socket.bind(self.addr)?;
            socket.listen(1024)?
        };

        info!("MoodScape API listening on http://{}", self.addr);
        info!("  GET /health - Liveness check");
        info!("  /api/* - REST API");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        pruner.abort();
        Ok(())
    }
}

/// Periodically drop limiter state for keys that have fully recovered.
fn spawn_limiter_pruner(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LIMITER_PRUNE_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            state.limiters.prune();
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown");
}
