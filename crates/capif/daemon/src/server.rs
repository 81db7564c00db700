//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::CapifConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::notifier::Notifier;
use capif_registry::{BroadcastEventSink, CapifCore};
use std::sync::Arc;
use tokio::net::TcpListener;

/// CAPIF core function server
pub struct Server {
    config: CapifConfig,
    core: Arc<CapifCore>,
    events: BroadcastEventSink,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: CapifConfig) -> Self {
        let events = BroadcastEventSink::new(config.events.channel_capacity);
        let core = Arc::new(
            CapifCore::builder()
                .event_sink(Arc::new(events.clone()))
                .build(),
        );

        Self {
            config,
            core,
            events,
        }
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        let state = AppState::new(self.core.clone());
        let app = create_router(state, &self.config.server);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("CAPIF daemon listening on {}", addr);

        // Start notification delivery in background
        let notifier = Notifier::new(self.core.clone(), self.config.events.delivery_timeout())?;
        let notifications = tokio::spawn(notifier.run(self.events.subscribe()));

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("CAPIF daemon shutting down");
        notifications.abort();

        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
