//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;

use crate::application::services::ConnectionService;
use crate::config::Settings;
use crate::domain::ResourceTable;
use crate::presentation::http::handlers::health;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConnectionService>,
    pub settings: Arc<Settings>,
}

/// Application instance
pub struct Application {
    service: Arc<ConnectionService>,
    local_addr: SocketAddr,
}

impl Application {
    /// Build the application from settings and start listening
    pub async fn build(settings: Settings, resources: ResourceTable) -> Result<Self> {
        health::init_server_start();

        tracing::info!(resources = ?resources, "Resource table loaded");
        let service = Arc::new(ConnectionService::new(settings, resources));
        let local_addr = service.start().await?;

        Ok(Self {
            service,
            local_addr,
        })
    }

    /// Run the server until a shutdown signal arrives, then stop it
    pub async fn run_until_stopped(self) -> Result<()> {
        shutdown_signal().await;
        self.service.stop().await;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn service(&self) -> &Arc<ConnectionService> {
        &self.service
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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
    tracing::info!("Shutdown signal received");
}
