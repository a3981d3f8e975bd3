//! TCP listener and server main loop

use super::router::{create_router, AppState};
use crate::config::Config;
use crate::delegate::{MessagingDelegate, SimulatedConfig, SimulatedDelegate};
use crate::lifecycle::{LifecycleConfig, LifecycleController};
use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A bound gateway server, ready to run
pub struct GatewayServer {
    listener: TcpListener,
    router: Router,
    controller: LifecycleController,
    sessions_dir: PathBuf,
}

impl GatewayServer {
    /// Bind using the simulated delegate
    pub async fn bind(config: &Config) -> Result<Self> {
        let simulator = Arc::new(SimulatedDelegate::new(SimulatedConfig {
            qr_delay: Duration::from_millis(config.delegate.qr_delay_ms),
            ..SimulatedConfig::default()
        }));
        let exposed = config.server.enable_simulation.then(|| Arc::clone(&simulator));

        Self::bind_with(config, simulator, exposed).await
    }

    /// Bind with an explicit delegate
    pub async fn bind_with(
        config: &Config,
        delegate: Arc<dyn MessagingDelegate>,
        simulator: Option<Arc<SimulatedDelegate>>,
    ) -> Result<Self> {
        config.validate()?;
        let sessions_dir = config.sessions_dir();
        if !sessions_dir.exists() {
            std::fs::create_dir_all(&sessions_dir).with_context(|| {
                format!("Failed to create sessions directory {}", sessions_dir.display())
            })?;
            tracing::info!("Created sessions directory {:?}", sessions_dir);
        }

        let controller = LifecycleController::new(LifecycleConfig::from(config), delegate);
        let router = create_router(AppState {
            controller: controller.clone(),
            simulator,
        });

        let addr = config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        Ok(Self {
            listener,
            router,
            controller,
            sessions_dir,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    /// Serve until a shutdown signal arrives, then cancel every session timer
    pub async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let addr = self.local_addr()?;
        tracing::info!("Server listening on http://{}", addr);
        tracing::info!("Session data stored in {:?}", self.sessions_dir);

        let controller = self.controller.clone();
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                tracing::info!("Shutdown signal received");
                // Closes the event bus too, which lets open WebSocket clients finish
                controller.shutdown().await;
            })
            .await?;

        // No-op when the signal path already ran
        self.controller.shutdown().await;
        tracing::info!("Server stopped");

        Ok(())
    }
}
