use std::future::Future;
use std::sync::Arc;

use tapr_changer::{Changer, ChangerRegistry};
use tapr_store::StoreRegistry;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::push::IoServer;
use crate::router::build_router;

/// tapr ingestion server.
pub struct TaprServer {
    config: ServerConfig,
    io: IoServer,
    changer: Option<Arc<dyn Changer>>,
}

impl TaprServer {
    /// Build the store and optional changer named by `config`.
    pub fn from_config(
        config: ServerConfig,
        stores: &StoreRegistry,
        changers: &ChangerRegistry,
    ) -> ServerResult<Self> {
        config.push.validate()?;
        let store = stores.create_from_config(&config.store)?;
        let changer = config
            .changer
            .as_ref()
            .map(|cfg| changers.create(&cfg.backend, cfg))
            .transpose()?;
        let io = IoServer::new(store, config.push.clone());
        Ok(Self { config, io, changer })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn io(&self) -> &IoServer {
        &self.io
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        let mut state = AppState::new(self.io.clone());
        if let Some(changer) = &self.changer {
            state = state.with_changer(Arc::clone(changer));
        }
        build_router(state)
    }

    /// Serve until ctrl-c.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_until(shutdown_signal(tokio::signal::ctrl_c())).await
    }

    /// Serve until `signal` resolves, then cancel in-flight pushes and log
    /// streams and close every open transaction.
    pub async fn serve_until<F>(self, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            store = self.io.store().name(),
            backend = self.io.store().backend(),
            changer = self.changer.is_some(),
            "tapr server listening"
        );

        let app = self.router();
        let io = self.io.clone();
        let shutdown = async move {
            signal.await;
            info!("shutdown requested");
            io.shutdown().await;
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        info!("tapr server stopped");
        Ok(())
    }
}

/// Resolve when `signal` fires. If the signal handler cannot be installed,
/// never resolve, so the server keeps running instead of stopping at once.
async fn shutdown_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!(error = %e, "failed to install shutdown signal handler; ctrl-c will not stop the server");
        std::future::pending::<()>().await;
    }
}
