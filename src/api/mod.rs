//! Local HTTP control surface.
//!
//! Provides HTTP endpoints for:
//! - Session control (toggle, connect, disconnect)
//! - Session status and transcript

pub mod error;
pub mod routes;

use crate::config::Config;
use crate::session::SessionController;
use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub use routes::session::{ApiCommand, SessionRouteState};

pub struct ApiServer {
    port: u16,
    session_state: SessionRouteState,
}

impl ApiServer {
    pub fn new(
        tx: tokio::sync::mpsc::Sender<ApiCommand>,
        session: SessionController,
        config: &Config,
    ) -> Self {
        Self {
            port: config.api.port,
            session_state: SessionRouteState {
                tx,
                session,
                status_bar: config.ui.status_bar.clone(),
            },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(status))
            .route("/version", get(version))
            .merge(routes::session::router(self.session_state.clone()))
            .layer(ServiceBuilder::new())
    }

    pub async fn start(self) -> Result<()> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET  /              - Service info");
        info!("  POST /toggle        - Toggle microphone (connects first if needed)");
        info!("  POST /connect       - Join the room");
        info!("  POST /disconnect    - Leave the room");
        info!("  GET  /status        - Get session status");
        info!("  GET  /transcript    - Get transcript lines");
        info!("  GET  /version       - Get version info");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "voice-console",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "voice-console"
    }))
}
