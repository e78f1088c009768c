//! Session control endpoints.
//!
//! Provides HTTP endpoints for:
//! - Toggling the microphone (POST /toggle)
//! - Joining and leaving the room (POST /connect, POST /disconnect)
//! - Reading session status (GET /status)
//! - Reading the transcript (GET /transcript)

use crate::api::error::{ApiError, ApiResult};
use crate::config::StatusBarConfig;
use crate::session::{SessionController, SessionError, SessionSnapshot};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCommand {
    ToggleMicrophone,
    Connect,
    Disconnect,
    ClearTranscript,
    Shutdown,
}

impl ApiCommand {
    fn label(&self) -> &'static str {
        match self {
            Self::ToggleMicrophone => "toggle",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::ClearTranscript => "clear",
            Self::Shutdown => "shutdown",
        }
    }
}

#[derive(Clone)]
pub struct SessionRouteState {
    pub tx: mpsc::Sender<ApiCommand>,
    pub session: SessionController,
    pub status_bar: StatusBarConfig,
}

/// Creates the session router with all session-related endpoints.
pub fn router(state: SessionRouteState) -> Router {
    Router::new()
        .route("/toggle", post(toggle_microphone))
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
        .route("/status", get(session_status))
        .route("/transcript", get(transcript))
        .with_state(state)
}

async fn toggle_microphone(State(state): State<SessionRouteState>) -> ApiResult<Json<Value>> {
    send_command(&state, ApiCommand::ToggleMicrophone).await
}

async fn connect(State(state): State<SessionRouteState>) -> ApiResult<Json<Value>> {
    send_command(&state, ApiCommand::Connect).await
}

async fn disconnect(State(state): State<SessionRouteState>) -> ApiResult<Json<Value>> {
    send_command(&state, ApiCommand::Disconnect).await
}

async fn send_command(state: &SessionRouteState, command: ApiCommand) -> ApiResult<Json<Value>> {
    info!("{} command received via API", command.label());

    if state.session.is_disposed() {
        return Err(SessionError::Disposed.into());
    }

    if let Err(e) = state.tx.send(command).await {
        error!("Failed to send {} command: {}", command.label(), e);
        return Err(ApiError::loop_stopped());
    }

    // Small delay to allow the status to be updated
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    let snapshot = state.session.snapshot();
    Ok(Json(json!({
        "success": true,
        "command": command.label(),
        "status": snapshot.status.as_str(),
        "connecting": snapshot.connecting,
        "microphone_active": snapshot.microphone_active,
    })))
}

/// Gets the current session status.
///
/// `style=waybar` returns `{ text, class, tooltip }` for status bars.
async fn session_status(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<SessionRouteState>,
) -> ApiResult<Json<Value>> {
    let snapshot = state.session.snapshot();

    if params.get("style").map(String::as_str) == Some("waybar") {
        return Ok(Json(generate_waybar_response(&snapshot, &state.status_bar)));
    }

    let body = serde_json::to_value(&snapshot).map_err(anyhow::Error::from)?;
    Ok(Json(body))
}

async fn transcript(State(state): State<SessionRouteState>) -> Json<Value> {
    let session = state.session.state();
    Json(json!({
        "lines": session.transcript,
    }))
}

fn generate_waybar_response(snapshot: &SessionSnapshot, config: &StatusBarConfig) -> Value {
    let (text, class, tooltip) = if let Some(error) = &snapshot.last_error {
        (
            config.disconnected_text.clone(),
            "voice-console-error",
            error.clone(),
        )
    } else if snapshot.microphone_active {
        (
            config.listening_text.clone(),
            "voice-console-listening",
            config.listening_tooltip.clone(),
        )
    } else if snapshot.connected {
        (
            config.connected_text.clone(),
            "voice-console-connected",
            config.connected_tooltip.clone(),
        )
    } else if snapshot.connecting {
        (
            config.disconnected_text.clone(),
            "voice-console-connecting",
            "Connecting...".to_string(),
        )
    } else {
        (
            config.disconnected_text.clone(),
            "voice-console-idle",
            config.disconnected_tooltip.clone(),
        )
    };

    json!({
        "text": text,
        "class": class,
        "tooltip": tooltip
    })
}
