//! Session state record and the opaque room handle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::room::Room;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }

    /// Whether a room handle exists in this status.
    pub fn has_room(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

/// Identifies one `connect()` attempt. Later attempts compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub(crate) u64);

impl AttemptId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The room owned by the session, tagged with the attempt that created it.
#[derive(Clone)]
pub struct RoomHandle {
    attempt: AttemptId,
    room: Arc<dyn Room>,
    room_name: String,
}

impl RoomHandle {
    pub fn new(attempt: AttemptId, room: Arc<dyn Room>, room_name: impl Into<String>) -> Self {
        Self {
            attempt,
            room,
            room_name: room_name.into(),
        }
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn room(&self) -> &Arc<dyn Room> {
        &self.room
    }

    /// Name reported by the room, falling back to the one the backend issued.
    pub fn room_name(&self) -> String {
        self.room.name().unwrap_or_else(|| self.room_name.clone())
    }
}

impl fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomHandle")
            .field("attempt", &self.attempt)
            .field("room_name", &self.room_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub connection_status: ConnectionStatus,
    pub microphone_active: bool,
    pub transcript: Vec<String>,
    pub last_error: Option<String>,
    pub active_room: Option<RoomHandle>,
    pub connected_at: Option<DateTime<Utc>>,
    /// A connect attempt is in flight; the toggle is disabled meanwhile.
    pub connecting: bool,
    /// Microphone was live when the room started reconnecting.
    pub(crate) resume_microphone: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            connection_status: ConnectionStatus::Disconnected,
            microphone_active: false,
            transcript: Vec::new(),
            last_error: None,
            active_room: None,
            connected_at: None,
            connecting: false,
            resume_microphone: false,
        }
    }
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        self.connection_status == ConnectionStatus::Connected
    }

    pub fn attempt(&self) -> Option<AttemptId> {
        self.active_room.as_ref().map(RoomHandle::attempt)
    }

    /// Microphone should be treated as on, including while reconnecting.
    pub fn microphone_requested(&self) -> bool {
        self.microphone_active || self.resume_microphone
    }

    pub fn duration_seconds(&self) -> Option<u64> {
        self.connected_at.map(|started| {
            let elapsed = Utc::now() - started;
            elapsed.num_seconds().max(0) as u64
        })
    }
}

/// Serializable view of the session for the HTTP surface and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: ConnectionStatus,
    pub connected: bool,
    pub connecting: bool,
    pub microphone_active: bool,
    pub last_error: Option<String>,
    pub room: Option<String>,
    pub duration_seconds: Option<u64>,
    pub transcript_lines: usize,
}

impl SessionSnapshot {
    pub fn new(state: &SessionState) -> Self {
        Self {
            status: state.connection_status,
            connected: state.is_connected(),
            connecting: state.connecting,
            microphone_active: state.microphone_active,
            last_error: state.last_error.clone(),
            room: state.active_room.as_ref().map(RoomHandle::room_name),
            duration_seconds: state.duration_seconds(),
            transcript_lines: state.transcript.len(),
        }
    }
}
