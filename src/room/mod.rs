//! Real-time media room abstraction.
//!
//! The transport itself (signalling, ICE, track forwarding, reconnection)
//! lives in an external room client library. This module only describes the
//! surface the session needs from it:
//! - `RoomFactory` builds a room with its event listener already registered
//! - `Room` joins, leaves and toggles the local microphone
//! - `RoomEvent` is everything the room reports back

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod loopback;

pub use loopback::{LoopbackRoom, LoopbackRoomFactory};

/// Kind of media carried by a remote track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// A track published by a remote participant and subscribed by us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub sid: String,
    pub kind: TrackKind,
}

impl RemoteTrack {
    pub fn audio(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            kind: TrackKind::Audio,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.kind == TrackKind::Audio
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub identity: String,
}

impl Participant {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }
}

/// Transport-level connection state as reported by the room library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Events emitted by a room while it is alive.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    Connected,
    Disconnected,
    Reconnecting,
    Reconnected,
    ParticipantJoined(Participant),
    TrackSubscribed {
        track: RemoteTrack,
        participant: Participant,
    },
    TrackUnsubscribed {
        track: RemoteTrack,
        participant: Participant,
    },
    DataReceived {
        payload: Vec<u8>,
        participant: Option<Participant>,
    },
    ConnectionStateChanged(ConnectionState),
}

/// Options applied when a room is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomOptions {
    /// Let the server pick layer quality based on what is actually rendered.
    pub adaptive_stream: bool,
    /// Pause publishing of layers nobody is subscribed to.
    pub dynacast: bool,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            adaptive_stream: true,
            dynacast: true,
        }
    }
}

/// Listener handed to a room at construction time.
///
/// Rooms call `emit` for every event, including ones raised while `connect`
/// is still in progress.
#[derive(Clone)]
pub struct RoomEventSender {
    deliver: Arc<dyn Fn(RoomEvent) + Send + Sync>,
}

impl RoomEventSender {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(RoomEvent) + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    pub fn emit(&self, event: RoomEvent) {
        (self.deliver)(event);
    }
}

impl fmt::Debug for RoomEventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomEventSender").finish_non_exhaustive()
    }
}

#[async_trait]
pub trait Room: Send + Sync {
    /// Join the room at `url` with a signed access token.
    async fn connect(&self, url: &str, token: &str) -> Result<()>;

    /// Leave the room. Emits `Disconnected` through the listener.
    async fn disconnect(&self) -> Result<()>;

    /// Publish or unpublish the local microphone track.
    async fn set_microphone_enabled(&self, enabled: bool) -> Result<()>;

    /// Room name once joined.
    fn name(&self) -> Option<String>;
}

pub trait RoomFactory: Send + Sync {
    fn create(&self, options: RoomOptions, events: RoomEventSender) -> Arc<dyn Room>;
}
