//! In-process room used when no media SDK is linked.
//!
//! Behaves like a room with a single agent already waiting: joining reports
//! the agent and subscribes its audio track, leaving unsubscribes it. No
//! audio actually flows.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::{
    ConnectionState, Participant, RemoteTrack, Room, RoomEvent, RoomEventSender, RoomFactory,
    RoomOptions,
};

/// URLs with this scheme make the join fail, which is handy for trying the
/// error paths from the console.
pub const FAILING_URL_SCHEME: &str = "fail://";

const LOOPBACK_ROOM_NAME: &str = "loopback";

pub struct LoopbackRoomFactory {
    agent_identity: String,
}

impl LoopbackRoomFactory {
    pub fn new(agent_identity: impl Into<String>) -> Self {
        Self {
            agent_identity: agent_identity.into(),
        }
    }
}

impl RoomFactory for LoopbackRoomFactory {
    fn create(&self, options: RoomOptions, events: RoomEventSender) -> Arc<dyn Room> {
        debug!(
            "Creating loopback room (adaptive_stream={}, dynacast={})",
            options.adaptive_stream, options.dynacast
        );
        Arc::new(LoopbackRoom::new(self.agent_identity.clone(), events))
    }
}

pub struct LoopbackRoom {
    agent: Participant,
    events: RoomEventSender,
    name: Mutex<Option<String>>,
    connected: AtomicBool,
    microphone: AtomicBool,
}

impl LoopbackRoom {
    pub fn new(agent_identity: String, events: RoomEventSender) -> Self {
        Self {
            agent: Participant::new(agent_identity),
            events,
            name: Mutex::new(None),
            connected: AtomicBool::new(false),
            microphone: AtomicBool::new(false),
        }
    }

    pub fn microphone_enabled(&self) -> bool {
        self.microphone.load(Ordering::SeqCst)
    }

    fn agent_track(&self) -> RemoteTrack {
        RemoteTrack::audio(format!("TR_{}_microphone", self.agent.identity))
    }

    fn set_name(&self, name: Option<String>) {
        if let Ok(mut guard) = self.name.lock() {
            *guard = name;
        }
    }
}

#[async_trait]
impl Room for LoopbackRoom {
    async fn connect(&self, url: &str, token: &str) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            bail!("Room is already connected");
        }

        self.events
            .emit(RoomEvent::ConnectionStateChanged(ConnectionState::Connecting));

        if url.starts_with(FAILING_URL_SCHEME) {
            self.events
                .emit(RoomEvent::ConnectionStateChanged(ConnectionState::Disconnected));
            bail!("could not establish signal connection to {url}");
        }

        info!(
            "Loopback room joined at {} with token length {}",
            url,
            token.len()
        );
        self.connected.store(true, Ordering::SeqCst);
        self.set_name(Some(LOOPBACK_ROOM_NAME.to_string()));

        self.events
            .emit(RoomEvent::ConnectionStateChanged(ConnectionState::Connected));
        self.events.emit(RoomEvent::Connected);
        self.events
            .emit(RoomEvent::ParticipantJoined(self.agent.clone()));
        self.events.emit(RoomEvent::TrackSubscribed {
            track: self.agent_track(),
            participant: self.agent.clone(),
        });

        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            debug!("Loopback room already disconnected");
            return Ok(());
        }

        self.microphone.store(false, Ordering::SeqCst);
        self.set_name(None);

        self.events.emit(RoomEvent::TrackUnsubscribed {
            track: self.agent_track(),
            participant: self.agent.clone(),
        });
        self.events
            .emit(RoomEvent::ConnectionStateChanged(ConnectionState::Disconnected));
        self.events.emit(RoomEvent::Disconnected);

        Ok(())
    }

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            bail!("Room is not connected");
        }

        self.microphone.store(enabled, Ordering::SeqCst);
        debug!("Loopback microphone enabled={}", enabled);
        Ok(())
    }

    fn name(&self) -> Option<String> {
        self.name.lock().ok().and_then(|guard| guard.clone())
    }
}
