//! Scripted collaborators for driving a session without a backend or SFU.

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use voice_console::media::{PlaybackBackend, PlaybackElement};
use voice_console::room::{
    Participant, RemoteTrack, Room, RoomEvent, RoomEventSender, RoomFactory, RoomOptions,
};
use voice_console::session::{SessionController, SessionSettings};
use voice_console::token::{ConnectionDetails, TokenSource};

pub struct StaticTokenSource {
    pub failure: Option<String>,
    pub fetches: AtomicUsize,
}

impl StaticTokenSource {
    pub fn ok() -> Self {
        Self {
            failure: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch(&self) -> Result<ConnectionDetails> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        // Give concurrent callers a chance to run, like a real request would.
        tokio::task::yield_now().await;

        if let Some(message) = &self.failure {
            bail!("{}", message);
        }
        Ok(ConnectionDetails {
            token: "signed-token".to_string(),
            url: "wss://sfu.test".to_string(),
            room: "jarvis-room".to_string(),
        })
    }
}

#[derive(Default)]
pub struct RoomScript {
    pub fail_join: AtomicBool,
    pub fail_microphone: AtomicBool,
    pub fail_disconnect: AtomicBool,
    /// Join does not emit `Connected` by itself.
    pub silent_join: AtomicBool,
    /// When set, joins wait for a notification before resolving.
    pub hold_join: Mutex<Option<Arc<Notify>>>,
    /// When set, leaving reports `Disconnected` and then waits for a
    /// notification before resolving.
    pub hold_leave: Mutex<Option<Arc<Notify>>>,
}

pub struct ScriptedRoom {
    events: RoomEventSender,
    script: Arc<RoomScript>,
    pub options: RoomOptions,
    pub joins: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub microphone: Mutex<Vec<bool>>,
}

impl ScriptedRoom {
    pub fn emit(&self, event: RoomEvent) {
        self.events.emit(event);
    }
}

#[async_trait]
impl Room for ScriptedRoom {
    async fn connect(&self, _url: &str, _token: &str) -> Result<()> {
        self.joins.fetch_add(1, Ordering::SeqCst);

        let gate = self.script.hold_join.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.script.fail_join.load(Ordering::SeqCst) {
            bail!("signal connection refused");
        }
        if !self.script.silent_join.load(Ordering::SeqCst) {
            self.events.emit(RoomEvent::Connected);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_disconnect.load(Ordering::SeqCst) {
            return Err(anyhow!("transport already closed"));
        }
        self.events.emit(RoomEvent::Disconnected);

        let gate = self.script.hold_leave.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(())
    }

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<()> {
        if self.script.fail_microphone.load(Ordering::SeqCst) {
            bail!("permission denied");
        }
        self.microphone.lock().unwrap().push(enabled);
        Ok(())
    }

    fn name(&self) -> Option<String> {
        Some("jarvis-room".to_string())
    }
}

#[derive(Default)]
pub struct ScriptedRoomFactory {
    pub script: Arc<RoomScript>,
    pub rooms: Mutex<Vec<Arc<ScriptedRoom>>>,
}

impl ScriptedRoomFactory {
    pub fn room(&self, index: usize) -> Arc<ScriptedRoom> {
        Arc::clone(&self.rooms.lock().unwrap()[index])
    }

    pub fn latest(&self) -> Arc<ScriptedRoom> {
        let rooms = self.rooms.lock().unwrap();
        Arc::clone(rooms.last().expect("no room created"))
    }

    pub fn created(&self) -> usize {
        self.rooms.lock().unwrap().len()
    }

    pub fn total_joins(&self) -> usize {
        self.rooms
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.joins.load(Ordering::SeqCst))
            .sum()
    }
}

impl RoomFactory for ScriptedRoomFactory {
    fn create(&self, options: RoomOptions, events: RoomEventSender) -> Arc<dyn Room> {
        let room = Arc::new(ScriptedRoom {
            events,
            script: Arc::clone(&self.script),
            options,
            joins: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            microphone: Mutex::new(Vec::new()),
        });
        self.rooms.lock().unwrap().push(Arc::clone(&room));
        room
    }
}

/// Playback backend that counts live elements.
#[derive(Default)]
pub struct CountingPlayback {
    pub live: Arc<AtomicUsize>,
    pub created: AtomicUsize,
}

impl CountingPlayback {
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

struct CountedElement {
    live: Arc<AtomicUsize>,
    released: bool,
}

impl PlaybackElement for CountedElement {
    fn set_autoplay(&mut self, _autoplay: bool) {}

    fn set_volume(&mut self, _volume: f32) {}

    fn mount(&mut self) {}

    fn play(&mut self) -> Result<()> {
        Ok(())
    }

    fn pause(&mut self) {}

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl PlaybackBackend for CountingPlayback {
    fn create(&self, _track: &RemoteTrack) -> Result<Box<dyn PlaybackElement>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountedElement {
            live: Arc::clone(&self.live),
            released: false,
        }))
    }
}

pub struct Harness {
    pub session: SessionController,
    pub tokens: Arc<StaticTokenSource>,
    pub rooms: Arc<ScriptedRoomFactory>,
    pub playback: Arc<CountingPlayback>,
}

pub fn harness() -> Harness {
    harness_with(StaticTokenSource::ok())
}

pub fn harness_with(tokens: StaticTokenSource) -> Harness {
    let tokens = Arc::new(tokens);
    let rooms = Arc::new(ScriptedRoomFactory::default());
    let playback = Arc::new(CountingPlayback::default());

    let session = SessionController::new(
        SessionSettings {
            microphone_settle: Duration::from_millis(5),
            ..SessionSettings::default()
        },
        Arc::clone(&tokens) as Arc<dyn TokenSource>,
        Arc::clone(&rooms) as Arc<dyn RoomFactory>,
        Arc::clone(&playback) as Arc<dyn PlaybackBackend>,
    );

    Harness {
        session,
        tokens,
        rooms,
        playback,
    }
}

pub fn agent() -> Participant {
    Participant::new("agent-1")
}

pub fn agent_audio() -> RoomEvent {
    RoomEvent::TrackSubscribed {
        track: RemoteTrack::audio("TR_agent_mic"),
        participant: agent(),
    }
}
