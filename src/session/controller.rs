//! Session controller: owns the connection life cycle.
//!
//! All transitions are funnelled through `EventBridge::reduce`; the
//! controller only performs the I/O (token fetch, join, microphone,
//! leave) and reports outcomes as `SessionEvent`s.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::bridge::{EventBridge, MediaCommand, SessionEvent};
use super::error::SessionError;
use super::state::{AttemptId, ConnectionStatus, RoomHandle, SessionSnapshot, SessionState};
use crate::config::RoomConfig;
use crate::media::{MediaSink, PlaybackBackend};
use crate::room::{RoomEventSender, RoomFactory, RoomOptions};
use crate::token::TokenSource;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub room_options: RoomOptions,
    pub microphone_settle: Duration,
    pub agent_label: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&RoomConfig::default())
    }
}

impl From<&RoomConfig> for SessionSettings {
    fn from(room: &RoomConfig) -> Self {
        Self {
            room_options: RoomOptions {
                adaptive_stream: room.adaptive_stream,
                dynacast: room.dynacast,
            },
            microphone_settle: Duration::from_millis(room.microphone_settle_ms),
            agent_label: room.agent_label.clone(),
        }
    }
}

/// Result of a `connect()` call that did not fail.
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    Joined(RoomHandle),
    /// Another attempt is in flight; nothing was done.
    AlreadyConnecting,
    AlreadyConnected(RoomHandle),
}

struct Inner {
    settings: SessionSettings,
    tokens: Arc<dyn TokenSource>,
    rooms: Arc<dyn RoomFactory>,
    bridge: EventBridge,
    state: watch::Sender<SessionState>,
    media: Mutex<MediaSink>,
    connecting: AtomicBool,
    next_attempt: AtomicU64,
    disposed: AtomicBool,
}

impl Inner {
    fn dispatch(&self, event: SessionEvent) {
        self.state.send_modify(|state| {
            let transition = self.bridge.reduce(state, event);
            *state = transition.state;

            if transition.media.is_empty() {
                return;
            }
            let mut sink = self.media();
            for command in transition.media {
                match command {
                    MediaCommand::Attach { track, participant } => {
                        sink.attach(&track, &participant)
                    }
                    MediaCommand::Detach { track_sid } => {
                        sink.detach(&track_sid);
                    }
                    MediaCommand::ClearAll => sink.clear_all(),
                }
            }
        });
    }

    fn media(&self) -> MutexGuard<'_, MediaSink> {
        match self.media.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Listener for the room created by `attempt`. Holds the session weakly so
    /// a room kept alive elsewhere does not keep the session alive.
    fn event_sender(inner: &Arc<Inner>, attempt: AttemptId) -> RoomEventSender {
        let weak = Arc::downgrade(inner);
        RoomEventSender::new(move |event| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.is_disposed() {
                debug!("Session disposed, ignoring {:?}", event);
                return;
            }
            inner.dispatch(SessionEvent::Room { attempt, event });
        })
    }
}

/// Teardown for a session dropped without `shutdown()`.
impl Drop for Inner {
    fn drop(&mut self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let active_room = self.state.borrow().active_room.clone();
        if let Some(handle) = active_room {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        if let Err(e) = handle.room().disconnect().await {
                            warn!("Failed to leave room after drop: {}", e);
                        }
                    });
                }
                Err(_) => warn!("No runtime to leave room {} on drop", handle.attempt()),
            }
        }

        let sink = match self.media.get_mut() {
            Ok(sink) => sink,
            Err(poisoned) => poisoned.into_inner(),
        };
        sink.clear_all();
    }
}

/// Clears the in-flight flag when the attempt ends, however it ends, and
/// tells subscribers about it.
struct ConnectingGuard<'a>(&'a Inner);

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        self.0.connecting.store(false, Ordering::SeqCst);
        self.0.dispatch(SessionEvent::ConnectSettled);
    }
}

#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        settings: SessionSettings,
        tokens: Arc<dyn TokenSource>,
        rooms: Arc<dyn RoomFactory>,
        playback: Arc<dyn PlaybackBackend>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        let bridge = EventBridge::new(settings.agent_label.clone());

        Self {
            inner: Arc::new(Inner {
                settings,
                tokens,
                rooms,
                bridge,
                state,
                media: Mutex::new(MediaSink::new(playback)),
                connecting: AtomicBool::new(false),
                next_attempt: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.snapshot()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::new(&self.inner.snapshot())
    }

    /// Receiver that yields the new state after every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn connecting(&self) -> bool {
        self.inner.connecting.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    pub fn attached_audio_tracks(&self) -> Vec<String> {
        self.inner.media().track_sids()
    }

    pub async fn connect(&self) -> Result<ConnectOutcome, SessionError> {
        if self.inner.is_disposed() {
            return Err(SessionError::Disposed);
        }

        if self
            .inner
            .connecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("Already connecting...");
            return Ok(ConnectOutcome::AlreadyConnecting);
        }
        let _in_flight = ConnectingGuard(&self.inner);

        if let Some(handle) = self.inner.snapshot().active_room {
            debug!("Room {} already active", handle.attempt());
            return Ok(ConnectOutcome::AlreadyConnected(handle));
        }

        let attempt = AttemptId(self.inner.next_attempt.fetch_add(1, Ordering::SeqCst) + 1);
        self.inner.dispatch(SessionEvent::ConnectRequested);

        let details = match self.inner.tokens.fetch().await {
            Ok(details) => details,
            Err(e) => {
                let message = e.to_string();
                error!("Failed to fetch room token: {:#}", e);
                self.inner.dispatch(SessionEvent::TokenFailed {
                    message: message.clone(),
                });
                return Err(SessionError::TokenFetchFailed(message));
            }
        };

        if self.inner.is_disposed() {
            debug!("Session disposed while fetching token for {}", attempt);
            return Err(SessionError::Abandoned(attempt.value()));
        }

        // The listener goes in with the room, before the join starts.
        let room = self.inner.rooms.create(
            self.inner.settings.room_options.clone(),
            Inner::event_sender(&self.inner, attempt),
        );
        let handle = RoomHandle::new(attempt, Arc::clone(&room), details.room.clone());
        self.inner
            .dispatch(SessionEvent::RoomCreated(handle.clone()));

        if let Err(e) = room.connect(&details.url, &details.token).await {
            let message = e.to_string();
            error!("Failed to connect to room {}: {:#}", details.room, e);
            self.inner.dispatch(SessionEvent::ConnectFailed {
                attempt,
                message: message.clone(),
            });
            return Err(SessionError::JoinFailed(message));
        }

        if self.inner.is_disposed() || self.inner.snapshot().attempt() != Some(attempt) {
            warn!("Connection attempt {} was superseded, leaving room", attempt);
            if let Err(e) = room.disconnect().await {
                warn!("Failed to leave superseded room: {}", e);
            }
            return Err(SessionError::Abandoned(attempt.value()));
        }

        info!("Room connection established to: {}", handle.room_name());
        Ok(ConnectOutcome::Joined(handle))
    }

    /// Connects first when there is no room, otherwise flips the microphone.
    /// Failures end up in the transcript, never in the caller.
    pub async fn toggle_microphone(&self) {
        if self.inner.is_disposed() {
            return;
        }

        let state = self.inner.snapshot();
        let Some(handle) = state.active_room.clone() else {
            if self.connecting() {
                info!("Already connecting...");
                return;
            }

            self.inner
                .dispatch(SessionEvent::Note("Connecting...".to_string()));
            match self.connect().await {
                Ok(ConnectOutcome::Joined(handle)) => {
                    tokio::time::sleep(self.inner.settings.microphone_settle).await;
                    self.set_microphone(&handle, true).await;
                }
                Ok(outcome) => debug!("Connect from toggle returned {:?}", outcome),
                Err(e) => debug!("Connect from toggle failed: {}", e),
            }
            return;
        };

        let enable = !state.microphone_requested();
        self.set_microphone(&handle, enable).await;
    }

    async fn set_microphone(&self, handle: &RoomHandle, enabled: bool) {
        if self.inner.is_disposed() {
            return;
        }

        if enabled {
            let state = self.inner.snapshot();
            if state.attempt() != Some(handle.attempt())
                || state.connection_status != ConnectionStatus::Connected
            {
                info!("Room not ready yet.");
                self.inner
                    .dispatch(SessionEvent::Note("Room not ready yet".to_string()));
                return;
            }
            info!("Requesting microphone access...");
        }

        match handle.room().set_microphone_enabled(enabled).await {
            Ok(()) => {
                info!("Microphone enabled={}", enabled);
                self.inner.dispatch(SessionEvent::MicrophoneChanged {
                    attempt: handle.attempt(),
                    enabled,
                });
            }
            Err(e) => {
                let err = SessionError::MicrophoneToggleFailed(e.to_string());
                error!("{}", err);
                self.inner.dispatch(SessionEvent::MicrophoneFailed {
                    enabling: enabled,
                    message: e.to_string(),
                });
            }
        }
    }

    /// Leaves the room. Does nothing when there is none.
    pub async fn disconnect(&self) {
        if self.inner.is_disposed() {
            return;
        }

        let Some(handle) = self.inner.snapshot().active_room else {
            debug!("Disconnect requested without an active room");
            return;
        };

        info!("Disconnecting from room {}", handle.room_name());
        if let Err(e) = handle.room().disconnect().await {
            let err = SessionError::DisconnectFailed(e.to_string());
            warn!("{}", err);
            self.inner.dispatch(SessionEvent::DisconnectFailed {
                message: e.to_string(),
            });
        }

        self.inner.dispatch(SessionEvent::ManualDisconnect {
            attempt: handle.attempt(),
        });
    }

    pub fn clear_transcript(&self) {
        if self.inner.is_disposed() {
            return;
        }
        self.inner.dispatch(SessionEvent::ClearTranscript);
    }

    /// Disposal teardown. Runs once; later calls return immediately.
    pub async fn shutdown(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Shutting down voice session");
        if let Some(handle) = self.inner.snapshot().active_room {
            if let Err(e) = handle.room().disconnect().await {
                warn!("Failed to leave room during shutdown: {}", e);
            }
        }

        self.inner.media().clear_all();
    }
}
