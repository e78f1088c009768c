//! Event bridge: the single reducer every session transition goes through.
//!
//! Room events and controller actions are both expressed as `SessionEvent`s.
//! `EventBridge::reduce` maps one event onto a fresh `SessionState` plus the
//! media work the transition implies. It never touches the room or the
//! playback backend itself.

use chrono::Utc;
use tracing::debug;

use super::state::{AttemptId, ConnectionStatus, RoomHandle, SessionState};
use crate::room::{Participant, RemoteTrack, RoomEvent};

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Event raised by the room created for `attempt`.
    Room { attempt: AttemptId, event: RoomEvent },
    /// A new connect attempt started.
    ConnectRequested,
    /// The in-flight connect attempt ended, whatever the outcome.
    ConnectSettled,
    /// Token arrived and the room exists; the join is now in flight.
    RoomCreated(RoomHandle),
    TokenFailed { message: String },
    ConnectFailed { attempt: AttemptId, message: String },
    MicrophoneChanged { attempt: AttemptId, enabled: bool },
    MicrophoneFailed { enabling: bool, message: String },
    ManualDisconnect { attempt: AttemptId },
    DisconnectFailed { message: String },
    ClearTranscript,
    /// Free-form system line.
    Note(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaCommand {
    Attach {
        track: RemoteTrack,
        participant: Participant,
    },
    Detach {
        track_sid: String,
    },
    ClearAll,
}

#[derive(Debug)]
pub struct Transition {
    pub state: SessionState,
    pub media: Vec<MediaCommand>,
}

impl Transition {
    fn unchanged(state: &SessionState) -> Self {
        Self {
            state: state.clone(),
            media: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBridge {
    agent_label: String,
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new("Agent")
    }
}

impl EventBridge {
    pub fn new(agent_label: impl Into<String>) -> Self {
        Self {
            agent_label: agent_label.into(),
        }
    }

    pub fn reduce(&self, current: &SessionState, event: SessionEvent) -> Transition {
        let mut next = current.clone();
        let mut media = Vec::new();

        match event {
            SessionEvent::Room { attempt, event } => {
                if current.attempt() != Some(attempt) {
                    debug!("Dropping {:?} from stale attempt {}", event, attempt);
                    return Transition::unchanged(current);
                }
                self.apply_room_event(&mut next, &mut media, event);
            }
            SessionEvent::ConnectRequested => {
                next.connecting = true;
                next.last_error = None;
            }
            SessionEvent::ConnectSettled => {
                if !current.connecting {
                    return Transition::unchanged(current);
                }
                next.connecting = false;
            }
            SessionEvent::RoomCreated(handle) => {
                next.connection_status = ConnectionStatus::Connecting;
                next.active_room = Some(handle);
            }
            SessionEvent::TokenFailed { message } => {
                record_error(&mut next, format!("Connection failed: {message}"), &message);
            }
            SessionEvent::ConnectFailed { attempt, message } => {
                if current.attempt() != Some(attempt) {
                    debug!("Ignoring join failure of stale attempt {}", attempt);
                    return Transition::unchanged(current);
                }
                clear_room(&mut next);
                record_error(&mut next, format!("Connection failed: {message}"), &message);
            }
            SessionEvent::MicrophoneChanged { attempt, enabled } => {
                if current.attempt() != Some(attempt) {
                    return Transition::unchanged(current);
                }
                if enabled {
                    match next.connection_status {
                        ConnectionStatus::Connected => next.microphone_active = true,
                        _ => next.resume_microphone = true,
                    }
                    system_line(&mut next, "Microphone enabled");
                } else {
                    next.microphone_active = false;
                    next.resume_microphone = false;
                    system_line(&mut next, "Microphone disabled");
                }
            }
            SessionEvent::MicrophoneFailed { enabling, message } => {
                let action = if enabling { "start" } else { "stop" };
                record_error(
                    &mut next,
                    format!("Microphone error: {message}"),
                    &format!("Failed to {action} mic: {message}"),
                );
            }
            SessionEvent::ManualDisconnect { attempt } => {
                match current.attempt() {
                    Some(active) if active == attempt => clear_room(&mut next),
                    Some(active) => {
                        debug!("Ignoring disconnect of {}, room {} is active", attempt, active);
                        return Transition::unchanged(current);
                    }
                    None => {}
                }
                media.push(MediaCommand::ClearAll);
                system_line(&mut next, "Manually disconnected");
            }
            SessionEvent::DisconnectFailed { message } => {
                next.transcript
                    .push(format!("[Error] Disconnect failed: {message}"));
            }
            SessionEvent::ClearTranscript => {
                next.transcript.clear();
            }
            SessionEvent::Note(text) => {
                system_line(&mut next, &text);
            }
        }

        Transition { state: next, media }
    }

    fn apply_room_event(
        &self,
        next: &mut SessionState,
        media: &mut Vec<MediaCommand>,
        event: RoomEvent,
    ) {
        match event {
            RoomEvent::Connected => {
                next.connection_status = ConnectionStatus::Connected;
                next.connected_at.get_or_insert_with(Utc::now);
                system_line(next, "Connected");
            }
            RoomEvent::Disconnected => {
                clear_room(next);
                media.push(MediaCommand::ClearAll);
                system_line(next, "Disconnected");
            }
            RoomEvent::Reconnecting => {
                next.connection_status = ConnectionStatus::Reconnecting;
                if next.microphone_active {
                    next.microphone_active = false;
                    next.resume_microphone = true;
                }
                system_line(next, "Reconnecting...");
            }
            RoomEvent::Reconnected => {
                next.connection_status = ConnectionStatus::Connected;
                if next.resume_microphone {
                    next.microphone_active = true;
                    next.resume_microphone = false;
                }
                system_line(next, "Reconnected");
            }
            RoomEvent::ParticipantJoined(participant) => {
                system_line(next, &format!("{} joined", participant.identity));
            }
            RoomEvent::TrackSubscribed { track, participant } => {
                debug!(
                    "Track subscribed: {:?} from {}",
                    track.kind, participant.identity
                );
                if track.is_audio() {
                    media.push(MediaCommand::Attach { track, participant });
                }
            }
            RoomEvent::TrackUnsubscribed { track, participant } => {
                debug!(
                    "Track unsubscribed: {:?} from {}",
                    track.kind, participant.identity
                );
                media.push(MediaCommand::Detach {
                    track_sid: track.sid,
                });
            }
            RoomEvent::DataReceived {
                payload,
                participant,
            } => {
                let text = String::from_utf8_lossy(&payload);
                let speaker = participant
                    .as_ref()
                    .map(|p| p.identity.as_str())
                    .unwrap_or(self.agent_label.as_str());
                next.transcript.push(format!("{speaker}: {text}"));
            }
            RoomEvent::ConnectionStateChanged(state) => {
                debug!("Connection state: {:?}", state);
            }
        }
    }
}

fn system_line(state: &mut SessionState, text: &str) {
    state.transcript.push(format!("[System] {text}"));
}

fn record_error(state: &mut SessionState, banner: String, line: &str) {
    state.last_error = Some(banner);
    state.transcript.push(format!("[Error] {line}"));
}

fn clear_room(state: &mut SessionState) {
    state.connection_status = ConnectionStatus::Disconnected;
    state.active_room = None;
    state.microphone_active = false;
    state.resume_microphone = false;
    state.connected_at = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::{
        LoopbackRoomFactory, Room, RoomEventSender, RoomFactory, RoomOptions, TrackKind,
    };
    use std::sync::Arc;

    fn handle(attempt: u64) -> RoomHandle {
        let room: Arc<dyn Room> = LoopbackRoomFactory::new("agent")
            .create(RoomOptions::default(), RoomEventSender::new(|_| {}));
        RoomHandle::new(AttemptId(attempt), room, "jarvis-room")
    }

    fn run(bridge: &EventBridge, state: SessionState, events: Vec<SessionEvent>) -> Transition {
        let mut transition = Transition::unchanged(&state);
        for event in events {
            let next = bridge.reduce(&transition.state, event);
            transition.media.extend(next.media);
            transition.state = next.state;
        }
        transition
    }

    fn room(attempt: u64, event: RoomEvent) -> SessionEvent {
        SessionEvent::Room {
            attempt: AttemptId(attempt),
            event,
        }
    }

    fn connected(bridge: &EventBridge) -> SessionState {
        run(
            bridge,
            SessionState::default(),
            vec![
                SessionEvent::ConnectRequested,
                SessionEvent::RoomCreated(handle(1)),
                room(1, RoomEvent::Connected),
            ],
        )
        .state
    }

    #[test]
    fn test_connect_sequence_reaches_connected() {
        let bridge = EventBridge::default();
        let state = connected(&bridge);

        assert_eq!(state.connection_status, ConnectionStatus::Connected);
        assert_eq!(state.attempt(), Some(AttemptId(1)));
        assert!(state.connected_at.is_some());
        assert_eq!(state.transcript, vec!["[System] Connected"]);
    }

    #[test]
    fn test_room_created_sets_connecting() {
        let bridge = EventBridge::default();
        let t = bridge.reduce(&SessionState::default(), SessionEvent::RoomCreated(handle(3)));
        assert_eq!(t.state.connection_status, ConnectionStatus::Connecting);
        assert!(t.state.active_room.is_some());
    }

    #[test]
    fn test_reconnect_cycle_keeps_order() {
        let bridge = EventBridge::default();
        let state = connected(&bridge);

        let reconnecting = bridge.reduce(&state, room(1, RoomEvent::Reconnecting)).state;
        assert_eq!(reconnecting.connection_status, ConnectionStatus::Reconnecting);

        let reconnected = bridge
            .reduce(&reconnecting, room(1, RoomEvent::Reconnected))
            .state;
        assert_eq!(reconnected.connection_status, ConnectionStatus::Connected);
        assert_eq!(
            reconnected.transcript,
            vec![
                "[System] Connected",
                "[System] Reconnecting...",
                "[System] Reconnected"
            ]
        );
    }

    #[test]
    fn test_microphone_suspended_while_reconnecting() {
        let bridge = EventBridge::default();
        let state = run(
            &bridge,
            connected(&bridge),
            vec![SessionEvent::MicrophoneChanged {
                attempt: AttemptId(1),
                enabled: true,
            }],
        )
        .state;
        assert!(state.microphone_active);

        let reconnecting = bridge.reduce(&state, room(1, RoomEvent::Reconnecting)).state;
        assert!(!reconnecting.microphone_active);
        assert!(reconnecting.microphone_requested());

        let back = bridge
            .reduce(&reconnecting, room(1, RoomEvent::Reconnected))
            .state;
        assert!(back.microphone_active);
        assert!(!back.resume_microphone);
    }

    #[test]
    fn test_disconnected_event_clears_everything() {
        let bridge = EventBridge::default();
        let state = run(
            &bridge,
            connected(&bridge),
            vec![SessionEvent::MicrophoneChanged {
                attempt: AttemptId(1),
                enabled: true,
            }],
        )
        .state;

        let t = bridge.reduce(&state, room(1, RoomEvent::Disconnected));

        assert_eq!(t.state.connection_status, ConnectionStatus::Disconnected);
        assert!(!t.state.microphone_active);
        assert!(t.state.active_room.is_none());
        assert_eq!(t.media, vec![MediaCommand::ClearAll]);
        assert_eq!(
            t.state.transcript.last().map(String::as_str),
            Some("[System] Disconnected")
        );
    }

    #[test]
    fn test_stale_attempt_events_are_dropped() {
        let bridge = EventBridge::default();
        let state = connected(&bridge);

        let t = bridge.reduce(&state, room(7, RoomEvent::Disconnected));

        assert_eq!(t.state.connection_status, ConnectionStatus::Connected);
        assert!(t.media.is_empty());
        assert_eq!(t.state.transcript.len(), 1);
    }

    #[test]
    fn test_participant_joined_line() {
        let bridge = EventBridge::default();
        let t = bridge.reduce(
            &connected(&bridge),
            room(1, RoomEvent::ParticipantJoined(Participant::new("agent-1"))),
        );
        assert_eq!(
            t.state.transcript.last().map(String::as_str),
            Some("[System] agent-1 joined")
        );
    }

    #[test]
    fn test_data_received_uses_identity_or_label() {
        let bridge = EventBridge::new("Jarvis");
        let state = connected(&bridge);

        let t = bridge.reduce(
            &state,
            room(
                1,
                RoomEvent::DataReceived {
                    payload: b"hello".to_vec(),
                    participant: Some(Participant::new("agent-1")),
                },
            ),
        );
        assert_eq!(t.state.transcript.last().map(String::as_str), Some("agent-1: hello"));

        let t = bridge.reduce(
            &t.state,
            room(
                1,
                RoomEvent::DataReceived {
                    payload: vec![0x68, 0x69, 0xff],
                    participant: None,
                },
            ),
        );
        assert_eq!(
            t.state.transcript.last().map(String::as_str),
            Some("Jarvis: hi\u{fffd}")
        );
    }

    #[test]
    fn test_track_events_become_media_commands() {
        let bridge = EventBridge::default();
        let state = connected(&bridge);
        let agent = Participant::new("agent-1");

        let audio = bridge.reduce(
            &state,
            room(
                1,
                RoomEvent::TrackSubscribed {
                    track: RemoteTrack::audio("TR_a"),
                    participant: agent.clone(),
                },
            ),
        );
        assert_eq!(
            audio.media,
            vec![MediaCommand::Attach {
                track: RemoteTrack::audio("TR_a"),
                participant: agent.clone(),
            }]
        );
        assert_eq!(audio.state.transcript, state.transcript);

        let video = bridge.reduce(
            &state,
            room(
                1,
                RoomEvent::TrackSubscribed {
                    track: RemoteTrack {
                        sid: "TR_v".to_string(),
                        kind: TrackKind::Video,
                    },
                    participant: agent.clone(),
                },
            ),
        );
        assert!(video.media.is_empty());

        let gone = bridge.reduce(
            &state,
            room(
                1,
                RoomEvent::TrackUnsubscribed {
                    track: RemoteTrack::audio("TR_a"),
                    participant: agent,
                },
            ),
        );
        assert_eq!(
            gone.media,
            vec![MediaCommand::Detach {
                track_sid: "TR_a".to_string()
            }]
        );
    }

    #[test]
    fn test_connection_state_changed_is_diagnostic_only() {
        let bridge = EventBridge::default();
        let state = connected(&bridge);
        let t = bridge.reduce(
            &state,
            room(
                1,
                RoomEvent::ConnectionStateChanged(crate::room::ConnectionState::Reconnecting),
            ),
        );
        assert_eq!(t.state.connection_status, ConnectionStatus::Connected);
        assert_eq!(t.state.transcript, state.transcript);
        assert!(t.media.is_empty());
    }

    #[test]
    fn test_token_failure_keeps_disconnected() {
        let bridge = EventBridge::default();
        let t = run(
            &bridge,
            SessionState::default(),
            vec![
                SessionEvent::ConnectRequested,
                SessionEvent::TokenFailed {
                    message: "Failed to get token: 500".to_string(),
                },
            ],
        );

        assert_eq!(t.state.connection_status, ConnectionStatus::Disconnected);
        assert_eq!(
            t.state.last_error.as_deref(),
            Some("Connection failed: Failed to get token: 500")
        );
        assert_eq!(t.state.transcript, vec!["[Error] Failed to get token: 500"]);
    }

    #[test]
    fn test_next_attempt_clears_last_error() {
        let bridge = EventBridge::default();
        let t = run(
            &bridge,
            SessionState::default(),
            vec![
                SessionEvent::TokenFailed {
                    message: "boom".to_string(),
                },
                SessionEvent::ConnectRequested,
            ],
        );
        assert!(t.state.last_error.is_none());
        assert_eq!(t.state.transcript.len(), 1);
    }

    #[test]
    fn test_join_failure_drops_room() {
        let bridge = EventBridge::default();
        let t = run(
            &bridge,
            SessionState::default(),
            vec![
                SessionEvent::RoomCreated(handle(2)),
                SessionEvent::ConnectFailed {
                    attempt: AttemptId(2),
                    message: "signal timeout".to_string(),
                },
            ],
        );

        assert_eq!(t.state.connection_status, ConnectionStatus::Disconnected);
        assert!(t.state.active_room.is_none());
        assert_eq!(t.state.transcript, vec!["[Error] signal timeout"]);
    }

    #[test]
    fn test_microphone_failure_lines() {
        let bridge = EventBridge::default();
        let t = bridge.reduce(
            &connected(&bridge),
            SessionEvent::MicrophoneFailed {
                enabling: true,
                message: "permission denied".to_string(),
            },
        );

        assert_eq!(t.state.connection_status, ConnectionStatus::Connected);
        assert_eq!(
            t.state.last_error.as_deref(),
            Some("Microphone error: permission denied")
        );
        assert_eq!(
            t.state.transcript.last().map(String::as_str),
            Some("[Error] Failed to start mic: permission denied")
        );
    }

    #[test]
    fn test_manual_disconnect_clears_room_and_media() {
        let bridge = EventBridge::default();
        let t = bridge.reduce(
            &connected(&bridge),
            SessionEvent::ManualDisconnect {
                attempt: AttemptId(1),
            },
        );

        assert_eq!(t.state.connection_status, ConnectionStatus::Disconnected);
        assert!(t.state.active_room.is_none());
        assert_eq!(t.media, vec![MediaCommand::ClearAll]);
        assert_eq!(
            t.state.transcript.last().map(String::as_str),
            Some("[System] Manually disconnected")
        );
    }

    #[test]
    fn test_late_manual_disconnect_spares_newer_room() {
        let bridge = EventBridge::default();
        let state = run(
            &bridge,
            connected(&bridge),
            vec![
                room(1, RoomEvent::Disconnected),
                SessionEvent::ConnectRequested,
                SessionEvent::RoomCreated(handle(2)),
                room(2, RoomEvent::Connected),
            ],
        )
        .state;

        let t = bridge.reduce(
            &state,
            SessionEvent::ManualDisconnect {
                attempt: AttemptId(1),
            },
        );

        assert!(t.media.is_empty());
        assert_eq!(t.state.attempt(), Some(AttemptId(2)));
        assert!(t.state.is_connected());
        assert_eq!(t.state.transcript, state.transcript);
    }

    #[test]
    fn test_manual_disconnect_after_remote_leave_still_reports() {
        let bridge = EventBridge::default();
        let state = bridge
            .reduce(&connected(&bridge), room(1, RoomEvent::Disconnected))
            .state;

        let t = bridge.reduce(
            &state,
            SessionEvent::ManualDisconnect {
                attempt: AttemptId(1),
            },
        );

        assert_eq!(t.media, vec![MediaCommand::ClearAll]);
        assert_eq!(
            t.state.transcript.last().map(String::as_str),
            Some("[System] Manually disconnected")
        );
    }

    #[test]
    fn test_connecting_flag_follows_attempt() {
        let bridge = EventBridge::default();
        let requested = bridge
            .reduce(&SessionState::default(), SessionEvent::ConnectRequested)
            .state;
        assert!(requested.connecting);

        let connected = bridge
            .reduce(&requested, SessionEvent::RoomCreated(handle(1)))
            .state;
        let connected = bridge.reduce(&connected, room(1, RoomEvent::Connected)).state;
        assert!(connected.connecting);

        let settled = bridge.reduce(&connected, SessionEvent::ConnectSettled).state;
        assert!(!settled.connecting);
        assert!(settled.is_connected());
        assert_eq!(settled.transcript, connected.transcript);
    }

    #[test]
    fn test_clear_transcript_is_the_only_reset() {
        let bridge = EventBridge::default();
        let t = bridge.reduce(&connected(&bridge), SessionEvent::ClearTranscript);
        assert!(t.state.transcript.is_empty());
        assert!(t.state.is_connected());
    }

    #[test]
    fn test_reduce_does_not_touch_input() {
        let bridge = EventBridge::default();
        let state = connected(&bridge);
        let before = state.transcript.clone();

        let _ = bridge.reduce(&state, SessionEvent::Note("Connecting...".to_string()));

        assert_eq!(state.transcript, before);
    }
}
