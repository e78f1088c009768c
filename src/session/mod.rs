//! Voice session: connection life cycle, event mapping and view state.
//!
//! `SessionController` drives the room, `EventBridge` turns every room event
//! and controller outcome into a new `SessionState`, and the media sink keeps
//! remote audio attached while it is subscribed.

pub mod bridge;
pub mod controller;
pub mod error;
pub mod state;

pub use bridge::{EventBridge, MediaCommand, SessionEvent, Transition};
pub use controller::{ConnectOutcome, SessionController, SessionSettings};
pub use error::SessionError;
pub use state::{AttemptId, ConnectionStatus, RoomHandle, SessionSnapshot, SessionState};
