//! Playback of remote audio tracks.
//!
//! Every subscribed audio track gets a playback element from the configured
//! backend. The sink owns those elements until the track goes away or the
//! session ends.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::room::{Participant, RemoteTrack};

/// A live output bound to one remote track.
pub trait PlaybackElement: Send {
    fn set_autoplay(&mut self, autoplay: bool);

    fn set_volume(&mut self, volume: f32);

    /// Insert the element into the output graph.
    fn mount(&mut self);

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    /// Unbind from the track and remove from the output graph.
    fn release(&mut self);
}

pub trait PlaybackBackend: Send + Sync {
    fn create(&self, track: &RemoteTrack) -> Result<Box<dyn PlaybackElement>>;
}

pub struct AttachedAudioElement {
    pub track_sid: String,
    pub participant: String,
    element: Box<dyn PlaybackElement>,
}

pub struct MediaSink {
    backend: Arc<dyn PlaybackBackend>,
    attached: Vec<AttachedAudioElement>,
}

impl MediaSink {
    pub fn new(backend: Arc<dyn PlaybackBackend>) -> Self {
        Self {
            backend,
            attached: Vec::new(),
        }
    }

    pub fn attach(&mut self, track: &RemoteTrack, participant: &Participant) {
        if !track.is_audio() {
            debug!("Ignoring non-audio track {}", track.sid);
            return;
        }

        let mut element = match self.backend.create(track) {
            Ok(element) => element,
            Err(e) => {
                error!("Failed to create playback for track {}: {}", track.sid, e);
                return;
            }
        };

        element.set_autoplay(true);
        element.set_volume(1.0);
        element.mount();

        match element.play() {
            Ok(()) => info!("Audio playing from: {}", participant.identity),
            Err(e) => error!("Audio play failed for {}: {}", participant.identity, e),
        }

        self.attached.push(AttachedAudioElement {
            track_sid: track.sid.clone(),
            participant: participant.identity.clone(),
            element,
        });
    }

    /// Removes every element attached for `track_sid`. Returns how many went.
    pub fn detach(&mut self, track_sid: &str) -> usize {
        let before = self.attached.len();
        self.attached.retain_mut(|attached| {
            if attached.track_sid == track_sid {
                attached.element.release();
                false
            } else {
                true
            }
        });

        let removed = before - self.attached.len();
        debug!("Detached {} element(s) for track {}", removed, track_sid);
        removed
    }

    pub fn clear_all(&mut self) {
        if self.attached.is_empty() {
            return;
        }

        debug!("Releasing {} audio element(s)", self.attached.len());
        for mut attached in self.attached.drain(..) {
            attached.element.pause();
            attached.element.release();
        }
    }

    pub fn len(&self) -> usize {
        self.attached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }

    pub fn track_sids(&self) -> Vec<String> {
        self.attached.iter().map(|a| a.track_sid.clone()).collect()
    }
}

/// Backend that only logs element life cycle. Audio output itself is done by
/// the room library.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPlayback;

impl PlaybackBackend for TracingPlayback {
    fn create(&self, track: &RemoteTrack) -> Result<Box<dyn PlaybackElement>> {
        Ok(Box::new(TracingElement {
            track_sid: track.sid.clone(),
            volume: 0.0,
            autoplay: false,
        }))
    }
}

struct TracingElement {
    track_sid: String,
    volume: f32,
    autoplay: bool,
}

impl PlaybackElement for TracingElement {
    fn set_autoplay(&mut self, autoplay: bool) {
        self.autoplay = autoplay;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn mount(&mut self) {
        debug!("Mounted playback for {}", self.track_sid);
    }

    fn play(&mut self) -> Result<()> {
        debug!(
            "Playing {} (volume {:.1}, autoplay {})",
            self.track_sid, self.volume, self.autoplay
        );
        Ok(())
    }

    fn pause(&mut self) {
        debug!("Paused playback for {}", self.track_sid);
    }

    fn release(&mut self) {
        debug!("Released playback for {}", self.track_sid);
    }
}
