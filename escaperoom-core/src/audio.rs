//! Single shared playback channel per screen.

use serde::{Deserialize, Serialize};

/// Host playback device. One element per screen.
pub trait AudioSink {
    fn play(&mut self, url: &str);
    fn stop(&mut self);
}

/// Effect cues shared by every screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sound {
    Button,
    Correct,
    Incorrect,
    PhaseComplete,
    PhaseFailed,
    PuzzleComplete,
    CountdownBeep,
}

/// Playback state. Starting a cue replaces the one in flight; cues refused by
/// the autoplay policy wait for an unlock instead of being retried.
#[derive(Debug, Default)]
pub struct AudioChannel {
    in_flight: Option<String>,
    pending: Option<String>,
    locked: bool,
    blocked_until_ms: i64,
    deferred: Option<String>,
}

impl AudioChannel {
    pub fn play(&mut self, sink: &mut dyn AudioSink, url: &str) {
        if self.locked {
            log::debug!("audio locked, parking {url}");
            self.pending = Some(url.to_string());
            return;
        }
        if self.in_flight.is_some() {
            sink.stop();
        }
        sink.play(url);
        self.in_flight = Some(url.to_string());
    }

    pub fn stop(&mut self, sink: &mut dyn AudioSink) {
        if self.in_flight.take().is_some() {
            sink.stop();
        }
        self.pending = None;
        self.deferred = None;
    }

    #[must_use]
    pub fn is_playing(&self, url: &str) -> bool {
        self.in_flight.as_deref() == Some(url)
    }

    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    #[must_use]
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// The host refused to start `url` (autoplay policy).
    pub fn on_rejected(&mut self, url: &str) {
        self.locked = true;
        if self.in_flight.as_deref() == Some(url) {
            self.in_flight = None;
            self.pending = Some(url.to_string());
        } else if self.pending.is_none() {
            self.pending = Some(url.to_string());
        }
    }

    /// A user gesture (or muted-start fallback) allows playback again.
    pub fn on_unlocked(&mut self, sink: &mut dyn AudioSink) {
        self.locked = false;
        if let Some(url) = self.pending.take() {
            self.play(sink, &url);
        }
    }

    /// Returns whether `url` was the cue in flight.
    pub fn on_ended(&mut self, url: &str) -> bool {
        if self.in_flight.as_deref() == Some(url) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    pub fn block_until(&mut self, at_ms: i64) {
        self.blocked_until_ms = self.blocked_until_ms.max(at_ms);
    }

    /// Milliseconds left in the current block window, if any.
    #[must_use]
    pub fn blocked_for(&self, now_ms: i64) -> Option<u32> {
        let left = self.blocked_until_ms - now_ms;
        (left > 0).then(|| u32::try_from(left).unwrap_or(u32::MAX))
    }

    pub fn defer(&mut self, url: &str) {
        self.deferred = Some(url.to_string());
    }

    pub fn take_deferred(&mut self) -> Option<String> {
        self.deferred.take()
    }
}
