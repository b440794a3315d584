//! Screen catalog: endpoints, sound bank, and per-puzzle completion rules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::Sound;
use crate::outbound::Notification;

const EMBEDDED_CATALOG: &str = include_str!("../static/config/screens.json");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no screen configured for puzzle {0}")]
    UnknownPuzzle(u8),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub stream: String,
    pub snapshot: String,
    /// `{id}` is replaced by the puzzle id.
    pub start_puzzle: String,
    pub timer_expired: String,
    pub sample_finished: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            stream: "/state_stream".to_string(),
            snapshot: "/current_state".to_string(),
            start_puzzle: "/start_puzzle/{id}".to_string(),
            timer_expired: "/timer_expired".to_string(),
            sample_finished: "/puzzle4_sample_finished".to_string(),
        }
    }
}

impl Endpoints {
    #[must_use]
    pub fn path_for(&self, notification: Notification) -> String {
        match notification {
            Notification::PuzzleStarted(id) => self.start_puzzle.replace("{id}", &id.to_string()),
            Notification::TimerExpired => self.timer_expired.clone(),
            Notification::SampleFinished => self.sample_finished.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundBank {
    pub button: String,
    pub correct: String,
    pub incorrect: String,
    pub phase_complete: String,
    pub phase_failed: String,
    pub puzzle_complete: String,
    pub countdown_beep: String,
}

impl Default for SoundBank {
    fn default() -> Self {
        let effect = |file: &str| format!("/static/audios/effects/{file}");
        Self {
            button: effect("boto.wav"),
            correct: effect("correcte.wav"),
            incorrect: effect("incorrecte.wav"),
            phase_complete: effect("fase_completada.wav"),
            phase_failed: effect("fase_nocompletada.wav"),
            puzzle_complete: effect("nivel_completado.wav"),
            countdown_beep: effect("beep_countdown.wav"),
        }
    }
}

impl SoundBank {
    #[must_use]
    pub fn url(&self, sound: Sound) -> &str {
        match sound {
            Sound::Button => &self.button,
            Sound::Correct => &self.correct,
            Sound::Incorrect => &self.incorrect,
            Sound::PhaseComplete => &self.phase_complete,
            Sound::PhaseFailed => &self.phase_failed,
            Sound::PuzzleComplete => &self.puzzle_complete,
            Sound::CountdownBeep => &self.countdown_beep,
        }
    }
}

/// What the first channel open triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenPolicy {
    pub fetch_snapshot: bool,
    pub notify_start: bool,
}

impl Default for OpenPolicy {
    fn default() -> Self {
        Self {
            fetch_snapshot: false,
            notify_start: true,
        }
    }
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenConfig {
    pub puzzle_id: u8,
    pub completion_url: String,
    pub completion_delay_ms: u32,
    #[serde(default = "default_true")]
    pub completion_sound: bool,
    #[serde(default)]
    pub open: OpenPolicy,
}

impl ScreenConfig {
    #[must_use]
    pub fn new(puzzle_id: u8) -> Self {
        Self {
            puzzle_id,
            completion_url: format!("/puzzleSuperat/{puzzle_id}"),
            completion_delay_ms: 1000,
            completion_sound: true,
            open: OpenPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenCatalog {
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub sounds: SoundBank,
    #[serde(default)]
    pub screens: Vec<ScreenConfig>,
}

impl ScreenCatalog {
    /// Parse a catalog document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a catalog.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Catalog bundled with the crate; falls back to defaults if it fails to parse.
    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(EMBEDDED_CATALOG).unwrap_or_else(|err| {
            log::error!("embedded screen catalog is invalid: {err}");
            Self::default()
        })
    }

    /// Configuration of one puzzle screen.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPuzzle`] when the id is not in the catalog.
    pub fn screen(&self, puzzle_id: u8) -> Result<&ScreenConfig, ConfigError> {
        self.screens
            .iter()
            .find(|screen| screen.puzzle_id == puzzle_id)
            .ok_or(ConfigError::UnknownPuzzle(puzzle_id))
    }
}
