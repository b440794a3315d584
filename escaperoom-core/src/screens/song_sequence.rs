//! Puzzle 4: players reproduce two songs note by note; sample playback is
//! driven by the server and acknowledged when it finishes.

use serde_json::Value;
use smallvec::SmallVec;

use crate::delta::{Delta, truthy};
use crate::engine::{Effects, Expiry, Flow, Screen, Undo};
use crate::outbound::Notification;
use crate::timer::TimerKey;

const BOXES_PER_SONG: usize = 8;
const SEQUENCE_FLASH_MS: u32 = 10_000;
const SEQUENCE_FLASH: TimerKey = TimerKey::fixed("sequence-flash");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongSequenceTargets {
    pub status: String,
    pub status_text: String,
    pub streak: String,
    pub first_song: String,
    pub second_song: String,
}

impl Default for SongSequenceTargets {
    fn default() -> Self {
        Self {
            status: "#p4-status".to_string(),
            status_text: "#status-text".to_string(),
            streak: "#streak".to_string(),
            first_song: "#streak1-container".to_string(),
            second_song: "#streak2-container".to_string(),
        }
    }
}

fn progress_box(container: &str, index: usize) -> String {
    format!("{container} .progress-box:nth-child({})", index + 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Song {
    #[default]
    First,
    Second,
}

#[derive(Debug, Default)]
pub struct SongSequence {
    targets: SongSequenceTargets,
    sample_playing: Option<String>,
    showing_completion: bool,
    active: Song,
}

impl SongSequence {
    #[must_use]
    pub fn new(targets: SongSequenceTargets) -> Self {
        Self {
            targets,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sample_playing(&self) -> Option<&str> {
        self.sample_playing.as_deref()
    }

    fn container(&self, song: Song) -> &str {
        match song {
            Song::First => &self.targets.first_song,
            Song::Second => &self.targets.second_song,
        }
    }

    fn set_listening(&self, fx: &mut Effects<'_>) {
        let surface = fx.surface();
        surface.set_text(&self.targets.status, "Listening");
        surface.set_attr(&self.targets.status, "class", "status listening");
    }

    fn update_status(&self, fx: &mut Effects<'_>, storing: bool, playing_sample: bool) {
        let target = &self.targets.status_text;
        let surface = fx.surface();
        let (text, storing_on, playing_on) = if playing_sample {
            ("Reproduciendo muestra", false, true)
        } else if storing {
            ("Estado: Registrando", true, false)
        } else {
            ("Estado: No se está registrando", false, false)
        };
        surface.set_text(target, text);
        surface.set_class(target, "storing", storing_on);
        surface.set_class(target, "playing-sample", playing_on);
    }

    fn show_streak(&self, fx: &mut Effects<'_>, streak: i64, total: i64) {
        let current = if streak >= total { total } else { streak.saturating_add(1) };
        fx.surface()
            .set_text(&self.targets.streak, &format!("{current}/{total}"));
    }

    fn render_boxes(&mut self, fx: &mut Effects<'_>, streak: i64, played: &[String]) {
        for song in [Song::First, Song::Second] {
            let container = self.container(song).to_string();
            for index in 0..BOXES_PER_SONG {
                let cell = progress_box(&container, index);
                fx.surface().set_class(&cell, "filled", false);
                fx.surface().set_text(&cell, "");
            }
        }
        self.active = if streak <= 0 { Song::First } else { Song::Second };
        let (shown, hidden) = match self.active {
            Song::First => (Song::First, Song::Second),
            Song::Second => (Song::Second, Song::First),
        };
        let shown = self.container(shown).to_string();
        let hidden = self.container(hidden).to_string();
        fx.surface().set_style(&shown, "display", "flex");
        fx.surface().set_style(&hidden, "display", "none");

        if streak >= 2 {
            for index in 0..BOXES_PER_SONG {
                fx.surface()
                    .set_class(&progress_box(&shown, index), "filled", true);
            }
            return;
        }
        for (index, code) in played.iter().take(BOXES_PER_SONG).enumerate() {
            let cell = progress_box(&shown, index);
            fx.surface().set_text(&cell, code);
            fx.surface().set_class(&cell, "filled", true);
        }
    }

    fn flash_sequence(&self, fx: &mut Effects<'_>, correct: bool) {
        let class = if correct { "flash-correct" } else { "flash-wrong" };
        let container = self.container(self.active);
        let cells: Vec<String> = (0..BOXES_PER_SONG)
            .map(|index| progress_box(container, index))
            .collect();
        let expiry: Expiry = cells
            .iter()
            .map(|cell| Undo::remove_class(cell, class))
            .collect::<SmallVec<_>>();
        fx.flash(
            SEQUENCE_FLASH,
            SEQUENCE_FLASH_MS,
            |surface| {
                for cell in &cells {
                    surface.set_class(cell, class, true);
                }
            },
            expiry,
        );
    }

    fn start_sample(&mut self, fx: &mut Effects<'_>, url: &str) {
        if self.sample_playing.as_deref() == Some(url) && fx.is_playing(url) {
            log::debug!("sample {url} already playing");
            return;
        }
        log::info!("playing sample {url}");
        self.sample_playing = Some(url.to_string());
        fx.play_url(url);
    }
}

fn played_sequence(delta: &Delta) -> Vec<String> {
    delta
        .array_field("played_sequence")
        .map(|codes| {
            codes
                .iter()
                .map(|c| c.as_str().map_or_else(|| c.to_string(), str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

impl Screen for SongSequence {
    const PUZZLE_ID: u8 = 4;
    const PRECEDENCE: &'static [&'static str] = &[
        "listening",
        "total_required",
        "sample_song",
        "playing_sample",
        "show_completion",
        "storing",
        "sequence_correct",
        "streak",
        "play",
    ];

    fn mount(&mut self, fx: &mut Effects<'_>) {
        self.set_listening(fx);
        self.update_status(fx, false, false);
        self.render_boxes(fx, 0, &[]);
        fx.surface().set_text(&self.targets.streak, "1/2");
    }

    fn apply_field(
        &mut self,
        field: &str,
        value: &Value,
        delta: &Delta,
        fx: &mut Effects<'_>,
    ) -> Flow {
        match field {
            "listening" if truthy(value) => self.set_listening(fx),
            "total_required" => {
                if let (Some(streak), Some(total)) =
                    (delta.i64_field("streak"), delta.i64_field("total_required"))
                {
                    self.show_streak(fx, streak, total);
                }
            }
            "sample_song" if delta.bool_field("playing_sample") => {
                if let Some(url) = value.get("url").and_then(Value::as_str) {
                    self.start_sample(fx, url);
                }
            }
            "playing_sample" => {
                if *value == Value::Bool(false) {
                    self.sample_playing = None;
                }
                if !self.showing_completion {
                    self.update_status(fx, delta.bool_field("storing"), truthy(value));
                }
            }
            "show_completion" if truthy(value) => {
                self.showing_completion = true;
                let target = &self.targets.status_text;
                let surface = fx.surface();
                surface.set_text(target, "Nivel Completado");
                surface.set_class(target, "storing", false);
                surface.set_class(target, "playing-sample", false);
                surface.set_class(target, "completed", true);
            }
            "storing" if !delta.has("playing_sample") && !self.showing_completion => {
                self.update_status(fx, truthy(value), false);
            }
            "sequence_correct" => {
                if let Some(correct) = value.as_bool() {
                    self.flash_sequence(fx, correct);
                }
            }
            "streak" if !self.showing_completion => {
                if let Some(streak) = delta.i64_field("streak") {
                    self.render_boxes(fx, streak, &played_sequence(delta));
                }
            }
            "play" => {
                if let Some(url) = value.get("url").and_then(Value::as_str) {
                    fx.play_url(url);
                }
            }
            _ => {}
        }
        Flow::Continue
    }

    fn on_terminal(&mut self, fx: &mut Effects<'_>) {
        self.showing_completion = false;
        let surface = fx.surface();
        surface.set_text(&self.targets.status, "Song Completed");
        surface.set_attr(&self.targets.status, "class", "status solved");
    }

    fn on_media_ended(&mut self, url: &str, fx: &mut Effects<'_>) {
        if self.sample_playing.as_deref() == Some(url) {
            self.sample_playing = None;
            log::info!("sample {url} finished");
            fx.notify(Notification::SampleFinished);
        }
    }
}
