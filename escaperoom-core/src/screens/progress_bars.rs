//! Puzzle 2: per-player progress bars, error flashes, and the alarm cycle.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use smallvec::SmallVec;

use crate::audio::Sound;
use crate::delta::{Delta, as_whole_number, js_number, truthy};
use crate::engine::{Effects, Expiry, Flow, Screen, Undo};
use crate::timer::TimerKey;

pub const TOTAL_STEPS: i64 = 5;
const ERROR_FLASH_MS: u32 = 4000;
const ALARM_TOGGLE_MS: u32 = 1000;
const ALARM_FLASH_MS: u32 = 5000;
const ERROR_FLASH: &str = "error-flash";

const ALARM_TOGGLE: TimerKey = TimerKey::fixed("alarm-toggle");
const ALARM_STOP: TimerKey = TimerKey::fixed("alarm-stop");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressBarsTargets {
    pub image: String,
    pub body: String,
    pub normal_image: String,
    pub alarm_image: String,
}

impl Default for ProgressBarsTargets {
    fn default() -> Self {
        Self {
            image: "#image-area img".to_string(),
            body: "body".to_string(),
            normal_image: "/static/images/puzzle2/Laberint.png".to_string(),
            alarm_image: "/static/images/puzzle2/LaberintVermell.png".to_string(),
        }
    }
}

impl ProgressBarsTargets {
    fn bar(player: u32) -> String {
        format!("#bar-player-{player}")
    }

    fn row(player: u32) -> String {
        format!(r#".player-row[data-player="{player}"]"#)
    }

    /// Every element that lights up when `player` makes a mistake.
    fn flash_targets(player: u32) -> [String; 4] {
        let row = Self::row(player);
        [
            Self::bar(player),
            format!("{row} .bar-outer"),
            format!("{row} .player-label"),
            row,
        ]
    }
}

#[derive(Debug, Default)]
pub struct ProgressBars {
    targets: ProgressBarsTargets,
    progress: BTreeMap<u32, i64>,
    flashing: BTreeSet<u32>,
    queued: Option<Vec<(u32, i64)>>,
    alarm_on: bool,
}

fn player_entry(value: &Value) -> Option<(u32, i64)> {
    let player = value.get("player").and_then(as_whole_number)?;
    let progress = value.get("progress").and_then(as_whole_number)?;
    Some((u32::try_from(player).ok()?, progress))
}

fn player_list(value: &Value) -> Vec<(u32, i64)> {
    value
        .as_array()
        .map(|players| players.iter().filter_map(player_entry).collect())
        .unwrap_or_default()
}

impl ProgressBars {
    #[must_use]
    pub fn new(targets: ProgressBarsTargets) -> Self {
        Self {
            targets,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn progress(&self, player: u32) -> Option<i64> {
        self.progress.get(&player).copied()
    }

    #[must_use]
    pub fn in_error_block(&self) -> bool {
        !self.flashing.is_empty()
    }

    fn set_progress(&mut self, fx: &mut Effects<'_>, player: u32, progress: i64) {
        self.progress.insert(player, progress);
        #[allow(clippy::cast_precision_loss)]
        let pct = progress as f64 / TOTAL_STEPS as f64 * 100.0;
        let bar = ProgressBarsTargets::bar(player);
        let surface = fx.surface();
        surface.set_style(&bar, "width", &format!("{}%", js_number(pct)));
        surface.set_text(
            &format!("{bar} .bar-text"),
            &format!("{progress} / {TOTAL_STEPS}"),
        );
        surface.set_class(&bar, "complete", progress >= TOTAL_STEPS);
    }

    fn apply_players(&mut self, fx: &mut Effects<'_>, players: &[(u32, i64)]) {
        for &(player, progress) in players {
            self.set_progress(fx, player, progress);
        }
    }

    fn start_error_flash(&mut self, fx: &mut Effects<'_>, player: u32) {
        self.flashing.insert(player);
        let targets = ProgressBarsTargets::flash_targets(player);
        let expiry: Expiry = targets
            .iter()
            .map(|target| Undo::remove_class(target, ERROR_FLASH))
            .collect::<SmallVec<_>>();
        fx.flash(
            TimerKey::indexed(ERROR_FLASH, player),
            ERROR_FLASH_MS,
            |surface| {
                for target in &targets {
                    surface.set_class(target, ERROR_FLASH, true);
                }
            },
            expiry,
        );
    }

    fn set_alarm(&mut self, fx: &mut Effects<'_>, on: bool) {
        self.alarm_on = on;
        let image = if on {
            &self.targets.alarm_image
        } else {
            &self.targets.normal_image
        };
        let surface = fx.surface();
        surface.set_attr(&self.targets.image, "src", image);
        surface.set_class(&self.targets.body, "alarm-mode", on);
    }

    fn start_alarm_flash(&mut self, fx: &mut Effects<'_>) {
        self.set_alarm(fx, true);
        fx.start_interval(ALARM_TOGGLE, ALARM_TOGGLE_MS);
        fx.start_timer(ALARM_STOP, ALARM_FLASH_MS);
    }

    fn stop_alarm_flash(fx: &mut Effects<'_>) {
        fx.cancel_timer(&ALARM_TOGGLE);
        fx.cancel_timer(&ALARM_STOP);
    }
}

impl Screen for ProgressBars {
    const PUZZLE_ID: u8 = 2;
    const PRECEDENCE: &'static [&'static str] = &[
        "error_reset",
        "player_update",
        "players",
        "play_alarm_sound",
        "play_normal_sound",
        "alarm_mode",
    ];

    fn admit(&mut self, delta: &Delta, _fx: &mut Effects<'_>) -> Flow {
        if !self.in_error_block() {
            return Flow::Continue;
        }
        if let Some(players) = delta.get("players") {
            self.queued = Some(player_list(players));
        }
        Flow::Stop
    }

    fn apply_field(
        &mut self,
        field: &str,
        value: &Value,
        delta: &Delta,
        fx: &mut Effects<'_>,
    ) -> Flow {
        match field {
            "error_reset" if truthy(value) => {
                fx.play(Sound::Incorrect);
                if let Some(players) = delta.get("players") {
                    self.queued = Some(player_list(players));
                }
                match value
                    .get("player")
                    .and_then(as_whole_number)
                    .and_then(|p| u32::try_from(p).ok())
                {
                    Some(player) => self.start_error_flash(fx, player),
                    None => log::warn!("error_reset without a player: {value}"),
                }
                return Flow::Stop;
            }
            "player_update" => {
                if let Some((player, progress)) = player_entry(value) {
                    if progress > 0 && progress < TOTAL_STEPS {
                        fx.play(Sound::Correct);
                    } else if progress == TOTAL_STEPS {
                        fx.play(Sound::PhaseComplete);
                    }
                    self.set_progress(fx, player, progress);
                }
            }
            "players" => {
                let players = player_list(value);
                self.apply_players(fx, &players);
            }
            "play_alarm_sound" => {
                if let Some(url) = value.get("url").and_then(Value::as_str) {
                    fx.play_url(url);
                }
                self.start_alarm_flash(fx);
            }
            "play_normal_sound" => {
                if let Some(url) = value.get("url").and_then(Value::as_str) {
                    fx.play_url(url);
                }
                Self::stop_alarm_flash(fx);
            }
            "alarm_mode" => {
                Self::stop_alarm_flash(fx);
                self.set_alarm(fx, truthy(value));
            }
            _ => {}
        }
        Flow::Continue
    }

    fn on_timer(&mut self, key: &TimerKey, fx: &mut Effects<'_>) {
        if *key == ALARM_TOGGLE {
            let on = !self.alarm_on;
            self.set_alarm(fx, on);
        } else if *key == ALARM_STOP {
            fx.cancel_timer(&ALARM_TOGGLE);
        } else if let Some(player) = key
            .index_of(ERROR_FLASH)
            .and_then(|p| p.parse::<u32>().ok())
        {
            self.flashing.remove(&player);
            if self.flashing.is_empty()
                && let Some(players) = self.queued.take()
            {
                self.apply_players(fx, &players);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn player_entries_ignore_incomplete_rows() {
        let players = player_list(&json!([
            {"player": 1, "progress": 3},
            {"player": 2},
            {"player": 3, "progress": 5.0}
        ]));
        assert_eq!(players, vec![(1, 3), (3, 5)]);
    }

    #[test]
    fn flash_targets_cover_bar_row_and_label() {
        let targets = ProgressBarsTargets::flash_targets(4);
        assert_eq!(targets[0], "#bar-player-4");
        assert_eq!(targets[1], r#".player-row[data-player="4"] .bar-outer"#);
        assert_eq!(targets[3], r#".player-row[data-player="4"]"#);
    }
}
