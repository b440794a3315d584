//! Puzzle 5: three timed rounds; players press at the objective time and the
//! accumulated error must stay under the round limit.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::audio::Sound;
use crate::countdown::{Countdown, format_seconds_es};
use crate::delta::{Delta, as_whole_number, js_number, truthy};
use crate::engine::{Effects, Flow, Screen};
use crate::timer::TimerKey;

const DEFAULT_OBJECTIVE: f64 = 10.0;
const WAITING_TICK: TimerKey = TimerKey::fixed("waiting-countdown");

static SECONDS_SUFFIX: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\d+\s*segundos?").ok());

/// Strip the first `N segundo(s)` from a server message so the local
/// countdown can supply its own value.
#[must_use]
pub fn countdown_base(message: &str) -> String {
    let stripped = SECONDS_SUFFIX
        .as_ref()
        .map(|re| re.replace(message, "").trim().to_string())
        .unwrap_or_default();
    if stripped.is_empty() {
        message.to_string()
    } else {
        stripped
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingRoundsTargets {
    pub objective: String,
    pub error: String,
    pub streak: String,
    pub players_section: String,
    pub error_section: String,
    pub player_boxes: usize,
}

impl Default for TimingRoundsTargets {
    fn default() -> Self {
        Self {
            objective: "#objective-text".to_string(),
            error: "#error-text".to_string(),
            streak: "#streak".to_string(),
            players_section: "#players-section".to_string(),
            error_section: "#error-section".to_string(),
            player_boxes: 10,
        }
    }
}

impl TimingRoundsTargets {
    fn player_box(&self, index: usize) -> String {
        format!("{} .player-box:nth-child({})", self.players_section, index + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoundOutcome {
    Success,
    Failure,
}

#[derive(Debug, Default)]
pub struct TimingRounds {
    targets: TimingRoundsTargets,
    round: Option<i64>,
    objective: Option<f64>,
    limit: Option<f64>,
    showed_result: bool,
    waiting: Option<(String, Countdown)>,
}

fn positive(delta: &Delta, name: &str) -> Option<f64> {
    delta.f64_field(name).filter(|v| *v != 0.0)
}

impl TimingRounds {
    #[must_use]
    pub fn new(targets: TimingRoundsTargets) -> Self {
        Self {
            targets,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn round(&self) -> Option<i64> {
        self.round
    }

    fn stop_waiting(&mut self, fx: &mut Effects<'_>) {
        self.waiting = None;
        fx.cancel_timer(&WAITING_TICK);
    }

    fn clear_boxes(&self, fx: &mut Effects<'_>) {
        for index in 0..self.targets.player_boxes {
            let cell = self.targets.player_box(index);
            fx.surface().set_class(&cell, "filled", false);
            fx.surface().set_text(&format!("{cell} .box-time"), "");
        }
    }

    fn show_error_counter(
        &self,
        fx: &mut Effects<'_>,
        total: f64,
        limit: f64,
        outcome: Option<RoundOutcome>,
    ) {
        let target = &self.targets.error;
        let surface = fx.surface();
        surface.set_text(
            target,
            &format!(
                "Total Error Acumulado: {total:.1} sec / {} sec",
                js_number(limit)
            ),
        );
        surface.set_class(target, "success-result", outcome == Some(RoundOutcome::Success));
        surface.set_class(target, "failure-result", outcome == Some(RoundOutcome::Failure));
    }

    fn show_countdown(&mut self, fx: &mut Effects<'_>, message: &str, waiting_secs: Option<i64>) {
        fx.surface()
            .set_style(&self.targets.players_section, "display", "none");
        fx.surface()
            .set_style(&self.targets.error_section, "display", "none");
        self.stop_waiting(fx);

        let base = countdown_base(message);
        match waiting_secs.filter(|secs| *secs > 0) {
            Some(secs) => {
                fx.surface().set_text(
                    &self.targets.objective,
                    &format!("{base} {}", format_seconds_es(secs)),
                );
                let countdown = Countdown::from_duration(fx.now_ms(), secs);
                self.waiting = Some((base, countdown));
                fx.start_interval(WAITING_TICK, 1000);
            }
            None => fx.surface().set_text(&self.targets.objective, message),
        }
    }

    fn tick(&mut self, fx: &mut Effects<'_>) {
        let Some((base, countdown)) = self.waiting.clone() else {
            fx.cancel_timer(&WAITING_TICK);
            return;
        };
        let left = countdown.remaining_secs(fx.now_ms());
        if left > 0 {
            fx.surface().set_text(
                &self.targets.objective,
                &format!("{base} {}", format_seconds_es(left)),
            );
            fx.play(Sound::CountdownBeep);
        } else {
            self.stop_waiting(fx);
        }
    }

    fn enter_round(&mut self, delta: &Delta, fx: &mut Effects<'_>) {
        self.stop_waiting(fx);
        self.round = delta.i64_field("round").filter(|r| *r != 0);
        self.limit = positive(delta, "limit").or(self.limit);
        self.objective = positive(delta, "objective").or(self.objective);

        fx.surface()
            .set_style(&self.targets.players_section, "display", "flex");
        fx.surface()
            .set_style(&self.targets.error_section, "display", "block");
        if let (Some(_), Some(objective)) = (self.round, self.objective) {
            fx.surface().set_text(
                &self.targets.objective,
                &format!("OBJETIVO: {} sec", js_number(objective)),
            );
        }
        if let Some(round) = self.round {
            fx.surface()
                .set_text(&self.targets.streak, &format!("{round}/3"));
        }
        if let Some(limit) = delta.f64_field("limit") {
            self.show_error_counter(fx, 0.0, limit, None);
        }
    }

    fn fill_boxes(&self, fx: &mut Effects<'_>, times: &[Value]) {
        self.clear_boxes(fx);
        let objective = self.objective.unwrap_or(DEFAULT_OBJECTIVE);
        for item in times {
            let Some(player) = item
                .get("player")
                .and_then(as_whole_number)
                .and_then(|p| usize::try_from(p).ok())
                .filter(|p| *p < self.targets.player_boxes)
            else {
                continue;
            };
            let time = item.get("time").and_then(Value::as_f64).unwrap_or(0.0);
            let cell = self.targets.player_box(player);
            fx.surface().set_class(&cell, "filled", true);
            fx.surface().set_text(
                &format!("{cell} .box-time"),
                &format!("{:.1} sec", objective + time),
            );
        }
    }
}

impl Screen for TimingRounds {
    const PUZZLE_ID: u8 = 5;
    const PRECEDENCE: &'static [&'static str] = &[
        "countdown_message",
        "round_start",
        "round",
        "total",
        "player_time",
        "times",
        "round_result",
    ];

    fn admit(&mut self, delta: &Delta, _fx: &mut Effects<'_>) -> Flow {
        let idle_round = delta.i64_field("round").is_none_or(|r| r == 0);
        if delta.bool_field("waiting")
            && !delta.bool_field("active_round")
            && !delta.bool_field("countdown_message")
            && idle_round
        {
            log::debug!("waiting between rounds, nothing to show");
            return Flow::Stop;
        }
        Flow::Continue
    }

    fn apply_field(
        &mut self,
        field: &str,
        value: &Value,
        delta: &Delta,
        fx: &mut Effects<'_>,
    ) -> Flow {
        match field {
            "countdown_message" if truthy(value) => {
                if self.showed_result {
                    self.clear_boxes(fx);
                    fx.surface()
                        .set_class(&self.targets.error, "success-result", false);
                    fx.surface()
                        .set_class(&self.targets.error, "failure-result", false);
                    self.showed_result = false;
                }
                let message = value.as_str().map_or_else(|| value.to_string(), str::to_string);
                self.show_countdown(fx, &message, delta.i64_field("waiting_seconds"));
                return Flow::Stop;
            }
            "round_start" if truthy(value) && !delta.bool_field("round") => {
                self.enter_round(delta, fx);
            }
            "round" if truthy(value) => self.enter_round(delta, fx),
            "total" if !delta.has("round_result") => {
                if let (Some(total), Some(limit)) = (value.as_f64(), delta.f64_field("limit")) {
                    self.show_error_counter(fx, total, limit, None);
                }
            }
            "player_time" if truthy(value) => fx.play(Sound::Button),
            "times" => {
                if let Some(times) = value.as_array() {
                    self.fill_boxes(fx, times);
                } else {
                    self.clear_boxes(fx);
                }
            }
            "round_result" if truthy(value) => {
                let success = value.get("success").is_some_and(truthy);
                let outcome = if success {
                    RoundOutcome::Success
                } else {
                    RoundOutcome::Failure
                };
                self.showed_result = true;
                let total = value.get("total").and_then(Value::as_f64).unwrap_or(0.0);
                let limit = value.get("limit").and_then(Value::as_f64).unwrap_or(0.0);
                self.show_error_counter(fx, total, limit, Some(outcome));
                fx.play(if success {
                    Sound::PhaseComplete
                } else {
                    Sound::PhaseFailed
                });
            }
            _ => {}
        }
        Flow::Continue
    }

    fn on_terminal(&mut self, _fx: &mut Effects<'_>) {
        self.waiting = None;
    }

    fn on_timer(&mut self, key: &TimerKey, fx: &mut Effects<'_>) {
        if *key == WAITING_TICK {
            self.tick(fx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_base_strips_the_server_seconds() {
        assert_eq!(
            countdown_base("Siguiente ronda en 5 segundos"),
            "Siguiente ronda en"
        );
        assert_eq!(countdown_base("Empieza en 1 segundo!"), "Empieza en !");
        assert_eq!(countdown_base("5 segundos"), "5 segundos");
        assert_eq!(countdown_base("Preparados"), "Preparados");
    }

    #[test]
    fn player_boxes_are_addressed_inside_the_section() {
        let targets = TimingRoundsTargets::default();
        assert_eq!(
            targets.player_box(2),
            "#players-section .player-box:nth-child(3)"
        );
    }
}
