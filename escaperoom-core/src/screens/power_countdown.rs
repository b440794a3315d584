//! Puzzle 6: keep every box powered until a server-started countdown runs out.

use serde_json::Value;

use crate::audio::Sound;
use crate::countdown::{Countdown, format_clock};
use crate::delta::{Delta, as_whole_number, truthy};
use crate::engine::{Effects, Flow, Screen};
use crate::timer::TimerKey;

const MAIN_TICK: TimerKey = TimerKey::fixed("power-countdown");
const RESET_TICK: TimerKey = TimerKey::fixed("reset-countdown");
const DEFAULT_RESET_WAIT: i64 = 10;
const DEFAULT_RESTART_WAIT: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerCountdownTargets {
    pub countdown: String,
    pub message: String,
}

impl Default for PowerCountdownTargets {
    fn default() -> Self {
        Self {
            countdown: "#countdown".to_string(),
            message: "#message".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PowerCountdown {
    targets: PowerCountdownTargets,
    main: Option<Countdown>,
    reset: Option<Countdown>,
}

impl PowerCountdown {
    #[must_use]
    pub fn new(targets: PowerCountdownTargets) -> Self {
        Self {
            targets,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.main.is_some()
    }

    fn start(&mut self, fx: &mut Effects<'_>, countdown: Countdown) {
        fx.cancel_timer(&RESET_TICK);
        self.reset = None;
        self.main = Some(countdown);
        let surface = fx.surface();
        surface.set_text(&self.targets.message, "");
        surface.set_class(&self.targets.countdown, "failure", false);
        surface.set_class(&self.targets.countdown, "expired", false);
        self.tick_main(fx);
        if self.main.is_some() {
            fx.start_interval(MAIN_TICK, 1000);
        }
    }

    fn tick_main(&mut self, fx: &mut Effects<'_>) {
        let Some(countdown) = self.main else {
            fx.cancel_timer(&MAIN_TICK);
            return;
        };
        let left = countdown.remaining_secs(fx.now_ms());
        fx.surface()
            .set_text(&self.targets.countdown, &format_clock(left));
        if left > 0 {
            fx.play(Sound::Button);
            return;
        }
        fx.cancel_timer(&MAIN_TICK);
        self.main = None;
        fx.surface()
            .set_class(&self.targets.countdown, "expired", true);
    }

    fn start_reset(&mut self, fx: &mut Effects<'_>, wait_secs: i64, message: &str) {
        log::info!("power lost, restarting in {wait_secs}s");
        self.main = None;
        fx.cancel_timer(&MAIN_TICK);
        fx.play(Sound::PhaseFailed);
        let surface = fx.surface();
        surface.set_text(&self.targets.message, message);
        surface.set_class(&self.targets.countdown, "failure", true);
        surface.set_class(&self.targets.countdown, "expired", false);
        self.reset = Some(Countdown::from_duration(fx.now_ms(), wait_secs));
        self.tick_reset(fx);
        if self.reset.is_some() {
            fx.start_interval(RESET_TICK, 500);
        }
    }

    fn tick_reset(&mut self, fx: &mut Effects<'_>) {
        let Some(countdown) = self.reset else {
            fx.cancel_timer(&RESET_TICK);
            return;
        };
        let left = countdown.remaining_secs_ceil(fx.now_ms());
        fx.surface()
            .set_text(&self.targets.countdown, &format!("{left}s"));
        if left <= 0 {
            fx.cancel_timer(&RESET_TICK);
            self.reset = None;
            fx.surface()
                .set_class(&self.targets.countdown, "failure", false);
        }
    }
}

fn wait_seconds(value: Option<&Value>, fallback: i64) -> i64 {
    value
        .and_then(as_whole_number)
        .filter(|secs| *secs != 0)
        .unwrap_or(fallback)
}

impl Screen for PowerCountdown {
    const PUZZLE_ID: u8 = 6;
    const PRECEDENCE: &'static [&'static str] = &[
        "countdown_start",
        "restart_pending",
        "active",
        "countdown_tick",
        "countdown_reset",
    ];

    fn apply_field(
        &mut self,
        field: &str,
        value: &Value,
        delta: &Delta,
        fx: &mut Effects<'_>,
    ) -> Flow {
        match field {
            "countdown_start" if truthy(value) => {
                let start_ts = value.get("start_ts").and_then(as_whole_number).unwrap_or(0);
                let duration = value.get("duration").and_then(as_whole_number).unwrap_or(0);
                let countdown = Countdown::from_server_epoch(fx.now_ms(), start_ts, duration);
                self.start(fx, countdown);
            }
            "restart_pending" if truthy(value) => {
                let message = delta
                    .str_field("last_reset_message")
                    .filter(|m| !m.is_empty())
                    .unwrap_or("Reiniciando...")
                    .to_string();
                let wait = wait_seconds(delta.get("waiting_seconds"), DEFAULT_RESTART_WAIT);
                self.start_reset(fx, wait, &message);
                return Flow::Stop;
            }
            "active" if truthy(value) => {
                let remaining = delta.i64_field("remaining").unwrap_or(0);
                let countdown = Countdown::from_duration(fx.now_ms(), remaining);
                self.start(fx, countdown);
            }
            "countdown_tick" if self.main.is_some() => {
                if let Some(remaining) = value.get("remaining").and_then(as_whole_number) {
                    fx.surface()
                        .set_text(&self.targets.countdown, &format_clock(remaining));
                    self.main = Some(Countdown::from_duration(fx.now_ms(), remaining));
                }
            }
            "countdown_reset" if truthy(value) => {
                let message = value
                    .get("message")
                    .and_then(Value::as_str)
                    .filter(|m| !m.is_empty())
                    .map_or_else(
                        || {
                            let caja = value
                                .get("box")
                                .map(|b| b.as_str().map_or_else(|| b.to_string(), str::to_string))
                                .unwrap_or_default();
                            format!(
                                "Error: Caja {caja} sin energía. Vuelta a empezar en 10 segundos"
                            )
                        },
                        str::to_string,
                    );
                let wait = wait_seconds(value.get("waiting_seconds"), DEFAULT_RESET_WAIT);
                self.start_reset(fx, wait, &message);
            }
            _ => {}
        }
        Flow::Continue
    }

    fn on_terminal(&mut self, fx: &mut Effects<'_>) {
        self.main = None;
        self.reset = None;
        let surface = fx.surface();
        surface.set_text(&self.targets.countdown, "00:00");
        surface.set_class(&self.targets.countdown, "expired", true);
        surface.set_text(&self.targets.message, "");
    }

    fn on_timer(&mut self, key: &TimerKey, fx: &mut Effects<'_>) {
        if *key == MAIN_TICK {
            self.tick_main(fx);
        } else if *key == RESET_TICK {
            self.tick_reset(fx);
        }
    }
}
