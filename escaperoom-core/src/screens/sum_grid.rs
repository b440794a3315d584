//! Puzzle 1: operations laid out on a 5×3 grid, one round at a time, under a
//! two-minute client-owned countdown.

use serde_json::Value;
use smallvec::smallvec;

use crate::audio::Sound;
use crate::countdown::{Countdown, format_clock};
use crate::delta::{Delta, as_whole_number, js_number, truthy};
use crate::engine::{Effects, Flow, Screen, Undo};
use crate::outbound::Notification;
use crate::render::Node;
use crate::timer::TimerKey;

const GRID_CELLS: u32 = 15;
const ROUND_SECONDS: i64 = 120;
const BANNER_MS: u32 = 3000;
const TIMEOUT_BANNER_MS: u32 = 5000;

const COUNTDOWN: TimerKey = TimerKey::fixed("countdown");
const BANNER: TimerKey = TimerKey::fixed("banner");

const OPERAND_CARD: &str = "/static/images/puzzle1/tarjeta.png";
const OPERAND_BOX: &str = "/static/images/puzzle1/caixa.png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SumGridTargets {
    pub grid: String,
    pub bottom_area: String,
    pub banner: String,
    pub round_indicator: String,
    pub timer: String,
}

impl Default for SumGridTargets {
    fn default() -> Self {
        Self {
            grid: "#puzzle-container".to_string(),
            bottom_area: "#bottom-area".to_string(),
            banner: "#solved-container".to_string(),
            round_indicator: "#round-indicator".to_string(),
            timer: "#timer".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Operation {
    result: Value,
    position: u32,
    done: bool,
}

impl Operation {
    fn from_value(value: &Value) -> Option<Self> {
        let parts = value.as_array()?;
        let result = parts.first()?.clone();
        let position = parts.get(1).and_then(as_whole_number)?;
        let done = parts.get(2).and_then(Value::as_str) == Some("Y");
        Some(Self {
            result,
            position: u32::try_from(position).ok()?,
            done,
        })
    }

    fn result_text(&self) -> String {
        display_value(&self.result)
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_f64().map_or_else(|| n.to_string(), js_number),
        other => other.to_string(),
    }
}

/// Grid cell (1-based) that a position occupies in `round`.
#[must_use]
pub fn cell_for_position(round: u32, position: u32) -> Option<u32> {
    const ROUND_ONE: [(u32, u32); 4] = [(1, 3), (2, 6), (3, 10), (4, 13)];
    const ROUND_TWO: [(u32, u32); 7] = [(1, 3), (2, 6), (3, 7), (4, 8), (5, 9), (6, 10), (7, 13)];
    let table: &[(u32, u32)] = match round {
        1 => &ROUND_ONE,
        2 => &ROUND_TWO,
        _ => return (1..=GRID_CELLS).contains(&position).then_some(position),
    };
    table
        .iter()
        .find(|(pos, _)| *pos == position)
        .map(|(_, cell)| *cell)
}

#[must_use]
pub const fn infer_round(operation_count: usize) -> u32 {
    match operation_count {
        4 => 1,
        7 => 2,
        _ => 3,
    }
}

#[derive(Debug)]
pub struct SumGrid {
    targets: SumGridTargets,
    round: Option<u32>,
    operations: Vec<Operation>,
    incorrect: Option<String>,
    countdown: Option<Countdown>,
    expired: bool,
    /// Message shown once the current banner times out.
    banner_followup: Option<String>,
}

impl SumGrid {
    #[must_use]
    pub fn new(targets: SumGridTargets) -> Self {
        Self {
            targets,
            round: None,
            operations: Vec::new(),
            incorrect: None,
            countdown: None,
            expired: false,
            banner_followup: None,
        }
    }

    #[must_use]
    pub const fn round(&self) -> Option<u32> {
        self.round
    }

    fn show_round(&self, fx: &mut Effects<'_>, round: u32) {
        fx.surface()
            .set_text(&self.targets.round_indicator, &format!("{round}/3"));
    }

    fn render_grid(&self, fx: &mut Effects<'_>) {
        let round = self
            .round
            .unwrap_or_else(|| infer_round(self.operations.len()));
        self.show_round(fx, round);
        let cells: Vec<Node> = (1..=GRID_CELLS)
            .map(|cell| {
                let op = self
                    .operations
                    .iter()
                    .find(|op| cell_for_position(round, op.position) == Some(cell));
                match op {
                    Some(op) => Node::div().class("grid-cell").child(self.operation_node(op)),
                    None => Node::div().class("grid-cell empty-cell"),
                }
            })
            .collect();
        fx.surface().replace_children(&self.targets.grid, &cells);
    }

    fn operation_node(&self, op: &Operation) -> Node {
        let result = op.result_text();
        let mut node = Node::div()
            .class("op")
            .attr("data-position", op.position.to_string())
            .attr("data-result", result.clone());
        if self.incorrect.as_deref() == Some(result.as_str()) {
            node = node.class("incorrect");
        }
        if op.done {
            return node.class("correct").text("Completada");
        }
        node.child(Node::new("img").class("operand").attr("src", OPERAND_CARD))
            .child(Node::new("span").text("+"))
            .child(Node::new("img").class("operand").attr("src", OPERAND_BOX))
            .child(Node::new("span").text(format!("= {result}")))
    }

    fn set_banner(&mut self, fx: &mut Effects<'_>, class: &str, text: &str) {
        self.banner_followup = None;
        fx.forget_flash(&BANNER);
        let node = Node::div().class(class).text(text);
        fx.surface().replace_children(&self.targets.banner, &[node]);
    }

    fn flash_banner(&self, fx: &mut Effects<'_>, class: &str, text: &str, duration_ms: u32) {
        let banner = self.targets.banner.clone();
        let node = Node::div().class(class).text(text);
        fx.flash(
            BANNER,
            duration_ms,
            |surface| surface.replace_children(&banner, &[node]),
            smallvec![Undo::clear_children(&banner)],
        );
    }

    fn start_countdown(&mut self, fx: &mut Effects<'_>) {
        self.expired = false;
        fx.surface().set_class(&self.targets.timer, "expired", false);
        self.countdown = Some(Countdown::from_duration(fx.now_ms(), ROUND_SECONDS));
        fx.surface()
            .set_text(&self.targets.timer, &format_clock(ROUND_SECONDS));
        fx.start_interval(COUNTDOWN, 1000);
    }

    fn stop_countdown(&mut self, fx: &mut Effects<'_>) {
        fx.cancel_timer(&COUNTDOWN);
        self.countdown = None;
    }

    fn tick(&mut self, fx: &mut Effects<'_>) {
        let Some(countdown) = self.countdown else {
            fx.cancel_timer(&COUNTDOWN);
            return;
        };
        let now = fx.now_ms();
        let left = countdown.remaining_secs(now);
        fx.surface().set_text(&self.targets.timer, &format_clock(left));
        if !countdown.is_expired(now) {
            return;
        }
        self.stop_countdown(fx);
        self.expired = true;
        log::info!("round countdown expired");
        fx.surface().set_class(&self.targets.timer, "expired", true);
        fx.play(Sound::PhaseFailed);
        self.banner_followup = None;
        self.flash_banner(
            fx,
            "message error",
            "Tiempo agotado, reseteando operaciones",
            TIMEOUT_BANNER_MS,
        );
        fx.notify(Notification::TimerExpired);
    }

    fn apply_round(&mut self, value: &Value, fx: &mut Effects<'_>) {
        let Some(round) = as_whole_number(value).and_then(|r| u32::try_from(r).ok()) else {
            return;
        };
        match self.round {
            Some(current) if current == round => {}
            Some(_) => {
                self.round = Some(round);
                self.show_round(fx, round);
                self.operations.clear();
                self.incorrect = None;
                self.banner_followup = None;
                fx.forget_flash(&BANNER);
                fx.surface().replace_children(&self.targets.grid, &[]);
                fx.surface().replace_children(&self.targets.banner, &[]);
            }
            None => {
                self.round = Some(round);
                self.show_round(fx, round);
            }
        }
    }

    fn apply_solved(&mut self, value: &Value, fx: &mut Effects<'_>) {
        let text = value.get("text").map(display_value).unwrap_or_default();
        self.banner_followup = None;
        self.flash_banner(fx, "correct", &text, BANNER_MS);
        if let Some(result) = value.get("result").map(display_value) {
            let mut changed = false;
            for op in &mut self.operations {
                if op.result_text() == result && !op.done {
                    op.done = true;
                    changed = true;
                }
            }
            if changed {
                self.render_grid(fx);
            }
        }
        fx.play(Sound::Correct);
    }

    fn apply_incorrect(&mut self, value: &Value, fx: &mut Effects<'_>) {
        let text = value.get("text").map(display_value).unwrap_or_default();
        fx.play(Sound::Incorrect);
        self.stop_countdown(fx);
        self.flash_banner(
            fx,
            "message error",
            &format!("ERROR: operacion  '{text}'  incorrecta"),
            BANNER_MS,
        );
        self.banner_followup = Some("Reseteando operaciones".to_string());
        if let Some(result) = value.get("result").map(display_value) {
            self.incorrect = Some(result);
            if !self.operations.is_empty() {
                self.render_grid(fx);
            }
        }
    }

    fn apply_operations(&mut self, value: &Value, fx: &mut Effects<'_>) {
        let operations: Vec<Operation> = value
            .as_array()
            .map(|ops| ops.iter().filter_map(Operation::from_value).collect())
            .unwrap_or_default();
        if operations != self.operations {
            self.incorrect = None;
        }
        self.operations = operations;
        self.render_grid(fx);
        if self.expired && self.countdown.is_none() {
            self.start_countdown(fx);
        }
    }
}

impl Default for SumGrid {
    fn default() -> Self {
        Self::new(SumGridTargets::default())
    }
}

impl Screen for SumGrid {
    const PUZZLE_ID: u8 = 1;
    const PRECEDENCE: &'static [&'static str] = &[
        "round",
        "start_timer",
        "streak_completed",
        "countdown_next_round",
        "round_start",
        "solved",
        "incorrect",
        "operations",
    ];

    fn mount(&mut self, fx: &mut Effects<'_>) {
        let banner_id = self.targets.banner.trim_start_matches('#').to_string();
        let round_id = self.targets.round_indicator.trim_start_matches('#').to_string();
        let surface = fx.surface();
        surface.ensure_child(&self.targets.bottom_area, &Node::div().id(banner_id));
        surface.ensure_child(&self.targets.bottom_area, &Node::div().id(round_id));
    }

    fn apply_field(
        &mut self,
        field: &str,
        value: &Value,
        _delta: &Delta,
        fx: &mut Effects<'_>,
    ) -> Flow {
        match field {
            "round" => self.apply_round(value, fx),
            "start_timer" if truthy(value) => self.start_countdown(fx),
            "streak_completed" if truthy(value) => {
                self.set_banner(fx, "message", "Ronda completada");
            }
            "countdown_next_round" => {
                if let Some(seconds) = value.get("seconds").and_then(Value::as_f64) {
                    let text = format!("Seguiente ronda en {}...", js_number(seconds));
                    self.set_banner(fx, "message", &text);
                }
            }
            "round_start" if truthy(value) => fx.play(Sound::PhaseComplete),
            "solved" if truthy(value) => self.apply_solved(value, fx),
            "incorrect" if truthy(value) => self.apply_incorrect(value, fx),
            "operations" if truthy(value) => self.apply_operations(value, fx),
            _ => {}
        }
        Flow::Continue
    }

    fn on_terminal(&mut self, _fx: &mut Effects<'_>) {
        self.countdown = None;
        self.banner_followup = None;
    }

    fn on_timer(&mut self, key: &TimerKey, fx: &mut Effects<'_>) {
        if *key == COUNTDOWN {
            self.tick(fx);
        } else if *key == BANNER
            && let Some(text) = self.banner_followup.take()
        {
            self.flash_banner(fx, "message error", &text, BANNER_MS);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_tables_place_positions() {
        assert_eq!(cell_for_position(1, 3), Some(10));
        assert_eq!(cell_for_position(1, 5), None);
        assert_eq!(cell_for_position(2, 7), Some(13));
        assert_eq!(cell_for_position(3, 15), Some(15));
        assert_eq!(cell_for_position(3, 16), None);
    }

    #[test]
    fn round_is_inferred_from_operation_count() {
        assert_eq!(infer_round(4), 1);
        assert_eq!(infer_round(7), 2);
        assert_eq!(infer_round(15), 3);
        assert_eq!(infer_round(1), 3);
    }

    #[test]
    fn operations_parse_from_triples() {
        let op = Operation::from_value(&serde_json::json!([10, 3, "Y"])).unwrap();
        assert_eq!(op.result_text(), "10");
        assert_eq!(op.position, 3);
        assert!(op.done);
        assert!(Operation::from_value(&serde_json::json!({"result": 10})).is_none());
    }
}
