//! Puzzle 3: multiple-choice questions answered by ten player boxes.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::audio::Sound;
use crate::delta::{Delta, as_whole_number, truthy};
use crate::engine::{Effects, Flow, Screen};
use crate::render::Node;

pub const PLAYER_COUNT: u32 = 10;
const DEFAULT_TARGET: i64 = 10;
const RESULT_BLOCK_MS: u32 = 500;
const CHIP_STATES: [&str; 4] = ["done", "answered", "correct", "wrong"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizTargets {
    pub streak: String,
    pub question: String,
    pub answers: String,
    pub players: String,
    pub feedback: String,
}

impl Default for QuizTargets {
    fn default() -> Self {
        Self {
            streak: "#streak".to_string(),
            question: "#question-text".to_string(),
            answers: "#answer-area".to_string(),
            players: "#player-status".to_string(),
            feedback: "#feedback".to_string(),
        }
    }
}

fn chip(player: u32) -> String {
    format!("#pchip-{player}")
}

#[derive(Debug, Default)]
pub struct Quiz {
    targets: QuizTargets,
    question_id: Option<Value>,
    answers: Vec<String>,
    /// 1-based answers chosen wrongly in the last result.
    wrong_answers: BTreeSet<i64>,
    answered: BTreeSet<u32>,
}

fn player_index(value: &Value) -> Option<u32> {
    as_whole_number(value).and_then(|p| u32::try_from(p).ok())
}

impl Quiz {
    #[must_use]
    pub fn new(targets: QuizTargets) -> Self {
        Self {
            targets,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn question_id(&self) -> Option<&Value> {
        self.question_id.as_ref()
    }

    fn streak_and_target(delta: &Delta) -> (i64, i64) {
        (
            delta.i64_field("streak").unwrap_or(0),
            delta.i64_field("target").unwrap_or(DEFAULT_TARGET),
        )
    }

    fn show_streak(&self, fx: &mut Effects<'_>, streak: i64, target: i64) {
        let shown = streak.saturating_add(1);
        fx.surface()
            .set_text(&self.targets.streak, &format!("{shown}/{target}"));
    }

    fn set_feedback(&self, fx: &mut Effects<'_>, class: &str, text: &str) {
        let surface = fx.surface();
        surface.set_attr(&self.targets.feedback, "class", class);
        surface.set_text(&self.targets.feedback, text);
    }

    fn render_answers(&self, fx: &mut Effects<'_>) {
        let rows: Vec<Node> = self
            .answers
            .iter()
            .enumerate()
            .map(|(idx, answer)| {
                let mut row = Node::div()
                    .class("answer-row")
                    .attr("data-answer-index", idx.to_string());
                if i64::try_from(idx + 1).is_ok_and(|n| self.wrong_answers.contains(&n)) {
                    row = row.class("wrong");
                }
                row.child(Node::div().class("answer-index").text((idx + 1).to_string()))
                    .child(Node::div().class("answer-text").text(answer.clone()))
            })
            .collect();
        fx.surface().replace_children(&self.targets.answers, &rows);
    }

    fn mark_answered(&mut self, fx: &mut Effects<'_>, player: u32) {
        self.answered.insert(player);
        let chip = chip(player);
        let surface = fx.surface();
        surface.set_class(&chip, "correct", false);
        surface.set_class(&chip, "wrong", false);
        surface.set_class(&chip, "answered", true);
    }

    fn apply_question(&mut self, question: &Value, delta: &Delta, fx: &mut Effects<'_>) {
        self.question_id = question.get("id").cloned();
        self.answers = question
            .get("answers")
            .and_then(Value::as_array)
            .map(|answers| {
                answers
                    .iter()
                    .map(|a| a.as_str().map_or_else(|| a.to_string(), str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        self.wrong_answers.clear();
        let text = question.get("q").and_then(Value::as_str).unwrap_or_default();
        fx.surface().set_text(&self.targets.question, text);
        self.render_answers(fx);
        let (streak, target) = Self::streak_and_target(delta);
        self.show_streak(fx, streak, target);
        self.set_feedback(fx, "", "");

        for player in 0..PLAYER_COUNT {
            let chip = chip(player);
            for state in CHIP_STATES {
                fx.surface().set_class(&chip, state, false);
            }
        }
        self.answered.clear();
        let already: Vec<u32> = delta
            .array_field("answered_players")
            .map(|players| players.iter().filter_map(player_index).collect())
            .unwrap_or_default();
        for player in already {
            self.mark_answered(fx, player);
        }
    }

    fn apply_result(&mut self, result: &Map<String, Value>, delta: &Delta, fx: &mut Effects<'_>) {
        let correct = result.get("correct_answer").and_then(as_whole_number);
        let empty = Map::new();
        let answers = result
            .get("player_answers")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        self.wrong_answers = answers
            .values()
            .filter_map(as_whole_number)
            .filter(|answer| Some(*answer) != correct)
            .collect();
        self.render_answers(fx);

        for (player, answer) in answers {
            let Ok(player) = player.parse::<u32>() else {
                continue;
            };
            let chip = chip(player);
            let right = as_whole_number(answer).is_some() && as_whole_number(answer) == correct;
            let surface = fx.surface();
            surface.set_class(&chip, "answered", false);
            surface.set_class(&chip, if right { "correct" } else { "wrong" }, true);
        }

        let (streak, target) = Self::streak_and_target(delta);
        if result.get("success").is_some_and(truthy) {
            fx.play_and_block(Sound::Correct, RESULT_BLOCK_MS);
            self.set_feedback(fx, "ok", &format!("Respuestas correctas! {streak}/{target}"));
        } else {
            fx.play_and_block(Sound::Incorrect, RESULT_BLOCK_MS);
            self.set_feedback(
                fx,
                "err",
                "Algunas respuestas incorrectas. Reseteando Preguntas.",
            );
        }
        self.show_streak(fx, streak, target);
    }
}

impl Screen for Quiz {
    const PUZZLE_ID: u8 = 3;
    const PRECEDENCE: &'static [&'static str] = &["question", "player_answer", "question_result"];

    fn mount(&mut self, fx: &mut Effects<'_>) {
        let chips: Vec<Node> = (0..PLAYER_COUNT)
            .map(|i| {
                Node::div()
                    .class("player-chip")
                    .id(format!("pchip-{i}"))
                    .text(format!("Caja {i}"))
            })
            .collect();
        fx.surface().replace_children(&self.targets.players, &chips);
    }

    fn apply_field(
        &mut self,
        field: &str,
        value: &Value,
        delta: &Delta,
        fx: &mut Effects<'_>,
    ) -> Flow {
        match field {
            "question" if truthy(value) => self.apply_question(value, delta, fx),
            "player_answer" => {
                if let Some(player) = value.get("player").and_then(player_index) {
                    self.mark_answered(fx, player);
                    fx.play_after_block(Sound::Button);
                }
            }
            "question_result" => {
                if let Some(result) = value.as_object() {
                    self.apply_result(result, delta, fx);
                }
            }
            _ => {}
        }
        Flow::Continue
    }

    fn on_terminal(&mut self, fx: &mut Effects<'_>) {
        self.set_feedback(fx, "ok", "Nivel superado!");
    }
}
