//! Puzzle 7: one card per box, flipped to its solved image.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::audio::Sound;
use crate::delta::{Delta, as_whole_number};
use crate::engine::{Effects, Flow, Screen};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxesTargets {
    pub card: String,
    pub solved_image: String,
}

impl Default for BoxesTargets {
    fn default() -> Self {
        Self {
            card: ".p7-card".to_string(),
            solved_image: "/static/images/puzzle7/ok.png".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Boxes {
    targets: BoxesTargets,
    solved: BTreeSet<i64>,
}

impl Boxes {
    #[must_use]
    pub fn new(targets: BoxesTargets) -> Self {
        Self {
            targets,
            solved: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn solved(&self) -> impl Iterator<Item = i64> + '_ {
        self.solved.iter().copied()
    }

    /// Returns whether the box was newly solved.
    fn set_solved(&mut self, fx: &mut Effects<'_>, card: i64) -> bool {
        let selector = format!(r#"{}[data-box="{card}"]"#, self.targets.card);
        fx.surface()
            .set_attr(&selector, "src", &self.targets.solved_image);
        self.solved.insert(card)
    }
}

impl Screen for Boxes {
    const PUZZLE_ID: u8 = 7;
    const PRECEDENCE: &'static [&'static str] = &["solved_boxes", "solved_box"];

    fn apply_field(
        &mut self,
        field: &str,
        value: &Value,
        _delta: &Delta,
        fx: &mut Effects<'_>,
    ) -> Flow {
        match field {
            "solved_boxes" => {
                for card in value.as_array().into_iter().flatten().filter_map(as_whole_number) {
                    self.set_solved(fx, card);
                }
            }
            "solved_box" => {
                if let Some(card) = as_whole_number(value)
                    && self.set_solved(fx, card)
                {
                    fx.play(Sound::Correct);
                }
            }
            _ => {}
        }
        Flow::Continue
    }
}
