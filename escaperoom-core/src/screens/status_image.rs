//! Puzzle 9: a single status picture (`start`, `half`, `wrong`, `good`).

use serde_json::Value;

use crate::audio::Sound;
use crate::delta::{Delta, truthy};
use crate::engine::{Effects, Flow, Screen};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusImageTargets {
    pub image: String,
    pub image_dir: String,
}

impl Default for StatusImageTargets {
    fn default() -> Self {
        Self {
            image: "#p9-start".to_string(),
            image_dir: "/static/images/puzzle9".to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct StatusImage {
    targets: StatusImageTargets,
    status: Option<String>,
}

impl StatusImage {
    #[must_use]
    pub const fn new(targets: StatusImageTargets) -> Self {
        Self {
            targets,
            status: None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

impl Screen for StatusImage {
    const PUZZLE_ID: u8 = 9;
    const PRECEDENCE: &'static [&'static str] = &["status", "box_update"];

    fn apply_field(
        &mut self,
        field: &str,
        value: &Value,
        _delta: &Delta,
        fx: &mut Effects<'_>,
    ) -> Flow {
        match field {
            "status" => {
                if let Some(status) = value.as_str().filter(|s| !s.is_empty()) {
                    let src = format!("{}/{status}.png", self.targets.image_dir);
                    fx.surface().set_attr(&self.targets.image, "src", &src);
                    self.status = Some(status.to_string());
                }
            }
            "box_update" if truthy(value) => fx.play(Sound::Button),
            _ => {}
        }
        Flow::Continue
    }
}
