//! JSON-lines scripts of push traffic and host events.
//!
//! One step per line, for example:
//!
//! ```text
//! {"step": "open"}
//! {"step": "delta", "value": {"puzzle_id": 7, "solved_box": 2}}
//! {"step": "advance_ms", "ms": 1500}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use anyhow::{Context, Result};
use escaperoom_core::testing::{Harness, Observed};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Open,
    Delta { value: Value },
    Snapshot { value: Value },
    Raw { text: String },
    AdvanceMs { ms: u32 },
    MediaEnded { url: String },
    AudioRejected { url: String },
    AudioUnlocked,
}

pub fn parse_script(text: &str) -> Result<Vec<Step>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}: bad step", index + 1))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptRun {
    pub steps: usize,
    /// Whether each `open` step asked the host for a snapshot.
    pub snapshot_requests: Vec<bool>,
    pub observed: Observed,
}

pub fn apply(harness: &mut Harness, step: &Step) -> Option<bool> {
    match step {
        Step::Open => return Some(harness.open().fetch_snapshot),
        Step::Delta { value } => harness.push(value),
        Step::Snapshot { value } => harness.snapshot(value),
        Step::Raw { text } => harness.push_raw(text),
        Step::AdvanceMs { ms } => harness.advance(*ms),
        Step::MediaEnded { url } => harness.media_ended(url),
        Step::AudioRejected { url } => harness.audio_rejected(url),
        Step::AudioUnlocked => harness.audio_unlocked(),
    }
    None
}

pub fn run_script(puzzle_id: u8, steps: &[Step]) -> Result<ScriptRun> {
    let mut harness =
        Harness::new(puzzle_id).with_context(|| format!("mounting puzzle {puzzle_id}"))?;
    let mut snapshot_requests = Vec::new();
    for step in steps {
        log::debug!("step {step:?}");
        if let Some(requested) = apply(&mut harness, step) {
            snapshot_requests.push(requested);
        }
    }
    Ok(ScriptRun {
        steps: steps.len(),
        snapshot_requests,
        observed: harness.observe(),
    })
}
