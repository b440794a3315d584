//! Built-in property scenarios run against every screen.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, ensure};
use escaperoom_core::screens::PUZZLE_IDS;
use escaperoom_core::testing::Harness;
use escaperoom_core::{InitPhase, ScreenCatalog};
use serde::Serialize;
use serde_json::{Value, json};

pub struct Scenario {
    pub key: &'static str,
    pub description: &'static str,
    run: fn() -> Result<()>,
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        key: "smoke",
        description: "Every screen mounts, accepts a delta and completes",
        run: smoke,
    },
    Scenario {
        key: "terminal",
        description: "Completion navigates and sounds exactly once",
        run: terminal_once,
    },
    Scenario {
        key: "malformed",
        description: "Malformed messages never stop later valid ones",
        run: malformed,
    },
    Scenario {
        key: "idempotent",
        description: "Re-delivering a state delta changes nothing",
        run: idempotent,
    },
    Scenario {
        key: "flash",
        description: "A new timed banner replaces the previous expiry",
        run: flash_replacement,
    },
    Scenario {
        key: "snapshot-race",
        description: "Snapshot then live equals live only; late snapshots are dropped",
        run: snapshot_race,
    },
];

#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    SCENARIOS.iter().map(|s| (s.key, s.description)).collect()
}

#[must_use]
pub fn get_scenario(key: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.key == key)
}

#[must_use]
pub fn expand_scenarios(arg: &str) -> Vec<String> {
    let mut scenarios: Vec<String> = arg
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        scenarios.extend(SCENARIOS.iter().map(|s| s.key.to_string()));
    }
    scenarios
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub passed: bool,
    pub duration: Duration,
    pub failures: Vec<String>,
}

impl Scenario {
    pub fn run(&self) -> ScenarioResult {
        let started = Instant::now();
        let outcome = (self.run)();
        let failures = match outcome {
            Ok(()) => Vec::new(),
            Err(err) => vec![format!("{err:#}")],
        };
        ScenarioResult {
            scenario_name: self.key.to_string(),
            passed: failures.is_empty(),
            duration: started.elapsed(),
            failures,
        }
    }
}

fn mount(puzzle_id: u8) -> Result<Harness> {
    Harness::new(puzzle_id).with_context(|| format!("mounting puzzle {puzzle_id}"))
}

fn smoke() -> Result<()> {
    let catalog = ScreenCatalog::load_from_static();
    for id in PUZZLE_IDS {
        let config = catalog.screen(id)?;
        let mut h = mount(id)?;
        h.open();
        h.push(&json!({"puzzle_id": id}));
        ensure!(
            h.init_phase() == InitPhase::Initialized,
            "puzzle {id}: first matching delta did not initialize"
        );
        h.push(&json!({"puzzle_id": id, "puzzle_solved": true}));
        h.advance(config.completion_delay_ms);
        ensure!(
            h.outbound.navigations() == vec![config.completion_url.clone()],
            "puzzle {id}: expected navigation to {}, got {:?}",
            config.completion_url,
            h.outbound.navigations()
        );
    }
    Ok(())
}

fn terminal_once() -> Result<()> {
    let catalog = ScreenCatalog::load_from_static();
    let complete = catalog.sounds.puzzle_complete.clone();
    for id in PUZZLE_IDS {
        let config = catalog.screen(id)?;
        let mut h = mount(id)?;
        h.open();
        for _ in 0..3 {
            h.push(&json!({"puzzle_id": id, "puzzle_solved": true}));
        }
        h.advance(config.completion_delay_ms + 10_000);
        h.push(&json!({"puzzle_id": id, "puzzle_solved": true}));
        h.advance(config.completion_delay_ms + 10_000);

        let navigations = h.outbound.navigations().len();
        ensure!(navigations == 1, "puzzle {id}: navigated {navigations} times");
        let sounds = h.audio.count(&complete);
        let expected = usize::from(config.completion_sound);
        ensure!(
            sounds == expected,
            "puzzle {id}: completion sound played {sounds} times, expected {expected}"
        );
    }
    Ok(())
}

fn malformed() -> Result<()> {
    let garbage = ["{not json", "[1, 2]", "\"text\"", "42", ""];
    for id in PUZZLE_IDS {
        let mut h = mount(id)?;
        for line in garbage {
            h.push_raw(line);
        }
        ensure!(
            h.init_phase() == InitPhase::Uninitialized,
            "puzzle {id}: garbage initialized the screen"
        );
        h.push(&json!({"puzzle_id": id}));
        ensure!(
            h.init_phase() == InitPhase::Initialized,
            "puzzle {id}: valid delta after garbage was dropped"
        );
    }
    Ok(())
}

/// State-style deltas whose second delivery must be invisible.
fn state_samples() -> Vec<(u8, Value)> {
    vec![
        (1, json!({"puzzle_id": 1, "round": 1, "operations": [[4, 1, "N"], [6, 2, "Y"]]})),
        (2, json!({"puzzle_id": 2, "players": [{"player": 1, "progress": 2}]})),
        (
            3,
            json!({"puzzle_id": 3, "question": {"id": 1, "q": "?", "answers": ["a", "b"]}, "streak": 0}),
        ),
        (4, json!({"puzzle_id": 4, "streak": 0, "total_required": 2, "played_sequence": ["A"]})),
        (5, json!({"puzzle_id": 5, "round": 1, "objective": 10, "limit": 3})),
        (7, json!({"puzzle_id": 7, "solved_boxes": [1, 2]})),
        (8, json!({"puzzle_id": 8, "round": 2})),
        (9, json!({"puzzle_id": 9, "status": "half"})),
    ]
}

fn idempotent() -> Result<()> {
    for (id, delta) in state_samples() {
        let mut h = mount(id)?;
        h.push(&delta);
        let first = h.observe();
        h.push(&delta);
        ensure!(h.observe() == first, "puzzle {id}: second delivery changed state");
    }
    Ok(())
}

fn flash_replacement() -> Result<()> {
    let mut h = mount(1)?;
    h.push(&json!({"puzzle_id": 1, "operations": [[10, 3, "N"], [8, 1, "N"]]}));
    h.push(&json!({"puzzle_id": 1, "solved": {"result": 10, "text": "7+3=10"}}));
    h.advance(2_000);
    h.push(&json!({"puzzle_id": 1, "solved": {"result": 8, "text": "5+3=8"}}));
    h.advance(2_000);
    let banner = h.surface.children("#solved-container");
    ensure!(
        banner.len() == 1 && banner[0].text.as_deref() == Some("5+3=8"),
        "second banner cleared by the first one's expiry: {banner:?}"
    );
    h.advance(1_000);
    ensure!(
        h.surface.children("#solved-container").is_empty(),
        "second banner never expired"
    );
    Ok(())
}

fn snapshot_race() -> Result<()> {
    let mut with_snapshot = mount(7)?;
    ensure!(with_snapshot.open().fetch_snapshot, "puzzle 7 should ask for a snapshot");
    with_snapshot.snapshot(&json!({"puzzle_id": 7, "solved_boxes": [1, 2]}));
    with_snapshot.push(&json!({"puzzle_id": 7, "solved_box": 3}));

    let mut live_only = mount(7)?;
    live_only.open();
    live_only.push(&json!({"puzzle_id": 7, "solved_boxes": [1, 2]}));
    live_only.push(&json!({"puzzle_id": 7, "solved_box": 3}));
    ensure!(
        with_snapshot.observe() == live_only.observe(),
        "snapshot-then-live diverged from live-only"
    );

    let mut late = mount(7)?;
    late.open();
    late.push(&json!({"puzzle_id": 7, "solved_box": 1}));
    let before = late.observe();
    late.snapshot(&json!({"puzzle_id": 7, "solved_boxes": [1, 2, 3, 4]}));
    ensure!(late.observe() == before, "late snapshot was applied");
    Ok(())
}
