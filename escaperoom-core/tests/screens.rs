use escaperoom_core::Node;
use escaperoom_core::testing::Harness;
use escaperoom_core::{Notification, format_clock};
use serde_json::json;

const BUTTON: &str = "/static/audios/effects/boto.wav";
const CORRECT: &str = "/static/audios/effects/correcte.wav";
const INCORRECT: &str = "/static/audios/effects/incorrecte.wav";
const PHASE_COMPLETE: &str = "/static/audios/effects/fase_completada.wav";
const PHASE_FAILED: &str = "/static/audios/effects/fase_nocompletada.wav";
const COMPLETE: &str = "/static/audios/effects/nivel_completado.wav";
const BEEP: &str = "/static/audios/effects/beep_countdown.wav";

fn harness(puzzle_id: u8) -> Harness {
    Harness::new(puzzle_id).expect("screen exists")
}

fn find_in(nodes: &[Node], pred: &dyn Fn(&Node) -> bool) -> Option<Node> {
    nodes.iter().find_map(|n| n.find(pred).cloned())
}

fn op_cell(h: &Harness, result: &str) -> Option<Node> {
    find_in(&h.surface.children("#puzzle-container"), &|n| {
        n.has_class("op") && n.attr_value("data-result") == Some(result)
    })
}

#[test]
fn sum_grid_solved_operation_completes_its_cell() {
    let mut h = harness(1);
    h.push(&json!({"puzzle_id": 1, "operations": [[10, 3, "N"]]}));
    let cells = h.surface.children("#puzzle-container");
    assert_eq!(cells.len(), 15);
    assert!(cells[2].children.first().is_some_and(|op| op.has_class("op")));
    assert!(cells[0].has_class("empty-cell"));

    h.push(&json!({"puzzle_id": 1, "solved": {"result": 10, "text": "7+3=10"}}));
    let op = op_cell(&h, "10").expect("operation rendered");
    assert!(op.has_class("correct"));
    assert_eq!(op.text.as_deref(), Some("Completada"));
    let banner = h.surface.children("#solved-container");
    assert_eq!(banner[0].text.as_deref(), Some("7+3=10"));
    assert!(banner[0].has_class("correct"));
    assert_eq!(h.audio.count(CORRECT), 1);

    h.advance(3_000);
    assert!(h.surface.children("#solved-container").is_empty());
    assert!(op_cell(&h, "10").is_some_and(|op| op.has_class("correct")));
}

#[test]
fn sum_grid_places_round_one_positions() {
    let mut h = harness(1);
    h.push(&json!({
        "puzzle_id": 1,
        "round": 1,
        "operations": [[4, 1, "N"], [6, 2, "Y"], [9, 3, "N"], [12, 4, "N"]]
    }));
    let cells = h.surface.children("#puzzle-container");
    let filled: Vec<usize> = cells
        .iter()
        .enumerate()
        .filter(|(_, cell)| !cell.has_class("empty-cell"))
        .map(|(i, _)| i + 1)
        .collect();
    assert_eq!(filled, vec![3, 6, 10, 13]);
    assert!(op_cell(&h, "6").is_some_and(|op| op.has_class("correct")));
    assert_eq!(h.surface.text("#round-indicator").as_deref(), Some("1/3"));
}

#[test]
fn sum_grid_round_change_clears_previous_round() {
    let mut h = harness(1);
    h.push(&json!({"puzzle_id": 1, "round": 1, "operations": [[4, 1, "N"], [6, 2, "N"], [9, 3, "N"], [12, 4, "N"]]}));
    h.push(&json!({"puzzle_id": 1, "streak_completed": true}));
    assert_eq!(
        h.surface.children("#solved-container")[0].text.as_deref(),
        Some("Ronda completada")
    );
    h.push(&json!({"puzzle_id": 1, "countdown_next_round": {"seconds": 3}}));
    assert_eq!(
        h.surface.children("#solved-container")[0].text.as_deref(),
        Some("Seguiente ronda en 3...")
    );
    h.push(&json!({"puzzle_id": 1, "round": 2, "round_start": true}));
    assert!(h.surface.children("#puzzle-container").is_empty());
    assert!(h.surface.children("#solved-container").is_empty());
    assert_eq!(h.surface.text("#round-indicator").as_deref(), Some("2/3"));
    assert_eq!(h.audio.count(PHASE_COMPLETE), 1);
}

#[test]
fn sum_grid_incorrect_answer_shows_error_then_reset_banner() {
    let mut h = harness(1);
    h.push(&json!({"puzzle_id": 1, "start_timer": true, "operations": [[10, 3, "N"]]}));
    assert_eq!(h.scheduler.active_count("countdown"), 1);
    h.push(&json!({"puzzle_id": 1, "incorrect": {"result": 10, "text": "5+5=10"}}));

    assert_eq!(h.scheduler.active_count("countdown"), 0);
    assert_eq!(h.audio.count(INCORRECT), 1);
    assert!(op_cell(&h, "10").is_some_and(|op| op.has_class("incorrect")));
    let banner = h.surface.children("#solved-container");
    assert_eq!(
        banner[0].text.as_deref(),
        Some("ERROR: operacion  '5+5=10'  incorrecta")
    );

    h.advance(3_000);
    assert_eq!(
        h.surface.children("#solved-container")[0].text.as_deref(),
        Some("Reseteando operaciones")
    );
    h.advance(3_000);
    assert!(h.surface.children("#solved-container").is_empty());

    h.push(&json!({"puzzle_id": 1, "operations": [[7, 1, "N"]]}));
    assert!(op_cell(&h, "7").is_some_and(|op| !op.has_class("incorrect")));
}

#[test]
fn sum_grid_countdown_expires_and_restarts_on_fresh_operations() {
    let mut h = harness(1);
    h.push(&json!({"puzzle_id": 1, "start_timer": true}));
    assert_eq!(h.surface.text("#timer").as_deref(), Some("02:00"));
    h.advance(1_000);
    assert_eq!(h.surface.text("#timer").as_deref(), Some("01:59"));
    h.advance(60_500);
    assert_eq!(h.surface.text("#timer").as_deref(), Some(format_clock(59).as_str()));

    h.advance(58_500);
    assert_eq!(h.surface.text("#timer").as_deref(), Some("00:00"));
    assert!(h.surface.has_class("#timer", "expired"));
    assert_eq!(h.audio.count(PHASE_FAILED), 1);
    assert_eq!(
        h.outbound.notifications(),
        vec![Notification::TimerExpired]
    );
    assert_eq!(
        h.surface.children("#solved-container")[0].text.as_deref(),
        Some("Tiempo agotado, reseteando operaciones")
    );
    assert_eq!(h.scheduler.active_count("countdown"), 0);

    h.advance(5_000);
    assert!(h.surface.children("#solved-container").is_empty());

    h.push(&json!({"puzzle_id": 1, "operations": [[5, 1, "N"]]}));
    assert!(!h.surface.has_class("#timer", "expired"));
    assert_eq!(h.surface.text("#timer").as_deref(), Some("02:00"));
    assert_eq!(h.scheduler.active_count("countdown"), 1);
}

#[test]
fn sum_grid_completion_waits_five_seconds() {
    let mut h = harness(1);
    h.push(&json!({"puzzle_id": 1, "start_timer": true}));
    h.push(&json!({"puzzle_id": 1, "puzzle_solved": true}));
    assert_eq!(h.scheduler.active_count("countdown"), 0);
    h.advance(4_999);
    assert!(h.outbound.navigations().is_empty());
    h.advance(1);
    assert_eq!(h.outbound.navigations(), vec!["/puzzleSuperat/1"]);
    assert_eq!(h.audio.count(COMPLETE), 1);
}

#[test]
fn progress_bars_queue_snapshots_during_error_flash() {
    let mut h = harness(2);
    h.push(&json!({"puzzle_id": 2, "players": [{"player": 1, "progress": 2}]}));
    assert_eq!(h.surface.style("#bar-player-1", "width").as_deref(), Some("40%"));
    assert_eq!(h.surface.text("#bar-player-1 .bar-text").as_deref(), Some("2 / 5"));

    h.push(&json!({
        "puzzle_id": 2,
        "error_reset": {"player": 1},
        "players": [{"player": 1, "progress": 0}]
    }));
    assert_eq!(h.audio.count(INCORRECT), 1);
    assert!(h.surface.has_class("#bar-player-1", "error-flash"));
    assert!(h.surface.has_class(r#".player-row[data-player="1"] .player-label"#, "error-flash"));
    assert_eq!(h.surface.text("#bar-player-1 .bar-text").as_deref(), Some("2 / 5"));

    h.push(&json!({"puzzle_id": 2, "players": [{"player": 1, "progress": 1}]}));
    assert_eq!(h.surface.text("#bar-player-1 .bar-text").as_deref(), Some("2 / 5"));

    h.advance(4_000);
    assert!(!h.surface.has_class("#bar-player-1", "error-flash"));
    assert!(!h.surface.has_class(r#".player-row[data-player="1"]"#, "error-flash"));
    assert_eq!(h.surface.text("#bar-player-1 .bar-text").as_deref(), Some("1 / 5"));
}

#[test]
fn progress_bars_complete_and_play_phase_sound() {
    let mut h = harness(2);
    h.push(&json!({"puzzle_id": 2, "player_update": {"player": 3, "progress": 4}}));
    assert_eq!(h.audio.count(CORRECT), 1);
    h.push(&json!({"puzzle_id": 2, "player_update": {"player": 3, "progress": 5}}));
    assert_eq!(h.audio.count(PHASE_COMPLETE), 1);
    assert!(h.surface.has_class("#bar-player-3", "complete"));
    assert_eq!(h.surface.style("#bar-player-3", "width").as_deref(), Some("100%"));
}

#[test]
fn progress_bars_alarm_flash_toggles_then_settles() {
    let mut h = harness(2);
    h.push(&json!({"puzzle_id": 2, "play_alarm_sound": {"url": "/static/audios/alarm.mp3"}}));
    assert_eq!(h.audio.count("/static/audios/alarm.mp3"), 1);
    assert!(h.surface.has_class("body", "alarm-mode"));
    assert_eq!(
        h.surface.attr("#image-area img", "src").as_deref(),
        Some("/static/images/puzzle2/LaberintVermell.png")
    );

    h.advance(1_000);
    assert!(!h.surface.has_class("body", "alarm-mode"));
    h.advance(4_000);
    assert_eq!(h.scheduler.active_count("alarm-toggle"), 0);

    h.push(&json!({"puzzle_id": 2, "alarm_mode": false}));
    assert!(!h.surface.has_class("body", "alarm-mode"));
    assert_eq!(
        h.surface.attr("#image-area img", "src").as_deref(),
        Some("/static/images/puzzle2/Laberint.png")
    );
}

#[test]
fn quiz_renders_questions_and_results() {
    let mut h = harness(3);
    assert_eq!(h.surface.text("#pchip-9").as_deref(), Some("Caja 9"));

    h.push(&json!({
        "puzzle_id": 3,
        "question": {"id": 1, "q": "Capital?", "answers": ["Roma", "Paris", "Lima"]},
        "streak": 2,
        "target": 5,
        "answered_players": [4]
    }));
    assert_eq!(h.surface.text("#question-text").as_deref(), Some("Capital?"));
    assert_eq!(h.surface.text("#streak").as_deref(), Some("3/5"));
    assert_eq!(h.surface.children("#answer-area").len(), 3);
    assert!(h.surface.has_class("#pchip-4", "answered"));
    assert_eq!(h.audio.count(BUTTON), 0);

    h.push(&json!({"puzzle_id": 3, "player_answer": {"player": 1}}));
    assert!(h.surface.has_class("#pchip-1", "answered"));
    assert_eq!(h.audio.count(BUTTON), 1);

    h.push(&json!({
        "puzzle_id": 3,
        "streak": 0,
        "target": 5,
        "question_result": {"success": false, "correct_answer": 2, "player_answers": {"1": 3, "4": 2}}
    }));
    assert!(h.surface.has_class("#pchip-1", "wrong"));
    assert!(h.surface.has_class("#pchip-4", "correct"));
    assert!(!h.surface.has_class("#pchip-4", "answered"));
    let rows = h.surface.children("#answer-area");
    assert!(rows[2].has_class("wrong"));
    assert!(!rows[1].has_class("wrong"));
    assert_eq!(
        h.surface.text("#feedback").as_deref(),
        Some("Algunas respuestas incorrectas. Reseteando Preguntas.")
    );
    assert!(h.surface.has_class("#feedback", "err"));
    assert_eq!(h.audio.count(INCORRECT), 1);

    // Button cues wait out the result sound.
    h.push(&json!({"puzzle_id": 3, "player_answer": {"player": 2}}));
    assert_eq!(h.audio.count(BUTTON), 1);
    h.advance(500);
    assert_eq!(h.audio.count(BUTTON), 2);
}

#[test]
fn quiz_terminal_shows_level_passed() {
    let mut h = harness(3);
    h.push(&json!({"puzzle_id": 3, "puzzle_solved": true}));
    assert_eq!(h.surface.text("#feedback").as_deref(), Some("Nivel superado!"));
    h.advance(1_200);
    assert_eq!(h.outbound.navigations(), vec!["/puzzleSuperat/3"]);
}

#[test]
fn song_sequence_tracks_streak_boxes_and_flashes() {
    let mut h = harness(4);
    assert_eq!(h.surface.text("#streak").as_deref(), Some("1/2"));
    assert_eq!(h.surface.text("#p4-status").as_deref(), Some("Listening"));

    h.push(&json!({
        "puzzle_id": 4,
        "streak": 1,
        "total_required": 2,
        "played_sequence": ["A", "B"],
        "storing": true
    }));
    assert_eq!(h.surface.text("#streak").as_deref(), Some("2/2"));
    assert_eq!(h.surface.style("#streak2-container", "display").as_deref(), Some("flex"));
    assert_eq!(h.surface.style("#streak1-container", "display").as_deref(), Some("none"));
    let first = "#streak2-container .progress-box:nth-child(1)";
    assert_eq!(h.surface.text(first).as_deref(), Some("A"));
    assert!(h.surface.has_class(first, "filled"));
    assert_eq!(h.surface.text("#status-text").as_deref(), Some("Estado: Registrando"));

    h.push(&json!({"puzzle_id": 4, "sequence_correct": false}));
    assert!(h.surface.has_class(first, "flash-wrong"));
    h.push(&json!({"puzzle_id": 4, "sequence_correct": true}));
    assert!(!h.surface.has_class(first, "flash-wrong"));
    assert!(h.surface.has_class(first, "flash-correct"));
    h.advance(10_000);
    assert!(!h.surface.has_class(first, "flash-correct"));
}

#[test]
fn song_sequence_completes_without_level_sound() {
    let mut h = harness(4);
    h.push(&json!({"puzzle_id": 4, "puzzle_solved": true}));
    assert_eq!(h.surface.text("#p4-status").as_deref(), Some("Song Completed"));
    assert!(h.surface.has_class("#p4-status", "solved"));
    assert_eq!(h.audio.count(COMPLETE), 0);
    h.advance(4_000);
    assert_eq!(h.outbound.navigations(), vec!["/puzzleSuperat/4"]);
}

#[test]
fn sample_playback_is_deduplicated() {
    let mut h = harness(4);
    let sample = json!({"puzzle_id": 4, "sample_song": {"url": "/s/1.mp3"}, "playing_sample": true});
    h.push(&sample);
    h.push(&sample);
    assert_eq!(h.audio.count("/s/1.mp3"), 1);
    assert_eq!(h.surface.text("#status-text").as_deref(), Some("Reproduciendo muestra"));
}

#[test]
fn timing_rounds_count_down_locally_with_beeps() {
    let mut h = harness(5);
    h.push(&json!({
        "puzzle_id": 5,
        "countdown_message": "Ronda 1 en 3 segundos",
        "waiting_seconds": 3
    }));
    assert_eq!(h.surface.text("#objective-text").as_deref(), Some("Ronda 1 en 3 segundos"));
    assert_eq!(h.surface.style("#players-section", "display").as_deref(), Some("none"));

    h.advance(1_000);
    assert_eq!(h.surface.text("#objective-text").as_deref(), Some("Ronda 1 en 2 segundos"));
    h.advance(1_000);
    assert_eq!(h.surface.text("#objective-text").as_deref(), Some("Ronda 1 en 1 segundo"));
    h.advance(1_000);
    assert_eq!(h.audio.count(BEEP), 2);
    assert_eq!(h.scheduler.active_count("waiting-countdown"), 0);
}

#[test]
fn timing_rounds_show_objective_times_and_result() {
    let mut h = harness(5);
    h.push(&json!({"puzzle_id": 5, "round": 1, "objective": 10, "limit": 3}));
    assert_eq!(h.surface.text("#objective-text").as_deref(), Some("OBJETIVO: 10 sec"));
    assert_eq!(h.surface.text("#streak").as_deref(), Some("1/3"));
    assert_eq!(
        h.surface.text("#error-text").as_deref(),
        Some("Total Error Acumulado: 0.0 sec / 3 sec")
    );

    h.push(&json!({"puzzle_id": 5, "player_time": true, "times": [{"player": 0, "time": 0.4}]}));
    assert_eq!(h.audio.count(BUTTON), 1);
    let first = "#players-section .player-box:nth-child(1)";
    assert!(h.surface.has_class(first, "filled"));
    assert_eq!(
        h.surface.text(&format!("{first} .box-time")).as_deref(),
        Some("10.4 sec")
    );

    h.push(&json!({"puzzle_id": 5, "round_result": {"success": true, "total": 0.4, "limit": 3}}));
    assert!(h.surface.has_class("#error-text", "success-result"));
    assert_eq!(h.audio.count(PHASE_COMPLETE), 1);

    h.push(&json!({"puzzle_id": 5, "countdown_message": "Preparados"}));
    assert!(!h.surface.has_class("#error-text", "success-result"));
    assert!(!h.surface.has_class(first, "filled"));
    assert_eq!(h.surface.text("#objective-text").as_deref(), Some("Preparados"));
}

#[test]
fn timing_rounds_skip_idle_waiting_snapshots() {
    let mut h = harness(5);
    h.push(&json!({"puzzle_id": 5, "waiting": true, "round": 0, "total": 1.0, "limit": 3}));
    assert!(h.surface.model().elements.is_empty());
}

#[test]
fn power_countdown_anchors_to_the_server_epoch() {
    let mut h = harness(6);
    let now_secs = h.now_ms() / 1000;
    h.push(&json!({"puzzle_id": 6, "countdown_start": {"start_ts": now_secs - 2, "duration": 60}}));
    assert_eq!(h.surface.text("#countdown").as_deref(), Some("00:58"));
    assert_eq!(h.audio.count(BUTTON), 1);
    h.advance(1_000);
    assert_eq!(h.surface.text("#countdown").as_deref(), Some("00:57"));

    h.push(&json!({"puzzle_id": 6, "countdown_tick": {"remaining": 50}}));
    assert_eq!(h.surface.text("#countdown").as_deref(), Some("00:50"));
    h.advance(1_000);
    assert_eq!(h.surface.text("#countdown").as_deref(), Some("00:49"));
}

#[test]
fn power_countdown_reset_waits_then_clears_failure() {
    let mut h = harness(6);
    h.push(&json!({"puzzle_id": 6, "active": true, "remaining": 30}));
    h.push(&json!({"puzzle_id": 6, "countdown_reset": {"box": 3}}));
    assert_eq!(
        h.surface.text("#message").as_deref(),
        Some("Error: Caja 3 sin energía. Vuelta a empezar en 10 segundos")
    );
    assert_eq!(h.surface.text("#countdown").as_deref(), Some("10s"));
    assert!(h.surface.has_class("#countdown", "failure"));
    assert_eq!(h.audio.count(PHASE_FAILED), 1);
    assert_eq!(h.scheduler.active_count("power-countdown"), 0);

    h.advance(9_500);
    assert_eq!(h.surface.text("#countdown").as_deref(), Some("1s"));
    h.advance(500);
    assert_eq!(h.surface.text("#countdown").as_deref(), Some("0s"));
    assert!(!h.surface.has_class("#countdown", "failure"));
}

#[test]
fn power_countdown_restores_pending_restart_from_snapshot() {
    let mut h = harness(6);
    assert!(h.open().fetch_snapshot);
    h.snapshot(&json!({"puzzle_id": 6, "restart_pending": true, "active": true, "remaining": 40}));
    assert_eq!(h.surface.text("#message").as_deref(), Some("Reiniciando..."));
    assert_eq!(h.surface.text("#countdown").as_deref(), Some("5s"));
}

#[test]
fn power_countdown_terminal_shows_zero() {
    let mut h = harness(6);
    h.push(&json!({"puzzle_id": 6, "active": true, "remaining": 30}));
    h.push(&json!({"puzzle_id": 6, "puzzle_solved": true}));
    assert_eq!(h.surface.text("#countdown").as_deref(), Some("00:00"));
    assert!(h.surface.has_class("#countdown", "expired"));
    assert_eq!(h.scheduler.active_count("power-countdown"), 0);
}

#[test]
fn boxes_sound_only_for_newly_solved_cards() {
    let mut h = harness(7);
    h.push(&json!({"puzzle_id": 7, "solved_box": 2}));
    h.push(&json!({"puzzle_id": 7, "solved_box": 2}));
    assert_eq!(h.audio.count(CORRECT), 1);
    assert_eq!(
        h.surface.attr(r#".p7-card[data-box="2"]"#, "src").as_deref(),
        Some("/static/images/puzzle7/ok.png")
    );
}

#[test]
fn symbols_tokens_phase_colours_the_order() {
    let mut h = harness(8);
    h.push(&json!({
        "puzzle_id": 8,
        "round": 1,
        "phase": "tokens",
        "symbols": ["sun", "moon"],
        "colors": {"sun": "red"}
    }));
    assert_eq!(h.surface.text("#streak").as_deref(), Some("1/3"));
    let sun = h.surface.children(r#"#p8-grid .p8-slot[data-index="0"]"#);
    assert!(sun[0].has_class("p8-sun"));
    assert!(sun[0].has_class("p8-color-red"));
    let moon = h.surface.children(r#"#p8-grid .p8-slot[data-index="1"]"#);
    assert!(!moon[0].classes.iter().any(|c| c.starts_with("p8-color-")));
}

#[test]
fn symbols_inputs_stack_up_to_the_round() {
    let mut h = harness(8);
    h.push(&json!({"puzzle_id": 8, "round": 2, "clear": true, "phase": "input", "symbols": ["sun"]}));
    for (color, symbol) in [("blue", "sun"), ("red", "moon"), ("green", "star")] {
        h.push(&json!({
            "puzzle_id": 8,
            "phase": "input",
            "input_update": {"box": 0, "color": color, "symbol": symbol}
        }));
    }
    let slot = r#"#p8-grid .p8-slot[data-index="0"]"#;
    let marks = h.surface.children(slot);
    assert_eq!(marks.len(), 2);
    assert!(marks[0].has_class("p8-color-blue"));
    assert!(marks[1].has_class("p8-moon"));
    assert!(marks[1].has_class("p8-color-green"));
    assert!(h.surface.has_class(slot, "p8-duo"));
    assert!(!h.surface.has_class(slot, "p8-trio"));

    h.push(&json!({"puzzle_id": 8, "input_result": {"box_results": {"0": true, "1": false}}}));
    assert!(h.surface.has_class(
        r#"#p8-grid .p8-frame:has(> .p8-slot[data-index="0"])"#,
        "p8-correct"
    ));
    assert!(h.surface.has_class(
        r#"#p8-grid .p8-frame:has(> .p8-slot[data-index="1"])"#,
        "p8-wrong"
    ));
}

#[test]
fn symbols_number_phase_and_silent_completion() {
    let mut h = harness(8);
    h.push(&json!({"puzzle_id": 8, "token_numbers": [4, 7], "symbols": ["sun"], "phase": "tokens"}));
    let first = h.surface.children(r#"#p8-grid .p8-slot[data-index="0"]"#);
    assert_eq!(first[0].text.as_deref(), Some("4"));
    assert!(first[0].has_class("p8-number"));

    h.push(&json!({"puzzle_id": 8, "puzzle_solved": true}));
    h.advance(500);
    assert_eq!(h.outbound.navigations(), vec!["/puzzleSuperat/8"]);
    assert!(h.audio.played().is_empty());
}

#[test]
fn status_image_swaps_and_clicks() {
    let mut h = harness(9);
    h.push(&json!({"puzzle_id": 9, "status": "half", "box_update": {"box": 1}}));
    assert_eq!(
        h.surface.attr("#p9-start", "src").as_deref(),
        Some("/static/images/puzzle9/half.png")
    );
    assert_eq!(h.audio.count(BUTTON), 1);
}
