use escaperoom_core::testing::Harness;
use escaperoom_core::{InitPhase, Notification, ScreenCatalog};
use serde_json::json;

const COMPLETE: &str = "/static/audios/effects/nivel_completado.wav";

fn harness(puzzle_id: u8) -> Harness {
    Harness::new(puzzle_id).expect("screen exists")
}

#[test]
fn snapshot_then_live_matches_live_only() {
    let mut with_snapshot = harness(7);
    assert!(with_snapshot.open().fetch_snapshot);
    with_snapshot.snapshot(&json!({"puzzle_id": 7, "solved_boxes": [1, 2]}));
    with_snapshot.push(&json!({"puzzle_id": 7, "solved_box": 3}));

    let mut live_only = harness(7);
    live_only.open();
    live_only.push(&json!({"puzzle_id": 7, "solved_boxes": [1, 2]}));
    live_only.push(&json!({"puzzle_id": 7, "solved_box": 3}));

    assert_eq!(with_snapshot.observe(), live_only.observe());
}

#[test]
fn snapshot_after_live_state_is_discarded() {
    let mut h = harness(7);
    h.open();
    h.push(&json!({"puzzle_id": 7, "solved_boxes": [1]}));
    assert_eq!(h.init_phase(), InitPhase::Initialized);
    h.snapshot(&json!({"puzzle_id": 7, "solved_boxes": [1, 2, 4]}));
    assert_eq!(
        h.surface.attr(r#".p7-card[data-box="1"]"#, "src").as_deref(),
        Some("/static/images/puzzle7/ok.png")
    );
    assert_eq!(h.surface.attr(r#".p7-card[data-box="4"]"#, "src"), None);
}

#[test]
fn terminal_signal_completes_exactly_once() {
    let mut h = harness(9);
    h.open();
    h.push(&json!({"puzzle_id": 9, "status": "good"}));
    h.push(&json!({"puzzle_id": 9, "puzzle_solved": true}));
    h.push(&json!({"puzzle_id": 9, "puzzle_solved": true}));
    h.push(&json!({"puzzle_id": 9, "status": "wrong"}));
    h.advance(500);
    h.advance(5_000);

    assert!(h.reconciler().is_terminal());
    assert_eq!(h.outbound.navigations(), vec!["/puzzleSuperat/9"]);
    assert_eq!(h.audio.count(COMPLETE), 1);
    assert_eq!(
        h.surface.attr("#p9-start", "src").as_deref(),
        Some("/static/images/puzzle9/good.png")
    );
}

#[test]
fn terminal_fields_win_over_the_rest_of_the_delta() {
    let mut h = harness(9);
    h.push(&json!({"puzzle_id": 9, "puzzle_solved": true, "status": "half"}));
    assert_eq!(h.surface.attr("#p9-start", "src"), None);
    h.advance(499);
    assert!(h.outbound.navigations().is_empty());
    h.advance(1);
    assert_eq!(h.outbound.navigations(), vec!["/puzzleSuperat/9"]);
}

#[test]
fn malformed_messages_do_not_stop_later_ones() {
    let mut h = harness(9);
    h.push_raw("{not json");
    h.push_raw("[1, 2, 3]");
    h.push_raw("\"status\"");
    assert_eq!(h.init_phase(), InitPhase::Uninitialized);
    h.push(&json!({"puzzle_id": 9, "status": "half"}));
    assert_eq!(
        h.surface.attr("#p9-start", "src").as_deref(),
        Some("/static/images/puzzle9/half.png")
    );
}

#[test]
fn unknown_fields_are_ignored() {
    let mut h = harness(9);
    h.push(&json!({"puzzle_id": 9, "unknown_field": true, "status": "good"}));
    let model = h.surface.model();
    assert_eq!(model.elements.len(), 1);
    assert_eq!(
        h.surface.attr("#p9-start", "src").as_deref(),
        Some("/static/images/puzzle9/good.png")
    );
    assert!(h.audio.played().is_empty());
}

#[test]
fn deltas_for_other_puzzles_are_filtered() {
    let mut h = harness(9);
    h.push(&json!({"puzzle_id": 3, "status": "good"}));
    assert_eq!(h.init_phase(), InitPhase::Uninitialized);
    assert!(h.surface.model().elements.is_empty());

    h.push(&json!({"status": "start"}));
    assert_eq!(
        h.surface.attr("#p9-start", "src").as_deref(),
        Some("/static/images/puzzle9/start.png")
    );
}

#[test]
fn channel_open_policy_runs_on_first_open_only() {
    let mut h = harness(1);
    let first = h.open();
    assert!(!first.fetch_snapshot);
    let again = h.open();
    assert!(!again.fetch_snapshot);
    assert_eq!(
        h.outbound.notifications(),
        vec![Notification::PuzzleStarted(1)]
    );

    let mut song = harness(4);
    assert!(song.open().fetch_snapshot);
    assert!(!song.open().fetch_snapshot);
    assert!(song.outbound.notifications().is_empty());
}

#[test]
fn snapshot_is_not_requested_once_live_state_arrived() {
    let mut h = harness(6);
    h.push(&json!({"puzzle_id": 6, "active": true, "remaining": 30}));
    assert!(!h.open().fetch_snapshot);
}

#[test]
fn repeated_round_is_a_no_op() {
    let mut h = harness(1);
    h.push(&json!({"puzzle_id": 1, "round": 1}));
    let after_first = h.observe();
    h.push(&json!({"puzzle_id": 1, "round": 1}));
    assert_eq!(h.observe(), after_first);
    assert_eq!(h.surface.text("#round-indicator").as_deref(), Some("1/3"));
}

#[test]
fn new_flash_replaces_the_previous_expiry() {
    let mut h = harness(1);
    h.push(&json!({"puzzle_id": 1, "operations": [[10, 3, "N"], [8, 1, "N"]]}));
    h.push(&json!({"puzzle_id": 1, "solved": {"result": 10, "text": "7+3=10"}}));
    h.advance(2_000);
    h.push(&json!({"puzzle_id": 1, "solved": {"result": 8, "text": "5+3=8"}}));
    assert_eq!(h.scheduler.active_count("banner"), 1);

    h.advance(2_000);
    let banner = h.surface.children("#solved-container");
    assert_eq!(banner.len(), 1);
    assert_eq!(banner[0].text.as_deref(), Some("5+3=8"));

    h.advance(1_000);
    assert!(h.surface.children("#solved-container").is_empty());
}

#[test]
fn playback_refused_by_the_browser_resumes_after_unlock() {
    let mut h = harness(4);
    let sample = json!({"puzzle_id": 4, "sample_song": {"url": "/static/audios/p4/a.mp3"}, "playing_sample": true});
    h.push(&sample);
    h.audio_rejected("/static/audios/p4/a.mp3");
    h.push(&sample);
    assert_eq!(h.audio.count("/static/audios/p4/a.mp3"), 1);

    h.audio_unlocked();
    h.audio_unlocked();
    assert_eq!(h.audio.count("/static/audios/p4/a.mp3"), 2);

    h.media_ended("/static/audios/p4/a.mp3");
    h.media_ended("/static/audios/p4/a.mp3");
    assert_eq!(
        h.outbound.notifications(),
        vec![Notification::SampleFinished]
    );
}

#[test]
fn completion_settings_come_from_the_catalog() {
    let catalog = ScreenCatalog::from_json(
        r#"{"screens":[{"puzzle_id":7,"completion_url":"/fin","completion_delay_ms":50,"completion_sound":false}]}"#,
    )
    .unwrap();
    let mut h = Harness::with_catalog(7, &catalog).unwrap();
    h.push(&json!({"puzzle_id": 7, "puzzle_solved": 1}));
    h.advance(50);
    assert_eq!(h.outbound.navigations(), vec!["/fin"]);
    assert!(h.audio.played().is_empty());
    assert!(Harness::with_catalog(3, &catalog).is_err());
}

#[test]
fn unknown_puzzle_ids_are_rejected() {
    assert!(Harness::new(0).is_err());
    assert!(Harness::new(10).is_err());
}

#[test]
fn solving_mid_flash_still_clears_the_flash() {
    let mut h = harness(1);
    h.push(&json!({"puzzle_id": 1, "operations": [[10, 3, "N"]]}));
    h.push(&json!({"puzzle_id": 1, "solved": {"result": 10, "text": "7+3=10"}}));
    h.push(&json!({"puzzle_id": 1, "puzzle_solved": true}));
    assert_eq!(h.scheduler.active_count("banner"), 1);
    assert_eq!(h.surface.children("#solved-container").len(), 1);

    h.advance(3_000);
    assert!(h.surface.children("#solved-container").is_empty());
    assert!(h.outbound.navigations().is_empty());
    h.advance(2_000);
    assert_eq!(h.outbound.navigations(), vec!["/puzzleSuperat/1"]);

    let mut bars = harness(2);
    bars.push(&json!({"puzzle_id": 2, "error_reset": {"player": 3}}));
    assert!(bars.surface.has_class("#bar-player-3", "error-flash"));
    bars.push(&json!({"puzzle_id": 2, "puzzle_solved": true}));
    bars.advance(4_000);
    assert!(!bars.surface.has_class("#bar-player-3", "error-flash"));
    assert_eq!(bars.outbound.navigations(), vec!["/puzzleSuperat/2"]);
}

#[test]
fn out_of_range_numbers_do_not_break_later_deltas() {
    let mut quiz = harness(3);
    let question = json!({"id": 1, "q": "¿Capital?", "answers": ["a", "b"]});
    quiz.push(&json!({
        "puzzle_id": 3,
        "question": question.clone(),
        "streak": i64::MAX,
        "target": 10,
    }));
    assert_eq!(
        quiz.surface.text("#streak").as_deref(),
        Some("9223372036854775807/10")
    );
    quiz.push(&json!({"puzzle_id": 3, "question": question, "streak": 2, "target": 10}));
    assert_eq!(quiz.surface.text("#streak").as_deref(), Some("3/10"));

    let mut song = harness(4);
    song.push(&json!({"puzzle_id": 4, "streak": i64::MAX, "total_required": i64::MIN}));
    song.push(&json!({"puzzle_id": 4, "streak": i64::MIN, "total_required": i64::MAX}));
    song.push(&json!({"puzzle_id": 4, "streak": 0, "total_required": 2}));
    assert_eq!(song.surface.text("#streak").as_deref(), Some("1/2"));

    let mut rounds = harness(5);
    rounds.push(&json!({
        "puzzle_id": 5,
        "countdown_message": "Siguiente ronda en 10 segundos",
        "waiting_seconds": i64::MAX,
    }));
    rounds.advance(1_000);
    rounds.push(&json!({
        "puzzle_id": 5,
        "countdown_message": "Siguiente ronda en 10 segundos",
        "waiting_seconds": 5,
    }));
    assert_eq!(
        rounds.surface.text("#objective-text").as_deref(),
        Some("Siguiente ronda en 5 segundos")
    );

    let mut power = harness(6);
    power.push(&json!({"puzzle_id": 6, "active": true, "remaining": i64::MAX}));
    let stale_epoch = json!({"start_ts": -i64::MAX, "duration": 60});
    power.push(&json!({"puzzle_id": 6, "countdown_start": stale_epoch}));
    assert_eq!(power.surface.text("#countdown").as_deref(), Some("00:00"));
    let negative_duration = json!({"start_ts": 0, "duration": i64::MIN});
    power.push(&json!({"puzzle_id": 6, "countdown_start": negative_duration}));
    power.advance(1_000);
    power.push(&json!({"puzzle_id": 6, "active": true, "remaining": 58}));
    assert_eq!(power.surface.text("#countdown").as_deref(), Some("00:58"));
    assert!(!power.surface.has_class("#countdown", "expired"));
}
