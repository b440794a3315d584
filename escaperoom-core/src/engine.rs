//! Stream reconciler.
//!
//! One [`Reconciler`] per puzzle screen. It owns the screen's local render
//! state, every timer the screen starts, and the screen's playback channel, and
//! it is the only thing that turns pushed deltas into effects. All work happens
//! in reaction to one of three host events: a pushed message, a timer fire, or
//! a media callback.
//!
//! Ordering rules:
//! - The snapshot and the first live delta race. Whichever arrives first moves
//!   the reconciler from [`InitPhase::Uninitialized`] to
//!   [`InitPhase::Initialized`]; a snapshot arriving afterwards is discarded.
//! - A terminal delta (`puzzle_solved`) latches. Its completion effects run
//!   once and every later non-terminal field is ignored.
//! - Within a delta, fields are applied in the screen's fixed
//!   [`Screen::PRECEDENCE`] order, never in payload order.

use std::collections::BTreeMap;

use serde_json::Value;
use smallvec::SmallVec;

use crate::audio::{AudioChannel, AudioSink, Sound};
use crate::config::{ScreenConfig, SoundBank};
use crate::delta::Delta;
use crate::outbound::{Navigator, Notification, Notifier};
use crate::render::Surface;
use crate::timer::{Clock, Scheduler, TimerKey, TimerSlots};

const REDIRECT: TimerKey = TimerKey::fixed("redirect");
const AUDIO_DEFERRED: TimerKey = TimerKey::fixed("audio-deferred");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPhase {
    Uninitialized,
    Initialized,
}

/// Per-puzzle reconciliation rules.
pub trait Screen {
    const PUZZLE_ID: u8;
    /// Field application order. Fields missing from this list are ignored.
    const PRECEDENCE: &'static [&'static str];

    /// Initial render before any delta arrives.
    fn mount(&mut self, _fx: &mut Effects<'_>) {}

    /// Gate evaluated before any field is applied.
    fn admit(&mut self, _delta: &Delta, _fx: &mut Effects<'_>) -> Flow {
        Flow::Continue
    }

    /// Apply one recognised field. Must be idempotent: applying the same value
    /// twice leaves the same visible state.
    fn apply_field(
        &mut self,
        field: &str,
        value: &Value,
        delta: &Delta,
        fx: &mut Effects<'_>,
    ) -> Flow;

    /// Terminal render (completion sound and navigation are handled by the engine).
    fn on_terminal(&mut self, _fx: &mut Effects<'_>) {}

    fn on_timer(&mut self, _key: &TimerKey, _fx: &mut Effects<'_>) {}

    fn on_media_ended(&mut self, _url: &str, _fx: &mut Effects<'_>) {}
}

/// One step of undoing a transient visual effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Undo {
    RemoveClass { target: String, class: String },
    ClearChildren { target: String },
    SetText { target: String, text: String },
}

impl Undo {
    #[must_use]
    pub fn remove_class(target: &str, class: &str) -> Self {
        Self::RemoveClass {
            target: target.to_string(),
            class: class.to_string(),
        }
    }

    #[must_use]
    pub fn clear_children(target: &str) -> Self {
        Self::ClearChildren {
            target: target.to_string(),
        }
    }

    fn apply(&self, surface: &mut dyn Surface) {
        match self {
            Self::RemoveClass { target, class } => surface.set_class(target, class, false),
            Self::ClearChildren { target } => surface.replace_children(target, &[]),
            Self::SetText { target, text } => surface.set_text(target, text),
        }
    }
}

pub type Expiry = SmallVec<[Undo; 4]>;

/// Host events routed back into the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    TimerFired { key: TimerKey, generation: u64 },
    MediaEnded(String),
    PlaybackRejected(String),
    AudioUnlocked,
}

/// What the host should do after the push channel opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenActions {
    pub fetch_snapshot: bool,
}

/// Injected collaborators.
pub struct Seams {
    pub surface: Box<dyn Surface>,
    pub scheduler: Box<dyn Scheduler>,
    pub audio: Box<dyn AudioSink>,
    pub notifier: Box<dyn Notifier>,
    pub navigator: Box<dyn Navigator>,
    pub clock: Box<dyn Clock>,
}

/// Effect handle given to screens while they reconcile.
pub struct Effects<'a> {
    surface: &'a mut dyn Surface,
    scheduler: &'a mut dyn Scheduler,
    timers: &'a mut TimerSlots,
    audio: &'a mut AudioChannel,
    sink: &'a mut dyn AudioSink,
    notifier: &'a mut dyn Notifier,
    clock: &'a dyn Clock,
    expiries: &'a mut BTreeMap<TimerKey, Expiry>,
    sounds: &'a SoundBank,
}

impl Effects<'_> {
    pub fn surface(&mut self) -> &mut dyn Surface {
        self.surface
    }

    #[must_use]
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn play(&mut self, sound: Sound) {
        let url = self.sounds.url(sound).to_string();
        self.play_url(&url);
    }

    pub fn play_url(&mut self, url: &str) {
        self.audio.play(self.sink, url);
    }

    /// Play `sound` and hold later [`play_after_block`](Self::play_after_block)
    /// cues for `block_ms` so this one is heard in full.
    pub fn play_and_block(&mut self, sound: Sound, block_ms: u32) {
        self.play(sound);
        let until = self.now_ms() + i64::from(block_ms);
        self.audio.block_until(until);
    }

    pub fn play_after_block(&mut self, sound: Sound) {
        let url = self.sounds.url(sound).to_string();
        match self.audio.blocked_for(self.clock.now_ms()) {
            Some(wait_ms) => {
                self.audio.defer(&url);
                self.timers
                    .start(self.scheduler, AUDIO_DEFERRED, wait_ms, false);
            }
            None => self.play_url(&url),
        }
    }

    #[must_use]
    pub fn is_playing(&self, url: &str) -> bool {
        self.audio.is_playing(url)
    }

    pub fn start_timer(&mut self, key: TimerKey, delay_ms: u32) {
        self.expiries.remove(&key);
        self.timers.start(self.scheduler, key, delay_ms, false);
    }

    pub fn start_interval(&mut self, key: TimerKey, period_ms: u32) {
        self.expiries.remove(&key);
        self.timers.start(self.scheduler, key, period_ms, true);
    }

    pub fn cancel_timer(&mut self, key: &TimerKey) {
        self.expiries.remove(key);
        self.timers.cancel(self.scheduler, key);
    }

    #[must_use]
    pub fn timer_active(&self, key: &TimerKey) -> bool {
        self.timers.is_active(key)
    }

    /// Show a time-boxed effect. A pending effect of the same kind is undone
    /// first and its expiry replaced, so instances never stack.
    pub fn flash(
        &mut self,
        key: TimerKey,
        duration_ms: u32,
        show: impl FnOnce(&mut dyn Surface),
        expiry: Expiry,
    ) {
        if let Some(previous) = self.expiries.remove(&key) {
            for undo in &previous {
                undo.apply(self.surface);
            }
        }
        show(self.surface);
        self.timers
            .start(self.scheduler, key.clone(), duration_ms, false);
        self.expiries.insert(key, expiry);
    }

    /// Drop a pending effect without undoing it (its content was replaced).
    pub fn forget_flash(&mut self, key: &TimerKey) {
        if self.expiries.remove(key).is_some() {
            self.timers.cancel(self.scheduler, key);
        }
    }

    pub fn notify(&mut self, notification: Notification) {
        self.notifier.notify(notification);
    }
}

/// Object-safe face of a reconciler, so hosts can pick a screen at runtime.
pub trait Reconcile {
    fn puzzle_id(&self) -> u8;
    fn mount(&mut self);
    fn on_channel_open(&mut self) -> OpenActions;
    fn on_message(&mut self, text: &str);
    fn on_delta(&mut self, delta: &Delta);
    fn on_snapshot_text(&mut self, text: &str);
    fn apply_snapshot(&mut self, delta: &Delta);
    fn handle(&mut self, event: HostEvent);
    fn init_phase(&self) -> InitPhase;
    fn is_terminal(&self) -> bool;
}

pub struct Reconciler<S: Screen> {
    screen: S,
    config: ScreenConfig,
    sounds: SoundBank,
    seams: Seams,
    timers: TimerSlots,
    audio: AudioChannel,
    expiries: BTreeMap<TimerKey, Expiry>,
    phase: InitPhase,
    opened: bool,
    terminal: bool,
}

impl<S: Screen> Reconciler<S> {
    #[must_use]
    pub fn new(screen: S, config: ScreenConfig, sounds: SoundBank, seams: Seams) -> Self {
        Self {
            screen,
            config,
            sounds,
            seams,
            timers: TimerSlots::default(),
            audio: AudioChannel::default(),
            expiries: BTreeMap::new(),
            phase: InitPhase::Uninitialized,
            opened: false,
            terminal: false,
        }
    }

    #[must_use]
    pub const fn screen(&self) -> &S {
        &self.screen
    }

    #[must_use]
    pub const fn config(&self) -> &ScreenConfig {
        &self.config
    }

    #[must_use]
    pub const fn timers(&self) -> &TimerSlots {
        &self.timers
    }

    fn split(&mut self) -> (&mut S, Effects<'_>) {
        let Self {
            screen,
            sounds,
            seams,
            timers,
            audio,
            expiries,
            ..
        } = self;
        let fx = Effects {
            surface: seams.surface.as_mut(),
            scheduler: seams.scheduler.as_mut(),
            timers,
            audio,
            sink: seams.audio.as_mut(),
            notifier: seams.notifier.as_mut(),
            clock: seams.clock.as_ref(),
            expiries,
            sounds,
        };
        (screen, fx)
    }

    fn reconcile(&mut self, delta: &Delta) {
        if self.terminal {
            log::debug!(
                "puzzle {} already solved, ignoring {:?}",
                S::PUZZLE_ID,
                delta.field_names().collect::<Vec<_>>()
            );
            return;
        }
        if delta.is_terminal() {
            self.finish();
            return;
        }
        let (screen, mut fx) = self.split();
        if screen.admit(delta, &mut fx) == Flow::Stop {
            return;
        }
        for field in S::PRECEDENCE {
            let Some(value) = delta.get(field) else {
                continue;
            };
            if screen.apply_field(field, value, delta, &mut fx) == Flow::Stop {
                break;
            }
        }
    }

    fn finish(&mut self) {
        self.terminal = true;
        log::info!("puzzle {} solved", S::PUZZLE_ID);
        // Pending transient effects keep their expiry so they still clear on time.
        let expiries = &self.expiries;
        self.timers
            .cancel_where(self.seams.scheduler.as_mut(), |key| !expiries.contains_key(key));
        let completion_sound = self.config.completion_sound;
        let delay_ms = self.config.completion_delay_ms;
        let (screen, mut fx) = self.split();
        screen.on_terminal(&mut fx);
        if completion_sound {
            fx.play(Sound::PuzzleComplete);
        }
        fx.start_timer(REDIRECT, delay_ms);
    }

    fn fire(&mut self, key: &TimerKey, generation: u64) {
        if !self.timers.accept(key, generation) {
            log::debug!("stale timer {key} (generation {generation})");
            return;
        }
        if *key == REDIRECT {
            let url = self.config.completion_url.clone();
            log::info!("puzzle {} redirecting to {url}", S::PUZZLE_ID);
            self.seams.navigator.navigate(&url);
            return;
        }
        if *key == AUDIO_DEFERRED {
            if let Some(url) = self.audio.take_deferred() {
                self.audio.play(self.seams.audio.as_mut(), &url);
            }
            return;
        }
        if let Some(expiry) = self.expiries.remove(key) {
            for undo in &expiry {
                undo.apply(self.seams.surface.as_mut());
            }
        }
        if self.terminal {
            return;
        }
        let (screen, mut fx) = self.split();
        screen.on_timer(key, &mut fx);
    }
}

impl<S: Screen> Reconcile for Reconciler<S> {
    fn puzzle_id(&self) -> u8 {
        S::PUZZLE_ID
    }

    fn mount(&mut self) {
        let (screen, mut fx) = self.split();
        screen.mount(&mut fx);
    }

    fn on_channel_open(&mut self) -> OpenActions {
        if self.opened {
            log::debug!("push channel reopened for puzzle {}", S::PUZZLE_ID);
            return OpenActions::default();
        }
        self.opened = true;
        let policy = self.config.open;
        if policy.notify_start {
            self.seams
                .notifier
                .notify(Notification::PuzzleStarted(S::PUZZLE_ID));
        }
        OpenActions {
            fetch_snapshot: policy.fetch_snapshot && self.phase == InitPhase::Uninitialized,
        }
    }

    fn on_message(&mut self, text: &str) {
        match Delta::parse(text) {
            Ok(delta) => self.on_delta(&delta),
            Err(err) => log::warn!("dropping push message for puzzle {}: {err}", S::PUZZLE_ID),
        }
    }

    fn on_delta(&mut self, delta: &Delta) {
        if !delta.matches(S::PUZZLE_ID) {
            return;
        }
        self.phase = InitPhase::Initialized;
        self.reconcile(delta);
    }

    fn on_snapshot_text(&mut self, text: &str) {
        match Delta::parse(text) {
            Ok(delta) => self.apply_snapshot(&delta),
            Err(err) => log::warn!("dropping snapshot for puzzle {}: {err}", S::PUZZLE_ID),
        }
    }

    fn apply_snapshot(&mut self, delta: &Delta) {
        if self.phase == InitPhase::Initialized {
            log::debug!("snapshot for puzzle {} arrived after live state", S::PUZZLE_ID);
            return;
        }
        if !delta.matches(S::PUZZLE_ID) {
            log::debug!(
                "snapshot belongs to puzzle {:?}, not {}",
                delta.puzzle_id(),
                S::PUZZLE_ID
            );
            return;
        }
        self.phase = InitPhase::Initialized;
        self.reconcile(delta);
    }

    fn handle(&mut self, event: HostEvent) {
        match event {
            HostEvent::TimerFired { key, generation } => self.fire(&key, generation),
            HostEvent::MediaEnded(url) => {
                self.audio.on_ended(&url);
                if !self.terminal {
                    let (screen, mut fx) = self.split();
                    screen.on_media_ended(&url, &mut fx);
                }
            }
            HostEvent::PlaybackRejected(url) => {
                log::warn!("playback of {url} refused, waiting for a user gesture");
                self.audio.on_rejected(&url);
            }
            HostEvent::AudioUnlocked => {
                self.audio.on_unlocked(self.seams.audio.as_mut());
            }
        }
    }

    fn init_phase(&self) -> InitPhase {
        self.phase
    }

    fn is_terminal(&self) -> bool {
        self.terminal
    }
}
