//! In-memory host seams and a driver for replaying push traffic.
//!
//! Used by the integration tests and by `escaperoom-tester`. Every double hands
//! out a cheap clone sharing the same state, so the boxed copy given to the
//! reconciler and the copy kept by the caller observe the same thing.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use crate::audio::AudioSink;
use crate::config::{ConfigError, ScreenCatalog};
use crate::engine::{HostEvent, InitPhase, OpenActions, Reconcile, Seams};
use crate::outbound::{Navigator, Notification, Notifier};
use crate::render::{Node, Surface};
use crate::screens;
use crate::timer::{Clock, Scheduler, TimerKey};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Element {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub classes: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Element {
    fn from_node(node: &Node) -> Self {
        Self {
            text: node.text.clone(),
            classes: node.classes.iter().cloned().collect(),
            attrs: node.attrs.iter().cloned().collect(),
            style: BTreeMap::new(),
            children: node.children.clone(),
        }
    }
}

/// Render model keyed by selector. Elements created through
/// [`Surface::replace_children`] are also reachable as `#id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SurfaceModel {
    pub elements: BTreeMap<String, Element>,
}

impl SurfaceModel {
    fn element(&mut self, target: &str) -> &mut Element {
        self.elements.entry(target.to_string()).or_default()
    }

    fn register(&mut self, node: &Node) {
        let mut all = Vec::new();
        node.walk(&mut all);
        for descendant in all {
            if let Some(id) = &descendant.id {
                self.elements
                    .insert(format!("#{id}"), Element::from_node(descendant));
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingSurface(Rc<RefCell<SurfaceModel>>);

impl RecordingSurface {
    #[must_use]
    pub fn model(&self) -> SurfaceModel {
        self.0.borrow().clone()
    }

    #[must_use]
    pub fn text(&self, target: &str) -> Option<String> {
        self.0
            .borrow()
            .elements
            .get(target)
            .and_then(|el| el.text.clone())
    }

    #[must_use]
    pub fn has_class(&self, target: &str, class: &str) -> bool {
        self.0
            .borrow()
            .elements
            .get(target)
            .is_some_and(|el| el.classes.contains(class))
    }

    #[must_use]
    pub fn attr(&self, target: &str, name: &str) -> Option<String> {
        self.0
            .borrow()
            .elements
            .get(target)
            .and_then(|el| el.attrs.get(name).cloned())
    }

    #[must_use]
    pub fn style(&self, target: &str, property: &str) -> Option<String> {
        self.0
            .borrow()
            .elements
            .get(target)
            .and_then(|el| el.style.get(property).cloned())
    }

    #[must_use]
    pub fn children(&self, target: &str) -> Vec<Node> {
        self.0
            .borrow()
            .elements
            .get(target)
            .map(|el| el.children.clone())
            .unwrap_or_default()
    }
}

impl Surface for RecordingSurface {
    fn set_text(&mut self, target: &str, text: &str) {
        let mut model = self.0.borrow_mut();
        let el = model.element(target);
        el.text = Some(text.to_string());
        el.children.clear();
    }

    fn set_class(&mut self, target: &str, class: &str, on: bool) {
        let mut model = self.0.borrow_mut();
        let el = model.element(target);
        if on {
            el.classes.insert(class.to_string());
        } else {
            el.classes.remove(class);
        }
    }

    fn clear_class_prefix(&mut self, target: &str, prefix: &str) {
        self.0
            .borrow_mut()
            .element(target)
            .classes
            .retain(|class| !class.starts_with(prefix));
    }

    fn set_attr(&mut self, target: &str, name: &str, value: &str) {
        let mut model = self.0.borrow_mut();
        let el = model.element(target);
        if name == "class" {
            el.classes = value.split_whitespace().map(str::to_string).collect();
        } else {
            el.attrs.insert(name.to_string(), value.to_string());
        }
    }

    fn set_style(&mut self, target: &str, property: &str, value: &str) {
        self.0
            .borrow_mut()
            .element(target)
            .style
            .insert(property.to_string(), value.to_string());
    }

    fn replace_children(&mut self, target: &str, children: &[Node]) {
        let mut model = self.0.borrow_mut();
        let el = model.element(target);
        el.text = None;
        el.children = children.to_vec();
        for child in children {
            model.register(child);
        }
    }

    fn ensure_child(&mut self, parent: &str, node: &Node) {
        let mut model = self.0.borrow_mut();
        if let Some(id) = &node.id
            && model.elements.contains_key(&format!("#{id}"))
        {
            return;
        }
        model.element(parent).children.push(node.clone());
        model.register(node);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AudioLog {
    pub played: Vec<String>,
    pub stops: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingAudio(Rc<RefCell<AudioLog>>);

impl RecordingAudio {
    #[must_use]
    pub fn log(&self) -> AudioLog {
        self.0.borrow().clone()
    }

    #[must_use]
    pub fn played(&self) -> Vec<String> {
        self.0.borrow().played.clone()
    }

    #[must_use]
    pub fn count(&self, url: &str) -> usize {
        self.0.borrow().played.iter().filter(|u| *u == url).count()
    }
}

impl AudioSink for RecordingAudio {
    fn play(&mut self, url: &str) {
        self.0.borrow_mut().played.push(url.to_string());
    }

    fn stop(&mut self) {
        self.0.borrow_mut().stops += 1;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManualClock(Rc<Cell<i64>>);

impl ManualClock {
    #[must_use]
    pub fn starting_at(now_ms: i64) -> Self {
        Self(Rc::new(Cell::new(now_ms)))
    }

    pub fn set(&self, now_ms: i64) {
        self.0.set(now_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.get()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingTimer {
    key: TimerKey,
    generation: u64,
    due_ms: i64,
    period_ms: Option<u32>,
    seq: u64,
}

#[derive(Debug, Default)]
struct SchedulerState {
    pending: Vec<PendingTimer>,
    next_seq: u64,
}

/// Timers that fire only when [`Harness::advance`] moves the clock.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    state: Rc<RefCell<SchedulerState>>,
    clock: ManualClock,
}

impl ManualScheduler {
    #[must_use]
    pub fn new(clock: ManualClock) -> Self {
        Self {
            state: Rc::default(),
            clock,
        }
    }

    /// Live host timers registered under `key`.
    #[must_use]
    pub fn active_count(&self, key: &str) -> usize {
        self.state
            .borrow()
            .pending
            .iter()
            .filter(|t| t.key.as_str() == key)
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().pending.is_empty()
    }

    /// Pop the earliest timer due at or before `until_ms`, rescheduling intervals.
    fn next_due(&self, until_ms: i64) -> Option<(TimerKey, u64, i64)> {
        let mut state = self.state.borrow_mut();
        let index = state
            .pending
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_ms <= until_ms)
            .min_by_key(|(_, t)| (t.due_ms, t.seq))
            .map(|(index, _)| index)?;
        let timer = state.pending.remove(index);
        if let Some(period) = timer.period_ms {
            state.next_seq += 1;
            let seq = state.next_seq;
            state.pending.push(PendingTimer {
                due_ms: timer.due_ms + i64::from(period.max(1)),
                seq,
                ..timer.clone()
            });
        }
        Some((timer.key, timer.generation, timer.due_ms))
    }
}

impl Scheduler for ManualScheduler {
    fn start(&mut self, key: &TimerKey, generation: u64, delay_ms: u32, repeat: bool) {
        let due_ms = self.clock.now_ms() + i64::from(delay_ms);
        let mut state = self.state.borrow_mut();
        state.next_seq += 1;
        let seq = state.next_seq;
        state.pending.push(PendingTimer {
            key: key.clone(),
            generation,
            due_ms,
            period_ms: repeat.then_some(delay_ms),
            seq,
        });
    }

    fn cancel(&mut self, key: &TimerKey, generation: u64) {
        self.state
            .borrow_mut()
            .pending
            .retain(|t| !(t.key == *key && t.generation == generation));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutboundLog {
    pub notifications: Vec<Notification>,
    pub navigations: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingOutbound(Rc<RefCell<OutboundLog>>);

impl RecordingOutbound {
    #[must_use]
    pub fn log(&self) -> OutboundLog {
        self.0.borrow().clone()
    }

    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        self.0.borrow().navigations.clone()
    }

    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.0.borrow().notifications.clone()
    }
}

impl Notifier for RecordingOutbound {
    fn notify(&mut self, notification: Notification) {
        self.0.borrow_mut().notifications.push(notification);
    }
}

impl Navigator for RecordingOutbound {
    fn navigate(&mut self, url: &str) {
        self.0.borrow_mut().navigations.push(url.to_string());
    }
}

/// Everything observable about a screen after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observed {
    pub puzzle_id: u8,
    pub terminal: bool,
    pub surface: SurfaceModel,
    pub audio: AudioLog,
    pub outbound: OutboundLog,
}

/// A mounted screen wired to recording doubles.
pub struct Harness {
    reconciler: Box<dyn Reconcile>,
    pub surface: RecordingSurface,
    pub audio: RecordingAudio,
    pub scheduler: ManualScheduler,
    pub clock: ManualClock,
    pub outbound: RecordingOutbound,
}

impl Harness {
    /// Mount `puzzle_id` using the bundled catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPuzzle`] for ids without a screen.
    pub fn new(puzzle_id: u8) -> Result<Self, ConfigError> {
        Self::with_catalog(puzzle_id, &ScreenCatalog::load_from_static())
    }

    /// Mount `puzzle_id` against an explicit catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPuzzle`] for ids without a screen or entry.
    pub fn with_catalog(puzzle_id: u8, catalog: &ScreenCatalog) -> Result<Self, ConfigError> {
        let surface = RecordingSurface::default();
        let audio = RecordingAudio::default();
        let clock = ManualClock::starting_at(1_700_000_000_000);
        let scheduler = ManualScheduler::new(clock.clone());
        let outbound = RecordingOutbound::default();
        let seams = Seams {
            surface: Box::new(surface.clone()),
            scheduler: Box::new(scheduler.clone()),
            audio: Box::new(audio.clone()),
            notifier: Box::new(outbound.clone()),
            navigator: Box::new(outbound.clone()),
            clock: Box::new(clock.clone()),
        };
        let mut reconciler = screens::build(puzzle_id, catalog, seams)?;
        reconciler.mount();
        Ok(Self {
            reconciler,
            surface,
            audio,
            scheduler,
            clock,
            outbound,
        })
    }

    #[must_use]
    pub fn reconciler(&self) -> &dyn Reconcile {
        self.reconciler.as_ref()
    }

    #[must_use]
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn open(&mut self) -> OpenActions {
        self.reconciler.on_channel_open()
    }

    pub fn push(&mut self, delta: &Value) {
        self.reconciler.on_message(&delta.to_string());
    }

    pub fn push_raw(&mut self, text: &str) {
        self.reconciler.on_message(text);
    }

    pub fn snapshot(&mut self, snapshot: &Value) {
        self.reconciler.on_snapshot_text(&snapshot.to_string());
    }

    /// Move the clock forward, firing every timer that comes due on the way.
    pub fn advance(&mut self, ms: u32) {
        let target = self.clock.now_ms() + i64::from(ms);
        while let Some((key, generation, due_ms)) = self.scheduler.next_due(target) {
            self.clock.set(due_ms.max(self.clock.now_ms()));
            self.reconciler
                .handle(HostEvent::TimerFired { key, generation });
        }
        self.clock.set(target);
    }

    pub fn media_ended(&mut self, url: &str) {
        self.reconciler
            .handle(HostEvent::MediaEnded(url.to_string()));
    }

    pub fn audio_rejected(&mut self, url: &str) {
        self.reconciler
            .handle(HostEvent::PlaybackRejected(url.to_string()));
    }

    pub fn audio_unlocked(&mut self) {
        self.reconciler.handle(HostEvent::AudioUnlocked);
    }

    #[must_use]
    pub fn init_phase(&self) -> InitPhase {
        self.reconciler.init_phase()
    }

    #[must_use]
    pub fn observe(&self) -> Observed {
        Observed {
            puzzle_id: self.reconciler.puzzle_id(),
            terminal: self.reconciler.is_terminal(),
            surface: self.surface.model(),
            audio: self.audio.log(),
            outbound: self.outbound.log(),
        }
    }
}
