//! Timer ownership: one live handle per purpose.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Logical purpose of a timer ("countdown", "banner", "error-flash:3", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerKey(Cow<'static, str>);

impl TimerKey {
    #[must_use]
    pub const fn fixed(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    #[must_use]
    pub fn indexed(prefix: &str, index: impl fmt::Display) -> Self {
        Self(Cow::Owned(format!("{prefix}:{index}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Index part of an [`indexed`](Self::indexed) key with the given prefix.
    #[must_use]
    pub fn index_of(&self, prefix: &str) -> Option<&str> {
        self.0
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(':'))
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host timer facility (`setTimeout`/`setInterval` in the browser).
///
/// Implementations report fires back as
/// [`HostEvent::TimerFired`](crate::engine::HostEvent::TimerFired) carrying the
/// same key and generation they were started with.
pub trait Scheduler {
    fn start(&mut self, key: &TimerKey, generation: u64, delay_ms: u32, repeat: bool);
    fn cancel(&mut self, key: &TimerKey, generation: u64);
}

/// Wall-clock source. Countdowns read it on every tick instead of counting
/// callbacks, since hosts do not fire timers exactly on schedule.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveTimer {
    generation: u64,
    repeating: bool,
}

/// Generation bookkeeping for every timer a reconciler owns.
#[derive(Debug, Default)]
pub struct TimerSlots {
    next_generation: u64,
    active: BTreeMap<TimerKey, ActiveTimer>,
}

impl TimerSlots {
    /// Start `key`, cancelling any handle already running for it.
    pub fn start(
        &mut self,
        scheduler: &mut dyn Scheduler,
        key: TimerKey,
        delay_ms: u32,
        repeat: bool,
    ) -> u64 {
        self.cancel(scheduler, &key);
        self.next_generation += 1;
        let generation = self.next_generation;
        scheduler.start(&key, generation, delay_ms, repeat);
        self.active.insert(
            key,
            ActiveTimer {
                generation,
                repeating: repeat,
            },
        );
        generation
    }

    pub fn cancel(&mut self, scheduler: &mut dyn Scheduler, key: &TimerKey) -> bool {
        match self.active.remove(key) {
            Some(timer) => {
                scheduler.cancel(key, timer.generation);
                true
            }
            None => false,
        }
    }

    /// Cancel every handle whose key satisfies `doomed`, keeping the rest.
    pub fn cancel_where(
        &mut self,
        scheduler: &mut dyn Scheduler,
        mut doomed: impl FnMut(&TimerKey) -> bool,
    ) {
        let keys: Vec<TimerKey> = self.active.keys().filter(|k| doomed(k)).cloned().collect();
        for key in keys {
            self.cancel(scheduler, &key);
        }
    }

    /// Whether a fire is current. One-shot timers retire on acceptance.
    pub fn accept(&mut self, key: &TimerKey, generation: u64) -> bool {
        match self.active.get(key) {
            Some(timer) if timer.generation == generation => {
                if !timer.repeating {
                    self.active.remove(key);
                }
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_active(&self, key: &TimerKey) -> bool {
        self.active.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
