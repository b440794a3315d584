//! Best-effort messages leaving the screen: notifications and navigation.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "puzzle_id", rename_all = "snake_case")]
pub enum Notification {
    PuzzleStarted(u8),
    TimerExpired,
    SampleFinished,
}

/// Fire-and-forget POSTs. Failures are logged by the implementation and never
/// reported back to the reconciler.
pub trait Notifier {
    fn notify(&mut self, notification: Notification);
}

pub trait Navigator {
    fn navigate(&mut self, url: &str);
}
