//! Shared ownership of the mounted reconciler.
//!
//! The reconciler owns its seams, while browser callbacks created by those
//! seams need to reach back into it. Callbacks hold a [`HostLink`], a weak
//! handle bound once the reconciler exists, so no reference cycle is formed.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use escaperoom_core::{HostEvent, Reconcile};

pub type SharedReconciler = Rc<RefCell<Box<dyn Reconcile>>>;

#[derive(Clone, Default)]
pub struct HostLink(Rc<RefCell<Weak<RefCell<Box<dyn Reconcile>>>>>);

impl HostLink {
    pub fn bind(&self, reconciler: &SharedReconciler) {
        *self.0.borrow_mut() = Rc::downgrade(reconciler);
    }

    /// Run `f` against the reconciler if it is still mounted and not already
    /// borrowed further up the stack.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn Reconcile) -> R) -> Option<R> {
        let Some(reconciler) = self.0.borrow().upgrade() else {
            log::debug!("reconciler gone, dropping callback");
            return None;
        };
        let Ok(mut guard) = reconciler.try_borrow_mut() else {
            log::warn!("reconciler busy, dropping re-entrant callback");
            return None;
        };
        Some(f(guard.as_mut()))
    }

    pub fn dispatch(&self, event: HostEvent) {
        self.with(|reconciler| reconciler.handle(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escaperoom_core::testing::{
        ManualClock, ManualScheduler, RecordingAudio, RecordingOutbound, RecordingSurface,
    };
    use escaperoom_core::{ScreenCatalog, Seams};

    fn mounted(surface: &RecordingSurface) -> SharedReconciler {
        let clock = ManualClock::starting_at(0);
        let outbound = RecordingOutbound::default();
        let seams = Seams {
            surface: Box::new(surface.clone()),
            scheduler: Box::new(ManualScheduler::new(clock.clone())),
            audio: Box::new(RecordingAudio::default()),
            notifier: Box::new(outbound.clone()),
            navigator: Box::new(outbound),
            clock: Box::new(clock),
        };
        let reconciler = escaperoom_core::build(9, &ScreenCatalog::load_from_static(), seams)
            .expect("puzzle 9 exists");
        Rc::new(RefCell::new(reconciler))
    }

    #[test]
    fn unbound_link_is_inert() {
        let link = HostLink::default();
        assert_eq!(link.with(|r| r.puzzle_id()), None);
        link.dispatch(HostEvent::AudioUnlocked);
    }

    #[test]
    fn bound_link_reaches_the_reconciler() {
        let surface = RecordingSurface::default();
        let reconciler = mounted(&surface);
        let link = HostLink::default();
        link.bind(&reconciler);
        link.with(|r| r.on_message(r#"{"puzzle_id":9,"status":"half"}"#));
        assert_eq!(
            surface.attr("#p9-start", "src").as_deref(),
            Some("/static/images/puzzle9/half.png")
        );
    }

    #[test]
    fn reentrant_calls_are_refused() {
        let surface = RecordingSurface::default();
        let reconciler = mounted(&surface);
        let link = HostLink::default();
        link.bind(&reconciler);
        let _held = reconciler.borrow_mut();
        assert_eq!(link.with(|r| r.puzzle_id()), None);
    }

    #[test]
    fn dropped_reconciler_is_not_kept_alive() {
        let surface = RecordingSurface::default();
        let reconciler = mounted(&surface);
        let link = HostLink::default();
        link.bind(&reconciler);
        drop(reconciler);
        assert_eq!(link.with(|r| r.puzzle_id()), None);
    }
}
