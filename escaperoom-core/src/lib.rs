//! Escape Room Screens Core
//!
//! Platform-agnostic reconciliation of pushed puzzle state into screen effects.
//! This crate knows nothing about the browser: rendering, timers, playback,
//! outbound requests and the clock are reached through the traits in
//! [`render`], [`timer`], [`audio`] and [`outbound`], implemented by
//! `escaperoom-web` in the page and by [`testing`] in tests and the tester CLI.

pub mod audio;
pub mod config;
pub mod countdown;
pub mod delta;
pub mod engine;
pub mod outbound;
pub mod render;
pub mod screens;
pub mod testing;
pub mod timer;

// Re-export commonly used types
pub use audio::{AudioChannel, AudioSink, Sound};
pub use config::{ConfigError, Endpoints, OpenPolicy, ScreenCatalog, ScreenConfig, SoundBank};
pub use countdown::{Countdown, format_clock, format_seconds_es};
pub use delta::{Delta, ReconcileError};
pub use engine::{
    Effects, Expiry, Flow, HostEvent, InitPhase, OpenActions, Reconcile, Reconciler, Screen,
    Seams, Undo,
};
pub use outbound::{Navigator, Notification, Notifier};
pub use render::{Node, Surface};
pub use screens::build;
pub use timer::{Clock, Scheduler, TimerKey, TimerSlots};
