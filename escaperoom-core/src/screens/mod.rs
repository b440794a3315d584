//! The nine puzzle screens.
//!
//! Each screen is a [`Screen`](crate::engine::Screen) implementation holding
//! its local render state and the selectors it writes to. [`build`] wires one
//! up with its catalog entry and host seams.

pub mod boxes;
pub mod power_countdown;
pub mod progress_bars;
pub mod quiz;
pub mod song_sequence;
pub mod status_image;
pub mod sum_grid;
pub mod symbols;
pub mod timing_rounds;

pub use boxes::Boxes;
pub use power_countdown::PowerCountdown;
pub use progress_bars::ProgressBars;
pub use quiz::Quiz;
pub use song_sequence::SongSequence;
pub use status_image::StatusImage;
pub use sum_grid::SumGrid;
pub use symbols::Symbols;
pub use timing_rounds::TimingRounds;

use crate::config::{ConfigError, ScreenCatalog};
use crate::engine::{Reconcile, Reconciler, Screen, Seams};

pub const PUZZLE_IDS: std::ops::RangeInclusive<u8> = 1..=9;

fn wire<S: Screen + 'static>(
    screen: S,
    catalog: &ScreenCatalog,
    seams: Seams,
) -> Result<Box<dyn Reconcile>, ConfigError> {
    let config = catalog.screen(S::PUZZLE_ID)?.clone();
    Ok(Box::new(Reconciler::new(
        screen,
        config,
        catalog.sounds.clone(),
        seams,
    )))
}

/// Build the reconciler for `puzzle_id` with default selectors.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownPuzzle`] for ids without a screen or catalog entry.
pub fn build(
    puzzle_id: u8,
    catalog: &ScreenCatalog,
    seams: Seams,
) -> Result<Box<dyn Reconcile>, ConfigError> {
    match puzzle_id {
        1 => wire(SumGrid::default(), catalog, seams),
        2 => wire(ProgressBars::default(), catalog, seams),
        3 => wire(Quiz::default(), catalog, seams),
        4 => wire(SongSequence::default(), catalog, seams),
        5 => wire(TimingRounds::default(), catalog, seams),
        6 => wire(PowerCountdown::default(), catalog, seams),
        7 => wire(Boxes::default(), catalog, seams),
        8 => wire(Symbols::default(), catalog, seams),
        9 => wire(StatusImage::default(), catalog, seams),
        other => Err(ConfigError::UnknownPuzzle(other)),
    }
}
