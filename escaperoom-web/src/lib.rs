#![forbid(unsafe_code)]
//! Browser host for the escape room screens: wires the core reconciler to the
//! document, an `HtmlAudioElement`, browser timers and an `EventSource`.

use std::cell::RefCell;
use std::rc::Rc;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

use escaperoom_core::{ScreenCatalog, Seams};

pub mod audio;
pub mod channel;
pub mod dom;
pub mod error;
pub mod host;
pub mod logging;
pub mod outbound;
pub mod paths;
pub mod scheduler;
pub mod surface;

pub use error::WebError;

use audio::DomAudio;
use channel::PushChannel;
use host::{HostLink, SharedReconciler};
use outbound::{DateClock, FetchNotifier, LocationNavigator};
use scheduler::DomScheduler;
use surface::DomSurface;

/// A screen running in the page. Dropping it closes the stream and clears
/// its timers.
pub struct MountedScreen {
    reconciler: SharedReconciler,
    channel: PushChannel,
}

impl MountedScreen {
    #[must_use]
    pub fn reconciler(&self) -> &SharedReconciler {
        &self.reconciler
    }

    pub fn close(&self) {
        self.channel.close();
    }
}

thread_local! {
    static MOUNTED: RefCell<Option<MountedScreen>> = const { RefCell::new(None) };
}

/// Build the reconciler for `puzzle_id` against the live document and connect
/// the push stream.
///
/// # Errors
/// Returns an error if no document is available, the puzzle id is unknown, or
/// the audio element or event source cannot be created.
pub fn mount(puzzle_id: u8) -> Result<MountedScreen, WebError> {
    let window = dom::window().ok_or(WebError::NoWindow)?;
    let document = window.document().ok_or(WebError::NoDocument)?;
    let catalog = ScreenCatalog::load_from_static();
    let link = HostLink::default();

    let seams = Seams {
        surface: Box::new(DomSurface::new(document.clone())),
        scheduler: Box::new(DomScheduler::new(window.clone(), link.clone())),
        audio: Box::new(DomAudio::new(&document, link.clone())?),
        notifier: Box::new(FetchNotifier::new(catalog.endpoints.clone())),
        navigator: Box::new(LocationNavigator::new(window)),
        clock: Box::new(DateClock),
    };
    let reconciler: SharedReconciler = Rc::new(RefCell::new(escaperoom_core::build(
        puzzle_id, &catalog, seams,
    )?));
    link.bind(&reconciler);
    reconciler.borrow_mut().mount();
    log::info!("puzzle {puzzle_id} mounted");

    let channel = PushChannel::connect(
        &paths::asset_path(&catalog.endpoints.stream),
        paths::asset_path(&catalog.endpoints.snapshot),
        &link,
    )?;
    Ok(MountedScreen {
        reconciler,
        channel,
    })
}

/// Mount `puzzle_id`, replacing any screen already mounted in this page.
///
/// # Errors
/// Propagates [`mount`] failures to JavaScript as a string.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn mount_puzzle(puzzle_id: u8) -> Result<(), JsValue> {
    let mounted = mount(puzzle_id)?;
    MOUNTED.with(|slot| slot.replace(Some(mounted)));
    Ok(())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    let level = dom::window()
        .and_then(|win| win.location().search().ok())
        .and_then(|search| logging::level_from_query(&search))
        .unwrap_or(log::LevelFilter::Info);
    logging::init(level);

    // Templates declare their puzzle with <body data-puzzle="N">.
    let Some(raw) = dom::body_data("puzzle") else {
        return;
    };
    match raw.trim().parse::<u8>() {
        Ok(puzzle_id) => {
            if let Err(err) = mount_puzzle(puzzle_id) {
                dom::console_error(&dom::js_error_message(&err));
            }
        }
        Err(_) => log::error!("data-puzzle {raw:?} is not a puzzle id"),
    }
}

/// Unmount the current screen, if any.
pub fn unmount() {
    MOUNTED.with(|slot| slot.borrow_mut().take());
}
