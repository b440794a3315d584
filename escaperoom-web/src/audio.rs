//! Single `HtmlAudioElement` playback with autoplay-policy handling.
//!
//! A refused `play()` is reported to the reconciler as
//! [`HostEvent::PlaybackRejected`] and arms one-shot gesture listeners; the
//! first gesture reports [`HostEvent::AudioUnlocked`] and removes the rest.
//! While locked the element is started muted, which the policy allows, so the
//! media pipeline is warm when the real cue replays.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use escaperoom_core::{AudioSink, HostEvent};
use js_sys::Function;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{AddEventListenerOptions, Document, Event, HtmlAudioElement, VisibilityState};

use crate::dom::js_error_message;
use crate::error::WebError;
use crate::host::HostLink;
use crate::paths::asset_path;

const GESTURES: [&str; 3] = ["pointerdown", "keydown", "touchstart"];

#[derive(Default)]
struct UnlockGate {
    armed: Cell<bool>,
    listener: RefCell<Option<Closure<dyn FnMut(Event)>>>,
}

impl UnlockGate {
    fn arm(self: &Rc<Self>, document: &Document, link: &HostLink) {
        if self.armed.replace(true) {
            return;
        }
        // The listener is built once and re-registered on later arms, so it is
        // never dropped while a gesture is being dispatched through it.
        let mut slot = self.listener.borrow_mut();
        let listener = slot.get_or_insert_with(|| {
            let gate: Weak<Self> = Rc::downgrade(self);
            let doc = document.clone();
            let link = link.clone();
            Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
                if let Some(gate) = gate.upgrade() {
                    gate.disarm(&doc);
                }
                log::info!("user gesture, audio unlocked");
                link.dispatch(HostEvent::AudioUnlocked);
            })
        });
        let options = AddEventListenerOptions::new();
        options.set_once(true);
        let function: &Function = listener.as_ref().unchecked_ref();
        for gesture in GESTURES {
            if let Err(err) = document
                .add_event_listener_with_callback_and_add_event_listener_options(
                    gesture, function, &options,
                )
            {
                log::warn!("could not listen for {gesture}: {}", js_error_message(&err));
            }
        }
    }

    fn disarm(&self, document: &Document) {
        if !self.armed.replace(false) {
            return;
        }
        if let Some(listener) = self.listener.borrow().as_ref() {
            let function: &Function = listener.as_ref().unchecked_ref();
            for gesture in GESTURES {
                let _ = document.remove_event_listener_with_callback(gesture, function);
            }
        }
    }
}

pub struct DomAudio {
    element: HtmlAudioElement,
    document: Document,
    link: HostLink,
    /// URL of the cue the element is playing, as the reconciler named it.
    current: Rc<RefCell<Option<String>>>,
    gate: Rc<UnlockGate>,
    on_ended: Closure<dyn FnMut(Event)>,
    on_visible: Closure<dyn FnMut(Event)>,
}

impl DomAudio {
    /// Create the audio element and its `ended`/`visibilitychange` listeners.
    ///
    /// # Errors
    /// Returns an error if the element cannot be created or listened to.
    pub fn new(document: &Document, link: HostLink) -> Result<Self, WebError> {
        let element = HtmlAudioElement::new()?;
        element.set_preload("auto");
        element.set_attribute("playsinline", "")?;

        let current: Rc<RefCell<Option<String>>> = Rc::default();
        let ended_link = link.clone();
        let ended_current = Rc::clone(&current);
        let on_ended = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            let finished = ended_current.borrow_mut().take();
            if let Some(url) = finished {
                ended_link.dispatch(HostEvent::MediaEnded(url));
            }
        });
        element.add_event_listener_with_callback("ended", on_ended.as_ref().unchecked_ref())?;

        let gate: Rc<UnlockGate> = Rc::default();
        let visible_gate = Rc::clone(&gate);
        let visible_doc = document.clone();
        let visible_link = link.clone();
        let on_visible = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            // Pages opened in the background may have been refused; retry once shown.
            if visible_doc.visibility_state() == VisibilityState::Visible
                && visible_gate.armed.get()
            {
                log::debug!("page visible again, retrying parked audio");
                visible_link.dispatch(HostEvent::AudioUnlocked);
            }
        });
        document.add_event_listener_with_callback(
            "visibilitychange",
            on_visible.as_ref().unchecked_ref(),
        )?;

        Ok(Self {
            element,
            document: document.clone(),
            link,
            current,
            gate,
            on_ended,
            on_visible,
        })
    }

    fn warm_muted(element: &HtmlAudioElement) {
        element.set_muted(true);
        if let Ok(promise) = element.play() {
            spawn_local(async move {
                let _ = JsFuture::from(promise).await;
            });
        }
    }

    /// `play()` threw synchronously, so the reconciler is still on the stack;
    /// report on the next microtask.
    fn refused(&self, url: String) {
        self.current.borrow_mut().take();
        self.gate.arm(&self.document, &self.link);
        Self::warm_muted(&self.element);
        let link = self.link.clone();
        spawn_local(async move {
            link.dispatch(HostEvent::PlaybackRejected(url));
        });
    }
}

impl AudioSink for DomAudio {
    fn play(&mut self, url: &str) {
        *self.current.borrow_mut() = Some(url.to_string());
        self.element.set_muted(false);
        self.element.set_src(&asset_path(url));
        let promise = match self.element.play() {
            Ok(promise) => promise,
            Err(err) => {
                log::warn!("play() threw for {url}: {}", js_error_message(&err));
                self.refused(url.to_string());
                return;
            }
        };

        let url = url.to_string();
        let element = self.element.clone();
        let document = self.document.clone();
        let link = self.link.clone();
        let current = Rc::clone(&self.current);
        let gate = Rc::clone(&self.gate);
        spawn_local(async move {
            match JsFuture::from(promise).await {
                Ok(_) => gate.disarm(&document),
                Err(err) => {
                    let still_current = current.borrow().as_deref() == Some(url.as_str());
                    if !still_current {
                        // Interrupted by the next cue, not refused.
                        return;
                    }
                    log::warn!("playback of {url} refused: {}", js_error_message(&err));
                    current.borrow_mut().take();
                    gate.arm(&document, &link);
                    Self::warm_muted(&element);
                    link.dispatch(HostEvent::PlaybackRejected(url));
                }
            }
        });
    }

    fn stop(&mut self) {
        self.current.borrow_mut().take();
        if let Err(err) = self.element.pause() {
            log::debug!("pause failed: {}", js_error_message(&err));
        }
        self.element.set_current_time(0.0);
    }
}

impl Drop for DomAudio {
    fn drop(&mut self) {
        let _ = self.element.pause();
        self.gate.disarm(&self.document);
        let _ = self
            .element
            .remove_event_listener_with_callback("ended", self.on_ended.as_ref().unchecked_ref());
        let _ = self.document.remove_event_listener_with_callback(
            "visibilitychange",
            self.on_visible.as_ref().unchecked_ref(),
        );
    }
}
