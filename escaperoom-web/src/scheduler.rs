//! `setTimeout`/`setInterval` behind the core [`Scheduler`] seam.

use std::collections::BTreeMap;

use escaperoom_core::{HostEvent, Scheduler, TimerKey};
use js_sys::Function;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::Window;

use crate::dom::js_error_message;
use crate::host::HostLink;

struct Handle {
    generation: u64,
    id: i32,
    repeat: bool,
    // Dropping the closure invalidates the JS callback.
    _callback: Closure<dyn FnMut()>,
}

pub struct DomScheduler {
    window: Window,
    link: HostLink,
    handles: BTreeMap<TimerKey, Handle>,
}

impl DomScheduler {
    #[must_use]
    pub fn new(window: Window, link: HostLink) -> Self {
        Self {
            window,
            link,
            handles: BTreeMap::new(),
        }
    }

    fn clear(&mut self, key: &TimerKey) {
        if let Some(handle) = self.handles.remove(key) {
            if handle.repeat {
                self.window.clear_interval_with_handle(handle.id);
            } else {
                self.window.clear_timeout_with_handle(handle.id);
            }
        }
    }
}

impl Scheduler for DomScheduler {
    fn start(&mut self, key: &TimerKey, generation: u64, delay_ms: u32, repeat: bool) {
        self.clear(key);
        let link = self.link.clone();
        let fired = key.clone();
        let callback = Closure::<dyn FnMut()>::new(move || {
            link.dispatch(HostEvent::TimerFired {
                key: fired.clone(),
                generation,
            });
        });
        let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
        let function: &Function = callback.as_ref().unchecked_ref();
        let id = if repeat {
            self.window
                .set_interval_with_callback_and_timeout_and_arguments_0(function, delay)
        } else {
            self.window
                .set_timeout_with_callback_and_timeout_and_arguments_0(function, delay)
        };
        match id {
            Ok(id) => {
                self.handles.insert(
                    key.clone(),
                    Handle {
                        generation,
                        id,
                        repeat,
                        _callback: callback,
                    },
                );
            }
            Err(err) => log::error!("could not schedule {key}: {}", js_error_message(&err)),
        }
    }

    fn cancel(&mut self, key: &TimerKey, generation: u64) {
        if self
            .handles
            .get(key)
            .is_some_and(|handle| handle.generation == generation)
        {
            self.clear(key);
        }
    }
}

impl Drop for DomScheduler {
    fn drop(&mut self) {
        let keys: Vec<TimerKey> = self.handles.keys().cloned().collect();
        for key in keys {
            self.clear(&key);
        }
    }
}
