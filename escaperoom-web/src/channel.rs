//! The push channel: an `EventSource` feeding the reconciler.
//!
//! Reconnection is left to the browser. On every `open` the reconciler
//! decides whether the one-time snapshot is still wanted.

use escaperoom_core::OpenActions;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Event, EventSource, MessageEvent};

use crate::dom::{fetch_text, js_error_message};
use crate::error::WebError;
use crate::host::HostLink;

pub struct PushChannel {
    source: EventSource,
    _on_open: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut(Event)>,
}

#[allow(clippy::future_not_send)]
async fn load_snapshot(url: String, link: HostLink) {
    match fetch_text(&url).await {
        Ok(text) => {
            link.with(|reconciler| reconciler.on_snapshot_text(&text));
        }
        Err(err) => log::warn!("snapshot from {url} failed: {}", js_error_message(&err)),
    }
}

impl PushChannel {
    /// Open `stream_url` and route its traffic through `link`.
    ///
    /// # Errors
    /// Returns an error if the `EventSource` cannot be created.
    pub fn connect(
        stream_url: &str,
        snapshot_url: String,
        link: &HostLink,
    ) -> Result<Self, WebError> {
        let source = EventSource::new(stream_url)?;

        let open_link = link.clone();
        let on_open = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            log::info!("state stream open");
            let actions: OpenActions = open_link
                .with(|reconciler| reconciler.on_channel_open())
                .unwrap_or_default();
            if actions.fetch_snapshot {
                spawn_local(load_snapshot(snapshot_url.clone(), open_link.clone()));
            }
        });

        let message_link = link.clone();
        let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            match event.data().as_string() {
                Some(text) => {
                    message_link.with(|reconciler| reconciler.on_message(&text));
                }
                None => log::warn!("non-text message on state stream"),
            }
        });

        let error_source = source.clone();
        let on_error = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            // The browser reconnects on its own unless the source was closed.
            log::error!(
                "state stream error (readyState {})",
                error_source.ready_state()
            );
        });

        source.set_onopen(Some(on_open.as_ref().unchecked_ref()));
        source.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        source.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        Ok(Self {
            source,
            _on_open: on_open,
            _on_message: on_message,
            _on_error: on_error,
        })
    }

    pub fn close(&self) {
        self.source.close();
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.source.set_onopen(None);
        self.source.set_onmessage(None);
        self.source.set_onerror(None);
        self.source.close();
    }
}
