//! Fire-and-forget notifications, page navigation and the wall clock.

use escaperoom_core::{Clock, Endpoints, Navigator, Notification, Notifier};
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{Request, RequestInit, Response, Window};

use crate::dom::{self, js_error_message};
use crate::paths::asset_path;

pub struct FetchNotifier {
    endpoints: Endpoints,
}

impl FetchNotifier {
    #[must_use]
    pub const fn new(endpoints: Endpoints) -> Self {
        Self { endpoints }
    }
}

#[allow(clippy::future_not_send)]
async fn post_json(url: &str, body: &str) -> Result<(), JsValue> {
    let win = dom::window().ok_or_else(|| JsValue::from_str("window unavailable"))?;
    let init = RequestInit::new();
    init.set_method("POST");
    init.set_body(&JsValue::from_str(body));
    let request = Request::new_with_str_and_init(url, &init)?;
    request.headers().set("Content-Type", "application/json")?;
    let resp: Response = JsFuture::from(win.fetch_with_request(&request))
        .await?
        .dyn_into()?;
    if resp.ok() {
        Ok(())
    } else {
        Err(JsValue::from_str(&format!("status {}", resp.status())))
    }
}

impl Notifier for FetchNotifier {
    fn notify(&mut self, notification: Notification) {
        let url = asset_path(&self.endpoints.path_for(notification));
        let body = serde_json::to_string(&notification).unwrap_or_else(|_| "{}".to_string());
        log::debug!("POST {url}");
        spawn_local(async move {
            if let Err(err) = post_json(&url, &body).await {
                log::warn!("notification to {url} failed: {}", js_error_message(&err));
            }
        });
    }
}

pub struct LocationNavigator {
    window: Window,
}

impl LocationNavigator {
    #[must_use]
    pub const fn new(window: Window) -> Self {
        Self { window }
    }
}

impl Navigator for LocationNavigator {
    fn navigate(&mut self, url: &str) {
        let target = asset_path(url);
        log::info!("navigating to {target}");
        if let Err(err) = self.window.location().set_href(&target) {
            log::error!("navigation to {target} failed: {}", js_error_message(&err));
        }
    }
}

/// `Date.now()`; wall-clock so server epochs line up with local deadlines.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateClock;

impl Clock for DateClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> i64 {
        js_sys::Date::now() as i64
    }
}
