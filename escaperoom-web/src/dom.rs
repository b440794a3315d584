use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, Response, Window};

/// Retrieve the global `window` object, if running in a browser.
#[must_use]
pub fn window() -> Option<Window> {
    web_sys::window()
}

/// Retrieve the document of the current window.
#[must_use]
pub fn document() -> Option<Document> {
    window().and_then(|win| win.document())
}

/// Convert a JavaScript value into a readable string for error reporting.
#[must_use]
pub fn js_error_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|err| err.message().into())
        })
        .unwrap_or_else(|| format!("{value:?}"))
}

/// Log an error message to the browser console.
pub fn console_error(message: &str) {
    web_sys::console::error_1(&JsValue::from(message));
}

/// `data-*` attribute of `<body>`, used by templates to pass the puzzle id.
#[must_use]
pub fn body_data(name: &str) -> Option<String> {
    document()
        .and_then(|doc| doc.body())
        .and_then(|body| body.get_attribute(&format!("data-{name}")))
}

/// Perform a GET and return the browser `Response`.
///
/// # Errors
/// Returns an error if no window is available, the request fails, or the
/// result is not a `Response`.
#[allow(clippy::future_not_send)] // Wasm futures rely on `JsFuture`, which is not `Send`.
pub async fn fetch_response(url: &str) -> Result<Response, JsValue> {
    let win = window().ok_or_else(|| JsValue::from_str("window unavailable"))?;
    let resp_value = JsFuture::from(win.fetch_with_str(url)).await?;
    resp_value.dyn_into::<Response>()
}

/// GET `url` and return its body as text. Non-2xx statuses are errors.
///
/// # Errors
/// Returns an error if the fetch fails, the status is not OK, or the body
/// cannot be read as text.
#[allow(clippy::future_not_send)]
pub async fn fetch_text(url: &str) -> Result<String, JsValue> {
    let resp = fetch_response(url).await?;
    if !resp.ok() {
        return Err(JsValue::from_str(&format!("{url} returned {}", resp.status())));
    }
    let text = JsFuture::from(resp.text()?).await?;
    text.as_string()
        .ok_or_else(|| JsValue::from_str("response body is not text"))
}
