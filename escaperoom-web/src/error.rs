use escaperoom_core::ConfigError;
use thiserror::Error;
use wasm_bindgen::JsValue;

use crate::dom::js_error_message;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("browser window unavailable")]
    NoWindow,
    #[error("document unavailable")]
    NoDocument,
    #[error("JavaScript error: {0}")]
    Js(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<JsValue> for WebError {
    fn from(value: JsValue) -> Self {
        Self::Js(js_error_message(&value))
    }
}

impl From<WebError> for JsValue {
    fn from(err: WebError) -> Self {
        Self::from_str(&err.to_string())
    }
}
