//! `log` backend writing to the browser console.

use log::{Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::JsValue;

/// `env_logger` has no wasm target, so records from both crates land here
/// and map onto the matching `console` method.
struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

fn format_record(level: Level, target: &str, message: &str) -> String {
    format!("[{level}] {target}: {message}")
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_record(
            record.level(),
            record.target(),
            &record.args().to_string(),
        );
        let line = JsValue::from(line);
        match record.level() {
            Level::Error => web_sys::console::error_1(&line),
            Level::Warn => web_sys::console::warn_1(&line),
            Level::Info => web_sys::console::info_1(&line),
            Level::Debug | Level::Trace => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

/// Install the console logger. A second call keeps the first logger.
pub fn init(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

/// `?log=debug` style override read from the page URL.
#[must_use]
pub fn level_from_query(search: &str) -> Option<LevelFilter> {
    search
        .trim_start_matches('?')
        .split('&')
        .find_map(|pair| pair.strip_prefix("log="))
        .and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_carry_level_and_target() {
        assert_eq!(
            format_record(Level::Warn, "escaperoom_core::engine", "dropped"),
            "[WARN] escaperoom_core::engine: dropped"
        );
    }

    #[test]
    fn query_overrides_level() {
        assert_eq!(level_from_query("?log=debug"), Some(LevelFilter::Debug));
        assert_eq!(level_from_query("?a=1&log=warn"), Some(LevelFilter::Warn));
        assert_eq!(level_from_query("?log=loud"), None);
        assert_eq!(level_from_query(""), None);
    }
}
