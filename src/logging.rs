//! Browser console backend for the `log` facade.
//!
//! Native consumers install whatever logger they like; in the browser
//! [`crate::init`] installs this one so `debug!` and friends from the
//! simulation end up in the developer tools console.

use log::{Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::JsValue;
use web_sys::console;

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            Level::Error => console::error_1(&line),
            Level::Warn => console::warn_1(&line),
            Level::Info => console::info_1(&line),
            Level::Debug | Level::Trace => console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

/// Route `log` records at or above `level` to the browser console.
///
/// Only the first logger installed in a process takes effect; later calls
/// just adjust the level.
pub fn init_console_logger(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_err() {
        log::debug!("a logger is already installed");
    }
    log::set_max_level(level);
}
