//! Browser implementations of the domain's logging, time and settings seams.

use crate::domain::{
    config::SettingsStore,
    errors::{DomainError, Result},
    logging::{LogEntry, LogLevel, Logger, TimeProvider},
};

/// Logger writing to the browser console
pub struct ConsoleLogger {
    min_level: LogLevel,
}

impl ConsoleLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    pub fn new_production() -> Self {
        Self::new(LogLevel::Info)
    }

    pub fn new_development() -> Self {
        Self::new(LogLevel::Debug)
    }
}

impl Logger for ConsoleLogger {
    fn log(&self, entry: LogEntry) {
        if entry.level < self.min_level {
            return;
        }
        let line = entry.format_line(&BrowserTimeProvider.format_timestamp(entry.timestamp));
        let value = wasm_bindgen::JsValue::from(line);
        match entry.level {
            LogLevel::Trace | LogLevel::Debug => web_sys::console::debug_1(&value),
            LogLevel::Info => web_sys::console::info_1(&value),
            LogLevel::Warn => web_sys::console::warn_1(&value),
            LogLevel::Error => web_sys::console::error_1(&value),
        }
    }
}

/// Wall-clock milliseconds from `Date.now()`
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserTimeProvider;

impl BrowserTimeProvider {
    pub fn new() -> Self {
        Self
    }
}

impl TimeProvider for BrowserTimeProvider {
    fn current_timestamp(&self) -> u64 {
        js_sys::Date::now() as u64
    }

    fn format_timestamp(&self, timestamp: u64) -> String {
        let date = js_sys::Date::new(&(timestamp as f64).into());
        format!(
            "{:02}:{:02}:{:02}.{:03}",
            date.get_hours(),
            date.get_minutes(),
            date.get_seconds(),
            date.get_milliseconds()
        )
    }
}

/// Settings persisted in `window.localStorage`
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorageSettings;

impl LocalStorageSettings {
    pub fn new() -> Self {
        Self
    }

    fn storage(&self) -> Option<web_sys::Storage> {
        web_sys::window()?.local_storage().ok().flatten()
    }
}

impl SettingsStore for LocalStorageSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.storage()?.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let storage = self
            .storage()
            .ok_or_else(|| DomainError::invalid_config(key, "localStorage is not available"))?;
        storage
            .set_item(key, value)
            .map_err(|e| DomainError::invalid_config(key, format!("localStorage write failed: {e:?}")))
    }
}
