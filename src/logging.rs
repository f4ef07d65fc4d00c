use chrono::Utc;
use serde_json::json;

/// Logger struct for handling structured logging
#[derive(Clone, Debug)]
pub struct Logger {
    request_id: String,
}

impl Logger {
    /// Create a new Logger instance
    ///
    /// # Arguments
    ///
    /// * `request_id` - A unique identifier for the current request
    pub fn new(request_id: String) -> Self {
        Self { request_id }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Log an info message
    ///
    /// # Arguments
    ///
    /// * `message` - The log message
    /// * `data` - Optional additional data to include in the log
    pub fn info(&self, message: &str, data: Option<serde_json::Value>) {
        self.log(Level::Info, message, data);
    }

    /// Log a warning message
    pub fn warn(&self, message: &str, data: Option<serde_json::Value>) {
        self.log(Level::Warn, message, data);
    }

    /// Log an error message
    pub fn error(&self, message: &str, data: Option<serde_json::Value>) {
        self.log(Level::Error, message, data);
    }

    fn log(&self, level: Level, message: &str, data: Option<serde_json::Value>) {
        let line = self.format(level, message, data);
        emit(level, &line);
    }

    fn format(&self, level: Level, message: &str, data: Option<serde_json::Value>) -> String {
        json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level.as_str(),
            "request_id": self.request_id,
            "message": message,
            "data": data
        })
        .to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        fn emit(level: Level, line: &str) {
            let value = worker::wasm_bindgen::JsValue::from_str(line);
            match level {
                Level::Info => web_sys::console::log_1(&value),
                Level::Warn => web_sys::console::warn_1(&value),
                Level::Error => web_sys::console::error_1(&value),
            }
        }
    } else {
        fn emit(_level: Level, line: &str) {
            eprintln!("{line}");
        }
    }
}

/// Macro to create a JSON object for additional log data
///
/// Usage: log_data!("key1" => "value1", "key2" => 42)
#[macro_export]
macro_rules! log_data {
    ($($key:expr => $value:expr),* $(,)?) => {
        Some(serde_json::json!({ $($key: $value),* }))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatted_line_carries_request_id_and_level() {
        let logger = Logger::new("req-1".to_string());
        let line = logger.format(Level::Warn, "summary missing", log_data!("key" => "alice/a.txt"));
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(parsed["request_id"], "req-1");
        assert_eq!(parsed["level"], "WARN");
        assert_eq!(parsed["message"], "summary missing");
        assert_eq!(parsed["data"]["key"], "alice/a.txt");
    }

    #[test]
    fn data_is_null_when_omitted() {
        let logger = Logger::new("req-2".to_string());
        let parsed: serde_json::Value =
            serde_json::from_str(&logger.format(Level::Info, "hello", None)).unwrap();
        assert!(parsed["data"].is_null());
    }
}
