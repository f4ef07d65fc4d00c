//! # Utility Functions
//!
//! Helpers shared by the handlers and views: identifier generation, file
//! name checks, HTML escaping and cookie parsing.

use chrono::Utc;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Generates an identifier for sessions, OAuth states and request ids.
///
/// The format is `{timestamp}-{uuid}`: sortable by creation time, with a v4
/// UUID supplying the entropy.
pub fn generate_unique_identifier() -> String {
    let uuid_part = Uuid::new_v4().to_string();
    let timestamp = Utc::now().timestamp_millis();
    format!("{}-{}", timestamp, uuid_part)
}

/// Request ids only need to be unique, not unguessable.
pub fn generate_request_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Checks that an uploaded file name can be stored as `<username>/<name>`.
///
/// Only names that would leave the user's prefix or name no file are
/// refused: empty or blank names, `.`, `..`, and names containing `/` or a
/// control character. Everything else is returned unchanged.
pub fn validate_file_name(file_name: &str) -> AppResult<&str> {
    if file_name.trim().is_empty() || file_name == "." || file_name == ".." {
        return Err(AppError::BadRequest("file name is empty".to_string()));
    }
    if file_name.contains('/') {
        return Err(AppError::BadRequest(format!(
            "file name {} must not contain /",
            file_name
        )));
    }
    if file_name.chars().any(char::is_control) {
        return Err(AppError::BadRequest(
            "file name must not contain control characters".to_string(),
        ));
    }
    Ok(file_name)
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Extracts a cookie value from a raw `Cookie` header.
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

/// Formats a byte count for the file list.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
