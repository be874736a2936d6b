//! Form validation helpers
//!
//! Collects field errors and formats them as `path: message` lines, the
//! way the action forms display them.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::ApiError;

/// One `@` with something on both sides; hosts without a dot are allowed
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+$").expect("valid email regex"));

/// Accumulated field errors for one submission
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: Vec<(String, String)>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push((path.into(), message.into()));
    }

    /// Record `message` when `value` is missing or blank; returns the trimmed value
    pub fn require(&mut self, path: &str, value: Option<&str>, message: &str) -> String {
        let trimmed = value.map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            self.add(path, message);
        }
        trimmed.to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `path: message` lines joined by newlines
    pub fn message(&self) -> String {
        self.errors
            .iter()
            .map(|(path, message)| format!("{}: {}", path, message))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `Ok(())` when nothing was recorded, else a 400 carrying every message
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::BadRequest(self.message()))
        }
    }
}

/// Prefix `https://` unless the value already names a scheme
pub fn normalize_website_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("http") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Absolute http(s) URL with a host
pub fn is_valid_website_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Normalize and validate a website field, recording `message` on failure
pub fn website_url(errors: &mut FieldErrors, path: &str, raw: Option<&str>, message: &str) -> String {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        errors.add(path, message);
        return String::new();
    }
    let url = normalize_website_url(raw);
    if !is_valid_website_url(&url) {
        errors.add(path, message);
    }
    url
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

/// Checkbox / select values for a boolean field
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Some(true),
        "false" | "off" | "0" | "no" => Some(false),
        _ => None,
    }
}
