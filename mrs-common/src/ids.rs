//! Identifier helpers
//!
//! All persisted entities use UUID v4 identifiers stored as hyphenated text.

use uuid::Uuid;

/// Generate a new entity identifier
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Parse an identifier received from a client
///
/// Returns `None` for anything that is not a well-formed UUID, so callers can
/// treat malformed ids exactly like unknown ids.
pub fn parse_id(raw: &str) -> Option<String> {
    Uuid::parse_str(raw.trim()).ok().map(|u| u.to_string())
}
