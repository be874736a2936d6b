//! Repair of malformed unicode escapes in model output
//!
//! Models sometimes emit Latin-1 characters as non-standard escapes
//! (`\u0000e9`, `\x00f3`, `\xe9`) or mangle `¿` as `\u00191` / `\x19`.
//! A single left-to-right scanner recognises these forms, most specific
//! first, and replaces them with the intended character:
//!
//! | input        | output            |
//! |--------------|-------------------|
//! | `\u0000XX`   | U+00XX            |
//! | `\u00191`    | `¿`               |
//! | `\x00XX`     | U+00XX            |
//! | `\x19`, `\x91` | `¿`             |
//! | `\xHH`       | U+00HH            |
//! | `\uXXXX`     | the code point (surrogate pairs combined) |
//!
//! An escaped backslash (`\\`) is never treated as the start of an escape.
//!
//! [`decode_unicode_escapes`] produces display text. [`repair_json_escapes`]
//! is for raw JSON documents: decoded characters that would break a JSON
//! string (`"`, `\`, control characters) are re-escaped so the result
//! still parses.

use serde_json::{Map, Value};

/// Longest escape the scanner recognises (`\uD83D\uDE00`)
const MAX_ESCAPE_LEN: usize = 12;

const INVERTED_QUESTION_MARK: char = '¿';

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Mode {
    #[default]
    Text,
    Json,
}

/// Decode escapes in free text
pub fn decode_unicode_escapes(input: &str) -> String {
    decode(input, Mode::Text)
}

/// Decode escapes inside a JSON document, keeping it parseable
pub fn repair_json_escapes(input: &str) -> String {
    decode(input, Mode::Json)
}

/// Decode every string (keys included) in a JSON value
pub fn decode_unicode_escapes_deep(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(decode_unicode_escapes(&s)),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(decode_unicode_escapes_deep).collect())
        }
        Value::Object(map) => {
            let decoded: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (decode_unicode_escapes(&k), decode_unicode_escapes_deep(v)))
                .collect();
            Value::Object(decoded)
        }
        other => other,
    }
}

fn decode(input: &str, mode: Mode) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut copied_to = 0;
    let mut i = 0;

    // Backslash is ASCII, so every index we stop at is a char boundary
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            i += 1;
            continue;
        }
        if bytes.get(i + 1) == Some(&b'\\') {
            i += 2;
            continue;
        }
        match scan_escape(&bytes[i..]) {
            Some((ch, consumed)) => {
                out.push_str(&input[copied_to..i]);
                push_decoded(&mut out, ch, mode);
                i += consumed;
                copied_to = i;
            }
            None => i += 1,
        }
    }

    out.push_str(&input[copied_to..]);
    out
}

fn push_decoded(out: &mut String, ch: char, mode: Mode) {
    if mode == Mode::Text {
        out.push(ch);
        return;
    }
    match ch {
        '"' => out.push_str("\\\""),
        '\\' => out.push_str("\\\\"),
        c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
        c => out.push(c),
    }
}

/// Recognise one escape at the start of `s` (which begins with `\`)
fn scan_escape(s: &[u8]) -> Option<(char, usize)> {
    match s.get(1)? {
        b'u' => scan_u_escape(s),
        b'x' => scan_x_escape(s),
        _ => None,
    }
}

fn scan_u_escape(s: &[u8]) -> Option<(char, usize)> {
    // \u0000XX
    if s.len() >= 8 && &s[2..6] == b"0000" {
        if let Some(code) = hex_value(&s[6..8]) {
            return char::from_u32(code).map(|c| (c, 8));
        }
    }

    // \u00191
    if s.len() >= 7 && &s[2..7] == b"00191" {
        return Some((INVERTED_QUESTION_MARK, 7));
    }

    // \uXXXX
    let code = hex_value(s.get(2..6)?)?;
    if (0xD800..0xDC00).contains(&code) {
        let low = s
            .get(6..12)
            .filter(|tail| tail.starts_with(b"\\u"))
            .and_then(|tail| hex_value(&tail[2..6]))
            .filter(|low| (0xDC00..0xE000).contains(low))?;
        let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
        return char::from_u32(combined).map(|c| (c, 12));
    }
    // Lone low surrogate stays as written
    char::from_u32(code).map(|c| (c, 6))
}

fn scan_x_escape(s: &[u8]) -> Option<(char, usize)> {
    // \x00XX
    if s.len() >= 6 && &s[2..4] == b"00" {
        if let Some(code) = hex_value(&s[4..6]) {
            return char::from_u32(code).map(|c| (c, 6));
        }
    }

    let code = hex_value(s.get(2..4)?)?;
    if code == 0x19 || code == 0x91 {
        return Some((INVERTED_QUESTION_MARK, 4));
    }
    char::from_u32(code).map(|c| (c, 4))
}

fn hex_value(digits: &[u8]) -> Option<u32> {
    digits.iter().try_fold(0u32, |acc, &b| {
        let digit = (b as char).to_digit(16)?;
        Some(acc * 16 + digit)
    })
}

/// Decodes a text stream chunk by chunk
///
/// An escape split across two chunks is held back until the next chunk
/// (or [`StreamingDecoder::finish`]) completes it. [`StreamingDecoder::json`]
/// repairs a streamed JSON document the way [`repair_json_escapes`] does.
#[derive(Debug, Default)]
pub struct StreamingDecoder {
    pending: String,
    mode: Mode,
}

impl StreamingDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder for a streamed JSON document
    pub fn json() -> Self {
        Self {
            pending: String::new(),
            mode: Mode::Json,
        }
    }

    /// Feed a chunk, returning the text that is safe to emit now
    pub fn push(&mut self, chunk: &str) -> String {
        self.pending.push_str(chunk);

        let split = self.hold_back_point();
        let ready: String = self.pending.drain(..split).collect();
        decode(&ready, self.mode)
    }

    /// Flush whatever is still held back
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        decode(&rest, self.mode)
    }

    /// First escape start that more input could still extend
    ///
    /// Walks the buffer the same way [`decode`] does, so every decision made
    /// before the returned index is final.
    fn hold_back_point(&self) -> usize {
        let bytes = self.pending.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != b'\\' {
                i += 1;
                continue;
            }
            if bytes.get(i + 1) == Some(&b'\\') {
                i += 2;
                continue;
            }
            if bytes.len() - i < MAX_ESCAPE_LEN {
                return i;
            }
            i += scan_escape(&bytes[i..]).map_or(1, |(_, consumed)| consumed);
        }
        bytes.len()
    }
}
