//! Turning captured bytes into log text.
//!
//! The rules, applied per body:
//! 1. a large body renders as a fixed placeholder;
//! 2. a body rejected for non-ASCII content renders as a binary placeholder;
//! 3. otherwise bytes that parse as JSON are re-serialized compactly with key order kept,
//!    and anything else is rendered as lossy UTF-8 text with newlines escaped as `\n`.
//!
//! The result is always cut to the configured maximum length.

use serde_json::Value;

use crate::capture::CapturedBody;

/// Which side of the exchange a body belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Request,
    Response,
}

impl BodyKind {
    pub fn large_placeholder(self) -> &'static str {
        match self {
            BodyKind::Request => "[Large Request]",
            BodyKind::Response => "[Large Response]",
        }
    }

    pub fn binary_placeholder(self) -> &'static str {
        match self {
            BodyKind::Request => "[Binary Request]",
            BodyKind::Response => "[Binary Response]",
        }
    }
}

/// Render one captured body, cut to at most `max_len` bytes.
pub fn render_body(body: &CapturedBody, kind: BodyKind, max_len: usize) -> String {
    let rendered = if body.large {
        kind.large_placeholder().to_string()
    } else if body.binary {
        kind.binary_placeholder().to_string()
    } else {
        normalize(&body.bytes)
    };
    truncate(rendered, max_len)
}

/// Compact JSON if `bytes` is a JSON document, escaped text otherwise.
pub fn normalize(bytes: &[u8]) -> String {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => value.to_string(),
        Err(_) => escape_newlines(&String::from_utf8_lossy(bytes)),
    }
}

fn escape_newlines(text: &str) -> String {
    text.replace('\n', "\\n")
}

/// Cut `text` to at most `max_len` bytes without splitting a character.
pub fn truncate(mut text: String, max_len: usize) -> String {
    if text.len() > max_len {
        let mut end = max_len;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}
