// ABOUTME: Defines the Entry unit of durability and the line-escaping codec used by the journal framing.
// ABOUTME: Entries are (destination, body) pairs stored on disk as two newline-terminated lines.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// End-of-line marker used by the journal framing.
pub const EOL: &str = "\n";

/// Errors produced when a cached line pair cannot be turned back into an Entry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("cached {field} is not valid utf-8")]
    InvalidUtf8 { field: &'static str },

    #[error("cached destination is empty")]
    EmptyDestination,

    #[error("cached destination is not an absolute url: {0}")]
    InvalidDestination(String),
}

/// One payload queued for delivery: where it goes and what gets sent.
/// The body is opaque, already-serialized content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub destination: String,
    pub body: String,
}

impl Entry {
    pub fn new(destination: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            body: body.into(),
        }
    }

    /// Escape both fields so neither contains a raw line break.
    /// Returns the (destination, body) lines as they are written to disk.
    pub fn to_lines(&self) -> (String, String) {
        (escape(&self.destination), escape(&self.body))
    }

    /// Rebuild an Entry from the two raw lines read back from a journal,
    /// reversing the escaping applied by [`Entry::to_lines`].
    pub fn from_lines(destination: &[u8], body: &[u8]) -> Result<Self, EntryError> {
        let destination = std::str::from_utf8(destination).map_err(|_| EntryError::InvalidUtf8 {
            field: "destination",
        })?;
        let body =
            std::str::from_utf8(body).map_err(|_| EntryError::InvalidUtf8 { field: "body" })?;

        if destination.trim().is_empty() {
            return Err(EntryError::EmptyDestination);
        }
        let destination = unescape(destination);
        if !is_absolute_url(&destination) {
            return Err(EntryError::InvalidDestination(destination));
        }

        Ok(Self {
            destination,
            body: unescape(body),
        })
    }
}

/// `scheme://rest` with an alphabetic scheme and no whitespace.
fn is_absolute_url(s: &str) -> bool {
    match s.split_once("://") {
        Some((scheme, rest)) => {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c))
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && !rest.is_empty()
                && !s.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// On-disk size of an already-escaped line pair, in UTF-8 bytes, including
/// both end-of-line markers.
pub fn encoded_len(destination: &str, body: &str) -> u64 {
    (destination.len() + body.len() + 2 * EOL.len()) as u64
}

/// Escape `\`, `\n` and `\r` as two-character sequences.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse [`escape`]. Backslash sequences other than `\n`, `\r` and `\\`
/// are passed through untouched, so journals written by writers that only
/// escaped line breaks decode the same way they always did.
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
