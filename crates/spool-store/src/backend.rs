// ABOUTME: Defines the CacheBackend trait shared by the journaled store and the in-memory fallback.
// ABOUTME: Also defines RawEntry, the undecoded line pair a backend hands back on peek.

use spool_core::{Entry, EntryError};

/// Which kind of backend is holding entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Journal,
    Memory,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Journal => write!(f, "journal"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// The two escaped lines of a cached entry, exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub destination: Vec<u8>,
    pub body: Vec<u8>,
}

impl RawEntry {
    /// Unescape and validate into an [`Entry`].
    pub fn decode(&self) -> Result<Entry, EntryError> {
        Entry::from_lines(&self.destination, &self.body)
    }
}

/// Uniform storage interface the coordinator drives.
///
/// Lines passed to [`CacheBackend::write`] are already escaped and must not
/// contain raw line breaks. All operations fold failures into their return
/// values; none of them panic or propagate I/O errors.
pub trait CacheBackend: Send {
    fn kind(&self) -> BackendKind;

    /// True if at least one entry can be peeked.
    fn has_content(&mut self) -> bool;

    /// Entries that are ready to be peeked without further preparation.
    fn ready_count(&self) -> usize;

    /// Store one escaped line pair. Returns false if nothing was stored.
    fn write(&mut self, destination: &str, body: &str) -> bool;

    /// The next entry to deliver, without removing it.
    fn peek(&mut self) -> Option<RawEntry>;

    /// Remove the entry returned by the last `peek`. Returns false if there was none.
    fn pop(&mut self) -> bool;

    fn clear(&mut self);

    /// Fraction of capacity in use, in [0, 1].
    fn fill_ratio(&self) -> f64;

    fn close(&mut self);
}
