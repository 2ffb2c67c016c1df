// ABOUTME: Persistence layer for spool, handling durable entry storage and degraded in-memory mode.
// ABOUTME: Provides the two-journal store, its line index and crash repair, and the fallback queue.

pub mod backend;
pub mod fallback;
pub mod index;
pub mod journal;

pub use backend::{BackendKind, CacheBackend, RawEntry};
pub use fallback::FallbackQueue;
pub use index::LineIndex;
pub use journal::{JournaledStore, READ_JOURNAL, StoreError, WRITE_JOURNAL};
