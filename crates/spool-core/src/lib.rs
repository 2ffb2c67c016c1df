// ABOUTME: Core library for spool, containing the entry model, codec, transport seam, and config.
// ABOUTME: This crate defines the shared vocabulary used by the store and the uploader.

pub mod config;
pub mod entry;
pub mod testing;
pub mod transport;

pub use config::{CacheConfig, ConfigError};
pub use entry::{EOL, Entry, EntryError, encoded_len, escape, unescape};
pub use transport::UploadTransport;
