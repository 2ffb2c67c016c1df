// ABOUTME: Upload side of spool: the cache coordinator, backoff, periodic retry, and HTTP transport.
// ABOUTME: Decides when to send, when to cache, and replays cached entries through an UploadTransport.

pub mod backoff;
pub mod coordinator;
pub mod http;
pub mod periodic;

pub use backoff::Backoff;
pub use coordinator::{CacheCoordinator, CacheStatus};
pub use http::{
    HttpTransport, ResponseCheck, TransportError, accept_success_status, reject_captive_portal,
};
pub use periodic::spawn_periodic_drain;
