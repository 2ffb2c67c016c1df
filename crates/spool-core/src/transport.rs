// ABOUTME: Defines the UploadTransport trait that every delivery backend must implement.
// ABOUTME: The cache core only sees a success/failure boolean, never a concrete HTTP client.

use async_trait::async_trait;

/// Something that can push one payload to its destination.
///
/// Implementations own their own timeouts and response validation
/// (e.g. captive-portal detection). A request that never completes must be
/// reported as a failure by the implementation, not left pending.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Attempt to deliver `body` to `destination`. Returns true only when the
    /// remote side confirmed receipt.
    async fn attempt_delivery(&self, destination: &str, body: &str) -> bool;

    /// Short name for logging (e.g. "http", "scripted").
    fn name(&self) -> &str;
}
