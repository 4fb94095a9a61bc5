//! Health check handler.

/// Liveness probe handler.
///
/// Returns a simple "OK" response to indicate the process is running.
/// Does NOT check the upstream authority or the key set: failure means the
/// process is hung.
pub async fn health_check() -> &'static str {
    "OK"
}
