//! Best-effort diagnostic reporting for per-source failures.
//!
//! The sink is a collaborator seam: the production build logs through
//! tracing, and richer reporters (error screenshots, external paste
//! services) can be swapped in without touching the engine.

use async_trait::async_trait;
use tracing::error;

#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    /// Capture a per-source failure. Must never fail the caller.
    async fn capture(&self, source: &str, err: &anyhow::Error);
}

/// Sink that records failures in the process log.
pub struct LogDiagnostics;

#[async_trait]
impl DiagnosticSink for LogDiagnostics {
    async fn capture(&self, source: &str, err: &anyhow::Error) {
        error!(%source, ?err, "source pipeline failed");
    }
}
