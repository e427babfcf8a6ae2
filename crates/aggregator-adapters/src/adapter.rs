//! The `Adapter` trait and `HealthStatus`. SPEC_FULL.md §3: "dynamic dispatch
//! over adapter variants ... {Start, Stop, HealthStatus, emits RawEvent}" —
//! the Orchestrator's capability-set view of an ingester, independent of its
//! concrete transport (which spec.md §1 explicitly leaves out of scope).

use std::sync::Arc;

use async_trait::async_trait;

use aggregator_common::error::AggregatorError;
use aggregator_common::source_config::IngesterKind;
use aggregator_engine::ingest_queue::IngestQueue;

/// Health surface an external readiness probe would query. Not the probe
/// itself — just the internal state it would report, per SPEC_FULL.md §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded { reason: String },
    Stopped,
}

#[async_trait]
pub trait Adapter: Send + Sync {
    fn kind(&self) -> IngesterKind;

    /// Begin emitting `RawEvent`s into `queue`. Idempotent: calling `start`
    /// on an already-running adapter is a no-op, not an error, so the
    /// Orchestrator can call it unconditionally after a config reload that
    /// didn't actually change adapter-visible fields.
    async fn start(self: Arc<Self>, queue: Arc<IngestQueue>) -> Result<(), AggregatorError>;

    /// Stop emitting; any in-flight poll/read loop exits at its next
    /// checkpoint. Does not drain `queue` — that's the Pipeline's job during
    /// its own `Draining` state.
    async fn stop(&self) -> Result<(), AggregatorError>;

    fn health(&self) -> HealthStatus;
}
