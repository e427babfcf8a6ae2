//! Native Kubernetes Events ingester stub (`ingester: k8s-events`). Spec.md
//! §6 — a cluster-wide watch over `events.k8s.io/v1 Event` objects, ground:
//! the vector.dev `kubernetes_events` source kept as reference material.
//! Config-free: there's nothing to tune beyond the standing interval, unlike
//! the other four ingesters.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map};

use aggregator_common::error::AggregatorError;
use aggregator_common::source_config::IngesterKind;
use aggregator_common::types::{Origin, RawEvent};
use aggregator_engine::ingest_queue::IngestQueue;

use crate::adapter::{Adapter, HealthStatus};
use crate::lifecycle::Lifecycle;

const POLL_STAND_IN: Duration = Duration::from_secs(5);

pub struct NativeEventsAdapter {
    source: String,
    lifecycle: Lifecycle,
}

impl NativeEventsAdapter {
    pub fn new(source: impl Into<String>) -> Self {
        NativeEventsAdapter { source: source.into(), lifecycle: Lifecycle::default() }
    }

    fn synthetic_event(&self) -> RawEvent {
        let mut payload = Map::new();
        payload.insert("reason".into(), json!("FailedScheduling"));
        payload.insert("type".into(), json!("Warning"));
        RawEvent {
            source: self.source.clone(),
            received_at: Utc::now(),
            payload,
            origin: Origin::NativeEvents,
            resource_ref: None,
        }
    }
}

#[async_trait]
impl Adapter for NativeEventsAdapter {
    fn kind(&self) -> IngesterKind {
        IngesterKind::K8sEvents
    }

    async fn start(self: Arc<Self>, queue: Arc<IngestQueue>) -> Result<(), AggregatorError> {
        if self.lifecycle.is_running() {
            return Ok(());
        }
        let adapter = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLL_STAND_IN);
            loop {
                ticker.tick().await;
                if queue.try_send(adapter.synthetic_event()).is_err() {
                    tracing::debug!(source = %adapter.source, "native-events adapter dropped event, queue full");
                }
            }
        });
        self.lifecycle.install(handle).await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), AggregatorError> {
        self.lifecycle.stop().await;
        Ok(())
    }

    fn health(&self) -> HealthStatus {
        self.lifecycle.health()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn emits_warning_event_with_origin_native_events() {
        let adapter = Arc::new(NativeEventsAdapter::new("k8s-events"));
        let queue = Arc::new(IngestQueue::new(4));
        Arc::clone(&adapter).start(Arc::clone(&queue)).await.unwrap();

        tokio::time::advance(POLL_STAND_IN).await;
        let event = queue.recv().await.unwrap();
        assert_eq!(event.origin, Origin::NativeEvents);
        assert_eq!(event.field_str("type"), Some("Warning"));
    }

    #[test]
    fn does_not_require_a_dedicated_leader_gate_beyond_the_general_rule() {
        assert!(IngesterKind::K8sEvents.requires_leader());
    }
}
