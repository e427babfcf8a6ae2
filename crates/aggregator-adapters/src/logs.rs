//! Pod-logs ingester stub. Spec.md §6 `logs` config
//! (`podSelector`/`container`/`patterns`/`sinceSeconds`/`pollIntervalSeconds`).
//! The log tailer itself (exec/follow against the kubelet) is out of scope;
//! this polls on the configured interval and emits one synthetic line-match
//! event per tick, the literal shape a real tailer's match callback would
//! hand off to the queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map};

use aggregator_common::error::AggregatorError;
use aggregator_common::source_config::{IngesterKind, LogsConfig};
use aggregator_common::types::{Origin, RawEvent};
use aggregator_engine::ingest_queue::IngestQueue;

use crate::adapter::{Adapter, HealthStatus};
use crate::lifecycle::Lifecycle;

pub struct LogsAdapter {
    source: String,
    config: LogsConfig,
    lifecycle: Lifecycle,
}

impl LogsAdapter {
    pub fn new(source: impl Into<String>, config: LogsConfig) -> Self {
        LogsAdapter { source: source.into(), config, lifecycle: Lifecycle::default() }
    }

    /// The payload shape a real tailer would build for a matched line.
    fn synthetic_event(&self, matched_pattern: &str) -> RawEvent {
        let mut payload = Map::new();
        payload.insert("podSelector".into(), json!(self.config.pod_selector));
        payload.insert("container".into(), json!(self.config.container));
        payload.insert("matchedPattern".into(), json!(matched_pattern));
        RawEvent {
            source: self.source.clone(),
            received_at: Utc::now(),
            payload,
            origin: Origin::Logs,
            resource_ref: None,
        }
    }
}

#[async_trait]
impl Adapter for LogsAdapter {
    fn kind(&self) -> IngesterKind {
        IngesterKind::Logs
    }

    async fn start(self: Arc<Self>, queue: Arc<IngestQueue>) -> Result<(), AggregatorError> {
        if self.lifecycle.is_running() {
            return Ok(());
        }
        let interval = Duration::from_secs(self.config.poll_interval_seconds.max(1));
        let adapter = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let pattern = adapter.config.patterns.first().cloned().unwrap_or_default();
                let event = adapter.synthetic_event(&pattern);
                if queue.try_send(event).is_err() {
                    tracing::debug!(source = %adapter.source, "logs adapter dropped event, queue full");
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

    fn config() -> LogsConfig {
        LogsConfig {
            pod_selector: "app=trivy".into(),
            container: "scanner".into(),
            patterns: vec!["CRITICAL".into()],
            since_seconds: Some(300),
            poll_interval_seconds: 1,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn emits_synthetic_event_on_each_tick() {
        let adapter = Arc::new(LogsAdapter::new("trivy", config()));
        let queue = Arc::new(IngestQueue::new(4));
        Arc::clone(&adapter).start(Arc::clone(&queue)).await.unwrap();

        tokio::time::advance(Duration::from_secs(1)).await;
        let event = queue.recv().await.unwrap();
        assert_eq!(event.origin, Origin::Logs);
        assert_eq!(event.field_str("matchedPattern"), Some("CRITICAL"));

        adapter.stop().await.unwrap();
    }

    #[tokio::test]
    async fn starting_twice_does_not_spawn_a_second_task() {
        let adapter = Arc::new(LogsAdapter::new("trivy", config()));
        let queue = Arc::new(IngestQueue::new(4));
        Arc::clone(&adapter).start(Arc::clone(&queue)).await.unwrap();
        Arc::clone(&adapter).start(queue).await.unwrap();
        assert_eq!(adapter.health(), HealthStatus::Healthy);
    }
}
