//! Webhook ingester stub. Spec.md §6 `webhook` config
//! (`path`/`port`/`bufferSize`/`auth`). The HTTP server itself is out of
//! scope (spec.md §1 "agnostic to source" / SPEC_FULL.md §4 "concrete
//! adapter transports"); what's modeled is the trait boundary a handler
//! would call into, and the exact shape of the event it produces.
//!
//! Unlike the poll-based adapters, `WebhookAdapter` has no background task —
//! `start`/`stop` only flip its health state, since delivery is push-driven
//! via [`WebhookAdapter::ingest`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use aggregator_common::error::AggregatorError;
use aggregator_common::source_config::{IngesterKind, WebhookConfig};
use aggregator_common::types::{Origin, RawEvent};
use aggregator_engine::ingest_queue::IngestQueue;

use crate::adapter::{Adapter, HealthStatus};
use crate::lifecycle::Lifecycle;

pub struct WebhookAdapter {
    source: String,
    config: WebhookConfig,
    lifecycle: Lifecycle,
    queue: std::sync::OnceLock<Arc<IngestQueue>>,
}

impl WebhookAdapter {
    pub fn new(source: impl Into<String>, config: WebhookConfig) -> Self {
        WebhookAdapter {
            source: source.into(),
            config,
            lifecycle: Lifecycle::default(),
            queue: std::sync::OnceLock::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.config.path
    }

    /// What an HTTP handler at `self.path()` would call with the request
    /// body. Enforces the configured `buffer_size` as the queue's effective
    /// backpressure point via `try_send` — a full queue is a dropped event,
    /// not a blocked request (spec.md §4.7).
    pub fn ingest(&self, payload: serde_json::Map<String, serde_json::Value>) -> Result<(), AggregatorError> {
        let Some(queue) = self.queue.get() else {
            return Err(AggregatorError::Config("webhook adapter not started".into()));
        };
        let event = RawEvent {
            source: self.source.clone(),
            received_at: Utc::now(),
            payload,
            origin: Origin::Webhook,
            resource_ref: None,
        };
        queue
            .try_send(event)
            .map_err(|_| AggregatorError::Config("webhook ingest queue full".into()))
    }
}

#[async_trait]
impl Adapter for WebhookAdapter {
    fn kind(&self) -> IngesterKind {
        IngesterKind::Webhook
    }

    async fn start(self: Arc<Self>, queue: Arc<IngestQueue>) -> Result<(), AggregatorError> {
        if self.lifecycle.is_running() {
            return Ok(());
        }
        let _ = self.queue.set(queue);
        let handle = tokio::spawn(async {});
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
    use serde_json::json;

    fn config() -> WebhookConfig {
        WebhookConfig {
            path: "/trivy".into(),
            port: 8080,
            buffer_size: 4,
            auth: None,
        }
    }

    #[tokio::test]
    async fn ingest_before_start_is_rejected() {
        let adapter = WebhookAdapter::new("trivy", config());
        let mut payload = serde_json::Map::new();
        payload.insert("evt".into(), json!("vulnerability"));
        assert!(adapter.ingest(payload).is_err());
    }

    #[tokio::test]
    async fn ingest_after_start_reaches_the_queue() {
        let adapter = Arc::new(WebhookAdapter::new("trivy", config()));
        let queue = Arc::new(IngestQueue::new(4));
        Arc::clone(&adapter).start(Arc::clone(&queue)).await.unwrap();

        let mut payload = serde_json::Map::new();
        payload.insert("evt".into(), json!("vulnerability"));
        adapter.ingest(payload).unwrap();

        let event = queue.recv().await.unwrap();
        assert_eq!(event.source, "trivy");
        assert_eq!(event.origin, Origin::Webhook);
    }

    #[tokio::test]
    async fn stop_flips_health_to_stopped() {
        let adapter = Arc::new(WebhookAdapter::new("trivy", config()));
        let queue = Arc::new(IngestQueue::new(4));
        Arc::clone(&adapter).start(queue).await.unwrap();
        assert_eq!(adapter.health(), HealthStatus::Healthy);
        adapter.stop().await.unwrap();
        assert_eq!(adapter.health(), HealthStatus::Stopped);
    }
}
