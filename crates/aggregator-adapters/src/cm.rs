//! ConfigMap-poll ingester stub. Spec.md §6 `cm` config
//! (`namespace`/`labelSelector`/`pollIntervalSeconds`). The poller itself
//! (a `kube::Api<ConfigMap>::list` on an interval) is out of scope; this
//! emits the literal event shape that list would produce per matched object.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map};

use aggregator_common::error::AggregatorError;
use aggregator_common::source_config::{CmConfig, IngesterKind};
use aggregator_common::types::{Origin, RawEvent, ResourceRef};
use aggregator_engine::ingest_queue::IngestQueue;

use crate::adapter::{Adapter, HealthStatus};
use crate::lifecycle::Lifecycle;

pub struct CmAdapter {
    source: String,
    config: CmConfig,
    lifecycle: Lifecycle,
}

impl CmAdapter {
    pub fn new(source: impl Into<String>, config: CmConfig) -> Self {
        CmAdapter { source: source.into(), config, lifecycle: Lifecycle::default() }
    }

    fn synthetic_event(&self) -> RawEvent {
        let mut payload = Map::new();
        payload.insert("labelSelector".into(), json!(self.config.label_selector));
        RawEvent {
            source: self.source.clone(),
            received_at: Utc::now(),
            payload,
            origin: Origin::Polled,
            resource_ref: Some(ResourceRef {
                group: String::new(),
                version: "v1".into(),
                kind: "ConfigMap".into(),
                name: "synthetic".into(),
                namespace: Some(self.config.namespace.clone()),
            }),
        }
    }
}

#[async_trait]
impl Adapter for CmAdapter {
    fn kind(&self) -> IngesterKind {
        IngesterKind::Cm
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
                if queue.try_send(adapter.synthetic_event()).is_err() {
                    tracing::debug!(source = %adapter.source, "cm adapter dropped event, queue full");
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
