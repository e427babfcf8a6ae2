//! Informer ingester stub. Spec.md §6 `informer` config
//! (`group`/`version`/`resource`) — a cluster-wide watch on an arbitrary
//! resource type. The real watch (`kube::runtime::watcher`) is out of scope
//! here the way every adapter transport is; this emits the literal event
//! shape a watch's `Apply` branch would hand off, on a fixed interval
//! standing in for watch delivery.
//!
//! `IngesterKind::Informer` requires the leader gate (spec.md §9) — enforced
//! by the Orchestrator before calling `start`, not by this adapter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Map;

use aggregator_common::error::AggregatorError;
use aggregator_common::source_config::{IngesterKind, InformerConfig};
use aggregator_common::types::{Origin, RawEvent, ResourceRef};
use aggregator_engine::ingest_queue::IngestQueue;

use crate::adapter::{Adapter, HealthStatus};
use crate::lifecycle::Lifecycle;

const POLL_STAND_IN: Duration = Duration::from_secs(5);

pub struct InformerAdapter {
    source: String,
    config: InformerConfig,
    lifecycle: Lifecycle,
}

impl InformerAdapter {
    pub fn new(source: impl Into<String>, config: InformerConfig) -> Self {
        InformerAdapter { source: source.into(), config, lifecycle: Lifecycle::default() }
    }

    fn synthetic_event(&self) -> RawEvent {
        RawEvent {
            source: self.source.clone(),
            received_at: Utc::now(),
            payload: Map::new(),
            origin: Origin::Informer,
            resource_ref: Some(ResourceRef {
                group: self.config.group.clone(),
                version: self.config.version.clone(),
                kind: self.config.resource.clone(),
                name: "synthetic".into(),
                namespace: None,
            }),
        }
    }
}

#[async_trait]
impl Adapter for InformerAdapter {
    fn kind(&self) -> IngesterKind {
        IngesterKind::Informer
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
                    tracing::debug!(source = %adapter.source, "informer adapter dropped event, queue full");
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
