//! The Writer (C6): issues the actual Kubernetes API write for a validated
//! Observation, against whichever `Destination` GVRs the `SourceConfig`
//! names. Spec.md §4.6.
//!
//! Two independent safety nets gate every write: `check_allowed` (shared with
//! `aggregator-config::ConfigLoader`'s validation-time check, so a GVR denied
//! at config load can never reach here either) and the per-destination
//! bounded retry/backoff below, which resolves spec.md's Open Question on
//! retry policy — exponential, full jitter, capped at a per-event deadline.

use std::time::Duration;

use async_trait::async_trait;
use kube::api::{DynamicObject, ObjectMeta, PostParams};
use rand::Rng;
use serde_json::json;
use tracing::warn;

use aggregator_common::error::AggregatorError;
use aggregator_common::gvr::{check_allowed, Gvr};
use aggregator_common::observation::Observation as ObservationData;
use aggregator_common::source_config::{Destination, SourceConfig};
use aggregator_engine::pipeline::ObservationWriter;
use std::collections::BTreeMap;

use crate::client::RateLimitedClient;
use crate::crd::{ObservationSpec, GROUP};
use crate::dynamic::{api_resource_for, api_for};

/// Exponential backoff with full jitter, base 100ms / multiplier 2.0,
/// bounded by `max_elapsed` (default 5s per event, spec.md §9 Open Question).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base: Duration,
    pub multiplier: f64,
    pub max_elapsed: Duration,
}

impl RetryPolicy {
    pub fn default_policy() -> Self {
        RetryPolicy {
            base: Duration::from_millis(100),
            multiplier: 2.0,
            max_elapsed: Duration::from_secs(5),
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let scaled = self.base.mul_f64(self.multiplier.powi(attempt as i32));
        let capped = scaled.min(self.max_elapsed);
        let jitter_ms = rand::rng().random_range(0..=capped.as_millis().max(1) as u64);
        Duration::from_millis(jitter_ms)
    }
}

pub struct K8sWriter {
    client: RateLimitedClient,
    retry: RetryPolicy,
    allowed_gvrs: Vec<String>,
    allowed_namespaces: Vec<String>,
    allowed_cluster_scoped_gvrs: Vec<String>,
}

impl K8sWriter {
    pub fn new(
        client: RateLimitedClient,
        allowed_gvrs: Vec<String>,
        allowed_namespaces: Vec<String>,
        allowed_cluster_scoped_gvrs: Vec<String>,
    ) -> Self {
        K8sWriter {
            client,
            retry: RetryPolicy::default_policy(),
            allowed_gvrs,
            allowed_namespaces,
            allowed_cluster_scoped_gvrs,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn write_one(&self, dest: &Destination, observation: &ObservationData) -> Result<(), AggregatorError> {
        check_allowed(
            &dest.gvr,
            dest.namespace.as_deref(),
            dest.cluster_scoped_opt_in,
            &self.allowed_gvrs,
            &self.allowed_namespaces,
            &self.allowed_cluster_scoped_gvrs,
        )
        .map_err(|_| AggregatorError::GvrDenied(dest.gvr.to_string()))?;

        let api = api_for(&self.client, &dest.gvr, dest.namespace.as_deref());
        let body = dynamic_object_for(dest, observation)?;

        let deadline = tokio::time::Instant::now() + self.retry.max_elapsed;
        let mut attempt = 0u32;
        loop {
            self.client.throttle().await;
            match api.create(&PostParams::default(), &body).await {
                Ok(_) => return Ok(()),
                Err(kube::Error::Api(e)) if e.code == 409 => return Ok(()),
                Err(err) => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(AggregatorError::Write(format!(
                            "write to {} failed after {attempt} attempts: {err}",
                            dest.gvr
                        )));
                    }
                    let wait = self.retry.backoff_for(attempt);
                    warn!(gvr = %dest.gvr, attempt, error = %err, "observation write retry");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl ObservationWriter for K8sWriter {
    async fn write(&self, config: &SourceConfig, observation: &ObservationData) -> Result<(), AggregatorError> {
        for dest in &config.destinations {
            self.write_one(dest, observation).await?;
        }
        Ok(())
    }
}

/// `<group>/source`, `<group>/type`, `<group>/priority` — spec.md §6
/// "Labels (writer-applied)". `type` mirrors `eventType`, the only
/// type-shaped field an Observation carries; `priority` is only stamped
/// when the Normalizer produced one.
fn labels_for(observation: &ObservationData) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(format!("{GROUP}/source"), observation.source.clone());
    labels.insert(format!("{GROUP}/type"), observation.event_type.clone());
    if let Some(p) = observation.priority {
        labels.insert(format!("{GROUP}/priority"), format!("{p:.2}"));
    }
    labels
}

fn dynamic_object_for(dest: &Destination, observation: &ObservationData) -> Result<DynamicObject, AggregatorError> {
    let resource = api_resource_for(&dest.gvr);
    let spec = ObservationSpec { data: observation.clone() };
    let spec_json =
        serde_json::to_value(&spec).map_err(|e| AggregatorError::Write(format!("encode observation: {e}")))?;

    let metadata = ObjectMeta {
        generate_name: Some(format!("{}-", observation.source)),
        namespace: dest.namespace.clone(),
        labels: Some(labels_for(observation)),
        ..Default::default()
    };

    let mut obj = DynamicObject::new("", &resource);
    obj.metadata = metadata;
    obj.data = json!({ "spec": spec_json, "status": { "processed": false } });
    Ok(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_backoff_never_exceeds_max_elapsed() {
        let policy = RetryPolicy::default_policy();
        for attempt in 0..10 {
            assert!(policy.backoff_for(attempt) <= policy.max_elapsed);
        }
    }

    #[test]
    fn dynamic_object_carries_camel_case_spec() {
        let dest = Destination {
            gvr: Gvr::new("aggregator.observability.io", "v1", "observations"),
            namespace: Some("monitoring".into()),
            cluster_scoped_opt_in: false,
        };
        let observation = ObservationData {
            source: "trivy".into(),
            category: aggregator_common::types::Category::Security,
            severity: aggregator_common::types::Severity::High,
            event_type: "vulnerability".into(),
            resource: None,
            details: None,
            detected_at: None,
            ttl_seconds_after_creation: Some(3600),
            priority: Some(0.8),
        };
        let obj = dynamic_object_for(&dest, &observation).unwrap();
        assert_eq!(obj.data["spec"]["eventType"], "vulnerability");
        assert_eq!(obj.metadata.namespace.as_deref(), Some("monitoring"));

        let labels = obj.metadata.labels.unwrap();
        assert_eq!(labels.get("aggregator.observability.io/source"), Some(&"trivy".to_string()));
        assert_eq!(
            labels.get("aggregator.observability.io/type"),
            Some(&"vulnerability".to_string())
        );
        assert_eq!(
            labels.get("aggregator.observability.io/priority"),
            Some(&"0.80".to_string())
        );
    }
}
