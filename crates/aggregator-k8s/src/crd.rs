//! `kube::CustomResource` types for the two CRDs in spec.md §6.
//!
//! These wrap the plain-data shapes from `aggregator_common` with
//! `#[serde(flatten)]` rather than duplicating their fields, so the wire
//! schema and the in-process validated shape can never drift apart. The
//! `kube(kind = ...)` attribute generates a struct of that name in this
//! module — aliased imports below keep it from colliding with the
//! `aggregator_common` type of the same name.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use aggregator_common::observation::Observation as ObservationData;
use aggregator_common::source_config::SourceConfig as SourceConfigData;

/// The CRD group, shared by both kinds below and by the Writer's
/// `<group>/source`, `<group>/type`, `<group>/priority` label stamping
/// (spec.md §6 "Labels").
pub const GROUP: &str = "aggregator.observability.io";

/// `observations.aggregator.observability.io/v1` — spec.md §6.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "aggregator.observability.io",
    version = "v1",
    kind = "Observation",
    plural = "observations",
    namespaced,
    shortname = "obs",
    status = "ObservationStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ObservationSpec {
    #[serde(flatten)]
    pub data: ObservationData,
}

/// Status subresource: whether a downstream consumer has acted on this
/// Observation yet. The aggregator itself only ever sets `processed = false`
/// at creation time — flipping it is a consumer's job.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObservationStatus {
    #[serde(default)]
    pub processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// `sourceconfigs.aggregator.observability.io/v1` — spec.md §6.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "aggregator.observability.io",
    version = "v1",
    kind = "SourceConfig",
    plural = "sourceconfigs",
    namespaced,
    shortname = "srccfg"
)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfigSpec {
    #[serde(flatten)]
    pub data: SourceConfigData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator_common::filter::FilterSet;
    use aggregator_common::normalization::NormalizationConfig;
    use aggregator_common::source_config::{
        DedupConfig, IngesterKind, ProcessingConfig, RateLimitConfig,
    };
    use aggregator_common::types::{Category, Severity};

    #[test]
    fn observation_spec_flattens_to_camel_case_json() {
        let spec = ObservationSpec {
            data: ObservationData {
                source: "trivy".into(),
                category: Category::Security,
                severity: Severity::High,
                event_type: "vulnerability".into(),
                resource: None,
                details: None,
                detected_at: None,
                ttl_seconds_after_creation: Some(3600),
                priority: Some(0.8),
            },
        };
        let v = serde_json::to_value(&spec).unwrap();
        assert_eq!(v["eventType"], "vulnerability");
        assert_eq!(v["ttlSecondsAfterCreation"], 3600);
        assert!(v.get("event_type").is_none());
    }

    #[test]
    fn source_config_spec_flattens_to_camel_case_json() {
        let spec = SourceConfigSpec {
            data: SourceConfigData {
                source: "trivy".into(),
                ingester: IngesterKind::Webhook,
                informer: None,
                webhook: None,
                logs: None,
                cm: None,
                destinations: vec![],
                filter: FilterSet::default(),
                normalization: NormalizationConfig::default(),
                dedup: DedupConfig::default(),
                rate_limit: RateLimitConfig::default(),
                processing: ProcessingConfig::default(),
                generation: 0,
            },
        };
        let v = serde_json::to_value(&spec).unwrap();
        assert_eq!(v["rateLimit"]["maxPerMinute"], 6000);
        assert!(v.get("rate_limit").is_none());
    }
}
