//! SourceConfig data shape. Spec.md §3/§6.
//!
//! `SourceConfig` is the plain-data shape; the CRD wire type lives in
//! `aggregator-k8s`. `aggregator-config::ConfigLoader` is the sole mutator
//! at runtime — every other component holds a read-only `Arc<SourceConfig>`.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::filter::FilterSet;
use crate::gvr::Gvr;
use crate::normalization::NormalizationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum IngesterKind {
    Informer,
    Webhook,
    Logs,
    Cm,
    K8sEvents,
}

impl IngesterKind {
    /// Leader-only ingesters must be singleton across replicas; spec.md §9.
    /// `K8sEvents` is a single cluster-wide watch too, so it gates the same
    /// as `Informer` — only `Webhook` can safely run on every replica.
    pub fn requires_leader(self) -> bool {
        !matches!(self, IngesterKind::Webhook)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingOrder {
    Auto,
    FilterFirst,
    DedupFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    Fingerprint,
    Key,
    Hybrid,
    Adaptive,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct InformerConfig {
    pub group: String,
    pub version: String,
    pub resource: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    pub path: String,
    pub port: u16,
    pub buffer_size: usize,
    #[serde(default)]
    pub auth: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogsConfig {
    pub pod_selector: String,
    pub container: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub since_seconds: Option<i64>,
    pub poll_interval_seconds: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CmConfig {
    pub namespace: String,
    pub label_selector: String,
    pub poll_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    pub max_per_minute: u32,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            max_per_minute: 100 * 60,
            burst: 200,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DedupConfig {
    pub window_seconds: Option<u64>,
    pub strategy: Option<DedupStrategy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingConfig {
    pub order: Option<ProcessingOrder>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub gvr: Gvr,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Cluster-scoped writes require explicit opt-in, spec.md §4.6.
    #[serde(default)]
    pub cluster_scoped_opt_in: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub source: String,
    pub ingester: IngesterKind,
    #[serde(default)]
    pub informer: Option<InformerConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
    #[serde(default)]
    pub logs: Option<LogsConfig>,
    #[serde(default)]
    pub cm: Option<CmConfig>,
    pub destinations: Vec<Destination>,
    #[serde(default)]
    pub filter: FilterSet,
    #[serde(default)]
    pub normalization: NormalizationConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Resolved generation counter; bumped every successful
    /// `ConfigLoader` publish, used for diffing.
    #[serde(default)]
    pub generation: u64,
}

/// Fields whose change requires restarting the adapter (not just swapping
/// the pipeline snapshot). Spec.md §4.10: "restarts adapters only when
/// adapter-visible fields changed".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceConfigDiff {
    pub adapter_changed: bool,
    pub filter_changed: bool,
    pub normalization_changed: bool,
    pub dedup_changed: bool,
    pub rate_limit_changed: bool,
    pub processing_changed: bool,
    pub destinations_changed: bool,
}

impl SourceConfigDiff {
    pub fn is_empty(&self) -> bool {
        *self == SourceConfigDiff::default()
    }
}

fn json_eq<T: Serialize>(a: &T, b: &T) -> bool {
    serde_json::to_value(a).ok() == serde_json::to_value(b).ok()
}

/// Compute a diff between two configs for the *same* source.
pub fn diff(old: &SourceConfig, new: &SourceConfig) -> SourceConfigDiff {
    SourceConfigDiff {
        adapter_changed: old.ingester != new.ingester
            || !json_eq(&old.informer, &new.informer)
            || !json_eq(&old.webhook, &new.webhook)
            || !json_eq(&old.logs, &new.logs)
            || !json_eq(&old.cm, &new.cm),
        filter_changed: !json_eq(&old.filter, &new.filter),
        normalization_changed: !json_eq(&old.normalization, &new.normalization),
        dedup_changed: !json_eq(&old.dedup, &new.dedup),
        rate_limit_changed: !json_eq(&old.rate_limit, &new.rate_limit),
        processing_changed: !json_eq(&old.processing, &new.processing),
        destinations_changed: !json_eq(&old.destinations, &new.destinations),
    }
}

/// Per-source overrides keyed by source name, e.g. `DEDUP_WINDOW_BY_SOURCE`.
pub type PerSourceOverrides = HashMap<String, String>;
