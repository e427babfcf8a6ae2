//! FilterRule / FilterSet data shapes. Spec.md §3/§4.4.
//!
//! `FilterEngine::evaluate` (the operation) lives in `aggregator-engine`,
//! which depends on these pure data types — FilterEngine only ever holds a
//! read-only `Arc<FilterSet>` snapshot, per spec.md §3 "Ownership".

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::Severity;

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilterRule {
    #[serde(default)]
    pub include_namespaces: Vec<String>,
    #[serde(default)]
    pub exclude_namespaces: Vec<String>,
    #[serde(default)]
    pub include_categories: Vec<String>,
    #[serde(default)]
    pub exclude_categories: Vec<String>,
    #[serde(default)]
    pub include_kinds: Vec<String>,
    #[serde(default)]
    pub exclude_kinds: Vec<String>,
    #[serde(default)]
    pub include_event_types: Vec<String>,
    #[serde(default)]
    pub exclude_event_types: Vec<String>,
}

/// A versioned rule set. The Pipeline pins a snapshot (`Arc<FilterSet>`) per
/// event so a reload mid-event never produces inconsistent decisions
/// (spec.md §3 "A FilterSet is versioned").
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilterSet {
    pub version: u64,
    pub min_severity: Severity,
    /// 0.0–1.0.
    pub min_priority: f64,
    pub rule: FilterRule,
}

impl Default for FilterSet {
    fn default() -> Self {
        FilterSet {
            version: 0,
            min_severity: Severity::Info,
            min_priority: 0.0,
            rule: FilterRule::default(),
        }
    }
}
