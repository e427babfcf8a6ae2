//! The Observation record shape and the §3/§6 schema validators.
//!
//! This is the plain-data view of an Observation; the CRD wire type
//! (`kube::CustomResource`) lives in `aggregator-k8s` and is built from this
//! one at write time. Keeping the validated shape here means Normalizer can
//! depend on it without depending on `kube`.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::AggregatorError;
use crate::types::{is_valid_event_type, is_valid_source, Category, ResourceRef, Severity};

/// Minimum/maximum TTL, spec.md §3 invariant I4.
pub const MIN_TTL_SECONDS: i64 = 60;
pub const MAX_TTL_SECONDS: i64 = 31_536_000;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub source: String,
    pub category: Category,
    pub severity: Severity,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds_after_creation: Option<i64>,
    /// Derived label mirror of `priority` (0.0–1.0), carried through so the
    /// Writer can stamp `<group>/priority` without recomputing it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
}

/// Validate an Observation against spec.md §3/§6 before any write is
/// attempted. Returns every violation found, not just the first — a fuzzer
/// driving this function (spec.md §8 "Schema closure") should never see a
/// `Vec::is_empty()` result paired with an actually-invalid record.
pub fn validate(obs: &Observation) -> Result<(), AggregatorError> {
    let mut errors = Vec::new();

    if !is_valid_source(&obs.source) {
        errors.push(format!("source {:?} does not match ^[a-z0-9-]+$", obs.source));
    }
    if !is_valid_event_type(&obs.event_type) {
        errors.push(format!(
            "eventType {:?} does not match ^[a-z0-9_]+$",
            obs.event_type
        ));
    }
    if let Some(ttl) = obs.ttl_seconds_after_creation {
        if !(MIN_TTL_SECONDS..=MAX_TTL_SECONDS).contains(&ttl) {
            errors.push(format!(
                "ttlSecondsAfterCreation {ttl} out of range [{MIN_TTL_SECONDS}, {MAX_TTL_SECONDS}]"
            ));
        }
    }
    if let Some(p) = obs.priority {
        if !(0.0..=1.0).contains(&p) {
            errors.push(format!("priority {p} out of range [0.0, 1.0]"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AggregatorError::Validation(errors.join("; ")))
    }
}
