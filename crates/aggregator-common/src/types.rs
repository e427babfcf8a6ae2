//! Core ingestion-time and wire types shared by every component.
//!
//! Mirrors the shape of `rootsignal_common::types` — a single module of
//! small, `Serialize`/`Deserialize`/`JsonSchema` value types with
//! `Display`/`FromStr` pairs for the string-enum fields that round-trip
//! through Kubernetes labels and CRD specs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::AggregatorError;

/// `^[a-z0-9-]+$` — shared by `RawEvent::source` and `Observation::source`.
pub fn is_valid_source(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// `^[a-z0-9_]+$` — `Observation::event_type`.
pub fn is_valid_event_type(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// The adapter kind that produced a [`RawEvent`]. Spec.md §3 "origin".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    Informer,
    Webhook,
    Logs,
    Polled,
    NativeEvents,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Origin::Informer => "informer",
            Origin::Webhook => "webhook",
            Origin::Logs => "logs",
            Origin::Polled => "polled",
            Origin::NativeEvents => "native-events",
        };
        f.write_str(s)
    }
}

/// Observation category, spec.md §3/§6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Security,
    Compliance,
    Performance,
    Operations,
    Cost,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Security => "security",
            Category::Compliance => "compliance",
            Category::Performance => "performance",
            Category::Operations => "operations",
            Category::Cost => "cost",
        };
        f.write_str(s)
    }
}

impl FromStr for Category {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "security" => Ok(Category::Security),
            "compliance" => Ok(Category::Compliance),
            "performance" => Ok(Category::Performance),
            "operations" => Ok(Category::Operations),
            "cost" => Ok(Category::Cost),
            other => Err(AggregatorError::Validation(format!(
                "unknown category {other:?}"
            ))),
        }
    }
}

/// Severity, ordered `Critical > High > Medium > Low > Info` so
/// `severity >= min_severity` comparisons in FilterEngine work with `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = AggregatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "info" => Ok(Severity::Info),
            other => Err(AggregatorError::Validation(format!(
                "unknown severity {other:?}"
            ))),
        }
    }
}

/// `group/version/kind/name/namespace` — the resource a RawEvent/Observation
/// concerns, when the underlying tool identified one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceRef {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ResourceRef {
    /// Canonical tuple used by the Fingerprinter — stable field order.
    pub fn canonical_tuple(&self) -> (&str, &str, &str, &str, &str) {
        (
            &self.group,
            &self.version,
            &self.kind,
            &self.name,
            self.namespace.as_deref().unwrap_or(FINGERPRINT_SENTINEL),
        )
    }
}

/// Sentinel distinct from `""`, used by the Fingerprinter for absent fields
/// (spec.md §4.1: "Missing fields serialize as an explicit sentinel distinct
/// from empty string").
pub const FINGERPRINT_SENTINEL: &str = "\u{0}ABSENT\u{0}";

/// An ingestion-time value, immutable once emitted by an adapter.
/// Spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    pub source: String,
    /// Monotonic receive timestamp — never part of the fingerprint.
    pub received_at: DateTime<Utc>,
    /// Opaque payload; no schema enforced at this layer.
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_ref: Option<ResourceRef>,
}

impl RawEvent {
    /// Best-effort string field lookup in `payload`, used by the
    /// Fingerprinter/Normalizer for "critical detail" / field-mapping reads.
    pub fn field_str(&self, path: &str) -> Option<&str> {
        self.payload.get(path).and_then(|v| v.as_str())
    }
}

/// 256-bit content fingerprint — the dedup key. Spec.md §3/§4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}
