//! Fingerprinter (C1). Spec.md §4.1.
//!
//! Canonicalizes a `RawEvent` (post-normalization view, or a fixed default
//! pre-normalization view — see `default_canonicalization`) into a
//! deterministic byte stream and hashes it with SHA-256. Two RawEvents that
//! differ only in `received_at` or non-critical detail fields must hash the
//! same (spec.md §4.1 contract; exercised by the proptest below).

use aggregator_common::normalization::NormalizationConfig;
use aggregator_common::types::{Fingerprint, RawEvent, ResourceRef, FINGERPRINT_SENTINEL};
use sha2::{Digest, Sha256};

/// The "critical detail" field paths to fold into the fingerprint, read out
/// of `RawEvent::payload` in a stable, caller-supplied order.
pub fn critical_detail_paths(norm: &NormalizationConfig) -> Vec<String> {
    let mut paths: Vec<String> = norm
        .field_mappings
        .iter()
        .filter_map(|m| m.from.clone())
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

/// Resolve `source`/`category`/`severity`/`eventType` the way the Normalizer
/// would, for fingerprinting purposes, without requiring a full normalize
/// pass (used by `dedup_first` ordering, spec.md §4.8/§9 Open Question 1).
pub struct CanonicalFields<'a> {
    pub source: &'a str,
    pub category: &'a str,
    pub severity: &'a str,
    pub event_type: &'a str,
    pub resource_ref: Option<&'a ResourceRef>,
}

fn push_field(buf: &mut Vec<u8>, value: Option<&str>) {
    buf.push(0x1f); // unit separator framing between fields
    match value {
        Some(v) => buf.extend_from_slice(v.as_bytes()),
        None => buf.extend_from_slice(FINGERPRINT_SENTINEL.as_bytes()),
    }
}

/// Produce the canonical byte stream described in spec.md §4.1: source,
/// uppercased severity, category, eventType, resourceRef triple, then a
/// stable-ordered list of (fieldPath, value) critical-detail pairs.
pub fn canonicalize(event: &RawEvent, fields: &CanonicalFields, detail_paths: &[String]) -> Vec<u8> {
    let mut buf = Vec::new();
    push_field(&mut buf, Some(fields.source));
    push_field(&mut buf, Some(&fields.severity.to_uppercase()));
    push_field(&mut buf, Some(fields.category));
    push_field(&mut buf, Some(fields.event_type));

    match fields.resource_ref {
        Some(r) => {
            let (g, v, k, n, ns) = r.canonical_tuple();
            push_field(&mut buf, Some(g));
            push_field(&mut buf, Some(v));
            push_field(&mut buf, Some(k));
            push_field(&mut buf, Some(n));
            push_field(&mut buf, Some(ns));
        }
        None => push_field(&mut buf, None),
    }

    for path in detail_paths {
        push_field(&mut buf, Some(path));
        push_field(&mut buf, event.field_str(path));
    }

    buf
}

pub fn fingerprint_bytes(buf: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(buf);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Fingerprint(out)
}

/// Full fingerprint computation over a RawEvent plus its canonical fields.
pub fn compute(
    event: &RawEvent,
    fields: &CanonicalFields,
    norm: &NormalizationConfig,
) -> Fingerprint {
    let paths = critical_detail_paths(norm);
    let buf = canonicalize(event, fields, &paths);
    fingerprint_bytes(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator_common::types::Origin;
    use chrono::Utc;
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    fn critical_fields_norm() -> NormalizationConfig {
        let mut norm = NormalizationConfig::default();
        for path in ["cve", "host"] {
            norm.field_mappings.push(aggregator_common::normalization::FieldMapping {
                from: Some(path.into()),
                constant: None,
                to: format!("details.{path}"),
                static_mappings: None,
            });
        }
        norm
    }

    proptest! {
        /// Spec.md §8 "Fingerprint determinism": permuting the insertion
        /// order of the `details` map must never change the fingerprint —
        /// `critical_detail_paths` is a sorted, caller-supplied field list,
        /// and each value is looked up by key, not iteration order.
        #[test]
        fn fingerprint_is_invariant_under_detail_insertion_order(
            cve in "[A-Z0-9-]{4,12}",
            host in "[a-z0-9-]{3,12}",
            noise in "[a-z]{0,8}",
        ) {
            let norm = critical_fields_norm();

            let mut forward = Map::new();
            forward.insert("cve".into(), Value::String(cve.clone()));
            forward.insert("host".into(), Value::String(host.clone()));
            forward.insert("noise".into(), Value::String(noise.clone()));

            let mut reversed = Map::new();
            reversed.insert("noise".into(), Value::String(noise));
            reversed.insert("host".into(), Value::String(host));
            reversed.insert("cve".into(), Value::String(cve));

            let e1 = event(forward, 0);
            let e2 = event(reversed, 0);

            prop_assert_eq!(compute(&e1, &fields(), &norm), compute(&e2, &fields(), &norm));
        }
    }

    fn event(payload: Map<String, Value>, received_at_offset_secs: i64) -> RawEvent {
        RawEvent {
            source: "trivy".into(),
            received_at: Utc::now() + chrono::Duration::seconds(received_at_offset_secs),
            payload,
            origin: Origin::Webhook,
            resource_ref: None,
        }
    }

    fn fields<'a>() -> CanonicalFields<'a> {
        CanonicalFields {
            source: "trivy",
            category: "security",
            severity: "high",
            event_type: "vulnerability",
            resource_ref: None,
        }
    }

    #[test]
    fn deterministic_for_identical_input() {
        let norm = NormalizationConfig::default();
        let e = event(Map::new(), 0);
        let fp1 = compute(&e, &fields(), &norm);
        let fp2 = compute(&e, &fields(), &norm);
        assert_eq!(fp1, fp2);
    }

    #[test]
    fn ignores_receive_time() {
        let norm = NormalizationConfig::default();
        let e1 = event(Map::new(), 0);
        let e2 = event(Map::new(), 3600);
        assert_eq!(compute(&e1, &fields(), &norm), compute(&e2, &fields(), &norm));
    }

    #[test]
    fn ignores_non_critical_fields() {
        let norm = NormalizationConfig::default();
        let mut p1 = Map::new();
        p1.insert("noise".into(), Value::String("a".into()));
        let mut p2 = Map::new();
        p2.insert("noise".into(), Value::String("b".into()));
        let e1 = event(p1, 0);
        let e2 = event(p2, 0);
        assert_eq!(compute(&e1, &fields(), &norm), compute(&e2, &fields(), &norm));
    }

    #[test]
    fn missing_field_differs_from_empty_string() {
        let mut norm = NormalizationConfig::default();
        norm.field_mappings.push(aggregator_common::normalization::FieldMapping {
            from: Some("cve".into()),
            constant: None,
            to: "details.cve".into(),
            static_mappings: None,
        });

        let mut present = Map::new();
        present.insert("cve".into(), Value::String(String::new()));
        let e_present = event(present, 0);
        let e_missing = event(Map::new(), 0);

        assert_ne!(
            compute(&e_present, &fields(), &norm),
            compute(&e_missing, &fields(), &norm)
        );
    }
}
