//! Normalizer (C5). Spec.md §4.5.
//!
//! Applies field-mapping + static-mapping rules to produce an
//! Observation-shaped record, and derives its TTL. Failures are reported
//! (an `Err`), never silently dropped — the caller (Pipeline) counts them
//! as `normalize_error` per spec.md §4.8.

use aggregator_common::error::AggregatorError;
use aggregator_common::normalization::{parse_ttl, NormalizationConfig};
use aggregator_common::observation::{self, Observation};
use aggregator_common::types::{Category, RawEvent, Severity};
use std::str::FromStr;

/// Normalize a RawEvent into a validated Observation.
///
/// Required fields (`source`, `category`, `severity`, `eventType`) are
/// resolved from `field_mappings` entries targeting those four `to` paths;
/// anything else a mapping targets lands in `details`. Category/severity
/// values pass through `FromStr`, so an unrecognized value surfaces as a
/// `normalize_error`, per spec.md §4.5 "failures are reported, not silently
/// dropped".
pub fn normalize(event: &RawEvent, config: &NormalizationConfig) -> Result<Observation, AggregatorError> {
    let mut category: Option<Category> = None;
    let mut severity: Option<Severity> = None;
    let mut event_type: Option<String> = None;
    let mut details = serde_json::Map::new();

    for mapping in &config.field_mappings {
        let mut value = match (&mapping.from, &mapping.constant) {
            (Some(path), _) => event.payload.get(path).cloned(),
            (None, Some(c)) => Some(c.clone()),
            (None, None) => None,
        };

        if let (Some(serde_json::Value::String(s)), Some(statics)) =
            (&value, &mapping.static_mappings)
        {
            if let Some(mapped) = statics.get(s) {
                value = Some(mapped.clone());
            }
        }

        let Some(value) = value else { continue };

        match mapping.to.as_str() {
            "category" => {
                let s = value
                    .as_str()
                    .ok_or_else(|| AggregatorError::Normalize("category must be a string".into()))?;
                category = Some(Category::from_str(s)?);
            }
            "severity" => {
                let s = value
                    .as_str()
                    .ok_or_else(|| AggregatorError::Normalize("severity must be a string".into()))?;
                severity = Some(Severity::from_str(s)?);
            }
            "eventType" => {
                let s = value
                    .as_str()
                    .ok_or_else(|| AggregatorError::Normalize("eventType must be a string".into()))?;
                event_type = Some(s.to_string());
            }
            other => {
                details.insert(other.to_string(), value);
            }
        }
    }

    let category = category
        .ok_or_else(|| AggregatorError::Normalize("no field mapping produced category".into()))?;
    let severity = severity
        .ok_or_else(|| AggregatorError::Normalize("no field mapping produced severity".into()))?;
    let event_type = event_type
        .ok_or_else(|| AggregatorError::Normalize("no field mapping produced eventType".into()))?;

    let priority = resolve_priority(config, severity);
    let ttl = resolve_ttl(config, severity, category)?;

    let obs = Observation {
        source: event.source.clone(),
        category,
        severity,
        event_type,
        resource: event.resource_ref.clone(),
        details: if details.is_empty() {
            None
        } else {
            Some(serde_json::Value::Object(details))
        },
        detected_at: Some(event.received_at),
        ttl_seconds_after_creation: ttl,
        priority: Some(priority),
    };

    observation::validate(&obs)?;
    Ok(obs)
}

fn resolve_priority(config: &NormalizationConfig, severity: Severity) -> f64 {
    config
        .priority_mapping
        .get(&severity.to_string())
        .copied()
        .unwrap_or(match severity {
            Severity::Critical => 1.0,
            Severity::High => 0.8,
            Severity::Medium => 0.5,
            Severity::Low => 0.2,
            Severity::Info => 0.0,
        })
}

/// TTL derivation, spec.md §4.5: constant TTL wins, then a static mapping
/// keyed by severity/category, else unset.
fn resolve_ttl(
    config: &NormalizationConfig,
    severity: Severity,
    category: Category,
) -> Result<Option<i64>, AggregatorError> {
    if let Some(constant) = &config.constant_ttl {
        return Ok(Some(parse_ttl(constant)?));
    }

    if let Some(spec) = config.ttl_mapping.get(&severity.to_string()) {
        return Ok(Some(parse_ttl(spec)?));
    }
    if let Some(spec) = config.ttl_mapping.get(&category.to_string()) {
        return Ok(Some(parse_ttl(spec)?));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator_common::normalization::FieldMapping;
    use aggregator_common::types::Origin;
    use chrono::Utc;
    use serde_json::{json, Map};
    use std::collections::HashMap;

    fn mapping(from: &str, to: &str) -> FieldMapping {
        FieldMapping {
            from: Some(from.into()),
            constant: None,
            to: to.into(),
            static_mappings: None,
        }
    }

    fn base_config() -> NormalizationConfig {
        NormalizationConfig {
            domain: "security".into(),
            ty: "vulnerability".into(),
            priority_mapping: HashMap::new(),
            static_mappings: HashMap::new(),
            field_mappings: vec![
                mapping("cat", "category"),
                mapping("sev", "severity"),
                mapping("evt", "eventType"),
                mapping("cve", "details.cve"),
            ],
            constant_ttl: None,
            ttl_mapping: HashMap::new(),
        }
    }

    fn raw_event() -> RawEvent {
        let mut payload = Map::new();
        payload.insert("cat".into(), json!("security"));
        payload.insert("sev".into(), json!("high"));
        payload.insert("evt".into(), json!("vulnerability"));
        payload.insert("cve".into(), json!("CVE-2024-0001"));
        RawEvent {
            source: "trivy".into(),
            received_at: Utc::now(),
            payload,
            origin: Origin::Webhook,
            resource_ref: None,
        }
    }

    #[test]
    fn normalizes_required_fields() {
        let obs = normalize(&raw_event(), &base_config()).unwrap();
        assert_eq!(obs.category, Category::Security);
        assert_eq!(obs.severity, Severity::High);
        assert_eq!(obs.event_type, "vulnerability");
        assert_eq!(obs.priority, Some(0.8));
    }

    #[test]
    fn missing_required_mapping_is_normalize_error() {
        let mut config = base_config();
        config.field_mappings.retain(|m| m.to != "category");
        let err = normalize(&raw_event(), &config).unwrap_err();
        assert!(matches!(err, AggregatorError::Normalize(_)));
    }

    #[test]
    fn constant_ttl_wins_over_mapping() {
        let mut config = base_config();
        config.constant_ttl = Some("1h".into());
        config.ttl_mapping.insert("high".into(), "2h".into());
        let obs = normalize(&raw_event(), &config).unwrap();
        assert_eq!(obs.ttl_seconds_after_creation, Some(3600));
    }

    #[test]
    fn ttl_mapping_by_severity_when_no_constant() {
        let mut config = base_config();
        config.ttl_mapping.insert("high".into(), "2h".into());
        let obs = normalize(&raw_event(), &config).unwrap();
        assert_eq!(obs.ttl_seconds_after_creation, Some(7200));
    }

    #[test]
    fn unset_ttl_when_no_config() {
        let obs = normalize(&raw_event(), &base_config()).unwrap();
        assert_eq!(obs.ttl_seconds_after_creation, None);
    }

    #[test]
    fn static_mapping_rewrites_value_before_assignment() {
        let mut config = base_config();
        let mut statics = HashMap::new();
        statics.insert("vulnerability".to_string(), json!("cve_found"));
        config.field_mappings = vec![
            mapping("cat", "category"),
            mapping("sev", "severity"),
            FieldMapping {
                from: Some("evt".into()),
                constant: None,
                to: "eventType".into(),
                static_mappings: Some(statics),
            },
        ];
        let obs = normalize(&raw_event(), &config).unwrap();
        assert_eq!(obs.event_type, "cve_found");
    }
}
