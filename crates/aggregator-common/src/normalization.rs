//! NormalizationConfig data shape and TTL duration parsing. Spec.md §3/§4.5.

use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::AggregatorError;
use crate::observation::{MAX_TTL_SECONDS, MIN_TTL_SECONDS};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Exactly one of `from`/`constant` is set; `from` reads a payload path,
    /// `constant` is a literal value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<serde_json::Value>,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_mappings: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationConfig {
    pub domain: String,
    #[serde(rename = "type")]
    pub ty: String,
    /// severity (as string key) -> priority float.
    #[serde(default)]
    pub priority_mapping: HashMap<String, f64>,
    /// fieldPath -> (value -> value).
    #[serde(default)]
    pub static_mappings: HashMap<String, HashMap<String, String>>,
    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,
    /// Constant TTL, if the config supplies one directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant_ttl: Option<String>,
    /// severity/category -> TTL string, consulted if `constant_ttl` is unset.
    #[serde(default)]
    pub ttl_mapping: HashMap<String, String>,
}

/// Parse a TTL spec: integer seconds, or integer+unit (`s|m|h|d|w`), and
/// clamp to `[MIN_TTL_SECONDS, MAX_TTL_SECONDS]`. Spec.md §4.5.
pub fn parse_ttl(spec: &str) -> Result<i64, AggregatorError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(AggregatorError::Normalize("empty TTL spec".into()));
    }

    let (digits, unit) = match spec.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&spec[..spec.len() - 1], Some(c)),
        _ => (spec, None),
    };

    let n: i64 = digits
        .parse()
        .map_err(|_| AggregatorError::Normalize(format!("invalid TTL spec {spec:?}")))?;

    let seconds = match unit {
        None | Some('s') => n,
        Some('m') => n * 60,
        Some('h') => n * 3600,
        Some('d') => n * 86_400,
        Some('w') => n * 604_800,
        Some(other) => {
            return Err(AggregatorError::Normalize(format!(
                "unknown TTL unit {other:?} in {spec:?}"
            )))
        }
    };

    Ok(seconds.clamp(MIN_TTL_SECONDS, MAX_TTL_SECONDS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_seconds() {
        assert_eq!(parse_ttl("120").unwrap(), 120);
    }

    #[test]
    fn parses_units() {
        assert_eq!(parse_ttl("5m").unwrap(), 300);
        assert_eq!(parse_ttl("2h").unwrap(), 7200);
        assert_eq!(parse_ttl("1d").unwrap(), 86_400);
        assert_eq!(parse_ttl("1w").unwrap(), 604_800);
    }

    #[test]
    fn clamps_to_bounds() {
        assert_eq!(parse_ttl("1s").unwrap(), MIN_TTL_SECONDS);
        assert_eq!(parse_ttl("999w").unwrap(), MAX_TTL_SECONDS);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_ttl("").is_err());
        assert!(parse_ttl("5x").is_err());
        assert!(parse_ttl("abc").is_err());
    }
}
