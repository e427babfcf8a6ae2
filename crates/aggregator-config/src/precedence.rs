//! CRD > ConfigMap > env > default precedence, spec.md §9 Open Question.
//!
//! Only the fields that are naturally optional in the wire shape
//! (`dedup.window_seconds`, `dedup.strategy`, `processing.order`) get the
//! full four-tier treatment here — `RateLimitConfig`/TTL fields already
//! resolve to a concrete default the moment `serde(default)` runs on
//! deserialize, so CRD-vs-default is the only precedence step left for them.

use std::collections::HashMap;

use aggregator_common::config::EnvConfig;
use aggregator_common::source_config::{ProcessingOrder, SourceConfig};

/// A flat `key=value` overlay sourced from a mounted ConfigMap, sitting
/// between the CRD and the process env in precedence.
#[derive(Debug, Clone, Default)]
pub struct ConfigMapOverrides {
    pub dedup_window_seconds: Option<u64>,
    pub dedup_window_by_source: HashMap<String, u64>,
    pub processing_order: Option<ProcessingOrder>,
}

impl ConfigMapOverrides {
    pub fn from_data(data: &HashMap<String, String>) -> Self {
        let mut by_source = HashMap::new();
        if let Some(raw) = data.get("dedupWindowBySource") {
            for pair in raw.split(',') {
                if let Some((k, v)) = pair.split_once('=') {
                    if let Ok(v) = v.trim().parse() {
                        by_source.insert(k.trim().to_string(), v);
                    }
                }
            }
        }
        ConfigMapOverrides {
            dedup_window_seconds: data.get("dedupWindowSeconds").and_then(|v| v.parse().ok()),
            dedup_window_by_source: by_source,
            processing_order: data.get("processingOrder").and_then(|v| match v.as_str() {
                "filter_first" => Some(ProcessingOrder::FilterFirst),
                "dedup_first" => Some(ProcessingOrder::DedupFirst),
                "auto" => Some(ProcessingOrder::Auto),
                _ => None,
            }),
        }
    }
}

/// Fill in the `Option` fields a CRD left unset, in CRD > ConfigMap > env >
/// default order. Mutates `config` in place; safe to call repeatedly since
/// it never overwrites a field the CRD already set.
pub fn resolve(config: &mut SourceConfig, cm: &ConfigMapOverrides, env: &EnvConfig) {
    if config.dedup.window_seconds.is_none() {
        config.dedup.window_seconds = cm
            .dedup_window_by_source
            .get(&config.source)
            .copied()
            .or(cm.dedup_window_seconds)
            .or_else(|| Some(env.dedup_window_for(&config.source)));
    }
    if config.processing.order.is_none() {
        config.processing.order = cm.processing_order.or(Some(ProcessingOrder::Auto));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator_common::filter::FilterSet;
    use aggregator_common::normalization::NormalizationConfig;
    use aggregator_common::source_config::{
        DedupConfig, IngesterKind, ProcessingConfig, RateLimitConfig,
    };

    fn config() -> SourceConfig {
        SourceConfig {
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
        }
    }

    #[test]
    fn crd_value_is_never_overwritten() {
        let mut cfg = config();
        cfg.dedup.window_seconds = Some(30);
        let cm = ConfigMapOverrides {
            dedup_window_seconds: Some(999),
            ..Default::default()
        };
        resolve(&mut cfg, &cm, &EnvConfig::default());
        assert_eq!(cfg.dedup.window_seconds, Some(30));
    }

    #[test]
    fn configmap_beats_env_default() {
        let mut cfg = config();
        let cm = ConfigMapOverrides {
            dedup_window_seconds: Some(45),
            ..Default::default()
        };
        resolve(&mut cfg, &cm, &EnvConfig::default());
        assert_eq!(cfg.dedup.window_seconds, Some(45));
    }

    #[test]
    fn per_source_configmap_override_beats_blanket_configmap_value() {
        let mut cfg = config();
        let mut by_source = HashMap::new();
        by_source.insert("trivy".to_string(), 15);
        let cm = ConfigMapOverrides {
            dedup_window_seconds: Some(45),
            dedup_window_by_source: by_source,
            processing_order: None,
        };
        resolve(&mut cfg, &cm, &EnvConfig::default());
        assert_eq!(cfg.dedup.window_seconds, Some(15));
    }

    #[test]
    fn falls_back_to_env_default_when_nothing_else_set() {
        let mut cfg = config();
        resolve(&mut cfg, &ConfigMapOverrides::default(), &EnvConfig::default());
        assert_eq!(cfg.dedup.window_seconds, Some(60));
        assert_eq!(cfg.processing.order, Some(ProcessingOrder::Auto));
    }
}
