//! Tag-dispatched adapter construction, SPEC_FULL.md §3 "Dynamic dispatch
//! over adapter variants ... a small tag-dispatched constructor keyed by
//! `ingester` enum is sufficient."

use std::sync::Arc;

use aggregator_adapters::{Adapter, CmAdapter, InformerAdapter, LogsAdapter, NativeEventsAdapter, WebhookAdapter};
use aggregator_common::error::AggregatorError;
use aggregator_common::source_config::{IngesterKind, SourceConfig};

/// Build the adapter named by `config.ingester`, pulled from whichever
/// sub-config field that kind requires. Spec.md §6 "Conditional" fields —
/// a missing sub-config for the declared kind is a validation error that
/// should have been caught by `aggregator-config::validate` already, but
/// this is re-checked here since the Orchestrator may run against a config
/// built outside that path (e.g. in tests).
pub fn build_adapter(config: &SourceConfig) -> Result<Arc<dyn Adapter>, AggregatorError> {
    let adapter: Arc<dyn Adapter> = match config.ingester {
        IngesterKind::Informer => {
            let cfg = config
                .informer
                .clone()
                .ok_or_else(|| AggregatorError::Config(format!("{}: missing informer config", config.source)))?;
            Arc::new(InformerAdapter::new(config.source.clone(), cfg))
        }
        IngesterKind::Webhook => {
            let cfg = config
                .webhook
                .clone()
                .ok_or_else(|| AggregatorError::Config(format!("{}: missing webhook config", config.source)))?;
            Arc::new(WebhookAdapter::new(config.source.clone(), cfg))
        }
        IngesterKind::Logs => {
            let cfg = config
                .logs
                .clone()
                .ok_or_else(|| AggregatorError::Config(format!("{}: missing logs config", config.source)))?;
            Arc::new(LogsAdapter::new(config.source.clone(), cfg))
        }
        IngesterKind::Cm => {
            let cfg = config
                .cm
                .clone()
                .ok_or_else(|| AggregatorError::Config(format!("{}: missing cm config", config.source)))?;
            Arc::new(CmAdapter::new(config.source.clone(), cfg))
        }
        IngesterKind::K8sEvents => Arc::new(NativeEventsAdapter::new(config.source.clone())),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator_common::filter::FilterSet;
    use aggregator_common::normalization::NormalizationConfig;
    use aggregator_common::source_config::{DedupConfig, ProcessingConfig, RateLimitConfig, WebhookConfig};

    fn base(ingester: IngesterKind) -> SourceConfig {
        SourceConfig {
            source: "trivy".into(),
            ingester,
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
    fn missing_subconfig_for_declared_kind_is_an_error() {
        let config = base(IngesterKind::Webhook);
        assert!(build_adapter(&config).is_err());
    }

    #[test]
    fn k8s_events_needs_no_subconfig() {
        let config = base(IngesterKind::K8sEvents);
        let adapter = build_adapter(&config).unwrap();
        assert_eq!(adapter.kind(), IngesterKind::K8sEvents);
    }

    #[test]
    fn webhook_with_subconfig_builds() {
        let mut config = base(IngesterKind::Webhook);
        config.webhook = Some(WebhookConfig {
            path: "/trivy".into(),
            port: 8080,
            buffer_size: 1000,
            auth: None,
        });
        let adapter = build_adapter(&config).unwrap();
        assert_eq!(adapter.kind(), IngesterKind::Webhook);
    }
}
