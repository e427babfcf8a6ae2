//! SourceConfig validation. Spec.md §4.10/§7 — ConfigLoader rejects an
//! invalid resource and keeps serving the previous good snapshot rather than
//! ever publishing a half-valid config.

use aggregator_common::config::EnvConfig;
use aggregator_common::error::AggregatorError;
use aggregator_common::gvr::check_allowed;
use aggregator_common::normalization::parse_ttl;
use aggregator_common::source_config::{IngesterKind, SourceConfig};
use aggregator_common::types::is_valid_source;

/// Validate a `SourceConfig` against spec.md §3/§4.6/§4.10 before it's
/// published. Collects every violation rather than short-circuiting on the
/// first, matching `aggregator_common::observation::validate`'s style.
pub fn validate(config: &SourceConfig, env: &EnvConfig) -> Result<(), AggregatorError> {
    let mut errors = Vec::new();

    if !is_valid_source(&config.source) {
        errors.push(format!("source {:?} does not match ^[a-z0-9-]+$", config.source));
    }

    match config.ingester {
        IngesterKind::Informer if config.informer.is_none() => {
            errors.push("ingester informer requires an informer block".into())
        }
        IngesterKind::Webhook if config.webhook.is_none() => {
            errors.push("ingester webhook requires a webhook block".into())
        }
        IngesterKind::Logs if config.logs.is_none() => {
            errors.push("ingester logs requires a logs block".into())
        }
        IngesterKind::Cm if config.cm.is_none() => {
            errors.push("ingester cm requires a cm block".into())
        }
        _ => {}
    }

    if config.destinations.is_empty() {
        errors.push("at least one destination is required".into());
    }
    for dest in &config.destinations {
        if let Err(reason) = check_allowed(
            &dest.gvr,
            dest.namespace.as_deref(),
            dest.cluster_scoped_opt_in,
            &env.allowed_gvrs,
            &env.allowed_namespaces,
            &env.allowed_cluster_scoped_gvrs,
        ) {
            errors.push(format!("destination {} denied: {}", dest.gvr, reason.as_str()));
        }
    }

    if let Some(ttl) = &config.normalization.constant_ttl {
        if let Err(e) = parse_ttl(ttl) {
            errors.push(format!("normalization.constantTtl: {e}"));
        }
    }
    for (key, ttl) in &config.normalization.ttl_mapping {
        if let Err(e) = parse_ttl(ttl) {
            errors.push(format!("normalization.ttlMapping[{key}]: {e}"));
        }
    }

    if !(0.0..=1.0).contains(&config.filter.min_priority) {
        errors.push(format!(
            "filter.minPriority {} out of range [0.0, 1.0]",
            config.filter.min_priority
        ));
    }

    if config.rate_limit.max_per_minute == 0 {
        errors.push("rateLimit.maxPerMinute must be > 0".into());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AggregatorError::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator_common::filter::FilterSet;
    use aggregator_common::gvr::Gvr;
    use aggregator_common::normalization::NormalizationConfig;
    use aggregator_common::source_config::{Destination, DedupConfig, ProcessingConfig, RateLimitConfig, WebhookConfig};

    fn env_with_allow(gvr: &Gvr) -> EnvConfig {
        let mut env = EnvConfig::default();
        env.allowed_gvrs = vec![gvr.to_string()];
        env.allowed_namespaces = vec!["monitoring".into()];
        env
    }

    fn base_config(gvr: Gvr) -> SourceConfig {
        SourceConfig {
            source: "trivy".into(),
            ingester: IngesterKind::Webhook,
            informer: None,
            webhook: Some(WebhookConfig {
                path: "/trivy".into(),
                port: 8080,
                buffer_size: 1000,
                auth: None,
            }),
            logs: None,
            cm: None,
            destinations: vec![Destination {
                gvr,
                namespace: Some("monitoring".into()),
                cluster_scoped_opt_in: false,
            }],
            filter: FilterSet::default(),
            normalization: NormalizationConfig::default(),
            dedup: DedupConfig::default(),
            rate_limit: RateLimitConfig::default(),
            processing: ProcessingConfig::default(),
            generation: 0,
        }
    }

    #[test]
    fn accepts_well_formed_config() {
        let gvr = Gvr::new("aggregator.observability.io", "v1", "observations");
        let env = env_with_allow(&gvr);
        assert!(validate(&base_config(gvr), &env).is_ok());
    }

    #[test]
    fn rejects_missing_ingester_block() {
        let gvr = Gvr::new("aggregator.observability.io", "v1", "observations");
        let env = env_with_allow(&gvr);
        let mut cfg = base_config(gvr);
        cfg.webhook = None;
        assert!(validate(&cfg, &env).is_err());
    }

    #[test]
    fn rejects_destination_not_in_allow_list() {
        let gvr = Gvr::new("aggregator.observability.io", "v1", "observations");
        let env = EnvConfig::default();
        assert!(validate(&base_config(gvr), &env).is_err());
    }

    #[test]
    fn rejects_destination_on_hard_deny_list_even_if_allow_listed() {
        let secrets = Gvr::core("v1", "secrets");
        let mut env = env_with_allow(&secrets);
        env.allowed_namespaces = vec!["monitoring".into()];
        assert!(validate(&base_config(secrets), &env).is_err());
    }

    #[test]
    fn rejects_bad_ttl_spec() {
        let gvr = Gvr::new("aggregator.observability.io", "v1", "observations");
        let env = env_with_allow(&gvr);
        let mut cfg = base_config(gvr);
        cfg.normalization.constant_ttl = Some("nonsense".into());
        assert!(validate(&cfg, &env).is_err());
    }

    #[test]
    fn rejects_zero_rate_limit() {
        let gvr = Gvr::new("aggregator.observability.io", "v1", "observations");
        let env = env_with_allow(&gvr);
        let mut cfg = base_config(gvr);
        cfg.rate_limit.max_per_minute = 0;
        assert!(validate(&cfg, &env).is_err());
    }
}
