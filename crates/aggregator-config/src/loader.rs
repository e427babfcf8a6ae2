//! ConfigLoader (C11). Spec.md §4.10.
//!
//! Bootstraps the initial set of `SourceConfig` snapshots from the
//! `K8sStore`, validates and resolves precedence for each, and republishes
//! on every watch event — while keeping the last-known-good snapshot for any
//! source whose new resource fails validation, per spec.md §4.10 "an invalid
//! update is rejected and the previous valid config continues to serve".

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use futures::StreamExt;
use tracing::{error, info, warn};

use aggregator_common::config::EnvConfig;
use aggregator_common::source_config::{self, SourceConfig, SourceConfigDiff};
use aggregator_k8s::store::{K8sStore, SourceConfigEvent};

use crate::precedence::{self, ConfigMapOverrides};
use crate::validate;

/// What changed for a source, passed to the Orchestrator so it can decide
/// whether to restart the adapter or just swap the Pipeline's config
/// snapshot (spec.md §4.10).
#[derive(Debug, Clone)]
pub enum ConfigChange {
    Applied {
        source: String,
        config: Arc<SourceConfig>,
        diff: SourceConfigDiff,
    },
    Removed {
        source: String,
    },
    Rejected {
        source: String,
        reason: String,
    },
}

pub struct ConfigLoader<S: K8sStore> {
    store: Arc<S>,
    env: EnvConfig,
    configmap: ConfigMapOverrides,
    snapshots: ArcSwap<HashMap<String, Arc<SourceConfig>>>,
}

impl<S: K8sStore> ConfigLoader<S> {
    pub fn new(store: Arc<S>, env: EnvConfig, configmap: ConfigMapOverrides) -> Self {
        ConfigLoader {
            store,
            env,
            configmap,
            snapshots: ArcSwap::new(Arc::new(HashMap::new())),
        }
    }

    pub fn snapshot(&self, source: &str) -> Option<Arc<SourceConfig>> {
        self.snapshots.load().get(source).cloned()
    }

    pub fn snapshot_all(&self) -> Arc<HashMap<String, Arc<SourceConfig>>> {
        self.snapshots.load_full()
    }

    /// Resolve + validate one raw `SourceConfig`, returning the ready-to-
    /// publish snapshot. Does not mutate `self` — callers decide whether to
    /// publish the result.
    fn prepare(&self, mut raw: SourceConfig) -> Result<SourceConfig, String> {
        precedence::resolve(&mut raw, &self.configmap, &self.env);
        validate::validate(&raw, &self.env).map_err(|e| e.to_string())?;
        Ok(raw)
    }

    /// List every `SourceConfig` currently in the cluster and publish an
    /// initial snapshot set. Sources that fail validation are logged and
    /// skipped — spec.md §4.10 bootstrap behaves like a rejected update with
    /// no prior good config to fall back to.
    pub async fn bootstrap(&self) -> Result<(), aggregator_common::error::AggregatorError> {
        let listed = self.store.list_source_configs().await?;
        let mut map = HashMap::new();
        for named in listed {
            match self.prepare(named.config) {
                Ok(resolved) => {
                    map.insert(named.name.clone(), Arc::new(resolved));
                }
                Err(reason) => {
                    warn!(source = %named.name, reason, "SourceConfig rejected at bootstrap");
                }
            }
        }
        info!(count = map.len(), "ConfigLoader bootstrap complete");
        self.snapshots.store(Arc::new(map));
        Ok(())
    }

    /// Drain the store's watch stream, republishing and emitting a
    /// [`ConfigChange`] per event. Intended to run for the process lifetime
    /// on a background task.
    pub async fn run_watch(&self, changes: tokio::sync::mpsc::Sender<ConfigChange>) {
        let mut stream = self.store.watch_source_configs();
        while let Some(event) = stream.next().await {
            let change = match event {
                Ok(SourceConfigEvent::Applied(named)) => self.apply(named.name, named.config),
                Ok(SourceConfigEvent::Deleted(name)) => self.remove(name),
                Err(err) => {
                    error!(error = %err, "SourceConfig watch error");
                    continue;
                }
            };
            if changes.send(change).await.is_err() {
                break;
            }
        }
    }

    fn apply(&self, name: String, raw: SourceConfig) -> ConfigChange {
        let old = self.snapshot(&name);
        match self.prepare(raw) {
            Ok(resolved) => {
                let diff = old
                    .as_deref()
                    .map(|old| source_config::diff(old, &resolved))
                    .unwrap_or_else(|| SourceConfigDiff {
                        adapter_changed: true,
                        filter_changed: true,
                        normalization_changed: true,
                        dedup_changed: true,
                        rate_limit_changed: true,
                        processing_changed: true,
                        destinations_changed: true,
                    });
                let resolved = Arc::new(resolved);
                let mut map = (*self.snapshots.load_full()).clone();
                map.insert(name.clone(), Arc::clone(&resolved));
                self.snapshots.store(Arc::new(map));
                ConfigChange::Applied { source: name, config: resolved, diff }
            }
            Err(reason) => {
                warn!(source = %name, reason, "SourceConfig update rejected, keeping previous snapshot");
                ConfigChange::Rejected { source: name, reason }
            }
        }
    }

    fn remove(&self, name: String) -> ConfigChange {
        let mut map = (*self.snapshots.load_full()).clone();
        map.remove(&name);
        self.snapshots.store(Arc::new(map));
        ConfigChange::Removed { source: name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator_common::filter::FilterSet;
    use aggregator_common::gvr::Gvr;
    use aggregator_common::normalization::NormalizationConfig;
    use aggregator_common::source_config::{
        DedupConfig, Destination, IngesterKind, ProcessingConfig, RateLimitConfig, WebhookConfig,
    };
    use aggregator_k8s::store::{FakeStore, NamedSourceConfig};

    fn gvr() -> Gvr {
        Gvr::new("aggregator.observability.io", "v1", "observations")
    }

    fn env() -> EnvConfig {
        let mut env = EnvConfig::default();
        env.allowed_gvrs = vec![gvr().to_string()];
        env.allowed_namespaces = vec!["monitoring".into()];
        env
    }

    fn valid_config(source: &str) -> SourceConfig {
        SourceConfig {
            source: source.into(),
            ingester: IngesterKind::Webhook,
            informer: None,
            webhook: Some(WebhookConfig {
                path: format!("/{source}"),
                port: 8080,
                buffer_size: 1000,
                auth: None,
            }),
            logs: None,
            cm: None,
            destinations: vec![Destination {
                gvr: gvr(),
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

    #[tokio::test]
    async fn bootstrap_publishes_valid_configs_and_skips_invalid() {
        let mut invalid = valid_config("falco");
        invalid.webhook = None;
        let store = Arc::new(FakeStore::new(vec![
            NamedSourceConfig::new("trivy", valid_config("trivy")),
            NamedSourceConfig::new("falco", invalid),
        ]));
        let loader = ConfigLoader::new(store, env(), ConfigMapOverrides::default());
        loader.bootstrap().await.unwrap();

        assert!(loader.snapshot("trivy").is_some());
        assert!(loader.snapshot("falco").is_none());
    }

    #[tokio::test]
    async fn bootstrap_resolves_dedup_window_from_env_default() {
        let store = Arc::new(FakeStore::new(vec![NamedSourceConfig::new(
            "trivy",
            valid_config("trivy"),
        )]));
        let loader = ConfigLoader::new(store, env(), ConfigMapOverrides::default());
        loader.bootstrap().await.unwrap();

        let snap = loader.snapshot("trivy").unwrap();
        assert_eq!(snap.dedup.window_seconds, Some(60));
    }

    #[test]
    fn apply_rejects_invalid_update_and_keeps_prior_snapshot() {
        let store = Arc::new(FakeStore::default());
        let loader = ConfigLoader::new(store, env(), ConfigMapOverrides::default());

        let first = loader.apply("trivy".into(), valid_config("trivy"));
        assert!(matches!(first, ConfigChange::Applied { .. }));
        assert!(loader.snapshot("trivy").is_some());

        let mut broken = valid_config("trivy");
        broken.webhook = None;
        let second = loader.apply("trivy".into(), broken);
        assert!(matches!(second, ConfigChange::Rejected { .. }));
        assert!(loader.snapshot("trivy").is_some());
    }

    #[test]
    fn remove_clears_snapshot() {
        let store = Arc::new(FakeStore::default());
        let loader = ConfigLoader::new(store, env(), ConfigMapOverrides::default());
        loader.apply("trivy".into(), valid_config("trivy"));
        assert!(loader.snapshot("trivy").is_some());
        loader.remove("trivy".into());
        assert!(loader.snapshot("trivy").is_none());
    }
}
