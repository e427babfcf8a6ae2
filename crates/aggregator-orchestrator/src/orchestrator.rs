//! Orchestrator (C12). Spec.md §4.12.
//!
//! Holds the set of active sources. `Start(source)` wires adapter +
//! `IngestQueue` + `Pipeline`; `Stop(source)` drains then tears down in
//! reverse order. Reacts to `ConfigLoader` diffs without restarting sources
//! whose adapter-visible fields didn't change (spec.md §4.10).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use aggregator_adapters::Adapter;
use aggregator_common::config::EnvConfig;
use aggregator_common::error::AggregatorError;
use aggregator_common::observer::Observer;
use aggregator_common::source_config::SourceConfig;
use aggregator_config::ConfigChange;
use aggregator_engine::ingest_queue::IngestQueue;
use aggregator_engine::pipeline::{ObservationWriter, Pipeline, PipelineState};

use crate::factory::build_adapter;
use crate::leader::LeaderGate;

/// Default budget a `Stop(source)` gets to drain in-flight events before
/// the worker tasks are aborted, mirroring the Writer's per-event deadline
/// order of magnitude (spec.md §5 "Cancellation & timeouts").
const DEFAULT_SHUTDOWN_BUDGET: Duration = Duration::from_secs(10);

struct SourceRuntime {
    adapter: Arc<dyn Adapter>,
    queue: Arc<IngestQueue>,
    pipeline: Arc<Pipeline>,
    config: Arc<ArcSwap<SourceConfig>>,
    workers: Vec<JoinHandle<()>>,
}

pub struct Orchestrator {
    env: EnvConfig,
    writer: Arc<dyn ObservationWriter>,
    observer: Arc<dyn Observer>,
    leader_gate: Arc<dyn LeaderGate>,
    shutdown_budget: Duration,
    sources: Mutex<HashMap<String, SourceRuntime>>,
}

impl Orchestrator {
    pub fn new(
        env: EnvConfig,
        writer: Arc<dyn ObservationWriter>,
        observer: Arc<dyn Observer>,
        leader_gate: Arc<dyn LeaderGate>,
    ) -> Self {
        Orchestrator {
            env,
            writer,
            observer,
            leader_gate,
            shutdown_budget: DEFAULT_SHUTDOWN_BUDGET,
            sources: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_shutdown_budget(mut self, budget: Duration) -> Self {
        self.shutdown_budget = budget;
        self
    }

    pub async fn is_running(&self, source: &str) -> bool {
        self.sources.lock().await.contains_key(source)
    }

    pub async fn active_sources(&self) -> Vec<String> {
        self.sources.lock().await.keys().cloned().collect()
    }

    /// `Start(source)`, spec.md §4.12. A leader-only ingester whose
    /// `LeaderGate` currently says no is a deliberate no-op, not an error —
    /// the Orchestrator will try again on the next `ConfigChange` or
    /// `reconcile_leadership` call.
    pub async fn start_source(&self, source: String, config: Arc<SourceConfig>) -> Result<(), AggregatorError> {
        let mut sources = self.sources.lock().await;
        if sources.contains_key(&source) {
            return Ok(());
        }
        if config.ingester.requires_leader() && !self.leader_gate.is_leader() {
            info!(source = %source, "deferring start: not leader for leader-only ingester");
            return Ok(());
        }

        let adapter = build_adapter(&config)?;
        let queue = Arc::new(IngestQueue::new(self.env.ingest_queue_capacity));
        let swap = Arc::new(ArcSwap::new(Arc::clone(&config)));

        let pipeline = Arc::new(Pipeline::new(
            Arc::clone(&swap),
            Arc::clone(&queue),
            self.env.dedup_max_size,
            Duration::from_secs(self.env.dedup_bucket_size_seconds),
            per_second(config.rate_limit.max_per_minute),
            config.rate_limit.burst as f64,
            Arc::clone(&self.writer),
            Arc::clone(&self.observer),
        ));

        let workers = pipeline.start(self.env.worker_pool_size);
        Arc::clone(&adapter).start(Arc::clone(&queue)).await?;

        info!(source = %source, ingester = ?config.ingester, "source started");
        sources.insert(
            source,
            SourceRuntime { adapter, queue, pipeline, config: swap, workers },
        );
        Ok(())
    }

    /// `Stop(source)`: drain then tear down in reverse order — adapter
    /// first (stop producing), then let the pipeline drain what's already
    /// queued within `shutdown_budget`, then abort workers.
    pub async fn stop_source(&self, source: &str) {
        let Some(runtime) = self.sources.lock().await.remove(source) else {
            return;
        };
        runtime.pipeline.begin_drain();
        if let Err(err) = runtime.adapter.stop().await {
            warn!(source, error = %err, "adapter stop failed");
        }

        let drain = async {
            for handle in runtime.workers {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(self.shutdown_budget, drain).await.is_err() {
            warn!(source, "shutdown budget exceeded, in-flight workers were not confirmed drained");
        }
        runtime.pipeline.mark_stopped();
        info!(source, "source stopped");
    }

    /// Swap the live config without restarting the adapter — used when a
    /// `ConfigChange::Applied` diff has no `adapter_changed` fields.
    pub async fn reconfigure_source(&self, source: &str, config: Arc<SourceConfig>) {
        if let Some(runtime) = self.sources.lock().await.get(source) {
            runtime.pipeline.reconfigure(Arc::clone(&config));
            runtime.config.store(config);
        }
    }

    pub async fn pipeline_state(&self, source: &str) -> Option<PipelineState> {
        self.sources.lock().await.get(source).map(|r| r.pipeline.state())
    }

    pub async fn queue_depth(&self, source: &str) -> Option<usize> {
        self.sources.lock().await.get(source).map(|r| r.queue.current_depth_hint())
    }

    /// Re-evaluate `StrategyDecider` for every running source (spec.md §4.9:
    /// "the Pipeline queries it per event", driven here by a timer rather
    /// than per event). Intended to be called on a `retick_interval` cadence
    /// (default the StrategyDecider's window, 5 min) by [`Self::run_strategy_ticker`].
    pub async fn retick_all_strategies(&self) {
        let now = std::time::Instant::now();
        for runtime in self.sources.lock().await.values() {
            runtime.pipeline.retick_strategy(now);
        }
    }

    /// Spawns the periodic strategy retick driving `StrategyDecider` (C9),
    /// without which `processing.order=auto` would never adapt away from
    /// each source's default order (spec.md §4.9/§8 scenario 4). Exits when
    /// `shutdown` fires, mirroring `GcCollector::run_periodic`.
    pub async fn run_strategy_ticker(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.retick_all_strategies().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    /// Apply one `ConfigChange` from `aggregator-config::ConfigLoader`.
    /// Restarts the adapter only when `diff.adapter_changed` — spec.md
    /// §4.10 "Orchestrator ... restarts adapters only when adapter-visible
    /// fields changed".
    pub async fn apply_change(&self, change: ConfigChange) {
        match change {
            ConfigChange::Applied { source, config, diff } => {
                if !self.is_running(&source).await {
                    if let Err(err) = self.start_source(source.clone(), config).await {
                        warn!(source = %source, error = %err, "failed to start source");
                    }
                } else if diff.adapter_changed {
                    self.stop_source(&source).await;
                    if let Err(err) = self.start_source(source.clone(), config).await {
                        warn!(source = %source, error = %err, "failed to restart source after adapter-visible change");
                    }
                } else if !diff.is_empty() {
                    self.reconfigure_source(&source, config).await;
                }
            }
            ConfigChange::Removed { source } => {
                self.stop_source(&source).await;
            }
            ConfigChange::Rejected { source, reason } => {
                warn!(source = %source, reason, "SourceConfig change rejected, previous config (if any) keeps running");
                self.observer.config_validation_error(&source);
            }
        }
    }

    /// Re-evaluate leader-gated sources against the current `LeaderGate`
    /// value. Spec.md §9 treats leadership as a capability the Orchestrator
    /// queries; it doesn't mandate a push notification on flip, so callers
    /// drive this on whatever cadence their leader-election wiring uses.
    pub async fn reconcile_leadership(&self, known_configs: &HashMap<String, Arc<SourceConfig>>) {
        let is_leader = self.leader_gate.is_leader();
        let running: Vec<String> = self.active_sources().await;
        for source in running {
            if let Some(config) = known_configs.get(&source) {
                if config.ingester.requires_leader() && !is_leader {
                    info!(source = %source, "lost leadership, stopping leader-only source");
                    self.stop_source(&source).await;
                }
            }
        }
        if is_leader {
            for (source, config) in known_configs {
                if config.ingester.requires_leader() && !self.is_running(source).await {
                    if let Err(err) = self.start_source(source.clone(), Arc::clone(config)).await {
                        warn!(source = %source, error = %err, "failed to start source after gaining leadership");
                    }
                }
            }
        }
    }

    /// Drain the `ConfigChange` stream from `ConfigLoader::run_watch`,
    /// reconciling until `shutdown` fires, then `stop_source` everything
    /// still running.
    pub async fn run(
        self: Arc<Self>,
        mut changes: mpsc::Receiver<ConfigChange>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                Some(change) = changes.recv() => {
                    self.apply_change(change).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                else => break,
            }
        }
        let running = self.active_sources().await;
        for source in running {
            self.stop_source(&source).await;
        }
    }
}

fn per_second(max_per_minute: u32) -> f64 {
    (max_per_minute.max(1) as f64) / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator_common::filter::FilterSet;
    use aggregator_common::normalization::NormalizationConfig;
    use aggregator_common::observer::NoopObserver;
    use aggregator_common::source_config::{
        DedupConfig, Destination, IngesterKind, ProcessingConfig, RateLimitConfig, WebhookConfig,
    };
    use async_trait::async_trait;

    use crate::leader::AtomicLeaderGate;

    struct NullWriter;

    #[async_trait]
    impl ObservationWriter for NullWriter {
        async fn write(&self, _config: &SourceConfig, _observation: &aggregator_common::observation::Observation) -> Result<(), AggregatorError> {
            Ok(())
        }
    }

    fn webhook_config(source: &str) -> Arc<SourceConfig> {
        Arc::new(SourceConfig {
            source: source.into(),
            ingester: IngesterKind::Webhook,
            informer: None,
            webhook: Some(WebhookConfig {
                path: format!("/{source}"),
                port: 8080,
                buffer_size: 100,
                auth: None,
            }),
            logs: None,
            cm: None,
            destinations: vec![Destination {
                gvr: aggregator_common::gvr::Gvr::new("aggregator.observability.io", "v1", "observations"),
                namespace: Some("monitoring".into()),
                cluster_scoped_opt_in: false,
            }],
            filter: FilterSet::default(),
            normalization: NormalizationConfig::default(),
            dedup: DedupConfig::default(),
            rate_limit: RateLimitConfig::default(),
            processing: ProcessingConfig::default(),
            generation: 0,
        })
    }

    fn informer_config(source: &str) -> Arc<SourceConfig> {
        let mut c = (*webhook_config(source)).clone();
        c.ingester = IngesterKind::Informer;
        c.webhook = None;
        c.informer = Some(aggregator_common::source_config::InformerConfig {
            group: "apps".into(),
            version: "v1".into(),
            resource: "deployments".into(),
        });
        Arc::new(c)
    }

    fn orchestrator(leader: bool) -> Orchestrator {
        Orchestrator::new(
            EnvConfig::default(),
            Arc::new(NullWriter),
            Arc::new(NoopObserver),
            Arc::new(AtomicLeaderGate::new(leader)),
        )
    }

    #[tokio::test]
    async fn start_then_stop_source() {
        let orch = orchestrator(true);
        orch.start_source("trivy".into(), webhook_config("trivy")).await.unwrap();
        assert!(orch.is_running("trivy").await);
        assert_eq!(orch.pipeline_state("trivy").await, Some(PipelineState::Running));
        orch.stop_source("trivy").await;
        assert!(!orch.is_running("trivy").await);
    }

    #[tokio::test]
    async fn starting_twice_is_a_noop() {
        let orch = orchestrator(true);
        orch.start_source("trivy".into(), webhook_config("trivy")).await.unwrap();
        orch.start_source("trivy".into(), webhook_config("trivy")).await.unwrap();
        assert_eq!(orch.active_sources().await.len(), 1);
    }

    #[tokio::test]
    async fn leader_only_ingester_defers_start_without_leadership() {
        let orch = orchestrator(false);
        orch.start_source("trivy".into(), informer_config("trivy")).await.unwrap();
        assert!(!orch.is_running("trivy").await);
    }

    #[tokio::test]
    async fn webhook_ingester_starts_without_leadership() {
        let orch = orchestrator(false);
        orch.start_source("trivy".into(), webhook_config("trivy")).await.unwrap();
        assert!(orch.is_running("trivy").await);
    }

    #[tokio::test]
    async fn removed_change_stops_running_source() {
        let orch = orchestrator(true);
        orch.start_source("trivy".into(), webhook_config("trivy")).await.unwrap();
        orch.apply_change(ConfigChange::Removed { source: "trivy".into() }).await;
        assert!(!orch.is_running("trivy").await);
    }

    #[tokio::test]
    async fn applied_change_with_no_diff_reconfigures_in_place() {
        let orch = orchestrator(true);
        orch.start_source("trivy".into(), webhook_config("trivy")).await.unwrap();
        let mut updated = (*webhook_config("trivy")).clone();
        updated.filter.min_priority = 0.9;
        orch.apply_change(ConfigChange::Applied {
            source: "trivy".into(),
            config: Arc::new(updated),
            diff: aggregator_common::source_config::SourceConfigDiff {
                filter_changed: true,
                ..Default::default()
            },
        })
        .await;
        assert!(orch.is_running("trivy").await);
    }
}
