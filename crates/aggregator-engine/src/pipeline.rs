//! Pipeline (C8). Spec.md §4.8.
//!
//! One `Pipeline` per active source. Owns that source's `IngestQueue`,
//! `DedupStore`, `TokenBucket` and `StrategyDecider`, and pins an
//! `Arc<SourceConfig>` snapshot per event so a mid-flight `ConfigLoader`
//! reload never produces an inconsistent decision (spec.md §3 "Ownership").
//! `ArcSwap` is the same lock-free snapshot-publish idiom used for
//! `FilterSet`/`NormalizationConfig` reloads elsewhere in this crate family.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tracing::{debug, warn};

use aggregator_common::error::AggregatorError;
use aggregator_common::observation::Observation;
use aggregator_common::observer::Observer;
use aggregator_common::source_config::SourceConfig;
use aggregator_common::types::RawEvent;

use crate::dedup::{DedupDecision, DedupStore};
use crate::filter_engine::{self, DenyReason, FilterDecision, FilterInput};
use crate::fingerprint::{self, CanonicalFields};
use crate::ingest_queue::IngestQueue;
use crate::normalizer;
use crate::strategy::{ProcessingOrder, SourceMetricsWindow, StrategyDecider};
use crate::token_bucket::TokenBucket;

/// The boundary to the Writer (C6)/API store, implemented concretely in
/// `aggregator-k8s`. Kept here, not there, so this crate doesn't depend on
/// `kube` just to express "what the Pipeline calls after Normalize".
#[async_trait]
pub trait ObservationWriter: Send + Sync {
    async fn write(&self, config: &SourceConfig, observation: &Observation) -> Result<(), AggregatorError>;
}

/// Lifecycle state, spec.md §4.8: `Idle -> Starting -> Running -> Draining
/// -> Stopped`. No state is skipped; `Draining` means the queue is closed to
/// new sends but workers finish in-flight events before `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Starting,
    Running,
    Draining,
    Stopped,
}

pub struct Pipeline {
    config: Arc<ArcSwap<SourceConfig>>,
    queue: Arc<IngestQueue>,
    dedup: DedupStore,
    rate_limiter: TokenBucket,
    strategy: Mutex<StrategyDecider>,
    metrics_window: Mutex<SourceMetricsWindow>,
    writer: Arc<dyn ObservationWriter>,
    observer: Arc<dyn Observer>,
    state: Mutex<PipelineState>,
    generation: AtomicU32,
}

impl Pipeline {
    pub fn new(
        config: Arc<ArcSwap<SourceConfig>>,
        queue: Arc<IngestQueue>,
        dedup_max_size: usize,
        dedup_bucket_size: Duration,
        rate_per_sec: f64,
        burst: f64,
        writer: Arc<dyn ObservationWriter>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        let source_default = match config.load().processing.order {
            Some(aggregator_common::source_config::ProcessingOrder::DedupFirst) => {
                ProcessingOrder::DedupFirst
            }
            _ => ProcessingOrder::FilterFirst,
        };

        Pipeline {
            config,
            queue,
            dedup: DedupStore::new(dedup_max_size, dedup_bucket_size),
            rate_limiter: TokenBucket::new(rate_per_sec, burst),
            strategy: Mutex::new(StrategyDecider::new(source_default, StrategyDecider::default_cooldown())),
            metrics_window: Mutex::new(SourceMetricsWindow::default_window()),
            writer,
            observer,
            state: Mutex::new(PipelineState::Idle),
            generation: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap()
    }

    /// Swap in a freshly published `SourceConfig`. Called by the Orchestrator
    /// in response to a `ConfigLoader` diff that doesn't require an adapter
    /// restart (spec.md §4.10).
    pub fn reconfigure(&self, new: Arc<SourceConfig>) {
        self.config.store(new);
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    /// Spawn `worker_count` workers pulling from the shared `IngestQueue`.
    /// Transitions `Idle -> Starting -> Running`. Returns the join handles so
    /// the Orchestrator can await them during `stop()`.
    pub fn start(self: &Arc<Self>, worker_count: usize) -> Vec<tokio::task::JoinHandle<()>> {
        *self.state.lock().unwrap() = PipelineState::Starting;
        let handles = (0..worker_count.max(1))
            .map(|_| {
                let pipeline = Arc::clone(self);
                tokio::spawn(async move { pipeline.run_worker().await })
            })
            .collect();
        *self.state.lock().unwrap() = PipelineState::Running;
        handles
    }

    /// Mark the pipeline as draining; the queue is left open so in-flight
    /// workers can finish their `recv`, but the Orchestrator should stop
    /// calling `try_send` against this source's adapter before calling this.
    pub fn begin_drain(&self) {
        *self.state.lock().unwrap() = PipelineState::Draining;
    }

    pub fn mark_stopped(&self) {
        *self.state.lock().unwrap() = PipelineState::Stopped;
    }

    async fn run_worker(self: Arc<Self>) {
        while let Some(event) = self.queue.recv().await {
            self.process_event(event).await;
        }
    }

    /// The per-event state machine: rate limit (always first, regardless of
    /// `processing.order`), Normalize, then Filter/Dedup in the order
    /// `StrategyDecider` currently selects, then Write. Normalize always
    /// precedes Write — there is no configuration that can reorder that.
    async fn process_event(&self, event: RawEvent) {
        let config = self.config.load_full();
        let source = config.source.as_str();
        let now = Instant::now();

        if !self.rate_limiter.try_consume(now) {
            self.observer
                .ingest_drop(source, aggregator_common::error::DropReason::RateLimited);
            return;
        }

        let observation = match normalizer::normalize(&event, &config.normalization) {
            Ok(obs) => obs,
            Err(err) => {
                warn!(source, error = %err, "normalize failed");
                self.observer
                    .ingest_drop(source, aggregator_common::error::DropReason::NormalizeError);
                return;
            }
        };

        {
            let mut window = self.metrics_window.lock().unwrap();
            window.record_low_severity(
                now,
                matches!(
                    observation.severity,
                    aggregator_common::types::Severity::Info | aggregator_common::types::Severity::Low
                ),
            );
        }

        let order = self.strategy.lock().unwrap().current();
        let detail_paths = fingerprint::critical_detail_paths(&config.normalization);
        let fields = CanonicalFields {
            source: &observation.source,
            category: &observation.category.to_string(),
            severity: &observation.severity.to_string(),
            event_type: &observation.event_type,
            resource_ref: observation.resource.as_ref(),
        };
        let fp = fingerprint::fingerprint_bytes(&fingerprint::canonicalize(&event, &fields, &detail_paths));

        let filter_input = FilterInput {
            namespace: observation.resource.as_ref().and_then(|r| r.namespace.as_deref()),
            category: observation.category,
            kind: observation.resource.as_ref().map(|r| r.kind.as_str()),
            event_type: &observation.event_type,
            severity: observation.severity,
            priority: observation.priority,
        };

        match order {
            ProcessingOrder::FilterFirst => {
                if let FilterDecision::Deny(reason) = filter_engine::evaluate(&config.filter, &filter_input) {
                    self.deny_filtered(source, reason);
                    return;
                }
                if !self.dedup_admits(&config, fp, now) {
                    return;
                }
            }
            ProcessingOrder::DedupFirst => {
                if !self.dedup_admits(&config, fp, now) {
                    return;
                }
                if let FilterDecision::Deny(reason) = filter_engine::evaluate(&config.filter, &filter_input) {
                    self.deny_filtered(source, reason);
                    return;
                }
            }
        }

        self.write_observation(&config, &observation, now).await;
    }

    fn deny_filtered(&self, source: &str, reason: DenyReason) {
        debug!(source, reason = reason.as_str(), "observation filtered");
        self.observer
            .observation_filtered(source, aggregator_common::error::DropReason::FilterDenied);
    }

    /// Returns `true` if the event should continue to Write.
    fn dedup_admits(&self, config: &SourceConfig, fp: aggregator_common::types::Fingerprint, now: Instant) -> bool {
        let window = Duration::from_secs(
            config
                .dedup
                .window_seconds
                .unwrap_or(60),
        );
        let decision = self.dedup.touch(fp, SystemTime::now(), window);
        match decision {
            DedupDecision::New => true,
            DedupDecision::Duplicate { .. } => {
                self.metrics_window.lock().unwrap().record_dedupe(now);
                self.observer.observation_deduped(&config.source);
                false
            }
        }
    }

    async fn write_observation(&self, config: &SourceConfig, observation: &Observation, now: Instant) {
        self.metrics_window.lock().unwrap().record_create(now);
        match self.writer.write(config, observation).await {
            Ok(()) => self.observer.observation_created(&config.source),
            Err(AggregatorError::GvrDenied(gvr)) => {
                warn!(source = %config.source, gvr, "write denied by GVR policy");
                self.observer.writer_denied(&config.source, "gvr_denied");
            }
            Err(err) => {
                warn!(source = %config.source, error = %err, "write failed");
                self.observer.create_error(&config.source, "write_failed");
            }
        }
    }

    /// Re-evaluate `StrategyDecider` against the accumulated window and
    /// publish the `strategy_current{source,order}` gauge (spec.md §6).
    /// Called on a timer (e.g. every `window` duration) by the Orchestrator,
    /// not per event.
    pub fn retick_strategy(&self, now: Instant) {
        let order = {
            let window = self.metrics_window.lock().unwrap();
            let mut strategy = self.strategy.lock().unwrap();
            strategy.recompute(now, &window);
            strategy.current()
        };
        let source = self.config.load().source.clone();
        self.observer.strategy_current(&source, order.as_str());
    }

    pub fn current_order(&self) -> ProcessingOrder {
        self.strategy.lock().unwrap().current()
    }
}
