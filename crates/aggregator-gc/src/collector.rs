//! GCCollector (C11). Spec.md §4.11: "periodic scan, lists Observations in
//! chunks, computes per-record expired = creationTimestamp +
//! ttlSecondsAfterCreation <= now, deletes expired records with bounded
//! concurrency and per-list deadline to stay within the API store's rate
//! budget."
//!
//! Ground: `aggregator_k8s::dynamic` for the same GVR -> `Api<DynamicObject>`
//! construction the Writer uses, since GC targets are exactly the
//! destinations a `SourceConfig` writes Observations to.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use kube::api::{DeleteParams, ListParams};

use aggregator_common::error::AggregatorError;
use aggregator_common::gvr::Gvr;
use aggregator_common::observer::Observer;
use aggregator_common::source_config::SourceConfig;

use aggregator_k8s::client::RateLimitedClient;
use aggregator_k8s::dynamic::api_for;

/// One destination worth sweeping: a GVR at an optional namespace. Several
/// sources may share a destination; callers dedup via
/// [`targets_from_source_configs`] before handing targets to the collector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GcTarget {
    pub gvr: Gvr,
    pub namespace: Option<String>,
}

/// Flattens the live `SourceConfig` snapshot set into the unique set of
/// destinations GC needs to sweep. Cluster-scoped-opt-in destinations (no
/// namespace) and namespaced ones to the same GVR are distinct targets.
pub fn targets_from_source_configs<'a>(configs: impl IntoIterator<Item = &'a SourceConfig>) -> Vec<GcTarget> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();
    for config in configs {
        for dest in &config.destinations {
            let target = GcTarget {
                gvr: dest.gvr.clone(),
                namespace: dest.namespace.clone(),
            };
            if seen.insert(target.clone()) {
                targets.push(target);
            }
        }
    }
    targets
}

#[derive(Debug, Clone, Default)]
pub struct GcSummary {
    pub scanned: u64,
    pub deleted: u64,
    pub errors: u64,
}

/// Periodic scan + chunked delete over a set of [`GcTarget`]s.
///
/// `chunk_size` bounds each list page (default 500), `concurrency` bounds
/// how many deletes run at once per target (default 10), `list_deadline`
/// bounds the whole scan-and-delete pass for a single target so a GC run
/// can't starve the shared API client budget Writer/ConfigLoader also draw
/// from.
pub struct GcCollector {
    client: RateLimitedClient,
    observer: Arc<dyn Observer>,
    chunk_size: u32,
    concurrency: usize,
    list_deadline: Duration,
}

impl GcCollector {
    pub fn new(
        client: RateLimitedClient,
        observer: Arc<dyn Observer>,
        chunk_size: u32,
        concurrency: usize,
        list_deadline: Duration,
    ) -> Self {
        GcCollector {
            client,
            observer,
            chunk_size: chunk_size.max(1),
            concurrency: concurrency.max(1),
            list_deadline,
        }
    }

    /// Runs one scan across all `targets`, emitting `gc_run`, `gc_duration`
    /// and a `gc_deletion` per deleted record. Errors on one target don't
    /// abort the sweep of the others.
    pub async fn run_once(&self, targets: &[GcTarget]) -> GcSummary {
        let start = tokio::time::Instant::now();
        self.observer.gc_run();

        let mut summary = GcSummary::default();
        for target in targets {
            match tokio::time::timeout(self.list_deadline, self.sweep_target(target)).await {
                Ok(Ok(target_summary)) => {
                    summary.scanned += target_summary.scanned;
                    summary.deleted += target_summary.deleted;
                    summary.errors += target_summary.errors;
                }
                Ok(Err(err)) => {
                    tracing::warn!(gvr = %target.gvr, error = %err, "gc sweep failed");
                    summary.errors += 1;
                }
                Err(_) => {
                    tracing::warn!(gvr = %target.gvr, "gc sweep exceeded per-target list deadline");
                    summary.errors += 1;
                }
            }
        }

        self.observer.gc_duration(start.elapsed().as_secs_f64());
        summary
    }

    /// Spawns `run_once` on `interval`, re-evaluating `targets_fn` every
    /// tick so newly-added/removed destinations are picked up without a
    /// restart. Exits when `shutdown` reports `true`, per spec.md §5's
    /// "GC ... observe[s] the same \[cancellation\] signal".
    pub async fn run_periodic(
        self: Arc<Self>,
        interval: Duration,
        targets_fn: impl Fn() -> Vec<GcTarget> + Send + Sync + 'static,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let targets = targets_fn();
                    self.run_once(&targets).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    async fn sweep_target(&self, target: &GcTarget) -> Result<GcSummary, AggregatorError> {
        let api = api_for(&self.client, &target.gvr, target.namespace.as_deref());
        let now = Utc::now();

        let mut summary = GcSummary::default();
        let mut continue_token: Option<String> = None;
        loop {
            self.client.throttle().await;
            let mut params = ListParams::default().limit(self.chunk_size);
            if let Some(token) = &continue_token {
                params = params.continue_token(token);
            }
            let page = api
                .list(&params)
                .await
                .map_err(|e| AggregatorError::Gc(format!("list {}: {e}", target.gvr)))?;

            summary.scanned += page.items.len() as u64;
            let expired: Vec<String> = page
                .items
                .iter()
                .filter(|obj| is_expired(obj, now))
                .filter_map(|obj| obj.metadata.name.clone())
                .collect();

            let client = self.client.clone();
            let api = &api;
            let deletions: Vec<Result<(), AggregatorError>> = stream::iter(expired)
                .map(|name| {
                    let client = client.clone();
                    async move {
                        client.throttle().await;
                        api.delete(&name, &DeleteParams::default())
                            .await
                            .map(|_| ())
                            .map_err(|e| AggregatorError::Gc(format!("delete {name}: {e}")))
                    }
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

            for result in deletions {
                match result {
                    Ok(()) => {
                        summary.deleted += 1;
                        self.observer.gc_deletion("ttl");
                    }
                    Err(err) => {
                        summary.errors += 1;
                        tracing::warn!(gvr = %target.gvr, error = %err, "gc deletion failed");
                    }
                }
            }

            continue_token = page.metadata.continue_.filter(|t| !t.is_empty());
            if continue_token.is_none() {
                break;
            }
        }
        Ok(summary)
    }
}

fn is_expired(obj: &kube::api::DynamicObject, now: chrono::DateTime<Utc>) -> bool {
    let Some(created) = obj.metadata.creation_timestamp.as_ref() else {
        return false;
    };
    let Some(ttl) = obj
        .data
        .get("spec")
        .and_then(|spec| spec.get("ttlSecondsAfterCreation"))
        .and_then(|v| v.as_i64())
    else {
        return false;
    };
    created.0 + chrono::Duration::seconds(ttl) <= now
}
