//! Wires the concrete Kubernetes bindings to the core engine and runs the
//! process until a shutdown signal arrives. Spec.md §4.12's Orchestrator is
//! the thing actually driven here; this module is just the host-process
//! glue `main.rs` delegates to, mirroring the teacher's `Supervisor::new` +
//! `Supervisor::run` split between construction and the run loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use aggregator_common::config::EnvConfig;
use aggregator_common::observer::{NoopObserver, Observer};
use aggregator_config::{ConfigChange, ConfigLoader, ConfigMapOverrides};
use aggregator_engine::StrategyDecider;
use aggregator_gc::{targets_from_source_configs, GcCollector};
use aggregator_k8s::{build_client, K8sWriter, KubeStore};
use aggregator_orchestrator::{AlwaysLeader, Orchestrator};

/// Run the aggregator until SIGINT/SIGTERM. Spec.md §5 "a root cancellation
/// signal propagates from Orchestrator to all components" — here that
/// signal is `tokio::signal::ctrl_c`, fanned out via a `watch` channel to
/// both the Orchestrator's reconciliation loop and the GC ticker.
pub async fn run() -> Result<()> {
    let env = EnvConfig::from_env();
    info!(
        worker_pool_size = env.worker_pool_size,
        ingest_queue_capacity = env.ingest_queue_capacity,
        dedup_max_size = env.dedup_max_size,
        "aggregator starting"
    );

    let client = build_client(env.api_client_qps, env.api_client_burst)
        .await
        .context("building Kubernetes client")?;

    let store = Arc::new(KubeStore::new(client.clone(), env.watch_namespace.clone()));
    let loader = Arc::new(ConfigLoader::new(
        Arc::clone(&store),
        env.clone(),
        ConfigMapOverrides::default(),
    ));
    loader.bootstrap().await.context("bootstrapping SourceConfig snapshots")?;

    let observer: Arc<dyn Observer> = Arc::new(NoopObserver);
    let writer = Arc::new(K8sWriter::new(
        client.clone(),
        env.allowed_gvrs.clone(),
        env.allowed_namespaces.clone(),
        env.allowed_cluster_scoped_gvrs.clone(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        env.clone(),
        writer,
        Arc::clone(&observer),
        Arc::new(AlwaysLeader),
    ));

    for (name, config) in loader.snapshot_all().iter() {
        if let Err(err) = orchestrator.start_source(name.clone(), Arc::clone(config)).await {
            warn!(source = %name, error = %err, "failed to start source at bootstrap");
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (changes_tx, changes_rx) = mpsc::channel::<ConfigChange>(64);

    let watch_loader = Arc::clone(&loader);
    let watch_task = tokio::spawn(async move { watch_loader.run_watch(changes_tx).await });

    let orchestrator_task = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run(changes_rx, shutdown_rx).await })
    };

    let gc_task = {
        let client = client.clone();
        let observer = Arc::clone(&observer);
        let loader = Arc::clone(&loader);
        let interval = Duration::from_secs(env.gc_interval_seconds);
        let chunk_size = env.gc_list_chunk_size;
        let concurrency = env.gc_concurrency;
        let list_deadline = Duration::from_secs(env.gc_list_deadline_seconds);
        let gc_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let collector = Arc::new(GcCollector::new(client, observer, chunk_size, concurrency, list_deadline));
            let targets_loader = Arc::clone(&loader);
            let targets_fn = move || {
                let snapshot = targets_loader.snapshot_all();
                let configs: Vec<_> = snapshot.values().map(|c| (**c).clone()).collect();
                targets_from_source_configs(&configs)
            };
            collector.run_periodic(interval, targets_fn, gc_shutdown).await;
        })
    };

    let strategy_task = {
        let orchestrator = Arc::clone(&orchestrator);
        let strategy_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            orchestrator
                .run_strategy_ticker(StrategyDecider::default_retick_interval(), strategy_shutdown)
                .await;
        })
    };

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received, draining");
    let _ = shutdown_tx.send(true);

    let _ = orchestrator_task.await;
    let _ = gc_task.await;
    let _ = strategy_task.await;
    watch_task.abort();

    let remaining = orchestrator.active_sources().await.len();
    if remaining > 0 {
        warn!(count = remaining, "sources still reported active after shutdown");
    }

    info!("aggregator stopped");
    Ok(())
}
