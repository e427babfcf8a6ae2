//! Process-level configuration loaded from environment variables.
//! Spec.md §6 "Environment knobs".
//!
//! Mirrors the teacher's `Config::from_env` — plain struct, `required_env`
//! panics with a clear message, everything else defaults. This is layer
//! (a) of the two-layer config model (SPEC_FULL.md §1); layer (b), the live
//! `SourceConfig` custom resources, is `aggregator-config::ConfigLoader`.

use std::env;

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub dedup_window_seconds: u64,
    pub dedup_window_by_source: std::collections::HashMap<String, u64>,
    pub dedup_max_size: usize,
    pub dedup_bucket_size_seconds: u64,
    pub dedup_max_rate_per_source: u32,
    pub dedup_rate_burst: u32,
    pub watch_namespace: Option<String>,
    pub allowed_gvrs: Vec<String>,
    pub allowed_namespaces: Vec<String>,
    pub allowed_cluster_scoped_gvrs: Vec<String>,
    pub worker_pool_size: usize,
    pub ingest_queue_capacity: usize,
    pub api_client_qps: u32,
    pub api_client_burst: u32,
    pub gc_interval_seconds: u64,
    pub gc_list_chunk_size: u32,
    pub gc_concurrency: usize,
    pub gc_list_deadline_seconds: u64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            dedup_window_seconds: 60,
            dedup_window_by_source: Default::default(),
            dedup_max_size: 10_000,
            dedup_bucket_size_seconds: 10,
            dedup_max_rate_per_source: 100,
            dedup_rate_burst: 200,
            watch_namespace: None,
            allowed_gvrs: Vec::new(),
            allowed_namespaces: Vec::new(),
            allowed_cluster_scoped_gvrs: Vec::new(),
            worker_pool_size: 5,
            ingest_queue_capacity: 1000,
            api_client_qps: 5,
            api_client_burst: 10,
            gc_interval_seconds: 3600,
            gc_list_chunk_size: 500,
            gc_concurrency: 10,
            gc_list_deadline_seconds: 60,
        }
    }
}

impl EnvConfig {
    /// Load from the environment, falling back to defaults for anything
    /// unset. Unlike the teacher's `Config::from_env`, nothing here is
    /// strictly required — every knob in spec.md §6 has a stated default.
    pub fn from_env() -> Self {
        let defaults = EnvConfig::default();
        EnvConfig {
            dedup_window_seconds: env_u64("DEDUP_WINDOW_SECONDS", defaults.dedup_window_seconds),
            dedup_window_by_source: env_map("DEDUP_WINDOW_BY_SOURCE"),
            dedup_max_size: env_usize("DEDUP_MAX_SIZE", defaults.dedup_max_size),
            dedup_bucket_size_seconds: env_u64(
                "DEDUP_BUCKET_SIZE_SECONDS",
                defaults.dedup_bucket_size_seconds,
            ),
            dedup_max_rate_per_source: env_u32(
                "DEDUP_MAX_RATE_PER_SOURCE",
                defaults.dedup_max_rate_per_source,
            ),
            dedup_rate_burst: env_u32("DEDUP_RATE_BURST", defaults.dedup_rate_burst),
            watch_namespace: env::var("WATCH_NAMESPACE").ok(),
            allowed_gvrs: env_csv("ALLOWED_GVRS"),
            allowed_namespaces: env_csv("ALLOWED_NAMESPACES"),
            allowed_cluster_scoped_gvrs: env_csv("ALLOWED_CLUSTER_SCOPED_GVRS"),
            worker_pool_size: env_usize("WORKER_POOL_SIZE", defaults.worker_pool_size),
            ingest_queue_capacity: defaults.ingest_queue_capacity,
            api_client_qps: env_u32("API_CLIENT_QPS", defaults.api_client_qps),
            api_client_burst: env_u32("API_CLIENT_BURST", defaults.api_client_burst),
            gc_interval_seconds: env_u64("GC_INTERVAL_SECONDS", defaults.gc_interval_seconds),
            gc_list_chunk_size: env_u32("GC_LIST_CHUNK_SIZE", defaults.gc_list_chunk_size),
            gc_concurrency: env_usize("GC_CONCURRENCY", defaults.gc_concurrency),
            gc_list_deadline_seconds: env_u64(
                "GC_LIST_DEADLINE_SECONDS",
                defaults.gc_list_deadline_seconds,
            ),
        }
    }

    /// Resolve the dedup window for a specific source, honoring
    /// `DEDUP_WINDOW_BY_SOURCE` before the global default. Precedence above
    /// this (CRD > ConfigMap > env) is applied by `aggregator-config`.
    pub fn dedup_window_for(&self, source: &str) -> u64 {
        self.dedup_window_by_source
            .get(source)
            .copied()
            .unwrap_or(self.dedup_window_seconds)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_csv(key: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_map(key: &str) -> std::collections::HashMap<String, u64> {
    env::var(key)
        .unwrap_or_default()
        .split(',')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((k.trim().to_string(), v.trim().parse().ok()?))
        })
        .collect()
}
