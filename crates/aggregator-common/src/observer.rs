//! The Observer interface exposed to the host process. Spec.md §6.
//!
//! This crate is agnostic to the metrics wire format (Prometheus export is
//! out of scope — spec.md §1); it only defines the call surface every other
//! component uses to report counters/histograms/gauges. A host process
//! wires a concrete `Observer` (e.g. backed by the `metrics` crate) at
//! startup; tests use [`NoopObserver`] or [`RecordingObserver`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Re-exported so call sites don't need to depend on `aggregator_common::error`
/// just to name a drop reason.
pub use crate::error::DropReason;

pub trait Observer: Send + Sync {
    fn event_received(&self, source: &str, category: &str, severity: &str, event_type: &str);
    fn observation_created(&self, source: &str);
    fn observation_filtered(&self, source: &str, reason: DropReason);
    fn observation_deduped(&self, source: &str);
    fn create_error(&self, source: &str, error_type: &str);
    fn writer_denied(&self, source: &str, policy: &str);
    fn ingest_drop(&self, source: &str, reason: DropReason);
    fn processing_latency(&self, source: &str, stage: &str, seconds: f64);
    fn writer_latency(&self, source: &str, seconds: f64);
    fn gc_duration(&self, seconds: f64);
    fn gc_run(&self);
    fn gc_deletion(&self, reason: &str);
    fn dedup_cache_size(&self, source: &str, size: u64);
    fn ingest_queue_depth(&self, source: &str, depth: u64);
    fn strategy_current(&self, source: &str, order: &str);
    fn config_validation_error(&self, source: &str);
}

/// Marker so `DropReason` can be used directly as a tag without re-deriving
/// `Display` at every call site.
pub trait DropReasonTag {
    fn tag(&self) -> &'static str;
}

impl DropReasonTag for DropReason {
    fn tag(&self) -> &'static str {
        self.as_str()
    }
}

/// Discards everything. Useful as a default for binaries/tests that don't
/// care about metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn event_received(&self, _: &str, _: &str, _: &str, _: &str) {}
    fn observation_created(&self, _: &str) {}
    fn observation_filtered(&self, _: &str, _: DropReason) {}
    fn observation_deduped(&self, _: &str) {}
    fn create_error(&self, _: &str, _: &str) {}
    fn writer_denied(&self, _: &str, _: &str) {}
    fn ingest_drop(&self, _: &str, _: DropReason) {}
    fn processing_latency(&self, _: &str, _: &str, _: f64) {}
    fn writer_latency(&self, _: &str, _: f64) {}
    fn gc_duration(&self, _: f64) {}
    fn gc_run(&self) {}
    fn gc_deletion(&self, _: &str) {}
    fn dedup_cache_size(&self, _: &str, _: u64) {}
    fn ingest_queue_depth(&self, _: &str, _: u64) {}
    fn strategy_current(&self, _: &str, _: &str) {}
    fn config_validation_error(&self, _: &str) {}
}

/// Lock-free-ish counters, for assertions in tests and property checks
/// (spec.md §8 scenarios reference exact counter values).
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub created: AtomicU64,
    pub deduped: AtomicU64,
    pub rate_limited: AtomicU64,
    pub queue_full: AtomicU64,
    pub filtered: AtomicU64,
    pub normalize_errors: AtomicU64,
    pub write_denied: AtomicU64,
    pub write_failed: AtomicU64,
    pub config_validation_errors: AtomicU64,
    pub gc_deletions: Mutex<Vec<String>>,
    pub strategy_current: Mutex<Option<(String, String)>>,
}

impl Observer for RecordingObserver {
    fn event_received(&self, _: &str, _: &str, _: &str, _: &str) {}

    fn observation_created(&self, _source: &str) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    fn observation_filtered(&self, _source: &str, _reason: DropReason) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    fn observation_deduped(&self, _source: &str) {
        self.deduped.fetch_add(1, Ordering::Relaxed);
    }

    fn create_error(&self, _source: &str, error_type: &str) {
        if error_type == "write_failed" {
            self.write_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn writer_denied(&self, _source: &str, _policy: &str) {
        self.write_denied.fetch_add(1, Ordering::Relaxed);
    }

    fn ingest_drop(&self, _source: &str, reason: DropReason) {
        match reason {
            DropReason::RateLimited => self.rate_limited.fetch_add(1, Ordering::Relaxed),
            DropReason::QueueFull => self.queue_full.fetch_add(1, Ordering::Relaxed),
            DropReason::NormalizeError => self.normalize_errors.fetch_add(1, Ordering::Relaxed),
            DropReason::ConfigValidationError => {
                self.config_validation_errors.fetch_add(1, Ordering::Relaxed)
            }
            _ => 0,
        };
    }

    fn processing_latency(&self, _: &str, _: &str, _: f64) {}
    fn writer_latency(&self, _: &str, _: f64) {}
    fn gc_duration(&self, _: f64) {}
    fn gc_run(&self) {}

    fn gc_deletion(&self, reason: &str) {
        self.gc_deletions.lock().unwrap().push(reason.to_string());
    }

    fn dedup_cache_size(&self, _: &str, _: u64) {}
    fn ingest_queue_depth(&self, _: &str, _: u64) {}

    fn strategy_current(&self, source: &str, order: &str) {
        *self.strategy_current.lock().unwrap() = Some((source.to_string(), order.to_string()));
    }

    fn config_validation_error(&self, _source: &str) {
        self.config_validation_errors.fetch_add(1, Ordering::Relaxed);
    }
}
