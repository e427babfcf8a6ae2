//! The in-process event pipeline: Fingerprinter, TokenBucket, DedupStore,
//! FilterEngine, Normalizer, IngestQueue, StrategyDecider and the Pipeline
//! that wires them together. Spec.md §4.1–§4.5, §4.7–§4.9.
//!
//! The Writer/API-store boundary (`ObservationWriter`) is a trait defined in
//! [`pipeline`] and implemented concretely in `aggregator-k8s`, so this crate
//! never depends on `kube`.

pub mod dedup;
pub mod filter_engine;
pub mod fingerprint;
pub mod ingest_queue;
pub mod normalizer;
pub mod pipeline;
pub mod strategy;
pub mod token_bucket;

pub use dedup::{DedupDecision, DedupEntry, DedupStore};
pub use filter_engine::{evaluate as evaluate_filter, DenyReason, FilterDecision, FilterInput};
pub use fingerprint::{compute as compute_fingerprint, CanonicalFields};
pub use ingest_queue::{EnqueueError, IngestQueue};
pub use normalizer::normalize;
pub use pipeline::{ObservationWriter, Pipeline, PipelineState};
pub use strategy::{ProcessingOrder, SourceMetricsWindow, StrategyDecider};
pub use token_bucket::TokenBucket;
