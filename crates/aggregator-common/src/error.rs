use thiserror::Error;

/// Crate-wide error type. Individual subsystems (engine, k8s, config, gc)
/// define their own narrower `thiserror::Error` enums and convert into this
/// one at their public boundary; callers that don't need to match on a
/// specific variant can use `anyhow::Result` instead.
#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("normalization error: {0}")]
    Normalize(String),

    #[error("writer error: {0}")]
    Write(String),

    #[error("GVR {0} is on the hard deny list")]
    GvrDenied(String),

    #[error("garbage collection error: {0}")]
    Gc(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Stable, machine-readable drop/error reasons, per spec.md §7.
///
/// These are distinct from [`AggregatorError`]: a `DropReason` never
/// prevents the pipeline from continuing to the next event, it only tags
/// why *this* event didn't produce an Observation, for counters and traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    RateLimited,
    QueueFull,
    FilterDenied,
    Duplicate,
    NormalizeError,
    WriteDenied,
    WriteFailed,
    ConfigValidationError,
}

impl DropReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            DropReason::RateLimited => "rate_limited",
            DropReason::QueueFull => "queue_full",
            DropReason::FilterDenied => "filter_denied",
            DropReason::Duplicate => "duplicate",
            DropReason::NormalizeError => "normalize_error",
            DropReason::WriteDenied => "write_denied",
            DropReason::WriteFailed => "write_failed",
            DropReason::ConfigValidationError => "config_validation_error",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
