//! StrategyDecider (C9). Spec.md §4.9.
//!
//! Pure over observed metrics: the Pipeline queries a cached, pre-computed
//! value (O(1) read) rather than this type doing anything per-event. A
//! background tick (driven by the Pipeline/Orchestrator) calls
//! `SourceMetricsWindow::record` and `StrategyDecider::recompute` on a
//! timer; nothing here spawns its own tasks.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingOrder {
    FilterFirst,
    DedupFirst,
}

impl ProcessingOrder {
    /// Tag used for the `strategy_current{source,order}` gauge, spec.md §6.
    pub const fn as_str(self) -> &'static str {
        match self {
            ProcessingOrder::FilterFirst => "filter_first",
            ProcessingOrder::DedupFirst => "dedup_first",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    low_severity: bool,
    outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Dedupe,
    Create,
    Other,
}

/// A sliding window (default 5 min) of per-source outcome samples.
pub struct SourceMetricsWindow {
    window: Duration,
    samples: VecDeque<Sample>,
}

impl SourceMetricsWindow {
    pub fn new(window: Duration) -> Self {
        SourceMetricsWindow {
            window,
            samples: VecDeque::new(),
        }
    }

    pub fn default_window() -> Self {
        SourceMetricsWindow::new(Duration::from_secs(5 * 60))
    }

    pub fn record_low_severity(&mut self, now: Instant, low_severity: bool) {
        self.push(now, Sample { at: now, low_severity, outcome: Outcome::Other });
    }

    pub fn record_dedupe(&mut self, now: Instant) {
        self.push(now, Sample { at: now, low_severity: false, outcome: Outcome::Dedupe });
    }

    pub fn record_create(&mut self, now: Instant) {
        self.push(now, Sample { at: now, low_severity: false, outcome: Outcome::Create });
    }

    fn push(&mut self, now: Instant, sample: Sample) {
        self.samples.push_back(sample);
        self.evict_old(now);
    }

    fn evict_old(&mut self, now: Instant) {
        while let Some(front) = self.samples.front() {
            if now.saturating_duration_since(front.at) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn low_severity_percent(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let low = self.samples.iter().filter(|s| s.low_severity).count();
        low as f64 / self.samples.len() as f64
    }

    pub fn dedup_effectiveness(&self) -> f64 {
        let dedupes = self.samples.iter().filter(|s| s.outcome == Outcome::Dedupe).count();
        let creates = self.samples.iter().filter(|s| s.outcome == Outcome::Create).count();
        let total = dedupes + creates;
        if total == 0 {
            return 0.0;
        }
        dedupes as f64 / total as f64
    }
}

/// Holds the currently-decided order plus hysteresis bookkeeping. Spec.md
/// §4.9: "after a change, no further change for `cooldown` (default 5 min)".
pub struct StrategyDecider {
    current: ProcessingOrder,
    source_default: ProcessingOrder,
    cooldown: Duration,
    last_change: Option<Instant>,
}

impl StrategyDecider {
    pub fn new(source_default: ProcessingOrder, cooldown: Duration) -> Self {
        StrategyDecider {
            current: source_default,
            source_default,
            cooldown,
            last_change: None,
        }
    }

    pub fn default_cooldown() -> Duration {
        Duration::from_secs(5 * 60)
    }

    /// Default cadence for the periodic `retick_strategy` driver (spec.md
    /// §4.9's window is 5 min; there's no point recomputing more often than
    /// the window it's recomputing over).
    pub fn default_retick_interval() -> Duration {
        Duration::from_secs(5 * 60)
    }

    /// O(1) read — the Pipeline calls this per event.
    pub fn current(&self) -> ProcessingOrder {
        self.current
    }

    /// Recompute from the window's metrics, applying hysteresis. Should be
    /// called periodically (e.g. once per window tick), not per event.
    pub fn recompute(&mut self, now: Instant, window: &SourceMetricsWindow) {
        if let Some(last) = self.last_change {
            if now.saturating_duration_since(last) < self.cooldown {
                return;
            }
        }

        let desired = if window.low_severity_percent() > 0.70 {
            ProcessingOrder::FilterFirst
        } else if window.dedup_effectiveness() > 0.50 {
            ProcessingOrder::DedupFirst
        } else {
            self.source_default
        };

        if desired != self.current {
            self.current = desired;
            self.last_change = Some(now);
        }
    }
}
