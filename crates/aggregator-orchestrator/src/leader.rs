//! The leader gate (C12). Spec.md §9 "Dedup under multi-replica deployment":
//! leader-bound ingesters (informer, polled sources) are gated by a boolean
//! `am-I-leader` capability; the concrete coordination protocol across
//! replicas is explicitly out of scope (spec.md §1) — the Orchestrator only
//! ever queries this trait.

/// Queried once per `Start(source)` decision for leader-only ingesters
/// (`IngesterKind::requires_leader`). Webhook adapters never consult this —
/// they run on every replica regardless (spec.md §9).
pub trait LeaderGate: Send + Sync {
    fn is_leader(&self) -> bool;
}

/// Single-replica deployments (or anything that hasn't wired real
/// coordination) are trivially the leader.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysLeader;

impl LeaderGate for AlwaysLeader {
    fn is_leader(&self) -> bool {
        true
    }
}

/// A `LeaderGate` an external coordinator (out of scope here) flips.
/// Used by tests and by a host process that wires a real election library
/// behind this trait without this crate needing to know which one.
#[derive(Debug, Default)]
pub struct AtomicLeaderGate(std::sync::atomic::AtomicBool);

impl AtomicLeaderGate {
    pub fn new(is_leader: bool) -> Self {
        AtomicLeaderGate(std::sync::atomic::AtomicBool::new(is_leader))
    }

    pub fn set(&self, is_leader: bool) {
        self.0.store(is_leader, std::sync::atomic::Ordering::SeqCst);
    }
}

impl LeaderGate for AtomicLeaderGate {
    fn is_leader(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}
