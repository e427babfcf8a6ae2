//! Orchestrator (C12): starts/stops adapters and pipelines, leader-gates
//! leader-only ingesters, and reacts to `ConfigLoader` diffs. Spec.md §4.12.

pub mod factory;
pub mod leader;
pub mod orchestrator;

pub use factory::build_adapter;
pub use leader::{AlwaysLeader, AtomicLeaderGate, LeaderGate};
pub use orchestrator::Orchestrator;
