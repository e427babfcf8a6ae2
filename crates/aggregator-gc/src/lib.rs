//! GCCollector (C11), spec.md §4.11. Periodic TTL sweep over whatever
//! destination GVRs the live `SourceConfig` set points Observations at,
//! sharing the same rate-limited `kube::Client` (and the same
//! GVR -> `Api<DynamicObject>` construction) as the Writer.

pub mod collector;

pub use collector::{targets_from_source_configs, GcCollector, GcSummary, GcTarget};
