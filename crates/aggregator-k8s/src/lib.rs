//! Concrete Kubernetes binding: CRD types, the API client, the Writer (C6)
//! and the `SourceConfig`-watching store ConfigLoader builds on.
//!
//! Everything in `aggregator-engine`/`aggregator-common` is expressed against
//! plain data and trait boundaries (`ObservationWriter`, spec.md §4.6) so
//! that only this crate needs `kube`/`k8s-openapi` in its dependency tree.

pub mod client;
pub mod crd;
pub mod dynamic;
pub mod store;
pub mod writer;

pub use client::{build_client, RateLimitedClient};
pub use crd::{Observation, ObservationStatus, SourceConfig};
pub use dynamic::{api_for, api_resource_for, kind_from_resource};
pub use store::{FakeStore, K8sStore, KubeStore};
pub use writer::{K8sWriter, RetryPolicy};
