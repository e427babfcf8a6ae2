//! Adapter stubs for the five `ingester` kinds (spec.md §6), behind the
//! common `Adapter` trait. The concrete transport of each (HTTP server, log
//! tailer, ConfigMap poller, watch) is out of scope per spec.md §1; what's
//! implemented is the trait boundary and a literal, testable event/config
//! shape for each — SPEC_FULL.md §3.

pub mod adapter;
pub mod cm;
pub mod informer;
pub mod lifecycle;
pub mod logs;
pub mod native_events;
pub mod webhook;

pub use adapter::{Adapter, HealthStatus};
pub use cm::CmAdapter;
pub use informer::InformerAdapter;
pub use logs::LogsAdapter;
pub use native_events::NativeEventsAdapter;
pub use webhook::WebhookAdapter;
