pub mod config;
pub mod error;
pub mod filter;
pub mod gvr;
pub mod normalization;
pub mod observation;
pub mod observer;
pub mod source_config;
pub mod types;

pub use config::EnvConfig;
pub use error::{AggregatorError, DropReason};
pub use observation::Observation;
pub use observer::{NoopObserver, Observer, RecordingObserver};
pub use source_config::SourceConfig;
pub use types::RawEvent;
