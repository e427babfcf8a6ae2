//! ConfigLoader (C11): validates, resolves precedence for, and republishes
//! `SourceConfig` resources. Spec.md §4.10.

pub mod loader;
pub mod precedence;
pub mod validate;

pub use loader::{ConfigChange, ConfigLoader};
pub use precedence::ConfigMapOverrides;
