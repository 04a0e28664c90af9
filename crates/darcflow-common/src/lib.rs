//! darcflow-common - Shared errors, configuration and step results used across all darcflow crates.

pub mod config;
pub mod error;
pub mod step;

// Re-export commonly used types
pub use config::{DarcflowConfig, LigandsConfig, RosettaConfig, RunConfig};
pub use error::{DarcError, Result};
pub use step::StepOutputs;
