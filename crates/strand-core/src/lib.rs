//! strand-core: shared errors and configuration.
//!
//! This crate is the foundational dependency for the other strand crates,
//! providing the unified error type and application configuration.

pub mod config;
pub mod error;

// Re-export the most commonly used items at the crate root.
pub use config::Config;
pub use error::{Error, Result};
