//! Threadhive Core - shared domain types, configuration and logging
//!
//! Everything the community and web crates agree on lives here.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
