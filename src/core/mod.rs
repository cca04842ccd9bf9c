/*!
 * Core Module
 * Fundamental kernel types, configuration and error handling
 */

pub mod config;
pub mod errors;
pub mod fixed_point;
pub mod types;

// Re-export for convenience
pub use config::{SchedConfig, SchedulerMode};
pub use errors::*;
pub use fixed_point::Fixed;
pub use types::*;
