//! Pokelytics Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the Pokelytics workspace members.
//!
//! # Example
//!
//! ```no_run
//! use pokelytics_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> pokelytics_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{PokelyticsError, Result};
