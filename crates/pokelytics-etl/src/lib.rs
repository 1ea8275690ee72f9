//! Pokelytics ETL Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Pulls creature records from PokeAPI, reshapes them into a normalized
//! relational form and stores them in SQLite, one transaction per record.
//!
//! # Pipeline
//!
//! - **Extract** ([`client`]): three sequential GETs per id (creature,
//!   species, evolution chain), paced by a fixed delay.
//! - **Transform** ([`shaper`]): validation and normalization of the raw
//!   record into a [`models::ShapedRecord`].
//! - **Load** ([`store`]): idempotent insert-if-absent across nine tables.
//! - **Orchestration** ([`pipeline`]): ids `1..=N` in order, per-id failures
//!   counted and skipped.
//!
//! # Example
//!
//! ```no_run
//! use pokelytics_etl::{config::PipelineConfig, pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::from_env()?;
//!     let ok = pipeline::run_pipeline(config).await;
//!     println!("pipeline succeeded: {}", ok);
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod client;
pub mod config;
pub mod error;
pub mod lineage;
pub mod models;
pub mod pipeline;
pub mod shaper;
pub mod store;

pub use error::{EtlError, Result};
