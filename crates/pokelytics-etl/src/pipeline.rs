//! Pipeline orchestrator
//!
//! Drives ids `1..=fetch_count` through extract, shape and load, strictly in
//! order. A failure on one id (including a panic) is counted and the run
//! moves on; only a store that cannot be opened ends the run early.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, warn};

use crate::client::PokeApiClient;
use crate::config::PipelineConfig;
use crate::error::{EtlError, Result};
use crate::models::{RawRecord, ShapedRecord};
use crate::shaper;
use crate::store::SqliteConnector;

/// Ids between progress log lines
pub const PROGRESS_INTERVAL: i64 = 50;

// ============================================================================
// Stage seams
// ============================================================================

/// Where raw records come from
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, id: i64) -> Result<RawRecord>;
}

/// Where shaped records go
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn ensure_schema(&self) -> Result<()>;

    async fn persist(&self, record: &ShapedRecord) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Opens a sink at the start of a run
#[async_trait]
pub trait SinkConnector: Send + Sync {
    type Sink: RecordSink;

    async fn connect(&self) -> Result<Self::Sink>;
}

// ============================================================================
// Summary
// ============================================================================

/// Outcome of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Ids scheduled
    pub total: u32,
    pub succeeded: u32,
    pub failed: u32,
    /// True when the store could not be opened and nothing was fetched
    pub aborted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineSummary {
    fn start(total: u32) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
            aborted: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// A run succeeds when at least one id was stored.
    pub fn is_success(&self) -> bool {
        !self.aborted && self.succeeded > 0
    }

    pub fn processed(&self) -> u32 {
        self.succeeded + self.failed
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct Pipeline<S, C> {
    config: PipelineConfig,
    source: S,
    connector: C,
}

impl<S, C> Pipeline<S, C>
where
    S: RecordSource,
    C: SinkConnector,
{
    pub fn new(config: PipelineConfig, source: S, connector: C) -> Self {
        Self {
            config,
            source,
            connector,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline once.
    ///
    /// Steps:
    /// 1. Open the sink (failure aborts the run before any fetch)
    /// 2. Ensure the schema (failure is logged, the run continues)
    /// 3. Process each id in order, pausing after every one
    /// 4. Close the sink (best effort)
    pub async fn run(&self) -> PipelineSummary {
        let total = self.config.fetch_count;
        let summary = PipelineSummary::start(total);

        info!(
            total,
            database = %self.config.database_path,
            "Starting pipeline"
        );

        let sink = match self.connector.connect().await {
            Ok(sink) => sink,
            Err(e) => {
                error!(error = %e, "Could not open store, aborting run");
                return PipelineSummary {
                    aborted: true,
                    ..summary
                }
                .finish();
            },
        };

        if let Err(e) = sink.ensure_schema().await {
            warn!(error = %e, "Schema setup failed (continuing)");
        }

        let mut summary = summary;
        for id in 1..=i64::from(total) {
            let outcome = AssertUnwindSafe(self.process(&sink, id))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(EtlError::Unexpected(panic_message(&*panic))));

            match outcome {
                Ok(name) => {
                    summary.succeeded += 1;
                    info!(id, name = %name, "✓ Stored creature");
                },
                Err(e) => {
                    summary.failed += 1;
                    warn!(id, stage = e.stage(), error = %e, "✗ Skipping creature");
                },
            }

            if id % PROGRESS_INTERVAL == 0 {
                info!(
                    processed = id,
                    total,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    "Progress"
                );
            }

            self.pause().await;
        }

        if let Err(e) = sink.close().await {
            error!(error = %e, "Failed to close store");
        }

        let summary = summary.finish();
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            duration_secs = summary.duration_secs().unwrap_or_default(),
            "Pipeline finished"
        );
        summary
    }

    /// Extract, shape and load one id; returns the stored name.
    async fn process(&self, sink: &C::Sink, id: i64) -> Result<String> {
        let raw = self.source.fetch(id).await?;
        let shaped = shaper::shape_record(&raw)?;
        sink.persist(&shaped).await?;
        Ok(shaped.main.name)
    }

    async fn pause(&self) {
        let delay = self.config.api.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panic: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panic: {}", msg)
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Run against PokeAPI and SQLite, returning the full summary.
pub async fn execute(config: PipelineConfig) -> PipelineSummary {
    let client = match PokeApiClient::new(config.api.clone()) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Could not build HTTP client, aborting run");
            return PipelineSummary {
                aborted: true,
                ..PipelineSummary::start(config.fetch_count)
            }
            .finish();
        },
    };

    let connector = SqliteConnector::new(config.database_path.clone());
    Pipeline::new(config, client, connector).run().await
}

/// Run against PokeAPI and SQLite; true when at least one creature was stored.
pub async fn run_pipeline(config: PipelineConfig) -> bool {
    execute(config).await.is_success()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_success_rules() {
        let mut summary = PipelineSummary::start(3);
        assert!(!summary.is_success());

        summary.succeeded = 1;
        summary.failed = 2;
        assert!(summary.is_success());
        assert_eq!(summary.processed(), 3);

        summary.aborted = true;
        assert!(!summary.is_success());
    }

    #[test]
    fn test_summary_finish_sets_duration() {
        let summary = PipelineSummary::start(0);
        assert!(summary.duration_secs().is_none());
        let summary = summary.finish();
        assert!(summary.duration_secs().is_some_and(|secs| secs >= 0.0));
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*boxed), "panic: boom");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*boxed), "panic: bang");

        let boxed: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*boxed), "panic with non-string payload");
    }
}
