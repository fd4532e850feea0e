//! Batch processing over many files
//!
//! A failing file is recorded in the summary and never stops the batch.

use super::Pipeline;
use crate::config::{ProcessingMode, ProcessingOptions};
use crate::error::{BgStripError, Result};
use crate::services::ProgressReporter;
use crate::types::ProcessingTimings;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// One input file and where its result goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl BatchJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// A successfully processed file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub input: PathBuf,
    pub output: PathBuf,
    pub removed_pixels: usize,
    pub regions: usize,
    pub text_detection_degraded: bool,
    pub timings: ProcessingTimings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Result of a whole batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed: Vec<BatchItem>,
    pub failures: Vec<BatchFailure>,
    pub total_ms: u64,
    pub generated_at: DateTime<Utc>,
}

impl BatchSummary {
    fn from_results(results: Vec<std::result::Result<BatchItem, BatchFailure>>, start: Instant) -> Self {
        let mut processed = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(item) => processed.push(item),
                Err(failure) => failures.push(failure),
            }
        }
        Self {
            processed,
            failures,
            total_ms: start.elapsed().as_millis() as u64,
            generated_at: Utc::now(),
        }
    }

    /// Summary of a batch in which nothing could be processed
    #[must_use]
    pub fn from_failures(failures: Vec<BatchFailure>) -> Self {
        Self {
            processed: Vec::new(),
            failures,
            total_ms: 0,
            generated_at: Utc::now(),
        }
    }

    /// Record inputs rejected before processing, ahead of processing failures
    pub fn record_rejected(&mut self, rejected: Vec<BatchFailure>) {
        if rejected.is_empty() {
            return;
        }
        let later = std::mem::replace(&mut self.failures, rejected);
        self.failures.extend(later);
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.processed.len() + self.failures.len()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Write the summary as pretty-printed JSON
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| BgStripError::internal(format!("Failed to serialize batch summary: {}", e)))?;
        std::fs::write(path_ref, json)
            .map_err(|e| BgStripError::file_io_error("write batch summary", path_ref, &e))
    }
}

fn run_job(pipeline: &mut Pipeline, job: &BatchJob) -> std::result::Result<BatchItem, BatchFailure> {
    match pipeline.process_file(&job.input, &job.output) {
        Ok(outcome) => Ok(BatchItem {
            input: job.input.clone(),
            output: job.output.clone(),
            removed_pixels: outcome.removed_pixels(),
            regions: outcome.regions.len(),
            text_detection_degraded: outcome.text_detection_degraded,
            timings: outcome.timings,
        }),
        Err(e) => {
            warn!(input = %job.input.display(), error = %e, "Batch item failed");
            Err(BatchFailure {
                path: job.input.clone(),
                error: e.to_string(),
            })
        },
    }
}

/// Drives a batch of [`BatchJob`]s
pub struct BatchRunner;

impl BatchRunner {
    /// Process jobs one after another with a single pipeline
    ///
    /// Used whenever a segmentation model is involved, since the model
    /// session is loaded once and shared by every image.
    #[instrument(skip_all, fields(jobs = jobs.len()))]
    pub fn run_sequential(
        pipeline: &mut Pipeline,
        jobs: &[BatchJob],
        reporter: &dyn ProgressReporter,
    ) -> BatchSummary {
        let start = Instant::now();
        let total = jobs.len();
        let mut results = Vec::with_capacity(total);

        for (index, job) in jobs.iter().enumerate() {
            let result = run_job(pipeline, job);
            reporter.report_batch_item(
                index + 1,
                total,
                &job.input.display().to_string(),
                result.is_ok(),
            );
            results.push(result);
        }

        let summary = BatchSummary::from_results(results, start);
        info!(
            processed = summary.processed.len(),
            failed = summary.failures.len(),
            total_ms = summary.total_ms,
            "Batch finished"
        );
        summary
    }

    /// Process color-mode jobs on blocking worker threads
    ///
    /// Results keep the order of `jobs` regardless of completion order.
    #[instrument(skip_all, fields(jobs = jobs.len(), concurrency = concurrency))]
    pub async fn run_color_parallel(
        options: ProcessingOptions,
        jobs: Vec<BatchJob>,
        concurrency: usize,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<BatchSummary> {
        if options.mode != ProcessingMode::Color {
            return Err(BgStripError::invalid_config(format!(
                "Parallel batches only support color mode, got {} mode",
                options.mode
            )));
        }
        options.validate()?;

        let start = Instant::now();
        let total = jobs.len();
        let concurrency = concurrency.max(1);

        let mut indexed: Vec<(usize, std::result::Result<BatchItem, BatchFailure>)> =
            stream::iter(jobs.into_iter().enumerate())
                .map(|(index, job)| {
                    let options = options.clone();
                    async move {
                        let input = job.input.clone();
                        let handle = tokio::task::spawn_blocking(move || {
                            let mut pipeline = Pipeline::new(options).map_err(|e| BatchFailure {
                                path: job.input.clone(),
                                error: e.to_string(),
                            })?;
                            run_job(&mut pipeline, &job)
                        });
                        let result = handle.await.unwrap_or_else(|e| {
                            Err(BatchFailure {
                                path: input,
                                error: format!("worker task failed: {}", e),
                            })
                        });
                        (index, result)
                    }
                })
                .buffer_unordered(concurrency)
                .enumerate()
                .map(|(completed, (index, result))| {
                    let item = match &result {
                        Ok(item) => item.input.display().to_string(),
                        Err(failure) => failure.path.display().to_string(),
                    };
                    reporter.report_batch_item(completed + 1, total, &item, result.is_ok());
                    (index, result)
                })
                .collect()
                .await;

        indexed.sort_by_key(|(index, _)| *index);

        let summary =
            BatchSummary::from_results(indexed.into_iter().map(|(_, r)| r).collect(), start);
        info!(
            processed = summary.processed.len(),
            failed = summary.failures.len(),
            total_ms = summary.total_ms,
            "Parallel batch finished"
        );
        Ok(summary)
    }
}
