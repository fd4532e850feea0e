//! Progress reporting service
//!
//! Pipelines announce stage changes through a [`ProgressReporter`], so the
//! CLI can draw progress bars while library callers stay silent.

use crate::types::ProcessingTimings;
use std::time::Instant;
use tracing::{error, info};

/// Stages an image passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    ImageLoading,
    Segmentation,
    TextDetection,
    RegionLabeling,
    ColorClassification,
    Compositing,
    FileSaving,
    Completed,
}

impl ProcessingStage {
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::ImageLoading => "Loading input image",
            Self::Segmentation => "Running AI segmentation",
            Self::TextDetection => "Detecting text",
            Self::RegionLabeling => "Labeling text regions",
            Self::ColorClassification => "Removing key colors",
            Self::Compositing => "Restoring text regions",
            Self::FileSaving => "Saving result",
            Self::Completed => "Processing completed",
        }
    }

    /// Typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            Self::ImageLoading => 10,
            Self::Segmentation => 50,
            Self::TextDetection => 70,
            Self::RegionLabeling => 80,
            Self::ColorClassification => 60,
            Self::Compositing => 90,
            Self::FileSaving => 95,
            Self::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: ProcessingStage,
    /// 0-100
    pub progress: u8,
    pub description: String,
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }
}

/// Receives progress from a pipeline or batch run
pub trait ProgressReporter: Send + Sync {
    fn report_progress(&self, update: ProgressUpdate);

    fn report_completion(&self, timings: &ProcessingTimings);

    fn report_error(&self, stage: ProcessingStage, error: &str);

    /// One batch item finished, successfully or not
    fn report_batch_item(&self, completed: usize, total: usize, item: &str, success: bool) {
        let _ = (completed, total, item, success);
    }
}

/// Discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: &ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Emits progress as tracing events
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            info!(
                progress = update.progress,
                elapsed_ms = update.elapsed_ms,
                "{}",
                update.description
            );
        }
    }

    fn report_completion(&self, timings: &ProcessingTimings) {
        info!(total_ms = timings.total_ms, "Background removal completed");
        if self.verbose {
            info!("Timings: {}", timings.summary());
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        error!(stage = stage.description(), "{}", error);
    }

    fn report_batch_item(&self, completed: usize, total: usize, item: &str, success: bool) {
        info!(completed, total, item, success, "Batch item finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_uses_stage_defaults() {
        let update = ProgressUpdate::new(ProcessingStage::Compositing, Instant::now());
        assert_eq!(update.progress, 90);
        assert_eq!(update.description, "Restoring text regions");
    }

    #[test]
    fn test_completed_is_full_progress() {
        assert_eq!(ProcessingStage::Completed.progress_percentage(), 100);
    }

    #[test]
    fn test_noop_accepts_everything() {
        let reporter = NoOpProgressReporter;
        reporter.report_progress(ProgressUpdate::new(ProcessingStage::ImageLoading, Instant::now()));
        reporter.report_completion(&ProcessingTimings::default());
        reporter.report_error(ProcessingStage::FileSaving, "disk full");
        reporter.report_batch_item(1, 2, "a.png", true);
    }
}
