//! Progress bar reporter for batch runs

use crate::services::{ProcessingStage, ProgressReporter, ProgressUpdate};
use crate::types::ProcessingTimings;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

/// Draws one bar tick per finished file; single-file runs get no bar
pub(crate) struct IndicatifReporter {
    bar: Option<ProgressBar>,
    verbose: bool,
}

impl IndicatifReporter {
    pub(crate) fn new(total: usize, verbose: bool) -> Self {
        let bar = (total > 1).then(|| {
            let pb = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        });
        Self { bar, verbose }
    }

    pub(crate) fn finish(&self, message: String) {
        if let Some(pb) = &self.bar {
            pb.finish_with_message(message);
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            debug!(
                stage = ?update.stage,
                progress = update.progress,
                elapsed_ms = update.elapsed_ms,
                "{}",
                update.description
            );
        }
    }

    fn report_completion(&self, timings: &ProcessingTimings) {
        if self.verbose {
            info!("Timings: {}", timings.summary());
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        match &self.bar {
            Some(pb) => pb.suspend(|| warn!(stage = stage.description(), "{}", error)),
            None => warn!(stage = stage.description(), "{}", error),
        }
    }

    fn report_batch_item(&self, completed: usize, _total: usize, item: &str, success: bool) {
        if let Some(pb) = &self.bar {
            pb.set_position(completed as u64);
            let name = std::path::Path::new(item)
                .file_name()
                .map_or_else(|| item.to_string(), |n| n.to_string_lossy().into_owned());
            pb.set_message(if success { name } else { format!("{} (failed)", name) });
        }
    }
}
