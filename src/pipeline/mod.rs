//! Mode orchestration
//!
//! A [`Pipeline`] runs one image at a time through AI-only, color-only or
//! hybrid processing. Every run walks an explicit [`PipelineState`] machine
//! and keeps the visited states, so a degraded or failed run can be
//! inspected after the fact.

pub mod batch;

use crate::color::ColorMaskClassifier;
use crate::compositor::MaskCompositor;
use crate::config::{ProcessingMode, ProcessingOptions, TextDetectionMode};
use crate::error::{BgStripError, Result};
use crate::ocr::{words_to_regions, TextRecognizer};
use crate::region::{build_text_mask, RegionLabeler};
use crate::segmentation::Segmenter;
use crate::services::{ImageIOService, NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressUpdate};
use crate::types::{ProcessingOutcome, Raster, Region};
use image::DynamicImage;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, span, warn, Level};

pub use batch::{BatchFailure, BatchItem, BatchJob, BatchRunner, BatchSummary};

/// Steps of a hybrid run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HybridStage {
    Segmenting,
    DetectingText,
    Labeling,
    Compositing,
}

/// Where a pipeline run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    AwaitingInput,
    AiOnly,
    ColorOnly,
    Hybrid(HybridStage),
    Done,
    Failed,
}

impl PipelineState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingInput => write!(f, "awaiting-input"),
            Self::AiOnly => write!(f, "ai-only"),
            Self::ColorOnly => write!(f, "color-only"),
            Self::Hybrid(stage) => write!(f, "hybrid:{:?}", stage),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Per-image processing driven by [`ProcessingOptions`]
pub struct Pipeline {
    options: ProcessingOptions,
    segmenter: Option<Box<dyn Segmenter>>,
    recognizer: Option<Box<dyn TextRecognizer>>,
    classifier: ColorMaskClassifier,
    labeler: RegionLabeler,
    compositor: MaskCompositor,
    reporter: Arc<dyn ProgressReporter>,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("mode", &self.options.mode)
            .field("segmenter", &self.segmenter.as_ref().map(|s| s.name().to_string()))
            .field("recognizer", &self.recognizer.as_ref().map(|r| r.name().to_string()))
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Validate the options and prepare an idle pipeline
    pub fn new(options: ProcessingOptions) -> Result<Self> {
        options.validate()?;
        let classifier = ColorMaskClassifier::new().with_feather(options.feather);
        let compositor = MaskCompositor::new(options.text_padding);
        Ok(Self {
            options,
            segmenter: None,
            recognizer: None,
            classifier,
            labeler: RegionLabeler::new(),
            compositor,
            reporter: Arc::new(NoOpProgressReporter),
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        })
    }

    #[must_use]
    pub fn with_segmenter(mut self, segmenter: Box<dyn Segmenter>) -> Self {
        self.segmenter = Some(segmenter);
        self
    }

    #[must_use]
    pub fn with_recognizer(mut self, recognizer: Box<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn options(&self) -> &ProcessingOptions {
        &self.options
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// States visited by the most recent run, starting at `Idle`
    #[must_use]
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "Pipeline transition");
        self.state = next;
        self.history.push(next);
    }

    fn begin_run(&mut self) {
        self.state = PipelineState::Idle;
        self.history.clear();
        self.history.push(PipelineState::Idle);
        self.transition(PipelineState::AwaitingInput);
    }

    fn report(&self, stage: ProcessingStage, start: Instant) {
        self.reporter.report_progress(ProgressUpdate::new(stage, start));
    }

    /// Load, process and save one file
    #[instrument(skip(self), fields(mode = %self.options.mode))]
    pub fn process_file(&mut self, input: &Path, output: &Path) -> Result<ProcessingOutcome> {
        self.begin_run();
        let start = Instant::now();

        self.report(ProcessingStage::ImageLoading, start);
        let image = match ImageIOService::load_image(input) {
            Ok(image) => image,
            Err(e) => return Err(self.fail(ProcessingStage::ImageLoading, e)),
        };
        let decode_ms = start.elapsed().as_millis() as u64;

        let mut outcome = self.run(&image, start)?;
        outcome.timings.decode_ms = decode_ms;

        self.report(ProcessingStage::FileSaving, start);
        if let Err(e) = ImageIOService::save_png(&outcome.raster, output) {
            return Err(self.fail(ProcessingStage::FileSaving, e));
        }

        outcome.timings.total_ms = start.elapsed().as_millis() as u64;
        self.reporter.report_completion(&outcome.timings);
        info!(
            input = %input.display(),
            output = %output.display(),
            total_ms = outcome.timings.total_ms,
            "Image processed"
        );
        Ok(outcome)
    }

    /// Process an already decoded image
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<ProcessingOutcome> {
        self.begin_run();
        let start = Instant::now();
        let mut outcome = self.run(image, start)?;
        outcome.timings.total_ms = start.elapsed().as_millis() as u64;
        Ok(outcome)
    }

    fn run(&mut self, image: &DynamicImage, start: Instant) -> Result<ProcessingOutcome> {
        if image.width() == 0 || image.height() == 0 {
            let err = BgStripError::processing_stage_error(
                "Image loading",
                "image has no pixels",
                Some(&format!("{}x{}", image.width(), image.height())),
            );
            return Err(self.fail(ProcessingStage::ImageLoading, err));
        }

        let result = match self.options.mode {
            ProcessingMode::Ai => {
                self.transition(PipelineState::AiOnly);
                self.run_ai(image, start)
            },
            ProcessingMode::Color => {
                self.transition(PipelineState::ColorOnly);
                Ok(self.run_color(image, start))
            },
            ProcessingMode::Hybrid => self.run_hybrid(image, start),
        };

        match result {
            Ok(outcome) => {
                self.transition(PipelineState::Done);
                self.report(ProcessingStage::Completed, start);
                Ok(outcome)
            },
            Err(e) => {
                let stage = match self.state {
                    PipelineState::Hybrid(HybridStage::Compositing) => ProcessingStage::Compositing,
                    PipelineState::ColorOnly => ProcessingStage::ColorClassification,
                    _ => ProcessingStage::Segmentation,
                };
                Err(self.fail(stage, e))
            },
        }
    }

    fn fail(&mut self, stage: ProcessingStage, error: BgStripError) -> BgStripError {
        if self.state != PipelineState::Failed {
            self.transition(PipelineState::Failed);
        }
        self.reporter.report_error(stage, &error.to_string());
        error
    }

    fn segment(&mut self, image: &DynamicImage, start: Instant) -> Result<(Raster, u64)> {
        let segmenter = self.segmenter.as_mut().ok_or_else(|| {
            BgStripError::invalid_config(format!(
                "{} mode requires a segmentation model",
                self.options.mode
            ))
        })?;

        self.reporter
            .report_progress(ProgressUpdate::new(ProcessingStage::Segmentation, start));
        let segment_start = Instant::now();
        let cutout = segmenter.segment(image)?;
        let elapsed = segment_start.elapsed().as_millis() as u64;

        if cutout.dimensions() != (image.width(), image.height()) {
            return Err(BgStripError::segmentation(format!(
                "{} returned a {}x{} cutout for a {}x{} image",
                segmenter.name(),
                cutout.width(),
                cutout.height(),
                image.width(),
                image.height()
            )));
        }
        Ok((Raster::from_rgba(cutout), elapsed))
    }

    fn run_ai(&mut self, image: &DynamicImage, start: Instant) -> Result<ProcessingOutcome> {
        let (cutout, segmentation_ms) = self.segment(image, start)?;
        let mut outcome = ProcessingOutcome::new(cutout);
        outcome.timings.segmentation_ms = segmentation_ms;
        Ok(outcome)
    }

    fn run_color(&mut self, image: &DynamicImage, start: Instant) -> ProcessingOutcome {
        self.report(ProcessingStage::ColorClassification, start);
        let classify_start = Instant::now();
        let mut raster = Raster::from_dynamic(image);
        let reports = self.classifier.classify(&mut raster, &self.options.passes);

        let mut outcome = ProcessingOutcome::new(raster);
        outcome.timings.classification_ms = classify_start.elapsed().as_millis() as u64;
        debug!(
            removed = reports.iter().map(|r| r.removed).sum::<usize>(),
            passes = reports.len(),
            "Color classification finished"
        );
        outcome.pass_reports = reports;
        outcome
    }

    fn run_hybrid(&mut self, image: &DynamicImage, start: Instant) -> Result<ProcessingOutcome> {
        self.transition(PipelineState::Hybrid(HybridStage::Segmenting));
        let (cutout, segmentation_ms) = self.segment(image, start)?;
        let source = Raster::from_dynamic(image);

        self.transition(PipelineState::Hybrid(HybridStage::DetectingText));
        self.report(ProcessingStage::TextDetection, start);
        let text_start = Instant::now();
        let (regions, degraded) = match self.options.text_detection {
            TextDetectionMode::Ocr => self.detect_text_ocr(image, &source),
            TextDetectionMode::Color => {
                let mask = {
                    let _span = span!(Level::DEBUG, "text_mask", colors = self.options.text_colors.len()).entered();
                    build_text_mask(&source, &self.options.text_colors, self.options.text_threshold)
                };
                self.transition(PipelineState::Hybrid(HybridStage::Labeling));
                self.report(ProcessingStage::RegionLabeling, start);
                (self.labeler.label(&mask), false)
            },
        };
        let text_detection_ms = text_start.elapsed().as_millis() as u64;

        self.transition(PipelineState::Hybrid(HybridStage::Compositing));
        self.report(ProcessingStage::Compositing, start);
        let composite_start = Instant::now();
        let raster = self.compositor.composite(cutout, &source, &regions)?;

        let mut outcome = ProcessingOutcome::new(raster);
        outcome.regions = regions;
        outcome.text_detection_degraded = degraded;
        outcome.timings.segmentation_ms = segmentation_ms;
        outcome.timings.text_detection_ms = text_detection_ms;
        outcome.timings.compositing_ms = composite_start.elapsed().as_millis() as u64;
        info!(
            regions = outcome.regions.len(),
            degraded,
            "Hybrid processing finished"
        );
        Ok(outcome)
    }

    /// Word regions from the recognizer; any failure yields no regions
    fn detect_text_ocr(&self, image: &DynamicImage, source: &Raster) -> (Vec<Region>, bool) {
        let Some(recognizer) = self.recognizer.as_ref() else {
            warn!("No text recognizer configured, keeping the cutout without text preservation");
            return (Vec::new(), true);
        };

        match recognizer.recognize(image) {
            Ok(words) => {
                let regions = words_to_regions(
                    &words,
                    self.options.ocr_min_confidence,
                    source.width(),
                    source.height(),
                );
                debug!(words = words.len(), regions = regions.len(), "Text recognized");
                (regions, false)
            },
            Err(e) => {
                warn!(
                    recognizer = recognizer.name(),
                    error = %e,
                    "Text recognition failed, keeping the cutout without text preservation"
                );
                (Vec::new(), true)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColorPass, RgbColor};
    use image::{Rgba, RgbaImage};

    struct FixedSegmenter;

    impl Segmenter for FixedSegmenter {
        fn segment(&mut self, image: &DynamicImage) -> Result<RgbaImage> {
            Ok(RgbaImage::new(image.width(), image.height()))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn blue(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 0, 255, 255])))
    }

    #[test]
    fn test_color_run_history() {
        let options = ProcessingOptions::builder()
            .mode(ProcessingMode::Color)
            .pass(ColorPass::new(RgbColor::new(0, 0, 255), 10))
            .build()
            .unwrap();
        let mut pipeline = Pipeline::new(options).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Idle);

        let outcome = pipeline.process_image(&blue(4, 4)).unwrap();
        assert_eq!(outcome.raster.transparent_count(), 16);
        assert_eq!(
            pipeline.history(),
            &[
                PipelineState::Idle,
                PipelineState::AwaitingInput,
                PipelineState::ColorOnly,
                PipelineState::Done
            ]
        );
    }

    #[test]
    fn test_ai_mode_without_segmenter_fails() {
        let mut pipeline = Pipeline::new(ProcessingOptions::default()).unwrap();
        let err = pipeline.process_image(&blue(2, 2)).unwrap_err();
        assert!(matches!(err, BgStripError::InvalidConfig(_)));
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }

    #[test]
    fn test_hybrid_without_recognizer_degrades() {
        let options = ProcessingOptions::builder()
            .mode(ProcessingMode::Hybrid)
            .build()
            .unwrap();
        let mut pipeline = Pipeline::new(options)
            .unwrap()
            .with_segmenter(Box::new(FixedSegmenter));
        let outcome = pipeline.process_image(&blue(3, 3)).unwrap();
        assert!(outcome.text_detection_degraded);
        assert!(outcome.regions.is_empty());
        assert_eq!(pipeline.state(), PipelineState::Done);
    }

    #[test]
    fn test_history_resets_between_runs() {
        let options = ProcessingOptions::builder()
            .mode(ProcessingMode::Color)
            .pass(ColorPass::new(RgbColor::WHITE, 5))
            .build()
            .unwrap();
        let mut pipeline = Pipeline::new(options).unwrap();
        pipeline.process_image(&blue(1, 1)).unwrap();
        pipeline.process_image(&blue(1, 1)).unwrap();
        assert_eq!(pipeline.history().len(), 4);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::Hybrid(HybridStage::Labeling).to_string(), "hybrid:Labeling");
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::AwaitingInput.is_terminal());
    }
}
