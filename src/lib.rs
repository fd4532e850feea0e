#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # bgstrip
//!
//! Background removal for images, combining AI matting with classic
//! color keying.
//!
//! ## Processing modes
//!
//! - **AI**: a salient-object segmentation model (U²-Net family, run with
//!   ONNX Runtime) produces an alpha matte for the foreground
//! - **Color**: pixels close to one or more reference colors are made
//!   transparent, optionally with a feathered edge
//! - **Hybrid**: the AI cutout is combined with detected text regions,
//!   which are restored fully opaque from the source image
//!
//! Text regions come either from OCR (a `tesseract` executable) or from a
//! color mask split into 8-connected components.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgstrip::{ColorPass, Pipeline, ProcessingMode, ProcessingOptions, RgbColor};
//! use std::path::Path;
//!
//! # fn example() -> bgstrip::Result<()> {
//! let options = ProcessingOptions::builder()
//!     .mode(ProcessingMode::Color)
//!     .pass(ColorPass::new(RgbColor::WHITE, 30))
//!     .feather(8)
//!     .build()?;
//!
//! let mut pipeline = Pipeline::new(options)?;
//! let outcome = pipeline.process_file(Path::new("logo.jpg"), Path::new("logo_nobg.png"))?;
//! println!("removed {} pixels", outcome.removed_pixels());
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime segmentation with CUDA and `CoreML` providers
//! - `cli` (default): Command-line interface and progress bars
//! - `webp-support` (default): WebP input support
//! - `tracing-json`: JSON log output for the CLI

#[cfg(feature = "cli")]
pub mod cli;
pub mod color;
pub mod compositor;
pub mod config;
pub mod error;
pub mod ocr;
pub mod pipeline;
pub mod region;
pub mod segmentation;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

pub use color::{color_distance, parse_color, parse_pass, ColorMaskClassifier, MAX_DISTANCE};
pub use compositor::{MaskCompositor, DEFAULT_PADDING};
pub use config::{
    ExecutionProvider, ProcessingMode, ProcessingOptions, ProcessingOptionsBuilder,
    SegmentationConfig, TextDetectionMode,
};
pub use error::{BgStripError, Result};
pub use ocr::{OcrWord, TesseractRecognizer, TextRecognizer};
pub use pipeline::{
    BatchFailure, BatchItem, BatchJob, BatchRunner, BatchSummary, HybridStage, Pipeline,
    PipelineState,
};
pub use region::{build_text_mask, BooleanMask, RegionLabeler, MIN_REGION_PIXELS};
#[cfg(feature = "onnx")]
pub use segmentation::OnnxSegmenter;
pub use segmentation::{ModelCache, ModelDownloader, ModelPreset, ModelSource, Segmenter};
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, ProcessingStage,
    ProgressReporter, ProgressUpdate,
};
pub use types::{ColorPass, ProcessingOutcome, Raster, Region, RgbColor, MAX_THRESHOLD};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Apply color passes to a raster without feathering
///
/// Pixels within each pass's threshold of its color become fully
/// transparent. Passes run in order and later passes skip pixels an
/// earlier pass already removed.
///
/// ```rust
/// use bgstrip::{classify, ColorPass, Raster, RgbColor};
/// use image::Rgba;
///
/// let raster = Raster::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
/// let out = classify(raster, &[ColorPass::new(RgbColor::new(0, 0, 255), 10)]);
/// assert_eq!(out.transparent_count(), 16);
/// ```
#[must_use]
pub fn classify(mut raster: Raster, passes: &[ColorPass]) -> Raster {
    ColorMaskClassifier::new().classify(&mut raster, passes);
    raster
}

/// Text regions found by color similarity
///
/// Builds a mask of pixels near any of `text_colors` and returns its
/// 8-connected components of at least [`MIN_REGION_PIXELS`] pixels.
#[must_use]
pub fn detect_text_regions_by_color(
    raster: &Raster,
    text_colors: &[RgbColor],
    threshold: u32,
) -> Vec<Region> {
    let mask = build_text_mask(raster, text_colors, threshold);
    RegionLabeler::new().label(&mask)
}

/// Restore `regions` of `source` onto `base`, fully opaque
pub fn composite_mask(base: Raster, source: &Raster, regions: &[Region], padding: u32) -> Result<Raster> {
    MaskCompositor::new(padding).composite(base, source, regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_detect_then_composite() {
        let mut source = Raster::from_pixel(30, 30, Rgba([255, 255, 255, 255]));
        for y in 10..20 {
            for x in 5..15 {
                if let Some(p) = source.pixel_at_mut(x, y) {
                    *p = Rgba([0, 0, 0, 255]);
                }
            }
        }

        let regions = detect_text_regions_by_color(&source, &[RgbColor::BLACK], 60);
        assert_eq!(regions.len(), 1);
        assert_eq!((regions[0].x, regions[0].y, regions[0].width, regions[0].height), (5, 10, 10, 10));

        let base = Raster::new(30, 30);
        let out = composite_mask(base, &source, &regions, 2).unwrap();
        assert_eq!(out.transparent_count(), 30 * 30 - 14 * 14);
        assert_eq!(out.pixel_at(3, 8), Some(&Rgba([255, 255, 255, 255])));
    }
}
