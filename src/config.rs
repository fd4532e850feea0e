//! Configuration types for background removal runs

use crate::compositor::DEFAULT_PADDING;
use crate::error::{BgStripError, Result};
use crate::segmentation::models::ModelSource;
use crate::types::{ColorPass, RgbColor, MAX_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Threshold used when a pass does not name one
pub const DEFAULT_THRESHOLD: u32 = 30;
pub const DEFAULT_TEXT_THRESHOLD: u32 = 60;
pub const DEFAULT_OCR_MIN_CONFIDENCE: f32 = 30.0;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = BgStripError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(BgStripError::invalid_config(format!(
                "Unknown execution provider '{}'. Use auto, cpu, cuda or coreml",
                other
            ))),
        }
    }
}

/// How an image is processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    /// Segmentation model only
    #[default]
    Ai,
    /// Color-distance passes only
    Color,
    /// Segmentation cutout with detected text restored
    Hybrid,
}

impl ProcessingMode {
    #[must_use]
    pub fn needs_segmenter(self) -> bool {
        matches!(self, Self::Ai | Self::Hybrid)
    }
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ai => write!(f, "ai"),
            Self::Color => write!(f, "color"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// How text is located in hybrid mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDetectionMode {
    /// Word boxes from a text recognizer
    #[default]
    Ocr,
    /// Connected regions of pixels close to the text colors
    Color,
}

impl std::fmt::Display for TextDetectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ocr => write!(f, "ocr"),
            Self::Color => write!(f, "color"),
        }
    }
}

/// Where the segmentation model comes from and how it runs
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub model: ModelSource,
    pub execution_provider: ExecutionProvider,
    /// Intra-op threads for inference (0 = auto)
    pub threads: usize,
}

/// Options resolved once before a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    pub mode: ProcessingMode,
    /// Color passes applied in order (color mode)
    pub passes: Vec<ColorPass>,
    /// Feather width beyond the threshold, single-pass runs only
    pub feather: u32,
    pub text_detection: TextDetectionMode,
    pub text_colors: Vec<RgbColor>,
    pub text_threshold: u32,
    /// Margin added around each preserved text region
    pub text_padding: u32,
    /// Recognized words below this confidence are ignored
    pub ocr_min_confidence: f32,
    pub segmentation: SegmentationConfig,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            mode: ProcessingMode::default(),
            passes: Vec::new(),
            feather: 0,
            text_detection: TextDetectionMode::default(),
            text_colors: vec![RgbColor::BLACK],
            text_threshold: DEFAULT_TEXT_THRESHOLD,
            text_padding: DEFAULT_PADDING,
            ocr_min_confidence: DEFAULT_OCR_MIN_CONFIDENCE,
            segmentation: SegmentationConfig::default(),
        }
    }
}

impl ProcessingOptions {
    #[must_use]
    pub fn builder() -> ProcessingOptionsBuilder {
        ProcessingOptionsBuilder::default()
    }

    /// Load options from a JSON file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| BgStripError::file_io_error("read config file", path, &e))?;
        let options: Self = serde_json::from_str(&contents).map_err(|e| {
            BgStripError::invalid_config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Reject settings that cannot produce a result
    ///
    /// # Errors
    /// - A pass or text threshold above 441
    /// - Color mode without any pass
    /// - Hybrid color text detection without text colors
    /// - Negative or non-finite OCR confidence
    pub fn validate(&self) -> Result<()> {
        for (index, pass) in self.passes.iter().enumerate() {
            if pass.threshold > MAX_THRESHOLD {
                return Err(BgStripError::config_value_error(
                    &format!("threshold for pass {}", index),
                    pass.threshold,
                    "0-441",
                ));
            }
        }

        if self.text_threshold > MAX_THRESHOLD {
            return Err(BgStripError::config_value_error(
                "text threshold",
                self.text_threshold,
                "0-441",
            ));
        }

        if !self.ocr_min_confidence.is_finite() || !(0.0..=100.0).contains(&self.ocr_min_confidence) {
            return Err(BgStripError::config_value_error(
                "OCR minimum confidence",
                self.ocr_min_confidence,
                "0-100",
            ));
        }

        match self.mode {
            ProcessingMode::Color if self.passes.is_empty() => {
                return Err(BgStripError::invalid_config(
                    "Color mode requires at least one reference color",
                ));
            },
            ProcessingMode::Hybrid
                if self.text_detection == TextDetectionMode::Color && self.text_colors.is_empty() =>
            {
                return Err(BgStripError::invalid_config(
                    "Color text detection requires at least one text color",
                ));
            },
            _ => {},
        }

        if self.mode == ProcessingMode::Color && self.feather > 0 && self.passes.len() > 1 {
            warn!(
                feather = self.feather,
                passes = self.passes.len(),
                "Feathering only applies to single-pass runs and will be ignored"
            );
        }

        Ok(())
    }
}

/// Builder for `ProcessingOptions`
#[derive(Debug, Default)]
pub struct ProcessingOptionsBuilder {
    options: ProcessingOptions,
}

impl ProcessingOptionsBuilder {
    /// Start from existing options, e.g. ones loaded from a file
    #[must_use]
    pub fn from_options(options: ProcessingOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn mode(mut self, mode: ProcessingMode) -> Self {
        self.options.mode = mode;
        self
    }

    /// Append one color pass
    #[must_use]
    pub fn pass(mut self, pass: ColorPass) -> Self {
        self.options.passes.push(pass);
        self
    }

    /// Replace all color passes
    #[must_use]
    pub fn passes(mut self, passes: Vec<ColorPass>) -> Self {
        self.options.passes = passes;
        self
    }

    #[must_use]
    pub fn feather(mut self, feather: u32) -> Self {
        self.options.feather = feather;
        self
    }

    #[must_use]
    pub fn text_detection(mut self, text_detection: TextDetectionMode) -> Self {
        self.options.text_detection = text_detection;
        self
    }

    #[must_use]
    pub fn text_colors(mut self, colors: Vec<RgbColor>) -> Self {
        self.options.text_colors = colors;
        self
    }

    #[must_use]
    pub fn text_threshold(mut self, threshold: u32) -> Self {
        self.options.text_threshold = threshold;
        self
    }

    #[must_use]
    pub fn text_padding(mut self, padding: u32) -> Self {
        self.options.text_padding = padding;
        self
    }

    #[must_use]
    pub fn ocr_min_confidence(mut self, confidence: f32) -> Self {
        self.options.ocr_min_confidence = confidence;
        self
    }

    #[must_use]
    pub fn model(mut self, model: ModelSource) -> Self {
        self.options.segmentation.model = model;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.options.segmentation.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.options.segmentation.threads = threads;
        self
    }

    /// Build and validate the options
    pub fn build(self) -> Result<ProcessingOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::models::ModelPreset;

    #[test]
    fn test_defaults() {
        let options = ProcessingOptions::default();
        assert_eq!(options.mode, ProcessingMode::Ai);
        assert_eq!(options.text_colors, vec![RgbColor::BLACK]);
        assert_eq!(options.text_threshold, 60);
        assert_eq!(options.text_padding, 10);
        assert_eq!(
            options.segmentation.model,
            ModelSource::Preset(ModelPreset::U2Net)
        );
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_color_mode_needs_a_pass() {
        let err = ProcessingOptions::builder()
            .mode(ProcessingMode::Color)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("reference color"));

        assert!(ProcessingOptions::builder()
            .mode(ProcessingMode::Color)
            .pass(ColorPass::new(RgbColor::WHITE, 30))
            .build()
            .is_ok());
    }

    #[test]
    fn test_threshold_above_max_rejected() {
        let err = ProcessingOptions::builder()
            .mode(ProcessingMode::Color)
            .pass(ColorPass::new(RgbColor::WHITE, 442))
            .build()
            .unwrap_err();
        assert!(matches!(err, BgStripError::InvalidConfig(_)));

        assert!(ProcessingOptions::builder()
            .text_threshold(500)
            .build()
            .is_err());
    }

    #[test]
    fn test_hybrid_color_detection_needs_text_colors() {
        let result = ProcessingOptions::builder()
            .mode(ProcessingMode::Hybrid)
            .text_detection(TextDetectionMode::Color)
            .text_colors(Vec::new())
            .build();
        assert!(result.is_err());

        // OCR detection does not use text colors
        assert!(ProcessingOptions::builder()
            .mode(ProcessingMode::Hybrid)
            .text_colors(Vec::new())
            .build()
            .is_ok());
    }

    #[test]
    fn test_ocr_confidence_range() {
        assert!(ProcessingOptions::builder().ocr_min_confidence(101.0).build().is_err());
        assert!(ProcessingOptions::builder().ocr_min_confidence(f32::NAN).build().is_err());
    }

    #[test]
    fn test_json_round_trip_with_partial_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("options.json");
        std::fs::write(
            &path,
            r#"{"mode":"color","passes":[{"color":{"r":255,"g":255,"b":255},"threshold":25}],"feather":4}"#,
        )
        .unwrap();

        let options = ProcessingOptions::from_json_file(&path).unwrap();
        assert_eq!(options.mode, ProcessingMode::Color);
        assert_eq!(options.passes, vec![ColorPass::new(RgbColor::WHITE, 25)]);
        assert_eq!(options.feather, 4);
        assert_eq!(options.text_threshold, DEFAULT_TEXT_THRESHOLD);
    }

    #[test]
    fn test_json_file_errors() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(ProcessingOptions::from_json_file(temp.path().join("missing.json")).is_err());

        let bad = temp.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        let err = ProcessingOptions::from_json_file(&bad).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn test_provider_parsing() {
        assert_eq!("CUDA".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::Cuda);
        assert_eq!("coreml".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::CoreMl);
        assert!("tpu".parse::<ExecutionProvider>().is_err());
    }
}
