//! `bgstrip` command-line tool
//!
//! Removes image backgrounds with an AI model, reference colors, or both.

use super::config::CliConfigBuilder;
use super::progress::IndicatifReporter;
use crate::config::{ProcessingMode, ProcessingOptions, TextDetectionMode};
use crate::ocr::TesseractRecognizer;
use crate::pipeline::{BatchJob, BatchRunner, BatchSummary, Pipeline};
use crate::segmentation::models::format_size;
use crate::segmentation::{ModelCache, ModelDownloader, ModelPreset, ModelSource};
use crate::services::{discover_inputs, ImageIOService};
use crate::tracing_config::{TracingConfig, TracingFormat};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Background removal with AI segmentation and color keying
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgstrip")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image files or directories
    #[arg(value_name = "INPUT", required_unless_present_any = &["only_download", "list_models", "show_providers"])]
    pub input: Vec<PathBuf>,

    /// Output file (single input) or directory [default: next to each input]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Processing mode [default: ai]
    #[arg(long, value_enum)]
    pub mode: Option<CliMode>,

    /// Reference color pass as COLOR[:THRESHOLD], repeatable (e.g. white, #00ff00:20, 255,0,0)
    #[arg(short, long, value_name = "COLOR")]
    pub color: Vec<String>,

    /// Threshold for --color values without one (0-441) [default: 30]
    #[arg(short, long)]
    pub threshold: Option<u32>,

    /// Feather width beyond the threshold, single pass only [default: 0]
    #[arg(long)]
    pub feather: Option<u32>,

    /// Text detection method in hybrid mode [default: ocr]
    #[arg(long, value_enum)]
    pub text_detection: Option<CliTextDetection>,

    /// Text color for color-based text detection, repeatable [default: black]
    #[arg(long, value_name = "COLOR")]
    pub text_color: Vec<String>,

    /// Distance threshold for text colors (0-441) [default: 60]
    #[arg(long)]
    pub text_threshold: Option<u32>,

    /// Padding around restored text regions in pixels [default: 10]
    #[arg(long)]
    pub text_padding: Option<u32>,

    /// Minimum OCR word confidence (0-100) [default: 30]
    #[arg(long)]
    pub ocr_min_confidence: Option<f32>,

    /// Tesseract executable used for OCR
    #[arg(long, value_name = "PATH")]
    pub tesseract: Option<PathBuf>,

    /// OCR language passed to tesseract (e.g. eng, deu)
    #[arg(long)]
    pub ocr_language: Option<String>,

    /// Segmentation model preset [default: u2net]
    #[arg(short, long)]
    pub model: Option<String>,

    /// Local ONNX model file, overrides --model
    #[arg(long, value_name = "PATH")]
    pub model_path: Option<PathBuf>,

    /// Execution provider: auto, cpu, cuda, coreml [default: auto]
    #[arg(short, long)]
    pub execution_provider: Option<String>,

    /// Inference threads (0 = auto)
    #[arg(long)]
    pub threads: Option<usize>,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// File name pattern for directory inputs (e.g. "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Parallel workers for color mode batches
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Write a JSON batch summary to this path
    #[arg(long, value_name = "PATH")]
    pub summary: Option<PathBuf>,

    /// Download the selected model preset and exit
    #[arg(long)]
    pub only_download: bool,

    /// List model presets and their cache status and exit
    #[arg(long)]
    pub list_models: bool,

    /// Show execution provider availability and exit
    #[arg(long)]
    pub show_providers: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Tracing filter directive, overrides -v (e.g. "bgstrip=debug")
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliMode {
    Ai,
    Color,
    Hybrid,
}

impl From<CliMode> for ProcessingMode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Ai => Self::Ai,
            CliMode::Color => Self::Color,
            CliMode::Hybrid => Self::Hybrid,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliTextDetection {
    Ocr,
    Color,
}

impl From<CliTextDetection> for TextDetectionMode {
    fn from(detection: CliTextDetection) -> Self {
        match detection {
            CliTextDetection::Ocr => Self::Ocr,
            CliTextDetection::Color => Self::Color,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => Self::Console,
            CliLogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => Self::Json,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli).context("Failed to initialize tracing")?;

    if cli.show_providers {
        show_providers();
        return Ok(());
    }
    if cli.list_models {
        return list_models();
    }
    if cli.only_download {
        return download_only(&cli).await;
    }

    let options = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let discovered = discover_inputs(&cli.input, cli.recursive, cli.pattern.as_deref())
        .context("Failed to collect input files")?;
    if discovered.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(());
    }

    let start = Instant::now();
    let mut summary = if discovered.files.is_empty() {
        BatchSummary::from_failures(Vec::new())
    } else {
        let jobs = plan_jobs(&discovered.files, cli.output.as_deref())?;
        info!(
            files = jobs.len(),
            rejected = discovered.rejected.len(),
            mode = %options.mode,
            passes = options.passes.len(),
            "Starting background removal"
        );

        let reporter = Arc::new(IndicatifReporter::new(jobs.len(), cli.verbose > 0));
        let summary = if options.mode == ProcessingMode::Color && cli.jobs > 1 {
            BatchRunner::run_color_parallel(options, jobs, cli.jobs, reporter.clone())
                .await
                .context("Parallel batch failed")?
        } else {
            let mut pipeline = build_pipeline(&cli, options)
                .await?
                .with_reporter(reporter.clone());
            BatchRunner::run_sequential(&mut pipeline, &jobs, reporter.as_ref())
        };
        reporter.finish(format!("{} done", summary.processed.len()));
        summary
    };
    summary.record_rejected(discovered.rejected);

    report_summary(&summary, start);

    if let Some(path) = &cli.summary {
        summary
            .write_json(path)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        info!(path = %path.display(), "Batch summary written");
    }

    if !summary.is_success() {
        anyhow::bail!(
            "{} of {} image(s) failed",
            summary.failures.len(),
            summary.total()
        );
    }
    Ok(())
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let mut config = TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(cli.log_format.into())
        .with_session_id(uuid::Uuid::new_v4().to_string());
    if let Some(filter) = &cli.log_filter {
        config = config.with_env_filter(filter.clone());
    }
    config.init()
}

/// Pair each input with its output path
///
/// A single input may name an output file ending in `.png`; anything else
/// given with `--output` is treated as a directory.
fn plan_jobs(files: &[PathBuf], output: Option<&Path>) -> Result<Vec<BatchJob>> {
    if let [single] = files {
        if let Some(out) = output.filter(|o| is_png_path(o) && !o.is_dir()) {
            return Ok(vec![BatchJob::new(single, out)]);
        }
    }

    if let Some(dir) = output {
        if dir.is_file() {
            anyhow::bail!(
                "Output path exists and is a file, not a directory: {}",
                dir.display()
            );
        }
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    Ok(files
        .iter()
        .map(|input| BatchJob::new(input, ImageIOService::output_path(input, output)))
        .collect())
}

fn is_png_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

async fn build_pipeline(cli: &Cli, options: ProcessingOptions) -> Result<Pipeline> {
    let needs_segmenter = options.mode.needs_segmenter();
    let needs_ocr =
        options.mode == ProcessingMode::Hybrid && options.text_detection == TextDetectionMode::Ocr;
    let segmentation = options.segmentation.clone();

    let mut pipeline = Pipeline::new(options).context("Invalid configuration")?;

    if needs_segmenter {
        let cache = ModelCache::new().context("Failed to initialize model cache")?;
        if let ModelSource::Preset(preset) = segmentation.model {
            let downloader = ModelDownloader::new(cache.clone()).context("Failed to create model downloader")?;
            downloader
                .ensure_preset(preset, true)
                .await
                .with_context(|| format!("Failed to make model '{}' available", preset))?;
        }
        pipeline = pipeline.with_segmenter(load_segmenter(&cache, &segmentation)?);
    }

    if needs_ocr {
        let mut recognizer = TesseractRecognizer::new();
        if let Some(binary) = &cli.tesseract {
            recognizer = recognizer.with_binary(binary.clone());
        }
        if let Some(language) = &cli.ocr_language {
            recognizer = recognizer.with_language(language.clone());
        }
        pipeline = pipeline.with_recognizer(Box::new(recognizer));
    }

    Ok(pipeline)
}

#[cfg(feature = "onnx")]
fn load_segmenter(
    cache: &ModelCache,
    config: &crate::config::SegmentationConfig,
) -> Result<Box<dyn crate::segmentation::Segmenter>> {
    let segmenter = crate::segmentation::OnnxSegmenter::from_config(cache, config)
        .with_context(|| format!("Failed to load model {}", config.model.display_name()))?;
    Ok(Box::new(segmenter))
}

#[cfg(not(feature = "onnx"))]
fn load_segmenter(
    _cache: &ModelCache,
    _config: &crate::config::SegmentationConfig,
) -> Result<Box<dyn crate::segmentation::Segmenter>> {
    anyhow::bail!("AI modes need the `onnx` feature; rebuild with it or use --mode color")
}

fn report_summary(summary: &BatchSummary, start: Instant) {
    let removed: usize = summary.processed.iter().map(|item| item.removed_pixels).sum();
    let degraded = summary
        .processed
        .iter()
        .filter(|item| item.text_detection_degraded)
        .count();

    println!(
        "Processed {}/{} image(s) in {:.2}s",
        summary.processed.len(),
        summary.total(),
        start.elapsed().as_secs_f64()
    );
    if removed > 0 {
        println!("  Pixels made transparent: {}", removed);
    }
    if degraded > 0 {
        println!("  Text detection unavailable for {} image(s)", degraded);
    }
    for failure in &summary.failures {
        println!("  Failed: {} ({})", failure.path.display(), failure.error);
    }
}

fn list_models() -> Result<()> {
    let cache = ModelCache::new().context("Failed to initialize model cache")?;
    let cached = cache
        .scan_cached_models()
        .context("Failed to list cached models")?;

    println!("Model presets (cache: {})", cache.cache_dir().display());
    for preset in ModelPreset::ALL {
        let status = cached
            .iter()
            .find(|info| info.preset == preset)
            .map_or_else(|| "not downloaded".to_string(), |info| format_size(info.size_bytes));
        println!(
            "  {:<18} {:>5}px  {:<16} {}",
            preset.name(),
            preset.preprocessing().target_size,
            status,
            preset.description()
        );
    }
    println!("\nDownload a preset with: bgstrip --only-download --model <NAME>");
    Ok(())
}

async fn download_only(cli: &Cli) -> Result<()> {
    let preset = match &cli.model {
        Some(name) => CliConfigBuilder::preset(name)?,
        None => ModelPreset::default(),
    };
    let cache = ModelCache::new().context("Failed to initialize model cache")?;
    let downloader = ModelDownloader::new(cache).context("Failed to create model downloader")?;
    let path = downloader
        .ensure_preset(preset, true)
        .await
        .with_context(|| format!("Failed to download model '{}'", preset))?;
    println!("Model '{}' ready at {}", preset, path.display());
    Ok(())
}

#[cfg(feature = "onnx")]
fn show_providers() {
    println!("Execution providers:");
    for (name, available, description) in crate::segmentation::OnnxSegmenter::list_providers() {
        let status = if available { "available" } else { "not available" };
        println!("  {:<8} {:<14} {}", name, status, description);
    }
}

#[cfg(not(feature = "onnx"))]
fn show_providers() {
    println!("Built without the `onnx` feature; only color mode is available");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_single_input_with_png_output_file() {
        let files = vec![PathBuf::from("/in/cat.jpg")];
        let jobs = plan_jobs(&files, Some(Path::new("/tmp/never-created/result.png"))).unwrap();
        assert_eq!(jobs[0].output, PathBuf::from("/tmp/never-created/result.png"));
    }

    #[test]
    fn test_batch_output_directory_created() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let files = vec![PathBuf::from("/in/a.jpg"), PathBuf::from("/in/b.png")];
        let jobs = plan_jobs(&files, Some(&out)).unwrap();
        assert!(out.is_dir());
        assert_eq!(jobs[1].output, out.join("b_nobg.png"));
    }

    #[test]
    fn test_no_output_writes_next_to_input() {
        let jobs = plan_jobs(&[PathBuf::from("/in/a.jpg")], None).unwrap();
        assert_eq!(jobs[0].output, PathBuf::from("/in/a_nobg.png"));
    }

    #[test]
    fn test_cli_requires_input() {
        assert!(Cli::try_parse_from(["bgstrip"]).is_err());
        assert!(Cli::try_parse_from(["bgstrip", "--list-models"]).is_ok());
    }
}
