//! Conversion of CLI arguments into processing options

use crate::cli::main_impl::Cli;
use crate::color::parse_pass;
use crate::config::{ExecutionProvider, ProcessingOptions, ProcessingOptionsBuilder, DEFAULT_THRESHOLD};
use crate::segmentation::{ModelPreset, ModelSource};
use crate::types::RgbColor;
use anyhow::{Context, Result};

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Options from `--config` (if any) with command-line flags applied on top
    pub(crate) fn from_cli(cli: &Cli) -> Result<ProcessingOptions> {
        let base = match &cli.config {
            Some(path) => ProcessingOptions::from_json_file(path)
                .with_context(|| format!("Failed to load configuration file {}", path.display()))?,
            None => ProcessingOptions::default(),
        };

        let mut builder = ProcessingOptionsBuilder::from_options(base);

        if let Some(mode) = cli.mode {
            builder = builder.mode(mode.into());
        }

        if !cli.color.is_empty() {
            let default_threshold = cli.threshold.unwrap_or(DEFAULT_THRESHOLD);
            let passes = cli
                .color
                .iter()
                .map(|spec| {
                    parse_pass(spec, default_threshold)
                        .with_context(|| format!("Invalid --color value '{}'", spec))
                })
                .collect::<Result<Vec<_>>>()?;
            builder = builder.passes(passes);
        }

        if let Some(feather) = cli.feather {
            builder = builder.feather(feather);
        }
        if let Some(detection) = cli.text_detection {
            builder = builder.text_detection(detection.into());
        }
        if !cli.text_color.is_empty() {
            let colors = cli
                .text_color
                .iter()
                .map(|c| {
                    c.parse::<RgbColor>()
                        .with_context(|| format!("Invalid --text-color value '{}'", c))
                })
                .collect::<Result<Vec<_>>>()?;
            builder = builder.text_colors(colors);
        }
        if let Some(threshold) = cli.text_threshold {
            builder = builder.text_threshold(threshold);
        }
        if let Some(padding) = cli.text_padding {
            builder = builder.text_padding(padding);
        }
        if let Some(confidence) = cli.ocr_min_confidence {
            builder = builder.ocr_min_confidence(confidence);
        }

        if let Some(model) = Self::model_source(cli)? {
            builder = builder.model(model);
        }
        if let Some(provider) = &cli.execution_provider {
            let provider: ExecutionProvider =
                provider.parse().context("Invalid --execution-provider")?;
            builder = builder.execution_provider(provider);
        }
        if let Some(threads) = cli.threads {
            builder = builder.threads(threads);
        }

        builder.build().context("Invalid configuration")
    }

    /// `--model-path` wins over `--model`
    fn model_source(cli: &Cli) -> Result<Option<ModelSource>> {
        if let Some(path) = &cli.model_path {
            let preprocessing = match &cli.model {
                Some(name) => Self::preset(name)?.preprocessing(),
                None => ModelPreset::default().preprocessing(),
            };
            return Ok(Some(ModelSource::File {
                path: path.clone(),
                preprocessing,
            }));
        }
        cli.model
            .as_deref()
            .map(|name| Self::preset(name).map(ModelSource::Preset))
            .transpose()
    }

    pub(crate) fn preset(name: &str) -> Result<ModelPreset> {
        name.parse::<ModelPreset>()
            .with_context(|| format!("Unknown model '{}'. Use --list-models to see presets", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProcessingMode, TextDetectionMode};
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("bgstrip").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_color_passes_use_default_threshold() {
        let cli = parse(&["--mode", "color", "--color", "white", "--color", "#00ff00:12", "--threshold", "40", "in.png"]);
        let options = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(options.mode, ProcessingMode::Color);
        assert_eq!(options.passes.len(), 2);
        assert_eq!(options.passes[0].threshold, 40);
        assert_eq!(options.passes[1].color, RgbColor::new(0, 255, 0));
        assert_eq!(options.passes[1].threshold, 12);
    }

    #[test]
    fn test_color_mode_without_color_rejected() {
        let cli = parse(&["--mode", "color", "in.png"]);
        assert!(CliConfigBuilder::from_cli(&cli).is_err());
    }

    #[test]
    fn test_hybrid_text_options() {
        let cli = parse(&[
            "--mode", "hybrid", "--text-detection", "color", "--text-color", "black",
            "--text-color", "200,0,0", "--text-padding", "4", "in.png",
        ]);
        let options = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(options.text_detection, TextDetectionMode::Color);
        assert_eq!(options.text_colors, vec![RgbColor::BLACK, RgbColor::new(200, 0, 0)]);
        assert_eq!(options.text_padding, 4);
    }

    #[test]
    fn test_model_path_overrides_preset() {
        let cli = parse(&["--model", "isnet-general-use", "--model-path", "/m/custom.onnx", "in.png"]);
        let options = CliConfigBuilder::from_cli(&cli).unwrap();
        match options.segmentation.model {
            ModelSource::File { path, preprocessing } => {
                assert_eq!(path, std::path::PathBuf::from("/m/custom.onnx"));
                assert_eq!(preprocessing.target_size, 1024);
            },
            other => panic!("unexpected model source {:?}", other),
        }
    }

    #[test]
    fn test_unknown_model_rejected() {
        let cli = parse(&["--model", "birefnet", "in.png"]);
        assert!(CliConfigBuilder::from_cli(&cli).is_err());
    }
}
