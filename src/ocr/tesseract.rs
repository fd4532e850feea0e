//! Tesseract CLI recognizer
//!
//! The image is written to a temporary PNG and handed to
//! `tesseract <image> stdout [-l LANG] tsv`; word rows (level 5) of the TSV
//! report become [`OcrWord`]s.

use crate::error::{BgStripError, Result};
use crate::ocr::{OcrWord, TextRecognizer};
use image::DynamicImage;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, instrument};

const WORD_LEVEL: u32 = 5;

/// Runs the `tesseract` binary
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: PathBuf,
    language: Option<String>,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: None,
        }
    }
}

impl TesseractRecognizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific executable instead of `tesseract` from `PATH`
    #[must_use]
    pub fn with_binary<P: Into<PathBuf>>(mut self, binary: P) -> Self {
        self.binary = binary.into();
        self
    }

    /// Tesseract language code, e.g. `eng` or `deu+eng`
    #[must_use]
    pub fn with_language<S: Into<String>>(mut self, language: S) -> Self {
        self.language = Some(language.into());
        self
    }
}

impl TextRecognizer for TesseractRecognizer {
    #[instrument(skip_all, fields(binary = %self.binary.display()))]
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrWord>> {
        let input = tempfile::Builder::new()
            .prefix("bgstrip-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| BgStripError::ocr(format!("Failed to create temporary image: {e}")))?;
        image
            .save_with_format(input.path(), image::ImageFormat::Png)
            .map_err(|e| BgStripError::ocr(format!("Failed to write temporary image: {e}")))?;

        let mut command = Command::new(&self.binary);
        command.arg(input.path()).arg("stdout");
        if let Some(language) = &self.language {
            command.arg("-l").arg(language);
        }
        command.arg("tsv");

        let output = command.output().map_err(|e| {
            BgStripError::ocr(format!(
                "failed to execute {}: {e}",
                self.binary.display()
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BgStripError::ocr(format!(
                "tesseract failed (exit code {}): {}",
                output
                    .status
                    .code()
                    .map_or_else(|| "unknown".to_string(), |c| c.to_string()),
                stderr.trim()
            )));
        }

        let words = parse_tsv(&String::from_utf8_lossy(&output.stdout));
        debug!(words = words.len(), "Tesseract recognized words");
        Ok(words)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

/// Word-level rows of a Tesseract TSV report
///
/// Malformed rows and rows without text are skipped.
#[must_use]
pub fn parse_tsv(report: &str) -> Vec<OcrWord> {
    report
        .lines()
        .skip_while(|line| line.starts_with("level"))
        .filter_map(parse_row)
        .collect()
}

fn parse_row(line: &str) -> Option<OcrWord> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [level, _page, _block, _par, _line, _word, left, top, width, height, conf, rest @ ..] =
        fields.as_slice()
    else {
        return None;
    };
    if level.trim().parse::<u32>().ok()? != WORD_LEVEL {
        return None;
    }

    let text = rest.join("\t");
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let left = left.trim().parse::<u32>().ok()?;
    let top = top.trim().parse::<u32>().ok()?;
    let width = width.trim().parse::<u32>().ok()?;
    let height = height.trim().parse::<u32>().ok()?;
    let confidence = conf.trim().parse::<f32>().ok()?;

    Some(OcrWord {
        x0: left,
        y0: top,
        x1: left.saturating_add(width),
        y1: top.saturating_add(height),
        text: text.to_string(),
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t640\t480\t-1\t
4\t1\t1\t1\t1\t0\t36\t92\t200\t30\t-1\t
5\t1\t1\t1\t1\t1\t36\t92\t88\t30\t96.063751\tHello
5\t1\t1\t1\t1\t2\t140\t92\t96\t30\t41.5\tworld!
5\t1\t1\t1\t1\t3\t250\t92\t10\t30\t95\t
";

    #[test]
    fn test_parse_tsv_keeps_word_rows() {
        let words = parse_tsv(REPORT);
        assert_eq!(words.len(), 2);
        assert_eq!(
            words[0],
            OcrWord {
                x0: 36,
                y0: 92,
                x1: 124,
                y1: 122,
                text: "Hello".to_string(),
                confidence: 96.063_751,
            }
        );
        assert_eq!(words[1].text, "world!");
    }

    #[test]
    fn test_parse_tsv_tolerates_garbage() {
        assert!(parse_tsv("").is_empty());
        assert!(parse_tsv("not a report\n5\tx").is_empty());
    }

    #[test]
    fn test_missing_binary_is_ocr_error() {
        let recognizer = TesseractRecognizer::new().with_binary("/nonexistent/tesseract-bin");
        let image = DynamicImage::new_rgb8(4, 4);
        let err = recognizer.recognize(&image).unwrap_err();
        assert!(err.is_ocr());
    }
}
