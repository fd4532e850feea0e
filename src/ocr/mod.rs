//! Text recognition seam and conversion of recognized words into regions

pub mod tesseract;

use crate::error::Result;
use crate::types::Region;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

pub use tesseract::TesseractRecognizer;

/// One recognized word with its bounding box in image pixels
///
/// `x1`/`y1` are exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
    pub text: String,
    /// 0-100
    pub confidence: f32,
}

/// Finds words in an image
pub trait TextRecognizer: Send {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrWord>>;

    fn name(&self) -> &str;
}

/// Regions for words with non-empty text and at least `min_confidence`
///
/// Boxes are clipped to the image; boxes with no area left are dropped.
#[must_use]
pub fn words_to_regions(
    words: &[OcrWord],
    min_confidence: f32,
    width: u32,
    height: u32,
) -> Vec<Region> {
    words
        .iter()
        .filter(|word| !word.text.trim().is_empty() && word.confidence >= min_confidence)
        .filter_map(|word| {
            let x0 = word.x0.min(width);
            let y0 = word.y0.min(height);
            let x1 = word.x1.min(width);
            let y1 = word.y1.min(height);
            if x1 <= x0 || y1 <= y0 {
                return None;
            }
            let (w, h) = (x1 - x0, y1 - y0);
            Some(Region {
                x: x0,
                y: y0,
                width: w,
                height: h,
                pixel_count: u64::from(w) * u64::from(h),
                text: Some(word.text.trim().to_string()),
                confidence: Some(word.confidence),
            })
        })
        .collect()
}
