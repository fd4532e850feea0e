//! Core value types shared by the engine stages

use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest Euclidean distance between two RGB colors, rounded down
pub const MAX_THRESHOLD: u32 = 441;

/// Opaque RGB color used as a key or text color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Color channels of an RGBA pixel, alpha ignored
    #[must_use]
    pub fn from_pixel(pixel: &Rgba<u8>) -> Self {
        let [r, g, b, _] = pixel.0;
        Self { r, g, b }
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// One color-removal pass: pixels within `threshold` of `color` become transparent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPass {
    pub color: RgbColor,
    pub threshold: u32,
}

impl ColorPass {
    #[must_use]
    pub const fn new(color: RgbColor, threshold: u32) -> Self {
        Self { color, threshold }
    }

    /// Every pixel is removed at this threshold
    #[must_use]
    pub const fn removes_everything(&self) -> bool {
        self.threshold >= MAX_THRESHOLD
    }
}

/// Axis-aligned rectangle of "keep" pixels with optional OCR metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Pixels belonging to the region. For OCR words this is `width * height`.
    pub pixel_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Region {
    /// Region from inclusive pixel bounds
    #[must_use]
    pub fn from_bounds(min_x: u32, min_y: u32, max_x: u32, max_y: u32, pixel_count: u64) -> Self {
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
            pixel_count,
            text: None,
            confidence: None,
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>, confidence: f32) -> Self {
        self.text = Some(text.into());
        self.confidence = Some(confidence);
        self
    }

    /// Half-open `(x0, y0, x1, y1)` after growing by `padding`, clipped to the image
    #[must_use]
    pub fn padded_bounds(&self, padding: u32, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x0 = self.x.saturating_sub(padding).min(width);
        let y0 = self.y.saturating_sub(padding).min(height);
        let x1 = self
            .x
            .saturating_add(self.width)
            .saturating_add(padding)
            .min(width);
        let y1 = self
            .y
            .saturating_add(self.height)
            .saturating_add(padding)
            .min(height);
        (x0, y0, x1, y1)
    }
}

/// RGBA pixel grid, row-major, top-left origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    image: RgbaImage,
}

impl Raster {
    /// Fully transparent raster
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    #[must_use]
    pub fn from_pixel(width: u32, height: u32, pixel: Rgba<u8>) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, pixel),
        }
    }

    #[must_use]
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Decoded image converted to 8-bit RGBA
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self {
            image: image.to_rgba8(),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    #[must_use]
    pub fn pixel_at(&self, x: u32, y: u32) -> Option<&Rgba<u8>> {
        self.image.get_pixel_checked(x, y)
    }

    pub fn pixel_at_mut(&mut self, x: u32, y: u32) -> Option<&mut Rgba<u8>> {
        self.image.get_pixel_mut_checked(x, y)
    }

    pub fn pixels(&self) -> impl Iterator<Item = &Rgba<u8>> {
        self.image.pixels()
    }

    pub fn pixels_mut(&mut self) -> impl Iterator<Item = &mut Rgba<u8>> {
        self.image.pixels_mut()
    }

    /// Number of pixels with alpha 0
    #[must_use]
    pub fn transparent_count(&self) -> usize {
        self.image.pixels().filter(|p| p.0[3] == 0).count()
    }

    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl From<RgbaImage> for Raster {
    fn from(image: RgbaImage) -> Self {
        Self::from_rgba(image)
    }
}

/// Outcome of a single color pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub pass_index: usize,
    pub color: RgbColor,
    pub threshold: u32,
    /// Pixels this pass made fully transparent
    pub removed: usize,
    /// Pixels this pass left partially transparent
    pub feathered: usize,
}

/// Wall-clock time spent in each stage, in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    pub decode_ms: u64,
    pub segmentation_ms: u64,
    pub text_detection_ms: u64,
    pub classification_ms: u64,
    pub compositing_ms: u64,
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Stage breakdown suitable for a single log line
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "decode {}ms, segmentation {}ms, text {}ms, color {}ms, composite {}ms, total {}ms",
            self.decode_ms,
            self.segmentation_ms,
            self.text_detection_ms,
            self.classification_ms,
            self.compositing_ms,
            self.total_ms
        )
    }
}

/// Result of processing one image
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub raster: Raster,
    /// One entry per color pass, empty outside color mode
    pub pass_reports: Vec<PassReport>,
    /// Regions restored over the segmentation cutout in hybrid mode
    pub regions: Vec<Region>,
    /// Text recognition failed and the cutout was kept without text preservation
    pub text_detection_degraded: bool,
    pub timings: ProcessingTimings,
}

impl ProcessingOutcome {
    #[must_use]
    pub fn new(raster: Raster) -> Self {
        Self {
            raster,
            pass_reports: Vec::new(),
            regions: Vec::new(),
            text_detection_degraded: false,
            timings: ProcessingTimings::default(),
        }
    }

    /// Total pixels removed across all color passes
    #[must_use]
    pub fn removed_pixels(&self) -> usize {
        self.pass_reports.iter().map(|r| r.removed).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_display_is_lowercase_hex() {
        assert_eq!(RgbColor::new(255, 0, 171).to_string(), "#ff00ab");
        assert_eq!(RgbColor::BLACK.to_string(), "#000000");
    }

    #[test]
    fn test_region_from_bounds_is_inclusive() {
        let region = Region::from_bounds(2, 3, 6, 3, 5);
        assert_eq!((region.x, region.y, region.width, region.height), (2, 3, 5, 1));
        assert_eq!(region.pixel_count, 5);
    }

    #[test]
    fn test_padded_bounds_clip_to_image() {
        let region = Region::from_bounds(1, 1, 3, 3, 9);
        assert_eq!(region.padded_bounds(10, 8, 6), (0, 0, 8, 6));
        assert_eq!(region.padded_bounds(1, 8, 6), (0, 0, 5, 5));
        assert_eq!(region.padded_bounds(0, 8, 6), (1, 1, 4, 4));
    }

    #[test]
    fn test_padded_bounds_for_region_outside_image() {
        let region = Region::from_bounds(20, 20, 25, 25, 36);
        let (x0, y0, x1, y1) = region.padded_bounds(2, 10, 10);
        assert!(x0 >= x1 || y0 >= y1);
    }

    #[test]
    fn test_raster_pixel_access_is_bounds_checked() {
        let mut raster = Raster::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        assert!(raster.pixel_at(1, 1).is_some());
        assert!(raster.pixel_at(2, 0).is_none());
        if let Some(p) = raster.pixel_at_mut(0, 1) {
            p.0[3] = 0;
        }
        assert_eq!(raster.transparent_count(), 1);
    }

    #[test]
    fn test_outcome_sums_pass_removals() {
        let mut outcome = ProcessingOutcome::new(Raster::new(1, 1));
        for (i, removed) in [3, 4].into_iter().enumerate() {
            outcome.pass_reports.push(PassReport {
                pass_index: i,
                color: RgbColor::BLACK,
                threshold: 10,
                removed,
                feathered: 0,
            });
        }
        assert_eq!(outcome.removed_pixels(), 7);
    }

    #[test]
    fn test_max_threshold_pass() {
        assert!(ColorPass::new(RgbColor::WHITE, 441).removes_everything());
        assert!(!ColorPass::new(RgbColor::WHITE, 440).removes_everything());
    }
}
