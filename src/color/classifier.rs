//! Color-distance keying with optional feathered edges

use crate::color::metric::color_distance;
use crate::types::{ColorPass, PassReport, Raster, RgbColor};
use tracing::{debug, instrument, warn};

/// Turns pixels close to a key color transparent
///
/// Passes run in order over the same raster. A pixel already at alpha 0 is
/// never revisited, so the result of a pass sequence does not depend on
/// which pass removed a pixel first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorMaskClassifier {
    feather: u32,
}

impl ColorMaskClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Width of the partial-transparency ramp beyond the threshold
    #[must_use]
    pub fn with_feather(mut self, feather: u32) -> Self {
        self.feather = feather;
        self
    }

    #[must_use]
    pub fn feather(&self) -> u32 {
        self.feather
    }

    /// Run every pass in order and report per-pass counts
    ///
    /// Feathering applies only to a single-pass run. With more than one
    /// pass the ramp is skipped so no pixel is faded twice.
    #[instrument(skip(self, raster, passes), fields(passes = passes.len(), feather = self.feather))]
    pub fn classify(&self, raster: &mut Raster, passes: &[ColorPass]) -> Vec<PassReport> {
        let feather = if passes.len() > 1 && self.feather > 0 {
            warn!(
                feather = self.feather,
                passes = passes.len(),
                "Feathering is ignored when more than one color pass is configured"
            );
            0
        } else {
            self.feather
        };

        passes
            .iter()
            .enumerate()
            .map(|(index, pass)| Self::apply_pass(raster, index, pass, feather))
            .collect()
    }

    fn apply_pass(raster: &mut Raster, index: usize, pass: &ColorPass, feather: u32) -> PassReport {
        if pass.removes_everything() {
            warn!(
                pass_index = index,
                threshold = pass.threshold,
                "Threshold covers the whole color space, every pixel will be removed"
            );
        }

        let mut removed = 0;
        let mut feathered = 0;

        for pixel in raster.pixels_mut() {
            let alpha = pixel.0[3];
            if alpha == 0 {
                continue;
            }
            let distance = color_distance(RgbColor::from_pixel(pixel), pass.color);
            let next = pixel_alpha(alpha, distance, pass.threshold, feather);
            if next == alpha {
                continue;
            }
            pixel.0[3] = next;
            if next == 0 {
                removed += 1;
            } else {
                feathered += 1;
            }
        }

        debug!(
            pass_index = index,
            color = %pass.color,
            threshold = pass.threshold,
            removed,
            feathered,
            "Color pass applied"
        );

        PassReport {
            pass_index: index,
            color: pass.color,
            threshold: pass.threshold,
            removed,
            feathered,
        }
    }
}

/// New alpha for a pixel at `distance` from the key color
///
/// Inside the threshold the pixel is removed. Within `feather` beyond it
/// the alpha scales linearly from 0 back up to its original value.
#[must_use]
pub fn pixel_alpha(alpha: u8, distance: f64, threshold: u32, feather: u32) -> u8 {
    let threshold = f64::from(threshold);
    if distance <= threshold {
        return 0;
    }
    if feather == 0 {
        return alpha;
    }
    let feather = f64::from(feather);
    if distance <= threshold + feather {
        let scaled = f64::from(alpha) * (distance - threshold) / feather;
        scaled.floor().clamp(0.0, f64::from(alpha)) as u8
    } else {
        alpha
    }
}
