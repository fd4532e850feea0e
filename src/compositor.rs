//! Restores source pixels inside padded regions of a processed raster

use crate::error::{BgStripError, Result};
use crate::types::{Raster, Region};
use tracing::{debug, instrument};

/// Default margin added around every region
pub const DEFAULT_PADDING: u32 = 10;

/// Copies source pixels back over regions, fully opaque
#[derive(Debug, Clone, Copy)]
pub struct MaskCompositor {
    padding: u32,
}

impl Default for MaskCompositor {
    fn default() -> Self {
        Self {
            padding: DEFAULT_PADDING,
        }
    }
}

impl MaskCompositor {
    /// Compositor growing each region by `padding` pixels on every side
    #[must_use]
    pub fn new(padding: u32) -> Self {
        Self { padding }
    }

    /// Margin added around regions
    #[must_use]
    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// Restore `source` inside every padded region of `base`
    ///
    /// Restored pixels take the source RGB with alpha 255, so repeating the
    /// call with the same regions changes nothing.
    #[instrument(skip_all, fields(regions = regions.len(), padding = self.padding))]
    pub fn composite(&self, mut base: Raster, source: &Raster, regions: &[Region]) -> Result<Raster> {
        if base.dimensions() != source.dimensions() {
            let (bw, bh) = base.dimensions();
            let (sw, sh) = source.dimensions();
            return Err(BgStripError::processing_stage_error(
                "Compositing",
                &format!("base is {}x{} but source is {}x{}", bw, bh, sw, sh),
                None,
            ));
        }

        let (width, height) = base.dimensions();
        let mut restored = 0usize;

        for region in regions {
            let (x0, y0, x1, y1) = region.padded_bounds(self.padding, width, height);
            for y in y0..y1 {
                for x in x0..x1 {
                    let Some(src) = source.pixel_at(x, y) else {
                        continue;
                    };
                    let [r, g, b, _] = src.0;
                    if let Some(dst) = base.pixel_at_mut(x, y) {
                        dst.0 = [r, g, b, 255];
                        restored += 1;
                    }
                }
            }
        }

        debug!(restored, "Regions composited onto base raster");
        Ok(base)
    }
}
