//! Boolean masks over raster coordinates

use crate::color::metric::color_distance;
use crate::types::{Raster, RgbColor};

/// Width x height grid of booleans, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanMask {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl BooleanMask {
    /// All-false mask
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
        }
    }

    /// Mask with every cell computed from its coordinates
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                mask.set(x, y, f(x, y));
            }
        }
        mask
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height)
            .then(|| y as usize * self.width as usize + x as usize)
    }

    /// Out-of-range coordinates read as false
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.index(x, y)
            .and_then(|i| self.cells.get(i).copied())
            .unwrap_or(false)
    }

    /// Out-of-range coordinates are ignored
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        if let Some(cell) = self.index(x, y).and_then(|i| self.cells.get_mut(i)) {
            *cell = value;
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

/// Mark pixels whose RGB lies within `threshold` of any text color
///
/// Alpha is not consulted. An empty color list yields an all-false mask.
#[must_use]
pub fn build_text_mask(raster: &Raster, text_colors: &[RgbColor], threshold: u32) -> BooleanMask {
    let limit = f64::from(threshold);
    BooleanMask::from_fn(raster.width(), raster.height(), |x, y| {
        raster.pixel_at(x, y).is_some_and(|pixel| {
            let color = RgbColor::from_pixel(pixel);
            text_colors
                .iter()
                .any(|&text| color_distance(color, text) <= limit)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_get_set_and_bounds() {
        let mut mask = BooleanMask::new(3, 2);
        mask.set(2, 1, true);
        mask.set(5, 5, true);
        assert!(mask.get(2, 1));
        assert!(!mask.get(5, 5));
        assert_eq!(mask.count(), 1);
    }

    #[test]
    fn test_text_mask_matches_any_color() {
        let mut raster = Raster::from_pixel(3, 1, Rgba([255, 255, 255, 255]));
        if let Some(p) = raster.pixel_at_mut(0, 0) {
            *p = Rgba([5, 5, 5, 255]);
        }
        if let Some(p) = raster.pixel_at_mut(1, 0) {
            *p = Rgba([250, 0, 0, 255]);
        }
        let colors = [RgbColor::BLACK, RgbColor::new(255, 0, 0)];
        let mask = build_text_mask(&raster, &colors, 20);
        assert!(mask.get(0, 0));
        assert!(mask.get(1, 0));
        assert!(!mask.get(2, 0));
    }

    #[test]
    fn test_text_mask_ignores_alpha() {
        let raster = Raster::from_pixel(2, 2, Rgba([0, 0, 0, 0]));
        let mask = build_text_mask(&raster, &[RgbColor::BLACK], 60);
        assert_eq!(mask.count(), 4);
    }

    #[test]
    fn test_text_mask_without_colors_is_empty() {
        let raster = Raster::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        assert_eq!(build_text_mask(&raster, &[], 441).count(), 0);
    }
}
