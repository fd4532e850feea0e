//! 8-connected component labeling over boolean masks

use crate::region::mask::BooleanMask;
use crate::types::Region;
use std::collections::VecDeque;
use tracing::{debug, instrument};

/// Components smaller than this are treated as noise
pub const MIN_REGION_PIXELS: usize = 50;

const NEIGHBORS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Flood-fill labeler emitting one bounding box per component
#[derive(Debug, Clone, Copy)]
pub struct RegionLabeler {
    min_pixels: usize,
}

impl Default for RegionLabeler {
    fn default() -> Self {
        Self {
            min_pixels: MIN_REGION_PIXELS,
        }
    }
}

impl RegionLabeler {
    /// Labeler keeping components of at least [`MIN_REGION_PIXELS`]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the minimum component size
    #[must_use]
    pub fn with_min_pixels(mut self, min_pixels: usize) -> Self {
        self.min_pixels = min_pixels;
        self
    }

    /// Minimum component size in pixels
    #[must_use]
    pub fn min_pixels(&self) -> usize {
        self.min_pixels
    }

    /// Bounding boxes of all components with at least `min_pixels` pixels
    ///
    /// Regions come out in row-major order of each component's first pixel.
    #[instrument(skip_all, fields(width = mask.width(), height = mask.height()))]
    pub fn label(&self, mask: &BooleanMask) -> Vec<Region> {
        let width = mask.width();
        let height = mask.height();
        let mut visited = vec![false; width as usize * height as usize];
        let mut regions = Vec::new();
        let mut discarded = 0usize;

        for y in 0..height {
            for x in 0..width {
                let idx = y as usize * width as usize + x as usize;
                if !mask.get(x, y) || visited.get(idx).copied().unwrap_or(true) {
                    continue;
                }
                let component = flood_component(mask, &mut visited, x, y);
                if component.pixels >= self.min_pixels {
                    regions.push(Region::from_bounds(
                        component.min_x,
                        component.min_y,
                        component.max_x,
                        component.max_y,
                        component.pixels as u64,
                    ));
                } else {
                    discarded += 1;
                }
            }
        }

        debug!(
            kept = regions.len(),
            discarded,
            min_pixels = self.min_pixels,
            "Connected components labeled"
        );
        regions
    }
}

struct Component {
    pixels: usize,
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

fn flood_component(mask: &BooleanMask, visited: &mut [bool], seed_x: u32, seed_y: u32) -> Component {
    let width = mask.width();
    let height = mask.height();
    let mut component = Component {
        pixels: 0,
        min_x: seed_x,
        min_y: seed_y,
        max_x: seed_x,
        max_y: seed_y,
    };

    let mut queue = VecDeque::new();
    if let Some(v) = visited.get_mut(seed_y as usize * width as usize + seed_x as usize) {
        *v = true;
    }
    queue.push_back((seed_x, seed_y));

    while let Some((x, y)) = queue.pop_front() {
        component.pixels += 1;
        component.min_x = component.min_x.min(x);
        component.min_y = component.min_y.min(y);
        component.max_x = component.max_x.max(x);
        component.max_y = component.max_y.max(y);

        for (dx, dy) in NEIGHBORS {
            let nx = i64::from(x) + dx;
            let ny = i64::from(y) + dy;
            if nx < 0 || ny < 0 || nx >= i64::from(width) || ny >= i64::from(height) {
                continue;
            }
            let (nx, ny) = (nx as u32, ny as u32);
            if !mask.get(nx, ny) {
                continue;
            }
            let idx = ny as usize * width as usize + nx as usize;
            if let Some(seen) = visited.get_mut(idx) {
                if !*seen {
                    *seen = true;
                    queue.push_back((nx, ny));
                }
            }
        }
    }

    component
}
