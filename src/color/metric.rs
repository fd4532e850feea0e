//! Euclidean distance in RGB space

use crate::types::RgbColor;

/// Distance between black and white, `sqrt(3 * 255^2)`
pub const MAX_DISTANCE: f64 = 441.672_955_930_063_7;

/// Euclidean distance between two colors over R, G and B
#[must_use]
pub fn color_distance(a: RgbColor, b: RgbColor) -> f64 {
    let dr = f64::from(a.r) - f64::from(b.r);
    let dg = f64::from(a.g) - f64::from(b.g);
    let db = f64::from(a.b) - f64::from(b.b);
    (dr * dr + dg * dg + db * db).sqrt()
}
