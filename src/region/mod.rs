//! Text-color masks and connected-region labeling

pub mod labeler;
pub mod mask;

pub use labeler::{RegionLabeler, MIN_REGION_PIXELS};
pub use mask::{build_text_mask, BooleanMask};
