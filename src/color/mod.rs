//! Color distance keying

pub mod classifier;
pub mod metric;
pub mod parse;

pub use classifier::{pixel_alpha, ColorMaskClassifier};
pub use metric::{color_distance, MAX_DISTANCE};
pub use parse::{parse_color, parse_pass};
