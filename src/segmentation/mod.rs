//! AI segmentation: the [`Segmenter`] seam, model presets, caching and
//! the ONNX Runtime backend

pub mod download;
pub mod models;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod preprocessing;

use crate::error::Result;
use image::{DynamicImage, RgbaImage};

pub use download::ModelDownloader;
pub use models::{ModelCache, ModelPreset, ModelSource, PreprocessingConfig};
#[cfg(feature = "onnx")]
pub use onnx::OnnxSegmenter;

/// Produces a same-size cutout with the background already transparent
///
/// Implementations may hold an exclusive inference session, hence `&mut self`.
pub trait Segmenter: Send {
    fn segment(&mut self, image: &DynamicImage) -> Result<RgbaImage>;

    /// Short identifier for logs
    fn name(&self) -> &str;
}
