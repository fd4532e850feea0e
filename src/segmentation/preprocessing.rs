//! Letterboxed model input tensors and the inverse mapping back to image space

use crate::error::{BgStripError, Result};
use crate::segmentation::models::PreprocessingConfig;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage, RgbaImage};
use ndarray::{Array4, ArrayView4};

/// Fill around the resized image
const PADDING_COLOR: [u8; 3] = [255, 255, 255];

/// Placement of the resized image inside the square model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub target_size: u32,
}

impl Letterbox {
    /// Aspect-preserving fit of `width x height` into a `target_size` square
    pub fn fit(width: u32, height: u32, target_size: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(BgStripError::processing(format!(
                "Cannot letterbox an empty {}x{} image",
                width, height
            )));
        }
        if target_size == 0 {
            return Err(BgStripError::invalid_config("Model input size must be positive"));
        }

        let target = target_size as f32;
        let scale = (target / width as f32).min(target / height as f32);
        let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, target_size);
        let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, target_size);

        Ok(Self {
            scale,
            offset_x: (target_size - scaled_width) / 2,
            offset_y: (target_size - scaled_height) / 2,
            scaled_width,
            scaled_height,
            target_size,
        })
    }

    /// Tensor coordinate for an original-image pixel
    #[must_use]
    pub fn to_tensor(&self, x: u32, y: u32) -> (u32, u32) {
        let sx = ((x as f32 * self.scale).round() as u32).min(self.scaled_width.saturating_sub(1));
        let sy = ((y as f32 * self.scale).round() as u32).min(self.scaled_height.saturating_sub(1));
        (sx + self.offset_x, sy + self.offset_y)
    }
}

pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// NCHW float tensor for the model plus the letterbox used to build it
    pub fn preprocess(
        image: &DynamicImage,
        config: &PreprocessingConfig,
    ) -> Result<(Array4<f32>, Letterbox)> {
        let rgb_image = image.to_rgb8();
        let (width, height) = rgb_image.dimensions();
        let letterbox = Letterbox::fit(width, height, config.target_size)?;

        let resized = image::imageops::resize(
            &rgb_image,
            letterbox.scaled_width,
            letterbox.scaled_height,
            image::imageops::FilterType::Triangle,
        );

        let mut canvas: RgbImage = ImageBuffer::from_pixel(
            config.target_size,
            config.target_size,
            Rgb(PADDING_COLOR),
        );
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(letterbox.offset_x),
            i64::from(letterbox.offset_y),
        );

        Ok((Self::canvas_to_tensor(&canvas, config), letterbox))
    }

    fn canvas_to_tensor(canvas: &RgbImage, config: &PreprocessingConfig) -> Array4<f32> {
        let (w, h) = canvas.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));

        for (x, y, pixel) in canvas.enumerate_pixels() {
            for channel in 0..3 {
                let value = pixel.0.get(channel).copied().unwrap_or(0);
                let mean = config.normalization_mean.get(channel).copied().unwrap_or(0.0);
                let std = config.normalization_std.get(channel).copied().unwrap_or(1.0);
                if let Some(slot) = tensor.get_mut([0, channel, y as usize, x as usize]) {
                    *slot = (f32::from(value) / 255.0 - mean) / std;
                }
            }
        }

        tensor
    }
}

pub struct MaskPostprocessor;

impl MaskPostprocessor {
    /// Min-max normalize channel 0 of a `[1, C, H, W]` prediction and map it to
    /// the original image size
    pub fn tensor_to_mask(
        tensor: &ArrayView4<'_, f32>,
        letterbox: &Letterbox,
        original_dimensions: (u32, u32),
    ) -> Result<GrayImage> {
        let shape = tensor.shape();
        let (batch, channels, mask_h, mask_w) = match shape {
            [b, c, h, w] => (*b, *c, *h, *w),
            _ => return Err(BgStripError::segmentation("Output tensor must be 4-dimensional")),
        };
        if batch != 1 || channels == 0 {
            return Err(BgStripError::segmentation(format!(
                "Unexpected output tensor shape {:?}",
                shape
            )));
        }

        let prediction = tensor.index_axis(ndarray::Axis(0), 0);
        let prediction = prediction.index_axis(ndarray::Axis(0), 0);

        let (min, max) = prediction
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = max - min;
        let normalize = |v: f32| {
            if range > f32::EPSILON {
                (v - min) / range
            } else {
                v.clamp(0.0, 1.0)
            }
        };

        let (width, height) = original_dimensions;
        let mask = GrayImage::from_fn(width, height, |x, y| {
            let (tx, ty) = letterbox.to_tensor(x, y);
            let value = if (tx as usize) < mask_w && (ty as usize) < mask_h {
                prediction
                    .get([ty as usize, tx as usize])
                    .copied()
                    .map_or(0.0, normalize)
            } else {
                0.0
            };
            Luma([(value.clamp(0.0, 1.0) * 255.0).round() as u8])
        });

        Ok(mask)
    }

    /// Cutout with alpha taken from the mask; fully masked pixels become transparent black
    pub fn apply_mask(image: &DynamicImage, mask: &GrayImage) -> Result<RgbaImage> {
        let mut rgba = image.to_rgba8();
        if rgba.dimensions() != mask.dimensions() {
            return Err(BgStripError::segmentation(format!(
                "Mask is {:?} but image is {:?}",
                mask.dimensions(),
                rgba.dimensions()
            )));
        }

        for (pixel, mask_value) in rgba.pixels_mut().zip(mask.pixels()) {
            let alpha = mask_value.0[0];
            if alpha == 0 {
                pixel.0 = [0, 0, 0, 0];
            } else {
                pixel.0[3] = alpha;
            }
        }

        Ok(rgba)
    }
}
