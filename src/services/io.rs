//! Image I/O operations service

use crate::error::{BgStripError, Result};
use crate::types::Raster;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions accepted as input
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tiff", "tif"];

/// Suffix appended to the input stem for output files
pub const OUTPUT_SUFFIX: &str = "_nobg";

/// Image loading and saving
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an image file
    ///
    /// Decoding goes by extension first and falls back to content sniffing,
    /// so mislabeled files still load. Files whose extension is not a
    /// supported image type are rejected without being read.
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(BgStripError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        if let Some(ext) = path_ref.extension().and_then(|s| s.to_str()) {
            if !Self::is_supported_extension(ext) {
                return Err(BgStripError::unsupported_format(format!(
                    "'{}' has unsupported extension '.{}'",
                    path_ref.display(),
                    ext
                )));
            }
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                debug!(
                    path = %path_ref.display(),
                    error = %e,
                    "Extension-based loading failed, attempting content-based detection"
                );
                let data = std::fs::read(path_ref).map_err(|io_err| {
                    BgStripError::file_io_error("read image data", path_ref, &io_err)
                })?;
                image::load_from_memory(&data).map_err(|content_err| {
                    BgStripError::processing_stage_error(
                        "Image loading",
                        &format!(
                            "extension-based decode failed ({}), content-based decode failed ({})",
                            e, content_err
                        ),
                        Some(&format!("path: {}, size: {} bytes", path_ref.display(), data.len())),
                    )
                })
            },
        }
    }

    /// Decode an in-memory image, format sniffed from content
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        Ok(image::load_from_memory(bytes)?)
    }

    /// Write a raster as PNG, creating parent directories
    pub fn save_png<P: AsRef<Path>>(raster: &Raster, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                BgStripError::file_io_error("create output directory", parent, &e)
            })?;
        }

        raster
            .as_image()
            .save_with_format(path_ref, ImageFormat::Png)
            .map_err(|e| {
                BgStripError::processing_stage_error(
                    "Image save",
                    &format!("failed to encode PNG: {}", e),
                    Some(&format!("path: {}", path_ref.display())),
                )
            })
    }

    /// PNG bytes of a raster
    pub fn encode_png(raster: &Raster) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        raster.as_image().write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }

    #[must_use]
    pub fn is_supported_extension(ext: &str) -> bool {
        let lower = ext.to_ascii_lowercase();
        SUPPORTED_EXTENSIONS.contains(&lower.as_str())
    }

    /// True for paths with a supported image extension
    #[must_use]
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(Self::is_supported_extension)
    }

    /// `<stem>_nobg.png` next to the input, or inside `output_dir` when given
    #[must_use]
    pub fn output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
        let stem = input
            .file_stem()
            .map_or_else(|| "output".into(), |s| s.to_string_lossy());
        let file_name = format!("{}{}.png", stem, OUTPUT_SUFFIX);
        match output_dir {
            Some(dir) => dir.join(file_name),
            None => input.with_file_name(file_name),
        }
    }
}
