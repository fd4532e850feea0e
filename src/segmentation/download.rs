//! Streaming model downloads into the model cache
//!
//! Files are written to a `.part` sibling first and renamed into place once
//! complete, so an interrupted download never leaves a truncated model under
//! the final name.

use crate::error::{BgStripError, Result};
use crate::segmentation::models::{ModelCache, ModelPreset};
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

/// Progress bar abstraction that works with and without CLI features
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    fn new(show_progress: bool, label: &str) -> Self {
        #[cfg(feature = "cli")]
        if show_progress {
            let pb = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb.set_message(label.to_string());
            return Self::Indicatif(pb);
        }
        let _ = (show_progress, label);
        Self::NoOp
    }

    fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {},
        }
    }

    fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {},
        }
    }

    fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }
}

/// Model downloader with progress reporting
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

impl ModelDownloader {
    pub fn new(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .timeout(std::time::Duration::from_secs(1800))
            .build()
            .map_err(|e| BgStripError::network_error("create HTTP client", "-", e))?;
        Ok(Self { client, cache })
    }

    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Fetch a preset into the cache unless it is already there
    pub async fn ensure_preset(&self, preset: ModelPreset, show_progress: bool) -> Result<PathBuf> {
        if self.cache.is_cached(preset) {
            debug!(model = %preset, "Model already cached");
            return Ok(self.cache.model_path(preset));
        }
        self.download_preset(preset, show_progress).await
    }

    /// Download a preset, replacing any cached copy
    pub async fn download_preset(&self, preset: ModelPreset, show_progress: bool) -> Result<PathBuf> {
        let destination = self.cache.model_path(preset);
        info!(model = %preset, url = %preset.url(), "Downloading model");
        self.download_to(&preset.url(), &destination, None, show_progress)
            .await?;
        Ok(destination)
    }

    /// Stream `url` into `destination`, verifying the SHA-256 digest when given
    pub async fn download_to(
        &self,
        url: &str,
        destination: &Path,
        expected_sha256: Option<&str>,
        show_progress: bool,
    ) -> Result<u64> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| BgStripError::file_io_error("create directory", parent, &e))?;
        }

        let partial = partial_path(destination);
        let label = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| url.to_string());
        let progress = ProgressIndicator::new(show_progress, &label);

        let result = self.stream_to_file(url, &partial, &progress).await;
        let downloaded = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&partial);
                return Err(e);
            },
        };

        if !verify_file_integrity(&partial, expected_sha256)? {
            let _ = fs::remove_file(&partial);
            return Err(BgStripError::network_error(
                "verify download",
                url,
                "SHA-256 digest mismatch",
            ));
        }

        fs::rename(&partial, destination)
            .map_err(|e| BgStripError::file_io_error("move downloaded file", destination, &e))?;

        progress.finish_with_message(format!("{} ({} bytes)", label, downloaded));
        info!(path = %destination.display(), bytes = downloaded, "Download complete");
        Ok(downloaded)
    }

    async fn stream_to_file(
        &self,
        url: &str,
        local_path: &Path,
        progress: &ProgressIndicator,
    ) -> Result<u64> {
        debug!(url, path = %local_path.display(), "Starting download");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BgStripError::network_error("download", url, e))?;

        if !response.status().is_success() {
            return Err(BgStripError::network_error(
                "download",
                url,
                format!("HTTP status {}", response.status()),
            ));
        }

        if let Some(total) = response.content_length() {
            progress.set_length(total);
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| BgStripError::file_io_error("create file", local_path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut downloaded = 0u64;
        let mut buffer = vec![0; 8192];

        loop {
            let bytes_read = tokio::io::AsyncReadExt::read(&mut stream, &mut buffer)
                .await
                .map_err(|e| BgStripError::network_error("read download stream", url, e))?;

            if bytes_read == 0 {
                break;
            }

            file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
                .await
                .map_err(|e| BgStripError::file_io_error("write to file", local_path, &e))?;

            downloaded += bytes_read as u64;
            progress.set_position(downloaded);
        }

        file.flush()
            .await
            .map_err(|e| BgStripError::file_io_error("flush file", local_path, &e))?;

        debug!(bytes = downloaded, path = %local_path.display(), "Stream finished");
        Ok(downloaded)
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

/// Check a file's SHA-256 digest; no expected digest always passes
pub fn verify_file_integrity(file_path: &Path, expected_hash: Option<&str>) -> Result<bool> {
    let Some(expected) = expected_hash else {
        return Ok(true);
    };

    let contents = fs::read(file_path).map_err(|e| {
        BgStripError::file_io_error("read file for verification", file_path, &e)
    })?;

    let actual = format!("{:x}", Sha256::digest(&contents));
    if actual.eq_ignore_ascii_case(expected) {
        Ok(true)
    } else {
        warn!(
            path = %file_path.display(),
            expected,
            actual = %actual,
            "File integrity check failed"
        );
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_path_is_sibling() {
        let p = partial_path(Path::new("/cache/models/u2net.onnx"));
        assert_eq!(p, PathBuf::from("/cache/models/u2net.onnx.part"));
    }

    #[test]
    fn test_verify_without_hash_passes() {
        assert!(verify_file_integrity(Path::new("/does/not/exist"), None).unwrap());
    }

    #[test]
    fn test_verify_with_hash() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("model.onnx");
        fs::write(&file, b"hello").unwrap();

        let good = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        assert!(verify_file_integrity(&file, Some(good)).unwrap());
        assert!(verify_file_integrity(&file, Some(&good.to_uppercase())).unwrap());
        assert!(!verify_file_integrity(&file, Some("00")).unwrap());
    }

    #[test]
    fn test_verify_missing_file_with_hash_errors() {
        assert!(verify_file_integrity(Path::new("/does/not/exist"), Some("00")).is_err());
    }

    #[tokio::test]
    async fn test_ensure_preset_skips_cached_model() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_dir(temp.path()).unwrap();
        fs::write(cache.model_path(ModelPreset::U2NetP), b"cached").unwrap();

        let downloader = ModelDownloader::new(cache).unwrap();
        let path = downloader
            .ensure_preset(ModelPreset::U2NetP, false)
            .await
            .unwrap();
        assert_eq!(fs::read(path).unwrap(), b"cached");
    }
}
