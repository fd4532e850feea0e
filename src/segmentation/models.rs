//! Segmentation model presets, sources and the on-disk model cache

use crate::error::{BgStripError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const RELEASE_BASE_URL: &str = "https://github.com/danielgatis/rembg/releases/download/v0.0.0";

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "BGSTRIP_CACHE_DIR";

/// Input geometry and normalization expected by a model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Square input edge in pixels
    pub target_size: u32,
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        ModelPreset::default().preprocessing()
    }
}

/// Known downloadable segmentation models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelPreset {
    /// General purpose salient object model
    #[default]
    #[serde(rename = "u2net")]
    U2Net,
    /// Lightweight variant of `U2Net`
    #[serde(rename = "u2netp")]
    U2NetP,
    /// Pruned `U2Net` with a smaller footprint
    #[serde(rename = "silueta")]
    Silueta,
    /// `ISNet` trained for general use, 1024px input
    #[serde(rename = "isnet-general-use")]
    IsNetGeneralUse,
}

impl ModelPreset {
    pub const ALL: [Self; 4] = [
        Self::U2Net,
        Self::U2NetP,
        Self::Silueta,
        Self::IsNetGeneralUse,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::U2Net => "u2net",
            Self::U2NetP => "u2netp",
            Self::Silueta => "silueta",
            Self::IsNetGeneralUse => "isnet-general-use",
        }
    }

    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.onnx", self.name())
    }

    #[must_use]
    pub fn url(self) -> String {
        format!("{}/{}", RELEASE_BASE_URL, self.file_name())
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::U2Net => "U2-Net general salient object segmentation (~170 MB)",
            Self::U2NetP => "U2-Net lightweight variant (~4.5 MB)",
            Self::Silueta => "U2-Net pruned for size (~43 MB)",
            Self::IsNetGeneralUse => "ISNet general use, high resolution (~170 MB)",
        }
    }

    #[must_use]
    pub fn preprocessing(self) -> PreprocessingConfig {
        match self {
            Self::U2Net | Self::U2NetP | Self::Silueta => PreprocessingConfig {
                target_size: 320,
                normalization_mean: [0.485, 0.456, 0.406],
                normalization_std: [0.229, 0.224, 0.225],
            },
            Self::IsNetGeneralUse => PreprocessingConfig {
                target_size: 1024,
                normalization_mean: [0.5, 0.5, 0.5],
                normalization_std: [1.0, 1.0, 1.0],
            },
        }
    }
}

impl fmt::Display for ModelPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelPreset {
    type Err = BgStripError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|preset| preset.name() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|p| p.name()).collect();
                BgStripError::invalid_config(format!(
                    "Unknown model '{}'. Available models: {}",
                    s,
                    known.join(", ")
                ))
            })
    }
}

/// Where the segmentation model comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ModelSource {
    /// Named preset, resolved through the model cache
    Preset(ModelPreset),
    /// Local ONNX file with the given preprocessing
    File {
        path: PathBuf,
        #[serde(default)]
        preprocessing: PreprocessingConfig,
    },
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::Preset(ModelPreset::default())
    }
}

impl ModelSource {
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Preset(preset) => preset.name().to_string(),
            Self::File { path, .. } => path.display().to_string(),
        }
    }

    #[must_use]
    pub fn preprocessing(&self) -> PreprocessingConfig {
        match self {
            Self::Preset(preset) => preset.preprocessing(),
            Self::File { preprocessing, .. } => *preprocessing,
        }
    }
}

/// A model file present in the cache
#[derive(Debug, Clone)]
pub struct CachedModelInfo {
    pub preset: ModelPreset,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Model cache manager
///
/// Models live as flat `<name>.onnx` files under the cache directory:
/// `$BGSTRIP_CACHE_DIR/models` when set, else the platform cache dir
/// (`~/.cache/bgstrip/models` on Linux).
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Cache at the default location, created if missing
    pub fn new() -> Result<Self> {
        Self::with_dir(Self::default_cache_dir()?)
    }

    /// Cache rooted at an explicit models directory, created if missing
    pub fn with_dir<P: Into<PathBuf>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|e| {
                BgStripError::file_io_error("create cache directory", &cache_dir, &e)
            })?;
        }
        Ok(Self { cache_dir })
    }

    fn default_cache_dir() -> Result<PathBuf> {
        if let Ok(cache_override) = std::env::var(CACHE_DIR_ENV) {
            return Ok(PathBuf::from(cache_override).join("models"));
        }

        Ok(dirs::cache_dir()
            .ok_or_else(|| {
                BgStripError::invalid_config(format!(
                    "Failed to determine cache directory. Set {} environment variable.",
                    CACHE_DIR_ENV
                ))
            })?
            .join("bgstrip")
            .join("models"))
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    #[must_use]
    pub fn model_path(&self, preset: ModelPreset) -> PathBuf {
        self.cache_dir.join(preset.file_name())
    }

    /// A zero-length file counts as missing
    #[must_use]
    pub fn is_cached(&self, preset: ModelPreset) -> bool {
        fs::metadata(self.model_path(preset))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Every preset with a model file in the cache
    pub fn scan_cached_models(&self) -> Result<Vec<CachedModelInfo>> {
        let mut found = Vec::new();
        for preset in ModelPreset::ALL {
            let path = self.model_path(preset);
            match fs::metadata(&path) {
                Ok(meta) if meta.is_file() && meta.len() > 0 => found.push(CachedModelInfo {
                    preset,
                    path,
                    size_bytes: meta.len(),
                }),
                Ok(_) => {},
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => return Err(BgStripError::file_io_error("inspect cached model", &path, &e)),
            }
        }
        Ok(found)
    }

    /// Local path for a model source, failing if the model is absent
    pub fn resolve(&self, source: &ModelSource) -> Result<PathBuf> {
        match source {
            ModelSource::Preset(preset) => {
                if self.is_cached(*preset) {
                    Ok(self.model_path(*preset))
                } else {
                    Err(BgStripError::model_not_found(
                        preset.name(),
                        &format!(
                            "Download it with: bgstrip --only-download --model {}",
                            preset.name()
                        ),
                    ))
                }
            },
            ModelSource::File { path, .. } => {
                if path.is_file() {
                    Ok(path.clone())
                } else {
                    Err(BgStripError::model(format!(
                        "Model file not found: {}",
                        path.display()
                    )))
                }
            },
        }
    }
}

/// Format file size in human-readable format
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS.get(unit_index).unwrap_or(&"B");
    if unit_index == 0 {
        format!("{} {}", bytes, unit)
    } else {
        format!("{:.1} {}", size, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_preset_names_round_trip_through_from_str() {
        for preset in ModelPreset::ALL {
            assert_eq!(preset.name().parse::<ModelPreset>().unwrap(), preset);
        }
        assert!("birefnet".parse::<ModelPreset>().is_err());
    }

    #[test]
    fn test_preset_urls_and_sizes() {
        assert_eq!(
            ModelPreset::U2Net.url(),
            "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net.onnx"
        );
        assert_eq!(ModelPreset::Silueta.preprocessing().target_size, 320);
        assert_eq!(ModelPreset::IsNetGeneralUse.preprocessing().target_size, 1024);
        assert_eq!(
            ModelPreset::IsNetGeneralUse.preprocessing().normalization_std,
            [1.0, 1.0, 1.0]
        );
    }

    #[test]
    fn test_cache_scan_ignores_empty_files() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_dir(temp.path().join("models")).unwrap();
        assert!(cache.cache_dir().exists());

        fs::write(cache.model_path(ModelPreset::U2NetP), b"onnx").unwrap();
        fs::write(cache.model_path(ModelPreset::Silueta), b"").unwrap();

        let cached = cache.scan_cached_models().unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].preset, ModelPreset::U2NetP);
        assert_eq!(cached[0].size_bytes, 4);
        assert!(!cache.is_cached(ModelPreset::Silueta));
    }

    #[test]
    fn test_resolve_reports_missing_preset() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_dir(temp.path()).unwrap();
        let err = cache
            .resolve(&ModelSource::Preset(ModelPreset::U2Net))
            .unwrap_err();
        assert!(err.to_string().contains("--only-download"));

        let missing = ModelSource::File {
            path: temp.path().join("nope.onnx"),
            preprocessing: PreprocessingConfig::default(),
        };
        assert!(cache.resolve(&missing).is_err());
    }

    #[test]
    fn test_model_source_serde_shape() {
        let json = serde_json::to_string(&ModelSource::Preset(ModelPreset::IsNetGeneralUse)).unwrap();
        assert_eq!(json, r#"{"type":"preset","value":"isnet-general-use"}"#);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
