//! ONNX Runtime segmenter
//!
//! Loads a salient-object model (`U2Net` family, `ISNet`) into an ONNX Runtime
//! session and turns its single-channel prediction into an RGBA cutout.

use crate::config::{ExecutionProvider, SegmentationConfig};
use crate::error::{BgStripError, Result};
use crate::segmentation::models::{ModelCache, PreprocessingConfig};
use crate::segmentation::preprocessing::{ImagePreprocessor, MaskPostprocessor};
use crate::segmentation::Segmenter;
use image::{DynamicImage, RgbaImage};
use ndarray::Array4;
use ort::ep::{
    CoreML as CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    CUDA as CUDAExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, builder::SessionBuilder, Session};
use ort::value::Value;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Segmenter backed by an ONNX Runtime session
#[derive(Debug)]
pub struct OnnxSegmenter {
    session: Session,
    preprocessing: PreprocessingConfig,
    name: String,
}

impl OnnxSegmenter {
    /// Resolve the configured model through the cache and load it
    pub fn from_config(cache: &ModelCache, config: &SegmentationConfig) -> Result<Self> {
        let path = cache.resolve(&config.model)?;
        Self::from_file(&path, config.model.preprocessing(), config)
    }

    /// Load an ONNX model file
    #[instrument(skip(preprocessing, config), fields(provider = %config.execution_provider))]
    pub fn from_file(
        path: &Path,
        preprocessing: PreprocessingConfig,
        config: &SegmentationConfig,
    ) -> Result<Self> {
        let load_start = Instant::now();
        let model_data = std::fs::read(path)
            .map_err(|e| BgStripError::file_io_error("read model", path, &e))?;

        let builder = Session::builder()
            .map_err(|e| BgStripError::model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| BgStripError::model(format!("Failed to set optimization level: {e}")))?;

        let builder = Self::configure_providers(builder, config.execution_provider)?;

        let intra_threads = if config.threads > 0 {
            config.threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4)
        };

        let session = builder
            .with_intra_threads(intra_threads)
            .map_err(|e| BgStripError::model(format!("Failed to set intra threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| BgStripError::model(format!("Failed to load model {}: {e}", path.display())))?;

        let name = path
            .file_stem()
            .map_or_else(|| "onnx".to_string(), |s| s.to_string_lossy().into_owned());

        info!(
            model = %name,
            threads = intra_threads,
            input_size = preprocessing.target_size,
            load_ms = load_start.elapsed().as_millis() as u64,
            "Segmentation model loaded"
        );

        Ok(Self {
            session,
            preprocessing,
            name,
        })
    }

    fn configure_providers(
        builder: SessionBuilder,
        provider: ExecutionProvider,
    ) -> Result<SessionBuilder> {
        let cuda_available =
            || OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available = || {
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false)
        };

        let providers = match provider {
            ExecutionProvider::Cpu => Vec::new(),
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();
                if cuda_available() {
                    info!("CUDA execution provider is available and will be used");
                    providers.push(CUDAExecutionProvider::default().build());
                }
                if coreml_available() {
                    info!("CoreML execution provider is available and will be used");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    debug!("No hardware acceleration available, using CPU");
                }
                providers
            },
            ExecutionProvider::Cuda => {
                if cuda_available() {
                    vec![CUDAExecutionProvider::default().build()]
                } else {
                    warn!("CUDA execution provider requested but not available, falling back to CPU");
                    Vec::new()
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available() {
                    vec![CoreMLExecutionProvider::default().with_subgraphs(true).build()]
                } else {
                    warn!("CoreML execution provider requested but not available, falling back to CPU");
                    Vec::new()
                }
            },
        };

        if providers.is_empty() {
            return Ok(builder);
        }
        builder
            .with_execution_providers(providers)
            .map_err(|e| BgStripError::model(format!("Failed to set execution providers: {e}")))
    }

    /// Execution providers with availability and a short description
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        vec![
            (
                "cpu".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "cuda".to_string(),
                OrtExecutionProvider::is_available(&CUDAExecutionProvider::default())
                    .unwrap_or(false),
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "coreml".to_string(),
                OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                    .unwrap_or(false),
                "Apple Silicon acceleration via CoreML".to_string(),
            ),
        ]
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let input_value = Value::from_array(input.clone())
            .map_err(|e| BgStripError::segmentation(format!("Failed to convert input tensor: {e}")))?;

        let inference_start = Instant::now();
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|e| BgStripError::segmentation(format!("ONNX inference failed: {e}")))?;
        debug!(
            inference_ms = inference_start.elapsed().as_millis() as u64,
            "Inference finished"
        );

        // U2Net emits several side outputs; the fused prediction comes first
        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| BgStripError::segmentation("Model produced no outputs"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| BgStripError::segmentation("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| BgStripError::segmentation(format!("Failed to extract output tensor: {e}")))?;

        let shape = output_tensor.shape().to_vec();
        let data = output_tensor.view().to_owned().into_raw_vec_and_offset().0;
        let dims = match shape.as_slice() {
            [n, c, h, w] => (*n, *c, *h, *w),
            [n, h, w] => (*n, 1, *h, *w),
            [h, w] => (1, 1, *h, *w),
            other => {
                return Err(BgStripError::segmentation(format!(
                    "Unsupported output tensor shape {:?}",
                    other
                )))
            },
        };

        Array4::from_shape_vec(dims, data)
            .map_err(|e| BgStripError::segmentation(format!("Failed to reshape output tensor: {e}")))
    }
}

impl Segmenter for OnnxSegmenter {
    #[instrument(skip_all, fields(model = %self.name))]
    fn segment(&mut self, image: &DynamicImage) -> Result<RgbaImage> {
        let dimensions = (image.width(), image.height());
        let (input, letterbox) = ImagePreprocessor::preprocess(image, &self.preprocessing)?;
        let prediction = self.infer(&input)?;
        let mask = MaskPostprocessor::tensor_to_mask(&prediction.view(), &letterbox, dimensions)?;
        MaskPostprocessor::apply_mask(image, &mask)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
