//! Error types for background removal operations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgStripError>;

/// Errors that can occur while removing backgrounds
#[derive(Error, Debug)]
pub enum BgStripError {
    /// I/O errors (file reading, writing, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding/encoding errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unsupported image format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Segmentation backend failure (model inference, output shape)
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    /// Text recognizer failure
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Model loading or resolution errors
    #[error("Model error: {0}")]
    Model(String),

    /// Model download errors
    #[error("Network error: {0}")]
    Network(String),

    /// Errors raised while running a pipeline stage
    #[error("Processing error: {0}")]
    Processing(String),

    /// Internal errors that shouldn't happen
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgStripError {
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(msg.into())
    }

    pub fn ocr<S: Into<String>>(msg: S) -> Self {
        Self::Ocr(msg.into())
    }

    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// File I/O error carrying the operation and path that failed
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Configuration error naming the parameter, the rejected value, and the valid range
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Network error naming the resource being fetched
    pub fn network_error(operation: &str, url: &str, details: impl std::fmt::Display) -> Self {
        Self::Network(format!("Failed to {} from '{}': {}", operation, url, details))
    }

    /// Model error with a hint on how to obtain the model
    pub fn model_not_found(model: &str, suggestion: &str) -> Self {
        Self::Model(format!("Model '{}' not available. {}", model, suggestion))
    }

    /// Stage failure with the stage name and input details
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let message = match input_info {
            Some(info) => format!("{} failed: {} (input: {})", stage, details, info),
            None => format!("{} failed: {}", stage, details),
        };
        Self::Processing(message)
    }

    /// True when the error came from the text recognizer
    #[must_use]
    pub fn is_ocr(&self) -> bool {
        matches!(self, Self::Ocr(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_value_error_names_parameter_and_range() {
        let err = BgStripError::config_value_error("threshold", 500, "0-441");
        let message = err.to_string();
        assert!(message.contains("Invalid threshold: 500"));
        assert!(message.contains("0-441"));
    }

    #[test]
    fn test_file_io_error_keeps_kind_and_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = BgStripError::file_io_error("read image", "/tmp/cat.png", &io);
        match &err {
            BgStripError::Io(inner) => assert_eq!(inner.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected variant: {other:?}"),
        }
        assert!(err.to_string().contains("/tmp/cat.png"));
        assert!(err.to_string().contains("read image"));
    }

    #[test]
    fn test_processing_stage_error_formats() {
        let with_info = BgStripError::processing_stage_error("Compositing", "size mismatch", Some("4x4"));
        assert_eq!(
            with_info.to_string(),
            "Processing error: Compositing failed: size mismatch (input: 4x4)"
        );

        let without = BgStripError::processing_stage_error("Labeling", "empty mask", None);
        assert_eq!(without.to_string(), "Processing error: Labeling failed: empty mask");
    }

    #[test]
    fn test_ocr_classification() {
        assert!(BgStripError::ocr("tesseract missing").is_ocr());
        assert!(!BgStripError::segmentation("bad tensor").is_ocr());
    }

    #[test]
    fn test_model_not_found_suggestion() {
        let err = BgStripError::model_not_found("u2net", "Run with --only-download first");
        assert!(err.to_string().contains("u2net"));
        assert!(err.to_string().contains("--only-download"));
    }
}
