use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Image processing error: {0}")]
    ImageProcessingError(String),
    #[error("OCR error: {0}")]
    OcrError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for VerifyError {
    fn from(err: std::io::Error) -> Self {
        VerifyError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for VerifyError {
    fn from(err: serde_json::Error) -> Self {
        VerifyError::SerializationError(err.to_string())
    }
}
