use crate::models::OcrOutput;
use crate::utils::VerifyError;
use async_trait::async_trait;

/// Any text recognizer able to turn receipt image bytes into text plus a
/// confidence in `[0, 1]`.
#[async_trait]
pub trait OcrClient: Send + Sync {
    fn name(&self) -> &str;

    async fn extract_text(&self, image_data: &[u8]) -> Result<OcrOutput, VerifyError>;
}

/// Returns the same, already recognized text for every image.
#[derive(Debug, Clone)]
pub struct StaticOcrClient {
    output: OcrOutput,
}

impl StaticOcrClient {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        StaticOcrClient {
            output: OcrOutput {
                text: text.into(),
                confidence,
                blocks: Vec::new(),
            },
        }
    }
}

#[async_trait]
impl OcrClient for StaticOcrClient {
    fn name(&self) -> &str {
        "static"
    }

    async fn extract_text(&self, _image_data: &[u8]) -> Result<OcrOutput, VerifyError> {
        Ok(self.output.clone())
    }
}

/// Recognizes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOcrClient;

#[async_trait]
impl OcrClient for NoopOcrClient {
    fn name(&self) -> &str {
        "noop"
    }

    async fn extract_text(&self, _image_data: &[u8]) -> Result<OcrOutput, VerifyError> {
        Ok(OcrOutput::empty())
    }
}

#[cfg(feature = "tesseract")]
pub use self::tess::TesseractOcrClient;

#[cfg(feature = "tesseract")]
mod tess {
    use super::OcrClient;
    use crate::models::{OcrBlock, OcrOutput};
    use crate::utils::VerifyError;
    use async_trait::async_trait;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tesseract::Tesseract;

    /// Local Tesseract recognition; Croatian plus English by default.
    #[derive(Debug, Clone)]
    pub struct TesseractOcrClient {
        language: String,
        datapath: Option<String>,
    }

    impl TesseractOcrClient {
        pub fn new(language: impl Into<String>, datapath: Option<String>) -> Self {
            TesseractOcrClient {
                language: language.into(),
                datapath,
            }
        }

        fn recognize(
            image_data: &[u8],
            language: &str,
            datapath: Option<&str>,
        ) -> Result<OcrOutput, VerifyError> {
            let mut temp_file = NamedTempFile::new().map_err(|e| {
                VerifyError::OcrError(format!("Failed to create temporary file: {}", e))
            })?;
            temp_file.write_all(image_data).map_err(|e| {
                VerifyError::OcrError(format!("Failed to write to temporary file: {}", e))
            })?;
            let path_str = temp_file.path().to_str().ok_or_else(|| {
                VerifyError::OcrError("Could not convert path to string".to_string())
            })?;

            let mut tess = Tesseract::new(datapath, Some(language))
                .map_err(|e| VerifyError::OcrError(format!("Failed to initialize Tesseract: {}", e)))?
                .set_image(path_str)
                .map_err(|e| VerifyError::OcrError(format!("Failed to set image: {}", e)))?;

            let text = tess
                .get_text()
                .map_err(|e| VerifyError::OcrError(format!("Failed to extract text: {}", e)))?;
            let confidence = (tess.mean_text_conf().max(0) as f64 / 100.0).min(1.0);

            let blocks = text
                .split("\n\n")
                .map(str::trim)
                .filter(|block| !block.is_empty())
                .map(|block| OcrBlock {
                    text: block.to_string(),
                    confidence,
                })
                .collect();

            Ok(OcrOutput {
                text,
                confidence,
                blocks,
            })
        }
    }

    impl Default for TesseractOcrClient {
        fn default() -> Self {
            Self::new("hrv+eng", None)
        }
    }

    #[async_trait]
    impl OcrClient for TesseractOcrClient {
        fn name(&self) -> &str {
            "tesseract"
        }

        async fn extract_text(&self, image_data: &[u8]) -> Result<OcrOutput, VerifyError> {
            let bytes = image_data.to_vec();
            let language = self.language.clone();
            let datapath = self.datapath.clone();

            tokio::task::spawn_blocking(move || {
                Self::recognize(&bytes, &language, datapath.as_deref())
            })
            .await
            .map_err(|e| VerifyError::OcrError(format!("OCR task failed: {}", e)))?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_client_ignores_image() {
        let client = StaticOcrClient::new("UKUPNO 12,00", 0.87);
        let output = client.extract_text(b"whatever").await.unwrap();
        assert_eq!(output.text, "UKUPNO 12,00");
        assert_eq!(output.confidence, 0.87);
        assert!(output.has_text());
    }

    #[tokio::test]
    async fn test_noop_client_returns_nothing() {
        let output = NoopOcrClient.extract_text(&[1, 2, 3]).await.unwrap();
        assert!(!output.has_text());
        assert_eq!(output.confidence, 0.0);
    }
}
