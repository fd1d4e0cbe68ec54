pub mod image;
pub mod ocr;
pub mod parser;

pub use self::image::{are_similar_images, calculate_hamming_distance, ImageProcessor};
pub use ocr::{NoopOcrClient, OcrClient, StaticOcrClient};
pub use parser::{parse_receipt_text, ReceiptParser};

#[cfg(feature = "tesseract")]
pub use ocr::TesseractOcrClient;
