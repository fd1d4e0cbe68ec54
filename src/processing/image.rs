use crate::models::ImageFingerprint;
use crate::utils::VerifyError;
use image::imageops::FilterType;
use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use sha2::{Digest, Sha256};
use std::path::Path;

// 16x16 grid -> 256-bit hash, 64 hex characters.
const HASH_GRID: u32 = 16;
const HASH_BANDS: u32 = 4;
const BLUR_SIGMA: f32 = 1.0;

/// Default Hamming distance under which two receipt photos are the same receipt.
pub const DEFAULT_SIMILARITY_THRESHOLD: u32 = 5;

pub struct ImageProcessor;

impl ImageProcessor {
    pub fn read_image(image_path: &Path) -> Result<Vec<u8>, VerifyError> {
        std::fs::read(image_path).map_err(|e| {
            VerifyError::ImageProcessingError(format!(
                "Failed to read image {}: {}",
                image_path.display(),
                e
            ))
        })
    }

    pub fn decode_grayscale(image_data: &[u8]) -> Result<GrayImage, VerifyError> {
        let img = image::load_from_memory(image_data).map_err(|e| {
            VerifyError::ImageProcessingError(format!("Failed to decode image: {}", e))
        })?;
        Ok(img.to_luma8())
    }

    /// Block-mean perceptual hash as a hex string, or `None` when the bytes are
    /// not a decodable image.
    pub fn calculate_perceptual_hash(image_data: &[u8]) -> Option<String> {
        match Self::decode_grayscale(image_data) {
            Ok(gray) => Some(Self::block_hash(&gray)),
            Err(e) => {
                log::warn!("Perceptual hash unavailable: {}", e);
                None
            }
        }
    }

    /// Each cell of a blurred 16x16 luminance grid is compared against the
    /// median of its horizontal band; brighter cells set their bit.
    pub fn block_hash(gray: &GrayImage) -> String {
        let blurred = gaussian_blur_f32(gray, BLUR_SIGMA);
        let grid = image::imageops::resize(&blurred, HASH_GRID, HASH_GRID, FilterType::Triangle);

        let band_rows = HASH_GRID / HASH_BANDS;
        let mut bits = Vec::with_capacity((HASH_GRID * HASH_GRID) as usize);

        for band in 0..HASH_BANDS {
            let rows = band * band_rows..(band + 1) * band_rows;
            let mut values: Vec<u8> = rows
                .flat_map(|y| (0..HASH_GRID).map(move |x| (x, y)))
                .map(|(x, y)| grid.get_pixel(x, y)[0])
                .collect();
            let cells = values.clone();

            values.sort_unstable();
            let mid = values.len() / 2;
            let median = (values[mid - 1] as f32 + values[mid] as f32) / 2.0;

            bits.extend(cells.into_iter().map(|v| v as f32 > median));
        }

        bits.chunks(4)
            .map(|nibble| {
                let value = nibble
                    .iter()
                    .fold(0u32, |acc, bit| (acc << 1) | u32::from(*bit));
                std::char::from_digit(value, 16).unwrap_or('0')
            })
            .collect()
    }

    pub fn sha256_hex(image_data: &[u8]) -> String {
        let digest = Sha256::digest(image_data);
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn fingerprint(image_data: &[u8]) -> ImageFingerprint {
        ImageFingerprint {
            perceptual_hash: Self::calculate_perceptual_hash(image_data),
            sha256: Self::sha256_hex(image_data),
        }
    }
}

/// Number of differing bits between two hex hashes.
///
/// `None` stands for an infinite distance: a missing hash, a length mismatch
/// or a non-hex character.
pub fn calculate_hamming_distance(hash1: Option<&str>, hash2: Option<&str>) -> Option<u32> {
    let (a, b) = match (hash1, hash2) {
        (Some(a), Some(b)) if a.len() == b.len() => (a, b),
        _ => return None,
    };

    a.chars().zip(b.chars()).try_fold(0u32, |distance, (x, y)| {
        let x = x.to_digit(16)?;
        let y = y.to_digit(16)?;
        Some(distance + (x ^ y).count_ones())
    })
}

pub fn are_similar_images(hash1: Option<&str>, hash2: Option<&str>, threshold: u32) -> bool {
    calculate_hamming_distance(hash1, hash2).map_or(false, |d| d <= threshold)
}
