//! Perceptual image fingerprinting and similarity scoring (C3).
//!
//! Built on the `image` crate exactly as the existing poster/backdrop variant
//! generator: decode, `resize_exact` for hashing, `to_luma8`. Unlike that
//! single-purpose resizer, this module never writes files — it only computes
//! fingerprints used by asset selection (C8) to detect duplicate candidates.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Computed fingerprint and basic geometry for one decoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFingerprint {
    pub a_hash: u64,
    pub d_hash: u64,
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    /// Fraction of non-transparent pixels, if the image has an alpha channel.
    pub foreground_ratio: Option<f64>,
    pub is_low_variance: bool,
}

impl ImageFingerprint {
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height.max(1) as f64
    }

    /// Strict/default/lenient similarity mode this image should be compared
    /// under when it is a candidate: heavily-transparent logos compare
    /// leniently, opaque images compare strictly, everything else default.
    pub fn similarity_mode(&self) -> SimilarityMode {
        match self.foreground_ratio {
            Some(ratio) if ratio < 0.35 => SimilarityMode::Lenient,
            None => SimilarityMode::Strict,
            Some(_) => SimilarityMode::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMode {
    Strict,
    Default,
    Lenient,
}

struct Thresholds {
    a_hash_strict: f64,
    d_hash_strict: f64,
    combined_min: f64,
}

impl SimilarityMode {
    fn thresholds(self) -> Thresholds {
        match self {
            Self::Strict => Thresholds {
                a_hash_strict: 0.85,
                d_hash_strict: 0.82,
                combined_min: 0.75,
            },
            Self::Default => Thresholds {
                a_hash_strict: 0.95,
                d_hash_strict: 0.92,
                combined_min: 0.93,
            },
            Self::Lenient => Thresholds {
                a_hash_strict: 0.97,
                d_hash_strict: 0.94,
                combined_min: 0.95,
            },
        }
    }
}

/// Decode raw image bytes and compute its fingerprint.
pub fn fingerprint(data: &[u8]) -> Result<ImageFingerprint, image::ImageError> {
    let img = image::load_from_memory(data)?;
    Ok(fingerprint_image(&img))
}

fn fingerprint_image(img: &DynamicImage) -> ImageFingerprint {
    let (width, height) = img.dimensions();
    let has_alpha = img.color().has_alpha();

    let foreground_ratio = has_alpha.then(|| {
        let rgba = img.to_rgba8();
        let total = rgba.pixels().count().max(1);
        let opaque = rgba.pixels().filter(|p| p[3] > 8).count();
        opaque as f64 / total as f64
    });

    let a_hash = average_hash(img);
    let d_hash = difference_hash(img);
    let is_low_variance = low_variance(img);

    ImageFingerprint {
        a_hash,
        d_hash,
        width,
        height,
        has_alpha,
        foreground_ratio,
        is_low_variance,
    }
}

/// 8x8 average hash: resize to 8x8 grayscale, bit set where the pixel is at
/// or above the mean.
fn average_hash(img: &DynamicImage) -> u64 {
    let small = img.resize_exact(8, 8, FilterType::Lanczos3).to_luma8();
    let pixels: Vec<u8> = small.pixels().map(|p| p[0]).collect();
    let mean = pixels.iter().map(|&v| v as u32).sum::<u32>() as f64 / pixels.len() as f64;

    let mut hash: u64 = 0;
    for (i, &p) in pixels.iter().enumerate() {
        if p as f64 >= mean {
            hash |= 1 << i;
        }
    }
    hash
}

/// 9x8 difference hash: resize to 9x8 grayscale, bit set where each pixel is
/// brighter than its left neighbor, 8 bits per row across 8 rows.
fn difference_hash(img: &DynamicImage) -> u64 {
    let small = img.resize_exact(9, 8, FilterType::Lanczos3).to_luma8();
    let mut hash: u64 = 0;
    let mut bit = 0;
    for y in 0..8u32 {
        for x in 0..8u32 {
            let left = small.get_pixel(x, y)[0];
            let right = small.get_pixel(x + 1, y)[0];
            if right > left {
                hash |= 1 << bit;
            }
            bit += 1;
        }
    }
    hash
}

fn low_variance(img: &DynamicImage) -> bool {
    let small = img.resize_exact(8, 8, FilterType::Lanczos3).to_luma8();
    let pixels: Vec<u8> = small.pixels().map(|p| p[0]).collect();
    let mean = pixels.iter().map(|&v| v as f64).sum::<f64>() / pixels.len() as f64;
    let variance =
        pixels.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / pixels.len() as f64;
    variance < 4.0
}

/// Mean pixel value, used as a canonical hash for low-variance (solid color)
/// images where aHash/dHash are unstable.
pub fn canonical_low_variance_hash(img_data: &[u8]) -> Result<u8, image::ImageError> {
    let img = image::load_from_memory(img_data)?;
    let small = img.resize_exact(8, 8, FilterType::Lanczos3).to_luma8();
    let pixels: Vec<u8> = small.pixels().map(|p| p[0]).collect();
    let mean = pixels.iter().map(|&v| v as u32).sum::<u32>() / pixels.len() as u32;
    Ok(mean as u8)
}

fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

fn hash_similarity(a: u64, b: u64) -> f64 {
    1.0 - (hamming(a, b) as f64 / 64.0)
}

/// Whether two fingerprints should be treated as the same underlying image.
/// `mode` is normally the more lenient of the two images' own
/// [`ImageFingerprint::similarity_mode`].
pub fn are_duplicates(a: &ImageFingerprint, b: &ImageFingerprint, mode: SimilarityMode) -> bool {
    let thresholds = mode.thresholds();
    let a_sim = hash_similarity(a.a_hash, b.a_hash);
    let d_sim = hash_similarity(a.d_hash, b.d_hash);
    let combined = 0.55 * a_sim + 0.45 * d_sim;

    a_sim >= thresholds.a_hash_strict
        || d_sim >= thresholds.d_hash_strict
        || combined >= thresholds.combined_min
}

/// Whether two fingerprints are duplicates by content hash alone (identical
/// source bytes), bypassing perceptual comparison entirely.
pub fn are_duplicates_by_content_hash(hash_a: &str, hash_b: &str) -> bool {
    hash_a == hash_b
}
