//! Perceptual fingerprints (64-bit DCT pHash).
//!
//! The image is reduced to a 32x32 luma thumbnail, transformed with a 2-D
//! DCT-II, and the 8x8 lowest-frequency block is thresholded against its own
//! median. Recompression and light resizing move few of those coefficients
//! across the median, so near-duplicates land a small Hamming distance apart
//! while unrelated photos differ in roughly half their bits.

use crate::error::{CarouselError, CarouselResult};
use image::imageops::{self, FilterType};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

const THUMB: usize = 32;
const LOW: usize = 8;

/// 64-bit perceptual hash. Bit 63 is the DC coefficient, row-major after that.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    /// Number of differing bits.
    pub fn distance(self, other: Fingerprint) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16).map(Self)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Decode `bytes` (any format the `image` crate knows) and fingerprint the pixels.
pub fn fingerprint(bytes: &[u8]) -> CarouselResult<Fingerprint> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| CarouselError::decode(format!("fingerprint: {e}")))?;
    Ok(fingerprint_image(&img))
}

/// Fingerprint an already decoded image.
pub fn fingerprint_image(img: &image::DynamicImage) -> Fingerprint {
    let gray = img.to_luma8();
    let thumb = imageops::resize(&gray, THUMB as u32, THUMB as u32, FilterType::Lanczos3);
    let pixels: Vec<f64> = thumb.pixels().map(|p| p[0] as f64).collect();

    let coeffs = dct_low_block(&pixels);

    let mut sorted = coeffs.clone();
    sorted.sort_by(f64::total_cmp);
    let median = (sorted[LOW * LOW / 2 - 1] + sorted[LOW * LOW / 2]) / 2.0;

    let bits = coeffs
        .iter()
        .fold(0u64, |acc, &c| (acc << 1) | u64::from(c > median));
    Fingerprint(bits)
}

/// Separable DCT-II over a `THUMB`x`THUMB` block, keeping only the top-left
/// `LOW`x`LOW` coefficients (row-major).
fn dct_low_block(pixels: &[f64]) -> Vec<f64> {
    let mut cos_table = [[0.0f64; THUMB]; LOW];
    for (k, row) in cos_table.iter_mut().enumerate() {
        for (n, v) in row.iter_mut().enumerate() {
            *v = (PI * k as f64 * (2 * n + 1) as f64 / (2 * THUMB) as f64).cos();
        }
    }

    // rows: THUMB x LOW
    let mut rows = vec![0.0f64; THUMB * LOW];
    for y in 0..THUMB {
        for (u, cos_u) in cos_table.iter().enumerate() {
            rows[y * LOW + u] = (0..THUMB).map(|x| pixels[y * THUMB + x] * cos_u[x]).sum();
        }
    }

    let mut out = vec![0.0f64; LOW * LOW];
    for (v, cos_v) in cos_table.iter().enumerate() {
        for u in 0..LOW {
            out[v * LOW + u] = (0..THUMB).map(|y| rows[y * LOW + u] * cos_v[y]).sum();
        }
    }
    out
}
