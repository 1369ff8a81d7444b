//! Shannon entropy of byte buffers
//!
//! Used two ways:
//! - triage of opaque artifacts (`encrypted` when entropy exceeds a threshold)
//! - the `[entropy, alphabet utilization, printable ratio]` feature vector fed
//!   to an external classifier. The order of that vector is fixed.

use serde::Serialize;

const BINS: usize = 256;

/// Count byte frequencies
#[inline]
fn byte_histogram(data: &[u8]) -> [u64; BINS] {
    let mut histogram = [0u64; BINS];
    for &byte in data {
        histogram[byte as usize] += 1;
    }
    histogram
}

/// Calculate entropy from byte frequency histogram
fn entropy_from_histogram(histogram: &[u64; BINS], total_bytes: usize) -> f64 {
    if total_bytes == 0 {
        return 0.0;
    }

    let total = total_bytes as f64;
    let mut entropy = 0.0f64;

    for &count in histogram.iter() {
        if count > 0 {
            let probability = count as f64 / total;
            entropy -= probability * probability.log2();
        }
    }

    entropy
}

/// Calculate Shannon entropy of data
/// Returns value between 0.0 (single repeated byte) and 8.0 (uniform over all 256 values)
pub fn calculate_shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    entropy_from_histogram(&byte_histogram(data), data.len())
}

/// Entropy/encryption report for an opaque artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntropyReport {
    #[serde(rename = "type")]
    pub kind: String,
    pub size: u64,
    pub entropy: f64,
    pub encrypted: bool,
}

impl EntropyReport {
    /// Build the report for a buffer, rounding entropy to 4 decimals
    pub fn from_bytes(kind: impl Into<String>, data: &[u8], threshold: f64) -> Self {
        let entropy = (calculate_shannon_entropy(data) * 10_000.0).round() / 10_000.0;
        Self {
            kind: kind.into(),
            size: data.len() as u64,
            entropy,
            encrypted: entropy > threshold,
        }
    }
}

/// Feature vector `[entropy, alphabet utilization, printable ratio]` of a text
///
/// Alphabet utilization is the number of distinct byte values over 256,
/// printable ratio the share of bytes in `0x20..=0x7E`. Computed over the
/// UTF-8 encoding of `text`.
pub fn text_features(text: &str) -> [f64; 3] {
    let data = text.as_bytes();
    if data.is_empty() {
        return [0.0, 0.0, 0.0];
    }

    let histogram = byte_histogram(data);
    let entropy = entropy_from_histogram(&histogram, data.len());
    let distinct = histogram.iter().filter(|&&count| count > 0).count();
    let printable = data.iter().filter(|&&b| (32..127).contains(&b)).count();

    [
        entropy,
        distinct as f64 / BINS as f64,
        printable as f64 / data.len() as f64,
    ]
}
