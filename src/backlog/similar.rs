//! Embedding similarity between an incoming request and a card prompt.
//!
//! Uses the same sigmoid percentage mapping as the marketplace scorer so
//! thresholds mean the same thing in both pipelines.

use anyhow::{Context, Result};

use crate::llm::LlmGateway;

/// Sigmoid steepness, matching the marketplace score mapping.
const SIGMOID_STEEPNESS: f64 = 10.0;

/// Cosine similarity between two equal-length vectors. Zero vectors compare
/// as zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        anyhow::bail!("Vector dimensions do not match: {} vs {}", a.len(), b.len());
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Map a cosine similarity to a whole percentage through the sigmoid
/// centered at 0.5.
pub fn similarity_to_percent(similarity: f64) -> u8 {
    let transformed = 1.0 / (1.0 + (-SIGMOID_STEEPNESS * (similarity - 0.5)).exp());
    (100.0 * transformed).round().clamp(0.0, 100.0) as u8
}

/// Similarity percentage between an already-embedded incoming request and a
/// card prompt. The card prompt is normalized to English and embedded here.
pub async fn evaluate_against_card(
    gateway: &LlmGateway,
    incoming_embedding: &[f32],
    card_prompt: &str,
) -> Result<u8> {
    let card_text = gateway
        .translate_to_english(card_prompt)
        .await
        .context("Failed to normalize card prompt to English")?;

    let card_embedding = gateway
        .embed(&card_text)
        .await
        .context("Failed to embed card prompt")?;

    let similarity = cosine_similarity(incoming_embedding, &card_embedding)?;
    Ok(similarity_to_percent(similarity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5f32, -0.25, 0.1];
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        let sim = cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap();
        assert!(sim.abs() < 1e-9);
    }

    #[test]
    fn cosine_rejects_mismatched_dimensions() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0]).is_err());
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn percent_mapping_matches_the_sigmoid() {
        assert_eq!(similarity_to_percent(0.5), 50);
        assert_eq!(similarity_to_percent(1.0), 99);
        assert!(similarity_to_percent(0.0) <= 1);
        assert!(similarity_to_percent(0.6) > similarity_to_percent(0.4));
    }

    #[test]
    fn threshold_semantics_at_the_boundary() {
        // A raw cosine of exactly 0.5 sits exactly at the 50 threshold.
        assert!(similarity_to_percent(0.5) >= 50);
        assert!(similarity_to_percent(0.49) < 50);
    }
}
