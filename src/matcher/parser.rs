//! Requirement parsing for a single buyer turn.
//!
//! Translation and extraction go through the LLM gateway; everything after
//! that is deterministic normalization: catalog filtering for labels,
//! Title-Case normalization for tags and integrations, case-insensitive
//! dedup, and per-turn caps.

use anyhow::{Context, Result};

use crate::llm::prompts::LABEL_CATALOG;
use crate::llm::LlmGateway;
use crate::matcher::session::{dedupe_preserving_case, title_case};
use crate::types::{Accumulated, RequirementDelta};

/// Per-turn cap on each extracted list.
const MAX_ITEMS_PER_TURN: usize = 10;

/// A parsed turn: the English-normalized text plus the structured delta it
/// contributes.
#[derive(Debug, Clone)]
pub struct ParsedTurn {
    pub english_text: String,
    pub delta: RequirementDelta,
}

/// Parse one free-form buyer turn into a requirement delta.
pub async fn parse_turn(
    gateway: &LlmGateway,
    text: &str,
    prior: Option<&Accumulated>,
) -> Result<ParsedTurn> {
    let english_text = gateway
        .translate_to_english(text)
        .await
        .context("Failed to normalize turn to English")?;

    let raw = gateway
        .extract_requirements(&english_text, prior)
        .await
        .context("Failed to extract requirements from turn")?;

    Ok(ParsedTurn {
        english_text,
        delta: normalize_delta(raw),
    })
}

/// Deterministic cleanup of a raw extraction result.
fn normalize_delta(raw: RequirementDelta) -> RequirementDelta {
    let labels = filter_catalog_labels(&raw.labels);

    let tags: Vec<String> = raw.tags.iter().map(|t| title_case(t)).collect();
    let mut tags = dedupe_preserving_case(&tags);
    tags.truncate(MAX_ITEMS_PER_TURN);

    let integrations: Vec<String> = raw.integrations.iter().map(|i| title_case(i)).collect();
    let mut integrations = dedupe_preserving_case(&integrations);
    integrations.truncate(MAX_ITEMS_PER_TURN);

    RequirementDelta {
        labels,
        tags,
        integrations,
        price_max: raw.price_max,
    }
}

/// Keep only labels present in the closed catalog, adopting the catalog's
/// casing. The model is told to stay inside the catalog, but its output is
/// not trusted.
fn filter_catalog_labels(labels: &[String]) -> Vec<String> {
    let matched: Vec<String> = labels
        .iter()
        .filter_map(|label| {
            let label = label.trim();
            LABEL_CATALOG
                .iter()
                .find(|entry| entry.eq_ignore_ascii_case(label))
                .map(|entry| entry.to_string())
        })
        .collect();

    let mut deduped = dedupe_preserving_case(&matched);
    deduped.truncate(MAX_ITEMS_PER_TURN);
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn labels_outside_catalog_are_dropped() {
        let filtered = filter_catalog_labels(&strings(&["CRM", "Spaceships", "Invoicing"]));
        assert_eq!(filtered, vec!["CRM", "Invoicing"]);
    }

    #[test]
    fn labels_adopt_catalog_casing() {
        let filtered = filter_catalog_labels(&strings(&["crm", "time tracking"]));
        assert_eq!(filtered, vec!["CRM", "Time Tracking"]);
    }

    #[test]
    fn normalize_title_cases_and_dedupes_integrations() {
        let delta = normalize_delta(RequirementDelta {
            labels: vec![],
            tags: strings(&["healthcare", "HEALTHCARE"]),
            integrations: strings(&["stripe", "STRIPE", "google workspace"]),
            price_max: Some(50.0),
        });
        assert_eq!(delta.integrations, vec!["Stripe", "Google Workspace"]);
        assert_eq!(delta.tags, vec!["Healthcare"]);
        assert_eq!(delta.price_max, Some(50.0));
    }

    #[test]
    fn normalize_caps_each_list() {
        let many: Vec<String> = (0..15).map(|i| format!("Tag {i}")).collect();
        let delta = normalize_delta(RequirementDelta {
            tags: many,
            ..Default::default()
        });
        assert_eq!(delta.tags.len(), MAX_ITEMS_PER_TURN);
    }
}
