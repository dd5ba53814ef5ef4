//! Hybrid scoring: hard constraints, weighted overlap scoring, and the
//! sigmoid percentage mapping.
//!
//! Apps failing a hard constraint are not discarded; they are floored at a
//! fixed low percentage and ranked together with the passing set.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::matcher::session::title_case;
use crate::types::{AppFeatures, Candidate, RequirementProfile, ScoredApp};

/// Weight of the embedding similarity in the raw score.
const W_COSINE: f64 = 0.60;
/// Weight of must-have tag overlap.
const W_TAG_MUST: f64 = 0.10;
/// Weight of nice-to-have label overlap.
const W_LABELS_NICE: f64 = 0.10;
/// Weight of nice-to-have tag overlap.
const W_TAG_NICE: f64 = 0.05;
/// Weight of nice-to-have integration overlap.
const W_INTEGRATION_NICE: f64 = 0.15;

/// Calibration applied to the raw score before the percentage mapping.
/// Changing either constant shifts the whole percentage distribution.
const CALIBRATION_SCALE: f64 = 0.45;
const CALIBRATION_OFFSET: f64 = 0.55;

/// Steepness of the sigmoid percentage mapping, centered at 0.5.
const SIGMOID_STEEPNESS: f64 = 10.0;

/// Percentage assigned to apps that fail any hard constraint.
pub const CONSTRAINT_FLOOR_PERCENT: u8 = 5;

/// Substrings of `price_text` that mean the app costs nothing.
const FREE_INDICATORS: &[&str] = &["gratis", "free", "kostenlos", "gratuit"];

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Overlap between a buyer requirement list and an app feature list:
/// `|intersection| / |buyer set|`, case-insensitive. An empty buyer list
/// yields the neutral value 0.1 so absent preferences neither reward nor
/// fully zero the term.
pub fn overlap_ratio(buyer: &[String], app: &[String]) -> f64 {
    if buyer.is_empty() {
        return 0.1;
    }
    let buyer_set: HashSet<String> = buyer.iter().map(|s| s.trim().to_lowercase()).collect();
    let app_set: HashSet<String> = app.iter().map(|s| s.trim().to_lowercase()).collect();
    buyer_set.intersection(&app_set).count() as f64 / buyer_set.len() as f64
}

/// Parse a price value out of free-form catalog price text.
///
/// Free indicators win over any number present; otherwise the first numeric
/// token is taken, tolerating currency prefixes and `/period` suffixes.
/// `None` means the price is unknown.
pub fn parse_price_value(price_text: &str) -> Option<f64> {
    let lower = price_text.to_lowercase();
    if FREE_INDICATORS.iter().any(|w| lower.contains(w)) {
        return Some(0.0);
    }

    let mut token = String::new();
    let mut seen_digit = false;
    for c in price_text.chars() {
        if c.is_ascii_digit() {
            seen_digit = true;
            token.push(c);
        } else if seen_digit && (c == '.' || c == ',') {
            token.push(c);
        } else if seen_digit {
            break;
        }
    }

    let token = token.trim_matches(|c| c == '.' || c == ',');
    if token.is_empty() {
        return None;
    }
    // "1,299.50" style keeps the dot as decimal point; "19,90" style treats
    // the comma as one.
    let cleaned = if token.contains('.') {
        token.replace(',', "")
    } else {
        token.replace(',', ".")
    };
    cleaned.parse::<f64>().ok()
}

/// Check all hard constraints for one candidate: required labels (synonym
/// aware), required integrations (Title-Case comparison), and the budget
/// ceiling. Unknown prices pass the budget check.
pub fn meets_hard_constraints(
    profile: &RequirementProfile,
    features: &AppFeatures,
    price_text: Option<&str>,
    synonyms: &HashMap<String, Vec<String>>,
) -> bool {
    if !profile.labels_must.is_empty() {
        let app_labels: HashSet<String> =
            features.labels.iter().map(|l| l.trim().to_lowercase()).collect();

        for required in &profile.labels_must {
            let required_lower = required.trim().to_lowercase();
            if app_labels.contains(&required_lower) {
                continue;
            }
            let synonym_hit = synonyms
                .get(&required_lower)
                .is_some_and(|syns| syns.iter().any(|s| app_labels.contains(s)));
            if !synonym_hit {
                return false;
            }
        }
    }

    if !profile.integration_required.is_empty() {
        let app_integrations: HashSet<String> = features
            .integration_keys
            .iter()
            .map(|i| title_case(i).to_lowercase())
            .collect();

        for required in &profile.integration_required {
            if !app_integrations.contains(&title_case(required).to_lowercase()) {
                return false;
            }
        }
    }

    if let Some(price_max) = profile.price_max {
        if let Some(price_value) = price_text.and_then(parse_price_value) {
            if price_value > price_max {
                return false;
            }
        }
    }

    true
}

/// Raw hybrid score for a candidate that passed the hard constraints,
/// including the calibration transform.
pub fn hybrid_score(cosine: f64, profile: &RequirementProfile, features: &AppFeatures) -> f64 {
    let integration_nice: Vec<String> =
        profile.integration_nice.iter().map(|i| title_case(i)).collect();
    let app_integrations: Vec<String> =
        features.integration_keys.iter().map(|i| title_case(i)).collect();

    let raw = W_COSINE * cosine
        + W_TAG_MUST * overlap_ratio(&profile.tag_must, &features.tags)
        + W_LABELS_NICE * overlap_ratio(&profile.labels_nice, &features.labels)
        + W_TAG_NICE * overlap_ratio(&profile.tag_nice, &features.tags)
        + W_INTEGRATION_NICE * overlap_ratio(&integration_nice, &app_integrations);

    raw * CALIBRATION_SCALE + CALIBRATION_OFFSET
}

/// Map a calibrated score to a whole percentage through the sigmoid.
pub fn score_to_percent(score: f64) -> u8 {
    let transformed = sigmoid(SIGMOID_STEEPNESS * (score - 0.5));
    (100.0 * transformed).round().clamp(0.0, 100.0) as u8
}

/// Rank candidates against the requirement profile.
///
/// Candidates failing a hard constraint receive the floor percentage;
/// everyone is sorted together by percentage, descending, truncated to
/// `top_n`. A profile with no requirements at all cannot be ranked.
pub fn rank(
    profile: &RequirementProfile,
    candidates: &[Candidate],
    features: &HashMap<Uuid, AppFeatures>,
    synonyms: &HashMap<String, Vec<String>>,
    top_n: usize,
) -> Result<Vec<ScoredApp>> {
    if profile.is_empty() {
        return Err(anyhow::anyhow!(
            "Requirement profile has no labels, tags, or integrations to match on"
        )
        .context(ErrorKind::InvalidInput));
    }
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let empty = AppFeatures::default();
    let mut scored: Vec<ScoredApp> = candidates
        .iter()
        .map(|candidate| {
            let app_features = features.get(&candidate.app_search_id).unwrap_or(&empty);

            let similarity_percent = if meets_hard_constraints(
                profile,
                app_features,
                candidate.price_text.as_deref(),
                synonyms,
            ) {
                score_to_percent(hybrid_score(
                    candidate.cosine_similarity,
                    profile,
                    app_features,
                ))
            } else {
                CONSTRAINT_FLOOR_PERCENT
            };

            ScoredApp {
                app_id: candidate.app_id,
                similarity_percent,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.similarity_percent.cmp(&a.similarity_percent));
    scored.truncate(top_n);
    Ok(scored)
}
