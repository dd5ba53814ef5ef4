//! Session accumulation and completeness validation.
//!
//! Accumulated requirement lists only ever grow: merging is a
//! case-insensitive set union that preserves the casing and position of the
//! first appearance. Validity is derived from minimum thresholds and, once
//! reached, never reverts within a session.

use serde::{Deserialize, Serialize};

use crate::types::{Accumulated, MissingRequirements, RequirementDelta};

/// How many values each dimension must accumulate before a session is
/// complete enough to match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    pub min_labels: usize,
    pub min_tags: usize,
    pub min_integrations: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_labels: 2,
            min_tags: 1,
            min_integrations: 1,
        }
    }
}

/// Cap on each accumulated list, matching the per-turn extraction cap.
const MAX_ACCUMULATED_ITEMS: usize = 10;

/// Merge a turn's delta into the accumulated state. Lists union
/// case-insensitively; `price_max` adopts the minimum when both sides carry
/// one.
pub fn merge_delta(accumulated: &mut Accumulated, delta: &RequirementDelta) {
    merge_into(&mut accumulated.labels, &delta.labels);
    merge_into(&mut accumulated.tags, &delta.tags);
    merge_into(&mut accumulated.integrations, &delta.integrations);

    accumulated.price_max = match (accumulated.price_max, delta.price_max) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
}

/// Compute what is still missing and whether the thresholds are met.
pub fn validate(accumulated: &Accumulated, thresholds: &Thresholds) -> (bool, MissingRequirements) {
    let missing = MissingRequirements {
        labels_needed: thresholds.min_labels.saturating_sub(accumulated.labels.len()),
        tags_needed: thresholds.min_tags.saturating_sub(accumulated.tags.len()),
        integrations_needed: thresholds
            .min_integrations
            .saturating_sub(accumulated.integrations.len()),
    };
    (missing.none_missing(), missing)
}

fn merge_into(existing: &mut Vec<String>, new_items: &[String]) {
    for item in new_items {
        if existing.len() >= MAX_ACCUMULATED_ITEMS {
            break;
        }
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if !existing.iter().any(|e| e.eq_ignore_ascii_case(item)) {
            existing.push(item.to_string());
        }
    }
}

/// Deduplicate case-insensitively, preserving first-seen casing and order.
/// Empty entries are dropped.
pub fn dedupe_preserving_case(items: &[String]) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !result.iter().any(|e| e.eq_ignore_ascii_case(item)) {
            result.push(item.to_string());
        }
    }
    result
}

/// Normalize a name to Title Case: letters following a non-letter start
/// uppercase, every other letter is lowercased. Keeps acronyms with digit
/// boundaries intact ("B2B") while flattening shouting ("PAYPAL" ->
/// "Paypal").
pub fn title_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.trim().chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            result.push(c);
            prev_is_letter = false;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(labels: &[&str], tags: &[&str], integrations: &[&str]) -> RequirementDelta {
        RequirementDelta {
            labels: labels.iter().map(|s| s.to_string()).collect(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            integrations: integrations.iter().map(|s| s.to_string()).collect(),
            price_max: None,
        }
    }

    #[test]
    fn merge_is_monotonic_and_case_insensitive() {
        let mut acc = Accumulated::default();
        merge_delta(&mut acc, &delta(&["CRM", "Analytics"], &["B2B"], &["Stripe"]));
        assert_eq!(acc.labels, vec!["CRM", "Analytics"]);

        let before = acc.labels.len();
        merge_delta(&mut acc, &delta(&["crm", "ANALYTICS"], &["b2b"], &["STRIPE"]));
        assert_eq!(acc.labels.len(), before, "case variants must not duplicate");
        assert_eq!(acc.labels, vec!["CRM", "Analytics"], "first-seen casing wins");
        assert_eq!(acc.tags, vec!["B2B"]);
        assert_eq!(acc.integrations, vec!["Stripe"]);
    }

    #[test]
    fn merge_price_takes_minimum() {
        let mut acc = Accumulated::default();
        merge_delta(
            &mut acc,
            &RequirementDelta {
                price_max: Some(100.0),
                ..Default::default()
            },
        );
        assert_eq!(acc.price_max, Some(100.0));

        merge_delta(
            &mut acc,
            &RequirementDelta {
                price_max: Some(50.0),
                ..Default::default()
            },
        );
        assert_eq!(acc.price_max, Some(50.0));

        merge_delta(&mut acc, &RequirementDelta::default());
        assert_eq!(acc.price_max, Some(50.0), "absent delta keeps prior ceiling");
    }

    #[test]
    fn merge_zero_price_is_kept() {
        let mut acc = Accumulated::default();
        merge_delta(
            &mut acc,
            &RequirementDelta {
                price_max: Some(0.0),
                ..Default::default()
            },
        );
        assert_eq!(acc.price_max, Some(0.0));
    }

    #[test]
    fn validate_reports_missing_counts() {
        let thresholds = Thresholds::default();
        let mut acc = Accumulated::default();

        let (valid, missing) = validate(&acc, &thresholds);
        assert!(!valid);
        assert_eq!(missing.labels_needed, 2);
        assert_eq!(missing.tags_needed, 1);
        assert_eq!(missing.integrations_needed, 1);

        merge_delta(
            &mut acc,
            &delta(&["CRM", "Sales"], &["B2B"], &[]),
        );
        let (valid, missing) = validate(&acc, &thresholds);
        assert!(!valid, "one integration still missing");
        assert_eq!(missing.labels_needed, 0);
        assert_eq!(missing.integrations_needed, 1);

        merge_delta(&mut acc, &delta(&[], &[], &["Stripe"]));
        let (valid, missing) = validate(&acc, &thresholds);
        assert!(valid);
        assert!(missing.none_missing());
    }

    #[test]
    fn validate_has_no_upper_bound() {
        let thresholds = Thresholds::default();
        let acc = Accumulated {
            labels: (0..8).map(|i| format!("Label {i}")).collect(),
            tags: (0..8).map(|i| format!("Tag {i}")).collect(),
            integrations: (0..8).map(|i| format!("Integration {i}")).collect(),
            price_max: None,
        };
        let (valid, _) = validate(&acc, &thresholds);
        assert!(valid);
    }

    #[test]
    fn accumulated_lists_are_capped() {
        let mut acc = Accumulated::default();
        let many: Vec<String> = (0..20).map(|i| format!("Label {i}")).collect();
        merge_delta(
            &mut acc,
            &RequirementDelta {
                labels: many,
                ..Default::default()
            },
        );
        assert_eq!(acc.labels.len(), MAX_ACCUMULATED_ITEMS);
    }

    #[test]
    fn dedupe_preserves_first_casing_and_order() {
        let items: Vec<String> = ["Stripe", "stripe", "PayPal", " ", "STRIPE", "Shopify"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            dedupe_preserving_case(&items),
            vec!["Stripe", "PayPal", "Shopify"]
        );
    }

    #[test]
    fn title_case_normalizes_words() {
        assert_eq!(title_case("stripe"), "Stripe");
        assert_eq!(title_case("  google workspace "), "Google Workspace");
        assert_eq!(title_case("PAYPAL"), "Paypal");
        assert_eq!(title_case("b2b"), "B2B");
        assert_eq!(title_case(""), "");
    }
}
