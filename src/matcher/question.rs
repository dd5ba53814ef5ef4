//! Clarifying-question synthesis.
//!
//! One question per response, aimed at the most pressing missing dimension
//! (labels before integrations before tags). Example values rotate with the
//! turn count so a user who keeps answering sees fresh suggestions.

use anyhow::Result;

use crate::llm::prompts::{INTEGRATION_EXAMPLES, LABEL_CATALOG, TAG_EXAMPLES};
use crate::llm::LlmGateway;
use crate::types::{Accumulated, MissingRequirements};

/// How many example values a question offers.
const EXAMPLE_COUNT: usize = 4;

/// The dimension a clarifying question should target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingDimension {
    Labels,
    Integrations,
    Tags,
}

/// Pick the dimension to ask about, by priority. `None` when nothing is
/// missing (the synthesizer must not be invoked in that case).
pub fn most_pressing(missing: &MissingRequirements) -> Option<MissingDimension> {
    if missing.labels_needed > 0 {
        Some(MissingDimension::Labels)
    } else if missing.integrations_needed > 0 {
        Some(MissingDimension::Integrations)
    } else if missing.tags_needed > 0 {
        Some(MissingDimension::Tags)
    } else {
        None
    }
}

/// A rotating window over an example pool, seeded by the turn count so
/// repeat questions vary.
pub fn rotating_examples(pool: &[&str], turn_count: usize, count: usize) -> Vec<String> {
    if pool.is_empty() {
        return Vec::new();
    }
    let start = (turn_count * count) % pool.len();
    (0..count.min(pool.len()))
        .map(|i| pool[(start + i) % pool.len()].to_string())
        .collect()
}

/// Produce one clarifying question for the most pressing missing dimension.
/// The chat model phrases the question; if it fails, a fixed template with
/// the same examples is used instead.
pub async fn synthesize(
    gateway: &LlmGateway,
    missing: &MissingRequirements,
    accumulated: &Accumulated,
    turn_count: usize,
) -> Result<String> {
    let Some(dimension) = most_pressing(missing) else {
        anyhow::bail!("Question synthesizer invoked with nothing missing");
    };

    let examples = examples_for(dimension, turn_count);
    let context = question_context(dimension, missing, accumulated, &examples);

    match gateway.synthesize_question(&context).await {
        Ok(question) if !question.trim().is_empty() => Ok(question.trim().to_string()),
        Ok(_) => Ok(fallback_question(dimension, &examples)),
        Err(e) => {
            tracing::warn!(error = %e, "question synthesis failed, using template");
            Ok(fallback_question(dimension, &examples))
        }
    }
}

fn examples_for(dimension: MissingDimension, turn_count: usize) -> Vec<String> {
    let pool = match dimension {
        MissingDimension::Labels => LABEL_CATALOG,
        MissingDimension::Integrations => INTEGRATION_EXAMPLES,
        MissingDimension::Tags => TAG_EXAMPLES,
    };
    rotating_examples(pool, turn_count, EXAMPLE_COUNT)
}

fn question_context(
    dimension: MissingDimension,
    missing: &MissingRequirements,
    accumulated: &Accumulated,
    examples: &[String],
) -> String {
    match dimension {
        MissingDimension::Labels => format!(
            "The user needs {} more functional label(s) for their business application.\n\n\
             Current labels: {:?}\n\n\
             Example label options: {:?}\n\n\
             Generate a question asking what main functions/features they need. \
             Mention the example labels but allow free text.",
            missing.labels_needed, accumulated.labels, examples
        ),
        MissingDimension::Integrations => format!(
            "The user needs to specify at least {} integration(s) with external tools/platforms.\n\n\
             Current integrations: {:?}\n\n\
             Example integrations: {:?}\n\n\
             Generate a question asking which external services or platforms their \
             application must integrate with, mentioning the examples.",
            missing.integrations_needed, accumulated.integrations, examples
        ),
        MissingDimension::Tags => format!(
            "The user needs {} more tag(s) for business context.\n\n\
             Current tags: {:?}\n\n\
             Example tags: {:?}\n\n\
             Generate a question asking about their business context - industry, \
             company type, region, or key characteristics. Ask for short keywords \
             and mention the examples.",
            missing.tags_needed, accumulated.tags, examples
        ),
    }
}

fn fallback_question(dimension: MissingDimension, examples: &[String]) -> String {
    let examples = examples.join(", ");
    match dimension {
        MissingDimension::Labels => {
            format!("What main functions do you need? (e.g., {examples})")
        }
        MissingDimension::Integrations => {
            format!("Which external tools must it integrate with? (e.g., {examples})")
        }
        MissingDimension::Tags => {
            format!("Can you describe your business context? (e.g., {examples})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_is_labels_then_integrations_then_tags() {
        let all = MissingRequirements {
            labels_needed: 1,
            tags_needed: 1,
            integrations_needed: 1,
        };
        assert_eq!(most_pressing(&all), Some(MissingDimension::Labels));

        let no_labels = MissingRequirements {
            labels_needed: 0,
            ..all
        };
        assert_eq!(most_pressing(&no_labels), Some(MissingDimension::Integrations));

        let only_tags = MissingRequirements {
            labels_needed: 0,
            integrations_needed: 0,
            tags_needed: 1,
        };
        assert_eq!(most_pressing(&only_tags), Some(MissingDimension::Tags));

        assert_eq!(most_pressing(&MissingRequirements::default()), None);
    }

    #[test]
    fn examples_rotate_with_turn_count() {
        let first = rotating_examples(INTEGRATION_EXAMPLES, 0, 4);
        let second = rotating_examples(INTEGRATION_EXAMPLES, 1, 4);
        assert_eq!(first.len(), 4);
        assert_eq!(second.len(), 4);
        assert_ne!(first, second);

        // Rotation wraps around the pool rather than running off its end.
        let wrapped = rotating_examples(INTEGRATION_EXAMPLES, 7, 4);
        assert_eq!(wrapped.len(), 4);
    }

    #[test]
    fn rotation_is_deterministic_per_turn_count() {
        assert_eq!(
            rotating_examples(TAG_EXAMPLES, 3, 4),
            rotating_examples(TAG_EXAMPLES, 3, 4)
        );
    }

    #[test]
    fn fallback_mentions_examples() {
        let examples = rotating_examples(LABEL_CATALOG, 0, 4);
        let question = fallback_question(MissingDimension::Labels, &examples);
        assert!(question.contains(&examples[0]));
        assert!(question.ends_with('?') || question.ends_with(')'));
    }
}
