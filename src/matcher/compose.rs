//! Final-prompt composition and the accumulated → profile split.

use crate::types::{RequirementProfile, Session};

/// How many leading entries of each accumulated list become must-haves; the
/// same number again becomes nice-to-haves.
const SPLIT_WIDTH: usize = 6;

/// Compose the final prompt from all user turns: the initial need, any
/// clarifications, then the extracted value sections.
pub fn compose_final_prompt(session: &Session) -> String {
    let user_texts: Vec<&str> = session.user_texts().collect();
    let Some((first, rest)) = user_texts.split_first() else {
        return String::new();
    };

    let mut sections = vec![format!("User need: {first}")];

    if !rest.is_empty() {
        let clarifications = rest
            .iter()
            .map(|text| format!("- {text}"))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("Clarifications:\n{clarifications}"));
    }

    let accumulated = &session.accumulated;
    if !accumulated.labels.is_empty() {
        sections.push(format!("Extracted labels: {}", accumulated.labels.join(", ")));
    }
    if !accumulated.tags.is_empty() {
        sections.push(format!("Extracted tags: {}", accumulated.tags.join(", ")));
    }
    if !accumulated.integrations.is_empty() {
        sections.push(format!(
            "Extracted integrations: {}",
            accumulated.integrations.join(", ")
        ));
    }

    sections.join("\n\n")
}

/// Build the requirement profile for scoring: the first six entries of each
/// accumulated list are must-haves, the next six are nice-to-haves.
pub fn build_profile(session: &Session) -> RequirementProfile {
    let (labels_must, labels_nice) = split_must_nice(&session.accumulated.labels);
    let (tag_must, tag_nice) = split_must_nice(&session.accumulated.tags);
    let (integration_required, integration_nice) = split_must_nice(&session.accumulated.integrations);

    let user_turns = session.user_texts().count();

    RequirementProfile {
        buyer_text: compose_final_prompt(session),
        labels_must,
        labels_nice,
        tag_must,
        tag_nice,
        integration_required,
        integration_nice,
        price_max: session.accumulated.price_max,
        notes: format!("Interactive session with {user_turns} turn(s)"),
    }
}

fn split_must_nice(items: &[String]) -> (Vec<String>, Vec<String>) {
    let must = items.iter().take(SPLIT_WIDTH).cloned().collect();
    let nice = items
        .iter()
        .skip(SPLIT_WIDTH)
        .take(SPLIT_WIDTH)
        .cloned()
        .collect();
    (must, nice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Accumulated, Turn, TurnRole};

    fn session_with_turns(user_texts: &[&str]) -> Session {
        Session {
            turns: user_texts
                .iter()
                .map(|t| Turn {
                    role: TurnRole::User,
                    text: t.to_string(),
                })
                .collect(),
            accumulated: Accumulated {
                labels: vec!["CRM".into(), "Analytics".into()],
                tags: vec!["B2B".into()],
                integrations: vec!["Stripe".into()],
                price_max: Some(100.0),
            },
            ..Default::default()
        }
    }

    #[test]
    fn final_prompt_has_labeled_sections() {
        let session = session_with_turns(&["I need a CRM", "It must integrate with Stripe"]);
        let prompt = compose_final_prompt(&session);

        assert!(prompt.starts_with("User need: I need a CRM"));
        assert!(prompt.contains("Clarifications:\n- It must integrate with Stripe"));
        assert!(prompt.contains("Extracted labels: CRM, Analytics"));
        assert!(prompt.contains("Extracted tags: B2B"));
        assert!(prompt.contains("Extracted integrations: Stripe"));
    }

    #[test]
    fn final_prompt_single_turn_has_no_clarifications() {
        let session = session_with_turns(&["I need a CRM"]);
        let prompt = compose_final_prompt(&session);
        assert!(!prompt.contains("Clarifications"));
    }

    #[test]
    fn final_prompt_skips_assistant_turns() {
        let mut session = session_with_turns(&["I need a CRM"]);
        session.turns.push(Turn {
            role: TurnRole::Assistant,
            text: "Which integrations do you need?".into(),
        });
        session.turns.push(Turn {
            role: TurnRole::User,
            text: "Stripe and PayPal".into(),
        });

        let prompt = compose_final_prompt(&session);
        assert!(prompt.contains("- Stripe and PayPal"));
        assert!(!prompt.contains("Which integrations"));
    }

    #[test]
    fn empty_session_composes_to_empty() {
        assert_eq!(compose_final_prompt(&Session::default()), "");
    }

    #[test]
    fn profile_splits_first_six_then_six() {
        let mut session = session_with_turns(&["prompt"]);
        session.accumulated.labels = (1..=9).map(|i| format!("Label{i}")).collect();

        let profile = build_profile(&session);
        assert_eq!(profile.labels_must.len(), 6);
        assert_eq!(profile.labels_must[0], "Label1");
        assert_eq!(profile.labels_nice, vec!["Label7", "Label8", "Label9"]);
        assert_eq!(profile.tag_must, vec!["B2B"]);
        assert!(profile.tag_nice.is_empty());
        assert_eq!(profile.integration_required, vec!["Stripe"]);
        assert_eq!(profile.price_max, Some(100.0));
        assert!(profile.notes.contains("1 turn(s)"));
    }
}
