//! Backlog ingestion: duplicate detection against active cards and
//! transactional card bookkeeping.
//!
//! An incoming request is compared against one uniformly sampled prompt per
//! active card. The best match at or above the threshold absorbs the
//! request; otherwise a new card is created with model-generated title and
//! description. Either way the original prompt text is stored verbatim.

pub mod similar;

use anyhow::{Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sqlx::PgPool;
use uuid::Uuid;

use crate::catalog::CatalogRepo;
use crate::error::ErrorKind;
use crate::llm::LlmGateway;
use crate::types::{ActiveCard, IngestOutcome};

/// Status code of cards that participate in duplicate detection.
const CARD_STATUS_ACTIVE: i32 = 1;

const MIN_PROMPT_CHARS: usize = 5;
const MAX_PROMPT_CHARS: usize = 2000;
const MAX_COMMENT_CHARS: usize = 1000;

/// An incoming backlog request.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub prompt_text: String,
    pub comment_text: Option<String>,
}

impl IngestRequest {
    /// The comparison text: prompt plus comment on its own line.
    fn combined_text(&self) -> String {
        let prompt = self.prompt_text.trim();
        match self.comment_text.as_deref().map(str::trim) {
            Some(comment) if !comment.is_empty() => format!("{prompt}\n{comment}"),
            _ => prompt.to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        let prompt_len = self.prompt_text.trim().chars().count();
        if !(MIN_PROMPT_CHARS..=MAX_PROMPT_CHARS).contains(&prompt_len) {
            return Err(anyhow::anyhow!(
                "prompt_text must be between {MIN_PROMPT_CHARS} and {MAX_PROMPT_CHARS} characters"
            )
            .context(ErrorKind::InvalidInput));
        }
        if let Some(comment) = &self.comment_text {
            if comment.chars().count() > MAX_COMMENT_CHARS {
                return Err(anyhow::anyhow!(
                    "comment_text must be at most {MAX_COMMENT_CHARS} characters"
                )
                .context(ErrorKind::InvalidInput));
            }
        }
        Ok(())
    }
}

/// Ingest one request: match it to an existing card or create a new one.
///
/// `seed` makes the per-card prompt sampling reproducible in tests; pass
/// `None` in production.
pub async fn ingest(
    gateway: &LlmGateway,
    catalog: &CatalogRepo,
    request: &IngestRequest,
    match_threshold: u8,
    seed: Option<u64>,
) -> Result<IngestOutcome> {
    request.validate()?;

    let english_text = gateway
        .translate_to_english(&request.combined_text())
        .await
        .context("Failed to normalize backlog request to English")?;

    let cards = catalog.active_cards().await?;
    let best = find_best_match(gateway, &cards, &english_text, match_threshold, seed).await?;

    match best {
        Some((card_id, percent)) => {
            tracing::info!(%card_id, percent, "backlog request matched existing card");
            append_to_card(catalog.pool(), card_id, request).await?;
            Ok(IngestOutcome {
                card_id,
                is_new: false,
            })
        }
        None => {
            let fields = gateway
                .generate_card_fields(&english_text)
                .await
                .context("Failed to generate fields for new card")?;
            let card_id =
                create_card(catalog.pool(), &fields.title, &fields.description, request).await?;
            tracing::info!(%card_id, "backlog request created new card");
            Ok(IngestOutcome {
                card_id,
                is_new: true,
            })
        }
    }
}

/// Compare the incoming English text against one sampled prompt per card and
/// return the best match at or above the threshold.
pub async fn find_best_match(
    gateway: &LlmGateway,
    cards: &[ActiveCard],
    incoming_english: &str,
    threshold: u8,
    seed: Option<u64>,
) -> Result<Option<(Uuid, u8)>> {
    if cards.is_empty() {
        return Ok(None);
    }

    let incoming_embedding = gateway
        .embed(incoming_english)
        .await
        .context("Failed to embed incoming backlog request")?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut best: Option<(Uuid, u8)> = None;
    for card in cards {
        let Some(sampled) = sample_prompt(card, &mut rng) else {
            continue;
        };

        let percent =
            similar::evaluate_against_card(gateway, &incoming_embedding, &sampled).await?;
        tracing::debug!(card_id = %card.id, percent, "evaluated card similarity");

        if percent >= threshold && best.map_or(true, |(_, p)| percent > p) {
            best = Some((card.id, percent));
        }
    }

    Ok(best)
}

/// Uniformly sample one prompt (with its comment appended) from a card.
fn sample_prompt(card: &ActiveCard, rng: &mut StdRng) -> Option<String> {
    if card.prompts.is_empty() {
        return None;
    }
    let index = rng.gen_range(0..card.prompts.len());
    Some(card.prompts[index].comparison_text())
}

/// Append a prompt to an existing card and bump its request counter, in one
/// transaction.
async fn append_to_card(pool: &PgPool, card_id: Uuid, request: &IngestRequest) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin transaction")
        .context(ErrorKind::Storage)?;

    insert_prompt(&mut tx, card_id, request).await?;

    let updated = sqlx::query(
        "UPDATE cards SET number_of_requests = number_of_requests + 1 WHERE id = $1",
    )
    .bind(card_id)
    .execute(&mut *tx)
    .await
    .context("Failed to increment card request count")
    .context(ErrorKind::Storage)?;

    if updated.rows_affected() == 0 {
        return Err(anyhow::anyhow!("Card {card_id} not found").context(ErrorKind::Storage));
    }

    tx.commit()
        .await
        .context("Failed to commit prompt append")
        .context(ErrorKind::Storage)
}

/// Create a new active card with its first prompt, in one transaction.
async fn create_card(
    pool: &PgPool,
    title: &str,
    description: &str,
    request: &IngestRequest,
) -> Result<Uuid> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin transaction")
        .context(ErrorKind::Storage)?;

    let card_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO cards (id, title, description, status, number_of_requests, created_at)
        VALUES ($1, $2, $3, $4, 1, $5)
        "#,
    )
    .bind(card_id)
    .bind(title.trim())
    .bind(description.trim())
    .bind(CARD_STATUS_ACTIVE)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .context("Failed to insert card")
    .context(ErrorKind::Storage)?;

    insert_prompt(&mut tx, card_id, request).await?;

    tx.commit()
        .await
        .context("Failed to commit card creation")
        .context(ErrorKind::Storage)?;

    Ok(card_id)
}

/// Insert the child prompt row. The prompt text is stored verbatim, in its
/// original language.
async fn insert_prompt(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    card_id: Uuid,
    request: &IngestRequest,
) -> Result<()> {
    let comment = request
        .comment_text
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    sqlx::query(
        r#"
        INSERT INTO card_prompts_comments (id, card_id, prompt_text, comment_text, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(card_id)
    .bind(request.prompt_text.trim())
    .bind(comment)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await
    .context("Failed to insert prompt row")
    .context(ErrorKind::Storage)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CardPrompt;

    fn card(prompts: &[&str]) -> ActiveCard {
        ActiveCard {
            id: Uuid::new_v4(),
            prompts: prompts
                .iter()
                .map(|p| CardPrompt {
                    prompt_text: p.to_string(),
                    comment_text: None,
                })
                .collect(),
        }
    }

    #[test]
    fn validate_enforces_prompt_bounds() {
        let ok = IngestRequest {
            prompt_text: "Need Stripe integration".into(),
            comment_text: None,
        };
        assert!(ok.validate().is_ok());

        let short = IngestRequest {
            prompt_text: "hey".into(),
            comment_text: None,
        };
        assert!(short.validate().is_err());

        let long = IngestRequest {
            prompt_text: "x".repeat(2001),
            comment_text: None,
        };
        assert!(long.validate().is_err());

        let boundary = IngestRequest {
            prompt_text: "x".repeat(2000),
            comment_text: None,
        };
        assert!(boundary.validate().is_ok());
    }

    #[test]
    fn validate_enforces_comment_bound() {
        let request = IngestRequest {
            prompt_text: "Need Stripe integration".into(),
            comment_text: Some("y".repeat(1001)),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn combined_text_appends_comment_on_new_line() {
        let request = IngestRequest {
            prompt_text: "Necesito integrar Stripe ".into(),
            comment_text: Some(" Es urgente".into()),
        };
        assert_eq!(request.combined_text(), "Necesito integrar Stripe\nEs urgente");

        let bare = IngestRequest {
            prompt_text: "Necesito integrar Stripe".into(),
            comment_text: Some("  ".into()),
        };
        assert_eq!(bare.combined_text(), "Necesito integrar Stripe");
    }

    #[test]
    fn sampling_is_reproducible_with_a_seed() {
        let card = card(&["first prompt", "second prompt", "third prompt"]);

        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        assert_eq!(sample_prompt(&card, &mut rng_a), sample_prompt(&card, &mut rng_b));
    }

    #[test]
    fn sampling_skips_promptless_cards() {
        let card = ActiveCard {
            id: Uuid::new_v4(),
            prompts: vec![],
        };
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(sample_prompt(&card, &mut rng), None);
    }

    #[test]
    fn sampled_prompt_carries_its_comment() {
        let card = ActiveCard {
            id: Uuid::new_v4(),
            prompts: vec![CardPrompt {
                prompt_text: "Payment gateway integration".into(),
                comment_text: Some("for the checkout flow".into()),
            }],
        };
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            sample_prompt(&card, &mut rng).unwrap(),
            "Payment gateway integration\nfor the checkout flow"
        );
    }
}
