//! Read-side access to the application catalog and the backlog card store.
//!
//! Queries run under read-committed semantics against the marketplace
//! schema; labels and integration keys are keyed by `app_search_id`, tags by
//! `app_id`. The vector retrieval rides the HNSW cosine index on
//! `application_search.embedding`.

use std::collections::HashMap;

use anyhow::{Context, Result};
use pgvector::Vector;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::types::{ActiveCard, AppFeatures, Candidate, CardPrompt};

/// Catalog and backlog read access over a shared connection pool.
#[derive(Debug, Clone)]
pub struct CatalogRepo {
    pool: PgPool,
}

impl CatalogRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool to the given database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to database")
            .context(ErrorKind::Storage)?;
        Ok(Self::new(pool))
    }

    /// The underlying pool, for transactional writers.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Top-K applications by cosine distance to the buyer embedding,
    /// nearest first.
    pub async fn vector_candidates(
        &self,
        buyer_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<Candidate>> {
        let embedding = Vector::from(buyer_embedding.to_vec());

        let rows = sqlx::query(
            r#"
            SELECT s.id AS app_search_id,
                   s.app_id,
                   a.price_text,
                   1 - (s.embedding <=> $1) AS cosine_similarity
            FROM application_search s
            JOIN application a ON a.id = s.app_id
            WHERE s.embedding IS NOT NULL
            ORDER BY s.embedding <=> $1
            LIMIT $2
            "#,
        )
        .bind(&embedding)
        .bind(top_k as i64)
        .fetch_all(&self.pool)
        .await
        .context("Vector candidate query failed")
        .context(ErrorKind::Storage)?;

        rows.into_iter()
            .map(|row| {
                Ok(Candidate {
                    app_search_id: row.try_get("app_search_id")?,
                    app_id: row.try_get("app_id")?,
                    price_text: row.try_get("price_text")?,
                    cosine_similarity: row.try_get("cosine_similarity")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .context("Failed to decode candidate rows")
            .context(ErrorKind::Storage)
    }

    /// Labels, integration keys, and tags for a candidate set, in one
    /// batched read per feature family. The result is keyed by
    /// `app_search_id`.
    pub async fn fetch_features(
        &self,
        candidates: &[(Uuid, Uuid)],
    ) -> Result<HashMap<Uuid, AppFeatures>> {
        if candidates.is_empty() {
            return Ok(HashMap::new());
        }

        let search_ids: Vec<Uuid> = candidates.iter().map(|(search_id, _)| *search_id).collect();
        let app_ids: Vec<Uuid> = candidates.iter().map(|(_, app_id)| *app_id).collect();
        let app_to_search: HashMap<Uuid, Uuid> = candidates
            .iter()
            .map(|(search_id, app_id)| (*app_id, *search_id))
            .collect();

        let mut features: HashMap<Uuid, AppFeatures> = search_ids
            .iter()
            .map(|id| (*id, AppFeatures::default()))
            .collect();

        let label_rows = sqlx::query(
            "SELECT app_search_id, label FROM application_labels WHERE app_search_id = ANY($1)",
        )
        .bind(&search_ids)
        .fetch_all(&self.pool)
        .await
        .context("Label fetch failed")
        .context(ErrorKind::Storage)?;

        for row in label_rows {
            let search_id: Uuid = row.try_get("app_search_id").context(ErrorKind::Storage)?;
            if let Some(entry) = features.get_mut(&search_id) {
                entry.labels.push(row.try_get("label").context(ErrorKind::Storage)?);
            }
        }

        let integration_rows = sqlx::query(
            "SELECT app_search_id, integration_key FROM application_integration_keys \
             WHERE app_search_id = ANY($1)",
        )
        .bind(&search_ids)
        .fetch_all(&self.pool)
        .await
        .context("Integration key fetch failed")
        .context(ErrorKind::Storage)?;

        for row in integration_rows {
            let search_id: Uuid = row.try_get("app_search_id").context(ErrorKind::Storage)?;
            if let Some(entry) = features.get_mut(&search_id) {
                entry
                    .integration_keys
                    .push(row.try_get("integration_key").context(ErrorKind::Storage)?);
            }
        }

        let tag_rows = sqlx::query("SELECT app_id, tag FROM apps_tags WHERE app_id = ANY($1)")
            .bind(&app_ids)
            .fetch_all(&self.pool)
            .await
            .context("Tag fetch failed")
            .context(ErrorKind::Storage)?;

        for row in tag_rows {
            let app_id: Uuid = row.try_get("app_id").context(ErrorKind::Storage)?;
            if let Some(search_id) = app_to_search.get(&app_id) {
                if let Some(entry) = features.get_mut(search_id) {
                    entry.tags.push(row.try_get("tag").context(ErrorKind::Storage)?);
                }
            }
        }

        Ok(features)
    }

    /// Synonym sets for the given labels, keyed by lowercased label. Each
    /// set includes the label itself, everything lowercased for
    /// case-insensitive matching.
    pub async fn fetch_synonyms(&self, labels: &[String]) -> Result<HashMap<String, Vec<String>>> {
        if labels.is_empty() {
            return Ok(HashMap::new());
        }

        let labels_lower: Vec<String> = labels.iter().map(|l| l.to_lowercase()).collect();

        let rows = sqlx::query("SELECT label, synonyms FROM labels WHERE LOWER(label) = ANY($1)")
            .bind(&labels_lower)
            .fetch_all(&self.pool)
            .await
            .context("Synonym fetch failed")
            .context(ErrorKind::Storage)?;

        let mut result = HashMap::new();
        for row in rows {
            let label: String = row.try_get("label").context(ErrorKind::Storage)?;
            let synonyms: Option<Vec<String>> = row.try_get("synonyms").context(ErrorKind::Storage)?;

            let label_lower = label.to_lowercase();
            let mut set = vec![label_lower.clone()];
            if let Some(synonyms) = synonyms {
                set.extend(synonyms.iter().map(|s| s.to_lowercase()));
            }
            result.insert(label_lower, set);
        }
        Ok(result)
    }

    /// Application names for a result set, in one batched read.
    pub async fn fetch_app_names(&self, app_ids: &[Uuid]) -> Result<HashMap<Uuid, String>> {
        if app_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query("SELECT id, name FROM application WHERE id = ANY($1)")
            .bind(app_ids)
            .fetch_all(&self.pool)
            .await
            .context("Application name fetch failed")
            .context(ErrorKind::Storage)?;

        rows.into_iter()
            .map(|row| Ok((row.try_get("id")?, row.try_get("name")?)))
            .collect::<Result<HashMap<_, _>, sqlx::Error>>()
            .context("Failed to decode application name rows")
            .context(ErrorKind::Storage)
    }

    /// Active backlog cards with their prompt children. Cards without any
    /// prompt are omitted.
    pub async fn active_cards(&self) -> Result<Vec<ActiveCard>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, p.prompt_text, p.comment_text
            FROM cards c
            JOIN card_prompts_comments p ON p.card_id = c.id
            WHERE c.status = 1
            ORDER BY c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Active card fetch failed")
        .context(ErrorKind::Storage)?;

        let mut cards: Vec<ActiveCard> = Vec::new();
        for row in rows {
            let card_id: Uuid = row.try_get("id").context(ErrorKind::Storage)?;
            let prompt = CardPrompt {
                prompt_text: row.try_get("prompt_text").context(ErrorKind::Storage)?,
                comment_text: row.try_get("comment_text").context(ErrorKind::Storage)?,
            };

            match cards.last_mut() {
                Some(card) if card.id == card_id => card.prompts.push(prompt),
                _ => cards.push(ActiveCard {
                    id: card_id,
                    prompts: vec![prompt],
                }),
            }
        }
        Ok(cards)
    }
}
