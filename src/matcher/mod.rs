//! Interactive matching: the multi-turn dialog engine.
//!
//! `start` opens a session from a free-form prompt, `continue_session` folds
//! an answer into it, and `finalize` runs the full retrieval and scoring
//! pipeline once the session is valid. Sessions are client-carried; nothing
//! here outlives a request.

pub mod compose;
pub mod parser;
pub mod question;
pub mod score;
pub mod session;

use anyhow::{Context, Result};

use crate::catalog::CatalogRepo;
use crate::error::ErrorKind;
use crate::llm::LlmGateway;
use crate::types::{
    MatchResult, MatchStatus, Session, SessionResponse, Turn, TurnRole,
};

use self::session::Thresholds;

const MIN_START_CHARS: usize = 10;
const MAX_START_CHARS: usize = 2000;
const MIN_ANSWER_CHARS: usize = 1;
const MAX_ANSWER_CHARS: usize = 1000;

pub const DEFAULT_TOP_K: usize = 30;
pub const DEFAULT_TOP_N: usize = 10;
const MIN_TOP_K: usize = 10;
const MAX_TOP_K: usize = 100;
const MIN_TOP_N: usize = 1;
const MAX_TOP_N: usize = 50;

/// Drives the start/continue/finalize dialog against the gateway and the
/// catalog.
pub struct InteractiveMatcher<'a> {
    gateway: &'a LlmGateway,
    catalog: &'a CatalogRepo,
    thresholds: Thresholds,
}

impl<'a> InteractiveMatcher<'a> {
    pub fn new(gateway: &'a LlmGateway, catalog: &'a CatalogRepo, thresholds: Thresholds) -> Self {
        Self {
            gateway,
            catalog,
            thresholds,
        }
    }

    /// Start a new session from the buyer's initial prompt.
    pub async fn start(&self, prompt_text: &str) -> Result<SessionResponse> {
        let prompt = prompt_text.trim();
        let length = prompt.chars().count();
        if !(MIN_START_CHARS..=MAX_START_CHARS).contains(&length) {
            return Err(anyhow::anyhow!(
                "prompt_text must be between {MIN_START_CHARS} and {MAX_START_CHARS} characters"
            )
            .context(ErrorKind::InvalidInput));
        }

        let parsed = parser::parse_turn(self.gateway, prompt, None).await?;

        let mut session = Session::default();
        session.turns.push(Turn {
            role: TurnRole::User,
            text: parsed.english_text,
        });
        session::merge_delta(&mut session.accumulated, &parsed.delta);

        self.advance(session).await
    }

    /// Fold the buyer's answer into an existing session.
    pub async fn continue_session(
        &self,
        mut session: Session,
        answer_text: &str,
    ) -> Result<SessionResponse> {
        self.check_session_shape(&session)?;
        if session.is_valid {
            return Err(anyhow::anyhow!(
                "Session is already valid; call finalize instead of continue"
            )
            .context(ErrorKind::InvalidInput));
        }

        let answer = answer_text.trim();
        let length = answer.chars().count();
        if !(MIN_ANSWER_CHARS..=MAX_ANSWER_CHARS).contains(&length) {
            return Err(anyhow::anyhow!(
                "answer_text must be between {MIN_ANSWER_CHARS} and {MAX_ANSWER_CHARS} characters"
            )
            .context(ErrorKind::InvalidInput));
        }

        let parsed = parser::parse_turn(self.gateway, answer, Some(&session.accumulated)).await?;

        session.turns.push(Turn {
            role: TurnRole::User,
            text: parsed.english_text,
        });
        session::merge_delta(&mut session.accumulated, &parsed.delta);

        self.advance(session).await
    }

    /// Run retrieval and scoring on a valid session.
    pub async fn finalize(
        &self,
        session: &Session,
        top_k: usize,
        top_n: usize,
    ) -> Result<SessionResponse> {
        self.check_session_shape(session)?;
        if !session.is_valid {
            return Err(anyhow::anyhow!("Session is not valid; answer the open questions first")
                .context(ErrorKind::InvalidInput));
        }
        if !(MIN_TOP_K..=MAX_TOP_K).contains(&top_k) {
            return Err(anyhow::anyhow!(
                "top_k must be between {MIN_TOP_K} and {MAX_TOP_K}"
            )
            .context(ErrorKind::InvalidInput));
        }
        if !(MIN_TOP_N..=MAX_TOP_N).contains(&top_n) {
            return Err(anyhow::anyhow!(
                "top_n must be between {MIN_TOP_N} and {MAX_TOP_N}"
            )
            .context(ErrorKind::InvalidInput));
        }

        let profile = compose::build_profile(session);
        let final_prompt = profile.buyer_text.clone();

        let embedding = self
            .gateway
            .embed(&final_prompt)
            .await
            .context("Failed to embed final prompt")?;

        let candidates = self.catalog.vector_candidates(&embedding, top_k).await?;
        tracing::info!(candidates = candidates.len(), "retrieved vector candidates");

        let id_pairs: Vec<_> = candidates
            .iter()
            .map(|c| (c.app_search_id, c.app_id))
            .collect();
        let features = self.catalog.fetch_features(&id_pairs).await?;
        let synonyms = self.catalog.fetch_synonyms(&profile.labels_must).await?;

        let scored = score::rank(&profile, &candidates, &features, &synonyms, top_n)?;

        let app_ids: Vec<_> = scored.iter().map(|s| s.app_id).collect();
        let names = self.catalog.fetch_app_names(&app_ids).await?;

        let results = scored
            .into_iter()
            .map(|s| MatchResult {
                name: names
                    .get(&s.app_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
                app_id: s.app_id,
                similarity_percent: s.similarity_percent,
            })
            .collect();

        Ok(SessionResponse {
            status: MatchStatus::Ready,
            session: session.clone(),
            question: None,
            missing: None,
            final_prompt: Some(final_prompt),
            results: Some(results),
        })
    }

    /// Re-validate the session and either close it out as ready or ask the
    /// next clarifying question.
    async fn advance(&self, mut session: Session) -> Result<SessionResponse> {
        let (is_valid, missing) = session::validate(&session.accumulated, &self.thresholds);
        session.missing = missing;
        session.is_valid = is_valid;

        if is_valid {
            let final_prompt = compose::compose_final_prompt(&session);
            return Ok(SessionResponse {
                status: MatchStatus::Ready,
                session,
                question: None,
                missing: None,
                final_prompt: Some(final_prompt),
                results: None,
            });
        }

        let question = question::synthesize(
            self.gateway,
            &missing,
            &session.accumulated,
            session.turns.len(),
        )
        .await?;

        session.turns.push(Turn {
            role: TurnRole::Assistant,
            text: question.clone(),
        });

        Ok(SessionResponse {
            status: MatchStatus::NeedsMore,
            session,
            question: Some(question),
            missing: Some(missing),
            final_prompt: None,
            results: None,
        })
    }

    /// Reject sessions whose shape could not have been produced by this
    /// service: no turns, a non-user opening turn, or validity flags that
    /// disagree with the accumulated data.
    fn check_session_shape(&self, session: &Session) -> Result<()> {
        let first_is_user = session
            .turns
            .first()
            .is_some_and(|t| t.role == TurnRole::User);
        if !first_is_user {
            return Err(anyhow::anyhow!("Session must begin with a user turn")
                .context(ErrorKind::InvalidInput));
        }

        let (is_valid, missing) = session::validate(&session.accumulated, &self.thresholds);
        if session.is_valid != is_valid || session.missing != missing {
            return Err(anyhow::anyhow!(
                "Session validity flags do not match its accumulated data"
            )
            .context(ErrorKind::InvalidInput));
        }
        Ok(())
    }
}
