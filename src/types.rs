use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A structured delta extracted from a single buyer turn.
///
/// Lists are deduplicated case-insensitively; integrations are normalized to
/// Title Case. `price_max` is present only when the buyer stated a cash
/// ceiling ("completely free" counts as `0`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequirementDelta {
    pub labels: Vec<String>,
    pub tags: Vec<String>,
    pub integrations: Vec<String>,
    pub price_max: Option<f64>,
}

/// How many more values each dimension needs before a session is valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingRequirements {
    pub labels_needed: usize,
    pub tags_needed: usize,
    pub integrations_needed: usize,
}

impl MissingRequirements {
    pub fn none_missing(&self) -> bool {
        self.labels_needed == 0 && self.tags_needed == 0 && self.integrations_needed == 0
    }
}

/// Requirement data merged across all turns of a session.
///
/// Lists preserve insertion order of first appearance; duplicates are ignored
/// case-insensitively. `price_max` adopts the minimum across turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Accumulated {
    pub labels: Vec<String>,
    pub tags: Vec<String>,
    pub integrations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_max: Option<f64>,
}

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// A single exchange in the dialog. User turns hold the English-normalized
/// prompt text; assistant turns hold the clarifying question that was asked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

/// Client-carried continuation for the interactive matcher.
///
/// The server holds no session state between requests; the client sends this
/// back verbatim on continue/finalize.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub turns: Vec<Turn>,
    pub accumulated: Accumulated,
    pub missing: MissingRequirements,
    pub is_valid: bool,
}

impl Session {
    /// All user-authored turn texts, in order.
    pub fn user_texts(&self) -> impl Iterator<Item = &str> {
        self.turns
            .iter()
            .filter(|t| t.role == TurnRole::User)
            .map(|t| t.text.as_str())
    }
}

/// The structured buyer specification handed to the scorer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequirementProfile {
    pub buyer_text: String,
    pub labels_must: Vec<String>,
    pub labels_nice: Vec<String>,
    pub tag_must: Vec<String>,
    pub tag_nice: Vec<String>,
    pub integration_required: Vec<String>,
    pub integration_nice: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_max: Option<f64>,
    pub notes: String,
}

impl RequirementProfile {
    /// True when no requirement list carries any value; such a profile cannot
    /// be scored.
    pub fn is_empty(&self) -> bool {
        self.labels_must.is_empty()
            && self.labels_nice.is_empty()
            && self.tag_must.is_empty()
            && self.tag_nice.is_empty()
            && self.integration_required.is_empty()
            && self.integration_nice.is_empty()
    }
}

/// One row from the vector-nearest-neighbor retrieval.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub app_search_id: Uuid,
    pub app_id: Uuid,
    pub price_text: Option<String>,
    pub cosine_similarity: f64,
}

/// Categorical features of one application, fetched in a single batched read.
#[derive(Debug, Clone, Default)]
pub struct AppFeatures {
    pub labels: Vec<String>,
    pub integration_keys: Vec<String>,
    pub tags: Vec<String>,
}

/// Scorer output before names are attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredApp {
    pub app_id: Uuid,
    pub similarity_percent: u8,
}

/// A fully enriched match result as returned to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub app_id: Uuid,
    pub name: String,
    pub similarity_percent: u8,
}

/// Dialog progress indicator for start/continue responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    NeedsMore,
    Ready,
}

/// Response shape shared by start, continue, and finalize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub status: MatchStatus,
    pub session: Session,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<MissingRequirements>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_prompt: Option<String>,
    pub results: Option<Vec<MatchResult>>,
}

/// Title and description generated for a new backlog card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardFields {
    pub title: String,
    pub description: String,
}

/// An active backlog card together with its prompt children, as read for
/// duplicate detection.
#[derive(Debug, Clone)]
pub struct ActiveCard {
    pub id: Uuid,
    pub prompts: Vec<CardPrompt>,
}

/// One prompt/comment pair attached to a backlog card.
#[derive(Debug, Clone)]
pub struct CardPrompt {
    pub prompt_text: String,
    pub comment_text: Option<String>,
}

impl CardPrompt {
    /// The text used for similarity comparison: the prompt, with the comment
    /// appended on its own line when present.
    pub fn comparison_text(&self) -> String {
        match self.comment_text.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(comment) => format!("{}\n{}", self.prompt_text, comment),
            None => self.prompt_text.clone(),
        }
    }
}

/// Outcome of a backlog ingest: which card absorbed the prompt, and whether
/// it was created by this request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub card_id: Uuid,
    pub is_new: bool,
}
