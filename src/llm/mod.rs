//! LLM gateway: one-shot calls to an external chat model and embedding model.
//!
//! Works against any OpenAI-compatible API. All operations are stateless;
//! the per-call deadline comes from the client timeout configured at
//! construction. Transport-class failures are retried with exponential
//! backoff and surface as [`ErrorKind::ExternalService`]; output that stays
//! non-conforming after the retry budget surfaces as
//! [`ErrorKind::MalformedResponse`].

pub mod prompts;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::error::ErrorKind;
use crate::types::{Accumulated, CardFields, RequirementDelta};

/// Dimensionality of the embedding space the catalog index is built over.
pub const EMBEDDING_DIM: usize = 1536;

/// Longest input forwarded to the embedding model, in characters.
const MAX_EMBED_INPUT_CHARS: usize = 8000;

/// Retries for transport-class failures (timeouts, 429, 5xx).
const TRANSPORT_RETRIES: u32 = 2;

/// Attempts for JSON-constrained calls before giving up on the output shape.
const JSON_ATTEMPTS: u32 = 2;

/// Attempts for card field generation, including validation repairs.
const CARD_FIELD_ATTEMPTS: u32 = 3;

const MAX_TITLE_WORDS: usize = 10;
const MAX_DESCRIPTION_WORDS: usize = 600;

/// Client for the chat and embedding models.
#[derive(Debug, Clone)]
pub struct LlmGateway {
    http: Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    embedding_model: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Raw extraction output before catalog filtering and normalization.
#[derive(Debug, Default, Deserialize)]
struct ExtractedRequirements {
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    integrations: Vec<String>,
    #[serde(default)]
    price_max: Option<f64>,
}

impl LlmGateway {
    pub fn new(config: &Config) -> Result<Self> {
        let http = ClientBuilder::new()
            .timeout(Duration::from_secs(config.gateway_timeout_secs))
            .build()
            .context("Failed to build HTTP client for LLM gateway")?;

        Ok(Self {
            http,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    /// Translate text to English. Returns the input unchanged (modulo
    /// whitespace) when it is already English.
    pub async fn translate_to_english(&self, text: &str) -> Result<String> {
        let content = self
            .chat(
                vec![
                    json!({"role": "system", "content": prompts::TRANSLATION_SYSTEM_PROMPT}),
                    json!({"role": "user", "content": text}),
                ],
                0.2,
                500,
                false,
            )
            .await
            .context("Translation request failed")?;
        Ok(content.trim().to_string())
    }

    /// Extract a requirement delta from an English turn. Missing keys come
    /// back empty; unknown keys in the model output are ignored.
    pub async fn extract_requirements(
        &self,
        english_text: &str,
        prior: Option<&Accumulated>,
    ) -> Result<RequirementDelta> {
        let user_prompt = prompts::extraction_user_prompt(english_text, prior);
        let extracted: ExtractedRequirements = self
            .chat_json(
                json!({"role": "system", "content": prompts::EXTRACTION_SYSTEM_PROMPT}),
                json!({"role": "user", "content": user_prompt}),
                0.3,
                800,
            )
            .await
            .context("Requirement extraction failed")?;

        Ok(RequirementDelta {
            labels: extracted.labels,
            tags: extracted.tags,
            integrations: extracted.integrations,
            price_max: extracted.price_max.filter(|p| *p >= 0.0),
        })
    }

    /// Generate the embedding vector for a text. Input is truncated to the
    /// model's practical limit; output dimensionality is verified.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input: String = if text.chars().count() > MAX_EMBED_INPUT_CHARS {
            text.chars().take(MAX_EMBED_INPUT_CHARS).collect()
        } else {
            text.to_string()
        };

        let body = json!({
            "model": self.embedding_model,
            "input": input,
        });

        let response = self
            .post_with_retries(&format!("{}/embeddings", self.base_url), &body)
            .await?;

        let parsed: EmbeddingResponse = serde_json::from_str(&response)
            .context("Failed to parse embedding response")
            .context(ErrorKind::MalformedResponse)?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|e| e.len() == EMBEDDING_DIM);

        match embedding {
            Some(e) => Ok(e),
            None => Err(anyhow::anyhow!(
                "Embedding response missing a {EMBEDDING_DIM}-dim vector"
            ))
            .context(ErrorKind::MalformedResponse),
        }
    }

    /// Phrase one clarifying question from a context paragraph assembled by
    /// the question synthesizer.
    pub async fn synthesize_question(&self, context: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct QuestionOutput {
            question: String,
        }

        let output: QuestionOutput = self
            .chat_json(
                json!({"role": "system", "content": prompts::QUESTION_SYSTEM_PROMPT}),
                json!({"role": "user", "content": context}),
                0.3,
                200,
            )
            .await
            .context("Question synthesis failed")?;

        Ok(output.question)
    }

    /// Generate title and description for a new backlog card from the
    /// English-normalized prompt. Validation failures are fed back to the
    /// model; after the attempt budget the call fails as `external_service`.
    pub async fn generate_card_fields(&self, english_prompt: &str) -> Result<CardFields> {
        let mut messages = vec![
            json!({"role": "system", "content": prompts::CARD_FIELDS_SYSTEM_PROMPT}),
            json!({"role": "user", "content": prompts::card_fields_user_prompt(english_prompt)}),
        ];

        let mut last_error = String::new();

        for attempt in 0..CARD_FIELD_ATTEMPTS {
            let content = self
                .chat(messages.clone(), 0.2, 800, true)
                .await
                .context("Card field generation failed")?;

            let fields: CardFields = match serde_json::from_str(content.trim()) {
                Ok(fields) => fields,
                Err(e) => {
                    if attempt + 1 == CARD_FIELD_ATTEMPTS {
                        return Err(anyhow::anyhow!(
                            "Card field output was not valid JSON after {CARD_FIELD_ATTEMPTS} attempts: {e}"
                        ))
                        .context(ErrorKind::MalformedResponse);
                    }
                    messages.push(json!({"role": "assistant", "content": content}));
                    messages.push(json!({
                        "role": "user",
                        "content": format!("Invalid JSON: {e}. Output valid JSON only."),
                    }));
                    continue;
                }
            };

            let fields = CardFields {
                title: fields.title.trim().to_string(),
                description: fields.description.trim().to_string(),
            };

            match validate_card_fields(&fields) {
                Ok(()) => return Ok(fields),
                Err(reason) => {
                    tracing::warn!(attempt, %reason, "generated card fields failed validation");
                    last_error = reason;
                    messages.push(json!({"role": "assistant", "content": content}));
                    messages.push(json!({
                        "role": "user",
                        "content": format!("ERROR: {last_error}. Please fix and output valid JSON again."),
                    }));
                }
            }
        }

        Err(anyhow::anyhow!(
            "Card field generation failed validation after {CARD_FIELD_ATTEMPTS} attempts: {last_error}"
        ))
        .context(ErrorKind::ExternalService)
    }

    /// Chat call expected to yield a JSON object of type `T`. On a parse
    /// failure the model gets one corrective round-trip before the call
    /// fails as `malformed_response`.
    async fn chat_json<T: serde::de::DeserializeOwned>(
        &self,
        system: Value,
        user: Value,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<T> {
        let mut messages = vec![system, user];

        for attempt in 0..JSON_ATTEMPTS {
            let content = self
                .chat(messages.clone(), temperature, max_tokens, true)
                .await?;

            match serde_json::from_str::<T>(content.trim()) {
                Ok(parsed) => return Ok(parsed),
                Err(e) if attempt + 1 < JSON_ATTEMPTS => {
                    tracing::warn!(error = %e, "model output failed to parse, retrying");
                    messages.push(json!({"role": "assistant", "content": content}));
                    messages.push(json!({
                        "role": "user",
                        "content": format!("Invalid JSON: {e}. Output valid JSON only."),
                    }));
                }
                Err(e) => {
                    return Err(anyhow::Error::from(e))
                        .context("Model output stayed non-conforming after retry")
                        .context(ErrorKind::MalformedResponse);
                }
            }
        }
        unreachable!("chat_json loop always returns within the attempt budget")
    }

    async fn chat(
        &self,
        messages: Vec<Value>,
        temperature: f32,
        max_tokens: u32,
        json_mode: bool,
    ) -> Result<String> {
        let mut body = json!({
            "model": self.chat_model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
        });
        if json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let response = self
            .post_with_retries(&format!("{}/chat/completions", self.base_url), &body)
            .await?;

        let completion: ChatCompletion = serde_json::from_str(&response)
            .context("Failed to parse chat completion response")
            .context(ErrorKind::MalformedResponse)?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("Chat completion had no choices"))
            .context(ErrorKind::MalformedResponse)
    }

    /// POST a JSON body, retrying transport failures, rate limits, and
    /// server errors with exponential backoff.
    async fn post_with_retries(&self, url: &str, body: &Value) -> Result<String> {
        let mut last_failure = None;

        for attempt in 0..=TRANSPORT_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_secs(1 << (attempt - 1))).await;
            }

            let result = self
                .http
                .post(url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(body)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .text()
                            .await
                            .context("Failed to read model response body")
                            .context(ErrorKind::ExternalService);
                    }

                    let detail = response.text().await.unwrap_or_default();
                    if retryable_status(status) && attempt < TRANSPORT_RETRIES {
                        tracing::warn!(%status, attempt, "model API returned retryable status");
                        last_failure = Some(format!("{status}: {detail}"));
                        continue;
                    }
                    return Err(anyhow::anyhow!("Model API returned {status}: {detail}"))
                        .context(ErrorKind::ExternalService);
                }
                Err(e) if attempt < TRANSPORT_RETRIES => {
                    tracing::warn!(error = %e, attempt, "model API request failed, retrying");
                    last_failure = Some(e.to_string());
                }
                Err(e) => {
                    return Err(anyhow::Error::from(e))
                        .context("Model API request failed after retries")
                        .context(ErrorKind::ExternalService);
                }
            }
        }

        Err(anyhow::anyhow!(
            "Model API request failed after {TRANSPORT_RETRIES} retries: {}",
            last_failure.unwrap_or_default()
        ))
        .context(ErrorKind::ExternalService)
    }
}

fn retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Check the card field bounds: non-empty title of at most 10 words,
/// non-empty description of at most 600 words.
fn validate_card_fields(fields: &CardFields) -> std::result::Result<(), String> {
    if fields.title.is_empty() {
        return Err("Title is empty".into());
    }
    if fields.description.is_empty() {
        return Err("Description is empty".into());
    }
    let title_words = fields.title.split_whitespace().count();
    if title_words > MAX_TITLE_WORDS {
        return Err(format!("Title has {title_words} words (max {MAX_TITLE_WORDS})"));
    }
    let description_words = fields.description.split_whitespace().count();
    if description_words > MAX_DESCRIPTION_WORDS {
        return Err(format!(
            "Description has {description_words} words (max {MAX_DESCRIPTION_WORDS})"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(title: &str, description: &str) -> CardFields {
        CardFields {
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn card_fields_within_bounds_pass() {
        assert!(validate_card_fields(&fields(
            "Add Stripe payment integration to CRM",
            "Integrate Stripe payment processing into the CRM workflow."
        ))
        .is_ok());
    }

    #[test]
    fn card_fields_empty_title_rejected() {
        assert!(validate_card_fields(&fields("", "Some description")).is_err());
    }

    #[test]
    fn card_fields_long_title_rejected() {
        let title = "one two three four five six seven eight nine ten eleven";
        assert!(validate_card_fields(&fields(title, "ok")).is_err());
    }

    #[test]
    fn card_fields_ten_word_title_passes() {
        let title = "one two three four five six seven eight nine ten";
        assert!(validate_card_fields(&fields(title, "ok")).is_ok());
    }

    #[test]
    fn extracted_requirements_tolerates_missing_and_unknown_keys() {
        let parsed: ExtractedRequirements =
            serde_json::from_str(r#"{"labels": ["CRM"], "surprise": 42}"#).unwrap();
        assert_eq!(parsed.labels, vec!["CRM"]);
        assert!(parsed.tags.is_empty());
        assert!(parsed.integrations.is_empty());
        assert!(parsed.price_max.is_none());
    }
}
