use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::matcher::session::Thresholds;

/// Runtime configuration, sourced entirely from the environment.
///
/// Required: `DATABASE_URL`, `OPENAI_API_KEY`. Everything else has a default
/// and an env override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Postgres connection string
    pub database_url: String,
    /// API key for the chat/embedding provider
    pub openai_api_key: String,
    /// OpenAI-compatible API root (override for proxies and tests)
    pub openai_base_url: String,
    /// Chat model identifier
    pub chat_model: String,
    /// Embedding model identifier
    pub embedding_model: String,
    /// Per-request deadline for gateway calls, in seconds
    pub gateway_timeout_secs: u64,
    /// Listen port for the HTTP server
    pub port: u16,
    /// Minimum counts a session must accumulate before matching
    pub thresholds: Thresholds,
    /// Similarity percentage at or above which a backlog prompt joins an
    /// existing card
    pub backlog_match_threshold: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com/v1".into(),
            chat_model: "gpt-4o-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
            gateway_timeout_secs: 30,
            port: 8080,
            thresholds: Thresholds::default(),
            backlog_match_threshold: 50,
        }
    }
}

impl Config {
    /// Build a config from environment variables, falling back to defaults
    /// for everything optional.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .context("OPENAI_API_KEY must be set")?,
            openai_base_url: env_or("OPENAI_BASE_URL", defaults.openai_base_url),
            chat_model: env_or("CHAT_MODEL", defaults.chat_model),
            embedding_model: env_or("EMBEDDING_MODEL", defaults.embedding_model),
            gateway_timeout_secs: env_parsed("GATEWAY_TIMEOUT_SECS", defaults.gateway_timeout_secs)?,
            port: env_parsed("PORT", defaults.port)?,
            thresholds: Thresholds {
                min_labels: env_parsed("MIN_LABELS_REQUIRED", defaults.thresholds.min_labels)?,
                min_tags: env_parsed("MIN_TAGS_REQUIRED", defaults.thresholds.min_tags)?,
                min_integrations: env_parsed(
                    "MIN_INTEGRATIONS_REQUIRED",
                    defaults.thresholds.min_integrations,
                )?,
            },
            backlog_match_threshold: env_parsed(
                "BACKLOG_MATCH_THRESHOLD",
                defaults.backlog_match_threshold,
            )?,
        })
    }
}

fn env_or(key: &str, default: String) -> String {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default,
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v
            .parse::<T>()
            .with_context(|| format!("Failed to parse {key}={v}")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.embedding_model, "text-embedding-3-small");
        assert_eq!(config.backlog_match_threshold, 50);
        assert_eq!(config.thresholds.min_labels, 2);
        assert_eq!(config.thresholds.min_tags, 1);
        assert_eq!(config.thresholds.min_integrations, 1);
    }
}
