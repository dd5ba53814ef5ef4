//! Failure taxonomy for the matching and backlog pipelines.
//!
//! Components attach an [`ErrorKind`] to their `anyhow` errors via
//! `.context(...)`; the HTTP layer recovers the kind with [`ErrorKind::classify`]
//! and maps it to a status class.

use axum::http::StatusCode;

/// The externally meaningful failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// Shape, length, or precondition failure, including "no requirements
    /// extracted".
    #[error("invalid input")]
    InvalidInput,
    /// LLM timeout, rate limit, transport, or model error after internal
    /// retries.
    #[error("external service failure")]
    ExternalService,
    /// The model returned non-conforming output after the retry budget.
    #[error("malformed model response")]
    MalformedResponse,
    /// Database connectivity, constraint violation, or rolled-back
    /// transaction.
    #[error("storage failure")]
    Storage,
    /// Anything unexpected.
    #[error("internal error")]
    Internal,
}

impl ErrorKind {
    /// Recover the kind from an error chain. Untagged sqlx and reqwest errors
    /// fall through to their natural classes; everything else is internal.
    pub fn classify(err: &anyhow::Error) -> Self {
        if let Some(kind) = err.downcast_ref::<ErrorKind>() {
            return *kind;
        }
        for cause in err.chain() {
            if cause.downcast_ref::<sqlx::Error>().is_some() {
                return ErrorKind::Storage;
            }
            if cause.downcast_ref::<reqwest::Error>().is_some() {
                return ErrorKind::ExternalService;
            }
        }
        ErrorKind::Internal
    }

    /// Stable wire identifier for the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::ExternalService => "external_service",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Storage => "storage",
            ErrorKind::Internal => "internal",
        }
    }

    /// HTTP status class: validation failures are the client's fault,
    /// upstream model failures are a bad gateway, the rest is on us.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::ExternalService | ErrorKind::MalformedResponse => StatusCode::BAD_GATEWAY,
            ErrorKind::Storage | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
