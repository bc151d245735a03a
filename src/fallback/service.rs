use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;

use crate::fallback::conversation::Turn;

/// Remote completion backend used by the dispatcher.
///
/// One call is one attempt against one model; retrying and falling back are
/// the dispatcher's job, never the service's.
pub trait CompletionService {
    fn complete(
        &self,
        model: &str,
        conversation: &[Turn],
        timeout: Duration,
    ) -> Result<String, ServiceError>;
}

impl<T: CompletionService + ?Sized> CompletionService for &T {
    fn complete(
        &self,
        model: &str,
        conversation: &[Turn],
        timeout: Duration,
    ) -> Result<String, ServiceError> {
        (**self).complete(model, conversation, timeout)
    }
}

impl<T: CompletionService + ?Sized> CompletionService for Box<T> {
    fn complete(
        &self,
        model: &str,
        conversation: &[Turn],
        timeout: Duration,
    ) -> Result<String, ServiceError> {
        (**self).complete(model, conversation, timeout)
    }
}

#[derive(Debug)]
pub enum ServiceError {
    /// Quota exceeded, optionally with the advertised wait before retrying.
    RateLimited { retry_after: Option<Duration> },
    MissingApiKey { key_env: &'static str },
    Request { source: reqwest::Error },
    Api { status: StatusCode, body: String },
    EmptyResponse,
    /// Anything else the backend could not classify.
    Other { detail: String },
}

impl ServiceError {
    pub fn other(detail: impl Into<String>) -> Self {
        Self::Other {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited {
                retry_after: Some(delay),
            } => write!(f, "rate limited, retry after {:.1}s", delay.as_secs_f64()),
            Self::RateLimited { retry_after: None } => write!(f, "rate limited, quota exhausted"),
            Self::MissingApiKey { key_env } => write!(f, "{key_env} is not set in the environment"),
            Self::Request { source } => write!(f, "request failed: {source}"),
            Self::Api { status, body } => write!(f, "API error {status}: {body}"),
            Self::EmptyResponse => write!(f, "response did not contain message content"),
            Self::Other { detail } => f.write_str(detail),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request { source } => Some(source),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(source: reqwest::Error) -> Self {
        Self::Request { source }
    }
}
