//! Multi-model completion with fallback.
//!
//! The [`dispatcher`] walks a priority-ordered list of models against a
//! [`service::CompletionService`], retrying on advertised rate-limit delays and
//! skipping models that fail. [`groq`] is the HTTP backend used by the CLI.

pub mod conversation;
/// Model fallback dispatcher.
pub mod dispatcher;
/// Blocking Groq client for chat completions and speech.
pub mod groq;
pub mod rate_limit;
pub mod service;
/// Text-to-speech catalog.
pub mod speech;
pub mod think;
/// Image attachment helpers.
pub mod vision;

pub use conversation::{Conversation, Role, Turn};
pub use dispatcher::{DispatchError, DispatchObserver, DispatchOutcome, Dispatcher};
pub use service::{CompletionService, ServiceError};

/// Default candidate models, most preferred first.
pub const FALLBACK_MODELS: &[&str] = &[
    "compound-beta",
    "compound-beta-mini",
    "mixtral-8x7b-32768",
    "llama3-70b-8192",
    "gemma2-9b-it",
    "deepseek-r1-distill-llama-70b",
];

/// Default upper bound for one attempt and for one rate-limit sleep, in seconds.
pub const DEFAULT_MAX_WAIT_SECS: u64 = 45;
