pub mod filters;
pub mod producer;
pub mod progress;
pub mod response;
pub mod substitute;
pub mod worker;

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

pub use filters::{HideConfig, HideFilters};
pub use progress::{ProgressSnapshot, RequestCounters};
pub use substitute::{RequestTemplate, ResolvedRequest, TemplateError};

// one wordlist entry paired with one extension, waiting to be dispatched
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    pub template: Arc<RequestTemplate>,
    pub entry: String,
    pub extension: Arc<str>,
    pub position: usize,
    pub retries: u8,
}

// a response that made it through the hide filters
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FuzzResult {
    pub content_length: usize,
    pub words: usize,
    pub lines: usize,
    pub header_size: usize,
    pub status: u16,
    #[serde(rename = "result")]
    pub label: String,
    // wordlist line the entry came from, for callers that need wordlist order back
    #[serde(skip)]
    pub position: usize,
}

/// Failure of a single dispatch attempt. Every variant is retryable.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("keyword substitution failed: {0}")]
    Substitution(String),

    #[error("invalid request after substitution: {0}")]
    InvalidRequest(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
}
