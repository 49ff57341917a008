//! Verdict sources.
//!
//! A verdict source answers one question: which of the queried threat
//! categories does this URL match? The pool only talks to the
//! [`VerdictSource`] trait, so tests can substitute in-memory sources.

use crate::types::ThreatCategory;
use async_trait::async_trait;
use thiserror::Error;

/// Google Web Risk `uris:search` client
pub mod webrisk;

pub use webrisk::WebRiskClient;

/// Remote fault reported by a verdict source.
///
/// The first four variants are the fault classes the pool knows how to
/// absorb (they become `Verdict::Error`). Anything else is `Unclassified`
/// and aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal server error: {0}")]
    Internal(String),

    #[error("{0}")]
    Unclassified(String),
}

impl SourceError {
    /// Whether the pool may convert this fault into an `ERROR` verdict.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, SourceError::Unclassified(_))
    }
}

/// Remote capability that checks one URL against a set of threat categories.
#[async_trait]
pub trait VerdictSource: Send + Sync {
    /// Return the categories `url` matched; an empty vector means no match.
    async fn check(
        &self,
        url: &str,
        categories: &[ThreatCategory],
    ) -> Result<Vec<ThreatCategory>, SourceError>;
}
