//! Single-URL lookup.
//!
//! `UrlChecker` issues one query to a verdict source and turns the outcome
//! into a [`Verdict`]. Recognized remote faults and timeouts become
//! `Verdict::Error`; anything else is returned as a fatal error.

use crate::config::MAX_TIMEOUT_SECS;
use crate::error::ThreatCheckError;
use crate::protocols::VerdictSource;
use crate::types::{ThreatCategory, Verdict};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Checks URLs against a fixed set of threat categories.
#[derive(Clone)]
pub struct UrlChecker {
    /// Shared, read-only handle to the remote source
    source: Arc<dyn VerdictSource>,
    /// Categories queried for every URL, de-duplicated, never empty
    categories: Vec<ThreatCategory>,
    /// Deadline for one lookup
    timeout: Duration,
}

impl UrlChecker {
    /// Create a checker.
    ///
    /// Duplicate categories are dropped (first occurrence wins). An empty
    /// category set, or a timeout of zero or above `MAX_TIMEOUT_SECS`, is a
    /// configuration error.
    pub fn new(
        source: Arc<dyn VerdictSource>,
        categories: Vec<ThreatCategory>,
        timeout: Duration,
    ) -> Result<Self, ThreatCheckError> {
        let mut unique: Vec<ThreatCategory> = Vec::with_capacity(categories.len());
        for category in categories {
            if !unique.contains(&category) {
                unique.push(category);
            }
        }

        if unique.is_empty() {
            return Err(ThreatCheckError::config(
                "At least one threat type must be queried",
            ));
        }
        if timeout.is_zero() || timeout.as_secs() > MAX_TIMEOUT_SECS {
            return Err(ThreatCheckError::config(format!(
                "Lookup timeout must be between 1s and {}s",
                MAX_TIMEOUT_SECS
            )));
        }

        Ok(Self {
            source,
            categories: unique,
            timeout,
        })
    }

    /// Categories queried for every URL.
    pub fn categories(&self) -> &[ThreatCategory] {
        &self.categories
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Look up one URL.
    ///
    /// # Errors
    ///
    /// Returns `ThreatCheckError::SourceFailure` when the source fails with a
    /// fault class outside the recognized set. No retry is attempted.
    pub async fn check_url(&self, url: &str) -> Result<Verdict, ThreatCheckError> {
        let outcome =
            tokio::time::timeout(self.timeout, self.source.check(url, &self.categories)).await;

        match outcome {
            Ok(Ok(matches)) => {
                let verdict = Verdict::from_matches(matches);
                if verdict.is_threat() {
                    warn!(%url, threats = %verdict, "Threat detected on {}: {}", url, verdict);
                } else {
                    info!(%url, "{} is safe.", url);
                }
                Ok(verdict)
            }
            Ok(Err(e)) if e.is_recognized() => {
                error!(%url, error = %e, "Error checking {}: {}", url, e);
                Ok(Verdict::Error)
            }
            Ok(Err(e)) => {
                error!(%url, error = %e, "Unrecognized failure checking {}: {}", url, e);
                Err(ThreatCheckError::source_failure(url, e.to_string()))
            }
            Err(_) => {
                error!(%url, timeout = ?self.timeout, "Error checking {}: timed out after {:?}", url, self.timeout);
                Ok(Verdict::Error)
            }
        }
    }
}

impl std::fmt::Debug for UrlChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlChecker")
            .field("categories", &self.categories)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
