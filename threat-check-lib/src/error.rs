//! Error handling for URL verification runs.
//!
//! Per-URL remote faults never surface here: the pool turns the recognized
//! ones into `Verdict::Error`. What remains are the conditions that stop a run.

use std::path::Path;
use thiserror::Error;

/// Main error type for threat-check operations.
#[derive(Debug, Clone, Error)]
pub enum ThreatCheckError {
    /// Configuration errors (missing paths, invalid settings, etc.)
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// The URL list could not be read or has the wrong shape
    #[error("Input error at '{path}': {message}")]
    InputError { path: String, message: String },

    /// The results table or chart could not be written
    #[error("Output error at '{path}': {message}")]
    OutputError { path: String, message: String },

    /// The verdict source failed in a way the pool does not know how to absorb.
    ///
    /// This aborts the whole batch so the operator is never told that every
    /// URL was checked when one of them was not.
    #[error("Unrecognized verdict source failure for '{url}': {message}")]
    SourceFailure { url: String, message: String },

    /// Generic internal errors that don't fit other categories
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ThreatCheckError {
    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new input error for the given path.
    pub fn input<P: AsRef<Path>, M: Into<String>>(path: P, message: M) -> Self {
        Self::InputError {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Create a new output error for the given path.
    pub fn output<P: AsRef<Path>, M: Into<String>>(path: P, message: M) -> Self {
        Self::OutputError {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Create a new fatal source failure.
    pub fn source_failure<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::SourceFailure {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error should stop the process with a non-zero status.
    ///
    /// Input errors are the one exception: an absent URL list means there is
    /// nothing to do.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::InputError { .. })
    }
}

impl From<std::io::Error> for ThreatCheckError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

impl From<toml::de::Error> for ThreatCheckError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError {
            message: format!("Failed to parse TOML configuration: {}", err),
        }
    }
}

impl From<serde_json::Error> for ThreatCheckError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("JSON error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = ThreatCheckError::input("data/urls.csv", "missing 'Link' column");
        assert_eq!(
            err.to_string(),
            "Input error at 'data/urls.csv': missing 'Link' column"
        );

        let err = ThreatCheckError::source_failure("https://a.test", "HTTP 429");
        assert!(err.to_string().contains("https://a.test"));
        assert!(err.to_string().contains("HTTP 429"));
    }

    #[test]
    fn test_input_errors_are_not_fatal() {
        assert!(!ThreatCheckError::input("x.csv", "missing").is_fatal());
        assert!(ThreatCheckError::config("no input path").is_fatal());
        assert!(ThreatCheckError::output("out.csv", "denied").is_fatal());
        assert!(ThreatCheckError::source_failure("u", "boom").is_fatal());
    }

    #[test]
    fn test_toml_error_becomes_config_error() {
        let err: ThreatCheckError = toml::from_str::<toml::Table>("= nope")
            .unwrap_err()
            .into();
        assert!(matches!(err, ThreatCheckError::ConfigError { .. }));
    }
}
