// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for Pisces
//!
//! Navigation, unknown-action and session-start errors are fatal to a task or
//! to the engine. Everything else is recovered at the analysis step that
//! produced it and downgraded to a logged warning.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Pisces operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Pisces
#[derive(Error, Debug)]
pub enum Error {
    /// DevTools protocol error
    #[error("CDP error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Navigation failed
    #[error("Navigation failed to {url}: {reason}")]
    NavigationFailed { url: String, reason: String },

    /// Timeout error
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        url: Option<String>,
    },

    /// Task named an action the engine does not know
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// A capture was started while another one was still active
    #[error("crawler capture already in progress")]
    CaptureInProgress,

    /// Crawler finished without producing a visit
    #[error("no visit from crawler")]
    NoVisit,

    /// Browser session could not be started
    #[error("Browser session failed to start: {0}")]
    SessionStart(String),

    /// Engine no longer accepts tasks
    #[error("Engine has been shut down")]
    EngineClosed,

    /// Detection rule could not be loaded
    #[error("Invalid rule {path}: {reason}")]
    Rule { path: PathBuf, reason: String },

    /// Detection condition could not be parsed
    #[error("Invalid condition '{condition}': {reason}")]
    Condition { condition: String, reason: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a navigation error
    pub fn navigation_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::NavigationFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error with URL
    pub fn timeout_with_url(
        operation: impl Into<String>,
        duration_ms: u64,
        url: impl Into<String>,
    ) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration_ms,
            url: Some(url.into()),
        }
    }

    /// Create a rule error
    pub fn rule(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Rule {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a condition error
    pub fn condition(condition: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Condition {
            condition: condition.into(),
            reason: reason.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add URL context to error
    fn with_url(self, url: &str) -> Result<T>;

    /// Add operation context to error
    fn context(self, msg: &str) -> Result<T>;
}

impl<T, E: Into<Error>> ErrorContext<T> for std::result::Result<T, E> {
    fn with_url(self, url: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            Error::Timeout {
                operation,
                duration_ms,
                ..
            } => Error::Timeout {
                operation,
                duration_ms,
                url: Some(url.to_string()),
            },
            Error::Cdp(err) => Error::navigation_failed(url, err.to_string()),
            other => other,
        })
    }

    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            Error::Other(format!("{}: {}", msg, err))
        })
    }
}
