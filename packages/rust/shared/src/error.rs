//! Error types for SiteSense.
//!
//! Library crates use [`SiteSenseError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all SiteSense operations.
#[derive(Debug, thiserror::Error)]
pub enum SiteSenseError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during fetch or robots.txt lookup.
    #[error("network error: {0}")]
    Network(String),

    /// Structured data could not be parsed (e.g. no JSON in an LLM response).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Caller-supplied input is missing or malformed.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The target site forbids scraping (robots.txt disallow).
    #[error("policy error: {0}")]
    Policy(String),

    /// The headless browser process or context could not be started.
    #[error("browser init error: {0}")]
    BrowserInit(String),

    /// Page creation, navigation, or content read failed.
    #[error("navigation error at {url}: {message}")]
    Navigation { url: String, message: String },

    /// LLM provider call failed or timed out.
    #[error("provider error: {0}")]
    Provider(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SiteSenseError>;

/// Coarse error classes that callers map to user-visible outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing input.
    Validation,
    /// Robots.txt (or similar) refused access.
    Policy,
    /// Browser, page, or network acquisition failure.
    Resource,
    /// LLM call or response parsing failure.
    Provider,
    /// Anything else (config, I/O).
    Internal,
}

impl SiteSenseError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a navigation error for `url`.
    pub fn navigation(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error for status mapping and propagation decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Policy(_) => ErrorKind::Policy,
            Self::Network(_) | Self::BrowserInit(_) | Self::Navigation { .. } => {
                ErrorKind::Resource
            }
            Self::Provider(_) | Self::Parse { .. } => ErrorKind::Provider,
            Self::Config { .. } | Self::Io { .. } => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = SiteSenseError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = SiteSenseError::navigation("https://shop.example/", "timed out after 30s");
        assert!(err.to_string().contains("https://shop.example/"));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            SiteSenseError::validation("bad url").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            SiteSenseError::Policy("disallowed".into()).kind(),
            ErrorKind::Policy
        );
        assert_eq!(
            SiteSenseError::BrowserInit("no chrome".into()).kind(),
            ErrorKind::Resource
        );
        assert_eq!(SiteSenseError::parse("no json").kind(), ErrorKind::Provider);
        assert_eq!(SiteSenseError::config("x").kind(), ErrorKind::Internal);
    }
}
