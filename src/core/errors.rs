//! Custom error types for translation and pipeline operations

use thiserror::Error;

/// Errors raised by a single call to the translation service
#[derive(Error, Debug)]
pub enum TranslationError {
    /// API request failed
    #[error("API error: {status} - {message}")]
    ApiError {
        status: u16,
        message: String,
    },

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Retry after {retry_after:?} seconds")]
    RateLimitError {
        retry_after: Option<u64>,
    },

    /// Network error
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
    },

    /// Invalid or empty response from API
    #[error("Invalid response: {message}")]
    InvalidResponseError {
        message: String,
    },

    /// Request timeout
    #[error("Request timeout after {timeout_ms} ms")]
    TimeoutError {
        timeout_ms: u64,
    },

    /// Credentials are not configured
    #[error("Missing credentials: {field}")]
    MissingCredentials {
        field: String,
    },

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TranslationError {
    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            TranslationError::NetworkError { .. }
            | TranslationError::TimeoutError { .. }
            | TranslationError::RateLimitError { .. }
            | TranslationError::HttpError(_) => true,
            TranslationError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Errors raised by the documentation pipeline
#[derive(Error, Debug)]
pub enum DocsError {
    /// Configuration error, fatal before any file is processed
    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },

    /// File operation error
    #[error("File error: {path} - {message}")]
    File {
        path: String,
        message: String,
    },

    /// Translation failure surfaced to the pipeline
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Regex construction error
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl DocsError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        DocsError::Config {
            message: message.into(),
        }
    }

    /// Shorthand for a file error carrying the offending path
    pub fn file(path: impl AsRef<std::path::Path>, message: impl ToString) -> Self {
        DocsError::File {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, DocsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TranslationError::NetworkError { message: "reset".into() }.is_transient());
        assert!(TranslationError::TimeoutError { timeout_ms: 10 }.is_transient());
        assert!(TranslationError::ApiError { status: 503, message: String::new() }.is_transient());
        assert!(!TranslationError::ApiError { status: 400, message: String::new() }.is_transient());
        assert!(!TranslationError::MissingCredentials { field: "token".into() }.is_transient());
        assert!(!TranslationError::InvalidResponseError { message: "empty".into() }.is_transient());
    }

    #[test]
    fn test_file_error_carries_path() {
        let err = DocsError::file("docs/a.md", "denied");
        assert_eq!(err.to_string(), "File error: docs/a.md - denied");
    }
}
