use serde::Serialize;
use thiserror::Error;

use crate::feed::{FetchError, ParseError};
use crate::util::UrlValidationError;

/// Coarse classification of a failure, as published to the store and to
/// pass reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Network,
    Parse,
    UnsupportedFormat,
}

impl ErrorKind {
    /// Stable key a presentation layer can translate.
    ///
    /// Validation failures have two keys; use [`SyncError::message_key`]
    /// when the concrete error is at hand.
    pub fn message_key(self) -> &'static str {
        match self {
            ErrorKind::Validation => "invalid url",
            ErrorKind::Network => "network error",
            ErrorKind::Parse => "parsing error",
            ErrorKind::UnsupportedFormat => "doesn`t has rss",
        }
    }
}

/// A candidate URL was refused before any fetch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),
    #[error("Feed is already registered: {0}")]
    AlreadyExists(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Network(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::Network(_) => ErrorKind::Network,
            SyncError::Parse(ParseError::UnsupportedFormat(_)) => ErrorKind::UnsupportedFormat,
            SyncError::Parse(_) => ErrorKind::Parse,
        }
    }

    pub fn message_key(&self) -> &'static str {
        match self {
            SyncError::Validation(ValidationError::AlreadyExists(_)) => "already exists",
            other => other.kind().message_key(),
        }
    }
}

impl From<UrlValidationError> for SyncError {
    fn from(e: UrlValidationError) -> Self {
        SyncError::Validation(ValidationError::InvalidUrl(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_kinds() {
        let cases: Vec<(SyncError, ErrorKind, &str)> = vec![
            (
                UrlValidationError::Empty.into(),
                ErrorKind::Validation,
                "invalid url",
            ),
            (
                ValidationError::AlreadyExists("https://a.example/rss".into()).into(),
                ErrorKind::Validation,
                "already exists",
            ),
            (
                FetchError::Timeout(Duration::from_secs(10)).into(),
                ErrorKind::Network,
                "network error",
            ),
            (
                ParseError::Malformed("eof".into()).into(),
                ErrorKind::Parse,
                "parsing error",
            ),
            (
                ParseError::MissingElement("channel").into(),
                ErrorKind::Parse,
                "parsing error",
            ),
            (
                ParseError::UnsupportedFormat("html".into()).into(),
                ErrorKind::UnsupportedFormat,
                "doesn`t has rss",
            ),
        ];

        for (error, kind, key) in cases {
            assert_eq!(error.kind(), kind, "{error}");
            assert_eq!(error.message_key(), key, "{error}");
        }
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::UnsupportedFormat).unwrap(),
            "\"unsupported_format\""
        );
    }
}
