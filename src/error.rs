use std::fmt;
use thiserror::Error;
use url::Url;

/// Error type provider bodies return; normalized into [`QueryError`] at the dispatch boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryErrorKind {
    /// Empty or invalid query text
    Parameter,
    /// A user-configurable provider has no credentials
    MissingSecretKey,
    /// Language pair is outside the provider's table
    UnsupportedLanguage,
    /// Remote call failed or returned an unexpected shape
    Api,
    /// Request succeeded but produced nothing usable
    NoResult,
    /// Provider does not implement the requested capability
    Unsupported,
    Unknown,
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QueryErrorKind::Parameter => "Parameter error",
            QueryErrorKind::MissingSecretKey => "Missing secret key",
            QueryErrorKind::UnsupportedLanguage => "Unsupported language",
            QueryErrorKind::Api => "API error",
            QueryErrorKind::NoResult => "No result",
            QueryErrorKind::Unsupported => "Unsupported",
            QueryErrorKind::Unknown => "Unknown error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}{}", message_suffix(.message))]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub message: Option<String>,
    /// Raw detail reported by the provider, if any
    pub error_data_message: Option<String>,
    /// Signup or configuration link the caller can render as a call-to-action
    pub prompt_url: Option<Url>,
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_ref()
        .map(|m| format!(": {}", m))
        .unwrap_or_default()
}

impl QueryError {
    pub fn new(kind: QueryErrorKind) -> Self {
        Self {
            kind,
            message: None,
            error_data_message: None,
            prompt_url: None,
        }
    }

    pub fn with_message(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::new(kind)
        }
    }

    pub fn parameter(message: impl Into<String>) -> Self {
        Self::with_message(QueryErrorKind::Parameter, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::with_message(QueryErrorKind::Api, message)
    }

    pub fn no_result() -> Self {
        Self::new(QueryErrorKind::NoResult)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::with_message(QueryErrorKind::Unsupported, message)
    }

    pub fn data_message(mut self, detail: impl Into<String>) -> Self {
        self.error_data_message = Some(detail.into());
        self
    }

    pub fn prompt(mut self, url: Option<Url>) -> Self {
        self.prompt_url = url;
        self
    }

    /// Convert any provider failure into a `QueryError`.
    ///
    /// A boxed `QueryError` keeps its kind and payload. Transport and decoding
    /// failures map to `Api`; everything else lands in `Unknown`.
    pub fn normalize(error: BoxError) -> Self {
        let error = match error.downcast::<QueryError>() {
            Ok(query_error) => return *query_error,
            Err(other) => other,
        };

        if let Some(http) = error.downcast_ref::<reqwest::Error>() {
            let status = http
                .status()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "no status".to_string());
            return Self::api(http.to_string()).data_message(status);
        }

        if error.downcast_ref::<serde_json::Error>().is_some() {
            return Self::api("Unexpected response format").data_message(error.to_string());
        }

        Self::with_message(QueryErrorKind::Unknown, error.to_string())
    }
}

impl From<BoxError> for QueryError {
    fn from(error: BoxError) -> Self {
        Self::normalize(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_keeps_query_error() {
        let original = QueryError::with_message(QueryErrorKind::UnsupportedLanguage, "xx");
        let boxed: BoxError = Box::new(original.clone());
        assert_eq!(QueryError::normalize(boxed), original);
    }

    #[test]
    fn test_normalize_json_error_is_api() {
        let parse_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let normalized = QueryError::normalize(Box::new(parse_error));
        assert_eq!(normalized.kind, QueryErrorKind::Api);
        assert!(normalized.error_data_message.is_some());
    }

    #[test]
    fn test_normalize_foreign_error_is_unknown() {
        let boxed: BoxError = "socket closed".into();
        let normalized = QueryError::normalize(boxed);
        assert_eq!(normalized.kind, QueryErrorKind::Unknown);
        assert_eq!(normalized.message.as_deref(), Some("socket closed"));
    }

    #[test]
    fn test_display() {
        assert_eq!(QueryError::no_result().to_string(), "No result");
        assert_eq!(QueryError::api("HTTP 500").to_string(), "API error: HTTP 500");
    }
}
