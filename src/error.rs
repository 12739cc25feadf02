// Error taxonomy
//
// Provider, template, parse and store failures are kept as separate enums so
// callers can match on the layer that failed. `Error` wraps them all for the
// engines; the binary converts to anyhow at the edge.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures talking to a remote chat-completion API
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider}: authentication failed: {message}")]
    Auth { provider: String, message: String },

    #[error("{provider}: quota or rate limit exceeded: {message}")]
    Quota { provider: String, message: String },

    #[error("{provider}: network failure: {message}")]
    Network { provider: String, message: String },

    #[error("{provider}: request timed out after {after:?}")]
    Timeout { provider: String, after: Duration },

    #[error("{provider}: API request failed\n\nStatus: {status}\nBody: {body}")]
    Api {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider}: malformed response: {message}")]
    MalformedResponse { provider: String, message: String },

    #[error("provider configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Map a non-success HTTP status to the matching error kind
    pub fn from_status(provider: &str, status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Auth {
                provider: provider.to_string(),
                message: body,
            },
            429 => Self::Quota {
                provider: provider.to_string(),
                message: body,
            },
            _ => Self::Api {
                provider: provider.to_string(),
                status,
                body,
            },
        }
    }

    /// Classify a transport error from reqwest
    pub fn from_transport(provider: &str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider: provider.to_string(),
                after: timeout,
            }
        } else if err.is_decode() {
            Self::MalformedResponse {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        } else {
            Self::Network {
                provider: provider.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Whether a bounded retry may succeed
    ///
    /// Auth, config and malformed responses never get better on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::Quota { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Auth { .. } | Self::MalformedResponse { .. } | Self::Config(_) => false,
        }
    }

    /// Short label used in logs and failure markers
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::Quota { .. } => "quota",
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
            Self::Api { .. } => "api",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::Config(_) => "config",
        }
    }
}

/// Template lookup and rendering failures
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template '{name}' not found")]
    NotFound { name: String },

    #[error("template '{template}' references a missing variable: {detail}")]
    MissingVariable { template: String, detail: String },

    #[error("template '{template}' failed to render: {detail}")]
    Render { template: String, detail: String },

    #[error("template '{template}' has a syntax error: {detail}")]
    Syntax { template: String, detail: String },
}

/// The model reply did not have the expected structured shape
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no JSON object found in model reply\n\nRaw reply:\n{raw}")]
    NoJson { raw: String },

    #[error("model reply JSON has the wrong shape: {detail}\n\nRaw reply:\n{raw}")]
    Shape { raw: String, detail: String },
}

impl ParseError {
    /// The unmodified model reply
    pub fn raw(&self) -> &str {
        match self {
            Self::NoJson { raw } | Self::Shape { raw, .. } => raw,
        }
    }
}

/// File-backed store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} record '{id}' not found")]
    NotFound { collection: String, id: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize record for {path}: {detail}")]
    Serialize { path: PathBuf, detail: String },

    #[error("failed to deserialize record at {path}: {detail}")]
    Deserialize { path: PathBuf, detail: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Crate-level error returned by the engines
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("exploration session '{0}' is finalized")]
    SessionFinalized(String),

    #[error("validation '{0}' has no successful responses to analyze")]
    NoResponses(String),
}

impl Error {
    /// True when the underlying cause is a missing record
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound { .. }))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ProviderError::from_status("openai", 401, String::new()),
            ProviderError::Auth { .. }
        ));
        assert!(matches!(
            ProviderError::from_status("openai", 403, String::new()),
            ProviderError::Auth { .. }
        ));
        assert!(matches!(
            ProviderError::from_status("zhipu", 429, String::new()),
            ProviderError::Quota { .. }
        ));
        assert!(matches!(
            ProviderError::from_status("claude", 500, "boom".into()),
            ProviderError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_retryable_kinds() {
        let auth = ProviderError::from_status("openai", 401, String::new());
        assert!(!auth.is_retryable());

        let quota = ProviderError::from_status("openai", 429, String::new());
        assert!(quota.is_retryable());

        let bad_request = ProviderError::from_status("openai", 400, String::new());
        assert!(!bad_request.is_retryable());

        let server = ProviderError::from_status("openai", 503, String::new());
        assert!(server.is_retryable());

        let timeout = ProviderError::Timeout {
            provider: "openai".into(),
            after: Duration::from_secs(1),
        };
        assert!(timeout.is_retryable());
    }

    #[test]
    fn test_parse_error_keeps_raw_reply() {
        let err = ParseError::NoJson {
            raw: "just prose".into(),
        };
        assert_eq!(err.raw(), "just prose");
        assert!(err.to_string().contains("just prose"));
    }

    #[test]
    fn test_not_found_helper() {
        let err: Error = StoreError::NotFound {
            collection: "characters".into(),
            id: "abc".into(),
        }
        .into();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "characters record 'abc' not found");
    }
}
