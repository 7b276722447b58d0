//! Error types for configuration, the Mastodon API boundary, and state
//! persistence.

use thiserror::Error;

/// Fatal startup configuration errors.
///
/// Any of these aborts the process with a non-zero exit code; there is no
/// recovery path for a bot that cannot read its credentials.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Auth or settings document could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid YAML.
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// `bot_account.server` / `bot_account.access_token` missing or empty.
    #[error("bot account config is incomplete or missing: {0}")]
    IncompleteBotAccount(String),
}

/// Errors from the Mastodon API surface.
///
/// HTTP statuses the engine reacts to get their own variants so the
/// publisher can translate them into skip reasons without string matching.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("network error: {source}")]
    Network {
        #[source]
        source: reqwest::Error,
    },

    /// 404 — the host does not know the entity.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// 401/403 — token missing, expired, or lacking the required scope.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// 429 after retries were exhausted.
    #[error("rate limited by host")]
    RateLimited,

    /// Any other non-success HTTP status.
    #[error("api returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Response body was not the expected JSON shape.
    #[error("failed to parse api response: {message}")]
    Parse { message: String },

    /// App-credential file could not be read or written.
    #[error("credential store error at {path}: {source}")]
    CredentialStore {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    /// Whether this error means the publishing host has no local copy of
    /// the entity (the trigger for the federation fallback).
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Whether this error is an authentication/authorization failure.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

/// State persistence errors. Load failures are swallowed into a fresh
/// state by the caller; save failures are logged and retried on the next
/// successful publish.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot write state file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize state: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_not_found_predicate() {
        let err = ApiError::NotFound {
            message: "Record not found".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_unauthorized());

        let err = ApiError::Http {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn api_error_unauthorized_predicate() {
        let err = ApiError::Unauthorized {
            message: "This action is outside the authorized scopes".to_string(),
        };
        assert!(err.is_unauthorized());
        assert!(!err.is_not_found());
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::IncompleteBotAccount("missing access_token".to_string());
        assert_eq!(
            err.to_string(),
            "bot account config is incomplete or missing: missing access_token"
        );
    }
}
