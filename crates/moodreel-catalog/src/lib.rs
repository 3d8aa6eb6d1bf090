//! Movie catalog access.
//!
//! The bot only ever needs one question answered: "what is the most popular
//! movie in this genre right now?". [`MovieCatalog`] is that question; the
//! TMDB discovery endpoint is the production answer.

pub mod tmdb;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

pub use tmdb::TmdbCatalog;

pub const TMDB_API_BASE: &str = "https://api.themoviedb.org/3";
pub const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

pub const UNKNOWN_TITLE: &str = "Unknown title";
pub const NO_SYNOPSIS: &str = "No synopsis available.";

/// A single catalog hit, already normalised for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieResult {
    pub title: String,
    pub synopsis: String,
    pub poster_url: Option<String>,
    pub external_id: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog request timed out")]
    Timeout,
    #[error("catalog unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("catalog returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("catalog response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

impl CatalogError {
    /// Whether an immediate retry by the user has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Timeout | CatalogError::Transport(_) => true,
            CatalogError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            CatalogError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CatalogError::Timeout
        } else {
            CatalogError::Transport(err)
        }
    }
}

#[async_trait]
pub trait MovieCatalog: Send + Sync {
    /// Most popular movie for a provider genre id, or `None` when the
    /// provider has nothing in that genre.
    async fn top_by_genre(&self, genre_id: u32) -> Result<Option<MovieResult>, CatalogError>;
}

fn default_base_url() -> String {
    TMDB_API_BASE.to_string()
}

fn default_image_base_url() -> String {
    TMDB_IMAGE_BASE.to_string()
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,
    /// Passed to the provider as `language`
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            image_base_url: default_image_base_url(),
            locale: default_locale(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl CatalogConfig {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_point_at_tmdb() {
        let config = CatalogConfig::default();
        assert_eq!(config.base_url, "https://api.themoviedb.org/3");
        assert_eq!(config.image_base_url, "https://image.tmdb.org/t/p/w500");
        assert_eq!(config.locale, "en-US");
        assert_eq!(config.timeout_secs, 10);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn config_deserializes_with_partial_fields() {
        let config: CatalogConfig =
            serde_json::from_value(serde_json::json!({"api_key": "k", "locale": "pt-BR"})).unwrap();
        assert_eq!(config.api_key, "k");
        assert_eq!(config.locale, "pt-BR");
        assert_eq!(config.base_url, TMDB_API_BASE);
    }

    #[test]
    fn status_errors_classify_retryable() {
        let server = CatalogError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        let auth = CatalogError::Status {
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
        };
        let throttled = CatalogError::Status {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
        };
        assert!(server.is_retryable());
        assert!(!auth.is_retryable());
        assert!(throttled.is_retryable());
        assert!(CatalogError::Timeout.is_retryable());
    }

    #[test]
    fn decode_error_is_not_retryable() {
        let err: CatalogError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("could not be decoded"));
    }
}
