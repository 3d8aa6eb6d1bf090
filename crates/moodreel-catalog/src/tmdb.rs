//! TMDB discovery client
//!
//! https://developer.themoviedb.org/reference/discover-movie

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::{CatalogConfig, CatalogError, MovieCatalog, MovieResult, NO_SYNOPSIS, UNKNOWN_TITLE};

#[derive(Debug, Clone)]
pub struct TmdbCatalog {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    image_base_url: String,
    locale: String,
}

impl TmdbCatalog {
    pub fn new(config: &CatalogConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            image_base_url: config.image_base_url.clone(),
            locale: config.locale.clone(),
        }
    }

    fn discover_url(&self) -> String {
        format!("{}/discover/movie", self.base_url)
    }

    fn to_result(&self, movie: DiscoverMovie) -> MovieResult {
        let title = movie
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        let synopsis = movie
            .overview
            .filter(|o| !o.trim().is_empty())
            .unwrap_or_else(|| NO_SYNOPSIS.to_string());
        let poster_url = movie
            .poster_path
            .filter(|p| !p.is_empty())
            .map(|path| format!("{}{}", self.image_base_url, path));

        MovieResult {
            title,
            synopsis,
            poster_url,
            external_id: movie.id,
        }
    }
}

#[async_trait]
impl MovieCatalog for TmdbCatalog {
    async fn top_by_genre(&self, genre_id: u32) -> Result<Option<MovieResult>, CatalogError> {
        tracing::debug!(genre_id, locale = %self.locale, "querying tmdb discover");

        let genre = genre_id.to_string();
        let resp = self
            .client
            .get(self.discover_url())
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("with_genres", genre.as_str()),
                ("language", self.locale.as_str()),
                ("sort_by", "popularity.desc"),
            ])
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(CatalogError::Status {
                status,
                body: truncate_body(&text),
            });
        }

        let body: DiscoverResponse = serde_json::from_str(&text)?;
        let top = body.results.into_iter().next();
        if top.is_none() {
            tracing::info!(genre_id, "tmdb returned no results");
        }
        Ok(top.map(|movie| self.to_result(movie)))
    }
}

fn truncate_body(text: &str) -> String {
    const MAX: usize = 200;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct DiscoverResponse {
    #[serde(default)]
    results: Vec<DiscoverMovie>,
}

#[derive(Debug, Deserialize)]
struct DiscoverMovie {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    poster_path: Option<String>,
}
