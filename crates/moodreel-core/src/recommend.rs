use std::sync::Arc;

use moodreel_catalog::{CatalogError, MovieCatalog, MovieResult};

use crate::genre::{MoodResolver, Resolution};
use crate::messages::{self, Reply};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recommendation {
    NoMatch,
    GenreNotFound { genre: String },
    NoMovieFound { genre: String },
    Movie { genre: String, movie: MovieResult },
}

impl Recommendation {
    pub fn to_reply(&self) -> Reply {
        match self {
            Recommendation::NoMatch => messages::no_match_guidance(),
            Recommendation::GenreNotFound { genre } => messages::genre_not_found(genre),
            Recommendation::NoMovieFound { .. } => messages::no_movie_found(),
            Recommendation::Movie { movie, .. } => messages::recommendation(movie),
        }
    }
}

pub struct Recommender {
    resolver: MoodResolver,
    catalog: Arc<dyn MovieCatalog>,
}

impl Recommender {
    pub fn new(resolver: MoodResolver, catalog: Arc<dyn MovieCatalog>) -> Self {
        Self { resolver, catalog }
    }

    /// Resolve the mood and, only when a known genre comes out of it, ask
    /// the catalog for its top title.
    pub async fn recommend(&self, text: &str) -> Result<Recommendation, CatalogError> {
        let (genre, genre_id) = match self.resolver.resolve(text) {
            Resolution::NoMatch => return Ok(Recommendation::NoMatch),
            Resolution::GenreNotFound { mood, genre } => {
                tracing::warn!(%mood, %genre, "mood rule points at a genre missing from the table");
                return Ok(Recommendation::GenreNotFound { genre });
            }
            Resolution::Genre {
                mood,
                genre,
                genre_id,
            } => {
                tracing::debug!(%mood, %genre, genre_id, "resolved mood");
                (genre, genre_id)
            }
        };

        match self.catalog.top_by_genre(genre_id).await? {
            Some(movie) => {
                tracing::info!(%genre, title = %movie.title, "recommending movie");
                Ok(Recommendation::Movie { genre, movie })
            }
            None => Ok(Recommendation::NoMovieFound { genre }),
        }
    }
}
