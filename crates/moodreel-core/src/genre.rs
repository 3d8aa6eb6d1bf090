//! Mood keyword to genre resolution.
//!
//! Rules are evaluated in declaration order and the first keyword found in
//! the (lowercased) text wins, so "sad but excited" resolves through `sad`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreEntry {
    pub name: String,
    /// Provider genre id
    pub id: u32,
}

impl GenreEntry {
    pub fn new(name: impl Into<String>, id: u32) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodRule {
    pub keyword: String,
    pub genre: String,
}

impl MoodRule {
    pub fn new(keyword: impl Into<String>, genre: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            genre: genre.into(),
        }
    }
}

pub fn default_genres() -> Vec<GenreEntry> {
    vec![
        GenreEntry::new("action", 28),
        GenreEntry::new("comedy", 35),
        GenreEntry::new("drama", 18),
        GenreEntry::new("horror", 27),
        GenreEntry::new("romance", 10749),
    ]
}

pub fn default_mood_rules() -> Vec<MoodRule> {
    vec![
        MoodRule::new("sad", "romance"),
        MoodRule::new("happy", "comedy"),
        MoodRule::new("bored", "horror"),
        MoodRule::new("excited", "action"),
    ]
}

/// Immutable genre name to id table.
#[derive(Debug, Clone)]
pub struct GenreTable {
    entries: Vec<GenreEntry>,
}

impl GenreTable {
    pub fn new(entries: Vec<GenreEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| GenreEntry::new(e.name.to_lowercase(), e.id))
            .collect();
        Self { entries }
    }

    pub fn id_of(&self, genre: &str) -> Option<u32> {
        let genre = genre.to_lowercase();
        self.entries.iter().find(|e| e.name == genre).map(|e| e.id)
    }
}

impl Default for GenreTable {
    fn default() -> Self {
        Self::new(default_genres())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No mood keyword in the text
    NoMatch,
    /// A rule matched but its genre is not in the table
    GenreNotFound { mood: String, genre: String },
    Genre {
        mood: String,
        genre: String,
        genre_id: u32,
    },
}

#[derive(Debug, Clone)]
pub struct MoodResolver {
    rules: Vec<MoodRule>,
    table: GenreTable,
}

impl MoodResolver {
    pub fn new(rules: Vec<MoodRule>, table: GenreTable) -> Self {
        let rules = rules
            .into_iter()
            .map(|r| MoodRule::new(r.keyword.to_lowercase(), r.genre.to_lowercase()))
            .collect();
        Self { rules, table }
    }

    pub fn rules(&self) -> &[MoodRule] {
        &self.rules
    }

    pub fn table(&self) -> &GenreTable {
        &self.table
    }

    pub fn resolve(&self, text: &str) -> Resolution {
        let text = text.to_lowercase();
        let Some(rule) = self
            .rules
            .iter()
            .find(|r| !r.keyword.is_empty() && text.contains(&r.keyword))
        else {
            return Resolution::NoMatch;
        };

        match self.table.id_of(&rule.genre) {
            Some(genre_id) => Resolution::Genre {
                mood: rule.keyword.clone(),
                genre: rule.genre.clone(),
                genre_id,
            },
            None => Resolution::GenreNotFound {
                mood: rule.keyword.clone(),
                genre: rule.genre.clone(),
            },
        }
    }
}

impl Default for MoodResolver {
    fn default() -> Self {
        Self::new(default_mood_rules(), GenreTable::default())
    }
}
