//! Loading of the movie corpus: one csv file per table, failing on the first
//! malformed record.
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::info;

use crate::error::{PipelineError, Result};

mod date_format {
    use chrono::NaiveDate;
    use serde::{self, Deserialize, Deserializer};
    const FMT: &str = "%Y-%m-%d";

    pub fn deserialize<'de, D>(d: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        NaiveDate::parse_from_str(s.trim(), FMT).map_err(serde::de::Error::custom)
    }
}

/// Base table row, one per movie.
#[derive(Debug, Clone, Deserialize)]
pub struct MovieRecord {
    pub movie_id: i64,
    pub name: String,
    #[serde(deserialize_with = "date_format::deserialize")]
    pub release_date: NaiveDate,
    pub revenue: Option<f64>,
    pub runtime: Option<f64>,
    pub average_rating: f64,
    pub num_votes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActorRecord {
    pub actor_id: String,
    pub gender: Option<String>,
}

/// Credit of an actor on a movie; the age is the age at release.
#[derive(Debug, Clone, Deserialize)]
pub struct AppearsIn {
    pub movie_id: i64,
    pub actor_id: String,
    pub actor_age: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComesFrom {
    pub movie_id: i64,
    pub country_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IsOfType {
    pub movie_id: i64,
    pub genre_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageRecord {
    pub language_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpokenLanguage {
    pub movie_id: i64,
    pub language_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CharacterRecord {
    pub character_id: String,
    pub character_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BelongsTo {
    pub movie_id: i64,
    pub character_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectorRecord {
    pub director_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IsDirectedBy {
    pub movie_id: i64,
    pub director_id: String,
}

/// Every table the feature builder consumes.
#[derive(Debug, Clone, Default)]
pub struct MovieCorpus {
    pub movies: Vec<MovieRecord>,
    pub actors: Vec<ActorRecord>,
    pub appears_in: Vec<AppearsIn>,
    pub comes_from: Vec<ComesFrom>,
    pub is_of_type: Vec<IsOfType>,
    pub languages: Vec<LanguageRecord>,
    pub spoken_languages: Vec<SpokenLanguage>,
    pub characters: Vec<CharacterRecord>,
    pub belongs_to: Vec<BelongsTo>,
    pub directors: Vec<DirectorRecord>,
    pub is_directed_by: Vec<IsDirectedBy>,
}

impl MovieCorpus {
    /// Loads every table from `dir`, lower-casing country and genre labels.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut corpus = Self {
            movies: load_csv(&dir.join("movies.csv"))?,
            actors: load_csv(&dir.join("actors.csv"))?,
            appears_in: load_csv(&dir.join("appears_in.csv"))?,
            comes_from: load_csv(&dir.join("comes_from.csv"))?,
            is_of_type: load_csv(&dir.join("is_of_type.csv"))?,
            languages: load_csv(&dir.join("languages.csv"))?,
            spoken_languages: load_csv(&dir.join("spoken_languages.csv"))?,
            characters: load_csv(&dir.join("characters.csv"))?,
            belongs_to: load_csv(&dir.join("belongs_to.csv"))?,
            directors: load_csv(&dir.join("directors.csv"))?,
            is_directed_by: load_csv(&dir.join("is_directed_by.csv"))?,
        };
        for row in &mut corpus.comes_from {
            row.country_name = row.country_name.trim().to_lowercase();
        }
        for row in &mut corpus.is_of_type {
            row.genre_name = row.genre_name.trim().to_lowercase();
        }
        for row in &mut corpus.languages {
            row.language_name = row.language_name.trim().to_string();
        }
        for row in &mut corpus.spoken_languages {
            row.language_name = row.language_name.trim().to_string();
        }
        for row in &mut corpus.characters {
            row.character_name = row.character_name.trim().to_string();
        }
        info!(
            movies = corpus.movies.len(),
            credits = corpus.appears_in.len(),
            directors = corpus.is_directed_by.len(),
            "loaded corpus from {}",
            dir.display()
        );
        Ok(corpus)
    }
}

/// Reads a headed csv file into typed records.
pub fn load_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut rdr = ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(true)
        .trim(csv::Trim::Fields)
        .from_reader(file);

    rdr.deserialize()
        .collect::<std::result::Result<Vec<T>, csv::Error>>()
        .map_err(|source| PipelineError::Csv {
            path: PathBuf::from(path),
            source,
        })
}
