//! Per-movie aggregation of the one-to-many relation tables into the raw
//! regression table.
use std::collections::{HashMap, HashSet};

use chrono::Datelike;
use tracing::{debug, info};

use crate::director;
use crate::encoder::CategoryEncoder;
use crate::error::{PipelineError, Result};
use crate::io::MovieCorpus;
use crate::stats;
use crate::table::{ColumnData, FeatureTable};

/// Encoders injected into the feature builder.
#[derive(Debug, Clone)]
pub struct Encoders {
    pub continents: CategoryEncoder,
    pub genres: CategoryEncoder,
}

/// Corpus-wide constants of the feature builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureParams {
    /// Appearance-count percentile from which an actor counts as famous.
    pub top_actor_percentile: f64,
    pub k_languages: usize,
    pub k_characters: usize,
    /// A team whose best prior rating exceeds this is a successful team.
    pub director_success_threshold: f64,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            top_actor_percentile: 99.0,
            k_languages: 5,
            k_characters: 20,
            director_success_threshold: 7.5,
        }
    }
}

type Columns = Vec<(String, Vec<Option<f64>>)>;

/// Builds the raw regression table: one row per movie of the base table.
pub fn build_feature_table(
    corpus: &MovieCorpus,
    encoders: &Encoders,
    params: &FeatureParams,
) -> Result<FeatureTable> {
    let row_of = index_movies(corpus)?;
    let movies = &corpus.movies;
    let mut table = FeatureTable::new(movies.iter().map(|m| m.movie_id).collect());

    table.insert(
        "name",
        ColumnData::Text(movies.iter().map(|m| Some(m.name.clone())).collect()),
    );
    table.insert(
        "release_date",
        ColumnData::Date(movies.iter().map(|m| Some(m.release_date)).collect()),
    );
    table.insert_numeric("revenue", movies.iter().map(|m| m.revenue).collect());
    table.insert_numeric("runtime", movies.iter().map(|m| m.runtime).collect());
    table.insert_numeric(
        "average_rating",
        movies.iter().map(|m| Some(m.average_rating)).collect(),
    );
    table.insert_numeric(
        "num_votes",
        movies.iter().map(|m| Some(m.num_votes as f64)).collect(),
    );

    let groups = [
        continent_features(corpus, &row_of, &encoders.continents)?,
        actor_features(corpus, &row_of, params.top_actor_percentile)?,
        genre_features(corpus, &row_of, &encoders.genres)?,
        language_features(corpus, &row_of, params.k_languages)?,
        character_features(corpus, &row_of, params.k_characters)?,
    ];
    for (name, values) in groups.into_iter().flatten() {
        table.insert_numeric(name, values);
    }

    table.insert_numeric(
        "decade",
        movies
            .iter()
            .map(|m| Some(f64::from(decade_of(m.release_date.year()))))
            .collect(),
    );
    table.insert_numeric(
        "title_length",
        movies
            .iter()
            .map(|m| Some(m.name.split_whitespace().count() as f64))
            .collect(),
    );

    let directors = director::resolve(corpus, &row_of, params.director_success_threshold)?;
    table.insert_numeric("combinned_movie_num", directors.movie_num);
    table.insert_numeric("combinned_best_rating", directors.best_rating);
    table.insert_numeric("num_directors", directors.num_directors);
    table.insert_numeric("combinned_movie_success", directors.success);

    info!(
        rows = table.n_rows(),
        columns = table.columns().len(),
        "built feature table"
    );
    Ok(table)
}

/// Release year truncated to its decade, e.g. 1994 -> 1990.
pub fn decade_of(year: i32) -> i32 {
    year - year.rem_euclid(10)
}

fn index_movies(corpus: &MovieCorpus) -> Result<HashMap<i64, usize>> {
    let mut row_of = HashMap::with_capacity(corpus.movies.len());
    for (row, movie) in corpus.movies.iter().enumerate() {
        if row_of.insert(movie.movie_id, row).is_some() {
            return Err(PipelineError::DuplicateKey {
                table: "movies",
                key: movie.movie_id.to_string(),
            });
        }
    }
    Ok(row_of)
}

fn lookup(row_of: &HashMap<i64, usize>, table: &'static str, movie_id: i64) -> Result<usize> {
    row_of
        .get(&movie_id)
        .copied()
        .ok_or_else(|| PipelineError::DanglingReference {
            table,
            entity: "movie",
            key: movie_id.to_string(),
        })
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// OR-over-membership one-hot columns, one per canonical group.
fn one_hot_columns<'a>(
    rows: impl Iterator<Item = (i64, &'a str)>,
    row_of: &HashMap<i64, usize>,
    table: &'static str,
    encoder: &CategoryEncoder,
) -> Result<(Columns, Vec<usize>)> {
    let n = row_of.len();
    let mut membership = vec![vec![0_u8; encoder.groups().len()]; n];
    let mut counts = vec![0_usize; n];
    for (movie_id, label) in rows {
        let row = lookup(row_of, table, movie_id)?;
        let vector = encoder.encode_vector(label)?;
        for (m, v) in membership[row].iter_mut().zip(vector) {
            *m = (*m).max(v);
        }
        counts[row] += 1;
    }

    let columns = encoder
        .groups()
        .iter()
        .enumerate()
        .map(|(g, name)| {
            let values = membership
                .iter()
                .map(|m| Some(f64::from(m[g])))
                .collect();
            (name.clone(), values)
        })
        .collect();
    Ok((columns, counts))
}

/// A movie belongs to every continent any of its countries maps to.
fn continent_features(
    corpus: &MovieCorpus,
    row_of: &HashMap<i64, usize>,
    encoder: &CategoryEncoder,
) -> Result<Columns> {
    let rows = corpus
        .comes_from
        .iter()
        .map(|r| (r.movie_id, r.country_name.as_str()));
    let (columns, _) = one_hot_columns(rows, row_of, "comes_from", encoder)?;
    Ok(columns)
}

/// Canonical genre membership plus the raw genre count.
fn genre_features(
    corpus: &MovieCorpus,
    row_of: &HashMap<i64, usize>,
    encoder: &CategoryEncoder,
) -> Result<Columns> {
    let rows = corpus
        .is_of_type
        .iter()
        .map(|r| (r.movie_id, r.genre_name.as_str()));
    let (mut columns, counts) = one_hot_columns(rows, row_of, "is_of_type", encoder)?;
    columns.push((
        "genre_number".to_string(),
        counts.into_iter().map(|c| Some(c as f64)).collect(),
    ));
    Ok(columns)
}

/// Signed gender encoding: female +1, male -1, anything else excluded.
fn gender_sign(gender: Option<&str>) -> Option<f64> {
    match gender.map(str::trim) {
        Some(g) if g.eq_ignore_ascii_case("f") => Some(1.0),
        Some(g) if g.eq_ignore_ascii_case("m") => Some(-1.0),
        _ => None,
    }
}

fn actor_features(
    corpus: &MovieCorpus,
    row_of: &HashMap<i64, usize>,
    top_percentile: f64,
) -> Result<Columns> {
    let genders: HashMap<&str, Option<&str>> = corpus
        .actors
        .iter()
        .map(|a| (a.actor_id.as_str(), a.gender.as_deref()))
        .collect();

    let mut appearances: HashMap<&str, usize> = HashMap::new();
    for credit in &corpus.appears_in {
        if !genders.contains_key(credit.actor_id.as_str()) {
            return Err(PipelineError::DanglingReference {
                table: "appears_in",
                entity: "actor",
                key: credit.actor_id.clone(),
            });
        }
        *appearances.entry(credit.actor_id.as_str()).or_default() += 1;
    }

    // Computed once over the whole actor population, not per movie.
    let counts: Vec<f64> = appearances.values().map(|&c| c as f64).collect();
    let threshold = stats::percentile(&counts, top_percentile).unwrap_or(f64::INFINITY);
    debug!(threshold, actors = counts.len(), "famous actor threshold");

    let n = row_of.len();
    let mut number = vec![0_usize; n];
    let mut ages: Vec<Vec<f64>> = vec![Vec::new(); n];
    let mut signs: Vec<Vec<f64>> = vec![Vec::new(); n];
    let mut famous = vec![false; n];
    for credit in &corpus.appears_in {
        let row = lookup(row_of, "appears_in", credit.movie_id)?;
        let actor = credit.actor_id.as_str();
        number[row] += 1;
        ages[row].extend(credit.actor_age);
        signs[row].extend(gender_sign(genders[actor]));
        famous[row] |= appearances[actor] as f64 >= threshold;
    }

    Ok(vec![
        (
            "actor_number".to_string(),
            number.into_iter().map(|c| Some(c as f64)).collect(),
        ),
        (
            "mean_actor_age".to_string(),
            ages.iter().map(|a| stats::mean(a)).collect(),
        ),
        (
            "gender_ratio".to_string(),
            signs.iter().map(|s| stats::mean(s)).collect(),
        ),
        (
            "has_famous_actor".to_string(),
            famous.into_iter().map(|f| Some(flag(f))).collect(),
        ),
    ])
}

/// The `k` most frequent labels; ties go to the lexicographically smaller label.
fn top_k<'a>(labels: impl Iterator<Item = &'a str>, k: usize) -> HashSet<&'a str> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked.into_iter().take(k).map(|(label, _)| label).collect()
}

fn language_features(
    corpus: &MovieCorpus,
    row_of: &HashMap<i64, usize>,
    k: usize,
) -> Result<Columns> {
    let common = top_k(
        corpus.spoken_languages.iter().map(|r| r.language_name.as_str()),
        k,
    );
    debug!(?common, "most spoken languages");

    let known: HashSet<&str> = corpus
        .languages
        .iter()
        .map(|l| l.language_name.as_str())
        .collect();

    let n = row_of.len();
    let mut number = vec![0_usize; n];
    let mut has_common = vec![false; n];
    for spoken in &corpus.spoken_languages {
        let row = lookup(row_of, "spoken_languages", spoken.movie_id)?;
        if !known.contains(spoken.language_name.as_str()) {
            return Err(PipelineError::DanglingReference {
                table: "spoken_languages",
                entity: "language",
                key: spoken.language_name.clone(),
            });
        }
        number[row] += 1;
        has_common[row] |= common.contains(spoken.language_name.as_str());
    }

    Ok(vec![
        (
            "has_common_language".to_string(),
            has_common.into_iter().map(|f| Some(flag(f))).collect(),
        ),
        (
            "language_number".to_string(),
            number.into_iter().map(|c| Some(c as f64)).collect(),
        ),
    ])
}

fn character_features(
    corpus: &MovieCorpus,
    row_of: &HashMap<i64, usize>,
    k: usize,
) -> Result<Columns> {
    let common = top_k(
        corpus.characters.iter().map(|c| c.character_name.as_str()),
        k,
    );
    let names: HashMap<&str, &str> = corpus
        .characters
        .iter()
        .map(|c| (c.character_id.as_str(), c.character_name.as_str()))
        .collect();

    let n = row_of.len();
    let mut number = vec![0_usize; n];
    let mut has_common = vec![false; n];
    for link in &corpus.belongs_to {
        let row = lookup(row_of, "belongs_to", link.movie_id)?;
        let name = names.get(link.character_id.as_str()).ok_or_else(|| {
            PipelineError::DanglingReference {
                table: "belongs_to",
                entity: "character",
                key: link.character_id.clone(),
            }
        })?;
        number[row] += 1;
        has_common[row] |= common.contains(name);
    }

    Ok(vec![
        (
            "has_common_character_name".to_string(),
            has_common.into_iter().map(|f| Some(flag(f))).collect(),
        ),
        (
            "character_number".to_string(),
            number.into_iter().map(|c| Some(c as f64)).collect(),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Taxonomy;
    use crate::io::{
        ActorRecord, AppearsIn, BelongsTo, CharacterRecord, ComesFrom, IsOfType, LanguageRecord,
        MovieRecord, SpokenLanguage,
    };
    use chrono::NaiveDate;

    fn encoders() -> Encoders {
        let continents = Taxonomy::from_json(
            r#"{"groups": ["europe", "asia", "america"],
                "labels": {"france": ["europe"], "japan": ["asia"], "peru": ["america"]}}"#,
        )
        .unwrap();
        let genres = Taxonomy::from_json(
            r#"{"groups": ["horror", "comedy", "drama"],
                "labels": {"horror": ["horror"], "comedy": ["comedy"], "drama": ["drama"],
                           "horror comedy": ["horror", "comedy"], "world cinema": []}}"#,
        )
        .unwrap();
        Encoders {
            continents: CategoryEncoder::new("country", continents).unwrap(),
            genres: CategoryEncoder::new("genre", genres).unwrap(),
        }
    }

    fn movie(id: i64, name: &str, year: i32) -> MovieRecord {
        MovieRecord {
            movie_id: id,
            name: name.to_string(),
            release_date: NaiveDate::from_ymd_opt(year, 3, 1).unwrap(),
            revenue: None,
            runtime: Some(100.0),
            average_rating: 7.0,
            num_votes: 10,
        }
    }

    fn corpus() -> MovieCorpus {
        MovieCorpus {
            movies: vec![movie(1, "The Thing", 1982), movie(2, "Tokyo Story", 1953)],
            comes_from: vec![
                ComesFrom { movie_id: 1, country_name: "france".into() },
                ComesFrom { movie_id: 1, country_name: "japan".into() },
                ComesFrom { movie_id: 1, country_name: "france".into() },
            ],
            is_of_type: vec![
                IsOfType { movie_id: 1, genre_name: "horror".into() },
                IsOfType { movie_id: 1, genre_name: "comedy".into() },
                IsOfType { movie_id: 2, genre_name: "drama".into() },
            ],
            ..MovieCorpus::default()
        }
    }

    fn languages(names: &[&str]) -> Vec<LanguageRecord> {
        names
            .iter()
            .map(|n| LanguageRecord { language_name: (*n).to_string() })
            .collect()
    }

    fn col(table: &FeatureTable, name: &str) -> Vec<Option<f64>> {
        table.numeric(name).unwrap().to_vec()
    }

    #[test]
    fn decade_truncates_year() {
        assert_eq!(decade_of(1994), 1990);
        assert_eq!(decade_of(2000), 2000);
        assert_eq!(decade_of(1959), 1950);
    }

    #[test]
    fn genres_are_or_combined_per_movie() {
        let t = build_feature_table(&corpus(), &encoders(), &FeatureParams::default()).unwrap();
        assert_eq!(col(&t, "horror"), vec![Some(1.0), Some(0.0)]);
        assert_eq!(col(&t, "comedy"), vec![Some(1.0), Some(0.0)]);
        assert_eq!(col(&t, "drama"), vec![Some(0.0), Some(1.0)]);
        assert_eq!(col(&t, "genre_number"), vec![Some(2.0), Some(1.0)]);
    }

    #[test]
    fn multi_label_genre_counts_once_per_raw_label() {
        let mut c = corpus();
        c.is_of_type = vec![
            IsOfType { movie_id: 1, genre_name: "horror comedy".into() },
            IsOfType { movie_id: 1, genre_name: "horror".into() },
            IsOfType { movie_id: 2, genre_name: "world cinema".into() },
        ];
        let t = build_feature_table(&c, &encoders(), &FeatureParams::default()).unwrap();
        assert_eq!(col(&t, "horror"), vec![Some(1.0), Some(0.0)]);
        assert_eq!(col(&t, "comedy"), vec![Some(1.0), Some(0.0)]);
        assert_eq!(col(&t, "genre_number"), vec![Some(2.0), Some(1.0)]);
    }

    #[test]
    fn continents_are_memberships_not_counts() {
        let t = build_feature_table(&corpus(), &encoders(), &FeatureParams::default()).unwrap();
        assert_eq!(col(&t, "europe"), vec![Some(1.0), Some(0.0)]);
        assert_eq!(col(&t, "asia"), vec![Some(1.0), Some(0.0)]);
        // Movie 2 has no recorded country.
        let total: Vec<f64> = (0..2)
            .map(|row| {
                ["europe", "asia", "america"]
                    .iter()
                    .map(|c| col(&t, c)[row].unwrap())
                    .sum()
            })
            .collect();
        assert_eq!(total, vec![2.0, 0.0]);
    }

    #[test]
    fn unknown_country_is_rejected() {
        let mut c = corpus();
        c.comes_from.push(ComesFrom { movie_id: 2, country_name: "atlantis".into() });
        let err = build_feature_table(&c, &encoders(), &FeatureParams::default()).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownCategory { kind: "country", .. }));
    }

    #[test]
    fn relation_to_unknown_movie_is_rejected() {
        let mut c = corpus();
        c.is_of_type.push(IsOfType { movie_id: 42, genre_name: "drama".into() });
        let err = build_feature_table(&c, &encoders(), &FeatureParams::default()).unwrap_err();
        assert!(matches!(err, PipelineError::DanglingReference { table: "is_of_type", .. }));
    }

    #[test]
    fn duplicate_movie_ids_are_rejected() {
        let mut c = corpus();
        c.movies.push(movie(1, "Again", 1990));
        let err = build_feature_table(&c, &encoders(), &FeatureParams::default()).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateKey { .. }));
    }

    #[test]
    fn actor_aggregates() {
        let mut c = corpus();
        c.actors = vec![
            ActorRecord { actor_id: "a".into(), gender: Some("F".into()) },
            ActorRecord { actor_id: "b".into(), gender: Some("M".into()) },
            ActorRecord { actor_id: "c".into(), gender: None },
        ];
        c.appears_in = vec![
            AppearsIn { movie_id: 1, actor_id: "a".into(), actor_age: Some(30.0) },
            AppearsIn { movie_id: 1, actor_id: "b".into(), actor_age: Some(40.0) },
            AppearsIn { movie_id: 1, actor_id: "c".into(), actor_age: None },
            AppearsIn { movie_id: 2, actor_id: "a".into(), actor_age: Some(20.0) },
        ];
        let t = build_feature_table(&c, &encoders(), &FeatureParams::default()).unwrap();
        assert_eq!(col(&t, "actor_number"), vec![Some(3.0), Some(1.0)]);
        assert_eq!(col(&t, "mean_actor_age"), vec![Some(35.0), Some(20.0)]);
        // Unknown gender is left out of the mean.
        assert_eq!(col(&t, "gender_ratio"), vec![Some(0.0), Some(1.0)]);
        // Only "a" reaches the 99th percentile of appearance counts.
        assert_eq!(col(&t, "has_famous_actor"), vec![Some(1.0), Some(1.0)]);
    }

    #[test]
    fn credit_of_unknown_actor_is_rejected() {
        let mut c = corpus();
        c.appears_in = vec![AppearsIn { movie_id: 1, actor_id: "ghost".into(), actor_age: None }];
        let err = build_feature_table(&c, &encoders(), &FeatureParams::default()).unwrap_err();
        assert!(matches!(err, PipelineError::DanglingReference { entity: "actor", .. }));
    }

    #[test]
    fn common_languages_and_characters() {
        let mut c = corpus();
        c.languages = languages(&["english", "french", "japanese"]);
        c.spoken_languages = vec![
            SpokenLanguage { movie_id: 1, language_name: "english".into() },
            SpokenLanguage { movie_id: 1, language_name: "french".into() },
            SpokenLanguage { movie_id: 2, language_name: "japanese".into() },
        ];
        c.characters = vec![
            CharacterRecord { character_id: "c1".into(), character_name: "MacReady".into() },
            CharacterRecord { character_id: "c2".into(), character_name: "Shukichi".into() },
            CharacterRecord { character_id: "c3".into(), character_name: "Shukichi".into() },
        ];
        c.belongs_to = vec![
            BelongsTo { movie_id: 1, character_id: "c1".into() },
            BelongsTo { movie_id: 2, character_id: "c2".into() },
        ];
        let params = FeatureParams {
            k_languages: 1,
            k_characters: 1,
            ..FeatureParams::default()
        };
        let t = build_feature_table(&c, &encoders(), &params).unwrap();
        // Tie between the three languages goes to "english".
        assert_eq!(col(&t, "has_common_language"), vec![Some(1.0), Some(0.0)]);
        assert_eq!(col(&t, "language_number"), vec![Some(2.0), Some(1.0)]);
        assert_eq!(col(&t, "has_common_character_name"), vec![Some(0.0), Some(1.0)]);
        assert_eq!(col(&t, "character_number"), vec![Some(1.0), Some(1.0)]);
    }

    #[test]
    fn unknown_spoken_language_is_rejected() {
        let mut c = corpus();
        c.languages = languages(&["english"]);
        c.spoken_languages = vec![
            SpokenLanguage { movie_id: 1, language_name: "english".into() },
            SpokenLanguage { movie_id: 2, language_name: "klingon".into() },
        ];
        let err = build_feature_table(&c, &encoders(), &FeatureParams::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DanglingReference { entity: "language", key, .. } if key == "klingon"
        ));
    }

    #[test]
    fn title_length_and_decade_columns() {
        let t = build_feature_table(&corpus(), &encoders(), &FeatureParams::default()).unwrap();
        assert_eq!(col(&t, "title_length"), vec![Some(2.0), Some(2.0)]);
        assert_eq!(col(&t, "decade"), vec![Some(1980.0), Some(1950.0)]);
    }
}
