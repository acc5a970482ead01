//! Track record of each movie's directing team, restricted to what was known
//! before the movie came out.
use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::error::{PipelineError, Result};
use crate::io::MovieCorpus;

/// Release date and rating of a movie, as seen by the history lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Release {
    pub date: NaiveDate,
    pub rating: f64,
}

/// Per-movie director columns, aligned with the base table rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectorFeatures {
    pub num_directors: Vec<Option<f64>>,
    pub movie_num: Vec<Option<f64>>,
    pub best_rating: Vec<Option<f64>>,
    pub success: Vec<Option<f64>>,
}

/// Number of movies and best rating among `filmography` released strictly
/// before `cutoff`.
///
/// Returns `(0, None)` when nothing qualifies.
pub fn director_metrics_up_to_date(
    releases: &HashMap<i64, Release>,
    filmography: &BTreeSet<i64>,
    cutoff: NaiveDate,
) -> (usize, Option<f64>) {
    let prior = filmography
        .iter()
        .filter_map(|id| releases.get(id))
        .filter(|r| r.date < cutoff);

    let mut count = 0;
    let mut best: Option<f64> = None;
    for release in prior {
        count += 1;
        best = Some(best.map_or(release.rating, |b| b.max(release.rating)));
    }
    (count, best)
}

/// Computes the director columns for every movie of the corpus.
///
/// A team's filmography is the union of every movie directed by any of its
/// members, so co-directed work and the movie itself are included; the date
/// cutoff removes the latter.
pub fn resolve(
    corpus: &MovieCorpus,
    row_of: &HashMap<i64, usize>,
    success_threshold: f64,
) -> Result<DirectorFeatures> {
    let releases: HashMap<i64, Release> = corpus
        .movies
        .iter()
        .map(|m| {
            (
                m.movie_id,
                Release {
                    date: m.release_date,
                    rating: m.average_rating,
                },
            )
        })
        .collect();

    let mut filmographies: HashMap<&str, BTreeSet<i64>> = corpus
        .directors
        .iter()
        .map(|d| (d.director_id.as_str(), BTreeSet::new()))
        .collect();
    let mut teams: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); corpus.movies.len()];
    for link in &corpus.is_directed_by {
        let &row = row_of
            .get(&link.movie_id)
            .ok_or_else(|| PipelineError::DanglingReference {
                table: "is_directed_by",
                entity: "movie",
                key: link.movie_id.to_string(),
            })?;
        filmographies
            .get_mut(link.director_id.as_str())
            .ok_or_else(|| PipelineError::DanglingReference {
                table: "is_directed_by",
                entity: "director",
                key: link.director_id.clone(),
            })?
            .insert(link.movie_id);
        teams[row].insert(link.director_id.as_str());
    }

    let n = corpus.movies.len();
    let mut features = DirectorFeatures {
        num_directors: Vec::with_capacity(n),
        movie_num: Vec::with_capacity(n),
        best_rating: Vec::with_capacity(n),
        success: Vec::with_capacity(n),
    };
    for (movie, team) in corpus.movies.iter().zip(&teams) {
        let combined: BTreeSet<i64> = team
            .iter()
            .flat_map(|d| filmographies[d].iter().copied())
            .collect();
        let (count, best) = director_metrics_up_to_date(&releases, &combined, movie.release_date);
        let success = best.is_some_and(|b| b > success_threshold);

        features.num_directors.push(Some(team.len() as f64));
        features.movie_num.push(Some(count as f64));
        features.best_rating.push(best);
        features.success.push(Some(if success { 1.0 } else { 0.0 }));
    }
    Ok(features)
}
