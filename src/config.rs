//! Transformation recipe and run parameters of a regression.
use std::path::Path;

use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::vif::VifFit;

/// Which rows to drop for holding missing values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<String>")]
pub enum NanFiltering {
    /// Any missing value in any remaining column drops the row.
    All,
    /// Only the listed columns are checked.
    Columns(Vec<String>),
    Off,
}

impl From<Vec<String>> for NanFiltering {
    fn from(columns: Vec<String>) -> Self {
        match columns.first().map(String::as_str) {
            None => NanFiltering::Off,
            Some("all") => NanFiltering::All,
            Some(_) => NanFiltering::Columns(columns),
        }
    }
}

/// How to turn the raw feature table into a regression table.
///
/// The decades to keep are deliberately not part of the recipe; they are
/// passed to each call, so one recipe can be shared across decade runs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegressionConfig {
    /// Columns removed before any transform.
    pub drop: Vec<String>,
    pub nan_filtering: NanFiltering,
    /// Columns that get an extra `log_<col>` column.
    pub log: Vec<String>,
    /// Columns standardized in place.
    pub standardize: Vec<String>,
    /// Columns removed once the targets are extracted.
    pub post_drop: Vec<String>,
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            drop: strings(&[
                "name",
                "revenue",
                "has_common_character_name",
                "has_common_language",
                "language_number",
                "character_number",
            ]),
            nan_filtering: NanFiltering::All,
            log: Vec::new(),
            standardize: strings(&["title_length"]),
            post_drop: strings(&[
                "release_date",
                "num_votes",
                "runtime",
                "decade",
                "average_rating",
                "combinned_best_rating",
            ]),
        }
    }
}

impl RegressionConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }
}

/// Scalar knobs of a regression run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunParams {
    /// Rating from which a movie counts as a success.
    pub success_threshold: f64,
    /// Significance level of the forward selection.
    pub alpha: f64,
    pub vif_threshold: f64,
    pub vif_fit: VifFit,
    /// Flip the binary target to study bad movies instead.
    pub invert: bool,
    /// Regress on the binary target instead of the raw rating.
    pub binary_target: bool,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            success_threshold: 7.5,
            alpha: 0.05,
            vif_threshold: 5.0,
            vif_fit: VifFit::Uncentered,
            invert: false,
            binary_target: false,
        }
    }
}
