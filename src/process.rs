//! Turns the raw feature table into regression inputs.
use ndarray::Array1;
use tracing::info;

use crate::config::{NanFiltering, RegressionConfig, RunParams};
use crate::error::{PipelineError, Result};
use crate::model::Design;
use crate::stats;
use crate::table::{ColumnData, FeatureTable};
use crate::vif;

/// Everything a regression run needs, one row per retained movie.
#[derive(Debug, Clone)]
pub struct RegressionData {
    pub design: Design,
    pub raw_target: Array1<f64>,
    pub binary_target: Array1<f64>,
    pub num_votes: Array1<f64>,
    /// VIFs of the features that survived multicollinearity pruning.
    pub vif: Vec<(String, f64)>,
}

/// Applies the recipe in a fixed order: drop columns, keep `decades`
/// (all when empty), filter missing values, log-transform, standardize.
///
/// Filtering comes first so transforms only see retained rows.
pub fn process(
    table: &FeatureTable,
    config: &RegressionConfig,
    decades: &[i32],
) -> Result<FeatureTable> {
    let mut out = table.clone();
    out.drop_columns(&config.drop)?;

    if !decades.is_empty() {
        let keep: Vec<bool> = out
            .numeric("decade")?
            .iter()
            .map(|d| d.is_some_and(|d| decades.iter().any(|&k| f64::from(k) == d)))
            .collect();
        out.retain_rows(&keep);
    }

    match &config.nan_filtering {
        NanFiltering::All => {
            let names: Vec<String> = out.column_names().iter().map(|s| (*s).to_string()).collect();
            let keep = out.complete_rows(&names)?;
            out.retain_rows(&keep);
        }
        NanFiltering::Columns(columns) => {
            let keep = out.complete_rows(columns)?;
            out.retain_rows(&keep);
        }
        NanFiltering::Off => {}
    }

    for col in &config.log {
        let values = out
            .numeric(col)?
            .iter()
            .map(|v| match *v {
                Some(x) if x <= 0.0 => Err(PipelineError::Domain {
                    column: col.clone(),
                    value: x,
                }),
                other => Ok(other.map(f64::ln)),
            })
            .collect::<Result<Vec<_>>>()?;
        out.insert_numeric(format!("log_{col}"), values);
    }

    for col in &config.standardize {
        let values = out.numeric(col)?;
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        if present.len() < 2 {
            return Err(PipelineError::NotEnoughObservations {
                needed: 2,
                got: present.len(),
            });
        }
        let mean = stats::mean(&present);
        let std = stats::sample_std(&present);
        let (Some(mean), Some(std)) = (mean, std) else {
            return Err(PipelineError::ConstantColumn(col.clone()));
        };
        if std == 0.0 || !std.is_finite() {
            return Err(PipelineError::ConstantColumn(col.clone()));
        }
        let scaled = values.iter().map(|v| v.map(|x| (x - mean) / std)).collect();
        out.insert(col.clone(), ColumnData::Numeric(scaled));
    }

    info!(
        rows_in = table.n_rows(),
        rows_out = out.n_rows(),
        ?decades,
        "processed regression table"
    );
    Ok(out)
}

/// 1 where `rating >= threshold`, else 0; flipped when `invert` is set.
pub fn binarize(ratings: &Array1<f64>, threshold: f64, invert: bool) -> Array1<f64> {
    ratings.mapv(|r| {
        let hit = r >= threshold;
        if hit != invert {
            1.0
        } else {
            0.0
        }
    })
}

/// Processes the table, extracts the targets, drops `post_drop` and prunes
/// collinear features.
pub fn format_regression(
    table: &FeatureTable,
    decades: &[i32],
    config: &RegressionConfig,
    params: &RunParams,
) -> Result<RegressionData> {
    let mut processed = process(table, config, decades)?;
    let raw_target = processed.dense("average_rating")?;
    let num_votes = processed.dense("num_votes")?;
    let binary_target = binarize(&raw_target, params.success_threshold, params.invert);

    processed.drop_columns(&config.post_drop)?;
    let names: Vec<String> = processed
        .column_names()
        .iter()
        .map(|s| (*s).to_string())
        .collect();
    let x = processed.to_matrix(&names)?;
    let (design, vif) =
        vif::filter_multicollinearity(Design::new(names, x), params.vif_threshold, params.vif_fit);

    Ok(RegressionData {
        design,
        raw_target,
        binary_target,
        num_votes,
        vif,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::array;

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    fn recipe() -> RegressionConfig {
        RegressionConfig {
            drop: strings(&["name"]),
            nan_filtering: NanFiltering::All,
            log: Vec::new(),
            standardize: Vec::new(),
            post_drop: strings(&["release_date", "num_votes", "decade", "average_rating"]),
        }
    }

    /// Five movies, ratings [6, 7, 8, 9, 5], decades 1980/1990.
    fn table() -> FeatureTable {
        let mut t = FeatureTable::new(vec![1, 2, 3, 4, 5]);
        t.insert(
            "name",
            ColumnData::Text(["a", "b", "c", "d", "e"].iter().map(|s| Some((*s).to_string())).collect()),
        );
        t.insert(
            "release_date",
            ColumnData::Date(
                [1985, 1991, 1993, 1987, 1999]
                    .iter()
                    .map(|&y| NaiveDate::from_ymd_opt(y, 1, 1))
                    .collect(),
            ),
        );
        t.insert_numeric("decade", [1980.0, 1990.0, 1990.0, 1980.0, 1990.0].map(Some).to_vec());
        t.insert_numeric("average_rating", [6.0, 7.0, 8.0, 9.0, 5.0].map(Some).to_vec());
        t.insert_numeric("num_votes", [10.0, 20.0, 30.0, 40.0, 50.0].map(Some).to_vec());
        t.insert_numeric("budget", vec![Some(1.0), Some(2.0), Some(4.0), Some(8.0), Some(3.0)]);
        t.insert_numeric("stars", vec![Some(3.0), None, Some(1.0), Some(4.0), Some(2.0)]);
        t
    }

    #[test]
    fn binary_target_thresholds_and_inverts() {
        let ratings = array![6.0, 7.0, 8.0, 9.0, 5.0];
        assert_eq!(binarize(&ratings, 7.5, false), array![0.0, 0.0, 1.0, 1.0, 0.0]);
        assert_eq!(binarize(&ratings, 7.5, true), array![1.0, 1.0, 0.0, 0.0, 1.0]);
        assert_eq!(binarize(&array![7.5], 7.5, false), array![1.0]);
    }

    #[test]
    fn decade_filter_removes_other_decades() {
        let mut config = recipe();
        config.nan_filtering = NanFiltering::Off;
        let out = process(&table(), &config, &[1990]).unwrap();
        assert_eq!(out.movie_ids(), &[2, 3, 5]);
        assert!(out.numeric("decade").unwrap().iter().all(|d| *d == Some(1990.0)));
    }

    #[test]
    fn empty_decade_list_keeps_everything() {
        let mut config = recipe();
        config.nan_filtering = NanFiltering::Off;
        assert_eq!(process(&table(), &config, &[]).unwrap().n_rows(), 5);
    }

    #[test]
    fn nan_filtering_policies() {
        let all = process(&table(), &recipe(), &[]).unwrap();
        assert_eq!(all.movie_ids(), &[1, 3, 4, 5]);

        let mut config = recipe();
        config.nan_filtering = NanFiltering::Columns(strings(&["budget"]));
        assert_eq!(process(&table(), &config, &[]).unwrap().n_rows(), 5);
    }

    #[test]
    fn log_adds_a_column_and_rejects_non_positive_values() {
        let mut config = recipe();
        config.log = strings(&["budget"]);
        let out = process(&table(), &config, &[]).unwrap();
        let logged = out.numeric("log_budget").unwrap();
        assert!((logged[0].unwrap() - 0.0).abs() < 1e-12);
        assert!((logged[2].unwrap() - 8.0_f64.ln()).abs() < 1e-12);
        assert!(out.numeric("budget").is_ok());

        let mut t = table();
        t.insert_numeric("budget", vec![Some(1.0), Some(0.0), Some(4.0), Some(8.0), Some(3.0)]);
        assert!(matches!(
            process(&t, &config, &[]),
            Err(PipelineError::Domain { value, .. }) if value == 0.0
        ));
    }

    #[test]
    fn standardizing_a_single_value_needs_more_rows() {
        let mut config = recipe();
        config.nan_filtering = NanFiltering::Columns(strings(&["stars"]));
        config.standardize = strings(&["budget"]);
        let mut t = table();
        t.insert_numeric("budget", vec![Some(1.0), Some(2.0), None, None, None]);
        assert!(matches!(
            process(&t, &config, &[]),
            Err(PipelineError::NotEnoughObservations { needed: 2, got: 1 })
        ));
    }

    #[test]
    fn standardized_column_has_zero_mean_unit_std() {
        let mut config = recipe();
        config.standardize = strings(&["budget"]);
        let out = process(&table(), &config, &[]).unwrap();
        let values: Vec<f64> = out.numeric("budget").unwrap().iter().flatten().copied().collect();
        assert_eq!(values.len(), 4);
        assert!(stats::mean(&values).unwrap().abs() < 1e-12);
        assert!((stats::sample_std(&values).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn standardizing_a_constant_column_fails() {
        let mut t = table();
        t.insert_numeric("flat", vec![Some(2.0); 5]);
        let mut config = recipe();
        config.standardize = strings(&["flat"]);
        assert!(matches!(
            process(&t, &config, &[]),
            Err(PipelineError::ConstantColumn(_))
        ));
    }

    #[test]
    fn format_regression_extracts_targets() {
        let mut config = recipe();
        config.nan_filtering = NanFiltering::Columns(strings(&["budget"]));
        config.drop = strings(&["name", "stars"]);
        let params = RunParams::default();
        let data = format_regression(&table(), &[], &config, &params).unwrap();
        assert_eq!(data.raw_target, array![6.0, 7.0, 8.0, 9.0, 5.0]);
        assert_eq!(data.binary_target, array![0.0, 0.0, 1.0, 1.0, 0.0]);
        assert_eq!(data.num_votes, array![10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(data.design.names, strings(&["budget"]));
        assert!(data.vif.is_empty());

        let inverted = RunParams { invert: true, ..params };
        let data = format_regression(&table(), &[], &config, &inverted).unwrap();
        assert_eq!(data.binary_target, array![1.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn leftover_missing_values_are_reported() {
        let mut config = recipe();
        config.nan_filtering = NanFiltering::Off;
        let err = format_regression(&table(), &[], &config, &RunParams::default()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingValues(c) if c == "stars"));
    }
}
