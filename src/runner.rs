//! End-to-end regression runs: processing, selection and the final fit.
use std::fmt;

use tracing::info;

use crate::config::{RegressionConfig, RunParams};
use crate::error::Result;
use crate::model::{self, OlsModel};
use crate::process::format_regression;
use crate::selection::forward_selection;
use crate::table::FeatureTable;

/// Outcome of one regression run.
#[derive(Debug, Clone)]
pub struct RegressionReport {
    pub decades: Vec<i32>,
    pub features: Vec<String>,
    pub model: OlsModel,
    /// VIFs of the features left after multicollinearity pruning.
    pub vif: Vec<(String, f64)>,
}

/// Processes `table`, selects features forward and fits the final OLS model.
pub fn simple_regression(
    table: &FeatureTable,
    decades: &[i32],
    config: &RegressionConfig,
    params: &RunParams,
) -> Result<RegressionReport> {
    let data = format_regression(table, decades, config, params)?;
    let target = if params.binary_target {
        &data.binary_target
    } else {
        &data.raw_target
    };

    let features = forward_selection(&data.design, target, &[], params.alpha)?;
    let x = data.design.columns(&features)?;
    let model = model::fit_ols(&x, target, &features)?;
    info!(
        ?decades,
        n_obs = model.n_obs,
        n_features = features.len(),
        r_squared = model.r_squared,
        aic = model.aic,
        "fitted model"
    );

    Ok(RegressionReport {
        decades: decades.to_vec(),
        features,
        model,
        vif: data.vif,
    })
}

/// R² of one per-decade regression.
#[derive(Debug, Clone, PartialEq)]
pub struct DecadeScore {
    pub decade: i32,
    pub r_squared: f64,
    pub n_obs: usize,
    pub features: Vec<String>,
}

/// Runs [`simple_regression`] once per decade, restricted to that decade,
/// and returns the scores sorted by decade.
pub fn decade_pipeline(
    table: &FeatureTable,
    decades: &[i32],
    config: &RegressionConfig,
    params: &RunParams,
) -> Result<Vec<DecadeScore>> {
    let mut decades = decades.to_vec();
    decades.sort_unstable();
    decades.dedup();

    decades
        .into_iter()
        .map(|decade| {
            let report = simple_regression(table, &[decade], config, params)?;
            Ok(DecadeScore {
                decade,
                r_squared: report.model.r_squared,
                n_obs: report.model.n_obs,
                features: report.features,
            })
        })
        .collect()
}

impl fmt::Display for RegressionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.decades.is_empty() {
            writeln!(f, "OLS regression over all decades")?;
        } else {
            writeln!(f, "OLS regression over decades {:?}", self.decades)?;
        }
        if self.features.is_empty() {
            writeln!(f, "no significant feature: intercept-only model")?;
        }
        writeln!(f, "{}", self.model)?;
        if !self.vif.is_empty() {
            writeln!(f, "\nVariance inflation factors:")?;
            for (name, vif) in &self.vif {
                writeln!(f, "{name:<30} {vif:>8.3}")?;
            }
        }
        Ok(())
    }
}
