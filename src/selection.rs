//! Greedy forward feature selection gated by coefficient significance.
use ndarray::Array1;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::model::{self, Design};

/// Fit statistics of one candidate feature added to the current model.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub feature: String,
    pub r_squared: f64,
    pub aic: f64,
    pub p_value: f64,
}

/// Scores every remaining feature, best R² first.
///
/// Candidates whose fit is degenerate (singular design, too few rows) are
/// left out; they cannot carry a meaningful p-value.
pub fn score_candidates(
    design: &Design,
    target: &Array1<f64>,
    selected: &[String],
    ignored: &[String],
) -> Result<Vec<Candidate>> {
    let mut scored = Vec::new();
    for name in &design.names {
        if selected.contains(name) || ignored.contains(name) {
            continue;
        }
        let mut features = selected.to_vec();
        features.push(name.clone());
        let x = design.columns(&features)?;
        let fit = match model::fit_ols(&x, target, &features) {
            Ok(fit) => fit,
            Err(err @ (PipelineError::Fit(_) | PipelineError::NotEnoughObservations { .. })) => {
                debug!(feature = %name, %err, "skipping candidate");
                continue;
            }
            Err(err) => return Err(err),
        };
        if fit.r_squared.is_nan() {
            continue;
        }
        let p_value = fit.p_values[features.len()];
        scored.push(Candidate {
            feature: name.clone(),
            r_squared: fit.r_squared,
            aic: fit.aic,
            p_value,
        });
    }
    scored.sort_by(|a, b| b.r_squared.total_cmp(&a.r_squared));
    Ok(scored)
}

/// The best-R² candidate whose own coefficient is significant at `alpha`,
/// or `None` when no candidate qualifies.
pub fn select_next_feature(
    design: &Design,
    target: &Array1<f64>,
    selected: &[String],
    ignored: &[String],
    alpha: f64,
) -> Result<Option<String>> {
    let scored = score_candidates(design, target, selected, ignored)?;
    for c in scored.iter().take(5) {
        debug!(
            feature = %c.feature,
            r_squared = c.r_squared,
            aic = c.aic,
            p_value = c.p_value,
            "candidate"
        );
    }
    Ok(scored
        .into_iter()
        .find(|c| c.p_value < alpha)
        .map(|c| c.feature))
}

/// Adds features one at a time until no significant candidate remains.
///
/// Never returns a feature from `ignored`. An empty result is valid and means
/// the intercept-only model.
pub fn forward_selection(
    design: &Design,
    target: &Array1<f64>,
    ignored: &[String],
    alpha: f64,
) -> Result<Vec<String>> {
    let n_ignored = design.names.iter().filter(|n| ignored.contains(n)).count();
    let mut selected: Vec<String> = Vec::new();
    while n_ignored + selected.len() < design.n_features() {
        match select_next_feature(design, target, &selected, ignored, alpha)? {
            Some(feature) => {
                info!(%feature, step = selected.len() + 1, "selected feature");
                selected.push(feature);
            }
            None => break,
        }
    }
    Ok(selected)
}
