//! Ordinary least squares with an intercept, plus the statistics the model
//! selection needs (p-values, R², AIC).
use std::fmt;

use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{s, Array1, Array2, Axis};

use crate::error::{PipelineError, Result};
use crate::stats;

/// Named feature matrix, one column per feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Design {
    pub names: Vec<String>,
    pub x: Array2<f64>,
}

impl Design {
    pub fn new(names: Vec<String>, x: Array2<f64>) -> Self {
        assert_eq!(names.len(), x.ncols());
        Self { names, x }
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    pub fn n_obs(&self) -> usize {
        self.x.nrows()
    }

    /// Sub-matrix of the given features, in the given order.
    pub fn columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Array2<f64>> {
        let idx = names
            .iter()
            .map(|n| {
                self.names
                    .iter()
                    .position(|c| c == n.as_ref())
                    .ok_or_else(|| PipelineError::MissingColumn(n.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.x.select(Axis(1), &idx))
    }

    pub fn remove(&mut self, index: usize) {
        self.names.remove(index);
        let keep: Vec<usize> = (0..self.x.ncols()).filter(|&j| j != index).collect();
        self.x = self.x.select(Axis(1), &keep);
    }
}

/// A fitted OLS model. Index 0 of `params`, `std_errors` and `p_values` is the
/// intercept; the features follow in `names` order.
#[derive(Debug, Clone)]
pub struct OlsModel {
    pub names: Vec<String>,
    pub params: Array1<f64>,
    pub std_errors: Array1<f64>,
    pub p_values: Array1<f64>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub aic: f64,
    pub n_obs: usize,
}

impl OlsModel {
    pub fn intercept(&self) -> f64 {
        self.params[0]
    }

    /// Coefficient and p-value of a feature.
    pub fn feature(&self, name: &str) -> Option<(f64, f64)> {
        let i = self.names.iter().position(|n| n == name)? + 1;
        Some((self.params[i], self.p_values[i]))
    }
}

/// Fits `y ~ 1 + x`.
pub fn fit_ols(x: &Array2<f64>, y: &Array1<f64>, names: &[String]) -> Result<OlsModel> {
    let n = x.nrows();
    let p = x.ncols();
    assert_eq!(n, y.len(), "design and target lengths differ");
    assert_eq!(p, names.len(), "design and names widths differ");
    if n < p + 1 {
        return Err(PipelineError::NotEnoughObservations { needed: p + 1, got: n });
    }

    let y_mean = y.mean().unwrap_or(0.0);
    let (intercept, coefs) = if p == 0 {
        (y_mean, Array1::<f64>::zeros(0))
    } else {
        let ds = Dataset::new(x.clone(), y.clone());
        let fitted = LinearRegression::new()
            .fit(&ds)
            .map_err(|e| PipelineError::Fit(e.to_string()))?;
        (fitted.intercept(), fitted.params().clone())
    };
    if !intercept.is_finite() || coefs.iter().any(|c| !c.is_finite()) {
        return Err(PipelineError::Fit("non-finite coefficients".to_string()));
    }

    let fitted = x.dot(&coefs) + intercept;
    let ssr: f64 = (y - &fitted).mapv(|r| r * r).sum();
    let sst: f64 = y.mapv(|v| (v - y_mean).powi(2)).sum();
    let r_squared = if sst > 0.0 { 1.0 - ssr / sst } else { 0.0 };

    let nf = n as f64;
    let dof = (n - p - 1) as f64;
    let adj_r_squared = if dof > 0.0 {
        1.0 - (1.0 - r_squared) * (nf - 1.0) / dof
    } else {
        f64::NAN
    };
    let llf = -nf / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (ssr / nf).ln() + 1.0);
    let aic = -2.0 * llf + 2.0 * (p + 1) as f64;

    let mut params = Array1::<f64>::zeros(p + 1);
    params[0] = intercept;
    params.slice_mut(s![1..]).assign(&coefs);

    let mut with_const = Array2::<f64>::ones((n, p + 1));
    with_const.slice_mut(s![.., 1..]).assign(x);
    let xtx = with_const.t().dot(&with_const);
    let (std_errors, p_values) = match stats::invert(&xtx) {
        Some(inv) if dof > 0.0 => {
            let sigma2 = ssr / dof;
            let se = inv.diag().mapv(|d| (sigma2 * d).max(0.0).sqrt());
            let pv = params
                .iter()
                .zip(se.iter())
                .map(|(&b, &e)| stats::t_two_sided_p(b / e, dof))
                .collect::<Array1<f64>>();
            (se, pv)
        }
        _ => (
            Array1::from_elem(p + 1, f64::NAN),
            Array1::from_elem(p + 1, f64::NAN),
        ),
    };

    Ok(OlsModel {
        names: names.to_vec(),
        params,
        std_errors,
        p_values,
        r_squared,
        adj_r_squared,
        aic,
        n_obs: n,
    })
}

/// R² of `y` regressed on the columns of `x`.
///
/// With `centered`, the fit has an intercept and R² is `1 - SSR / Σ(y - ȳ)²`.
/// Without it, the fit goes through the origin and R² is the uncentered
/// `1 - SSR / Σy²`.
///
/// Computed by projecting onto an orthonormal basis of the (centered) columns,
/// skipping columns that are linearly dependent on earlier ones, so it stays
/// defined for rank-deficient designs. Returns `None` when the total sum of
/// squares of `y` vanishes.
pub fn projection_r_squared(x: &Array2<f64>, y: &Array1<f64>, centered: bool) -> Option<f64> {
    let prepare = |v: Array1<f64>| {
        if centered {
            let m = v.mean().unwrap_or(0.0);
            v - m
        } else {
            v
        }
    };
    let yc = prepare(y.clone());
    let sst = yc.dot(&yc);
    if sst <= f64::EPSILON * y.len() as f64 {
        return None;
    }

    let mut basis: Vec<Array1<f64>> = Vec::with_capacity(x.ncols());
    for col in x.columns() {
        let mut v = prepare(col.to_owned());
        let norm0 = v.dot(&v).sqrt();
        for q in &basis {
            let proj = q.dot(&v);
            v.scaled_add(-proj, q);
        }
        let norm = v.dot(&v).sqrt();
        if norm0 == 0.0 || norm <= 1e-10 * norm0 {
            continue;
        }
        basis.push(v / norm);
    }

    let explained: f64 = basis.iter().map(|q| q.dot(&yc).powi(2)).sum();
    Some((explained / sst).clamp(0.0, 1.0))
}

impl fmt::Display for OlsModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<30} {:>10} {:>10} {:>8} {:>8}", "", "coef", "std err", "t", "P>|t|")?;
        let labels = std::iter::once("const").chain(self.names.iter().map(String::as_str));
        for (i, label) in labels.enumerate() {
            let (b, e, p) = (self.params[i], self.std_errors[i], self.p_values[i]);
            writeln!(f, "{:<30} {:>10.4} {:>10.4} {:>8.3} {:>8.3}", label, b, e, b / e, p)?;
        }
        writeln!(f, "{:<30} {:>10}", "No. observations", self.n_obs)?;
        writeln!(f, "{:<30} {:>10.4}", "R-squared", self.r_squared)?;
        writeln!(f, "{:<30} {:>10.4}", "Adj. R-squared", self.adj_r_squared)?;
        write!(f, "{:<30} {:>10.2}", "AIC", self.aic)
    }
}
