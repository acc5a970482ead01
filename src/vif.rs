//! Multicollinearity pruning by variance inflation factor.
use ndarray::{Array2, Axis};
use tracing::info;

use crate::model::{self, Design};

/// How each column is regressed on the others when computing its VIF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VifFit {
    /// No intercept, uncentered R² (`VIF = Σx² / SSR`), the statsmodels
    /// `variance_inflation_factor` convention.
    #[default]
    Uncentered,
    /// Intercept included, centered R².
    Centered,
}

/// VIF of every column: `1 / (1 - R²)` of that column regressed on all others.
///
/// A column fully explained by the others gets an infinite VIF, and so does a
/// column with no variation to explain (constant when centered, all zeros
/// otherwise).
pub fn variance_inflation_factors(x: &Array2<f64>, fit: VifFit) -> Vec<f64> {
    let p = x.ncols();
    (0..p)
        .map(|j| {
            let others: Vec<usize> = (0..p).filter(|&k| k != j).collect();
            let rest = x.select(Axis(1), &others);
            let target = x.column(j).to_owned();
            match model::projection_r_squared(&rest, &target, fit == VifFit::Centered) {
                Some(r2) if r2 < 1.0 - 1e-12 => 1.0 / (1.0 - r2),
                _ => f64::INFINITY,
            }
        })
        .collect()
}

/// Drops the column with the highest VIF until every VIF is at most
/// `threshold`, recomputing all VIFs after each drop.
///
/// Returns the pruned design and the VIFs of the kept columns (empty when
/// fewer than two columns remain).
pub fn filter_multicollinearity(
    mut design: Design,
    threshold: f64,
    fit: VifFit,
) -> (Design, Vec<(String, f64)>) {
    while design.n_features() >= 2 {
        let vifs = variance_inflation_factors(&design.x, fit);
        let Some((worst, &highest)) = vifs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
        else {
            break;
        };
        if highest <= threshold {
            let table = design.names.iter().cloned().zip(vifs).collect();
            return (design, table);
        }
        info!(feature = %design.names[worst], vif = highest, "dropping collinear feature");
        design.remove(worst);
    }
    (design, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn design(names: &[&str], x: Array2<f64>) -> Design {
        Design::new(names.iter().map(|s| (*s).to_string()).collect(), x)
    }

    fn toy() -> Design {
        // c = a + b exactly; d is unrelated.
        design(
            &["a", "b", "c", "d"],
            array![
                [1.0, 2.0, 3.0, 0.3],
                [2.0, 1.0, 3.0, -1.2],
                [3.0, 5.0, 8.0, 0.7],
                [4.0, 3.0, 7.0, 2.0],
                [5.0, 8.0, 13.0, -0.4],
                [6.0, 4.0, 10.0, 1.1],
                [7.0, 9.0, 16.0, 0.0],
            ],
        )
    }

    #[test]
    fn exact_linear_combination_has_infinite_vif() {
        let v = variance_inflation_factors(&toy().x, VifFit::Uncentered);
        assert!(v[0].is_infinite() && v[1].is_infinite() && v[2].is_infinite());
        assert!(v[3].is_finite() && v[3] >= 1.0);
        let v = variance_inflation_factors(&toy().x, VifFit::Centered);
        assert!(v[0].is_infinite() && v[1].is_infinite() && v[2].is_infinite());
        assert!(v[3].is_finite() && v[3] >= 1.0);
    }

    #[test]
    fn filtered_columns_are_below_threshold() {
        let (kept, table) = filter_multicollinearity(toy(), 5.0, VifFit::Centered);
        // a goes first (ties keep the earliest column), then b.
        assert_eq!(kept.names, vec!["c".to_string(), "d".to_string()]);
        assert_eq!(table.len(), 2);
        for (_, vif) in &table {
            assert!(*vif <= 5.0);
        }
        for v in variance_inflation_factors(&kept.x, VifFit::Centered) {
            assert!(v <= 5.0);
        }
    }

    #[test]
    fn fewer_than_two_columns_is_returned_unchanged() {
        let single = design(&["a"], array![[1.0], [2.0], [3.0]]);
        let (kept, table) = filter_multicollinearity(single.clone(), 5.0, VifFit::default());
        assert_eq!(kept, single);
        assert!(table.is_empty());

        let empty = design(&[], Array2::zeros((3, 0)));
        let (kept, _) = filter_multicollinearity(empty.clone(), 5.0, VifFit::default());
        assert_eq!(kept, empty);
    }

    #[test]
    fn constant_column_is_dropped_first() {
        let d = design(
            &["x", "k", "z"],
            array![[1.0, 1.0, 0.5], [2.0, 1.0, -0.5], [3.0, 1.0, 1.5], [4.0, 1.0, 0.0]],
        );
        let (kept, _) = filter_multicollinearity(d, 5.0, VifFit::Centered);
        assert_eq!(kept.names, vec!["x".to_string(), "z".to_string()]);
    }

    /// Age averaging 35 and a flag that is uncorrelated with it once centered.
    fn age_and_flag() -> Design {
        design(
            &["age", "flag"],
            array![
                [30.0, 1.0],
                [40.0, 1.0],
                [33.0, 1.0],
                [37.0, 1.0],
                [36.0, 1.0],
                [34.0, 1.0],
                [31.0, 0.0],
                [39.0, 0.0],
            ],
        )
    }

    #[test]
    fn nonzero_mean_columns_inflate_the_uncentered_vif() {
        let d = age_and_flag();
        let uncentered = variance_inflation_factors(&d.x, VifFit::default());
        for v in &uncentered {
            assert!((v - 3.891_424_075_5).abs() < 1e-6, "{v}");
        }
        for v in variance_inflation_factors(&d.x, VifFit::Centered) {
            assert!((v - 1.0).abs() < 1e-9, "{v}");
        }

        let (kept, table) = filter_multicollinearity(d.clone(), 3.0, VifFit::default());
        assert_eq!(kept.n_features(), 1);
        assert!(table.is_empty());
        let (kept, _) = filter_multicollinearity(d, 3.0, VifFit::Centered);
        assert_eq!(kept.n_features(), 2);
    }
}
