//! Quartile statistics for the IQR fence
//!
//! Quantiles use linear interpolation between order statistics (Hyndman-Fan
//! type 7, the default in R and NumPy): for sorted values `x[0..n]` the p-th
//! quantile sits at 0-based position `p * (n - 1)`.

use serde::Serialize;

/// Calculate a quantile (`p` in `[0, 1]`) from sorted data
pub fn quantile_sorted(sorted_data: &[f64], p: f64) -> Option<f64> {
    if sorted_data.is_empty() {
        return None;
    }
    if sorted_data.len() == 1 {
        return Some(sorted_data[0]);
    }

    let index = p.clamp(0.0, 1.0) * (sorted_data.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        Some(sorted_data[lower])
    } else {
        let weight = index - lower as f64;
        Some(sorted_data[lower] + (sorted_data[upper] - sorted_data[lower]) * weight)
    }
}

/// Q1/Q3 and the derived upper fence for one metric in one peer group
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuartileSummary {
    pub count: usize,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub upper_bound: f64,
}

impl QuartileSummary {
    /// Compute quartiles over `values` (any order) and the fence
    /// `Q3 + multiplier * IQR`
    ///
    /// Returns `None` for an empty slice.
    pub fn compute(values: &[f64], multiplier: f64) -> Option<Self> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let q1 = quantile_sorted(&sorted, 0.25)?;
        let q3 = quantile_sorted(&sorted, 0.75)?;
        let iqr = q3 - q1;

        Some(Self {
            count: sorted.len(),
            q1,
            q3,
            iqr,
            upper_bound: q3 + multiplier * iqr,
        })
    }

    /// Strictly above the fence; a value equal to the bound is not an outlier
    pub fn is_upper_outlier(&self, value: f64) -> bool {
        value > self.upper_bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_empty_and_single() {
        assert_eq!(quantile_sorted(&[], 0.5), None);
        assert_eq!(quantile_sorted(&[7.0], 0.25), Some(7.0));
    }

    #[test]
    fn test_quantile_interpolates() {
        // n=4: Q1 at 0.75 -> 10 + 0.75 * 10, Q3 at 2.25 -> 30 + 0.25 * 10
        let data = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(quantile_sorted(&data, 0.25), Some(17.5));
        assert_eq!(quantile_sorted(&data, 0.75), Some(32.5));
        assert_eq!(quantile_sorted(&data, 0.0), Some(10.0));
        assert_eq!(quantile_sorted(&data, 1.0), Some(40.0));
    }

    #[test]
    fn test_summary_unsorted_input() {
        let summary = QuartileSummary::compute(&[100.0, 120.0, 110.0, 130.0, 900.0], 1.5).unwrap();
        assert_eq!(summary.count, 5);
        assert_eq!(summary.q1, 110.0);
        assert_eq!(summary.q3, 130.0);
        assert_eq!(summary.iqr, 20.0);
        assert_eq!(summary.upper_bound, 160.0);
        assert!(summary.is_upper_outlier(900.0));
        assert!(!summary.is_upper_outlier(160.0));
        assert!(!summary.is_upper_outlier(130.0));
    }

    #[test]
    fn test_zero_dispersion_bound_is_q3() {
        let summary = QuartileSummary::compute(&[500.0; 5], 1.5).unwrap();
        assert_eq!(summary.iqr, 0.0);
        assert_eq!(summary.upper_bound, 500.0);
        assert!(!summary.is_upper_outlier(500.0));
        assert!(summary.is_upper_outlier(500.01));
    }

    #[test]
    fn test_multiplier_scales_fence() {
        let summary = QuartileSummary::compute(&[100.0, 110.0, 120.0, 130.0, 900.0], 3.0).unwrap();
        assert_eq!(summary.upper_bound, 190.0);
    }

    #[test]
    fn test_empty_summary() {
        assert!(QuartileSummary::compute(&[], 1.5).is_none());
    }
}
