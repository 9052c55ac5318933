//! Aggregate statistics over simulated outcomes.
//!
//! Inputs are sorted before anything is summed so the totals do not depend
//! on the order blocks finished in.

use serde::{Deserialize, Serialize};

use crate::analytics::percentile_sorted;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p99: f64,
}

impl Percentiles {
    pub fn from_sorted(sorted: &[f64]) -> Self {
        if sorted.is_empty() {
            return Self::default();
        }
        Self {
            p10: percentile_sorted(sorted, 10.0),
            p25: percentile_sorted(sorted, 25.0),
            p50: percentile_sorted(sorted, 50.0),
            p75: percentile_sorted(sorted, 75.0),
            p90: percentile_sorted(sorted, 90.0),
            p99: percentile_sorted(sorted, 99.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: Percentiles,
}

/// Sorts `values` in place and summarizes them. Empty input is all zeros.
pub fn summarize(values: &mut [f64]) -> ScoreSummary {
    if values.is_empty() {
        return ScoreSummary::default();
    }
    values.sort_by(f64::total_cmp);
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std_dev = if values.len() > 1 {
        let mut squares: Vec<f64> = values.iter().map(|v| (v - mean).powi(2)).collect();
        squares.sort_by(f64::total_cmp);
        (squares.iter().sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    ScoreSummary {
        mean,
        std_dev,
        min: values[0],
        max: values[values.len() - 1],
        percentiles: Percentiles::from_sorted(values),
    }
}

/// Fraction of sorted values strictly above `target`.
pub fn prob_exceed(sorted: &[f64], target: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let at_or_below = sorted.partition_point(|v| *v <= target);
    (sorted.len() - at_or_below) as f64 / sorted.len() as f64
}

/// Coefficient of variation inflated by how correlated the roster is.
/// A stacked lineup with the same CV is riskier than a spread one.
pub fn risk_score(mean: f64, std_dev: f64, mean_correlation: f64) -> f64 {
    if mean <= 0.0 || !mean.is_finite() {
        return 0.0;
    }
    let r = (std_dev / mean) * (1.0 + mean_correlation);
    if r.is_finite() {
        r.max(0.0)
    } else {
        0.0
    }
}

/// Contest outcome of one lineup across iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RoiSummary {
    pub mean_roi: f64,
    pub roi_p10: f64,
    pub roi_p50: f64,
    pub roi_p90: f64,
    /// Fraction of iterations finishing in the money
    pub cash_rate: f64,
    pub top_1pct_rate: f64,
    pub win_rate: f64,
}

/// Per-iteration contest records for one lineup.
#[derive(Debug, Clone, Default)]
pub struct ContestTally {
    pub roi: Vec<f64>,
    pub cashes: u64,
    pub top_1pct: u64,
    pub wins: u64,
}

impl ContestTally {
    pub fn with_capacity(n: usize) -> Self {
        Self { roi: Vec::with_capacity(n), ..Self::default() }
    }

    pub fn merge(&mut self, other: ContestTally) {
        self.roi.extend(other.roi);
        self.cashes += other.cashes;
        self.top_1pct += other.top_1pct;
        self.wins += other.wins;
    }

    pub fn summarize(mut self) -> RoiSummary {
        let n = self.roi.len();
        if n == 0 {
            return RoiSummary::default();
        }
        let summary = summarize(&mut self.roi);
        let iterations = n as f64;
        RoiSummary {
            mean_roi: summary.mean,
            roi_p10: summary.percentiles.p10,
            roi_p50: summary.percentiles.p50,
            roi_p90: summary.percentiles.p90,
            cash_rate: self.cashes as f64 / iterations,
            top_1pct_rate: self.top_1pct as f64 / iterations,
            win_rate: self.wins as f64 / iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_of_known_series() {
        let mut values: Vec<f64> = (1..=100).rev().map(|v| v as f64).collect();
        let s = summarize(&mut values);
        assert!((s.mean - 50.5).abs() < 1e-12);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 100.0);
        assert!((s.percentiles.p50 - 50.5).abs() < 1e-12);
        assert!((s.percentiles.p10 - 10.9).abs() < 1e-9);
        assert!((s.std_dev - 29.011_491_975_882_016).abs() < 1e-9);
        // sorted in place
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_summary_does_not_depend_on_input_order() {
        let a: Vec<f64> = (0..1000).map(|i| ((i * 7919) % 1000) as f64 * 0.013 + 1e-7 * i as f64).collect();
        let mut b = a.clone();
        b.reverse();
        let mut a = a;
        assert_eq!(summarize(&mut a), summarize(&mut b));
    }

    #[test]
    fn test_empty_summary_is_zero() {
        assert_eq!(summarize(&mut []), ScoreSummary::default());
        assert_eq!(prob_exceed(&[], 1.0), 0.0);
    }

    #[test]
    fn test_prob_exceed_is_strict() {
        let sorted = [1.0, 2.0, 2.0, 3.0];
        assert_eq!(prob_exceed(&sorted, 2.0), 0.25);
        assert_eq!(prob_exceed(&sorted, 0.0), 1.0);
        assert_eq!(prob_exceed(&sorted, 3.0), 0.0);
    }

    #[test]
    fn test_risk_score_grows_with_correlation() {
        let spread = risk_score(100.0, 20.0, 0.0);
        let stacked = risk_score(100.0, 20.0, 0.3);
        assert!((spread - 0.2).abs() < 1e-12);
        assert!(stacked > spread);
        assert_eq!(risk_score(0.0, 5.0, 0.2), 0.0);
    }
}
