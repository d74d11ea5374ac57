//! Evaluation Metrics
//!
//! Regression scores for predicted gaps and accuracy rates for predicted positions.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::models::{PredictionRow, StandingEntry};

/// Regression metrics for predicted vs true gaps
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub spearman: f64,
    pub pearson: f64,
    pub r2: f64,
    pub mse: f64,
    pub rmse: f64,
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Spearman: {:.4}, Pearson: {:.4}, R²: {:.4}, RMSE: {:.3}",
            self.spearman, self.pearson, self.r2, self.rmse
        )
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Pearson correlation; 0 when either side has no variance
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() < 2 || x.len() != y.len() {
        return 0.0;
    }
    let (mx, my) = (mean(x), mean(y));
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (a, b) in x.iter().zip(y) {
        cov += (a - mx) * (b - my);
        vx += (a - mx).powi(2);
        vy += (b - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        return 0.0;
    }
    cov / (vx.sqrt() * vy.sqrt())
}

/// 1-based ranks; ties get the average of their ordinals
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = rank;
        }
        start = end + 1;
    }
    ranks
}

pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    pearson(&average_ranks(x), &average_ranks(y))
}

pub fn mse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

/// Coefficient of determination
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.len() < 2 {
        return 0.0;
    }
    let m = mean(y_true);
    let ss_tot: f64 = y_true.iter().map(|t| (t - m).powi(2)).sum();
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// All regression metrics; pairs with NaN on either side are dropped
pub fn calculate_metrics(y_true: &[f64], y_pred: &[f64]) -> EvaluationMetrics {
    let (truth, pred): (Vec<f64>, Vec<f64>) = y_true
        .iter()
        .zip(y_pred)
        .filter(|(t, p)| !t.is_nan() && !p.is_nan())
        .map(|(t, p)| (*t, *p))
        .unzip();

    if truth.is_empty() {
        return EvaluationMetrics::default();
    }

    let mse = mse(&truth, &pred);
    EvaluationMetrics {
        spearman: round_to(spearman(&pred, &truth), 4),
        pearson: round_to(pearson(&pred, &truth), 4),
        r2: round_to(r2_score(&truth, &pred), 4),
        mse: round_to(mse, 2),
        rmse: round_to(mse.sqrt(), 3),
    }
}

/// Share of predictions within `tolerance` places of the truth
pub fn position_tolerance(true_positions: &[u32], pred_positions: &[u32], tolerance: u32) -> f64 {
    if true_positions.is_empty() {
        return 0.0;
    }
    let within = true_positions
        .iter()
        .zip(pred_positions)
        .filter(|(t, p)| t.abs_diff(**p) <= tolerance)
        .count();
    round_to(within as f64 / true_positions.len() as f64, 4)
}

pub fn exact_match_rate(true_positions: &[u32], pred_positions: &[u32]) -> f64 {
    position_tolerance(true_positions, pred_positions, 0)
}

/// Position accuracy at several tolerance levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ToleranceRates {
    pub exact: f64,
    pub within_1: f64,
    pub within_2: f64,
    pub within_3: f64,
}

pub fn all_tolerances(true_positions: &[u32], pred_positions: &[u32]) -> ToleranceRates {
    ToleranceRates {
        exact: exact_match_rate(true_positions, pred_positions),
        within_1: position_tolerance(true_positions, pred_positions, 1),
        within_2: position_tolerance(true_positions, pred_positions, 2),
        within_3: position_tolerance(true_positions, pred_positions, 3),
    }
}

/// Position accuracy for one season
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonAccuracy {
    pub season: i32,
    pub rows: usize,
    pub rates: ToleranceRates,
}

/// Tolerance rates per season over ranked rows that have a true finish
pub fn analyze_by_season(rows: &[PredictionRow]) -> Vec<SeasonAccuracy> {
    let mut grouped: BTreeMap<i32, (Vec<u32>, Vec<u32>)> = BTreeMap::new();
    for row in rows {
        if let Some(actual) = row.finish_position {
            let entry = grouped.entry(row.season).or_default();
            entry.0.push(actual);
            entry.1.push(row.predicted_position);
        }
    }

    grouped
        .into_iter()
        .map(|(season, (truth, pred))| SeasonAccuracy {
            season,
            rows: truth.len(),
            rates: all_tolerances(&truth, &pred),
        })
        .collect()
}

/// Metrics on total points of entities present in both tables
pub fn standings_correlation(predicted: &[StandingEntry], actual: &[StandingEntry]) -> EvaluationMetrics {
    let actual_points: BTreeMap<(i32, &str), f64> = actual
        .iter()
        .map(|e| ((e.season, e.entity_id.as_str()), e.total_points as f64))
        .collect();

    let (truth, pred): (Vec<f64>, Vec<f64>) = predicted
        .iter()
        .filter_map(|e| {
            actual_points
                .get(&(e.season, e.entity_id.as_str()))
                .map(|t| (*t, e.total_points as f64))
        })
        .unzip();

    calculate_metrics(&truth, &pred)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_prediction() {
        let y = [0.0, 5.5, 12.3, 20.0];
        let metrics = calculate_metrics(&y, &y);
        assert_eq!(metrics.spearman, 1.0);
        assert_eq!(metrics.pearson, 1.0);
        assert_eq!(metrics.r2, 1.0);
        assert_eq!(metrics.mse, 0.0);
        assert_eq!(metrics.rmse, 0.0);
    }

    #[test]
    fn test_calculate_metrics_values() {
        let y_true = [1.0, 2.0, 3.0, 4.0];
        let y_pred = [2.0, 3.0, 4.0, 5.0];
        let metrics = calculate_metrics(&y_true, &y_pred);
        assert_eq!(metrics.mse, 1.0);
        assert_eq!(metrics.rmse, 1.0);
        assert_eq!(metrics.pearson, 1.0);
        // 1 - 4 / 5
        assert!((metrics.r2 - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_nan_pairs_dropped() {
        let metrics = calculate_metrics(&[1.0, f64::NAN, 3.0], &[1.0, 2.0, f64::NAN]);
        assert_eq!(metrics.mse, 0.0);
        let empty = calculate_metrics(&[], &[]);
        assert_eq!(empty, EvaluationMetrics::default());
    }

    #[test]
    fn test_constant_prediction_has_zero_correlation() {
        let metrics = calculate_metrics(&[1.0, 2.0, 3.0], &[2.0, 2.0, 2.0]);
        assert_eq!(metrics.pearson, 0.0);
        assert_eq!(metrics.spearman, 0.0);
        assert_eq!(metrics.r2, 0.0);
    }

    #[test]
    fn test_average_ranks() {
        assert_eq!(average_ranks(&[10.0, 20.0, 20.0, 5.0]), vec![2.0, 3.5, 3.5, 1.0]);
    }

    #[test]
    fn test_spearman_monotonic() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 4.0, 9.0, 16.0, 25.0];
        assert!((spearman(&x, &y) - 1.0).abs() < 1e-12);
        let reversed: Vec<f64> = y.iter().rev().copied().collect();
        assert!((spearman(&x, &reversed) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_tolerances() {
        let truth = [1, 2, 3, 4];
        let pred = [1, 3, 5, 8];
        let rates = all_tolerances(&truth, &pred);
        assert_eq!(rates.exact, 0.25);
        assert_eq!(rates.within_1, 0.5);
        assert_eq!(rates.within_2, 0.75);
        assert_eq!(rates.within_3, 0.75);
        assert_eq!(position_tolerance(&[], &[], 1), 0.0);
    }

    #[test]
    fn test_analyze_by_season() {
        let row = |season: i32, actual: Option<u32>, predicted: u32| PredictionRow {
            season,
            round: 1,
            race_name: String::new(),
            name: "a".to_string(),
            constructor: "x".to_string(),
            finish_position: actual,
            predicted_gap: 0.0,
            predicted_position: predicted,
        };
        let rows = vec![row(2019, Some(1), 1), row(2020, Some(2), 1), row(2020, None, 3)];
        let analysis = analyze_by_season(&rows);
        assert_eq!(analysis.len(), 2);
        assert_eq!(analysis[0].rates.exact, 1.0);
        assert_eq!(analysis[1].rows, 1);
        assert_eq!(analysis[1].rates.within_1, 1.0);
    }

    #[test]
    fn test_standings_correlation() {
        let entry = |id: &str, points: u32| StandingEntry {
            season: 2020,
            position: 0,
            entity_id: id.to_string(),
            total_points: points,
            wins: 0,
            podiums: 0,
            points_finishes: 0,
            races: 0,
        };
        let predicted = vec![entry("a", 100), entry("b", 50), entry("c", 10)];
        let actual = vec![entry("c", 20), entry("a", 120), entry("b", 60)];
        let metrics = standings_correlation(&predicted, &actual);
        assert_eq!(metrics.spearman, 1.0);
    }
}
