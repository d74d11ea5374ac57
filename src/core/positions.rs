//! Predicted gap → race position
//!
//! Positions are a competition ranking ("min" method) of the predicted gap
//! within each race: tied gaps share the lowest rank and the next distinct gap
//! skips the tied places.

use polars::prelude::DataFrame;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{has_column, require_columns, PredictorError, Result};
use crate::models::PredictionRow;

/// Competition ranking of `values`, ascending.
///
/// NaN entries rank after every valid value and share `valid_count + 1`.
pub fn rank_min(values: &[f64]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..values.len()).filter(|&i| !values[i].is_nan()).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));

    let valid_count = order.len() as u32;
    let mut ranks = vec![valid_count + 1; values.len()];

    let mut current_rank = 0u32;
    for (ordinal, &idx) in order.iter().enumerate() {
        if ordinal == 0 || values[idx] != values[order[ordinal - 1]] {
            current_rank = ordinal as u32 + 1;
        }
        ranks[idx] = current_rank;
    }
    ranks
}

/// Which columns identify a single race
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceGrouping {
    SeasonRound,
    /// Fallback for tables that carry `race_name` but no `round`
    SeasonRaceName,
}

impl RaceGrouping {
    /// Pick the grouping from the columns present in a table
    pub fn resolve(df: &DataFrame) -> Result<Self> {
        require_columns(df, &["season"])?;
        if has_column(df, "round") {
            Ok(RaceGrouping::SeasonRound)
        } else if has_column(df, "race_name") {
            Ok(RaceGrouping::SeasonRaceName)
        } else {
            Err(PredictorError::SchemaMismatch {
                column: "round".to_string(),
            })
        }
    }

    pub fn key(&self, row: &PredictionRow) -> RaceGroupKey {
        match self {
            RaceGrouping::SeasonRound => RaceGroupKey::Round(row.season, row.round),
            RaceGrouping::SeasonRaceName => RaceGroupKey::RaceName(row.season, row.race_name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RaceGroupKey {
    Round(i32, u32),
    RaceName(i32, String),
}

impl RaceGroupKey {
    pub fn season(&self) -> i32 {
        match self {
            RaceGroupKey::Round(season, _) | RaceGroupKey::RaceName(season, _) => *season,
        }
    }

    pub fn race_label(&self) -> String {
        match self {
            RaceGroupKey::Round(_, round) => round.to_string(),
            RaceGroupKey::RaceName(_, name) => name.clone(),
        }
    }
}

/// Rank every race independently and write `predicted_position` in place.
///
/// A race with no valid (non-NaN) prediction fails with `RankingPrecondition`.
pub fn assign_positions(rows: &mut [PredictionRow], grouping: RaceGrouping) -> Result<()> {
    let mut groups: BTreeMap<RaceGroupKey, Vec<usize>> = BTreeMap::new();
    for (idx, row) in rows.iter().enumerate() {
        groups.entry(grouping.key(row)).or_default().push(idx);
    }
    debug!("Ranking {} rows across {} races", rows.len(), groups.len());

    let ranked: Vec<(Vec<usize>, Vec<u32>)> = groups
        .into_par_iter()
        .map(|(key, indices)| {
            let gaps: Vec<f64> = indices.iter().map(|&i| rows[i].predicted_gap).collect();
            if gaps.iter().all(|g| g.is_nan()) {
                return Err(PredictorError::RankingPrecondition {
                    season: key.season(),
                    race: key.race_label(),
                });
            }
            Ok((indices, rank_min(&gaps)))
        })
        .collect::<Result<Vec<_>>>()?;

    for (indices, ranks) in ranked {
        for (idx, rank) in indices.into_iter().zip(ranks) {
            rows[idx].predicted_position = rank;
        }
    }
    Ok(())
}

/// True vs predicted finishing position for one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionComparison {
    pub true_position: u32,
    pub predicted_position: u32,
    /// predicted - true
    pub position_diff: i64,
    pub position_diff_abs: u32,
    pub exact_match: bool,
    pub within_1: bool,
    pub within_2: bool,
    pub within_3: bool,
}

impl PositionComparison {
    pub fn new(true_position: u32, predicted_position: u32) -> Self {
        let position_diff = predicted_position as i64 - true_position as i64;
        let abs = position_diff.unsigned_abs() as u32;
        Self {
            true_position,
            predicted_position,
            position_diff,
            position_diff_abs: abs,
            exact_match: abs == 0,
            within_1: abs <= 1,
            within_2: abs <= 2,
            within_3: abs <= 3,
        }
    }
}

/// Pairwise comparison; rows without a true position are skipped
pub fn compare_positions(true_positions: &[Option<u32>], predicted: &[u32]) -> Vec<PositionComparison> {
    true_positions
        .iter()
        .zip(predicted)
        .filter_map(|(t, p)| t.map(|t| PositionComparison::new(t, *p)))
        .collect()
}
