//! Feature Pipeline
//!
//! Turns merged raw race records into the feature table used for training and
//! prediction: qualifying aggregates, age, cleaned weather, the split-time
//! target, and missing-value filling.

use polars::prelude::DataFrame;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

use crate::data::csv_loader::{feature_rows_to_frame, raw_records_from_frame};
use crate::error::{PredictorError, Result};
use crate::features::age::age_days_from_str;
use crate::features::splits::{calculate_split_times, SplitTimes};
use crate::features::weather::WeatherNormalizer;
use crate::models::{FeatureRow, ModelInput, RaceResultRecord};

pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Output columns, in order. `filled_splits` only when the target is kept.
pub const FEATURE_COLUMNS: &[&str] = &[
    "season",
    "round",
    "race_name",
    "name",
    "constructor",
    "grid",
    "qual_position",
    "q_best",
    "q_worst",
    "q_mean",
    "ageDuringRace",
    "circuit_id",
    "locality",
    "country",
    "type",
    "direction",
    "length",
    "weather",
];

pub const TARGET_COLUMNS: &[&str] = &["finish_position", "points", "status"];

pub const TARGET_COLUMN: &str = "filled_splits";

/// Numeric columns filled with the season median
#[derive(Debug, Clone, Copy)]
enum MedianColumn {
    QBest,
    QWorst,
    QMean,
    Length,
    AgeDuringRace,
    Grid,
}

const MEDIAN_COLUMNS: [MedianColumn; 6] = [
    MedianColumn::QBest,
    MedianColumn::QWorst,
    MedianColumn::QMean,
    MedianColumn::Length,
    MedianColumn::AgeDuringRace,
    MedianColumn::Grid,
];

impl MedianColumn {
    fn slot(self, row: &mut FeatureRow) -> &mut Option<f64> {
        match self {
            MedianColumn::QBest => &mut row.q_best,
            MedianColumn::QWorst => &mut row.q_worst,
            MedianColumn::QMean => &mut row.q_mean,
            MedianColumn::Length => &mut row.length,
            MedianColumn::AgeDuringRace => &mut row.age_during_race,
            MedianColumn::Grid => &mut row.grid,
        }
    }
}

/// Median of finite values; `None` when there are none
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Fail on a repeated (season, round, driver) key
pub fn check_unique_records(records: &[RaceResultRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert((record.season, record.round, record.driver_id.as_str())) {
            return Err(PredictorError::DuplicateRecord {
                season: record.season,
                round: record.round,
                driver: record.driver_id.clone(),
            });
        }
    }
    Ok(())
}

fn fill_categorical(value: Option<&String>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string())
}

/// Fill one numeric column: season median first, then the overall median
fn fill_with_season_median(rows: &mut [FeatureRow], column: MedianColumn) {
    let mut by_season: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for row in rows.iter_mut() {
        let season = row.season;
        if let Some(v) = *column.slot(row) {
            by_season.entry(season).or_default().push(v);
        }
    }
    let season_medians: BTreeMap<i32, f64> = by_season
        .iter()
        .filter_map(|(season, values)| median(values).map(|m| (*season, m)))
        .collect();

    for row in rows.iter_mut() {
        let season = row.season;
        let slot = column.slot(row);
        if slot.map_or(true, |v| v.is_nan()) {
            *slot = season_medians.get(&season).copied();
        }
    }

    let filled: Vec<f64> = rows
        .iter_mut()
        .filter_map(|row| *column.slot(row))
        .collect();
    if let Some(overall) = median(&filled) {
        for row in rows.iter_mut() {
            let slot = column.slot(row);
            if slot.is_none() {
                *slot = Some(overall);
            }
        }
    }
}

/// Feature pipeline over raw race records
#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    /// Compute and keep the `filled_splits` target
    pub include_target: bool,
}

impl Default for FeaturePipeline {
    fn default() -> Self {
        Self::new(true)
    }
}

impl FeaturePipeline {
    pub fn new(include_target: bool) -> Self {
        Self { include_target }
    }

    /// Output column names for this configuration
    pub fn output_columns(&self) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = FEATURE_COLUMNS.to_vec();
        columns.extend_from_slice(TARGET_COLUMNS);
        if self.include_target {
            columns.push(TARGET_COLUMN);
        }
        columns
    }

    pub fn transform(&self, records: &[RaceResultRecord]) -> Result<Vec<FeatureRow>> {
        info!("Processing {} rows through feature pipeline", records.len());
        check_unique_records(records)?;

        let normalizer = WeatherNormalizer::global();

        let splits = if self.include_target {
            calculate_split_times(records)
        } else {
            debug!("Skipping split computation");
            vec![SplitTimes::default(); records.len()]
        };

        let mut rows: Vec<FeatureRow> = records
            .iter()
            .zip(splits)
            .map(|(record, split)| {
                let summary = record.qualifying_summary();
                let age = record.age_days.or_else(|| {
                    age_days_from_str(record.date_of_birth.as_deref(), record.race_date.as_deref())
                });
                let circuit = &record.circuit;

                FeatureRow {
                    season: record.season,
                    round: record.round,
                    race_name: fill_categorical(record.race_name.as_ref()),
                    name: record
                        .driver_name
                        .clone()
                        .unwrap_or_else(|| record.driver_id.clone()),
                    constructor: record.constructor_id.clone(),
                    circuit_id: circuit.circuit_id.clone().unwrap_or_default(),
                    grid: record.grid.map(f64::from),
                    qual_position: record.qual_position.map(f64::from),
                    q_best: summary.best,
                    q_worst: summary.worst,
                    q_mean: summary.mean,
                    age_during_race: age.map(|d| d as f64),
                    locality: fill_categorical(circuit.locality.as_ref()),
                    country: fill_categorical(circuit.country.as_ref()),
                    circuit_type: fill_categorical(circuit.circuit_type.as_ref()),
                    direction: fill_categorical(circuit.direction.as_ref()),
                    length: circuit.length,
                    weather: normalizer.clean(record.weather_raw.as_deref()),
                    finish_position: record.finish_position,
                    points: record.points,
                    status: record.status.clone(),
                    split_time: split.split_time,
                    filled_split: if self.include_target {
                        split.filled_split
                    } else {
                        None
                    },
                }
            })
            .collect();

        for column in MEDIAN_COLUMNS {
            fill_with_season_median(&mut rows, column);
        }

        info!(
            "Feature pipeline complete: {} rows x {} columns",
            rows.len(),
            self.output_columns().len()
        );
        Ok(rows)
    }

    /// Table-level entry point: raw frame in, feature frame out
    pub fn transform_frame(&self, raw: &DataFrame) -> Result<DataFrame> {
        let records = raw_records_from_frame(raw)?;
        let rows = self.transform(&records)?;
        feature_rows_to_frame(&rows, self.include_target)
    }
}

/// Normalize a merged raw table into the feature table (target included)
pub fn normalize_features(raw: &DataFrame) -> Result<DataFrame> {
    FeaturePipeline::default().transform_frame(raw)
}

/// Season-based train/test split
#[derive(Debug, Clone, Default)]
pub struct TrainingSplit {
    pub train_x: Vec<ModelInput>,
    pub test_x: Vec<ModelInput>,
    pub train_y: Vec<Option<f64>>,
    pub test_y: Vec<Option<f64>>,
}

/// `season < cutoff` trains, `season == cutoff` tests; later seasons are unused
pub fn to_training_split(rows: &[FeatureRow], test_season: i32) -> TrainingSplit {
    let mut split = TrainingSplit::default();
    for row in rows {
        if row.season < test_season {
            split.train_x.push(row.model_input());
            split.train_y.push(row.filled_split);
        } else if row.season == test_season {
            split.test_x.push(row.model_input());
            split.test_y.push(row.filled_split);
        }
    }
    debug!(
        "Training split at {}: {} train / {} test",
        test_season,
        split.train_x.len(),
        split.test_x.len()
    );
    split
}
