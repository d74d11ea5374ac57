//! Table loading and conversion
//!
//! Converts between polars frames and the typed rows used by the pipeline,
//! the ranker and the standings aggregator. Required columns are checked up
//! front; optional columns default to null.

use polars::prelude::*;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

use crate::core::positions::RaceGrouping;
use crate::error::{has_column, require_columns, PredictorError, Result};
use crate::features::pipeline::{TARGET_COLUMN, UNKNOWN_CATEGORY};
use crate::features::qualifying::QualifyingTimes;
use crate::models::{CircuitAttributes, FeatureRow, PredictionRow, RaceResultRecord, StandingEntry};

/// Default prediction column in externally produced tables
pub const DEFAULT_PRED_COLUMN: &str = "pred";

/// Load a CSV file with a header row
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
        .finish()?;
    Ok(df)
}

pub fn write_csv<P: AsRef<Path>>(df: &mut DataFrame, path: P) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

/// Rows of a single season
pub fn filter_season(df: &DataFrame, season: i32) -> Result<DataFrame> {
    require_columns(df, &["season"])?;
    let filtered = df
        .clone()
        .lazy()
        .filter(col("season").cast(DataType::Int64).eq(lit(season as i64)))
        .collect()?;
    Ok(filtered)
}

/// Distinct seasons present in a table, ascending
pub fn seasons_in(df: &DataFrame) -> Result<Vec<i32>> {
    require_columns(df, &["season"])?;
    let seasons: BTreeSet<i32> = i64_values(df, "season")?
        .into_iter()
        .flatten()
        .map(|s| s as i32)
        .collect();
    Ok(seasons.into_iter().collect())
}

fn i64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    if !has_column(df, name) {
        return Ok(vec![None; df.height()]);
    }
    let column = df.column(name)?.cast(&DataType::Int64)?;
    Ok(column.i64()?.into_iter().collect())
}

fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    if !has_column(df, name) {
        return Ok(vec![None; df.height()]);
    }
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

fn str_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    if !has_column(df, name) {
        return Ok(vec![None; df.height()]);
    }
    let column = df.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

fn to_u32(value: Option<i64>) -> Option<u32> {
    value.and_then(|v| u32::try_from(v).ok())
}

fn null_key(column: &str, row: usize) -> PredictorError {
    PredictorError::NullKey {
        column: column.to_string(),
        row,
    }
}

fn season_at(values: &[Option<i64>], row: usize) -> Result<i32> {
    values[row]
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| null_key("season", row))
}

fn round_at(values: &[Option<i64>], row: usize) -> Result<u32> {
    to_u32(values[row]).ok_or_else(|| null_key("round", row))
}

/// Resolve the qualifying representation once for the whole table.
///
/// A textual `q1` whose first value contains ':' holds lap strings; anything
/// else is read as seconds.
fn qualifying_times(df: &DataFrame) -> Result<Vec<QualifyingTimes>> {
    if !has_column(df, "q1") {
        return Ok(vec![QualifyingTimes::default(); df.height()]);
    }

    let q1 = df.column("q1")?;
    let is_raw = q1.dtype() == &DataType::String
        && q1
            .str()?
            .into_iter()
            .flatten()
            .next()
            .map_or(false, |s| s.contains(':'));

    if is_raw {
        let (q1, q2, q3) = (
            str_values(df, "q1")?,
            str_values(df, "q2")?,
            str_values(df, "q3")?,
        );
        Ok(q1
            .into_iter()
            .zip(q2)
            .zip(q3)
            .map(|((q1, q2), q3)| QualifyingTimes::Raw { q1, q2, q3 })
            .collect())
    } else {
        let (q1, q2, q3) = (
            f64_values(df, "q1")?,
            f64_values(df, "q2")?,
            f64_values(df, "q3")?,
        );
        Ok(q1
            .into_iter()
            .zip(q2)
            .zip(q3)
            .map(|((q1, q2), q3)| QualifyingTimes::Parsed { q1, q2, q3 })
            .collect())
    }
}

/// Merged raw table → raw records
pub fn raw_records_from_frame(df: &DataFrame) -> Result<Vec<RaceResultRecord>> {
    require_columns(df, &["season", "round", "constructor"])?;
    let id_column = if has_column(df, "driver_id") {
        "driver_id"
    } else if has_column(df, "name") {
        "name"
    } else {
        return Err(PredictorError::SchemaMismatch {
            column: "driver_id".to_string(),
        });
    };

    let season_col = i64_values(df, "season")?;
    let round_col = i64_values(df, "round")?;
    let driver_col = str_values(df, id_column)?;
    let name_col = str_values(df, "name")?;
    let constructor_col = str_values(df, "constructor")?;
    let race_name_col = str_values(df, "race_name")?;
    let grid_col = i64_values(df, "grid")?;
    let qual_col = i64_values(df, "qual_position")?;
    let finish_col = i64_values(df, "finish_position")?;
    let status_col = str_values(df, "status")?;
    let time_col = i64_values(df, "time_millis")?;
    let points_col = f64_values(df, "points")?;
    let age_col = i64_values(df, "ageDuringRace")?;
    let dob_col = str_values(df, "date_of_birth")?;
    let date_col = str_values(df, "date")?;
    let weather_col = str_values(df, "weather")?;
    let circuit_id_col = str_values(df, "circuit_id")?;
    let type_col = str_values(df, "type")?;
    let direction_col = str_values(df, "direction")?;
    let locality_col = str_values(df, "locality")?;
    let country_col = str_values(df, "country")?;
    let length_col = f64_values(df, "length")?;
    let qualifying = qualifying_times(df)?;

    let mut records = Vec::with_capacity(df.height());
    for (i, qualifying) in qualifying.into_iter().enumerate() {
        records.push(RaceResultRecord {
            season: season_at(&season_col, i)?,
            round: round_at(&round_col, i)?,
            race_name: race_name_col[i].clone(),
            driver_id: driver_col[i].clone().ok_or_else(|| null_key(id_column, i))?,
            driver_name: name_col[i].clone(),
            constructor_id: constructor_col[i].clone().unwrap_or_default(),
            grid: to_u32(grid_col[i]),
            qual_position: to_u32(qual_col[i]),
            qualifying,
            finish_position: to_u32(finish_col[i]),
            status: status_col[i].clone().unwrap_or_default(),
            time_millis: time_col[i],
            points: points_col[i],
            age_days: age_col[i],
            date_of_birth: dob_col[i].clone(),
            race_date: date_col[i].clone(),
            weather_raw: weather_col[i].clone(),
            circuit: CircuitAttributes {
                circuit_id: circuit_id_col[i].clone(),
                circuit_type: type_col[i].clone(),
                direction: direction_col[i].clone(),
                locality: locality_col[i].clone(),
                country: country_col[i].clone(),
                length: length_col[i],
            },
        });
    }

    Ok(records)
}

/// Feature rows → feature table, columns in allow-list order
pub fn feature_rows_to_frame(rows: &[FeatureRow], include_target: bool) -> Result<DataFrame> {
    let mut df = df!(
        "season" => rows.iter().map(|r| r.season).collect::<Vec<i32>>(),
        "round" => rows.iter().map(|r| r.round).collect::<Vec<u32>>(),
        "race_name" => rows.iter().map(|r| r.race_name.clone()).collect::<Vec<String>>(),
        "name" => rows.iter().map(|r| r.name.clone()).collect::<Vec<String>>(),
        "constructor" => rows.iter().map(|r| r.constructor.clone()).collect::<Vec<String>>(),
        "grid" => rows.iter().map(|r| r.grid).collect::<Vec<Option<f64>>>(),
        "qual_position" => rows.iter().map(|r| r.qual_position).collect::<Vec<Option<f64>>>(),
        "q_best" => rows.iter().map(|r| r.q_best).collect::<Vec<Option<f64>>>(),
        "q_worst" => rows.iter().map(|r| r.q_worst).collect::<Vec<Option<f64>>>(),
        "q_mean" => rows.iter().map(|r| r.q_mean).collect::<Vec<Option<f64>>>(),
        "ageDuringRace" => rows.iter().map(|r| r.age_during_race).collect::<Vec<Option<f64>>>(),
        "circuit_id" => rows.iter().map(|r| r.circuit_id.clone()).collect::<Vec<String>>(),
        "locality" => rows.iter().map(|r| r.locality.clone()).collect::<Vec<String>>(),
        "country" => rows.iter().map(|r| r.country.clone()).collect::<Vec<String>>(),
        "type" => rows.iter().map(|r| r.circuit_type.clone()).collect::<Vec<String>>(),
        "direction" => rows.iter().map(|r| r.direction.clone()).collect::<Vec<String>>(),
        "length" => rows.iter().map(|r| r.length).collect::<Vec<Option<f64>>>(),
        "weather" => rows.iter().map(|r| r.weather.clone()).collect::<Vec<String>>(),
        "finish_position" => rows.iter().map(|r| r.finish_position).collect::<Vec<Option<u32>>>(),
        "points" => rows.iter().map(|r| r.points).collect::<Vec<Option<f64>>>(),
        "status" => rows.iter().map(|r| r.status.clone()).collect::<Vec<String>>()
    )?;

    if include_target {
        let target: Vec<Option<f64>> = rows.iter().map(|r| r.filled_split).collect();
        df.with_column(Series::new(TARGET_COLUMN.into(), target))?;
    }

    Ok(df)
}

fn category(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNKNOWN_CATEGORY.to_string())
}

/// Stored feature table → feature rows
pub fn feature_rows_from_frame(df: &DataFrame) -> Result<Vec<FeatureRow>> {
    require_columns(df, &["season", "round", "name", "constructor"])?;

    let season_col = i64_values(df, "season")?;
    let round_col = i64_values(df, "round")?;
    let race_name_col = str_values(df, "race_name")?;
    let name_col = str_values(df, "name")?;
    let constructor_col = str_values(df, "constructor")?;
    let circuit_col = str_values(df, "circuit_id")?;
    let grid_col = f64_values(df, "grid")?;
    let qual_col = f64_values(df, "qual_position")?;
    let q_best_col = f64_values(df, "q_best")?;
    let q_worst_col = f64_values(df, "q_worst")?;
    let q_mean_col = f64_values(df, "q_mean")?;
    let age_col = f64_values(df, "ageDuringRace")?;
    let locality_col = str_values(df, "locality")?;
    let country_col = str_values(df, "country")?;
    let type_col = str_values(df, "type")?;
    let direction_col = str_values(df, "direction")?;
    let length_col = f64_values(df, "length")?;
    let weather_col = str_values(df, "weather")?;
    let finish_col = i64_values(df, "finish_position")?;
    let points_col = f64_values(df, "points")?;
    let status_col = str_values(df, "status")?;
    let target_col = f64_values(df, TARGET_COLUMN)?;

    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        rows.push(FeatureRow {
            season: season_at(&season_col, i)?,
            round: round_at(&round_col, i)?,
            race_name: category(race_name_col[i].clone()),
            name: name_col[i].clone().unwrap_or_default(),
            constructor: constructor_col[i].clone().unwrap_or_default(),
            circuit_id: circuit_col[i].clone().unwrap_or_default(),
            grid: grid_col[i],
            qual_position: qual_col[i],
            q_best: q_best_col[i],
            q_worst: q_worst_col[i],
            q_mean: q_mean_col[i],
            age_during_race: age_col[i],
            locality: category(locality_col[i].clone()),
            country: category(country_col[i].clone()),
            circuit_type: category(type_col[i].clone()),
            direction: category(direction_col[i].clone()),
            length: length_col[i],
            weather: weather_col[i].clone().unwrap_or_default(),
            finish_position: to_u32(finish_col[i]),
            points: points_col[i],
            status: status_col[i].clone().unwrap_or_default(),
            split_time: None,
            filled_split: target_col[i],
        });
    }

    Ok(rows)
}

/// External prediction table → prediction rows plus the race grouping it supports.
///
/// A missing or null prediction becomes NaN.
pub fn prediction_rows_from_frame(
    df: &DataFrame,
    pred_column: &str,
) -> Result<(Vec<PredictionRow>, RaceGrouping)> {
    require_columns(df, &["season", "name", "constructor", pred_column])?;
    let grouping = RaceGrouping::resolve(df)?;

    let season_col = i64_values(df, "season")?;
    let round_col = i64_values(df, "round")?;
    let race_name_col = str_values(df, "race_name")?;
    let name_col = str_values(df, "name")?;
    let constructor_col = str_values(df, "constructor")?;
    let finish_col = i64_values(df, "finish_position")?;
    let pred_col = f64_values(df, pred_column)?;

    let rows = (0..df.height())
        .map(|i| {
            // Only the column that identifies the race must be present
            let round = match grouping {
                RaceGrouping::SeasonRound => round_at(&round_col, i)?,
                RaceGrouping::SeasonRaceName => to_u32(round_col[i]).unwrap_or(0),
            };
            Ok(PredictionRow {
                season: season_at(&season_col, i)?,
                round,
                race_name: race_name_col[i].clone().unwrap_or_default(),
                name: name_col[i].clone().unwrap_or_default(),
                constructor: constructor_col[i].clone().unwrap_or_default(),
                finish_position: to_u32(finish_col[i]),
                predicted_gap: pred_col[i].unwrap_or(f64::NAN),
                predicted_position: 0,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((rows, grouping))
}

pub fn predictions_to_frame(rows: &[PredictionRow]) -> Result<DataFrame> {
    let df = df!(
        "season" => rows.iter().map(|r| r.season).collect::<Vec<i32>>(),
        "round" => rows.iter().map(|r| r.round).collect::<Vec<u32>>(),
        "race_name" => rows.iter().map(|r| r.race_name.clone()).collect::<Vec<String>>(),
        "name" => rows.iter().map(|r| r.name.clone()).collect::<Vec<String>>(),
        "constructor" => rows.iter().map(|r| r.constructor.clone()).collect::<Vec<String>>(),
        "finish_position" => rows.iter().map(|r| r.finish_position).collect::<Vec<Option<u32>>>(),
        DEFAULT_PRED_COLUMN => rows
            .iter()
            .map(|r| Some(r.predicted_gap).filter(|g| !g.is_nan()))
            .collect::<Vec<Option<f64>>>(),
        "pred_position" => rows.iter().map(|r| r.predicted_position).collect::<Vec<u32>>()
    )?;
    Ok(df)
}

pub fn standings_to_frame(entries: &[StandingEntry], entity_column: &str) -> Result<DataFrame> {
    let df = df!(
        "season" => entries.iter().map(|e| e.season).collect::<Vec<i32>>(),
        "position" => entries.iter().map(|e| e.position).collect::<Vec<u32>>(),
        entity_column => entries.iter().map(|e| e.entity_id.clone()).collect::<Vec<String>>(),
        "total_points" => entries.iter().map(|e| e.total_points).collect::<Vec<u32>>(),
        "wins" => entries.iter().map(|e| e.wins).collect::<Vec<u32>>(),
        "podiums" => entries.iter().map(|e| e.podiums).collect::<Vec<u32>>(),
        "points_finishes" => entries.iter().map(|e| e.points_finishes).collect::<Vec<u32>>(),
        "races" => entries.iter().map(|e| e.races).collect::<Vec<u32>>()
    )?;
    Ok(df)
}
