use serde::{Deserialize, Serialize};

use crate::features::qualifying::{QualifyingSummary, QualifyingTimes};

/// Race identity: (season, round)
pub type RaceKey = (i32, u32);

/// Static circuit attributes attached to each result row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitAttributes {
    pub circuit_id: Option<String>,
    pub circuit_type: Option<String>,
    pub direction: Option<String>,
    pub locality: Option<String>,
    pub country: Option<String>,
    /// Lap length in kilometres
    pub length: Option<f64>,
}

/// One raw result row per (season, round, driver), as produced by ingestion
#[derive(Debug, Clone, PartialEq)]
pub struct RaceResultRecord {
    pub season: i32,
    pub round: u32,
    pub race_name: Option<String>,
    pub driver_id: String,
    /// Display name; falls back to the id
    pub driver_name: Option<String>,
    pub constructor_id: String,
    pub grid: Option<u32>,
    pub qual_position: Option<u32>,
    pub qualifying: QualifyingTimes,
    pub finish_position: Option<u32>,
    pub status: String,
    pub time_millis: Option<i64>,
    /// Championship points actually scored, when known
    pub points: Option<f64>,
    pub age_days: Option<i64>,
    pub date_of_birth: Option<String>,
    pub race_date: Option<String>,
    pub weather_raw: Option<String>,
    pub circuit: CircuitAttributes,
}

impl RaceResultRecord {
    pub fn race_key(&self) -> RaceKey {
        (self.season, self.round)
    }

    /// Finish time in seconds, derived from milliseconds
    pub fn time_seconds(&self) -> Option<f64> {
        self.time_millis.map(|ms| ms as f64 / 1000.0)
    }

    pub fn qualifying_summary(&self) -> QualifyingSummary {
        self.qualifying.summary()
    }
}

/// Engineered feature row (one per raw record)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub season: i32,
    pub round: u32,
    pub race_name: String,
    pub name: String,
    pub constructor: String,
    pub circuit_id: String,
    pub grid: Option<f64>,
    pub qual_position: Option<f64>,
    pub q_best: Option<f64>,
    pub q_worst: Option<f64>,
    pub q_mean: Option<f64>,
    pub age_during_race: Option<f64>,
    pub locality: String,
    pub country: String,
    pub circuit_type: String,
    pub direction: String,
    pub length: Option<f64>,
    pub weather: String,
    pub finish_position: Option<u32>,
    pub points: Option<f64>,
    pub status: String,
    pub split_time: Option<f64>,
    /// Training target: adjusted gap to the winner in seconds
    pub filled_split: Option<f64>,
}

impl FeatureRow {
    pub fn race_key(&self) -> RaceKey {
        (self.season, self.round)
    }

    /// Project onto the model's X columns (identifiers and targets removed)
    pub fn model_input(&self) -> ModelInput {
        ModelInput {
            season: self.season,
            round: self.round,
            race_name: self.race_name.clone(),
            grid: self.grid,
            qual_position: self.qual_position,
            q_best: self.q_best,
            q_worst: self.q_worst,
            q_mean: self.q_mean,
            age_during_race: self.age_during_race,
            locality: self.locality.clone(),
            country: self.country.clone(),
            circuit_type: self.circuit_type.clone(),
            direction: self.direction.clone(),
            length: self.length,
            weather: self.weather.clone(),
        }
    }
}

/// Model input row: features only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInput {
    pub season: i32,
    pub round: u32,
    pub race_name: String,
    pub grid: Option<f64>,
    pub qual_position: Option<f64>,
    pub q_best: Option<f64>,
    pub q_worst: Option<f64>,
    pub q_mean: Option<f64>,
    pub age_during_race: Option<f64>,
    pub locality: String,
    pub country: String,
    pub circuit_type: String,
    pub direction: String,
    pub length: Option<f64>,
    pub weather: String,
}

/// Feature row plus model output and derived finishing position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub season: i32,
    pub round: u32,
    pub race_name: String,
    pub name: String,
    pub constructor: String,
    pub finish_position: Option<u32>,
    /// Predicted gap to the winner; NaN marks a missing prediction
    pub predicted_gap: f64,
    pub predicted_position: u32,
}

impl PredictionRow {
    pub fn from_feature(row: &FeatureRow, predicted_gap: f64) -> Self {
        Self {
            season: row.season,
            round: row.round,
            race_name: row.race_name.clone(),
            name: row.name.clone(),
            constructor: row.constructor.clone(),
            finish_position: row.finish_position,
            predicted_gap,
            predicted_position: 0,
        }
    }
}

/// One championship table line for a driver or constructor in a season
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingEntry {
    pub season: i32,
    pub position: u32,
    pub entity_id: String,
    pub total_points: u32,
    pub wins: u32,
    pub podiums: u32,
    pub points_finishes: u32,
    pub races: u32,
}
