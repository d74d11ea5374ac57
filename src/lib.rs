//! F1 Predictor - Formula 1 race outcome prediction
//!
//! This library provides:
//! - Feature engineering from merged race results (qualifying, age, weather, split times)
//! - Competition ranking of predicted gaps into race positions
//! - Points mapping and season championship standings
//! - A pluggable gap model with a versioned model registry
//! - Evaluation metrics and season-based training runs
//!
//! # Example
//!
//! ```no_run
//! use f1_predictor::core::{positions_and_standings, RaceGrouping};
//! use f1_predictor::data::{load_csv, prediction_rows_from_frame};
//!
//! let df = load_csv("data/predictions.csv").unwrap();
//! let (mut rows, grouping) = prediction_rows_from_frame(&df, "pred").unwrap();
//! let (drivers, _constructors) = positions_and_standings(&mut rows, grouping).unwrap();
//! println!("Champion: {}", drivers[0].entity_id);
//! ```

pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod logging;
pub mod models;
pub mod predictor;

// Re-export commonly used types
pub use config::Settings;
pub use error::{PredictorError, Result};
pub use features::FeaturePipeline;
pub use models::{
    CircuitAttributes, FeatureRow, ModelInput, PredictionRow, RaceKey, RaceResultRecord,
    StandingEntry,
};
pub use predictor::{GapModel, GridBaselineModel, ModelRegistry};
