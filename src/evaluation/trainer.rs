//! Model Trainer
//!
//! Season-based train/test runs and walk-forward cross-validation on top of
//! the feature table, the gap model and the standings aggregator.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::metrics::{all_tolerances, calculate_metrics, EvaluationMetrics, ToleranceRates};
use crate::core::positions::RaceGrouping;
use crate::core::standings::positions_and_standings;
use crate::error::Result;
use crate::features::pipeline::to_training_split;
use crate::models::{FeatureRow, ModelInput, PredictionRow, StandingEntry};
use crate::predictor::{GapModel, GridBaselineModel, ModelRegistry};

pub const TOP_DRIVERS: usize = 10;
pub const TOP_CONSTRUCTORS: usize = 5;

fn as_nan(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
}

/// Ranked predictions for one season plus the predicted championship tables
#[derive(Debug, Clone)]
pub struct SeasonPrediction {
    pub season: i32,
    pub rows: Vec<PredictionRow>,
    pub drivers: Vec<StandingEntry>,
    pub constructors: Vec<StandingEntry>,
}

/// Predict gaps for every race of `season`, rank them and build standings
pub fn predict_season<M: GapModel + ?Sized>(
    model: &M,
    features: &[FeatureRow],
    season: i32,
) -> Result<SeasonPrediction> {
    let season_rows: Vec<&FeatureRow> = features.iter().filter(|r| r.season == season).collect();
    let inputs: Vec<ModelInput> = season_rows.iter().map(|r| r.model_input()).collect();
    let gaps = model.predict(&inputs)?;

    let mut rows: Vec<PredictionRow> = season_rows
        .iter()
        .zip(gaps)
        .map(|(row, gap)| PredictionRow::from_feature(row, gap))
        .collect();
    let (drivers, constructors) = positions_and_standings(&mut rows, RaceGrouping::SeasonRound)?;

    Ok(SeasonPrediction {
        season,
        rows,
        drivers,
        constructors,
    })
}

/// Result of a single train/test run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_name: String,
    pub test_season: i32,
    pub train_samples: usize,
    pub test_samples: usize,
    pub train_r2: f64,
    pub test_r2: f64,
    pub train_metrics: EvaluationMetrics,
    pub test_metrics: EvaluationMetrics,
    pub position_accuracy: ToleranceRates,
    pub top_drivers: Vec<StandingEntry>,
    pub top_constructors: Vec<StandingEntry>,
    /// Registry version, when a registry is attached
    pub version: Option<String>,
}

/// Test metrics for one walk-forward fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldScore {
    pub season: i32,
    pub train_samples: usize,
    pub test_samples: usize,
    pub metrics: EvaluationMetrics,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub folds: Vec<FoldScore>,
    pub mean_r2: f64,
    pub mean_rmse: f64,
}

/// Fits the grid baseline and optionally registers the result
pub struct ModelTrainer {
    model: GridBaselineModel,
    registry: Option<ModelRegistry>,
}

impl ModelTrainer {
    pub fn new() -> Self {
        Self {
            model: GridBaselineModel::new(),
            registry: None,
        }
    }

    pub fn with_registry(registry: ModelRegistry) -> Self {
        Self {
            model: GridBaselineModel::new(),
            registry: Some(registry),
        }
    }

    pub fn model(&self) -> &GridBaselineModel {
        &self.model
    }

    /// Train on seasons before `test_season`, evaluate on `test_season`
    pub fn train(&mut self, features: &[FeatureRow], test_season: i32) -> Result<TrainingReport> {
        let split = to_training_split(features, test_season);
        info!(
            "Training {} on {} rows, testing on {} rows of season {}",
            self.model.name(),
            split.train_x.len(),
            split.test_x.len(),
            test_season
        );

        let mut model = GridBaselineModel::new();
        model.fit(&split.train_x, &split.train_y)?;

        let train_pred = model.predict(&split.train_x)?;
        let test_pred = model.predict(&split.test_x)?;
        let train_metrics = calculate_metrics(&as_nan(&split.train_y), &train_pred);
        let test_metrics = calculate_metrics(&as_nan(&split.test_y), &test_pred);
        let train_r2 = model.score(&split.train_x, &split.train_y)?;
        let test_r2 = model.score(&split.test_x, &split.test_y)?;
        info!("Train R²: {:.4}, Test R²: {:.4}", train_r2, test_r2);

        let prediction = predict_season(&model, features, test_season)?;
        let (truth, ranked): (Vec<u32>, Vec<u32>) = prediction
            .rows
            .iter()
            .filter_map(|r| r.finish_position.map(|p| (p, r.predicted_position)))
            .unzip();

        let mut report = TrainingReport {
            model_name: model.name().to_string(),
            test_season,
            train_samples: split.train_x.len(),
            test_samples: split.test_x.len(),
            train_r2,
            test_r2,
            train_metrics,
            test_metrics,
            position_accuracy: all_tolerances(&truth, &ranked),
            top_drivers: prediction.drivers.into_iter().take(TOP_DRIVERS).collect(),
            top_constructors: prediction
                .constructors
                .into_iter()
                .take(TOP_CONSTRUCTORS)
                .collect(),
            version: None,
        };

        if let Some(registry) = self.registry.as_mut() {
            let metrics = serde_json::json!({
                "test_season": test_season,
                "train_r2": report.train_r2,
                "test_r2": report.test_r2,
                "test_rmse": report.test_metrics.rmse,
                "test_spearman": report.test_metrics.spearman,
            });
            report.version = Some(registry.save_model(&model, None, metrics, true)?);
        }

        self.model = model;
        Ok(report)
    }

    /// Walk-forward: each season is tested on a model fitted to all earlier seasons
    pub fn cross_validate(
        &self,
        features: &[FeatureRow],
        seasons: &[i32],
    ) -> Result<CrossValidationReport> {
        let mut folds = Vec::with_capacity(seasons.len());

        for &season in seasons {
            let split = to_training_split(features, season);
            if split.test_x.is_empty() {
                warn!("No rows for season {}, skipping fold", season);
                continue;
            }

            let mut model = GridBaselineModel::new();
            model.fit(&split.train_x, &split.train_y)?;
            let pred = model.predict(&split.test_x)?;
            let metrics = calculate_metrics(&as_nan(&split.test_y), &pred);
            info!("Season {}: {}", season, metrics);

            folds.push(FoldScore {
                season,
                train_samples: split.train_x.len(),
                test_samples: split.test_x.len(),
                metrics,
            });
        }

        if folds.is_empty() {
            return Ok(CrossValidationReport::default());
        }

        let n = folds.len() as f64;
        let mean_r2 = folds.iter().map(|f| f.metrics.r2).sum::<f64>() / n;
        let mean_rmse = folds.iter().map(|f| f.metrics.rmse).sum::<f64>() / n;
        info!("Cross-validation mean R²: {:.4}, mean RMSE: {:.3}", mean_r2, mean_rmse);

        Ok(CrossValidationReport {
            folds,
            mean_r2,
            mean_rmse,
        })
    }
}

impl Default for ModelTrainer {
    fn default() -> Self {
        Self::new()
    }
}
