//! Model evaluation and training runs

pub mod metrics;
pub mod trainer;

pub use metrics::{
    all_tolerances, calculate_metrics, exact_match_rate, position_tolerance, EvaluationMetrics,
    ToleranceRates,
};
pub use trainer::{
    predict_season, CrossValidationReport, FoldScore, ModelTrainer, SeasonPrediction,
    TrainingReport,
};
