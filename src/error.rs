use polars::prelude::{DataFrame, PolarsError};
use thiserror::Error;

/// Errors surfaced by the prediction core
#[derive(Debug, Error)]
pub enum PredictorError {
    /// A required column is absent from an input table
    #[error("Schema mismatch: required column '{column}' not found")]
    SchemaMismatch { column: String },

    /// An identity column holds a null or out-of-range value
    #[error("Invalid key: column '{column}' has no usable value at row {row}")]
    NullKey { column: String, row: usize },

    /// Ranking is undefined for a race without any valid prediction
    #[error("Cannot rank race {season}/{race}: no valid predictions")]
    RankingPrecondition { season: i32, race: String },

    /// The (season, round, driver) identity key appears more than once
    #[error("Duplicate result for '{driver}' in {season} round {round}")]
    DuplicateRecord {
        season: i32,
        round: u32,
        driver: String,
    },

    #[error("Model must be fitted before prediction")]
    ModelNotFitted,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, PredictorError>;

/// Fail with `SchemaMismatch` unless every column is present
pub fn require_columns(df: &DataFrame, columns: &[&str]) -> Result<()> {
    for column in columns {
        if !has_column(df, column) {
            return Err(PredictorError::SchemaMismatch {
                column: column.to_string(),
            });
        }
    }
    Ok(())
}

pub fn has_column(df: &DataFrame, column: &str) -> bool {
    df.column(column).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_require_columns_present() {
        let df = df!("season" => &[2020i64], "round" => &[1i64]).unwrap();
        assert!(require_columns(&df, &["season", "round"]).is_ok());
    }

    #[test]
    fn test_require_columns_missing() {
        let df = df!("season" => &[2020i64]).unwrap();
        match require_columns(&df, &["season", "round"]) {
            Err(PredictorError::SchemaMismatch { column }) => assert_eq!(column, "round"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_error_display() {
        let err = PredictorError::RankingPrecondition {
            season: 2021,
            race: "5".to_string(),
        };
        assert!(err.to_string().contains("2021/5"));

        let err = PredictorError::SchemaMismatch {
            column: "name".to_string(),
        };
        assert!(err.to_string().contains("'name'"));

        let err = PredictorError::NullKey {
            column: "season".to_string(),
            row: 3,
        };
        assert!(err.to_string().contains("'season'"));
        assert!(err.to_string().contains("row 3"));
    }
}
