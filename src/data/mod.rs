//! Table loading and storage modules

pub mod csv_loader;
pub mod storage;

// Re-export commonly used types
pub use csv_loader::{
    feature_rows_from_frame, feature_rows_to_frame, filter_season, load_csv,
    prediction_rows_from_frame, predictions_to_frame, raw_records_from_frame, seasons_in,
    standings_to_frame, write_csv,
};
pub use storage::{get_storage, CsvStorage, ParquetStorage, Storage};
