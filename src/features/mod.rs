//! Feature engineering modules

pub mod age;
pub mod pipeline;
pub mod qualifying;
pub mod splits;
pub mod weather;

// Re-export commonly used types
pub use age::{age_days, DateValue};
pub use pipeline::{normalize_features, to_training_split, FeaturePipeline, TrainingSplit};
pub use qualifying::{parse_qualifying_time, QualifyingSummary, QualifyingTimes};
pub use splits::{calculate_split_times, classify_status, is_finished, SplitTimes, StatusClass};
pub use weather::{clean_weather, extract_conditions, extract_temperature, WeatherNormalizer};
