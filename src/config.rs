//! Configuration for the F1 predictor.
//!
//! Layered lowest first: built-in defaults, an optional `f1_predictor.*` file,
//! then `F1__SECTION__KEY` environment variables.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Model training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Season held out for testing
    #[serde(default = "default_test_season")]
    pub test_season: i32,
    #[serde(default = "default_train_seasons_start")]
    pub train_seasons_start: i32,
    /// Seasons evaluated by walk-forward cross-validation
    #[serde(default = "default_cv_seasons")]
    pub cv_seasons: Vec<i32>,
}

fn default_test_season() -> i32 {
    2020
}

fn default_train_seasons_start() -> i32 {
    2014
}

fn default_cv_seasons() -> Vec<i32> {
    vec![2018, 2019, 2020]
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            test_season: default_test_season(),
            train_seasons_start: default_train_seasons_start(),
            cv_seasons: default_cv_seasons(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Csv,
    Parquet,
}

/// Data storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_models_dir")]
    pub models_dir: String,
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_models_dir() -> String {
    "data/models".to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
            models_dir: default_models_dir(),
        }
    }
}

impl StorageSettings {
    /// Same settings rooted at another data directory
    pub fn with_data_dir(&self, data_dir: &str) -> Self {
        Self {
            backend: self.backend,
            data_dir: data_dir.to_string(),
            models_dir: format!("{}/models", data_dir.trim_end_matches('/')),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            model: ModelSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl Settings {
    /// Load from `f1_predictor.*` in the working directory and the environment
    pub fn load() -> Result<Self> {
        Self::load_from("f1_predictor")
    }

    pub fn load_from(file: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(config::File::with_name(file).required(false))
            // F1__MODEL__TEST_SEASON=2019, F1__STORAGE__BACKEND=parquet
            .add_source(
                config::Environment::with_prefix("F1")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.log_level, "INFO");
        assert_eq!(settings.model.test_season, 2020);
        assert_eq!(settings.model.cv_seasons, vec![2018, 2019, 2020]);
        assert_eq!(settings.storage.backend, StorageBackend::Csv);
        assert_eq!(settings.storage.models_dir, "data/models");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = Settings::load_from("does_not_exist/f1_predictor").unwrap();
        assert_eq!(settings.model.train_seasons_start, 2014);
        assert_eq!(settings.storage.data_dir, "data");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f1_predictor.toml");
        fs::write(
            &path,
            "log_level = \"DEBUG\"\n[model]\ntest_season = 2019\n[storage]\nbackend = \"parquet\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(settings.log_level, "DEBUG");
        assert_eq!(settings.model.test_season, 2019);
        assert_eq!(settings.model.train_seasons_start, 2014);
        assert_eq!(settings.storage.backend, StorageBackend::Parquet);
    }

    #[test]
    fn test_with_data_dir() {
        let storage = StorageSettings::default().with_data_dir("/tmp/f1/");
        assert_eq!(storage.data_dir, "/tmp/f1/");
        assert_eq!(storage.models_dir, "/tmp/f1/models");
    }
}
