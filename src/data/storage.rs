//! File-backed table storage
//!
//! Datasets are stored one file per name under `<data_dir>/<backend>/`.

use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{StorageBackend, StorageSettings};
use crate::error::{PredictorError, Result};

/// Named-table persistence
pub trait Storage {
    fn save_frame(&self, df: &mut DataFrame, name: &str) -> Result<()>;
    fn load_frame(&self, name: &str) -> Result<DataFrame>;
    fn exists(&self, name: &str) -> bool;
    /// Dataset names, sorted
    fn list_datasets(&self) -> Result<Vec<String>>;
}

fn list_with_extension(dir: &Path, extension: &str) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names: Vec<String> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(extension))
        .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
        .collect();
    names.sort();
    Ok(names)
}

fn missing(name: &str, path: &Path) -> PredictorError {
    PredictorError::Storage(format!("Dataset '{}' not found at {}", name, path.display()))
}

/// CSV files under `<data_dir>/csv`
pub struct CsvStorage {
    dir: PathBuf,
}

impl CsvStorage {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            dir: data_dir.as_ref().join("csv"),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", name))
    }
}

impl Storage for CsvStorage {
    fn save_frame(&self, df: &mut DataFrame, name: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(name);
        let mut file = File::create(&path)?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
        info!("Saved {} rows to {}", df.height(), path.display());
        Ok(())
    }

    fn load_frame(&self, name: &str) -> Result<DataFrame> {
        let path = self.path(name);
        if !path.exists() {
            return Err(missing(name, &path));
        }
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.clone()))?
            .finish()?;
        info!("Loaded {} rows from {}", df.height(), path.display());
        Ok(df)
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    fn list_datasets(&self) -> Result<Vec<String>> {
        list_with_extension(&self.dir, "csv")
    }
}

/// Parquet files under `<data_dir>/parquet`
pub struct ParquetStorage {
    dir: PathBuf,
}

impl ParquetStorage {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            dir: data_dir.as_ref().join("parquet"),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.parquet", name))
    }
}

impl Storage for ParquetStorage {
    fn save_frame(&self, df: &mut DataFrame, name: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(name);
        let file = File::create(&path)?;
        ParquetWriter::new(file).finish(df)?;
        info!("Saved {} rows to {}", df.height(), path.display());
        Ok(())
    }

    fn load_frame(&self, name: &str) -> Result<DataFrame> {
        let path = self.path(name);
        if !path.exists() {
            return Err(missing(name, &path));
        }
        let file = File::open(&path)?;
        let df = ParquetReader::new(file).finish()?;
        info!("Loaded {} rows from {}", df.height(), path.display());
        Ok(df)
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    fn list_datasets(&self) -> Result<Vec<String>> {
        list_with_extension(&self.dir, "parquet")
    }
}

/// Backend selected by configuration
pub fn get_storage(settings: &StorageSettings) -> Box<dyn Storage> {
    match settings.backend {
        StorageBackend::Csv => Box::new(CsvStorage::new(&settings.data_dir)),
        StorageBackend::Parquet => Box::new(ParquetStorage::new(&settings.data_dir)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        df!(
            "season" => &[2020i64, 2020],
            "name" => &["hamilton", "bottas"],
            "pred" => &[0.0f64, 5.5]
        )
        .unwrap()
    }

    fn check_backend(storage: &dyn Storage) {
        assert!(!storage.exists("main_df"));
        assert!(storage.list_datasets().unwrap().is_empty());

        let mut df = sample();
        storage.save_frame(&mut df, "main_df").unwrap();
        storage.save_frame(&mut df, "aux").unwrap();

        assert!(storage.exists("main_df"));
        assert_eq!(storage.list_datasets().unwrap(), vec!["aux", "main_df"]);

        let loaded = storage.load_frame("main_df").unwrap();
        assert_eq!(loaded.height(), 2);
        assert_eq!(loaded.width(), 3);
    }

    #[test]
    fn test_csv_storage() {
        let dir = tempfile::tempdir().unwrap();
        check_backend(&CsvStorage::new(dir.path()));
        assert!(dir.path().join("csv").join("main_df.csv").exists());
    }

    #[test]
    fn test_parquet_storage() {
        let dir = tempfile::tempdir().unwrap();
        check_backend(&ParquetStorage::new(dir.path()));
        assert!(dir.path().join("parquet").join("main_df.parquet").exists());
    }

    #[test]
    fn test_load_missing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CsvStorage::new(dir.path());
        assert!(matches!(
            storage.load_frame("nope"),
            Err(PredictorError::Storage(_))
        ));
    }

    #[test]
    fn test_get_storage_backend() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StorageSettings {
            backend: StorageBackend::Parquet,
            data_dir: dir.path().to_string_lossy().to_string(),
            models_dir: String::new(),
        };
        let storage = get_storage(&settings);
        let mut df = sample();
        storage.save_frame(&mut df, "preds").unwrap();
        assert!(dir.path().join("parquet").join("preds.parquet").exists());
    }
}
