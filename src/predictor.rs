//! Gap models and the versioned model registry
//!
//! The regression model is an opaque collaborator behind `GapModel`.
//! `GridBaselineModel` is the built-in deterministic implementation.

use chrono::{Local, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{PredictorError, Result};
use crate::evaluation::metrics::r2_score;
use crate::models::ModelInput;

/// Regression from feature rows to gap-to-winner seconds
pub trait GapModel {
    /// Fit on `x`/`y`; rows whose target is null are skipped
    fn fit(&mut self, x: &[ModelInput], y: &[Option<f64>]) -> Result<()>;
    fn predict(&self, x: &[ModelInput]) -> Result<Vec<f64>>;
    fn name(&self) -> &str;

    /// R² on rows with a target
    fn score(&self, x: &[ModelInput], y: &[Option<f64>]) -> Result<f64> {
        let predicted = self.predict(x)?;
        let (truth, pred): (Vec<f64>, Vec<f64>) = y
            .iter()
            .zip(predicted)
            .filter_map(|(t, p)| t.map(|t| (t, p)))
            .unzip();
        Ok(r2_score(&truth, &pred))
    }
}

fn grid_slot(input: &ModelInput) -> Option<u32> {
    input
        .grid
        .filter(|g| g.is_finite() && *g >= 0.0)
        .map(|g| g.round() as u32)
}

/// Mean target per starting-grid slot, with the global mean as fallback
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridBaselineModel {
    slot_means: BTreeMap<u32, f64>,
    global_mean: Option<f64>,
    samples: usize,
}

impl GridBaselineModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.global_mean.is_some()
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl GapModel for GridBaselineModel {
    fn fit(&mut self, x: &[ModelInput], y: &[Option<f64>]) -> Result<()> {
        let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        let mut total = 0.0;
        let mut count = 0usize;

        for (input, target) in x.iter().zip(y) {
            let Some(target) = target.filter(|t| t.is_finite()) else {
                continue;
            };
            total += target;
            count += 1;
            if let Some(slot) = grid_slot(input) {
                let entry = sums.entry(slot).or_insert((0.0, 0));
                entry.0 += target;
                entry.1 += 1;
            }
        }

        if count == 0 {
            return Err(PredictorError::ModelNotFitted);
        }

        self.slot_means = sums
            .into_iter()
            .map(|(slot, (sum, n))| (slot, sum / n as f64))
            .collect();
        self.global_mean = Some(total / count as f64);
        self.samples = count;
        info!(
            "Fitted {} on {} samples ({} grid slots)",
            self.name(),
            count,
            self.slot_means.len()
        );
        Ok(())
    }

    fn predict(&self, x: &[ModelInput]) -> Result<Vec<f64>> {
        let global = self.global_mean.ok_or(PredictorError::ModelNotFitted)?;
        Ok(x.iter()
            .map(|input| {
                grid_slot(input)
                    .and_then(|slot| self.slot_means.get(&slot).copied())
                    .unwrap_or(global)
            })
            .collect())
    }

    fn name(&self) -> &str {
        "grid_baseline"
    }
}

/// Registry entry for one saved model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub path: String,
    pub created_at: String,
    #[serde(default)]
    pub metrics: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryMetadata {
    #[serde(default)]
    models: BTreeMap<String, ModelEntry>,
    #[serde(default)]
    active: Option<String>,
}

/// Summary line for `list_versions`
#[derive(Debug, Clone, PartialEq)]
pub struct ModelVersionInfo {
    pub version: String,
    pub created_at: String,
    pub is_active: bool,
    pub metrics: serde_json::Value,
}

/// Versioned model files plus `registry.json`
pub struct ModelRegistry {
    models_dir: PathBuf,
    metadata: RegistryMetadata,
}

impl ModelRegistry {
    pub fn new<P: AsRef<Path>>(models_dir: P) -> Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;

        let metadata_file = models_dir.join("registry.json");
        let metadata = if metadata_file.exists() {
            serde_json::from_str(&fs::read_to_string(&metadata_file)?)?
        } else {
            RegistryMetadata::default()
        };

        Ok(Self {
            models_dir,
            metadata,
        })
    }

    fn save_metadata(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.metadata)?;
        fs::write(self.models_dir.join("registry.json"), json)?;
        Ok(())
    }

    /// Save a model; the version defaults to the current local timestamp
    pub fn save_model<M: Serialize>(
        &mut self,
        model: &M,
        version: Option<&str>,
        metrics: serde_json::Value,
        set_active: bool,
    ) -> Result<String> {
        let version = version
            .map(String::from)
            .unwrap_or_else(|| Local::now().format("%Y%m%d_%H%M%S").to_string());

        let path = self.models_dir.join(format!("model_{}.json", version));
        fs::write(&path, serde_json::to_string_pretty(model)?)?;

        self.metadata.models.insert(
            version.clone(),
            ModelEntry {
                path: path.to_string_lossy().to_string(),
                created_at: Utc::now().to_rfc3339(),
                metrics,
            },
        );
        if set_active {
            self.metadata.active = Some(version.clone());
        }
        self.save_metadata()?;

        info!("Registered model version: {}", version);
        Ok(version)
    }

    /// Load a version, or the active one when `version` is `None`
    pub fn load_model<M: DeserializeOwned>(&self, version: Option<&str>) -> Result<M> {
        let version = version
            .or(self.metadata.active.as_deref())
            .ok_or_else(|| {
                PredictorError::ModelNotFound("no active model and no version given".to_string())
            })?;

        let entry = self
            .metadata
            .models
            .get(version)
            .ok_or_else(|| PredictorError::ModelNotFound(version.to_string()))?;

        let content = fs::read_to_string(&entry.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn active_version(&self) -> Option<&str> {
        self.metadata.active.as_deref()
    }

    pub fn set_active(&mut self, version: &str) -> Result<()> {
        if !self.metadata.models.contains_key(version) {
            return Err(PredictorError::ModelNotFound(version.to_string()));
        }
        self.metadata.active = Some(version.to_string());
        self.save_metadata()?;
        info!("Set active model: {}", version);
        Ok(())
    }

    /// All versions, newest first
    pub fn list_versions(&self) -> Vec<ModelVersionInfo> {
        let active = self.active_version();
        let mut versions: Vec<ModelVersionInfo> = self
            .metadata
            .models
            .iter()
            .map(|(version, entry)| ModelVersionInfo {
                version: version.clone(),
                created_at: entry.created_at.clone(),
                is_active: Some(version.as_str()) == active,
                metrics: entry.metrics.clone(),
            })
            .collect();
        versions.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.version.cmp(&a.version))
        });
        versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(grid: Option<f64>) -> ModelInput {
        ModelInput {
            season: 2019,
            round: 1,
            race_name: "australian".to_string(),
            grid,
            qual_position: grid,
            q_best: Some(81.0),
            q_worst: Some(82.0),
            q_mean: Some(81.5),
            age_during_race: Some(11_000.0),
            locality: "Melbourne".to_string(),
            country: "Australia".to_string(),
            circuit_type: "Street".to_string(),
            direction: "Clockwise".to_string(),
            length: Some(5.303),
            weather: "sunny".to_string(),
        }
    }

    fn fitted() -> GridBaselineModel {
        let x = vec![input(Some(1.0)), input(Some(1.0)), input(Some(2.0)), input(None)];
        let y = vec![Some(0.0), Some(2.0), Some(10.0), None];
        let mut model = GridBaselineModel::new();
        model.fit(&x, &y).unwrap();
        model
    }

    #[test]
    fn test_predict_before_fit() {
        let model = GridBaselineModel::new();
        assert!(matches!(
            model.predict(&[input(Some(1.0))]),
            Err(PredictorError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_grid_baseline_predictions() {
        let model = fitted();
        assert_eq!(model.samples(), 3);
        let preds = model
            .predict(&[input(Some(1.0)), input(Some(2.0)), input(Some(15.0)), input(None)])
            .unwrap();
        assert!((preds[0] - 1.0).abs() < 1e-9);
        assert!((preds[1] - 10.0).abs() < 1e-9);
        // Unseen slot and missing grid use the global mean
        assert!((preds[2] - 4.0).abs() < 1e-9);
        assert!((preds[3] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_without_targets_fails() {
        let mut model = GridBaselineModel::new();
        assert!(model.fit(&[input(Some(1.0))], &[None]).is_err());
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_registry_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ModelRegistry::new(dir.path()).unwrap();
        let model = fitted();

        let version = registry
            .save_model(&model, Some("v1"), serde_json::json!({"test_r2": 0.5}), true)
            .unwrap();
        assert_eq!(version, "v1");
        assert_eq!(registry.active_version(), Some("v1"));
        assert!(dir.path().join("registry.json").exists());

        let loaded: GridBaselineModel = registry.load_model(None).unwrap();
        assert_eq!(loaded, model);

        // A fresh registry reads the metadata file back
        let reopened = ModelRegistry::new(dir.path()).unwrap();
        assert_eq!(reopened.active_version(), Some("v1"));
        assert_eq!(reopened.list_versions().len(), 1);
    }

    #[test]
    fn test_registry_versions() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ModelRegistry::new(dir.path()).unwrap();
        let model = fitted();

        assert!(matches!(
            registry.load_model::<GridBaselineModel>(None),
            Err(PredictorError::ModelNotFound(_))
        ));

        registry.save_model(&model, Some("a"), serde_json::Value::Null, false).unwrap();
        registry.save_model(&model, Some("b"), serde_json::Value::Null, true).unwrap();
        assert!(registry.set_active("missing").is_err());
        registry.set_active("a").unwrap();

        let versions = registry.list_versions();
        assert_eq!(versions.len(), 2);
        assert!(versions.iter().any(|v| v.version == "a" && v.is_active));
        assert!(versions.iter().any(|v| v.version == "b" && !v.is_active));
    }

    #[test]
    fn test_model_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = fitted();
        model.save(&path).unwrap();
        assert_eq!(GridBaselineModel::load(&path).unwrap(), model);
    }
}
