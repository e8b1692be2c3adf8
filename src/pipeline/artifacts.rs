//! On-disk layout of training runs and JSON persistence of fitted artifacts.
//!
//! Each run lives under `<output_base_dir>/<YYYY-MM-DD_HH-MM-SS>/` with a
//! `models/` directory (vectorizer and best model) and an `observations/`
//! directory (CSV reports).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ArtifactError;

pub const RUN_DIR_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
pub const VECTORIZER_FILE: &str = "vectorizer.json";
const MODEL_SUFFIX: &str = "_model.json";

fn io_error(path: &Path, source: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Directories of one training run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub root: PathBuf,
    pub models_dir: PathBuf,
    pub observations_dir: PathBuf,
}

impl RunLayout {
    pub fn new(root: PathBuf) -> Self {
        Self {
            models_dir: root.join("models"),
            observations_dir: root.join("observations"),
            root,
        }
    }

    /// Create `<base>/<timestamp>/{models,observations}`.
    pub fn create(base: &Path, timestamp: &str) -> Result<Self, ArtifactError> {
        let layout = Self::new(base.join(timestamp));
        for dir in [&layout.models_dir, &layout.observations_dir] {
            fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        }
        Ok(layout)
    }

    pub fn vectorizer_path(&self) -> PathBuf {
        self.models_dir.join(VECTORIZER_FILE)
    }

    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.models_dir.join(format!("{model_name}{MODEL_SUFFIX}"))
    }

    pub fn observation(&self, file: &str) -> PathBuf {
        self.observations_dir.join(file)
    }

    /// The single `*_model.json` file in `models/`.
    pub fn find_model(&self) -> Result<PathBuf, ArtifactError> {
        let entries = fs::read_dir(&self.models_dir).map_err(|e| io_error(&self.models_dir, e))?;
        let mut models: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(MODEL_SUFFIX))
            })
            .collect();
        models.sort();
        models
            .into_iter()
            .next()
            .ok_or_else(|| ArtifactError::NotFound(self.models_dir.clone()))
    }
}

pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ArtifactError> {
    let json = serde_json::to_vec(value).map_err(|source| ArtifactError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|e| io_error(path, e))?;
    debug!(path = %path.display(), "Saved artifact");
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

/// Most recent run directory under `base` that holds a vectorizer.
pub fn latest_run(base: &Path) -> Result<RunLayout, ArtifactError> {
    let entries = fs::read_dir(base).map_err(|_| ArtifactError::NotFound(base.to_path_buf()))?;
    let latest = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            let stamp = NaiveDateTime::parse_from_str(&name, RUN_DIR_FORMAT).ok()?;
            Some((stamp, e.path()))
        })
        .filter(|(_, path)| RunLayout::new(path.clone()).vectorizer_path().is_file())
        .max_by_key(|(stamp, _)| *stamp)
        .map(|(_, path)| RunLayout::new(path));
    latest.ok_or_else(|| ArtifactError::NotFound(base.to_path_buf()))
}

/// Model and vectorizer paths: explicit config paths win, otherwise the
/// latest run under the output directory.
pub fn resolve_artifacts(config: &Config) -> Result<(PathBuf, PathBuf), ArtifactError> {
    let (model, vectorizer) = match (&config.model_path, &config.vectorizer_path) {
        (Some(model), Some(vectorizer)) => (model.clone(), vectorizer.clone()),
        (model, vectorizer) => {
            let run = latest_run(&config.output_base_dir)?;
            let model = match model {
                Some(path) => path.clone(),
                None => run.find_model()?,
            };
            let vectorizer = vectorizer.clone().unwrap_or_else(|| run.vectorizer_path());
            (model, vectorizer)
        }
    };
    info!(
        model = %model.display(),
        vectorizer = %vectorizer.display(),
        "Resolved model artifacts"
    );
    Ok((model, vectorizer))
}
