//! Configuration types.
//!
//! Paths and training knobs come from environment variables with sensible
//! defaults; the CLI overrides individual fields after `Config::from_env()`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::models::params::{ParamGrid, ParamValue};
use crate::models::ModelKind;

/// Runtime configuration for training and prediction.
#[derive(Debug, Clone)]
pub struct Config {
    /// Labeled CSV with `Category` and `Message` columns.
    pub training_data_path: PathBuf,
    /// Default mailbox archive for batch prediction.
    pub mailbox_path: PathBuf,
    /// Root under which each training run creates a timestamped directory.
    pub output_base_dir: PathBuf,
    /// Explicit model file. `None` resolves the latest training run.
    pub model_path: Option<PathBuf>,
    /// Explicit vectorizer file. `None` resolves the latest training run.
    pub vectorizer_path: Option<PathBuf>,
    /// Root for per-run log files.
    pub log_dir: PathBuf,
    /// Number of stratified cross-validation folds.
    pub cv_folds: usize,
    /// Fraction of the dataset held out for testing.
    pub test_size: f64,
    /// Seed for every random operation (split, forests).
    pub random_state: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            training_data_path: PathBuf::from("data/dataset/dataset.csv"),
            mailbox_path: PathBuf::from(
                "data/dataset/All_mail_Including_Spam_and_Trash.mbox",
            ),
            output_base_dir: PathBuf::from("outputs"),
            model_path: None,
            vectorizer_path: None,
            log_dir: PathBuf::from("logs"),
            cv_folds: 5,
            test_size: 0.3,
            random_state: 42,
        }
    }
}

impl Config {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let cv_folds = parse_env("SPAM_CV_FOLDS")?.unwrap_or(defaults.cv_folds);
        if cv_folds < 2 {
            return Err(ConfigError::InvalidValue {
                key: "SPAM_CV_FOLDS".into(),
                message: format!("need at least 2 folds, got {cv_folds}"),
            });
        }

        let test_size = parse_env("SPAM_TEST_SIZE")?.unwrap_or(defaults.test_size);
        validate_test_size(test_size)?;

        Ok(Self {
            training_data_path: path_env("SPAM_TRAINING_DATA")
                .unwrap_or(defaults.training_data_path),
            mailbox_path: path_env("SPAM_MAILBOX_PATH").unwrap_or(defaults.mailbox_path),
            output_base_dir: path_env("SPAM_OUTPUT_DIR").unwrap_or(defaults.output_base_dir),
            model_path: path_env("SPAM_MODEL_PATH"),
            vectorizer_path: path_env("SPAM_VECTORIZER_PATH"),
            log_dir: path_env("SPAM_LOG_DIR").unwrap_or(defaults.log_dir),
            cv_folds,
            test_size,
            random_state: parse_env("SPAM_RANDOM_STATE")?.unwrap_or(defaults.random_state),
        })
    }

    /// Mailboxes to predict: the requested ones, or the configured default.
    pub fn mailbox_paths(&self, requested: Vec<PathBuf>) -> Vec<PathBuf> {
        if requested.is_empty() {
            vec![self.mailbox_path.clone()]
        } else {
            requested
        }
    }
}

/// Reject hold-out fractions that would leave either side empty.
pub fn validate_test_size(test_size: f64) -> Result<(), ConfigError> {
    if test_size > 0.0 && test_size < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            key: "test_size".into(),
            message: format!("must be between 0 and 1 (exclusive), got {test_size}"),
        })
    }
}

fn path_env(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

// ── Model grids ─────────────────────────────────────────────────────

/// Hyperparameter grids for every classifier family to train.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Families in training order, each with its search grid.
    pub models: Vec<(ModelKind, ParamGrid)>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            models: ModelKind::ALL
                .iter()
                .map(|kind| (*kind, default_grid(*kind)))
                .collect(),
        }
    }
}

impl ModelConfig {
    /// Keep only the named families (e.g. `["SVM", "KNN"]`), in default order.
    pub fn restrict_to(mut self, names: &[String]) -> Result<Self, ConfigError> {
        let wanted = names
            .iter()
            .map(|n| n.parse::<ModelKind>())
            .collect::<Result<Vec<_>, _>>()?;
        self.models.retain(|(kind, _)| wanted.contains(kind));
        Ok(self)
    }

    /// Grid for one family, if configured.
    pub fn grid(&self, kind: ModelKind) -> Option<&ParamGrid> {
        self.models
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, grid)| grid)
    }
}

fn floats(values: &[f64]) -> Vec<ParamValue> {
    values.iter().map(|v| ParamValue::Float(*v)).collect()
}

fn ints(values: &[i64]) -> Vec<ParamValue> {
    values.iter().map(|v| ParamValue::Int(*v)).collect()
}

fn texts(values: &[&str]) -> Vec<ParamValue> {
    values.iter().map(|v| ParamValue::Text((*v).to_string())).collect()
}

fn depths(values: &[i64]) -> Vec<ParamValue> {
    let mut out = ints(values);
    out.push(ParamValue::None);
    out
}

/// Default search grid for a family.
pub fn default_grid(kind: ModelKind) -> ParamGrid {
    let mut grid = BTreeMap::new();
    match kind {
        ModelKind::LogisticRegression => {
            grid.insert("C".into(), floats(&[0.01, 0.1, 1.0, 10.0, 100.0]));
            grid.insert("solver".into(), texts(&["lbfgs", "liblinear"]));
            grid.insert("max_iter".into(), ints(&[100, 200, 300]));
        }
        ModelKind::DecisionTree => {
            grid.insert("criterion".into(), texts(&["gini", "entropy"]));
            grid.insert("max_depth".into(), depths(&[5, 10, 15, 20]));
            grid.insert("min_samples_split".into(), ints(&[2, 5, 10]));
            grid.insert("min_samples_leaf".into(), ints(&[1, 2, 4]));
        }
        ModelKind::Svm => {
            grid.insert("C".into(), floats(&[0.1, 1.0, 10.0]));
            grid.insert("kernel".into(), texts(&["linear", "rbf"]));
            grid.insert("gamma".into(), texts(&["scale", "auto"]));
        }
        ModelKind::Knn => {
            grid.insert("n_neighbors".into(), ints(&[3, 5, 7, 9, 11]));
            grid.insert("weights".into(), texts(&["uniform", "distance"]));
            grid.insert("metric".into(), texts(&["euclidean", "manhattan"]));
        }
        ModelKind::RandomForest => {
            grid.insert("n_estimators".into(), ints(&[50, 100, 200]));
            grid.insert("max_depth".into(), depths(&[10, 20, 30]));
            grid.insert("min_samples_split".into(), ints(&[2, 5, 10]));
            grid.insert("min_samples_leaf".into(), ints(&[1, 2, 4]));
            grid.insert("max_features".into(), texts(&["sqrt", "log2"]));
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.random_state, 42);
        assert!((config.test_size - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.output_base_dir, PathBuf::from("outputs"));
        assert!(config.model_path.is_none());
    }

    #[test]
    fn mailbox_paths_fall_back_to_configured() {
        let config = Config {
            mailbox_path: PathBuf::from("mail/all.mbox"),
            ..Config::default()
        };
        assert_eq!(config.mailbox_paths(vec![]), vec![PathBuf::from("mail/all.mbox")]);
        let requested = vec![PathBuf::from("a.mbox"), PathBuf::from("b.mbox")];
        assert_eq!(config.mailbox_paths(requested.clone()), requested);
    }

    #[test]
    fn test_size_bounds() {
        assert!(validate_test_size(0.3).is_ok());
        assert!(validate_test_size(0.0).is_err());
        assert!(validate_test_size(1.0).is_err());
        assert!(validate_test_size(-0.5).is_err());
    }

    // ── Grids ───────────────────────────────────────────────────────

    #[test]
    fn default_model_config_has_all_families() {
        let config = ModelConfig::default();
        let kinds: Vec<ModelKind> = config.models.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, ModelKind::ALL.to_vec());
    }

    #[test]
    fn default_grid_sizes() {
        let size = |kind| -> usize { default_grid(kind).values().map(Vec::len).product() };
        assert_eq!(size(ModelKind::LogisticRegression), 30);
        assert_eq!(size(ModelKind::DecisionTree), 90);
        assert_eq!(size(ModelKind::Svm), 12);
        assert_eq!(size(ModelKind::Knn), 20);
        assert_eq!(size(ModelKind::RandomForest), 216);
    }

    #[test]
    fn depth_grid_includes_unbounded() {
        let grid = default_grid(ModelKind::DecisionTree);
        assert!(grid["max_depth"].contains(&ParamValue::None));
    }

    #[test]
    fn restrict_keeps_requested_families() {
        let config = ModelConfig::default()
            .restrict_to(&["SVM".to_string(), "knn".to_string()])
            .unwrap();
        let kinds: Vec<ModelKind> = config.models.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec![ModelKind::Svm, ModelKind::Knn]);
        assert!(config.grid(ModelKind::Svm).is_some());
        assert!(config.grid(ModelKind::DecisionTree).is_none());
    }

    #[test]
    fn restrict_rejects_unknown_family() {
        let result = ModelConfig::default().restrict_to(&["NaiveBayes".to_string()]);
        assert!(matches!(result, Err(ConfigError::UnknownModel(_))));
    }
}
