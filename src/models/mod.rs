//! Classifier families, hyperparameter grids, metrics and grid search.
//!
//! Every family trains on TF-IDF rows (`SparseMatrix`) with labels encoded
//! as spam = 0, ham = 1.

pub mod forest;
pub mod knn;
pub mod logistic;
pub mod metrics;
pub mod params;
pub mod search;
pub mod svm;
pub mod tree;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ModelError};
use crate::features::{SparseMatrix, SparseVector};
use forest::{ForestParams, RandomForest};
use knn::{KNearestNeighbors, KnnParams};
use logistic::{LogisticParams, LogisticRegression};
use params::ParamSet;
use svm::{SupportVectorClassifier, SvmParams};
use tree::{DecisionTree, TreeParams};

/// A fitted binary classifier.
pub trait Classifier {
    /// Predicted label (0 or 1) for one row.
    fn predict_row(&self, row: &SparseVector) -> u8;

    /// `[P(spam), P(ham)]`, when the model can estimate it.
    fn predict_proba_row(&self, _row: &SparseVector) -> Option<[f64; 2]> {
        None
    }

    fn predict(&self, x: &SparseMatrix) -> Vec<u8> {
        x.rows.iter().map(|r| self.predict_row(r)).collect()
    }
}

pub(crate) fn check_training_set(model: &str, x: &SparseMatrix, y: &[u8]) -> Result<(), ModelError> {
    if x.n_rows() == 0 {
        return Err(ModelError::EmptyTrainingSet {
            model: model.to_string(),
        });
    }
    if x.n_rows() != y.len() {
        return Err(ModelError::LengthMismatch {
            rows: x.n_rows(),
            labels: y.len(),
        });
    }
    Ok(())
}

// ── Labels ──────────────────────────────────────────────────────────

/// Encoded class label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Spam = 0,
    Ham = 1,
}

impl Label {
    pub fn from_encoded(value: u8) -> Self {
        if value == 1 { Self::Ham } else { Self::Spam }
    }

    pub fn encoded(self) -> u8 {
        self as u8
    }

    /// Parse a dataset category (`spam` / `ham`, any case).
    pub fn parse_category(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "spam" => Some(Self::Spam),
            "ham" => Some(Self::Ham),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spam => "Spam",
            Self::Ham => "Ham",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Model families ──────────────────────────────────────────────────

/// The classifier families that take part in model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    LogisticRegression,
    DecisionTree,
    Svm,
    Knn,
    RandomForest,
}

impl ModelKind {
    pub const ALL: [ModelKind; 5] = [
        Self::LogisticRegression,
        Self::DecisionTree,
        Self::Svm,
        Self::Knn,
        Self::RandomForest,
    ];

    /// Display name used in reports and artifact file names.
    pub fn name(self) -> &'static str {
        match self {
            Self::LogisticRegression => "LogisticRegression",
            Self::DecisionTree => "DecisionTree",
            Self::Svm => "SVM",
            Self::Knn => "KNN",
            Self::RandomForest => "RandomForest",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownModel(s.to_string()))
    }
}

/// A fitted model of any family; this is what gets persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", content = "model")]
pub enum Model {
    LogisticRegression(LogisticRegression),
    DecisionTree(DecisionTree),
    Svm(SupportVectorClassifier),
    Knn(KNearestNeighbors),
    RandomForest(RandomForest),
}

impl Model {
    /// Fit a fresh model of `kind` with one hyperparameter assignment.
    pub fn fit(
        kind: ModelKind,
        params: &ParamSet,
        x: &SparseMatrix,
        y: &[u8],
        seed: u64,
    ) -> Result<Self, ModelError> {
        Ok(match kind {
            ModelKind::LogisticRegression => {
                Self::LogisticRegression(LogisticRegression::fit(LogisticParams::from_params(params)?, x, y)?)
            }
            ModelKind::DecisionTree => {
                let p = TreeParams::from_params(kind.name(), params)?;
                Self::DecisionTree(DecisionTree::fit(p, x, y, seed)?)
            }
            ModelKind::Svm => Self::Svm(SupportVectorClassifier::fit(SvmParams::from_params(params)?, x, y)?),
            ModelKind::Knn => Self::Knn(KNearestNeighbors::fit(KnnParams::from_params(params)?, x, y)?),
            ModelKind::RandomForest => {
                Self::RandomForest(RandomForest::fit(ForestParams::from_params(params)?, x, y, seed)?)
            }
        })
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Self::LogisticRegression(_) => ModelKind::LogisticRegression,
            Self::DecisionTree(_) => ModelKind::DecisionTree,
            Self::Svm(_) => ModelKind::Svm,
            Self::Knn(_) => ModelKind::Knn,
            Self::RandomForest(_) => ModelKind::RandomForest,
        }
    }

    fn inner(&self) -> &(dyn Classifier + Send + Sync) {
        match self {
            Self::LogisticRegression(m) => m,
            Self::DecisionTree(m) => m,
            Self::Svm(m) => m,
            Self::Knn(m) => m,
            Self::RandomForest(m) => m,
        }
    }
}

impl Classifier for Model {
    fn predict_row(&self, row: &SparseVector) -> u8 {
        self.inner().predict_row(row)
    }

    fn predict_proba_row(&self, row: &SparseVector) -> Option<[f64; 2]> {
        self.inner().predict_proba_row(row)
    }
}
