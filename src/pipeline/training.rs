//! Grid-searched training of every configured family, best-model selection
//! and persistence of the run.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Local;
use tracing::info;

use crate::config::ModelConfig;
use crate::error::{ConfigError, Error};
use crate::features::TfidfVectorizer;
use crate::models::metrics::Scores;
use crate::models::params::{self, ParamSet};
use crate::models::search::GridSearch;
use crate::models::{Classifier, Model, ModelKind};
use crate::pipeline::artifacts::{self, RUN_DIR_FORMAT, RunLayout};
use crate::pipeline::reports;
use crate::state::{FeatureSet, SplitData, TrainingState};

const STAGE: &str = "model training";

/// Result of training one family.
#[derive(Debug, Clone)]
pub struct ModelOutcome {
    pub kind: ModelKind,
    pub best_params: ParamSet,
    pub cv_score: f64,
    /// Scores of the refit model on the held-out test set.
    pub scores: Scores,
    pub training_secs: f64,
    pub model: Model,
}

#[derive(Debug)]
pub struct TrainingOutcome {
    pub timestamp: String,
    pub models: Vec<ModelOutcome>,
    /// Index into `models` of the highest test F1.
    pub best: usize,
    pub run: RunLayout,
}

impl TrainingOutcome {
    pub fn best(&self) -> &ModelOutcome {
        &self.models[self.best]
    }
}

/// Index of the highest weighted test F1; the first wins ties.
pub fn select_best(models: &[ModelOutcome]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, m) in models.iter().enumerate() {
        if best.is_none_or(|b| m.scores.f1_score > models[b].scores.f1_score) {
            best = Some(i);
        }
    }
    best
}

pub struct ModelTraining {
    models: ModelConfig,
    output_base_dir: PathBuf,
    seed: u64,
}

impl ModelTraining {
    pub fn new(models: ModelConfig, output_base_dir: impl Into<PathBuf>, seed: u64) -> Self {
        Self {
            models,
            output_base_dir: output_base_dir.into(),
            seed,
        }
    }

    fn train_one(
        &self,
        kind: ModelKind,
        grid: &params::ParamGrid,
        cv_folds: usize,
        split: &SplitData,
        features: &FeatureSet,
    ) -> Result<ModelOutcome, Error> {
        let started = Instant::now();
        info!(model = kind.name(), "Training model");

        let result = GridSearch::new(kind, grid, cv_folds, self.seed)
            .run(&features.x_train, &split.y_train)?;
        let predictions = result.best_model.predict(&features.x_test);
        let scores = Scores::compute(&split.y_test, &predictions);
        let training_secs = started.elapsed().as_secs_f64();

        info!(
            model = kind.name(),
            seconds = %format!("{training_secs:.2}"),
            params = %params::to_json(&result.best_params),
            cv_score = %format!("{:.4}", result.best_score),
            accuracy = %format!("{:.4}", scores.accuracy),
            precision = %format!("{:.4}", scores.precision),
            recall = %format!("{:.4}", scores.recall),
            f1 = %format!("{:.4}", scores.f1_score),
            "Model trained"
        );

        Ok(ModelOutcome {
            kind,
            best_params: result.best_params,
            cv_score: result.best_score,
            scores,
            training_secs,
            model: result.best_model,
        })
    }

    /// Train every configured family, pick the best and persist the run.
    pub fn train_models(&self, state: &mut TrainingState, cv_folds: usize) -> Result<(), Error> {
        info!(folds = cv_folds, "Model training started");
        let split = state.split(STAGE)?;
        let features = state.features(STAGE)?;

        if self.models.models.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "models".into(),
                message: "no model families selected".into(),
            }
            .into());
        }

        let mut outcomes = Vec::with_capacity(self.models.models.len());
        for (kind, grid) in &self.models.models {
            outcomes.push(self.train_one(*kind, grid, cv_folds, split, features)?);
        }

        let best = select_best(&outcomes).unwrap_or_default();
        info!(
            model = outcomes[best].kind.name(),
            f1 = %format!("{:.4}", outcomes[best].scores.f1_score),
            params = %params::to_json(&outcomes[best].best_params),
            "Best model selected"
        );

        let timestamp = Local::now().format(RUN_DIR_FORMAT).to_string();
        let run = RunLayout::create(&self.output_base_dir, &timestamp)?;
        let outcome = TrainingOutcome {
            timestamp,
            models: outcomes,
            best,
            run,
        };
        save_run(&outcome, &features.vectorizer, split)?;
        info!(dir = %outcome.run.root.display(), "Model training completed");

        state.outcome = Some(outcome);
        Ok(())
    }
}

fn save_run(
    outcome: &TrainingOutcome,
    vectorizer: &TfidfVectorizer,
    split: &SplitData,
) -> Result<(), Error> {
    let run = &outcome.run;
    artifacts::save_json(vectorizer, &run.vectorizer_path())?;
    let best = outcome.best();
    artifacts::save_json(&best.model, &run.model_path(best.kind.name()))?;
    info!(
        model = best.kind.name(),
        dir = %run.models_dir.display(),
        "Saved vectorizer and best model"
    );

    reports::write_metadata(
        outcome,
        vectorizer.n_features(),
        split.y_train.len(),
        split.y_test.len(),
    )?;
    reports::write_comparison_summary(outcome)?;
    reports::write_best_parameters(outcome)?;
    reports::write_cross_validation_summary(outcome)?;
    reports::write_best_model_info(outcome)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::SparseMatrix;
    use crate::models::knn::{KNearestNeighbors, KnnParams};
    use crate::models::params::{ParamGrid, ParamValue};
    use crate::pipeline::transformation::DataTransformation;
    use crate::state::{Dataset, LabeledMessage};

    fn outcome(kind: ModelKind, f1: f64) -> ModelOutcome {
        let x = SparseMatrix::new(vec![Default::default()], 1);
        let knn = KNearestNeighbors::fit(KnnParams::default(), &x, &[1]).unwrap();
        ModelOutcome {
            kind,
            best_params: ParamSet::new(),
            cv_score: 0.5,
            scores: Scores {
                f1_score: f1,
                ..Scores::default()
            },
            training_secs: 0.0,
            model: Model::Knn(knn),
        }
    }

    #[test]
    fn best_is_highest_f1_first_on_ties() {
        let models = vec![
            outcome(ModelKind::LogisticRegression, 0.9),
            outcome(ModelKind::Svm, 0.95),
            outcome(ModelKind::Knn, 0.95),
        ];
        assert_eq!(select_best(&models), Some(1));
        assert_eq!(select_best(&[]), None);
    }

    fn prepared_state() -> TrainingState {
        let mut records = Vec::new();
        for i in 0..12 {
            records.push(LabeledMessage {
                category: "spam".into(),
                message: format!("win free cash prize claim {i}"),
            });
            records.push(LabeledMessage {
                category: "ham".into(),
                message: format!("meeting lunch tomorrow office {i}"),
            });
        }
        let mut state = TrainingState {
            dataset: Some(Dataset {
                columns: vec!["Category".into(), "Message".into()],
                records,
            }),
            ..TrainingState::default()
        };
        DataTransformation::new(0.3, 42).transform_data(&mut state).unwrap();
        state
    }

    #[test]
    fn train_models_persists_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut grid = ParamGrid::new();
        grid.insert("n_neighbors".into(), vec![ParamValue::Int(1), ParamValue::Int(3)]);
        let config = ModelConfig {
            models: vec![(ModelKind::Knn, grid)],
        };
        let mut state = prepared_state();
        ModelTraining::new(config, dir.path(), 42)
            .train_models(&mut state, 3)
            .unwrap();

        let outcome = state.outcome("test").unwrap();
        assert_eq!(outcome.best().kind, ModelKind::Knn);
        assert_eq!(outcome.best().scores.accuracy, 1.0);
        assert!(outcome.run.vectorizer_path().is_file());
        assert!(outcome.run.model_path("KNN").is_file());
        for file in [
            "model_metadata.csv",
            "model_comparison_summary.csv",
            "best_parameters.csv",
            "cross_validation_summary.csv",
            "best_model_info.csv",
        ] {
            assert!(outcome.run.observation(file).is_file(), "{file}");
        }
    }

    #[test]
    fn empty_model_selection_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = prepared_state();
        let err = ModelTraining::new(ModelConfig { models: vec![] }, dir.path(), 42)
            .train_models(&mut state, 3)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn training_requires_features() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = TrainingState::default();
        let err = ModelTraining::new(ModelConfig::default(), dir.path(), 42)
            .train_models(&mut state, 3)
            .unwrap_err();
        assert!(matches!(err, Error::Pipeline(_)));
    }
}
