//! Training and prediction pipelines.
//!
//! Training runs three stages over a shared [`TrainingState`]:
//! 1. `DataIngestion::load_data()` reads the labeled CSV
//! 2. `DataTransformation::transform_data()` encodes labels, splits and vectorizes
//! 3. `ModelTraining::train_models()` grid-searches every family and persists the run
//!
//! Prediction loads the persisted artifacts through [`PredictionPipeline`].

pub mod artifacts;
pub mod ingestion;
pub mod prediction;
pub mod reports;
pub mod training;
pub mod transformation;

use tracing::{error, info};

use crate::config::{Config, ModelConfig};
use crate::error::Error;
use crate::state::TrainingState;

pub use ingestion::DataIngestion;
pub use prediction::{EmailPrediction, MailboxPredictions, PredictionPipeline, PredictionSummary};
pub use training::{ModelOutcome, ModelTraining, TrainingOutcome};
pub use transformation::DataTransformation;

/// End-to-end training: ingestion → transformation → training.
pub struct TrainingPipeline {
    config: Config,
    models: ModelConfig,
    state: TrainingState,
}

impl TrainingPipeline {
    pub fn new(config: &Config) -> Self {
        Self::with_models(config, ModelConfig::default())
    }

    pub fn with_models(config: &Config, models: ModelConfig) -> Self {
        Self {
            config: config.clone(),
            models,
            state: TrainingState::default(),
        }
    }

    /// Run every stage and return the populated state.
    pub fn run_pipeline(mut self, cv_folds: usize) -> Result<TrainingState, Error> {
        info!("Initiating training pipeline");

        DataIngestion::new(&self.config.training_data_path)
            .load_data(&mut self.state)
            .inspect_err(|e| error!(stage = "data ingestion", error = %e, "Stage failed"))?;

        DataTransformation::new(self.config.test_size, self.config.random_state)
            .transform_data(&mut self.state)
            .inspect_err(|e| error!(stage = "data transformation", error = %e, "Stage failed"))?;

        ModelTraining::new(
            self.models,
            &self.config.output_base_dir,
            self.config.random_state,
        )
        .train_models(&mut self.state, cv_folds)
        .inspect_err(|e| error!(stage = "model training", error = %e, "Stage failed"))?;

        let outcome = self.state.outcome("training pipeline")?;
        info!(
            best_model = outcome.best().kind.name(),
            f1 = %format!("{:.4}", outcome.best().scores.f1_score),
            dir = %outcome.run.root.display(),
            "Training pipeline completed successfully"
        );
        Ok(self.state)
    }
}
