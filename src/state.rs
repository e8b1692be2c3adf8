//! State threaded between pipeline stages.
//!
//! Each training stage reads what the previous stage produced and fails with
//! [`PipelineError::StageNotRun`] when it is missing.

use std::path::PathBuf;

use crate::error::PipelineError;
use crate::features::{SparseMatrix, TfidfVectorizer};
use crate::mailbox::MailRecord;
use crate::pipeline::training::TrainingOutcome;

/// One row of the labeled dataset, label still unencoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledMessage {
    pub category: String,
    pub message: String,
}

/// Raw labeled dataset as read from disk.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Header names in file order.
    pub columns: Vec<String>,
    pub records: Vec<LabeledMessage>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Stratified train/test split with encoded labels.
#[derive(Debug, Clone, Default)]
pub struct SplitData {
    pub train_texts: Vec<String>,
    pub test_texts: Vec<String>,
    pub y_train: Vec<u8>,
    pub y_test: Vec<u8>,
}

/// TF-IDF matrices for both sides of the split plus the fitted vectorizer.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub vectorizer: TfidfVectorizer,
    pub x_train: SparseMatrix,
    pub x_test: SparseMatrix,
}

#[derive(Debug, Default)]
pub struct TrainingState {
    pub training_data_path: Option<PathBuf>,
    pub dataset: Option<Dataset>,
    pub split: Option<SplitData>,
    pub features: Option<FeatureSet>,
    pub outcome: Option<TrainingOutcome>,
}

impl TrainingState {
    pub fn dataset(&self, stage: &'static str) -> Result<&Dataset, PipelineError> {
        self.dataset.as_ref().ok_or(PipelineError::StageNotRun {
            stage,
            missing: "training data",
        })
    }

    pub fn split(&self, stage: &'static str) -> Result<&SplitData, PipelineError> {
        self.split.as_ref().ok_or(PipelineError::StageNotRun {
            stage,
            missing: "train/test split",
        })
    }

    pub fn features(&self, stage: &'static str) -> Result<&FeatureSet, PipelineError> {
        self.features.as_ref().ok_or(PipelineError::StageNotRun {
            stage,
            missing: "TF-IDF features",
        })
    }

    pub fn outcome(&self, stage: &'static str) -> Result<&TrainingOutcome, PipelineError> {
        self.outcome.as_ref().ok_or(PipelineError::StageNotRun {
            stage,
            missing: "trained models",
        })
    }
}

/// State for batch prediction over a mailbox.
#[derive(Debug, Clone, Default)]
pub struct PredictionState {
    pub mailbox_path: Option<PathBuf>,
    pub mail_data: Option<Vec<MailRecord>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_stages_report_what_is_missing() {
        let state = TrainingState::default();
        let err = state.split("transformation").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::StageNotRun {
                stage: "transformation",
                missing: "train/test split"
            }
        ));
        assert!(state.dataset("ingestion").is_err());
        assert!(state.features("training").is_err());
        assert!(state.outcome("report").is_err());
    }

    #[test]
    fn present_stage_is_returned() {
        let state = TrainingState {
            dataset: Some(Dataset {
                columns: vec!["Category".into(), "Message".into()],
                records: vec![LabeledMessage {
                    category: "ham".into(),
                    message: "hello".into(),
                }],
            }),
            ..TrainingState::default()
        };
        assert_eq!(state.dataset("transformation").unwrap().len(), 1);
    }
}
