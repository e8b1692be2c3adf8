//! Inference with persisted artifacts: single emails and whole mailboxes.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{Error, PipelineError};
use crate::features::TfidfVectorizer;
use crate::mailbox::{self, MailRecord, clean_text};
use crate::models::{Classifier, Label, Model};
use crate::pipeline::artifacts;
use crate::state::PredictionState;

/// Prediction for one email body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailPrediction {
    pub prediction: Label,
    /// Highest class probability in percent; absent for models without
    /// probability estimates.
    pub confidence: Option<f64>,
    pub raw_prediction: u8,
}

/// Totals per predicted label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PredictionSummary {
    pub total_emails: usize,
    pub counts: BTreeMap<String, usize>,
}

impl PredictionSummary {
    pub fn from_records(records: &[MailRecord]) -> Self {
        let mut counts = BTreeMap::new();
        for label in records.iter().filter_map(|r| r.prediction) {
            *counts.entry(label.as_str().to_string()).or_insert(0) += 1;
        }
        Self {
            total_emails: records.len(),
            counts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailboxPredictions {
    pub records: Vec<MailRecord>,
    pub summary: PredictionSummary,
}

struct LoadedModels {
    vectorizer: TfidfVectorizer,
    model: Model,
}

/// Cloning is cheap: loaded artifacts are shared.
#[derive(Clone)]
pub struct PredictionPipeline {
    config: Config,
    loaded: Option<Arc<LoadedModels>>,
    state: PredictionState,
}

impl PredictionPipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            loaded: None,
            state: PredictionState::default(),
        }
    }

    /// Load the vectorizer and model (configured paths or the latest run).
    pub fn load_models(&mut self) -> Result<(), Error> {
        info!("Loading models");
        let loaded = artifacts::resolve_artifacts(&self.config).and_then(|(model, vectorizer)| {
            Ok((
                artifacts::load_json::<TfidfVectorizer>(&vectorizer)?,
                artifacts::load_json::<Model>(&model)?,
            ))
        });
        let (vectorizer, model) =
            loaded.inspect_err(|e| error!(error = %e, "Failed to load models"))?;
        info!(
            model = model.kind().name(),
            features = vectorizer.n_features(),
            "Models loaded successfully"
        );
        self.loaded = Some(Arc::new(LoadedModels { vectorizer, model }));
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    fn models(&mut self) -> Result<Arc<LoadedModels>, Error> {
        if self.loaded.is_none() {
            self.load_models()?;
        }
        self.loaded.clone().ok_or_else(|| {
            PipelineError::StageNotRun {
                stage: "prediction",
                missing: "loaded models",
            }
            .into()
        })
    }

    /// Classify one email body after cleaning it.
    pub fn predict_single_email(&mut self, body: &str) -> Result<EmailPrediction, Error> {
        if body.trim().is_empty() {
            return Err(PipelineError::EmptyInput.into());
        }
        let models = self.models()?;
        let row = models.vectorizer.transform_one(&clean_text(body));
        let raw_prediction = models.model.predict_row(&row);
        let confidence = models
            .model
            .predict_proba_row(&row)
            .map(|p| p[0].max(p[1]) * 100.0);
        Ok(EmailPrediction {
            prediction: Label::from_encoded(raw_prediction),
            confidence,
            raw_prediction,
        })
    }

    /// Parse a mailbox and keep its records until `process_mailbox`.
    pub fn load_mailbox(&mut self, path: &Path) -> Result<usize, Error> {
        info!(path = %path.display(), "Loading mailbox");
        let records = mailbox::load_mailbox(path)?;
        let count = records.len();
        self.state.mailbox_path = Some(path.to_path_buf());
        self.state.mail_data = Some(records);
        Ok(count)
    }

    /// Hand over the loaded records. The mailbox is released afterwards.
    pub fn process_mailbox(&mut self) -> Result<Vec<MailRecord>, Error> {
        let records = self.state.mail_data.take().ok_or(PipelineError::NoMailbox)?;
        info!(
            emails = records.len(),
            path = ?self.state.mailbox_path,
            "Processed mailbox"
        );
        Ok(records)
    }

    /// Label each record's body.
    pub fn run_prediction(
        &mut self,
        mut records: Vec<MailRecord>,
    ) -> Result<Vec<MailRecord>, Error> {
        let models = self.models()?;
        let started = Instant::now();
        info!(emails = records.len(), "Running predictions");
        for record in &mut records {
            let row = models.vectorizer.transform_one(&record.body);
            record.prediction = Some(Label::from_encoded(models.model.predict_row(&row)));
        }
        info!(
            seconds = %format!("{:.2}", started.elapsed().as_secs_f64()),
            "Prediction completed"
        );
        Ok(records)
    }

    /// Load, process and predict a mailbox, optionally writing a CSV.
    pub fn predict_mbox_file(
        &mut self,
        path: &Path,
        output: Option<&Path>,
    ) -> Result<MailboxPredictions, Error> {
        let records = self
            .load_mailbox(path)
            .and_then(|_| self.process_mailbox())
            .and_then(|records| self.run_prediction(records))
            .inspect_err(|e| error!(path = %path.display(), error = %e, "Mailbox prediction failed"))?;
        if let Some(output) = output {
            mailbox::write_records_csv(&records, output, true)?;
            info!(path = %output.display(), "Predictions saved");
        }
        let summary = PredictionSummary::from_records(&records);
        Ok(MailboxPredictions { records, summary })
    }

    pub fn state(&self) -> &PredictionState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::{Direction, MailCategory};
    use crate::models::knn::{KNearestNeighbors, KnnParams};
    use crate::models::svm::{KernelKind, SupportVectorClassifier, SvmParams};
    use crate::pipeline::artifacts::RunLayout;

    const MBOX: &str = concat!(
        "From a@b Mon Jan 06 10:00:00 +0000 2025\n",
        "From: promo@shop.example\n",
        "Subject: Prize\n",
        "\n",
        "win cash prize now\n",
        "\n",
        "From a@b Mon Jan 06 11:00:00 +0000 2025\n",
        "From: friend@example.com\n",
        "Subject: Lunch\n",
        "\n",
        "lunch meeting tomorrow\n",
    );

    fn fit_artifacts(svm: bool) -> (TfidfVectorizer, Model) {
        let docs = ["win cash prize", "cash prize claim", "lunch meeting", "meeting tomorrow"];
        let (vectorizer, x) = TfidfVectorizer::fit_transform(&docs);
        let y = [0, 0, 1, 1];
        let model = if svm {
            let params = SvmParams {
                kernel: KernelKind::Linear,
                ..SvmParams::default()
            };
            Model::Svm(SupportVectorClassifier::fit(params, &x, &y).unwrap())
        } else {
            let params = KnnParams {
                n_neighbors: 1,
                ..KnnParams::default()
            };
            Model::Knn(KNearestNeighbors::fit(params, &x, &y).unwrap())
        };
        (vectorizer, model)
    }

    fn config_with_run(dir: &Path, svm: bool) -> Config {
        let (vectorizer, model) = fit_artifacts(svm);
        let run = RunLayout::create(dir, "2025-01-02_03-04-05").unwrap();
        artifacts::save_json(&vectorizer, &run.vectorizer_path()).unwrap();
        artifacts::save_json(&model, &run.model_path(model.kind().name())).unwrap();
        Config {
            output_base_dir: dir.to_path_buf(),
            ..Config::default()
        }
    }

    // ── Single email ────────────────────────────────────────────────

    #[test]
    fn single_email_lazily_loads_and_predicts() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = PredictionPipeline::new(&config_with_run(dir.path(), false));
        assert!(!pipeline.is_loaded());

        let spam = pipeline.predict_single_email("Claim your cash prize").unwrap();
        assert!(pipeline.is_loaded());
        assert_eq!(spam.prediction, Label::Spam);
        assert_eq!(spam.raw_prediction, 0);
        assert_eq!(spam.confidence, Some(100.0));

        let ham = pipeline.predict_single_email("meeting over lunch").unwrap();
        assert_eq!(ham.prediction, Label::Ham);
    }

    #[test]
    fn svm_has_no_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = PredictionPipeline::new(&config_with_run(dir.path(), true));
        let result = pipeline.predict_single_email("win a cash prize").unwrap();
        assert_eq!(result.prediction, Label::Spam);
        assert!(result.confidence.is_none());
    }

    #[test]
    fn empty_body_is_rejected() {
        let mut pipeline = PredictionPipeline::new(&Config::default());
        let err = pipeline.predict_single_email("  \n ").unwrap_err();
        assert!(matches!(err, Error::Pipeline(PipelineError::EmptyInput)));
    }

    #[test]
    fn missing_artifacts_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            output_base_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let err = PredictionPipeline::new(&config).load_models().unwrap_err();
        assert!(matches!(err, Error::Artifact(_)));
    }

    // ── Mailbox ─────────────────────────────────────────────────────

    #[test]
    fn process_without_mailbox_fails() {
        let mut pipeline = PredictionPipeline::new(&Config::default());
        assert!(matches!(
            pipeline.process_mailbox(),
            Err(Error::Pipeline(PipelineError::NoMailbox))
        ));
    }

    #[test]
    fn mbox_predictions_and_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = PredictionPipeline::new(&config_with_run(dir.path(), false));
        let mbox = dir.path().join("mail.mbox");
        std::fs::write(&mbox, MBOX).unwrap();
        let out = dir.path().join("predictions.csv");

        let result = pipeline.predict_mbox_file(&mbox, Some(out.as_path())).unwrap();
        assert_eq!(result.summary.total_emails, 2);
        assert_eq!(result.summary.counts.get("Spam"), Some(&1));
        assert_eq!(result.summary.counts.get("Ham"), Some(&1));
        assert_eq!(result.records[0].prediction, Some(Label::Spam));
        assert_eq!(pipeline.state().mailbox_path.as_deref(), Some(mbox.as_path()));
        assert!(pipeline.state().mail_data.is_none());

        let mut reader = csv::Reader::from_path(&out).unwrap();
        assert_eq!(reader.records().count(), 2);
    }

    #[test]
    fn summary_counts_labels() {
        let record = |prediction| MailRecord {
            time: String::new(),
            recipients: String::new(),
            subject: String::new(),
            body: String::new(),
            category: MailCategory::Inbox,
            direction: Direction::Received,
            prediction,
        };
        let records = vec![
            record(Some(Label::Spam)),
            record(Some(Label::Spam)),
            record(Some(Label::Ham)),
            record(None),
        ];
        let summary = PredictionSummary::from_records(&records);
        assert_eq!(summary.total_emails, 4);
        assert_eq!(summary.counts["Spam"], 2);
        assert_eq!(summary.counts["Ham"], 1);
    }
}
