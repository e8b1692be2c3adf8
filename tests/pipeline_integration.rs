//! End-to-end tests: train on a synthetic CSV, then predict single emails
//! and an mbox archive from the persisted run.

use std::fs;
use std::path::Path;

use spam_classifier::config::default_grid;
use spam_classifier::models::ModelKind;
use spam_classifier::models::params::{ParamGrid, ParamValue};
use spam_classifier::state::TrainingState;
use spam_classifier::{Config, Error, Label, ModelConfig, PredictionPipeline, TrainingPipeline};

const SPAM: &[&str] = &[
    "WIN a FREE cash prize now, claim your reward",
    "Congratulations you won a free holiday, call now to claim",
    "Urgent: claim your cash bonus, limited offer",
    "Free entry to win cash, text WIN to claim prize",
    "You have been selected for a free cash reward",
];

const HAM: &[&str] = &[
    "Are we still meeting for lunch tomorrow?",
    "Please review the attached report before the meeting",
    "Can you pick up the kids from school today",
    "The project meeting moved to Thursday afternoon",
    "Thanks for dinner yesterday, see you at the office",
];

const MBOX: &str = concat!(
    "From 1@xxx Mon Jan 06 10:00:00 +0000 2025\n",
    "From: promo@prizes.example\n",
    "To: me@example.com\n",
    "Subject: You won\n",
    "X-Gmail-Labels: Spam\n",
    "\n",
    "Claim your free cash prize now, you won a reward\n",
    "\n",
    "From 2@xxx Mon Jan 06 11:00:00 +0000 2025\n",
    "From: colleague@example.com\n",
    "To: me@example.com\n",
    "Subject: Meeting\n",
    "X-Gmail-Labels: Inbox\n",
    "\n",
    "Can we move the project meeting to tomorrow afternoon?\n",
);

fn write_dataset(path: &Path) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.write_record(["Category", "Message"]).unwrap();
    for round in 0..4 {
        for text in SPAM {
            writer.write_record(["spam", &format!("{text} {round}")]).unwrap();
        }
        for text in HAM {
            writer.write_record(["ham", &format!("{text} {round}")]).unwrap();
        }
    }
    writer.flush().unwrap();
}

fn small_models() -> ModelConfig {
    let one = |kind: ModelKind, entries: &[(&str, ParamValue)]| -> (ModelKind, ParamGrid) {
        let mut grid = ParamGrid::new();
        for (key, value) in entries {
            grid.insert((*key).to_string(), vec![value.clone()]);
        }
        (kind, grid)
    };
    ModelConfig {
        models: vec![
            one(
                ModelKind::LogisticRegression,
                &[("C", ParamValue::Float(1.0)), ("solver", ParamValue::Text("lbfgs".into()))],
            ),
            one(ModelKind::DecisionTree, &[("criterion", ParamValue::Text("gini".into()))]),
            one(ModelKind::Svm, &[("kernel", ParamValue::Text("linear".into()))]),
            (ModelKind::Knn, default_grid(ModelKind::Knn)),
            one(ModelKind::RandomForest, &[("n_estimators", ParamValue::Int(10))]),
        ],
    }
}

fn train(dir: &Path) -> (Config, TrainingState) {
    let data = dir.join("dataset.csv");
    write_dataset(&data);
    let config = Config {
        training_data_path: data,
        output_base_dir: dir.join("outputs"),
        ..Config::default()
    };
    let state = TrainingPipeline::with_models(&config, small_models())
        .run_pipeline(3)
        .unwrap();
    (config, state)
}

#[test]
fn train_then_predict_single_emails() {
    let dir = tempfile::tempdir().unwrap();
    let (config, state) = train(dir.path());

    let outcome = state.outcome("test").unwrap();
    assert_eq!(outcome.models.len(), 5);
    assert!(outcome.best().scores.f1_score >= 0.9);
    assert!(outcome.run.model_path(outcome.best().kind.name()).is_file());
    assert!(outcome.run.vectorizer_path().is_file());

    let mut pipeline = PredictionPipeline::new(&config);
    let spam = pipeline
        .predict_single_email("Claim your FREE cash prize now!")
        .unwrap();
    assert_eq!(spam.prediction, Label::Spam);
    assert_eq!(spam.raw_prediction, 0);

    let ham = pipeline
        .predict_single_email("Are we meeting at the office tomorrow for lunch?")
        .unwrap();
    assert_eq!(ham.prediction, Label::Ham);
}

#[test]
fn train_then_predict_mailbox() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = train(dir.path());

    let mbox = dir.path().join("mail.mbox");
    fs::write(&mbox, MBOX).unwrap();
    let output = dir.path().join("out").join("predictions.csv");

    let result = PredictionPipeline::new(&config)
        .predict_mbox_file(&mbox, Some(output.as_path()))
        .unwrap();
    assert_eq!(result.summary.total_emails, 2);
    assert_eq!(result.records[0].prediction, Some(Label::Spam));
    assert_eq!(result.records[1].prediction, Some(Label::Ham));

    let mut reader = csv::Reader::from_path(&output).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.get(headers.len() - 1), Some("Prediction"));
    let rows: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get(4), Some("Spam"));
    assert_eq!(rows[0].get(6), Some("Spam"));
}

#[test]
fn missing_dataset_fails_ingestion() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        training_data_path: dir.path().join("absent.csv"),
        output_base_dir: dir.path().join("outputs"),
        ..Config::default()
    };
    let err = TrainingPipeline::new(&config).run_pipeline(3).unwrap_err();
    assert!(matches!(err, Error::Dataset(_)));
}
