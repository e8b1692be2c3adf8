//! Error types for the spam classifier.

use std::path::PathBuf;

/// Top-level error type for training and prediction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown model family: {0}")]
    UnknownModel(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Labeled training data errors.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Dataset is missing required column: {0}")]
    MissingColumn(String),

    #[error("Dataset contains no rows")]
    Empty,

    #[error("Unknown label {label:?} at row {row} (expected spam or ham)")]
    UnknownLabel { row: usize, label: String },

    #[error("Dataset needs both spam and ham rows to train")]
    SingleClass,
}

/// Mailbox archive errors.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Failed to open mailbox {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Classifier fitting and evaluation errors.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid parameter {name} for {model}: {reason}")]
    InvalidParameter {
        model: String,
        name: String,
        reason: String,
    },

    #[error("Cannot fit {model} on an empty training set")]
    EmptyTrainingSet { model: String },

    #[error("Feature/label length mismatch: {rows} rows, {labels} labels")]
    LengthMismatch { rows: usize, labels: usize },

    #[error("Cross-validation with {folds} folds needs at least {folds} samples, found {found}")]
    TooFewSamples { folds: usize, found: usize },

    #[error("Parameter grid for {0} is empty")]
    EmptyGrid(String),
}

/// Persisted model/vectorizer and report errors.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error on {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write report: {0}")]
    Csv(#[from] csv::Error),

    #[error("No trained artifacts found under {0}")]
    NotFound(PathBuf),
}

/// Pipeline orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Stage {stage} requires {missing}, which has not been produced yet")]
    StageNotRun {
        stage: &'static str,
        missing: &'static str,
    },

    #[error("No mailbox loaded. Call load_mailbox() first.")]
    NoMailbox,

    #[error("Email body cannot be empty")]
    EmptyInput,
}

/// Result type alias for the classifier.
pub type Result<T> = std::result::Result<T, Error>;
