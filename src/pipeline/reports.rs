//! CSV reports written to a run's `observations/` directory.

use std::path::Path;

use tracing::info;

use crate::error::ArtifactError;
use crate::models::params;
use crate::pipeline::training::TrainingOutcome;

pub const METADATA: &str = "model_metadata.csv";
pub const COMPARISON_SUMMARY: &str = "model_comparison_summary.csv";
pub const BEST_PARAMETERS: &str = "best_parameters.csv";
pub const CROSS_VALIDATION_SUMMARY: &str = "cross_validation_summary.csv";
pub const BEST_MODEL_INFO: &str = "best_model_info.csv";

fn write_rows(path: &Path, header: &[&str], rows: &[Vec<String>]) -> Result<(), ArtifactError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush().map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(file = %path.display(), rows = rows.len(), "Saved report");
    Ok(())
}

/// One-row summary of the run.
pub fn write_metadata(
    outcome: &TrainingOutcome,
    tfidf_features: usize,
    train_samples: usize,
    test_samples: usize,
) -> Result<(), ArtifactError> {
    let best = outcome.best();
    let path = outcome.run.observation(METADATA);
    let metrics =
        serde_json::to_string(&best.scores).map_err(|source| ArtifactError::Serialization {
            path: path.clone(),
            source,
        })?;
    let all_models = outcome
        .models
        .iter()
        .map(|m| m.kind.name())
        .collect::<Vec<_>>()
        .join(", ");
    write_rows(
        &path,
        &[
            "timestamp",
            "best_model_name",
            "best_model_params",
            "best_model_metrics",
            "all_models",
            "tfidf_features",
            "train_samples",
            "test_samples",
        ],
        &[vec![
            outcome.timestamp.clone(),
            best.kind.name().to_string(),
            params::to_json(&best.best_params),
            metrics,
            all_models,
            tfidf_features.to_string(),
            train_samples.to_string(),
            test_samples.to_string(),
        ]],
    )
}

/// Test metrics of every family, sorted by accuracy (highest first).
pub fn write_comparison_summary(outcome: &TrainingOutcome) -> Result<(), ArtifactError> {
    let best_kind = outcome.best().kind;
    let mut models: Vec<_> = outcome.models.iter().collect();
    models.sort_by(|a, b| b.scores.accuracy.total_cmp(&a.scores.accuracy));

    let rows: Vec<Vec<String>> = models
        .iter()
        .map(|m| {
            vec![
                m.kind.name().to_string(),
                m.scores.accuracy.to_string(),
                m.scores.precision.to_string(),
                m.scores.recall.to_string(),
                m.scores.f1_score.to_string(),
                m.cv_score.to_string(),
                if m.kind == best_kind { "1" } else { "0" }.to_string(),
            ]
        })
        .collect();
    write_rows(
        &outcome.run.observation(COMPARISON_SUMMARY),
        &["Model", "Accuracy", "Precision", "Recall", "F1_Score", "CV_Score", "Is_Best_Model"],
        &rows,
    )
}

pub fn write_best_parameters(outcome: &TrainingOutcome) -> Result<(), ArtifactError> {
    let rows: Vec<Vec<String>> = outcome
        .models
        .iter()
        .map(|m| {
            vec![
                m.kind.name().to_string(),
                params::to_pretty_json(&m.best_params),
                m.cv_score.to_string(),
            ]
        })
        .collect();
    write_rows(
        &outcome.run.observation(BEST_PARAMETERS),
        &["Model", "Best_Parameters", "CV_Score"],
        &rows,
    )
}

pub fn write_cross_validation_summary(outcome: &TrainingOutcome) -> Result<(), ArtifactError> {
    let rows: Vec<Vec<String>> = outcome
        .models
        .iter()
        .map(|m| {
            vec![
                m.kind.name().to_string(),
                m.cv_score.to_string(),
                params::to_json(&m.best_params),
            ]
        })
        .collect();
    write_rows(
        &outcome.run.observation(CROSS_VALIDATION_SUMMARY),
        &["Model", "Best_CV_Score", "Best_Parameters"],
        &rows,
    )
}

/// Attribute/value table describing the winning model.
pub fn write_best_model_info(outcome: &TrainingOutcome) -> Result<(), ArtifactError> {
    let best = outcome.best();
    let pairs = [
        ("Best Model Name", best.kind.name().to_string()),
        ("Accuracy", best.scores.accuracy.to_string()),
        ("Precision", best.scores.precision.to_string()),
        ("Recall", best.scores.recall.to_string()),
        ("F1-Score", best.scores.f1_score.to_string()),
        ("CV Score", best.cv_score.to_string()),
        ("Best Parameters", params::to_pretty_json(&best.best_params)),
    ];
    let rows: Vec<Vec<String>> = pairs
        .into_iter()
        .map(|(attribute, value)| vec![attribute.to_string(), value])
        .collect();
    write_rows(
        &outcome.run.observation(BEST_MODEL_INFO),
        &["Attribute", "Value"],
        &rows,
    )
}
