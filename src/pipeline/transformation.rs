//! Label encoding, stratified split and TF-IDF vectorization.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use crate::error::{DatasetError, Error};
use crate::features::TfidfVectorizer;
use crate::models::Label;
use crate::state::{FeatureSet, LabeledMessage, SplitData, TrainingState};

const STAGE: &str = "data transformation";

pub struct DataTransformation {
    test_size: f64,
    seed: u64,
}

impl DataTransformation {
    pub fn new(test_size: f64, seed: u64) -> Self {
        Self { test_size, seed }
    }

    /// Encode labels, split, and vectorize; results land in `state`.
    pub fn transform_data(&self, state: &mut TrainingState) -> Result<(), Error> {
        info!("Data transformation started");
        let dataset = state.dataset(STAGE)?;
        let labels = encode_labels(&dataset.records)?;
        info!(rows = labels.len(), "Label encoding completed");

        let split = stratified_split(&dataset.records, &labels, self.test_size, self.seed)?;
        info!(
            train = split.y_train.len(),
            test = split.y_test.len(),
            "Train/test split completed"
        );

        let (vectorizer, x_train) = TfidfVectorizer::fit_transform(&split.train_texts);
        let x_test = vectorizer.transform(&split.test_texts);
        info!(
            features = vectorizer.n_features(),
            train_nnz = x_train.nnz(),
            "TF-IDF transformation completed"
        );

        state.split = Some(split);
        state.features = Some(FeatureSet {
            vectorizer,
            x_train,
            x_test,
        });
        Ok(())
    }
}

/// `spam` → 0, `ham` → 1. Row numbers in errors are 1-based data rows.
pub fn encode_labels(records: &[LabeledMessage]) -> Result<Vec<u8>, DatasetError> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            Label::parse_category(&r.category)
                .map(Label::encoded)
                .ok_or_else(|| DatasetError::UnknownLabel {
                    row: i + 1,
                    label: r.category.clone(),
                })
        })
        .collect()
}

/// Seeded stratified split. Each class sends `round(n * test_size)` rows to
/// the test side, at least one when the class has two or more rows and never
/// all of them.
pub fn stratified_split(
    records: &[LabeledMessage],
    labels: &[u8],
    test_size: f64,
    seed: u64,
) -> Result<SplitData, DatasetError> {
    let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (i, &label) in labels.iter().enumerate() {
        by_class[usize::from(label == 1)].push(i);
    }
    if by_class.iter().any(Vec::is_empty) {
        return Err(DatasetError::SingleClass);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();
    for indices in &mut by_class {
        indices.shuffle(&mut rng);
        let n = indices.len();
        let mut n_test = (n as f64 * test_size).round() as usize;
        if n >= 2 {
            n_test = n_test.clamp(1, n - 1);
        } else {
            n_test = 0;
        }
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    let texts = |idx: &[usize]| -> Vec<String> {
        idx.iter().map(|&i| records[i].message.clone()).collect()
    };
    let ys = |idx: &[usize]| -> Vec<u8> { idx.iter().map(|&i| labels[i]).collect() };
    Ok(SplitData {
        train_texts: texts(&train),
        test_texts: texts(&test),
        y_train: ys(&train),
        y_test: ys(&test),
    })
}
