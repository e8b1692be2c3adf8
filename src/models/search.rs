//! Exhaustive grid search with stratified k-fold cross-validation.

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::error::ModelError;
use crate::features::SparseMatrix;
use crate::models::metrics::binary_f1;
use crate::models::params::{self, ParamGrid, ParamSet};
use crate::models::{Classifier, Model, ModelKind};

/// Train/validation index sets for one fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified k-fold without shuffling.
///
/// Labels are distributed across folds so that each fold holds close to the
/// overall class ratio; within a class, samples keep their original order and
/// fill fold 0 first.
pub fn stratified_folds(y: &[u8], k: usize) -> Result<Vec<Fold>, ModelError> {
    if k < 2 || y.len() < k {
        return Err(ModelError::TooFewSamples {
            folds: k,
            found: y.len(),
        });
    }

    let mut sorted = y.to_vec();
    sorted.sort_unstable();
    // allocation[fold][class]
    let mut allocation = vec![[0usize; 2]; k];
    for (position, label) in sorted.iter().enumerate() {
        allocation[position % k][usize::from(*label == 1)] += 1;
    }

    let mut assignment = vec![0usize; y.len()];
    for class in 0..2u8 {
        let mut fold = 0;
        let mut used = 0;
        for (i, label) in y.iter().enumerate() {
            if u8::from(*label == 1) != class {
                continue;
            }
            while fold < k && used >= allocation[fold][usize::from(class)] {
                fold += 1;
                used = 0;
            }
            assignment[i] = fold.min(k - 1);
            used += 1;
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..y.len()).partition(|&i| assignment[i] == fold);
            Fold { train, test }
        })
        .collect())
}

/// Cross-validation outcome for one parameter assignment.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    pub params: ParamSet,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

/// Result of searching one family's grid.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub kind: ModelKind,
    pub best_params: ParamSet,
    pub best_score: f64,
    pub candidates: Vec<CandidateScore>,
    /// Best candidate refit on the full training set.
    pub best_model: Model,
}

pub struct GridSearch<'a> {
    kind: ModelKind,
    grid: &'a ParamGrid,
    folds: usize,
    seed: u64,
}

struct FoldData {
    x_train: SparseMatrix,
    y_train: Vec<u8>,
    x_test: SparseMatrix,
    y_test: Vec<u8>,
}

impl<'a> GridSearch<'a> {
    pub fn new(kind: ModelKind, grid: &'a ParamGrid, folds: usize, seed: u64) -> Self {
        Self {
            kind,
            grid,
            folds,
            seed,
        }
    }

    pub fn run(&self, x: &SparseMatrix, y: &[u8]) -> Result<SearchResult, ModelError> {
        super::check_training_set(self.kind.name(), x, y)?;
        let candidates = params::expand(self.grid);
        if candidates.is_empty() {
            return Err(ModelError::EmptyGrid(self.kind.name().to_string()));
        }

        let folds: Vec<FoldData> = stratified_folds(y, self.folds)?
            .into_iter()
            .map(|f| FoldData {
                x_train: x.select(&f.train),
                y_train: f.train.iter().map(|&i| y[i]).collect(),
                x_test: x.select(&f.test),
                y_test: f.test.iter().map(|&i| y[i]).collect(),
            })
            .collect();

        debug!(
            model = self.kind.name(),
            candidates = candidates.len(),
            folds = folds.len(),
            "Starting grid search"
        );

        let scored: Vec<CandidateScore> = candidates
            .into_par_iter()
            .map(|params| self.score(params, &folds))
            .collect::<Result<_, _>>()?;

        let mut best = 0;
        for (i, c) in scored.iter().enumerate() {
            if c.mean_score > scored[best].mean_score {
                best = i;
            }
        }
        let best_params = scored[best].params.clone();
        let best_score = scored[best].mean_score;
        let best_model = Model::fit(self.kind, &best_params, x, y, self.seed)?;

        Ok(SearchResult {
            kind: self.kind,
            best_params,
            best_score,
            candidates: scored,
            best_model,
        })
    }

    fn score(&self, params: ParamSet, folds: &[FoldData]) -> Result<CandidateScore, ModelError> {
        let fold_scores = folds
            .iter()
            .map(|fold| {
                let model = Model::fit(self.kind, &params, &fold.x_train, &fold.y_train, self.seed)?;
                Ok(binary_f1(&fold.y_test, &model.predict(&fold.x_test)))
            })
            .collect::<Result<Vec<f64>, ModelError>>()?;
        let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
        Ok(CandidateScore {
            params,
            fold_scores,
            mean_score,
        })
    }
}
