//! Brute-force k-nearest-neighbours classifier.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::features::{SparseMatrix, SparseVector};
use crate::models::params::{ParamReader, ParamSet};
use crate::models::Classifier;

const MODEL: &str = "KNN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weights {
    Uniform,
    /// Inverse distance; exact matches take all the weight.
    Distance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Euclidean,
    Manhattan,
}

impl Metric {
    fn distance(self, a: &SparseVector, b: &SparseVector) -> f64 {
        match self {
            Self::Euclidean => a.euclidean(b),
            Self::Manhattan => a.manhattan(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnnParams {
    pub n_neighbors: usize,
    pub weights: Weights,
    pub metric: Metric,
}

impl Default for KnnParams {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            weights: Weights::Uniform,
            metric: Metric::Euclidean,
        }
    }
}

impl KnnParams {
    pub fn from_params(params: &ParamSet) -> Result<Self, ModelError> {
        let r = ParamReader::new(MODEL, params);
        let weights = match r.choice("weights", "uniform", &["uniform", "distance"])? {
            "distance" => Weights::Distance,
            _ => Weights::Uniform,
        };
        let metric = match r.choice("metric", "euclidean", &["euclidean", "manhattan"])? {
            "manhattan" => Metric::Manhattan,
            _ => Metric::Euclidean,
        };
        Ok(Self {
            n_neighbors: r.count("n_neighbors", 5, 1)?,
            weights,
            metric,
        })
    }
}

/// A fitted KNN model: the training rows themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    pub params: KnnParams,
    samples: SparseMatrix,
    labels: Vec<u8>,
}

impl KNearestNeighbors {
    pub fn fit(params: KnnParams, x: &SparseMatrix, y: &[u8]) -> Result<Self, ModelError> {
        super::check_training_set(MODEL, x, y)?;
        Ok(Self {
            params,
            samples: x.clone(),
            labels: y.to_vec(),
        })
    }

    /// Indices and distances of the nearest training rows, closest first.
    fn neighbors(&self, row: &SparseVector) -> Vec<(usize, f64)> {
        let mut distances: Vec<(usize, f64)> = self
            .samples
            .rows
            .iter()
            .enumerate()
            .map(|(i, sample)| (i, self.params.metric.distance(sample, row)))
            .collect();
        distances.sort_by(|a, b| a.1.total_cmp(&b.1));
        distances.truncate(self.params.n_neighbors.min(distances.len()));
        distances
    }

    fn votes(&self, row: &SparseVector) -> [f64; 2] {
        let neighbors = self.neighbors(row);
        let exact = neighbors.iter().any(|(_, d)| *d == 0.0);
        let mut votes = [0.0; 2];
        for (i, d) in neighbors {
            let weight = match self.params.weights {
                Weights::Uniform => 1.0,
                Weights::Distance if exact => f64::from(u8::from(d == 0.0)),
                Weights::Distance => 1.0 / d,
            };
            votes[usize::from(self.labels[i] == 1)] += weight;
        }
        let total = votes[0] + votes[1];
        if total > 0.0 {
            [votes[0] / total, votes[1] / total]
        } else {
            [0.5, 0.5]
        }
    }
}

impl Classifier for KNearestNeighbors {
    fn predict_row(&self, row: &SparseVector) -> u8 {
        let p = self.votes(row);
        u8::from(p[1] > p[0])
    }

    fn predict_proba_row(&self, row: &SparseVector) -> Option<[f64; 2]> {
        Some(self.votes(row))
    }
}
