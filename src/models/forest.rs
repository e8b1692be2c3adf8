//! Random forest: bootstrap-sampled trees with per-split feature subsets.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::features::{SparseMatrix, SparseVector};
use crate::models::params::{ParamReader, ParamSet};
use crate::models::tree::{DecisionTree, MaxFeatures, TreeParams};
use crate::models::Classifier;

const MODEL: &str = "RandomForest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub tree: TreeParams,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            tree: TreeParams {
                max_features: MaxFeatures::Sqrt,
                ..TreeParams::default()
            },
        }
    }
}

impl ForestParams {
    pub fn from_params(params: &ParamSet) -> Result<Self, ModelError> {
        let r = ParamReader::new(MODEL, params);
        let mut tree = TreeParams::from_params(MODEL, params)?;
        if !params.contains_key("max_features") {
            tree.max_features = MaxFeatures::Sqrt;
        }
        Ok(Self {
            n_estimators: r.count("n_estimators", 100, 1)?,
            tree,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub params: ForestParams,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit(params: ForestParams, x: &SparseMatrix, y: &[u8], seed: u64) -> Result<Self, ModelError> {
        super::check_training_set(MODEL, x, y)?;
        let n = x.n_rows();
        let mut master = StdRng::seed_from_u64(seed);
        let seeds: Vec<u64> = (0..params.n_estimators).map(|_| master.next_u64()).collect();

        let trees = seeds
            .into_par_iter()
            .map(|tree_seed| {
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit_samples(params.tree, x, y, samples, &mut rng)
            })
            .collect();

        Ok(Self { params, trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn mean_proba(&self, row: &SparseVector) -> [f64; 2] {
        if self.trees.is_empty() {
            return [0.5, 0.5];
        }
        let mut sum = [0.0; 2];
        for tree in &self.trees {
            if let Some(p) = tree.predict_proba_row(row) {
                sum[0] += p[0];
                sum[1] += p[1];
            }
        }
        let k = self.trees.len() as f64;
        [sum[0] / k, sum[1] / k]
    }
}

impl Classifier for RandomForest {
    fn predict_row(&self, row: &SparseVector) -> u8 {
        let p = self.mean_proba(row);
        u8::from(p[1] > p[0])
    }

    fn predict_proba_row(&self, row: &SparseVector) -> Option<[f64; 2]> {
        Some(self.mean_proba(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::params::ParamValue;

    fn row(pairs: &[(u32, f64)]) -> SparseVector {
        SparseVector::from_pairs(pairs.to_vec())
    }

    /// Spam rows carry feature 0, ham rows carry feature 1.
    fn dataset() -> (SparseMatrix, Vec<u8>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..10 {
            let noise = 2 + (i % 3) as u32;
            rows.push(row(&[(0, 0.9), (noise, 0.3)]));
            labels.push(0);
            rows.push(row(&[(1, 0.9), (noise, 0.3)]));
            labels.push(1);
        }
        (SparseMatrix::new(rows, 5), labels)
    }

    #[test]
    fn forest_fits_and_is_deterministic() {
        let (x, y) = dataset();
        let params = ForestParams {
            n_estimators: 15,
            ..ForestParams::default()
        };
        let a = RandomForest::fit(params, &x, &y, 42).unwrap();
        let b = RandomForest::fit(params, &x, &y, 42).unwrap();
        assert_eq!(a.n_trees(), 15);
        assert_eq!(a.predict(&x), b.predict(&x));

        let probe = row(&[(1, 0.9)]);
        assert_eq!(a.predict_proba_row(&probe), b.predict_proba_row(&probe));
        let p = a.predict_proba_row(&probe).unwrap();
        assert!((p[0] + p[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn forest_fits_clear_signal() {
        let (x, y) = dataset();
        let params = ForestParams {
            n_estimators: 25,
            tree: TreeParams {
                max_features: MaxFeatures::All,
                ..TreeParams::default()
            },
        };
        let forest = RandomForest::fit(params, &x, &y, 7).unwrap();
        assert_eq!(forest.predict(&x), y);
    }

    #[test]
    fn params_default_to_sqrt_features() {
        let mut set = ParamSet::new();
        set.insert("n_estimators".into(), ParamValue::Int(50));
        set.insert("max_depth".into(), ParamValue::Int(10));
        let p = ForestParams::from_params(&set).unwrap();
        assert_eq!(p.n_estimators, 50);
        assert_eq!(p.tree.max_depth, Some(10));
        assert_eq!(p.tree.max_features, MaxFeatures::Sqrt);

        set.insert("max_features".into(), ParamValue::Text("log2".into()));
        assert_eq!(ForestParams::from_params(&set).unwrap().tree.max_features, MaxFeatures::Log2);
    }
}
