//! CART decision tree over sparse rows.
//!
//! Splits are axis-aligned `x[f] <= threshold`. At each node only features
//! with at least one non-zero value among the node's samples can separate
//! them, so the search walks those features' non-zero entries plus one
//! implicit block of zeros.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::features::{SparseMatrix, SparseVector};
use crate::models::params::{ParamReader, ParamSet};
use crate::models::Classifier;

const MODEL: &str = "DecisionTree";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Gini,
    Entropy,
}

impl Criterion {
    fn impurity(self, counts: [usize; 2]) -> f64 {
        let total = (counts[0] + counts[1]) as f64;
        if total == 0.0 {
            return 0.0;
        }
        let p0 = counts[0] as f64 / total;
        let p1 = counts[1] as f64 / total;
        match self {
            Self::Gini => 1.0 - p0 * p0 - p1 * p1,
            Self::Entropy => [p0, p1]
                .iter()
                .filter(|p| **p > 0.0)
                .map(|p| -p * p.log2())
                .sum(),
        }
    }
}

/// How many candidate features to examine per split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    All,
    Sqrt,
    Log2,
}

impl MaxFeatures {
    fn limit(self, n_features: usize) -> Option<usize> {
        let n = n_features.max(1) as f64;
        match self {
            Self::All => None,
            Self::Sqrt => Some((n.sqrt() as usize).max(1)),
            Self::Log2 => Some((n.log2() as usize).max(1)),
        }
    }
}

/// Hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            criterion: Criterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
        }
    }
}

impl TreeParams {
    pub fn from_params(model: &'static str, params: &ParamSet) -> Result<Self, ModelError> {
        let r = ParamReader::new(model, params);
        let criterion = match r.choice("criterion", "gini", &["gini", "entropy"])? {
            "entropy" => Criterion::Entropy,
            _ => Criterion::Gini,
        };
        let max_features = match r.choice("max_features", "all", &["all", "sqrt", "log2"])? {
            "sqrt" => MaxFeatures::Sqrt,
            "log2" => MaxFeatures::Log2,
            _ => MaxFeatures::All,
        };
        Ok(Self {
            criterion,
            max_depth: r.optional_count("max_depth")?,
            min_samples_split: r.count("min_samples_split", 2, 2)?,
            min_samples_leaf: r.count("min_samples_leaf", 1, 1)?,
            max_features,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Node {
    Leaf {
        proba: [f64; 2],
    },
    Split {
        feature: u32,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted decision tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub params: TreeParams,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: u32,
    threshold: f64,
    impurity: f64,
}

fn class_counts(y: &[u8], samples: &[usize]) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for &i in samples {
        counts[usize::from(y[i] == 1)] += 1;
    }
    counts
}

impl DecisionTree {
    pub fn fit(params: TreeParams, x: &SparseMatrix, y: &[u8], seed: u64) -> Result<Self, ModelError> {
        super::check_training_set(MODEL, x, y)?;
        let mut rng = StdRng::seed_from_u64(seed);
        Ok(Self::fit_samples(params, x, y, (0..x.n_rows()).collect(), &mut rng))
    }

    /// Grow a tree on `samples` (row indices, duplicates allowed).
    pub(crate) fn fit_samples(
        params: TreeParams,
        x: &SparseMatrix,
        y: &[u8],
        samples: Vec<usize>,
        rng: &mut StdRng,
    ) -> Self {
        let mut nodes = vec![Node::Leaf { proba: [0.5, 0.5] }];
        let mut work = vec![(0usize, samples, 0usize)];

        while let Some((slot, samples, depth)) = work.pop() {
            let counts = class_counts(y, &samples);
            let total = samples.len() as f64;
            let leaf = Node::Leaf {
                proba: if total > 0.0 {
                    [counts[0] as f64 / total, counts[1] as f64 / total]
                } else {
                    [0.5, 0.5]
                },
            };

            let stop = params.max_depth.is_some_and(|d| depth >= d)
                || samples.len() < params.min_samples_split
                || samples.len() < 2 * params.min_samples_leaf
                || counts[0] == 0
                || counts[1] == 0;
            let split = if stop {
                None
            } else {
                best_split(&params, x, y, &samples, counts, rng)
            };

            let Some(split) = split else {
                nodes[slot] = leaf;
                continue;
            };

            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
                .iter()
                .partition(|&&i| x.row(i).get(split.feature) <= split.threshold);

            let left = nodes.len();
            nodes.push(Node::Leaf { proba: [0.5, 0.5] });
            let right = nodes.len();
            nodes.push(Node::Leaf { proba: [0.5, 0.5] });
            nodes[slot] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
            work.push((right, right_samples, depth + 1));
            work.push((left, left_samples, depth + 1));
        }

        Self { params, nodes }
    }

    fn leaf_proba(&self, row: &SparseVector) -> [f64; 2] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { proba } => return *proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row.get(*feature) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Number of nodes (splits + leaves).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest leaf (a single leaf has depth 0).
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            match &self.nodes[index] {
                Node::Leaf { .. } => deepest = deepest.max(depth),
                Node::Split { left, right, .. } => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
            }
        }
        deepest
    }
}

impl Classifier for DecisionTree {
    fn predict_row(&self, row: &SparseVector) -> u8 {
        let p = self.leaf_proba(row);
        u8::from(p[1] > p[0])
    }

    fn predict_proba_row(&self, row: &SparseVector) -> Option<[f64; 2]> {
        Some(self.leaf_proba(row))
    }
}

// ── Split search ────────────────────────────────────────────────────

fn best_split(
    params: &TreeParams,
    x: &SparseMatrix,
    y: &[u8],
    samples: &[usize],
    counts: [usize; 2],
    rng: &mut StdRng,
) -> Option<BestSplit> {
    let mut by_feature: HashMap<u32, Vec<(f64, u8)>> = HashMap::new();
    for &i in samples {
        for (f, v) in x.row(i).iter() {
            by_feature.entry(f).or_default().push((v, y[i]));
        }
    }

    let n = samples.len();
    let mut candidates: Vec<u32> = by_feature
        .iter()
        .filter(|(_, entries)| !is_constant(entries, n))
        .map(|(f, _)| *f)
        .collect();
    candidates.sort_unstable();
    if let Some(limit) = params.max_features.limit(x.n_features) {
        candidates.shuffle(rng);
        candidates.truncate(limit);
        candidates.sort_unstable();
    }

    let mut best: Option<BestSplit> = None;
    for feature in candidates {
        let Some(entries) = by_feature.get_mut(&feature) else {
            continue;
        };
        if let Some((threshold, impurity)) = best_threshold(params, entries, counts) {
            if best.as_ref().is_none_or(|b| impurity < b.impurity) {
                best = Some(BestSplit {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
    }
    best
}

/// A feature is constant when every sample stores the same non-zero value.
fn is_constant(entries: &[(f64, u8)], n: usize) -> bool {
    entries.len() == n && entries.iter().all(|(v, _)| *v == entries[0].0)
}

/// Best threshold for one feature: `(threshold, weighted child impurity)`.
fn best_threshold(
    params: &TreeParams,
    entries: &mut [(f64, u8)],
    counts: [usize; 2],
) -> Option<(f64, f64)> {
    entries.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

    let mut zero_counts = counts;
    for (_, label) in entries.iter() {
        zero_counts[usize::from(*label == 1)] -= 1;
    }

    // Runs of equal values with per-class counts, zeros merged in place.
    let mut runs: Vec<(f64, [usize; 2])> = Vec::new();
    let mut zeros_placed = zero_counts == [0, 0];
    for (value, label) in entries.iter() {
        if !zeros_placed && *value > 0.0 {
            runs.push((0.0, zero_counts));
            zeros_placed = true;
        }
        match runs.last_mut() {
            Some((v, c)) if *v == *value => c[usize::from(*label == 1)] += 1,
            _ => {
                let mut c = [0usize; 2];
                c[usize::from(*label == 1)] += 1;
                runs.push((*value, c));
            }
        }
    }
    if !zeros_placed {
        runs.push((0.0, zero_counts));
    }

    let n = (counts[0] + counts[1]) as f64;
    let mut left = [0usize; 2];
    let mut best: Option<(f64, f64)> = None;
    for pair in runs.windows(2) {
        let (value, run_counts) = pair[0];
        left[0] += run_counts[0];
        left[1] += run_counts[1];
        let right = [counts[0] - left[0], counts[1] - left[1]];
        let n_left = left[0] + left[1];
        let n_right = right[0] + right[1];
        if n_left < params.min_samples_leaf || n_right < params.min_samples_leaf {
            continue;
        }
        let impurity = (n_left as f64 * params.criterion.impurity(left)
            + n_right as f64 * params.criterion.impurity(right))
            / n;
        if best.is_none_or(|(_, b)| impurity < b) {
            best = Some(((value + pair[1].0) / 2.0, impurity));
        }
    }
    best
}
