//! Support vector classifier trained with SMO.
//!
//! Working-set selection uses second-order information (maximal violating
//! pair with the largest objective decrease). Kernel rows are computed on
//! demand and kept in a small cache; only support vectors are retained after
//! fitting. The classifier exposes no probabilities.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::features::{SparseMatrix, SparseVector};
use crate::models::params::{ParamReader, ParamSet, ParamValue};
use crate::models::Classifier;

const MODEL: &str = "SVM";
const TOLERANCE: f64 = 1e-3;
const TAU: f64 = 1e-12;
const CACHE_ROWS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    Linear,
    Rbf,
}

/// How the RBF width is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gamma {
    /// `1 / (n_features * X.var())`
    Scale,
    /// `1 / n_features`
    Auto,
    Value(f64),
}

impl Gamma {
    fn resolve(self, x: &SparseMatrix) -> f64 {
        let n_features = x.n_features.max(1) as f64;
        match self {
            Self::Scale => {
                let variance = x.variance();
                if variance > 0.0 {
                    1.0 / (n_features * variance)
                } else {
                    1.0
                }
            }
            Self::Auto => 1.0 / n_features,
            Self::Value(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvmParams {
    pub c: f64,
    pub kernel: KernelKind,
    pub gamma: Gamma,
    pub max_iter: usize,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelKind::Rbf,
            gamma: Gamma::Scale,
            max_iter: 1_000_000,
        }
    }
}

impl SvmParams {
    pub fn from_params(params: &ParamSet) -> Result<Self, ModelError> {
        let r = ParamReader::new(MODEL, params);
        let kernel = match r.choice("kernel", "rbf", &["linear", "rbf"])? {
            "linear" => KernelKind::Linear,
            _ => KernelKind::Rbf,
        };
        let gamma = match params.get("gamma") {
            None | Some(ParamValue::Text(_)) => match r.choice("gamma", "scale", &["scale", "auto"])? {
                "auto" => Gamma::Auto,
                _ => Gamma::Scale,
            },
            Some(_) => Gamma::Value(r.positive_float("gamma", 1.0)?),
        };
        Ok(Self {
            c: r.positive_float("C", 1.0)?,
            kernel,
            gamma,
            max_iter: r.count("max_iter", 1_000_000, 1)?,
        })
    }
}

/// Resolved kernel function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Kernel {
    kind: KernelKind,
    gamma: f64,
}

impl Kernel {
    fn eval(&self, a: &SparseVector, b: &SparseVector) -> f64 {
        match self.kind {
            KernelKind::Linear => a.dot(b),
            KernelKind::Rbf => (-self.gamma * a.squared_euclidean(b)).exp(),
        }
    }
}

/// A fitted support vector classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportVectorClassifier {
    pub params: SvmParams,
    kernel: Kernel,
    support_vectors: Vec<SparseVector>,
    /// `alpha_i * y_i` per support vector.
    dual_coef: Vec<f64>,
    rho: f64,
}

/// Bounded cache of kernel matrix rows.
struct KernelRows<'a> {
    x: &'a SparseMatrix,
    kernel: Kernel,
    rows: HashMap<usize, Vec<f64>>,
    order: VecDeque<usize>,
}

impl<'a> KernelRows<'a> {
    fn new(x: &'a SparseMatrix, kernel: Kernel) -> Self {
        Self {
            x,
            kernel,
            rows: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn row(&mut self, i: usize) -> &[f64] {
        if !self.rows.contains_key(&i) {
            if self.order.len() >= CACHE_ROWS
                && let Some(evicted) = self.order.pop_front()
            {
                self.rows.remove(&evicted);
            }
            let (x, kernel) = (self.x, self.kernel);
            let xi = x.row(i);
            let values = x.rows.iter().map(|xt| kernel.eval(xi, xt)).collect();
            self.rows.insert(i, values);
            self.order.push_back(i);
        }
        &self.rows[&i]
    }
}

impl SupportVectorClassifier {
    pub fn fit(params: SvmParams, x: &SparseMatrix, y: &[u8]) -> Result<Self, ModelError> {
        super::check_training_set(MODEL, x, y)?;

        let kernel = Kernel {
            kind: params.kernel,
            gamma: params.gamma.resolve(x),
        };
        let n = x.n_rows();
        let c = params.c;
        let signs: Vec<f64> = y.iter().map(|&l| if l == 1 { 1.0 } else { -1.0 }).collect();
        let diag: Vec<f64> = x.rows.iter().map(|r| kernel.eval(r, r)).collect();

        let mut alpha = vec![0.0; n];
        let mut grad = vec![-1.0; n];
        let mut cache = KernelRows::new(x, kernel);

        let upper = |a: f64| a >= c;
        let lower = |a: f64| a <= 0.0;

        for _ in 0..params.max_iter {
            // i: maximal violator in I_up.
            let mut g_max = f64::NEG_INFINITY;
            let mut i = None;
            for t in 0..n {
                let in_up = if signs[t] > 0.0 { !upper(alpha[t]) } else { !lower(alpha[t]) };
                if in_up && -signs[t] * grad[t] >= g_max {
                    g_max = -signs[t] * grad[t];
                    i = Some(t);
                }
            }
            let Some(i) = i else { break };

            // j: largest second-order decrease in I_low.
            let k_i = cache.row(i).to_vec();
            let mut g_max2 = f64::NEG_INFINITY;
            let mut j = None;
            let mut best_obj = f64::INFINITY;
            for t in 0..n {
                let in_low = if signs[t] > 0.0 { !lower(alpha[t]) } else { !upper(alpha[t]) };
                if !in_low {
                    continue;
                }
                let yg = signs[t] * grad[t];
                g_max2 = g_max2.max(yg);
                let grad_diff = g_max + yg;
                if grad_diff > 0.0 {
                    let quad = diag[i] + diag[t] - 2.0 * k_i[t];
                    let quad = if quad > 0.0 { quad } else { TAU };
                    let obj = -(grad_diff * grad_diff) / quad;
                    if obj <= best_obj {
                        best_obj = obj;
                        j = Some(t);
                    }
                }
            }
            let Some(j) = j else { break };
            if g_max + g_max2 < TOLERANCE {
                break;
            }

            let k_j = cache.row(j).to_vec();
            let (old_i, old_j) = (alpha[i], alpha[j]);
            let quad = diag[i] + diag[j] - 2.0 * k_i[j];
            let quad = if quad > 0.0 { quad } else { TAU };

            if signs[i] != signs[j] {
                let delta = (-grad[i] - grad[j]) / quad;
                let diff = alpha[i] - alpha[j];
                alpha[i] += delta;
                alpha[j] += delta;
                if diff > 0.0 {
                    if alpha[j] < 0.0 {
                        alpha[j] = 0.0;
                        alpha[i] = diff;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = -diff;
                }
                if diff > 0.0 {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = c - diff;
                    }
                } else if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = c + diff;
                }
            } else {
                let delta = (grad[i] - grad[j]) / quad;
                let sum = alpha[i] + alpha[j];
                alpha[i] -= delta;
                alpha[j] += delta;
                if sum > c {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = sum - c;
                    }
                } else if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = sum;
                }
                if sum > c {
                    if alpha[j] > c {
                        alpha[j] = c;
                        alpha[i] = sum - c;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = sum;
                }
            }

            let d_i = alpha[i] - old_i;
            let d_j = alpha[j] - old_j;
            for t in 0..n {
                grad[t] += signs[t] * (signs[i] * k_i[t] * d_i + signs[j] * k_j[t] * d_j);
            }
        }

        let rho = compute_rho(&alpha, &grad, &signs, c);

        let mut support_vectors = Vec::new();
        let mut dual_coef = Vec::new();
        for (t, &a) in alpha.iter().enumerate() {
            if a > 0.0 {
                support_vectors.push(x.row(t).clone());
                dual_coef.push(a * signs[t]);
            }
        }

        Ok(Self {
            params,
            kernel,
            support_vectors,
            dual_coef,
            rho,
        })
    }

    /// Signed distance to the separating surface; positive means ham.
    pub fn decision_function(&self, row: &SparseVector) -> f64 {
        self.support_vectors
            .iter()
            .zip(&self.dual_coef)
            .map(|(sv, coef)| coef * self.kernel.eval(sv, row))
            .sum::<f64>()
            - self.rho
    }

    pub fn n_support(&self) -> usize {
        self.support_vectors.len()
    }
}

fn compute_rho(alpha: &[f64], grad: &[f64], signs: &[f64], c: f64) -> f64 {
    let mut ub = f64::INFINITY;
    let mut lb = f64::NEG_INFINITY;
    let mut free = 0usize;
    let mut free_sum = 0.0;
    for t in 0..alpha.len() {
        let yg = signs[t] * grad[t];
        if alpha[t] >= c {
            if signs[t] < 0.0 { ub = ub.min(yg) } else { lb = lb.max(yg) }
        } else if alpha[t] <= 0.0 {
            if signs[t] > 0.0 { ub = ub.min(yg) } else { lb = lb.max(yg) }
        } else {
            free += 1;
            free_sum += yg;
        }
    }
    if free > 0 {
        free_sum / free as f64
    } else if ub.is_infinite() {
        lb
    } else if lb.is_infinite() {
        ub
    } else {
        (ub + lb) / 2.0
    }
}

impl Classifier for SupportVectorClassifier {
    fn predict_row(&self, row: &SparseVector) -> u8 {
        u8::from(self.decision_function(row) > 0.0)
    }
}
