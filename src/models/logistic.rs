//! L2-regularized logistic regression.
//!
//! Objective: `C * Σ log(1 + exp(-s_i z_i)) + ½‖w‖²` with `s_i ∈ {-1, +1}`
//! and `z_i = w·x_i + b`. Two solvers:
//! - `lbfgs`: L-BFGS over `(w, b)`, intercept not penalized.
//! - `liblinear`: cyclic coordinate-descent Newton over `(w, b)` where the
//!   intercept is a constant feature and is penalized like any weight.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::features::{SparseMatrix, SparseVector};
use crate::models::params::{ParamReader, ParamSet};
use crate::models::Classifier;

const MODEL: &str = "LogisticRegression";

/// Gradient tolerance for both solvers.
const TOL: f64 = 1e-4;

/// Correction pairs kept by L-BFGS.
const LBFGS_MEMORY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Solver {
    Lbfgs,
    Liblinear,
}

/// Hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    pub c: f64,
    pub solver: Solver,
    pub max_iter: usize,
}

impl LogisticParams {
    pub fn from_params(params: &ParamSet) -> Result<Self, ModelError> {
        let r = ParamReader::new(MODEL, params);
        let solver = match r.choice("solver", "lbfgs", &["lbfgs", "liblinear"])? {
            "liblinear" => Solver::Liblinear,
            _ => Solver::Lbfgs,
        };
        Ok(Self {
            c: r.positive_float("C", 1.0)?,
            solver,
            max_iter: r.count("max_iter", 100, 1)?,
        })
    }
}

/// A fitted logistic regression model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub params: LogisticParams,
    weights: Vec<f64>,
    intercept: f64,
}

fn sign(label: u8) -> f64 {
    if label == 1 { 1.0 } else { -1.0 }
}

/// `log(1 + exp(-m))`, overflow-safe.
fn log_loss(m: f64) -> f64 {
    if m > 0.0 {
        (-m).exp().ln_1p()
    } else {
        -m + m.exp().ln_1p()
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl LogisticRegression {
    pub fn fit(params: LogisticParams, x: &SparseMatrix, y: &[u8]) -> Result<Self, ModelError> {
        super::check_training_set(MODEL, x, y)?;
        let (weights, intercept) = match params.solver {
            Solver::Lbfgs => fit_lbfgs(&params, x, y),
            Solver::Liblinear => fit_coordinate_descent(&params, x, y),
        };
        Ok(Self {
            params,
            weights,
            intercept,
        })
    }

    /// Raw margin `w·x + b`.
    pub fn decision_function(&self, row: &SparseVector) -> f64 {
        row.dot_dense(&self.weights) + self.intercept
    }
}

impl Classifier for LogisticRegression {
    fn predict_row(&self, row: &SparseVector) -> u8 {
        u8::from(self.decision_function(row) > 0.0)
    }

    fn predict_proba_row(&self, row: &SparseVector) -> Option<[f64; 2]> {
        let p = sigmoid(self.decision_function(row));
        Some([1.0 - p, p])
    }
}

// ── L-BFGS ──────────────────────────────────────────────────────────

/// Objective and gradient at `theta = [w..., b]`.
fn objective(c: f64, x: &SparseMatrix, signs: &[f64], theta: &[f64]) -> (f64, Vec<f64>) {
    let d = x.n_features;
    let (w, b) = theta.split_at(d);
    let b = b[0];

    let mut grad = vec![0.0; d + 1];
    let mut loss = 0.0;
    for (row, s) in x.rows.iter().zip(signs) {
        let m = s * (row.dot_dense(w) + b);
        loss += log_loss(m);
        let coef = -c * s * sigmoid(-m);
        for (j, v) in row.iter() {
            grad[j as usize] += coef * v;
        }
        grad[d] += coef;
    }

    let penalty = 0.5 * dot(w, w);
    for (g, wj) in grad.iter_mut().zip(w) {
        *g += wj;
    }
    (c * loss + penalty, grad)
}

fn fit_lbfgs(params: &LogisticParams, x: &SparseMatrix, y: &[u8]) -> (Vec<f64>, f64) {
    let d = x.n_features;
    let signs: Vec<f64> = y.iter().map(|l| sign(*l)).collect();
    let mut theta = vec![0.0; d + 1];
    let (mut f, mut g) = objective(params.c, x, &signs, &theta);

    let mut history: Vec<(Vec<f64>, Vec<f64>, f64)> = Vec::with_capacity(LBFGS_MEMORY);

    for _ in 0..params.max_iter {
        if g.iter().fold(0.0f64, |m, v| m.max(v.abs())) < TOL {
            break;
        }

        // Two-loop recursion.
        let mut q = g.clone();
        let mut alphas = Vec::with_capacity(history.len());
        for (s, yv, rho) in history.iter().rev() {
            let alpha = rho * dot(s, &q);
            for (qi, yi) in q.iter_mut().zip(yv) {
                *qi -= alpha * yi;
            }
            alphas.push(alpha);
        }
        let gamma = history
            .last()
            .map(|(s, yv, _)| dot(s, yv) / dot(yv, yv).max(f64::MIN_POSITIVE))
            .unwrap_or(1.0);
        for qi in &mut q {
            *qi *= gamma;
        }
        for ((s, yv, rho), alpha) in history.iter().zip(alphas.iter().rev()) {
            let beta = rho * dot(yv, &q);
            for (qi, si) in q.iter_mut().zip(s) {
                *qi += si * (alpha - beta);
            }
        }
        let mut direction: Vec<f64> = q.iter().map(|v| -v).collect();
        let mut slope = dot(&g, &direction);
        if slope >= 0.0 {
            history.clear();
            direction = g.iter().map(|v| -v).collect();
            slope = dot(&g, &direction);
        }

        // Backtracking Armijo line search.
        let mut step = if history.is_empty() {
            1.0 / g.iter().map(|v| v * v).sum::<f64>().sqrt().max(1.0)
        } else {
            1.0
        };
        let mut accepted = None;
        for _ in 0..40 {
            let candidate: Vec<f64> = theta
                .iter()
                .zip(&direction)
                .map(|(t, dv)| t + step * dv)
                .collect();
            let (f_new, g_new) = objective(params.c, x, &signs, &candidate);
            if f_new <= f + 1e-4 * step * slope {
                accepted = Some((candidate, f_new, g_new));
                break;
            }
            step *= 0.5;
        }
        let Some((next, f_new, g_new)) = accepted else {
            break;
        };

        let s: Vec<f64> = next.iter().zip(&theta).map(|(a, b)| a - b).collect();
        let yv: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();
        let sy = dot(&s, &yv);
        if sy > 1e-10 {
            if history.len() == LBFGS_MEMORY {
                history.remove(0);
            }
            history.push((s, yv, 1.0 / sy));
        }

        let improvement = (f - f_new).abs();
        theta = next;
        f = f_new;
        g = g_new;
        if improvement <= f64::EPSILON * f.abs().max(1.0) {
            break;
        }
    }

    let intercept = theta.pop().unwrap_or(0.0);
    (theta, intercept)
}

// ── Coordinate descent ──────────────────────────────────────────────

fn fit_coordinate_descent(params: &LogisticParams, x: &SparseMatrix, y: &[u8]) -> (Vec<f64>, f64) {
    let d = x.n_features;
    let n = x.n_rows();
    let c = params.c;
    let signs: Vec<f64> = y.iter().map(|l| sign(*l)).collect();

    // Column view; the last column is the constant intercept feature.
    let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); d + 1];
    for (i, row) in x.rows.iter().enumerate() {
        for (j, v) in row.iter() {
            columns[j as usize].push((i, v));
        }
    }
    columns[d] = (0..n).map(|i| (i, 1.0)).collect();

    let mut w = vec![0.0; d + 1];
    let mut z = vec![0.0; n];

    let coordinate_loss = |z: &[f64], column: &[(usize, f64)], step: f64| -> f64 {
        column
            .iter()
            .map(|&(i, v)| log_loss(signs[i] * (z[i] + step * v)))
            .sum::<f64>()
    };

    for _ in 0..params.max_iter {
        let mut max_change = 0.0f64;
        for (j, column) in columns.iter().enumerate() {
            if column.is_empty() {
                continue;
            }
            let mut g = w[j];
            let mut h = 1.0;
            for &(i, v) in column {
                let m = signs[i] * z[i];
                let p = sigmoid(-m);
                g += -c * signs[i] * p * v;
                h += c * p * (1.0 - p) * v * v;
            }
            let mut step = -g / h;
            if step.abs() < 1e-12 {
                continue;
            }

            let base = c * coordinate_loss(&z, column, 0.0) + 0.5 * w[j] * w[j];
            for _ in 0..20 {
                let wj = w[j] + step;
                let trial = c * coordinate_loss(&z, column, step) + 0.5 * wj * wj;
                if trial <= base + 0.01 * step * g {
                    break;
                }
                step *= 0.5;
            }

            w[j] += step;
            for &(i, v) in column {
                z[i] += step * v;
            }
            max_change = max_change.max(step.abs());
        }
        if max_change < TOL {
            break;
        }
    }

    let intercept = w.pop().unwrap_or(0.0);
    (w, intercept)
}
