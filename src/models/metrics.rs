//! Classification metrics for binary labels {0, 1}.

use serde::{Deserialize, Serialize};

/// Test-set scores for one fitted model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub accuracy: f64,
    /// Support-weighted mean precision over both classes.
    pub precision: f64,
    /// Support-weighted mean recall over both classes.
    pub recall: f64,
    /// Support-weighted mean F1 over both classes.
    pub f1_score: f64,
}

impl Scores {
    pub fn compute(y_true: &[u8], y_pred: &[u8]) -> Self {
        Self {
            accuracy: accuracy(y_true, y_pred),
            precision: weighted(y_true, y_pred, precision),
            recall: weighted(y_true, y_pred, recall),
            f1_score: weighted(y_true, y_pred, f1),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    tp: usize,
    fp: usize,
    fn_: usize,
}

fn counts(y_true: &[u8], y_pred: &[u8], positive: u8) -> Counts {
    let mut c = Counts::default();
    for (t, p) in y_true.iter().zip(y_pred) {
        match (*t == positive, *p == positive) {
            (true, true) => c.tp += 1,
            (false, true) => c.fp += 1,
            (true, false) => c.fn_ += 1,
            (false, false) => {}
        }
    }
    c
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn precision(c: Counts) -> f64 {
    ratio(c.tp, c.tp + c.fp)
}

fn recall(c: Counts) -> f64 {
    ratio(c.tp, c.tp + c.fn_)
}

fn f1(c: Counts) -> f64 {
    ratio(2 * c.tp, 2 * c.tp + c.fp + c.fn_)
}

fn weighted(y_true: &[u8], y_pred: &[u8], metric: fn(Counts) -> f64) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let total = y_true.len() as f64;
    [0u8, 1u8]
        .iter()
        .map(|&label| {
            let support = y_true.iter().filter(|t| **t == label).count() as f64;
            metric(counts(y_true, y_pred, label)) * support / total
        })
        .sum()
}

/// Fraction of exact matches.
pub fn accuracy(y_true: &[u8], y_pred: &[u8]) -> f64 {
    let hits = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    ratio(hits, y_true.len())
}

/// F1 of the positive class (label 1, ham). Zero when undefined.
pub fn binary_f1(y_true: &[u8], y_pred: &[u8]) -> f64 {
    f1(counts(y_true, y_pred, 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions() {
        let y = [0, 1, 1, 0];
        let s = Scores::compute(&y, &y);
        assert_eq!(s.accuracy, 1.0);
        assert_eq!(s.precision, 1.0);
        assert_eq!(s.recall, 1.0);
        assert_eq!(s.f1_score, 1.0);
        assert_eq!(binary_f1(&y, &y), 1.0);
    }

    #[test]
    fn binary_f1_positive_class() {
        // tp=1, fp=1, fn=1 -> 2/(2+1+1) = 0.5
        let t = [1, 1, 0, 0];
        let p = [1, 0, 1, 0];
        assert!((binary_f1(&t, &p) - 0.5).abs() < 1e-12);
        assert!((accuracy(&t, &p) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn weighted_scores_use_support() {
        // true: three ham, one spam; predict all ham
        let t = [1, 1, 1, 0];
        let p = [1, 1, 1, 1];
        let s = Scores::compute(&t, &p);
        // ham precision 0.75 (weight .75), spam precision 0 (zero_division) -> 0.5625
        assert!((s.precision - 0.5625).abs() < 1e-12);
        // ham recall 1.0 * .75 + spam recall 0 -> 0.75
        assert!((s.recall - 0.75).abs() < 1e-12);
        // ham f1 = 6/7 * .75
        assert!((s.f1_score - 6.0 / 7.0 * 0.75).abs() < 1e-12);
    }

    #[test]
    fn undefined_metrics_are_zero() {
        assert_eq!(binary_f1(&[0, 0], &[0, 0]), 0.0);
        assert_eq!(accuracy(&[], &[]), 0.0);
        assert_eq!(Scores::compute(&[], &[]).f1_score, 0.0);
    }
}
