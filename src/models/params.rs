//! Hyperparameter values, grids and grid expansion.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// A single hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Unbounded / not set (e.g. `max_depth = None`).
    None,
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

/// Candidate values per parameter name.
pub type ParamGrid = BTreeMap<String, Vec<ParamValue>>;

/// One concrete parameter assignment.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Expand a grid into every combination.
///
/// Keys iterate in sorted order and the last key varies fastest. A grid with
/// no keys yields a single empty assignment; a key with no values yields none.
pub fn expand(grid: &ParamGrid) -> Vec<ParamSet> {
    let mut combos = vec![ParamSet::new()];
    for (name, values) in grid {
        let mut next = Vec::with_capacity(combos.len() * values.len());
        for combo in &combos {
            for value in values {
                let mut extended = combo.clone();
                extended.insert(name.clone(), value.clone());
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

/// Render a parameter set as compact JSON for logs and reports.
pub fn to_json(params: &ParamSet) -> String {
    serde_json::to_string(params).unwrap_or_default()
}

/// Render a parameter set as indented JSON.
pub fn to_pretty_json(params: &ParamSet) -> String {
    serde_json::to_string_pretty(params).unwrap_or_default()
}

/// Typed access to a parameter set on behalf of one model family.
pub struct ParamReader<'a> {
    model: &'static str,
    params: &'a ParamSet,
}

impl<'a> ParamReader<'a> {
    pub fn new(model: &'static str, params: &'a ParamSet) -> Self {
        Self { model, params }
    }

    fn invalid(&self, name: &str, reason: impl Into<String>) -> ModelError {
        ModelError::InvalidParameter {
            model: self.model.to_string(),
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Float parameter; integers are widened.
    pub fn float(&self, name: &str, default: f64) -> Result<f64, ModelError> {
        match self.params.get(name) {
            None => Ok(default),
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(self.invalid(name, format!("expected a number, got {other}"))),
        }
    }

    /// Positive float parameter.
    pub fn positive_float(&self, name: &str, default: f64) -> Result<f64, ModelError> {
        let v = self.float(name, default)?;
        if v > 0.0 && v.is_finite() {
            Ok(v)
        } else {
            Err(self.invalid(name, format!("must be positive, got {v}")))
        }
    }

    /// Integer parameter that must be at least `min`.
    pub fn count(&self, name: &str, default: usize, min: usize) -> Result<usize, ModelError> {
        let v = match self.params.get(name) {
            None => default as i64,
            Some(ParamValue::Int(v)) => *v,
            Some(other) => {
                return Err(self.invalid(name, format!("expected an integer, got {other}")));
            }
        };
        if v < min as i64 {
            return Err(self.invalid(name, format!("must be at least {min}, got {v}")));
        }
        Ok(v as usize)
    }

    /// Optional positive integer (`None` means unbounded).
    pub fn optional_count(&self, name: &str) -> Result<Option<usize>, ModelError> {
        match self.params.get(name) {
            None | Some(ParamValue::None) => Ok(None),
            Some(ParamValue::Int(v)) if *v >= 1 => Ok(Some(*v as usize)),
            Some(other) => Err(self.invalid(name, format!("expected a positive integer or None, got {other}"))),
        }
    }

    /// String parameter restricted to `allowed` values.
    pub fn choice(
        &self,
        name: &str,
        default: &'static str,
        allowed: &[&'static str],
    ) -> Result<&'static str, ModelError> {
        let raw = match self.params.get(name) {
            None => default,
            Some(ParamValue::Text(v)) => v.as_str(),
            Some(other) => {
                return Err(self.invalid(name, format!("expected one of {allowed:?}, got {other}")));
            }
        };
        allowed
            .iter()
            .find(|a| a.eq_ignore_ascii_case(raw))
            .copied()
            .ok_or_else(|| self.invalid(name, format!("expected one of {allowed:?}, got {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(entries: &[(&str, Vec<ParamValue>)]) -> ParamGrid {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    // ── Expansion ───────────────────────────────────────────────────

    #[test]
    fn expand_is_cartesian_with_last_key_fastest() {
        let g = grid(&[
            ("b", vec![ParamValue::Int(1), ParamValue::Int(2)]),
            ("a", vec![ParamValue::Text("x".into()), ParamValue::Text("y".into())]),
        ]);
        let combos = expand(&g);
        assert_eq!(combos.len(), 4);
        // keys sorted: a, b -> b varies fastest
        assert_eq!(combos[0]["a"], ParamValue::Text("x".into()));
        assert_eq!(combos[0]["b"], ParamValue::Int(1));
        assert_eq!(combos[1]["a"], ParamValue::Text("x".into()));
        assert_eq!(combos[1]["b"], ParamValue::Int(2));
        assert_eq!(combos[2]["a"], ParamValue::Text("y".into()));
    }

    #[test]
    fn expand_empty_grid_yields_default_candidate() {
        let combos = expand(&ParamGrid::new());
        assert_eq!(combos.len(), 1);
        assert!(combos[0].is_empty());
    }

    #[test]
    fn expand_key_without_values_yields_nothing() {
        let g = grid(&[("a", vec![])]);
        assert!(expand(&g).is_empty());
    }

    #[test]
    fn json_rendering_uses_null_for_none() {
        let mut set = ParamSet::new();
        set.insert("max_depth".into(), ParamValue::None);
        set.insert("C".into(), ParamValue::Float(0.5));
        assert_eq!(to_json(&set), r#"{"C":0.5,"max_depth":null}"#);
    }

    // ── Reader ──────────────────────────────────────────────────────

    #[test]
    fn reader_defaults_and_widening() {
        let mut set = ParamSet::new();
        set.insert("C".into(), ParamValue::Int(10));
        let r = ParamReader::new("Test", &set);
        assert_eq!(r.float("C", 1.0).unwrap(), 10.0);
        assert_eq!(r.float("missing", 2.5).unwrap(), 2.5);
        assert_eq!(r.count("k", 5, 1).unwrap(), 5);
        assert_eq!(r.optional_count("depth").unwrap(), None);
    }

    #[test]
    fn reader_rejects_bad_values() {
        let mut set = ParamSet::new();
        set.insert("C".into(), ParamValue::Float(-1.0));
        set.insert("k".into(), ParamValue::Int(0));
        set.insert("kernel".into(), ParamValue::Text("poly".into()));
        let r = ParamReader::new("Test", &set);
        assert!(r.positive_float("C", 1.0).is_err());
        assert!(r.count("k", 5, 1).is_err());
        assert!(r.choice("kernel", "rbf", &["linear", "rbf"]).is_err());
    }

    #[test]
    fn reader_choice_is_case_insensitive() {
        let mut set = ParamSet::new();
        set.insert("kernel".into(), ParamValue::Text("RBF".into()));
        let r = ParamReader::new("Test", &set);
        assert_eq!(r.choice("kernel", "linear", &["linear", "rbf"]).unwrap(), "rbf");
    }
}
