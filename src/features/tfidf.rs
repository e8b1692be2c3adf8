//! TF-IDF vectorizer.
//!
//! Lowercases, tokenizes on `\b\w\w+\b`, drops English stop words, then
//! weights raw term counts by smoothed IDF and L2-normalizes each row.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::features::sparse::{SparseMatrix, SparseVector};
use crate::features::stop_words;

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("static token regex"))
}

/// Split a document into lowercase, non-stop-word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let stop = stop_words::english();
    token_regex()
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| !stop.contains(t))
        .map(str::to_string)
        .collect()
}

/// A fitted TF-IDF vectorizer: vocabulary plus per-term IDF weights.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Term → column index (columns follow lexicographic term order).
    vocabulary: BTreeMap<String, u32>,
    /// IDF weight per column.
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Learn vocabulary and IDF weights from `documents`.
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let tokenized: Vec<Vec<String>> =
            documents.iter().map(|d| tokenize(d.as_ref())).collect();

        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for tokens in &tokenized {
            let unique: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                *document_frequency.entry(term).or_default() += 1;
            }
        }

        let n = documents.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (column, (term, df)) in document_frequency.into_iter().enumerate() {
            vocabulary.insert(term.to_string(), column as u32);
            idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
        }

        Self { vocabulary, idf }
    }

    /// Fit on `documents` and return their TF-IDF matrix.
    pub fn fit_transform<S: AsRef<str>>(documents: &[S]) -> (Self, SparseMatrix) {
        let vectorizer = Self::fit(documents);
        let matrix = vectorizer.transform(documents);
        (vectorizer, matrix)
    }

    /// Vectorize documents with the fitted vocabulary. Unknown terms are ignored.
    pub fn transform<S: AsRef<str>>(&self, documents: &[S]) -> SparseMatrix {
        let rows = documents
            .iter()
            .map(|d| self.transform_one(d.as_ref()))
            .collect();
        SparseMatrix::new(rows, self.n_features())
    }

    /// Vectorize a single document.
    pub fn transform_one(&self, document: &str) -> SparseVector {
        let mut counts: HashMap<u32, f64> = HashMap::new();
        for token in tokenize(document) {
            if let Some(&column) = self.vocabulary.get(&token) {
                *counts.entry(column).or_default() += 1.0;
            }
        }
        let pairs = counts
            .into_iter()
            .map(|(column, tf)| (column, tf * self.idf[column as usize]))
            .collect();
        let mut row = SparseVector::from_pairs(pairs);
        row.l2_normalize();
        row
    }

    /// Number of vocabulary columns.
    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    /// Column index of `term`, if it is in the vocabulary.
    pub fn column(&self, term: &str) -> Option<u32> {
        self.vocabulary.get(term).copied()
    }

    /// IDF weight of `term`, if it is in the vocabulary.
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.column(term).map(|c| self.idf[c as usize])
    }
}
