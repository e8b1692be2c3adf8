//! Text vectorization: sparse vectors and the TF-IDF vectorizer.

pub mod sparse;
pub mod stop_words;
pub mod tfidf;

pub use sparse::{SparseMatrix, SparseVector};
pub use tfidf::TfidfVectorizer;
