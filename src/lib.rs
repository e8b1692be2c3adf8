//! Spam classifier: TF-IDF features, grid-searched classifiers, and
//! prediction over single emails and mbox archives.

pub mod config;
pub mod error;
pub mod features;
pub mod logging;
pub mod mailbox;
pub mod models;
pub mod pipeline;
pub mod state;

pub use config::{Config, ModelConfig};
pub use error::{Error, Result};
pub use models::Label;
pub use pipeline::{PredictionPipeline, TrainingPipeline};
