//! Mailbox archive (mbox) reading, field extraction and CSV export.

pub mod clean;
pub mod extract;
pub mod reader;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Label;

pub use clean::clean_text;
pub use extract::extract_body;
pub use reader::{load_mailbox, write_records_csv};

/// Folder-like category derived from `X-Gmail-Labels`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MailCategory {
    Spam,
    Promotions,
    Social,
    Updates,
    Inbox,
}

impl MailCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spam => "Spam",
            Self::Promotions => "Promotions",
            Self::Social => "Social",
            Self::Updates => "Updates",
            Self::Inbox => "Inbox",
        }
    }
}

impl fmt::Display for MailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "Sent",
            Self::Received => "Received",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message from a mailbox, cleaned for tabular export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailRecord {
    pub time: String,
    pub recipients: String,
    pub subject: String,
    pub body: String,
    pub category: MailCategory,
    pub direction: Direction,
    /// Filled in by the prediction pipeline.
    pub prediction: Option<Label>,
}
