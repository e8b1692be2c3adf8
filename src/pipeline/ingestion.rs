//! Labeled dataset loading.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{DatasetError, Error};
use crate::state::{Dataset, LabeledMessage, TrainingState};

const CATEGORY: &str = "Category";
const MESSAGE: &str = "Message";

pub struct DataIngestion {
    path: PathBuf,
}

impl DataIngestion {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the dataset into `state.dataset`.
    pub fn load_data(&self, state: &mut TrainingState) -> Result<(), Error> {
        info!(path = %self.path.display(), "Loading data");
        let dataset = read_dataset(&self.path)?;
        info!(
            rows = dataset.len(),
            columns = ?dataset.columns,
            "Data loaded successfully"
        );
        state.training_data_path = Some(self.path.clone());
        state.dataset = Some(dataset);
        Ok(())
    }
}

/// Parse a CSV with `Category` and `Message` columns (any order, extra
/// columns ignored).
pub fn read_dataset(path: &Path) -> Result<Dataset, DatasetError> {
    let read_err = |source| DatasetError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(read_err)?;
    let columns: Vec<String> = reader
        .headers()
        .map_err(read_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let position = |name: &str| {
        columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
    };
    let category_at = position(CATEGORY)?;
    let message_at = position(MESSAGE)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(read_err)?;
        records.push(LabeledMessage {
            category: row.get(category_at).unwrap_or_default().to_string(),
            message: row.get(message_at).unwrap_or_default().to_string(),
        });
    }

    if records.is_empty() {
        return Err(DatasetError::Empty);
    }
    Ok(Dataset { columns, records })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn reads_columns_in_any_order() {
        let (_dir, path) = write(
            "Message,Extra,Category\n\"Free entry, win now\",x,spam\nSee you at lunch,y,ham\n",
        );
        let dataset = read_dataset(&path).unwrap();
        assert_eq!(dataset.columns, ["Message", "Extra", "Category"]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.records[0].category, "spam");
        assert_eq!(dataset.records[0].message, "Free entry, win now");
    }

    #[test]
    fn missing_column_is_reported() {
        let (_dir, path) = write("Label,Message\nspam,hi\n");
        assert!(matches!(
            read_dataset(&path),
            Err(DatasetError::MissingColumn(c)) if c == "Category"
        ));
    }

    #[test]
    fn header_only_is_empty() {
        let (_dir, path) = write("Category,Message\n");
        assert!(matches!(read_dataset(&path), Err(DatasetError::Empty)));
    }

    #[test]
    fn missing_file_is_read_error() {
        assert!(matches!(
            read_dataset(Path::new("/nope/dataset.csv")),
            Err(DatasetError::Read { .. })
        ));
    }

    #[test]
    fn load_data_fills_state() {
        let (_dir, path) = write("Category,Message\nham,hello there\n");
        let mut state = TrainingState::default();
        DataIngestion::new(&path).load_data(&mut state).unwrap();
        assert_eq!(state.dataset("test").unwrap().len(), 1);
        assert_eq!(state.training_data_path.as_deref(), Some(path.as_path()));
    }
}
