//! Mailbox loading and record export.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use mail_parser::mailbox::mbox::MessageIterator;
use mail_parser::MessageParser;
use tracing::{info, warn};

use crate::error::MailboxError;
use crate::mailbox::extract::to_record;
use crate::mailbox::MailRecord;

fn io_error(path: &Path, source: std::io::Error) -> MailboxError {
    MailboxError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Parse every message in an mbox archive into a [`MailRecord`].
///
/// Messages that fail to parse are skipped with a warning.
pub fn load_mailbox(path: &Path) -> Result<Vec<MailRecord>, MailboxError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let parser = MessageParser::default();

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (index, entry) in MessageIterator::new(BufReader::new(file)).enumerate() {
        let entry = entry.map_err(|e| io_error(path, e))?;
        match parser.parse(entry.contents()) {
            Some(message) => records.push(to_record(&message)),
            None => {
                skipped += 1;
                warn!(index, path = %path.display(), "Skipping unparseable message");
            }
        }
    }

    info!(
        path = %path.display(),
        messages = records.len(),
        skipped,
        "Loaded mailbox"
    );
    Ok(records)
}

/// Write records as CSV. The `Prediction` column is included when
/// `with_prediction` is set; missing predictions are left empty.
pub fn write_records_csv(
    records: &[MailRecord],
    path: &Path,
    with_prediction: bool,
) -> Result<(), MailboxError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    let mut header = vec!["Time", "Recipients", "Subject", "Body", "Category", "Direction"];
    if with_prediction {
        header.push("Prediction");
    }
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.time.as_str(),
            record.recipients.as_str(),
            record.subject.as_str(),
            record.body.as_str(),
            record.category.as_str(),
            record.direction.as_str(),
        ];
        if with_prediction {
            row.push(record.prediction.map(|l| l.as_str()).unwrap_or_default());
        }
        writer.write_record(&row)?;
    }
    writer.flush().map_err(|e| io_error(path, e))?;

    info!(path = %path.display(), rows = records.len(), "Wrote mailbox CSV");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::{Direction, MailCategory};
    use crate::models::Label;

    const MBOX: &str = concat!(
        "From 1@xxx Mon Jan 06 10:00:00 +0000 2025\n",
        "From: promo@shop.example\n",
        "To: me@example.com\n",
        "Subject: Win a prize\n",
        "X-Gmail-Labels: Category_Promotions,Unread\n",
        "\n",
        "Claim your free prize now\n",
        "\n",
        "From 2@xxx Mon Jan 06 11:00:00 +0000 2025\n",
        "From: me@example.com\n",
        "To: friend@example.com\n",
        "Subject: Lunch\n",
        "X-Gmail-Labels: Sent\n",
        "\n",
        "See you at noon\n",
    );

    #[test]
    fn loads_every_message() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mail.mbox");
        std::fs::write(&path, MBOX).unwrap();

        let records = load_mailbox(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].subject, "Win a prize");
        assert_eq!(records[0].category, MailCategory::Promotions);
        assert_eq!(records[0].body, "Claim your free prize now");
        assert_eq!(records[1].direction, Direction::Sent);
        assert_eq!(records[1].recipients, "friend@example.com, me@example.com");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_mailbox(Path::new("/definitely/not/here.mbox")).unwrap_err();
        assert!(matches!(err, MailboxError::Io { .. }));
    }

    #[test]
    fn empty_file_has_no_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.mbox");
        std::fs::write(&path, "").unwrap();
        assert!(load_mailbox(&path).unwrap().is_empty());
    }

    // ── CSV ─────────────────────────────────────────────────────────

    #[test]
    fn csv_round_trip_with_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let mbox = dir.path().join("mail.mbox");
        std::fs::write(&mbox, MBOX).unwrap();
        let mut records = load_mailbox(&mbox).unwrap();
        records[0].prediction = Some(Label::Spam);

        let out = dir.path().join("nested/out.csv");
        write_records_csv(&records, &out, true).unwrap();

        let mut reader = csv::Reader::from_path(&out).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(
            headers,
            ["Time", "Recipients", "Subject", "Body", "Category", "Direction", "Prediction"]
        );
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][6], "Spam");
        assert_eq!(&rows[1][6], "");
        assert_eq!(&rows[1][5], "Sent");
    }

    #[test]
    fn csv_without_prediction_column() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.csv");
        write_records_csv(&[], &out, false).unwrap();
        let mut reader = csv::Reader::from_path(&out).unwrap();
        assert_eq!(reader.headers().unwrap().len(), 6);
    }
}
