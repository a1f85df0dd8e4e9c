// Table store - append-only CSV persistence
//
// Tables are whole files: a write loads the existing file, appends the new
// rows after the old ones and rewrites the file in full. Nothing is ever
// updated or deleted, and duplicate time indexes are preserved as-is.

use crate::cfg::Config;
use crate::files::table_file;
use crate::record::Record;
use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use log::debug;
use std::fs::File;
use std::path::Path;

/// Time index column; always the first column of every table file.
pub const INDEX_COL: &str = "datetime";

// ============================================================================
// FRAME
// ============================================================================

/// In-memory tabular frame with an accumulating column set.
///
/// Columns keep first-observed order; a row missing a column serializes as an
/// empty cell. Cell values are plain strings, exactly as they appear in the
/// CSV file.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<IndexMap<String, String>>,
}

impl Frame {
    pub fn new() -> Self {
        Frame::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[IndexMap<String, String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Frame from flat records, indexed by `datetime`. Every record must
    /// carry the index field (all pipeline records are context-seeded).
    pub fn from_records(records: &[Record]) -> Result<Frame> {
        let mut frame = Frame::new();
        frame.columns.push(INDEX_COL.to_string());
        for record in records {
            if !record.contains_key(INDEX_COL) {
                bail!("record is missing the {} index field: {}", INDEX_COL, record);
            }
            let mut row = IndexMap::new();
            for (name, value) in record.iter() {
                if !frame.columns.iter().any(|c| c == name) {
                    frame.columns.push(name.clone());
                }
                row.insert(name.clone(), value.to_csv_field());
            }
            frame.rows.push(row);
        }
        Ok(frame)
    }

    /// Append all rows of `other` after the rows of `self`, accumulating any
    /// new columns at the end of the column list.
    pub fn append(&mut self, other: Frame) {
        for column in other.columns {
            if !self.columns.iter().any(|c| *c == column) {
                self.columns.push(column);
            }
        }
        self.rows.extend(other.rows);
    }

    /// Cell lookup; empty cells read as `None`.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Read a frame from a CSV file written by `write_csv`.
    pub fn read_csv(path: &Path) -> Result<Frame> {
        let file = File::open(path)
            .with_context(|| format!("opening table file {}", path.display()))?;
        let mut reader = csv::Reader::from_reader(file);
        let columns: Vec<String> = reader
            .headers()
            .with_context(|| format!("reading header of {}", path.display()))?
            .iter()
            .map(|h| h.to_string())
            .collect();
        let mut rows = Vec::new();
        for result in reader.records() {
            let csv_row =
                result.with_context(|| format!("reading row of {}", path.display()))?;
            let mut row = IndexMap::new();
            for (column, cell) in columns.iter().zip(csv_row.iter()) {
                if !cell.is_empty() {
                    row.insert(column.clone(), cell.to_string());
                }
            }
            rows.push(row);
        }
        Ok(Frame { columns, rows })
    }

    /// Rewrite the whole frame to a CSV file (header + rows).
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("creating table file {}", path.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(&self.columns)
            .context("writing table header")?;
        for row in &self.rows {
            let cells: Vec<&str> = self
                .columns
                .iter()
                .map(|column| row.get(column).map(|s| s.as_str()).unwrap_or(""))
                .collect();
            writer.write_record(&cells).context("writing table row")?;
        }
        writer.flush().context("flushing table file")?;
        Ok(())
    }
}

// ============================================================================
// TABLE WRITES AND READS
// ============================================================================

/// Append records to the named table, creating the file on first write.
///
/// Re-running aggregation for a time point already recorded duplicates rows
/// rather than replacing them.
// TODO: replace rows for a given account instead of appending blindly
pub fn write_records(records: &[Record], table: &str, cfg: &Config) -> Result<()> {
    let path = table_file(table, cfg)?;
    let new_frame = Frame::from_records(records)?;
    let mut file_frame = if path.exists() {
        Frame::read_csv(&path)?
    } else {
        Frame::new()
    };
    file_frame.append(new_frame);
    file_frame.write_csv(&path)?;
    debug!(
        "wrote {} record(s) to table {} ({} row(s) total)",
        records.len(),
        table,
        file_frame.len()
    );
    Ok(())
}

/// Load the named table; a table never written yet reads as empty.
pub fn read_table(table: &str, cfg: &Config) -> Result<Frame> {
    let path = table_file(table, cfg)?;
    if !path.exists() {
        return Ok(Frame::new());
    }
    Frame::read_csv(&path)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AccountContext, Scalar};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn test_record(minute: u32, extra: &[(&str, Scalar)]) -> Record {
        let dt = Utc.with_ymd_and_hms(2020, 5, 22, 18, minute, 0).unwrap();
        let mut record = AccountContext::at(dt, "vanguard", "jane").to_record();
        for (name, value) in extra {
            record.insert(*name, value.clone());
        }
        record
    }

    #[test]
    fn test_fresh_table_write_and_read() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::with_db_dir(dir.path());
        let records = vec![
            test_record(0, &[("mktval", Scalar::Number(100.0))]),
            test_record(1, &[("mktval", Scalar::Number(250.5))]),
        ];
        write_records(&records, "positions", &cfg).unwrap();

        let frame = read_table("positions", &cfg).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.columns()[0], INDEX_COL);
        assert_eq!(frame.get(0, "mktval"), Some("100"));
        assert_eq!(frame.get(1, "mktval"), Some("250.5"));
    }

    #[test]
    fn test_append_only_growth_preserves_duplicates() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::with_db_dir(dir.path());
        let batch: Vec<Record> = (0..3)
            .map(|i| test_record(i, &[("units", Scalar::Number(10.0))]))
            .collect();
        write_records(&batch, "transactions", &cfg).unwrap();
        // Same records again, overlapping time index
        write_records(&batch[..2], "transactions", &cfg).unwrap();

        let frame = read_table("transactions", &cfg).unwrap();
        // N + M rows, duplicates preserved, never merged
        assert_eq!(frame.len(), 5);
        assert_eq!(frame.get(0, INDEX_COL), frame.get(3, INDEX_COL));
    }

    #[test]
    fn test_columns_accumulate_across_writes() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::with_db_dir(dir.path());
        write_records(
            &[test_record(0, &[("mktval", Scalar::Number(1.0))])],
            "positions",
            &cfg,
        )
        .unwrap();
        write_records(
            &[test_record(1, &[("units", Scalar::Number(2.0))])],
            "positions",
            &cfg,
        )
        .unwrap();

        let frame = read_table("positions", &cfg).unwrap();
        assert!(frame.columns().iter().any(|c| c == "mktval"));
        assert!(frame.columns().iter().any(|c| c == "units"));
        // Old row has no units cell, new row has no mktval cell
        assert_eq!(frame.get(0, "units"), None);
        assert_eq!(frame.get(1, "mktval"), None);
        assert_eq!(frame.get(1, "units"), Some("2"));
    }

    #[test]
    fn test_record_without_index_field_rejected() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::with_db_dir(dir.path());
        let mut record = Record::new();
        record.insert("mktval", Scalar::Number(1.0));
        let err = write_records(&[record], "positions", &cfg).unwrap_err();
        assert!(err.to_string().contains(INDEX_COL));
    }

    #[test]
    fn test_unknown_table_rejected() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::with_db_dir(dir.path());
        let err = write_records(&[test_record(0, &[])], "quotes", &cfg).unwrap_err();
        assert!(err.to_string().contains("quotes"));
    }

    #[test]
    fn test_read_missing_table_is_empty() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::with_db_dir(dir.path());
        let frame = read_table("balances", &cfg).unwrap();
        assert!(frame.is_empty());
    }
}
