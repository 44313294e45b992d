//! CSV input reader
//!
//! Wraps the externally-produced catalog CSV into raw records. Column names
//! are taken from the header row verbatim (minus BOM and padding); empty
//! cells are dropped so alias resolution can fall through.

use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::record::RawRecord;

/// Read all rows of a header-addressed CSV file into raw records.
pub fn read_raw_records(path: &Path) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .context("CSV file has no header row")?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut records = Vec::new();
    for (row_index, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("Malformed CSV row {}", row_index + 2))?;
        let mut record = RawRecord::new();
        for (header, value) in headers.iter().zip(row.iter()) {
            record.insert(header.clone(), value);
        }
        if !record.is_empty() {
            records.push(record);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_header_addressed_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Name,Price,Vintage").unwrap();
        writeln!(file, "Caymus Cabernet, 59.99 ,2022").unwrap();
        writeln!(file, "Opus One,299.00,").unwrap();
        file.flush().unwrap();

        let records = read_raw_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("Name"), Some("Caymus Cabernet"));
        assert_eq!(records[0].get("Price"), Some("59.99"));
        assert_eq!(records[1].get("Vintage"), None);
    }

    #[test]
    fn bom_is_stripped_from_the_first_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "\u{feff}Name,Price").unwrap();
        writeln!(file, "Silver Oak,44.99").unwrap();
        file.flush().unwrap();

        let records = read_raw_records(file.path()).unwrap();
        assert_eq!(records[0].get("Name"), Some("Silver Oak"));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Name,Price").unwrap();
        writeln!(file, "Caymus,59.99").unwrap();
        writeln!(file, ",").unwrap();
        file.flush().unwrap();

        let records = read_raw_records(file.path()).unwrap();
        assert_eq!(records.len(), 1);
    }
}
