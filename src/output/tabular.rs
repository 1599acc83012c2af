//! Flat tabular (CSV) encoding of page records
//!
//! Each record is flattened to key/value pairs with [`PageRecord::flat_row`].
//! The header is the union of every key seen across all records, in
//! first-seen order, and a record missing a column gets an empty cell.

use crate::crawler::PageRecord;
use crate::output::OutputResult;
use std::collections::{HashMap, HashSet};
use std::io::Write;

/// Returns the column set for a collection of records
pub fn tabular_columns(records: &[PageRecord]) -> Vec<String> {
    let rows: Vec<_> = records.iter().map(PageRecord::flat_row).collect();
    union_columns(&rows)
}

/// Writes the records as CSV
///
/// Nothing is written for an empty record set, since there are no keys to
/// form a header from.
pub fn write_csv<W: Write>(records: &[PageRecord], writer: W) -> OutputResult<()> {
    if records.is_empty() {
        return Ok(());
    }

    let rows: Vec<_> = records.iter().map(PageRecord::flat_row).collect();
    let columns = union_columns(&rows);

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(&columns)?;

    for row in &rows {
        // Later pairs win, so an ad hoc field named like a base column replaces it
        let cells: HashMap<&str, &str> = row
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();

        csv_writer.write_record(
            columns
                .iter()
                .map(|column| cells.get(column.as_str()).copied().unwrap_or("")),
        )?;
    }

    csv_writer.flush()?;
    Ok(())
}

fn union_columns(rows: &[Vec<(String, String)>]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();

    for row in rows {
        for (key, _) in row {
            if seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }

    columns
}
