//! CSV export of normalized records.

use crate::normalize::Record;
use eyre::Context;
use indexmap::IndexSet;
use std::io::Write;
use std::path::Path;

/// Column names across all `records`, in the order they are first seen.
pub fn header(records: &[Record]) -> Vec<&str> {
    let mut columns = IndexSet::new();
    for record in records {
        columns.extend(record.columns());
    }
    columns.into_iter().collect()
}

/// Writes `records` as CSV: one header row, then one row per record.
///
/// Records that lack a column get an empty cell. Nothing is written for no records.
pub fn write_records<W: Write>(writer: W, records: &[Record]) -> eyre::Result<W> {
    let mut csv = csv::Writer::from_writer(writer);
    let header = header(records);
    if !header.is_empty() {
        csv.write_record(&header).context("write CSV header")?;
    }
    for (row, record) in records.iter().enumerate() {
        csv.write_record(header.iter().map(|column| record.get(column).unwrap_or_default()))
            .with_context(|| format!("write CSV row {row}"))?;
    }
    csv.into_inner()
        .map_err(|e| e.into_error())
        .context("flush CSV output")
}

pub fn to_csv_string(records: &[Record]) -> eyre::Result<String> {
    let bytes = write_records(Vec::new(), records)?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// Writes `records` to a CSV file at `path`, replacing any existing file.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display(), rows = records.len()))]
pub fn write_csv(path: impl AsRef<Path>, records: &[Record]) -> eyre::Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)
        .with_context(|| format!("create {}", path.display()))?;
    write_records(file, records).with_context(|| format!("write {}", path.display()))?;
    tracing::info!("wrote CSV");
    Ok(())
}
