//! CSV codec for record collections.
//!
//! Parsing treats the first row as headers, skips blank lines and infers a
//! scalar type for each cell. Export writes the columns of the first record.

use std::collections::HashMap;

use crate::errors::AppError;
use crate::models::{infer_scalar, Record};

/// Result of parsing a CSV document.
#[derive(Debug, Clone, Default)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
    /// Non-fatal row shape problems, one line each.
    pub warnings: Vec<String>,
}

/// Parse CSV bytes into records.
///
/// Invalid UTF-8 sequences decode to U+FFFD, the same as a fetched body.
pub fn parse_csv(input: &[u8]) -> Result<ParsedTable, AppError> {
    let text = String::from_utf8_lossy(input);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = dedupe_headers(reader.headers()?.iter());

    let mut table = ParsedTable {
        headers,
        ..Default::default()
    };

    for (row_index, row) in reader.records().enumerate() {
        let row = row?;

        if row.len() == 1 && row.get(0) == Some("") {
            continue;
        }

        if row.len() > table.headers.len() {
            table.warnings.push(format!(
                "row {}: too many fields (expected {}, found {})",
                row_index + 1,
                table.headers.len(),
                row.len()
            ));
        } else if row.len() < table.headers.len() {
            table.warnings.push(format!(
                "row {}: too few fields (expected {}, found {})",
                row_index + 1,
                table.headers.len(),
                row.len()
            ));
        }

        let mut record = Record::new();
        for (header, raw) in table.headers.iter().zip(row.iter()) {
            record.insert(header.clone(), infer_scalar(raw));
        }

        if !record.is_empty() {
            table.records.push(record);
        }
    }

    for warning in &table.warnings {
        tracing::debug!("CSV {}", warning);
    }

    Ok(table)
}

/// Serialize records to CSV using the first record's columns as the header.
pub fn to_csv<'a, I>(records: I) -> Result<String, AppError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut records = records.into_iter().peekable();
    let Some(first) = records.peek() else {
        return Ok(String::new());
    };
    let columns: Vec<String> = first.columns().map(str::to_string).collect();

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(&columns)?;
    for record in records {
        writer.write_record(columns.iter().map(|c| record.display(c)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV write error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("CSV encoding error: {}", e)))
}

/// Strip a leading BOM and suffix repeated header names with `_1`, `_2`, ...
fn dedupe_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut headers = Vec::new();

    for (i, name) in raw.enumerate() {
        let name = if i == 0 {
            name.trim_start_matches('\u{feff}')
        } else {
            name
        };

        let mut candidate = name.to_string();
        while let Some(count) = seen.get_mut(&candidate) {
            *count += 1;
            candidate = format!("{}_{}", name, count);
        }
        seen.insert(candidate.clone(), 0);
        headers.push(candidate);
    }

    headers
}
