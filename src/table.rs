//! Tab-separated parsing with header normalization.

use std::io::Cursor;

use csv_async::{AsyncReaderBuilder, StringRecord};

use crate::{IngestError, IngestResult};

/// One data row, padded/truncated to the header width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRow {
    /// 1-based file line; the header is line 1.
    pub line: u64,
    pub cells: Vec<String>,
}

/// Normalized header plus all data rows of one upload.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<DataRow>,
}

/// Split decoded text into a normalized header and data rows.
///
/// Quoting is disabled: the wire format is plain tab-split text and
/// quote interpretation would corrupt name cells. Rows with the wrong
/// column count are padded or truncated to the header width so column
/// positions and row numbering stay stable. Exceeding `max_rows` is a
/// structural error.
pub async fn parse_table(text: &str, code_column: &str, max_rows: usize) -> IngestResult<ParsedTable> {
    let mut rdr = AsyncReaderBuilder::new()
        .has_headers(true)
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        // larger internal buffer reduces allocator churn on big uploads
        .buffer_capacity(1 << 20)
        .create_reader(Cursor::new(text.as_bytes().to_vec()));

    let mut headers: Vec<String> = rdr.headers().await?.iter().map(normalize_header).collect();

    // Some exporters omit the identifier column label; the identifier
    // is by convention the first column, so rename it.
    if !headers.iter().any(|h| h.eq_ignore_ascii_case(code_column)) {
        if let Some(first) = headers.first_mut() {
            *first = code_column.to_string();
        }
    }

    let width = headers.len();
    let mut rows: Vec<DataRow> = Vec::new();
    let mut record = StringRecord::new();
    while rdr.read_record(&mut record).await? {
        if rows.len() >= max_rows {
            return Err(IngestError::TooManyRows { limit: max_rows });
        }
        let mut cells: Vec<String> = record.iter().map(str::to_string).collect();
        cells.resize(width, String::new());
        rows.push(DataRow {
            line: rows.len() as u64 + 2,
            cells,
        });
    }

    Ok(ParsedTable { headers, rows })
}

fn normalize_header(cell: &str) -> String {
    cell.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
        .to_string()
}
