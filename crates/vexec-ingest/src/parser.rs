use std::io::Cursor;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::format::{detect_format, extension, FileFormat};
use crate::{MAX_EXTRACTED_CHARS, PREVIEW_ROWS};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Unsupported file type: .{0}")]
    Unsupported(String),

    #[error("File is empty")]
    Empty,

    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("Could not read PDF: {0}")]
    Pdf(String),
}

/// Extraction result for one uploaded file.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFile {
    pub file_name: String,
    pub format: FileFormat,
    pub size_bytes: usize,
    /// Header row of tabular input (first sheet for spreadsheets)
    pub columns: Vec<String>,
    /// Data rows, header excluded
    pub row_count: usize,
    /// First data rows keyed by column name
    #[schema(value_type = Vec<Object>)]
    pub preview: Vec<Value>,
    /// Sheet names, spreadsheets only
    pub sheets: Vec<String>,
    pub extracted_text: String,
    /// Whether `extracted_text` was cut at the character cap
    pub truncated: bool,
}

/// Cuts `text` to at most `max_chars` characters.
///
/// ```
/// use vexec_ingest::truncate_chars;
///
/// assert_eq!(truncate_chars("héllo", 2), ("hé".to_string(), true));
/// assert_eq!(truncate_chars("hi", 5), ("hi".to_string(), false));
/// ```
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (text[..byte_idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

/// Parses an uploaded file. CPU-bound; async callers should run it on a
/// blocking thread.
pub fn parse_file(file_name: &str, bytes: &[u8]) -> Result<ParsedFile, ParseError> {
    let format = detect_format(file_name);
    let table = match format {
        FileFormat::Unsupported => return Err(ParseError::Unsupported(extension(file_name))),
        _ if bytes.is_empty() => return Err(ParseError::Empty),
        FileFormat::Csv => parse_csv(bytes)?,
        FileFormat::Spreadsheet => parse_spreadsheet(bytes)?,
        FileFormat::Pdf => Extracted::text_only(extract_pdf(bytes)?),
        FileFormat::Text => Extracted::text_only(String::from_utf8_lossy(bytes).into_owned()),
    };

    let (extracted_text, truncated) = truncate_chars(&table.text, MAX_EXTRACTED_CHARS);
    tracing::debug!(
        file_name,
        format = ?format,
        size_bytes = bytes.len(),
        rows = table.row_count,
        truncated,
        "Parsed uploaded file"
    );

    Ok(ParsedFile {
        file_name: file_name.to_string(),
        format,
        size_bytes: bytes.len(),
        columns: table.columns,
        row_count: table.row_count,
        preview: table.preview,
        sheets: table.sheets,
        extracted_text,
        truncated,
    })
}

#[derive(Default)]
struct Extracted {
    columns: Vec<String>,
    row_count: usize,
    preview: Vec<Value>,
    sheets: Vec<String>,
    text: String,
}

impl Extracted {
    fn text_only(text: String) -> Self {
        Self {
            text,
            ..Default::default()
        }
    }
}

/// Numbers and booleans keep their type in the preview; everything else is
/// a string.
fn typed_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Some(n) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

fn column_key(columns: &[String], idx: usize) -> String {
    match columns.get(idx) {
        Some(name) if !name.trim().is_empty() => name.clone(),
        _ => format!("column_{}", idx + 1),
    }
}

fn row_object(columns: &[String], cells: impl Iterator<Item = Value>) -> Value {
    let mut obj = Map::new();
    for (idx, value) in cells.enumerate() {
        obj.insert(column_key(columns, idx), value);
    }
    Value::Object(obj)
}

fn parse_csv(bytes: &[u8]) -> Result<Extracted, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut row_count = 0;
    let mut preview = Vec::with_capacity(PREVIEW_ROWS);
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if preview.len() < PREVIEW_ROWS {
            preview.push(row_object(&columns, record.iter().map(typed_value)));
        }
        row_count += 1;
    }

    Ok(Extracted {
        columns,
        row_count,
        preview,
        sheets: Vec::new(),
        text: String::from_utf8_lossy(bytes).into_owned(),
    })
}

fn cell_to_string(cell: &calamine::Data) -> String {
    use calamine::Data;
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => format!("{}", f),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR({:?})", e),
        Data::DateTime(dt) => format!("{}", dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

fn cell_to_json(cell: &calamine::Data) -> Value {
    use calamine::Data;
    match cell {
        Data::Empty => Value::Null,
        Data::Int(n) => Value::Number((*n).into()),
        Data::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        Data::Bool(b) => Value::Bool(*b),
        other => Value::String(cell_to_string(other)),
    }
}

fn parse_spreadsheet(bytes: &[u8]) -> Result<Extracted, ParseError> {
    use calamine::{open_workbook_auto_from_rs, Reader};

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;
    let sheets = workbook.sheet_names().to_vec();

    let mut extracted = Extracted {
        sheets: sheets.clone(),
        ..Default::default()
    };

    for (sheet_idx, sheet_name) in sheets.iter().enumerate() {
        let range = match workbook.worksheet_range(sheet_name) {
            Ok(range) => range,
            Err(e) => {
                tracing::warn!(sheet = %sheet_name, error = %e, "Skipping unreadable sheet");
                continue;
            }
        };

        if !extracted.text.is_empty() {
            extracted.text.push_str("\n\n");
        }
        extracted.text.push_str(&format!("## {}\n\n", sheet_name));

        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            continue;
        };
        let header_cells: Vec<String> = header.iter().map(cell_to_string).collect();
        extracted.text.push_str(&header_cells.join("\t"));
        extracted.text.push('\n');

        let first_sheet = sheet_idx == 0;
        if first_sheet {
            extracted.columns = header_cells.clone();
        }

        for row in rows {
            if row.iter().all(|c| matches!(c, calamine::Data::Empty)) {
                continue;
            }
            let cells: Vec<String> = row.iter().map(cell_to_string).collect();
            extracted.text.push_str(&cells.join("\t"));
            extracted.text.push('\n');

            if first_sheet {
                if extracted.preview.len() < PREVIEW_ROWS {
                    extracted
                        .preview
                        .push(row_object(&header_cells, row.iter().map(cell_to_json)));
                }
                extracted.row_count += 1;
            }
        }
    }

    Ok(extracted)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ParseError> {
    // pdf-extract can panic on malformed PDFs
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes));

    match result {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ParseError::Pdf(e.to_string())),
        Err(_) => Err(ParseError::Pdf("malformed file".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn csv_columns_rows_and_preview() {
        let csv = "Month, Revenue ,Cost,Note\n\
                   2025-01,1200,800.5,ok\n\
                   2025-02,1300,820,\n\
                   ,,,\n\
                   2025-03,1250,790,late,extra\n\
                   2025-04,1400,850,ok\n\
                   2025-05,1500,900,ok\n\
                   2025-06,1550,910,ok\n";
        let parsed = parse_file("pnl.csv", csv.as_bytes()).unwrap();

        assert_eq!(parsed.format, FileFormat::Csv);
        assert_eq!(parsed.columns, vec!["Month", "Revenue", "Cost", "Note"]);
        assert_eq!(parsed.row_count, 6);
        assert_eq!(parsed.preview.len(), PREVIEW_ROWS);
        assert_eq!(
            parsed.preview[0],
            json!({"Month": "2025-01", "Revenue": 1200, "Cost": 800.5, "Note": "ok"})
        );
        assert_eq!(parsed.preview[1]["Note"], Value::Null);
        assert_eq!(parsed.preview[2]["column_5"], "extra");
        assert!(!parsed.truncated);
        assert_eq!(parsed.extracted_text, csv);
    }

    #[test]
    fn extracted_text_is_capped() {
        let big = "a".repeat(MAX_EXTRACTED_CHARS + 1234);
        let parsed = parse_file("notes.txt", big.as_bytes()).unwrap();
        assert!(parsed.truncated);
        assert_eq!(parsed.extracted_text.chars().count(), MAX_EXTRACTED_CHARS);
        assert_eq!(parsed.size_bytes, big.len());

        let mut csv = String::from("id,comment\n");
        for i in 0..5_000 {
            csv.push_str(&format!("{i},some fairly long comment text for row {i}\n"));
        }
        let parsed = parse_file("big.csv", csv.as_bytes()).unwrap();
        assert_eq!(parsed.row_count, 5_000);
        assert!(parsed.truncated);
        assert!(parsed.extracted_text.chars().count() <= MAX_EXTRACTED_CHARS);
    }

    #[test]
    fn text_is_decoded_lossily() {
        let parsed = parse_file("README.MD", b"caf\xc3\xa9 \xff end").unwrap();
        assert_eq!(parsed.format, FileFormat::Text);
        assert!(parsed.extracted_text.starts_with("café "));
        assert!(parsed.extracted_text.ends_with(" end"));
        assert!(parsed.columns.is_empty());
    }

    #[test]
    fn rejects_unsupported_and_empty() {
        let err = parse_file("logo.png", b"\x89PNG").unwrap_err();
        assert!(matches!(err, ParseError::Unsupported(ref ext) if ext == "png"));
        assert_eq!(err.to_string(), "Unsupported file type: .png");

        assert!(matches!(parse_file("a.csv", b""), Err(ParseError::Empty)));
    }

    #[test]
    fn corrupt_binary_formats_are_errors() {
        let err = parse_file("book.xlsx", b"definitely not a zip archive").unwrap_err();
        assert!(matches!(err, ParseError::Spreadsheet(_)));

        let err = parse_file("scan.pdf", b"%PDF-1.4 garbage").unwrap_err();
        assert!(matches!(err, ParseError::Pdf(_)));
    }
}
