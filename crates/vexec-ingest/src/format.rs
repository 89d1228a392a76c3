use serde::Serialize;

/// Upload formats, detected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// .csv
    Csv,
    /// .xlsx, .xls, .xlsm, .ods
    Spreadsheet,
    /// .pdf
    Pdf,
    /// .txt, .md, .json, .tsv
    Text,
    Unsupported,
}

/// Detects the format from the extension of `file_name` (case-insensitive).
///
/// ```
/// use vexec_ingest::{detect_format, FileFormat};
///
/// assert_eq!(detect_format("Q1 Report.XLSX"), FileFormat::Spreadsheet);
/// assert_eq!(detect_format("notes"), FileFormat::Unsupported);
/// ```
pub fn detect_format(file_name: &str) -> FileFormat {
    match extension(file_name).as_str() {
        "csv" => FileFormat::Csv,
        "xlsx" | "xls" | "xlsm" | "ods" => FileFormat::Spreadsheet,
        "pdf" => FileFormat::Pdf,
        "txt" | "md" | "json" | "tsv" => FileFormat::Text,
        _ => FileFormat::Unsupported,
    }
}

pub(crate) fn extension(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}
