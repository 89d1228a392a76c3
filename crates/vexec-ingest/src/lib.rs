//! Text and table extraction for uploaded business files.
//!
//! [`parse_file`] dispatches on the file extension: CSV goes through the
//! `csv` reader, spreadsheets through `calamine`, PDFs through `pdf-extract`
//! and plain text is decoded as lossy UTF-8. Every result carries a preview
//! of the first rows (for tabular input) and the extracted text, capped at
//! [`MAX_EXTRACTED_CHARS`] characters.

mod format;
mod parser;

pub use format::{detect_format, FileFormat};
pub use parser::{parse_file, truncate_chars, ParseError, ParsedFile};

/// Upper bound on `ParsedFile::extracted_text`, in characters.
pub const MAX_EXTRACTED_CHARS: usize = 50_000;

/// Number of data rows included in `ParsedFile::preview`.
pub const PREVIEW_ROWS: usize = 5;
