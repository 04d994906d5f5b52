//! CSV tables in and out, with encoding and delimiter auto-detection.
//!
//! Platform exports are UTF-8 with a BOM and carry extra metadata rows under
//! the header; hand-edited CSVs may be Latin-1 or semicolon separated. Both
//! load into a [`Table`].

use csv::{ReaderBuilder, WriterBuilder};
use std::fs;
use std::path::Path;

use crate::error::{TableError, TableResult};
use crate::models::Table;

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub table: Table,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    if bytes.starts_with(UTF8_BOM) || std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decode bytes to string using the specified encoding, dropping a UTF-8 BOM.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in the first line.
/// Ties go to the comma.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text into a table, skipping `skip_rows` rows after the header.
pub fn parse_table(content: &str, delimiter: char, skip_rows: usize) -> TableResult<Table> {
    if content.trim().is_empty() {
        return Err(TableError::EmptyFile);
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(TableError::NoHeaders);
    }

    let mut table = Table::new(headers);
    for record in reader.records().skip(skip_rows) {
        let record = record?;
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        table.push_row(record.iter().map(str::to_string).collect());
    }

    Ok(table)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8], skip_rows: usize) -> TableResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let table = parse_table(&content, delimiter, skip_rows)?;

    Ok(ParseResult {
        table,
        encoding,
        delimiter,
    })
}

/// Parse a CSV file with auto-detection.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P, skip_rows: usize) -> TableResult<ParseResult> {
    let bytes = fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes, skip_rows)
}

/// Read a table written by [`write_table`] (or any plain CSV).
pub fn read_table<P: AsRef<Path>>(path: P) -> TableResult<Table> {
    Ok(parse_csv_file_auto(path, 0)?.table)
}

/// Write `table` as UTF-8 CSV, creating parent directories and replacing any
/// existing file.
pub fn write_table<P: AsRef<Path>>(table: &Table, path: P) -> TableResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
