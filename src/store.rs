use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::parser::level::Level;

pub const DEFAULT_CSV_PATH: &str = "data/engvid_completo.csv";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const LESSON_COLUMNS: [&str; 4] = ["ID", "Titulo", "Detalles", "URL"];
pub const PROCESSED_COLUMNS: [&str; 5] = ["ID", "Titulo", "Detalles", "URL", "Nivel"];

/// One scraped lesson, as written to and read from the CSV sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonRow {
    #[serde(rename = "ID")]
    pub id: usize,
    #[serde(rename = "Titulo")]
    pub title: String,
    #[serde(rename = "Detalles")]
    pub details: String,
    #[serde(rename = "URL")]
    pub url: String,
}

/// A lesson after the level has been split out of its details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedRow {
    #[serde(rename = "ID")]
    pub id: usize,
    #[serde(rename = "Titulo")]
    pub title: String,
    #[serde(rename = "Detalles")]
    pub details: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Nivel")]
    pub level: Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

/// Write scraped lessons to `path`, BOM-prefixed so spreadsheets pick up UTF-8.
///
/// An empty batch writes nothing, leaving any earlier file untouched.
/// Returns the number of rows written.
pub fn write_lessons(path: &Path, rows: &[LessonRow]) -> Result<usize> {
    if rows.is_empty() {
        warn!("No lessons to save; leaving {} untouched", path.display());
        return Ok(0);
    }
    info!("Saving {} lessons to {}", rows.len(), path.display());
    write_csv(path, &LESSON_COLUMNS, rows)?;
    Ok(rows.len())
}

/// Persist the processed table. Always writes, even if only the header.
pub fn write_processed(path: &Path, rows: &[ProcessedRow]) -> Result<usize> {
    info!("Saving {} processed rows to {}", rows.len(), path.display());
    write_csv(path, &PROCESSED_COLUMNS, rows)?;
    Ok(rows.len())
}

/// Write into a temp file next to `path`, then rename it over `path`, so a
/// failed write never leaves a truncated file behind.
fn write_csv<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(UTF8_BOM)?;

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::CRLF)
        .from_writer(tmp);
    wtr.write_record(header)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    let tmp = wtr
        .into_inner()
        .map_err(|e| e.into_error())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    tmp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Load lessons written by [`write_lessons`].
///
/// UTF-8 is tried first; bytes that are not valid UTF-8 are re-read as Latin-1.
pub fn read_lessons(path: &Path) -> Result<Vec<LessonRow>> {
    info!("Loading CSV from {}", path.display());
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let (text, encoding) = decode(&bytes);
    if encoding == TextEncoding::Latin1 {
        warn!("{} is not valid UTF-8, decoded as Latin-1", path.display());
    }

    if text.trim().is_empty() {
        warn!("{} is empty", path.display());
        return Ok(Vec::new());
    }

    parse_lessons(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Strip a leading BOM and decode, falling back to Latin-1.
pub fn decode(bytes: &[u8]) -> (String, TextEncoding) {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(text) => (text.to_string(), TextEncoding::Utf8),
        // Latin-1 maps each byte to the code point of the same value.
        Err(_) => (body.iter().copied().map(char::from).collect(), TextEncoding::Latin1),
    }
}

pub fn parse_lessons(text: &str) -> std::result::Result<Vec<LessonRow>, StoreError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = rdr.headers()?.clone();
    for column in LESSON_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(StoreError::MissingColumn(column));
        }
    }

    let mut rows = Vec::new();
    for record in rdr.deserialize::<LessonRow>() {
        rows.push(record?);
    }
    Ok(rows)
}
