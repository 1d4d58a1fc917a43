//! Export Pipeline
//!
//! Serializes a [`RecordSet`] into a downloadable artifact.
//!
//! # Formats
//! - `csv`: header row of column names, one line per record
//! - `xlsx`: single sheet named `Sheet1` with a bold header row (requires the
//!   `xlsx` feature, enabled by default)
//! - `json`: array of objects, pretty-printed with a 4-space indent
//!
//! Neither tabular format carries an index column. Null values render as an
//! empty cell; in JSON they stay `null`.
//!
//! # Artifacts
//! Files are written as `<prefix>_<YYYYMMDDHHMMSS>.<ext>` into a scratch
//! directory that the binary clears at startup.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::error::{LitehouseError, Result};
use crate::query::RecordSet;

/// File name prefix used when the caller does not pick one
pub const DEFAULT_EXPORT_PREFIX: &str = "litehouse_query";

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Json,
}

impl ExportFormat {
    /// File extension, without the dot
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = LitehouseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            "json" => Ok(Self::Json),
            other => Err(LitehouseError::invalid_input(format!(
                "Unsupported file format '{other}'. Expected one of: csv, xlsx, json"
            ))),
        }
    }
}

/// Serialize `records` into the bytes of a `format` artifact
pub fn export(records: &RecordSet, format: ExportFormat) -> Result<Vec<u8>> {
    debug!(%format, rows = records.len(), "exporting records");

    match format {
        ExportFormat::Csv => export_csv(records),
        ExportFormat::Xlsx => export_xlsx(records),
        ExportFormat::Json => export_json(records),
    }
}

fn export_csv(records: &RecordSet) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    if !records.columns().is_empty() {
        writer.write_record(records.columns()).map_err(csv_error)?;
    }

    for row in records.rows() {
        writer.write_record(row.values().map(cell_text)).map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| LitehouseError::export_failed(format!("Failed to flush CSV output: {e}")))
}

fn csv_error(err: csv::Error) -> LitehouseError {
    LitehouseError::export_failed(format!("Failed to write CSV record: {err}"))
}

#[cfg(feature = "xlsx")]
fn export_xlsx(records: &RecordSet) -> Result<Vec<u8>> {
    use rust_xlsxwriter::{Format, Workbook, XlsxError};

    fn xlsx_error(err: XlsxError) -> LitehouseError {
        LitehouseError::export_failed(format!("Failed to write spreadsheet: {err}"))
    }

    let too_large = || LitehouseError::export_failed("Record set exceeds spreadsheet limits");

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Sheet1").map_err(xlsx_error)?;

    for (col, name) in records.columns().iter().enumerate() {
        let col = u16::try_from(col).map_err(|_| too_large())?;
        sheet.write_string_with_format(0, col, name, &header).map_err(xlsx_error)?;
    }

    for (idx, row) in records.rows().iter().enumerate() {
        let row_num = u32::try_from(idx + 1).map_err(|_| too_large())?;

        for (col, value) in row.values().enumerate() {
            let col = u16::try_from(col).map_err(|_| too_large())?;
            match value {
                Value::Null => {}
                Value::Bool(b) => {
                    sheet.write_boolean(row_num, col, *b).map_err(xlsx_error)?;
                }
                Value::Number(n) => match n.as_f64() {
                    Some(number) => {
                        sheet.write_number(row_num, col, number).map_err(xlsx_error)?;
                    }
                    None => {
                        sheet.write_string(row_num, col, n.to_string()).map_err(xlsx_error)?;
                    }
                },
                other => {
                    sheet.write_string(row_num, col, cell_text(other)).map_err(xlsx_error)?;
                }
            }
        }
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}

#[cfg(not(feature = "xlsx"))]
fn export_xlsx(_records: &RecordSet) -> Result<Vec<u8>> {
    Err(LitehouseError::invalid_input(
        "Spreadsheet export is not available in this build (enable the `xlsx` feature)",
    ))
}

fn export_json(records: &RecordSet) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);

    records
        .rows()
        .serialize(&mut serializer)
        .map_err(|e| LitehouseError::export_failed(format!("Failed to write JSON: {e}")))?;

    Ok(buf)
}

/// Text form of a value in a tabular cell
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

/// `<prefix>_<YYYYMMDDHHMMSS>.<ext>`
#[must_use]
pub fn export_file_name(prefix: &str, format: ExportFormat, timestamp: NaiveDateTime) -> String {
    format!("{prefix}_{}.{}", timestamp.format(TIMESTAMP_FORMAT), format.extension())
}

/// Export `records` into `dir`, returning the path of the written file
pub fn write_export(
    dir: &Path,
    prefix: &str,
    records: &RecordSet,
    format: ExportFormat,
) -> Result<PathBuf> {
    let bytes = export(records, format)?;

    fs::create_dir_all(dir).map_err(|e| {
        LitehouseError::export_failed(format!(
            "Failed to create export directory {}: {e}",
            dir.display()
        ))
    })?;

    let path = dir.join(export_file_name(prefix, format, Local::now().naive_local()));
    fs::write(&path, &bytes).map_err(|e| {
        LitehouseError::export_failed(format!("Failed to write {}: {e}", path.display()))
    })?;

    info!(path = %path.display(), bytes = bytes.len(), rows = records.len(), "export written");
    Ok(path)
}

/// Create `dir` if missing, otherwise remove everything inside it
///
/// Entries that cannot be removed are logged and skipped. Returns the number
/// of entries removed.
pub fn reset_scratch_dir(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            LitehouseError::persistence(format!(
                "Failed to create scratch directory {}: {e}",
                dir.display()
            ))
        })?;
        info!(path = %dir.display(), "scratch directory created");
        return Ok(0);
    }

    let entries = fs::read_dir(dir).map_err(|e| {
        LitehouseError::persistence(format!(
            "Failed to read scratch directory {}: {e}",
            dir.display()
        ))
    })?;

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };

        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove scratch file"),
        }
    }

    info!(path = %dir.display(), removed, "scratch directory reset");
    Ok(removed)
}
