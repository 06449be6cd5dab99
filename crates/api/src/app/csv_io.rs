//! CSV export/import mechanics shared by the module routes.
//!
//! Exports are comma-delimited with every field quoted, `\n` line endings
//! and a UTF-8 BOM so spreadsheets pick the right encoding. Imports are
//! row-level: malformed rows are collected as "Fila N: ..." errors while
//! valid rows proceed.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::json;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Maximum row errors echoed back to the user; the rest collapse into a
/// "... y N errores más" suffix.
const MAX_REPORTED_ERRORS: usize = 10;

/// Build a downloadable CSV response (quoted fields, BOM, timestamped
/// filename).
pub fn csv_response(filename_prefix: &str, headers: &[&str], rows: Vec<Vec<String>>) -> Response {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    if writer.write_record(headers).is_err() {
        return super::errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "CSV serialization failed",
        );
    }
    for row in rows {
        if writer.write_record(&row).is_err() {
            return super::errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "CSV serialization failed",
            );
        }
    }

    let body = match writer.into_inner() {
        Ok(bytes) => bytes,
        Err(_) => {
            return super::errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "CSV serialization failed",
            );
        }
    };

    let mut payload = Vec::with_capacity(UTF8_BOM.len() + body.len());
    payload.extend_from_slice(UTF8_BOM);
    payload.extend_from_slice(&body);

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let filename = format!("{filename_prefix}_{timestamp}.csv");

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        payload,
    )
        .into_response()
}

/// Parse an uploaded CSV body into data rows (header row skipped).
///
/// Tolerates a leading BOM and ragged row lengths; validation happens
/// per-row in the importers.
pub fn parse_rows(body: &str) -> Result<Vec<Vec<String>>, Response> {
    let body = body.strip_prefix('\u{feff}').unwrap_or(body);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(rec) => rows.push(rec.iter().map(|f| f.trim().to_string()).collect()),
            Err(e) => {
                return Err(super::errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_csv",
                    format!("could not parse CSV: {e}"),
                ));
            }
        }
    }
    Ok(rows)
}

/// Status column codec: `Activo`/`Inactivo` on export, `1`/`0` on import.
/// Import also accepts the export labels so an exported file re-imports
/// without flipping anything; an empty cell defaults to active.
pub fn status_label(active: bool) -> &'static str {
    if active { "Activo" } else { "Inactivo" }
}

pub fn parse_status(cell: &str) -> bool {
    matches!(cell, "" | "1" | "Activo")
}

/// Outcome of a bulk import.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<String>,
}

impl ImportReport {
    pub fn row_error(&mut self, row: usize, message: impl Into<String>) {
        self.errors.push(format!("Fila {row}: {}", message.into()));
    }

    pub fn into_response(self) -> Response {
        let mut reported: Vec<String> =
            self.errors.iter().take(MAX_REPORTED_ERRORS).cloned().collect();
        if self.errors.len() > MAX_REPORTED_ERRORS {
            reported.push(format!(
                "... y {} errores más",
                self.errors.len() - MAX_REPORTED_ERRORS
            ));
        }

        (
            StatusCode::OK,
            axum::Json(json!({
                "created": self.created,
                "updated": self.updated,
                "error_count": self.errors.len(),
                "errors": reported,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rows_skips_the_header_and_tolerates_a_bom() {
        let body = "\u{feff}\"A\",\"B\"\n\"1\",\"x\"\n\"2\",\"y\"\n";
        let rows = parse_rows(body).unwrap();
        assert_eq!(rows, vec![vec!["1", "x"], vec!["2", "y"]]);
    }

    #[test]
    fn status_codec_matches_the_export_import_convention() {
        assert_eq!(status_label(true), "Activo");
        assert_eq!(status_label(false), "Inactivo");
        assert!(parse_status("1"));
        assert!(parse_status(""));
        assert!(parse_status("Activo"));
        assert!(!parse_status("0"));
        assert!(!parse_status("Inactivo"));
    }

    #[test]
    fn error_list_is_capped_with_a_suffix() {
        let mut report = ImportReport::default();
        for i in 0..13 {
            report.row_error(i + 2, "Campos obligatorios faltantes");
        }
        assert_eq!(report.errors.len(), 13);

        let mut reported: Vec<String> =
            report.errors.iter().take(MAX_REPORTED_ERRORS).cloned().collect();
        if report.errors.len() > MAX_REPORTED_ERRORS {
            reported.push(format!("... y {} errores más", report.errors.len() - MAX_REPORTED_ERRORS));
        }
        assert_eq!(reported.len(), 11);
        assert!(reported.last().unwrap().contains("3 errores más"));
    }
}
