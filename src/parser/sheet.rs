// src/parser/sheet.rs

use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Range, Reader};
use std::path::Path;

use super::{run_blocking, DocumentParser};
use crate::errors::ParseError;
use crate::model::Page;

/// Spreadsheets produce one page per sheet, each rendered as CSV text.
/// A `.csv` upload is a single sheet and is read verbatim. The file on disk
/// must keep its original extension; workbook format detection relies on it.
pub struct SpreadsheetParser;

#[async_trait]
impl DocumentParser for SpreadsheetParser {
    async fn parse(&self, path: &Path) -> Result<Vec<Page>, ParseError> {
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);

        let owned = path.to_path_buf();
        run_blocking("spreadsheet", move || {
            if is_csv {
                let bytes = std::fs::read(&owned).map_err(|source| ParseError::Io {
                    path: owned.display().to_string(),
                    source,
                })?;
                return Ok(vec![Page::new(1, String::from_utf8_lossy(&bytes).into_owned())]);
            }
            read_workbook(&owned)
        })
        .await
    }
}

fn read_workbook(path: &Path) -> Result<Vec<Page>, ParseError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| ParseError::Malformed {
        kind: "spreadsheet",
        message: e.to_string(),
    })?;

    let sheet_names = workbook.sheet_names().to_vec();
    let mut pages = Vec::with_capacity(sheet_names.len());
    for (idx, name) in sheet_names.iter().enumerate() {
        let range = workbook
            .worksheet_range(name)
            .map_err(|e| ParseError::Malformed {
                kind: "spreadsheet",
                message: format!("sheet {}: {}", name, e),
            })?;
        pages.push(Page::new(idx as u32 + 1, range_to_csv(&range)));
    }
    Ok(pages)
}

pub fn range_to_csv(range: &Range<Data>) -> String {
    range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| csv_field(&cell.to_string()))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
