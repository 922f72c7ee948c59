//! Spreadsheet output for `create_excel_sheet`

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};
use crate::services::{JsonDocument, SpreadsheetWriter};

/// One cell of the output grid
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Blank,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl From<&Value> for CellValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => CellValue::Blank,
            Value::Bool(b) => CellValue::Bool(*b),
            Value::Number(n) => n
                .as_f64()
                .map(CellValue::Number)
                .unwrap_or_else(|| CellValue::Text(n.to_string())),
            Value::String(s) => CellValue::Text(s.clone()),
            nested => CellValue::Text(nested.to_string()),
        }
    }
}

/// Header row and data rows for a list of objects
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Lay out objects as a table: the header is the union of keys in first-seen
/// order and each object fills its own row.
pub fn rows_to_grid(rows: &[JsonDocument]) -> Grid {
    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !headers.iter().any(|h| h == key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(h).map(CellValue::from).unwrap_or(CellValue::Blank))
                .collect()
        })
        .collect();

    Grid { headers, rows }
}

fn xlsx_error(e: rust_xlsxwriter::XlsxError) -> Error {
    Error::SpreadsheetWrite(e.to_string())
}

/// Worksheet column index, refusing grids wider than the column type
fn column(index: usize) -> Result<u16> {
    u16::try_from(index)
        .map_err(|_| Error::SpreadsheetWrite(format!("too many columns: {}", index + 1)))
}

/// Write a grid to a single-sheet workbook
pub fn write_workbook(grid: &Grid, sheet_name: &str, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name).map_err(xlsx_error)?;

    for (col, header) in grid.headers.iter().enumerate() {
        sheet
            .write_string(0, column(col)?, header.as_str())
            .map_err(xlsx_error)?;
    }

    for (r, row) in grid.rows.iter().enumerate() {
        let r = u32::try_from(r + 1)
            .map_err(|_| Error::SpreadsheetWrite(format!("too many rows: {}", r + 1)))?;
        for (c, cell) in row.iter().enumerate() {
            let c = column(c)?;
            match cell {
                CellValue::Blank => {}
                CellValue::Text(s) => {
                    sheet.write_string(r, c, s.as_str()).map_err(xlsx_error)?;
                }
                CellValue::Number(n) => {
                    sheet.write_number(r, c, *n).map_err(xlsx_error)?;
                }
                CellValue::Bool(b) => {
                    sheet.write_boolean(r, c, *b).map_err(xlsx_error)?;
                }
            }
        }
    }

    workbook.save(path).map_err(xlsx_error)
}

/// [`SpreadsheetWriter`] backed by `rust_xlsxwriter`, run on the blocking pool
#[derive(Debug, Default, Clone)]
pub struct XlsxSpreadsheetWriter;

#[async_trait]
impl SpreadsheetWriter for XlsxSpreadsheetWriter {
    async fn write(
        &self,
        rows: Vec<JsonDocument>,
        sheet_name: &str,
        path: &Path,
    ) -> Result<PathBuf> {
        let sheet_name = sheet_name.to_string();
        let path = std::path::absolute(path)?;

        let written = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            let grid = rows_to_grid(&rows);
            write_workbook(&grid, &sheet_name, &path)?;
            info!(
                "Wrote {} rows x {} columns to {:?}",
                grid.rows.len(),
                grid.headers.len(),
                path
            );
            Ok(path)
        })
        .await
        .map_err(|e| Error::SpreadsheetWrite(format!("writer task failed: {}", e)))??;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_auto, Data, Reader};
    use serde_json::json;

    fn objects(value: Value) -> Vec<JsonDocument> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_header_is_union_in_first_seen_order() {
        let grid = rows_to_grid(&objects(json!([
            {"name": "Ada", "age": 36},
            {"name": "Grace", "team": "Navy", "active": true},
            {"tags": ["a", "b"], "name": null}
        ])));

        assert_eq!(grid.headers, vec!["name", "age", "team", "active", "tags"]);
        assert_eq!(
            grid.rows[1],
            vec![
                CellValue::Text("Grace".into()),
                CellValue::Blank,
                CellValue::Text("Navy".into()),
                CellValue::Bool(true),
                CellValue::Blank,
            ]
        );
        assert_eq!(grid.rows[2][0], CellValue::Blank);
        assert_eq!(grid.rows[2][4], CellValue::Text(r#"["a","b"]"#.into()));
    }

    #[test]
    fn test_column_index_bounds() {
        assert_eq!(column(0).unwrap(), 0);
        assert_eq!(column(65_535).unwrap(), 65_535);
        assert!(matches!(column(65_536), Err(Error::SpreadsheetWrite(_))));
    }

    #[test]
    fn test_too_wide_grid_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let grid = Grid {
            headers: (0..70_000).map(|i| format!("c{i}")).collect(),
            rows: Vec::new(),
        };
        let err = write_workbook(&grid, "Wide", &dir.path().join("wide.xlsx")).unwrap_err();
        assert!(matches!(err, Error::SpreadsheetWrite(_)));
    }

    #[test]
    fn test_empty_data() {
        let grid = rows_to_grid(&[]);
        assert!(grid.headers.is_empty());
        assert!(grid.rows.is_empty());
    }

    #[tokio::test]
    async fn test_written_workbook_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.xlsx");

        let written = XlsxSpreadsheetWriter
            .write(
                objects(json!([{"name": "Ada", "age": 36}, {"name": "Grace", "age": 85}])),
                "People",
                &path,
            )
            .await
            .unwrap();
        assert!(written.is_absolute());

        let mut workbook = open_workbook_auto(&written).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["People".to_string()]);
        let range = workbook.worksheet_range("People").unwrap();
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("name".into())));
        assert_eq!(range.get_value((2, 0)), Some(&Data::String("Grace".into())));
        assert_eq!(range.get_value((2, 1)), Some(&Data::Float(85.0)));
    }

    #[tokio::test]
    async fn test_invalid_sheet_name_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = XlsxSpreadsheetWriter
            .write(objects(json!([{"a": 1}])), "bad[name]", &dir.path().join("x.xlsx"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SpreadsheetWrite(_)));
    }
}
