//! Workbook to CSV conversion (first sheet only)

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use chrono::Timelike;
use crate::error::{Error, Result};

/// A rendered worksheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSheet {
    pub name: String,
    pub csv: String,
    pub rows: usize,
}

impl RenderedSheet {
    /// Text block body: a header line naming the sheet, then the CSV
    pub fn to_text(&self) -> String {
        format!("Sheet: {}\n\n{}", self.name, self.csv)
    }
}

/// Parse an xlsx/xls/xlsb/ods workbook and render its first sheet as CSV.
/// Rows whose cells are all blank are dropped.
pub fn first_sheet_to_csv(bytes: &[u8]) -> Result<RenderedSheet> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| Error::conversion("spreadsheet", e))?;

    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::conversion("spreadsheet", "workbook has no sheets"))?;

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| Error::conversion("spreadsheet", e))?;

    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    let mut rows = 0;
    for row in range.rows() {
        let cells: Vec<String> = row.iter().map(render_cell).collect();
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        writer
            .write_record(&cells)
            .map_err(|e| Error::conversion("spreadsheet", e))?;
        rows += 1;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::conversion("spreadsheet", e))?;
    let csv = String::from_utf8(bytes).map_err(|e| Error::conversion("spreadsheet", e))?;

    Ok(RenderedSheet { name, csv, rows })
}

fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|dt| {
                if dt.time().num_seconds_from_midnight() == 0 {
                    dt.format("%Y-%m-%d").to_string()
                } else {
                    dt.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            })
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    /// Two-sheet workbook with a blank row in the middle of the first sheet
    pub(crate) fn sample_workbook() -> Vec<u8> {
        let mut workbook = Workbook::new();

        let first = workbook.add_worksheet();
        first.set_name("Sheet1").unwrap();
        first.write_string(0, 0, "name").unwrap();
        first.write_string(0, 1, "amount").unwrap();
        first.write_string(1, 0, "Acme, Inc.").unwrap();
        first.write_number(1, 1, 1200.5).unwrap();
        // row 2 intentionally left blank
        first.write_string(3, 0, "Globex").unwrap();
        first.write_number(3, 1, 42).unwrap();

        let second = workbook.add_worksheet();
        second.set_name("Sheet2").unwrap();
        second.write_string(0, 0, "hidden-from-output").unwrap();

        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_renders_only_first_sheet() {
        let sheet = first_sheet_to_csv(&sample_workbook()).unwrap();
        assert_eq!(sheet.name, "Sheet1");
        assert!(!sheet.csv.contains("hidden-from-output"));
        assert!(sheet.to_text().starts_with("Sheet: Sheet1\n"));
    }

    #[test]
    fn test_blank_rows_are_dropped_and_fields_quoted() {
        let sheet = first_sheet_to_csv(&sample_workbook()).unwrap();
        assert_eq!(sheet.rows, 3);
        let lines: Vec<&str> = sheet.csv.lines().collect();
        assert_eq!(
            lines,
            vec!["name,amount", "\"Acme, Inc.\",1200.5", "Globex,42"]
        );
    }

    #[test]
    fn test_not_a_workbook() {
        let err = first_sheet_to_csv(b"PK\x03\x04 truncated").unwrap_err();
        assert!(matches!(err, Error::Conversion { format: "spreadsheet", .. }));
    }
}
