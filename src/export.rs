use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};

use crate::error::PipelineError;
use crate::table::{Table, Value};

/// Writes the full table as a delimited re-export for BI tools.
pub fn export_csv(table: &Table, path: &Path) -> Result<(), PipelineError> {
    table.write_csv(path)
}

/// Writes the full table as a single-sheet spreadsheet.
pub fn export_xlsx(table: &Table, path: &Path) -> Result<(), PipelineError> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    for (col_idx, col) in table.columns().iter().enumerate() {
        let col_idx = col_idx as u16;
        worksheet.write_string_with_format(0, col_idx, col.name.as_str(), &header_format)?;
        for (row_idx, value) in col.values.iter().enumerate() {
            let row_idx = row_idx as u32 + 1;
            match value {
                Value::Int(v) => {
                    worksheet.write_number(row_idx, col_idx, *v as f64)?;
                }
                Value::Float(v) if v.is_finite() => {
                    worksheet.write_number(row_idx, col_idx, *v)?;
                }
                Value::Float(_) => {}
                Value::Bool(b) => {
                    worksheet.write_boolean(row_idx, col_idx, *b)?;
                }
                Value::Text(_) | Value::Date(_) => {
                    worksheet.write_string(row_idx, col_idx, value.render())?;
                }
                Value::Null => {}
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}
