use crate::error::Res;
use crate::model::{Cell, CellValue};
use crate::sheet::RawSheet;
use anyhow::Context;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use tracing::debug;

/// Reads the first worksheet of an xlsx/xlsm/xlsb/xls/ods workbook.
pub(super) fn decode_first_sheet(bytes: &[u8]) -> Res<RawSheet> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .context("Unable to open the workbook")?;

    let range = workbook
        .worksheet_range_at(0)
        .context("The workbook has no worksheets")?
        .context("Unable to read the first worksheet")?;

    debug!(
        "First worksheet has {} rows and {} columns",
        range.height(),
        range.width()
    );

    let mut sheet = RawSheet::default();
    for row in range.rows() {
        sheet.push_row(row.iter().map(convert_value).collect());
    }
    Ok(sheet)
}

fn convert_value(value: &Data) -> Cell {
    match value {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Int(i) => Some(CellValue::Int(*i)),
        Data::Float(f) => Some(CellValue::number(*f)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::DateTime(dt) => Some(CellValue::number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
        Data::Error(e) => Some(CellValue::Text(e.to_string())),
    }
}
