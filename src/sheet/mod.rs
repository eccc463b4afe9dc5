//! Converts uploaded spreadsheet bytes into a `RawSheet`.
//!
//! Only the first worksheet of a workbook is read. Workbook formats are decoded with `calamine`,
//! CSV with the `csv` crate.

mod workbook;

use crate::error::Res;
use crate::model::{Cell, CellValue};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use tracing::trace;

/// The rows of one worksheet. Row 0 is the header row.
///
/// Trailing absent cells are trimmed from every row when it is added, so a row that holds no values
/// has zero cells and the last cell of the header row is its last labelled column.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct RawSheet {
    rows: Vec<Vec<Cell>>,
}

impl RawSheet {
    pub fn new<R, C>(rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        let mut sheet = Self::default();
        for row in rows {
            sheet.push_row(row.into_iter().map(Into::into).collect());
        }
        sheet
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        while matches!(row.last(), Some(None)) {
            row.pop();
        }
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The header row as labels. Cells that are absent or blank text become `None`.
    pub fn header(&self) -> Option<Vec<Option<String>>> {
        self.rows.first().map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Some(value) if !value.is_empty_text() => Some(value.to_text()),
                    _ => None,
                })
                .collect()
        })
    }

    /// The data rows, i.e. every row after the header.
    pub fn data_rows(&self) -> &[Vec<Cell>] {
        self.rows.get(1..).unwrap_or_default()
    }
}

/// The file formats that can be decoded.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetFormat {
    Xlsx,
    Xlsm,
    Xlsb,
    Xls,
    Ods,
    Csv,
}

serde_plain::derive_display_from_serialize!(SheetFormat);
serde_plain::derive_fromstr_from_deserialize!(SheetFormat);

impl SheetFormat {
    /// Determines the format from a file name's extension, ignoring case.
    pub fn from_file_name(name: impl AsRef<Path>) -> Res<Self> {
        let name = name.as_ref();
        let extension = name
            .extension()
            .and_then(|e| e.to_str())
            .with_context(|| format!("The file '{}' has no extension", name.display()))?;
        extension
            .to_ascii_lowercase()
            .parse()
            .map_err(|_| anyhow::anyhow!("Unsupported file type '.{extension}'"))
    }
}

/// Decodes `bytes` of the given `format` into a `RawSheet`.
pub fn decode(bytes: &[u8], format: SheetFormat) -> Res<RawSheet> {
    trace!("decoding {} bytes as {format}", bytes.len());
    if bytes.is_empty() {
        bail!("The file is empty");
    }
    match format {
        SheetFormat::Csv => decode_csv(bytes),
        _ => workbook::decode_first_sheet(bytes),
    }
}

fn decode_csv(bytes: &[u8]) -> Res<RawSheet> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false) // The header row is part of the data
        .flexible(true)
        .from_reader(Cursor::new(bytes));

    let mut sheet = RawSheet::default();
    for (ix, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Unable to read CSV record {}", ix + 1))?;
        // Header labels are kept as written, data cells are interpreted.
        let row: Vec<Cell> = if ix == 0 {
            record
                .iter()
                .map(|field| (!field.is_empty()).then(|| CellValue::from(field)))
                .collect()
        } else {
            record.iter().map(CellValue::parse_text).collect()
        };
        sheet.push_row(row);
    }
    Ok(sheet)
}
