use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A single value from a spreadsheet cell. An absent value is represented by `None` wherever a
/// cell is held, so there is no "empty" variant here.
///
/// Serializes as the bare JSON scalar, e.g. `88`, `92.5`, `true` or `"present"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

/// A cell as it appears in a row: either a value or nothing.
pub type Cell = Option<CellValue>;

impl CellValue {
    /// Creates a numeric cell value. Whole numbers are stored as `Int` so that a grade of `88`
    /// read from a workbook (where every number is a float) looks the same as one read from CSV.
    pub fn number(n: f64) -> Self {
        if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
            CellValue::Int(n as i64)
        } else {
            CellValue::Float(n)
        }
    }

    /// Interprets a text cell from a source that has no types, like CSV. An empty string becomes
    /// `None`. Text becomes a number only when the number prints back as exactly the same text, so
    /// `007`, `1e3` or a code longer than `i64` stay text and identity columns keep what the file
    /// says.
    pub fn parse_text(s: &str) -> Cell {
        if s.is_empty() {
            return None;
        }
        let number = match s.parse::<i64>() {
            Ok(i) => Some(CellValue::Int(i)),
            Err(_) => s
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(CellValue::number),
        };
        match number {
            Some(n) if n.to_text() == s => Some(n),
            _ => Some(CellValue::Text(s.to_string())),
        }
    }

    /// The text form of the value, used for identity columns and header labels.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    pub fn is_empty_text(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.is_empty())
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Float(x) => write!(f, "{x}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}
