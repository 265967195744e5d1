use serde_json::Value;

use crate::address::CellRef;

// ---------------------------------------------------------------------------
// CellValue — What a single cell holds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    /// Flattened to one space-separated string when written.
    List(Vec<String>),
}

impl CellValue {
    /// True for `Empty`, blank text, or an empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
            CellValue::List(items) => items.iter().all(|s| s.trim().is_empty()),
        }
    }

    /// The text a user would see in the cell.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
            CellValue::List(items) => items.join(" "),
        }
    }

    /// JSON value for a Sheets `values` payload.
    ///
    /// Non-finite numbers have no JSON form and are written as empty cells.
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(String::new())),
            other => Value::String(other.to_text()),
        }
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::from(s.to_string())
    }
}

impl From<Option<String>> for CellValue {
    fn from(v: Option<String>) -> Self {
        v.map(CellValue::from).unwrap_or(CellValue::Empty)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(v: Option<f64>) -> Self {
        v.map(CellValue::Number).unwrap_or(CellValue::Empty)
    }
}

impl From<Option<Vec<String>>> for CellValue {
    fn from(v: Option<Vec<String>>) -> Self {
        v.map(CellValue::List).unwrap_or(CellValue::Empty)
    }
}

// ---------------------------------------------------------------------------
// Cell — A positioned cell value
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub at: CellRef,
    pub value: CellValue,
}

impl Cell {
    pub fn new(at: CellRef, value: impl Into<CellValue>) -> Self {
        Self {
            at,
            value: value.into(),
        }
    }

    pub fn row(&self) -> u32 {
        self.at.row
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn text(&self) -> String {
        self.value.to_text()
    }
}
