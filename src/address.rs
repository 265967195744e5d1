//! A1-style cell and range addressing.
//!
//! Rows and columns are **1-indexed**, matching the spreadsheet UI:
//! `CellRef::new(1, 1)` is `A1`, `CellRef::new(3, 2)` is `B3`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SyncError};

/// A reference to a single cell within a worksheet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Convert to A1 notation (e.g. `A1`, `BC32`).
    pub fn to_a1(self) -> String {
        format!("{}{}", col_to_name(self.col), self.row)
    }

    /// Parse an A1-style reference (e.g. `A1`, `$B$2`).
    pub fn from_a1(a1: &str) -> Result<Self> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(SyncError::Address("empty cell reference".to_string()));
        }

        let bytes = s.as_bytes();
        let mut idx = 0usize;
        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }

        let col_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
            idx += 1;
        }
        if idx == col_start {
            return Err(SyncError::Address(format!("missing column in {:?}", s)));
        }
        let col = name_to_col(&s[col_start..idx])?;

        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }

        let row_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }
        if idx == row_start {
            return Err(SyncError::Address(format!("missing row in {:?}", s)));
        }
        if idx != bytes.len() {
            return Err(SyncError::Address(format!("trailing characters in {:?}", s)));
        }

        let row: u32 = s[row_start..idx]
            .parse()
            .map_err(|_| SyncError::Address(format!("invalid row in {:?}", s)))?;
        if row == 0 {
            return Err(SyncError::Address(format!("row 0 in {:?}", s)));
        }

        Ok(Self { row, col })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

impl FromStr for CellRef {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_a1(s)
    }
}

/// An inclusive rectangular region, always normalized so that `start` is the
/// top-left corner and `end` the bottom-right.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: CellRef,
    pub end: CellRef,
}

impl Range {
    pub fn new(a: CellRef, b: CellRef) -> Self {
        Self {
            start: CellRef::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellRef::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    /// A single-row span `{first}{row}:{last}{row}`.
    pub fn row_span(row: u32, first_col: u32, last_col: u32) -> Self {
        Self::new(CellRef::new(row, first_col), CellRef::new(row, last_col))
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    #[inline]
    pub const fn is_single_cell(&self) -> bool {
        self.start.row == self.end.row && self.start.col == self.end.col
    }

    /// Every cell of the range in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.start.row..=self.end.row).flat_map(move |row| {
            (self.start.col..=self.end.col).map(move |col| CellRef::new(row, col))
        })
    }

    /// Parse `A1:B2` or a single-cell reference like `C3`.
    pub fn from_a1(a1: &str) -> Result<Self> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(SyncError::Address("empty range".to_string()));
        }
        match s.split_once(':') {
            None => {
                let cell = CellRef::from_a1(s)?;
                Ok(Self::new(cell, cell))
            }
            Some((a, b)) => Ok(Self::new(CellRef::from_a1(a)?, CellRef::from_a1(b)?)),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

impl FromStr for Range {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_a1(s)
    }
}

impl From<CellRef> for Range {
    fn from(cell: CellRef) -> Self {
        Self::new(cell, cell)
    }
}

/// Column number (1-based) to letters: `1 -> A`, `27 -> AA`.
pub fn col_to_name(col: u32) -> String {
    let mut n = col;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Column letters to number (1-based): `A -> 1`, `AA -> 27`.
pub fn name_to_col(name: &str) -> Result<u32> {
    let mut col: u32 = 0;
    for b in name.bytes() {
        if !b.is_ascii_alphabetic() {
            return Err(SyncError::Address(format!("invalid column {:?}", name)));
        }
        let v = (b.to_ascii_uppercase() - b'A') as u32 + 1;
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(v))
            .ok_or_else(|| SyncError::Address(format!("column {:?} out of range", name)))?;
    }
    if col == 0 {
        return Err(SyncError::Address("empty column".to_string()));
    }
    Ok(col)
}
