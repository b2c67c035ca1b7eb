use serde::{Deserialize, Serialize};

/// Stable identifier of a sheet inside a workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SheetId(u32);

impl SheetId {
    pub const fn from_raw(raw: u32) -> Self {
        SheetId(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// A single cell on a given sheet (0-based column and row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPosition {
    pub sheet: SheetId,
    pub col: usize,
    pub row: usize,
}

impl CellPosition {
    pub fn new(sheet: SheetId, col: usize, row: usize) -> Self {
        Self { sheet, col, row }
    }
}

/// A rectangular range of cells, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Zone {
    pub left: usize,
    pub top: usize,
    pub right: usize,
    pub bottom: usize,
}

impl Zone {
    /// Create a new zone, normalizing so left <= right and top <= bottom.
    pub fn new(c1: usize, r1: usize, c2: usize, r2: usize) -> Self {
        Self {
            left: c1.min(c2),
            top: r1.min(r2),
            right: c1.max(c2),
            bottom: r1.max(r2),
        }
    }

    /// Create a single-cell zone.
    pub fn single(col: usize, row: usize) -> Self {
        Self { left: col, top: row, right: col, bottom: row }
    }

    pub fn contains(&self, col: usize, row: usize) -> bool {
        col >= self.left && col <= self.right && row >= self.top && row <= self.bottom
    }

    /// True if `other` lies entirely inside this zone.
    pub fn includes(&self, other: &Zone) -> bool {
        self.contains(other.left, other.top) && self.contains(other.right, other.bottom)
    }

    pub fn cell_count(&self) -> usize {
        (self.right - self.left + 1) * (self.bottom - self.top + 1)
    }

    pub fn is_single(&self) -> bool {
        self.left == self.right && self.top == self.bottom
    }
}

/// A zone whose right and/or bottom edge may extend to the end of the sheet.
///
/// `right == None` means every column from `left` onwards (a full-row range such
/// as `3:5`), `bottom == None` every row from `top` onwards (`A:C`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnboundedZone {
    pub left: usize,
    pub top: usize,
    pub right: Option<usize>,
    pub bottom: Option<usize>,
}

impl UnboundedZone {
    pub fn is_full_columns(&self) -> bool {
        self.bottom.is_none() && self.top == 0
    }

    pub fn is_full_rows(&self) -> bool {
        self.right.is_none() && self.left == 0
    }

    /// Clamp the open edges to a sheet of `cols` x `rows` cells.
    pub fn bounded(&self, cols: usize, rows: usize) -> Zone {
        let right = self.right.unwrap_or(cols.saturating_sub(1));
        let bottom = self.bottom.unwrap_or(rows.saturating_sub(1));
        Zone::new(self.left, self.top, right.max(self.left), bottom.max(self.top))
    }
}

impl From<Zone> for UnboundedZone {
    fn from(zone: Zone) -> Self {
        Self {
            left: zone.left,
            top: zone.top,
            right: Some(zone.right),
            bottom: Some(zone.bottom),
        }
    }
}
