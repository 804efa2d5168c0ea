//! Row/column coordinates over the line table.

use std::cmp::Ordering;

/// A `(row, col)` position into the line table's rows.
///
/// Rows are line table rows (a physical line longer than the maximum line length spans several
/// rows), columns are character offsets within the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextPoint {
    /// Zero-based row.
    pub row: usize,
    /// Zero-based column in characters within the row.
    pub col: usize,
}

impl TextPoint {
    /// Create a new point.
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl Ord for TextPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.row
            .cmp(&other.row)
            .then_with(|| self.col.cmp(&other.col))
    }
}

impl PartialOrd for TextPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A rectangle of text points, inclusive on both corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRectangle {
    top_left: TextPoint,
    bottom_right: TextPoint,
}

impl TextRectangle {
    /// Rectangle spanning two corners. The corners are normalised so `top_left <= bottom_right`
    /// holds per axis.
    pub fn new(a: TextPoint, b: TextPoint) -> Self {
        Self {
            top_left: TextPoint::new(a.row.min(b.row), a.col.min(b.col)),
            bottom_right: TextPoint::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    /// Rectangle from an origin and a size (`height` rows, `width` columns, both at least 1).
    pub fn from_size(row: usize, col: usize, height: usize, width: usize) -> Self {
        Self {
            top_left: TextPoint::new(row, col),
            bottom_right: TextPoint::new(
                row + height.saturating_sub(1),
                col + width.saturating_sub(1),
            ),
        }
    }

    /// Upper-left corner.
    pub fn top_left(&self) -> TextPoint {
        self.top_left
    }

    /// Upper-right corner.
    pub fn top_right(&self) -> TextPoint {
        TextPoint::new(self.top_left.row, self.bottom_right.col)
    }

    /// Lower-left corner.
    pub fn bottom_left(&self) -> TextPoint {
        TextPoint::new(self.bottom_right.row, self.top_left.col)
    }

    /// Lower-right corner.
    pub fn bottom_right(&self) -> TextPoint {
        self.bottom_right
    }

    /// Rows covered.
    pub fn height(&self) -> usize {
        self.bottom_right.row - self.top_left.row + 1
    }
}
