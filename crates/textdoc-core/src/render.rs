//! Rendering capability consumed by the line table.
//!
//! The engine never measures text itself. It hands a row's text plus row-relative syntax,
//! marker and selection ranges to a [`TextRender`] and caches the opaque [`TextLayout`] it gets
//! back until the row changes.

use crate::highlight::SyntaxSpan;
use crate::markers::Marker;
use crate::ranges::Selection;

/// Which neighbouring cluster boundary to snap to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlignDirection {
    /// The start of the next cluster.
    Forward,
    /// The start of the cluster containing the index.
    Back,
}

/// A position in layout units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Horizontal offset.
    pub x: f64,
    /// Vertical offset.
    pub y: f64,
}

impl Point {
    /// Create a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Everything a renderer needs to lay out one row.
///
/// Ranges are relative to the row head.
#[derive(Debug, Clone, Copy)]
pub struct LayoutInput<'a> {
    /// Row text, terminator included.
    pub text: &'a str,
    /// Highlighted tokens.
    pub syntax: &'a [SyntaxSpan],
    /// Markers clipped to the row.
    pub markers: &'a [Marker],
    /// Selections clipped to the row.
    pub selections: &'a [Selection],
    /// Wrap the row at this width, if set.
    pub wrap_width: Option<f64>,
    /// Tab stop width in cells.
    pub tab_width: usize,
}

/// A laid out row.
pub trait TextLayout: Send {
    /// Width of the widest visual line.
    fn width(&self) -> f64;

    /// Total height.
    fn height(&self) -> f64;

    /// `true` once the layout must be rebuilt, for example after a glyph source went stale.
    fn is_invalid(&self) -> bool {
        false
    }

    /// Character index at horizontal offset `x` on the first visual line.
    fn index_from_col_position(&self, x: f64) -> usize;

    /// Width of the character at `index`.
    fn width_from_index(&self, index: usize) -> f64;

    /// Horizontal offset of `index` within its visual line.
    fn col_position_from_index(&self, index: usize) -> f64;

    /// Character index at `(x, y)`.
    fn index_from_position(&self, x: f64, y: f64) -> usize;

    /// Offset of `index` from the layout origin.
    fn position_from_index(&self, index: usize) -> Point;

    /// Snap `index` to a grapheme cluster boundary.
    fn align_index_to_nearest_cluster(&self, index: usize, direction: AlignDirection) -> usize;
}

/// Produces layouts.
pub trait TextRender: Send {
    /// Lay out one row.
    fn create_layout(&self, input: LayoutInput<'_>) -> Box<dyn TextLayout>;

    /// Height of one visual line.
    fn line_height(&self) -> f64;

    /// Width of one character cell.
    fn em_width(&self) -> f64;
}
