//! Monospace cell-grid layout.
//!
//! Measures rows in character cells following UAX #11 widths, expands tabs to the next tab stop,
//! keeps grapheme clusters together and wraps at a cell width. It is the default
//! [`TextRender`] and doubles as a deterministic renderer for tests.

use crate::render::{AlignDirection, LayoutInput, Point, TextLayout, TextRender};
use crate::text_store::NEW_LINE;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

/// Default tab width in cells.
pub const DEFAULT_TAB_WIDTH: usize = 4;

/// Visual width of a character (UAX #11): 0 for combining marks, 2 for wide characters.
pub fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(1)
}

/// Width of `ch` when it starts at `cell_offset`; tabs advance to the next tab stop.
pub fn cell_width_at(ch: char, cell_offset: usize, tab_width: usize) -> usize {
    if ch == '\t' {
        let tab_width = tab_width.max(1);
        tab_width - cell_offset % tab_width
    } else {
        char_width(ch)
    }
}

/// Width of `s` in cells, expanding tabs.
pub fn str_width_with_tab_width(s: &str, tab_width: usize) -> usize {
    let mut x = 0usize;
    for ch in s.chars() {
        x = x.saturating_add(cell_width_at(ch, x, tab_width));
    }
    x
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cluster {
    /// First character of the cluster.
    char_start: usize,
    char_len: usize,
    /// Visual line the cluster lands on.
    line: usize,
    /// Cell offset within its visual line.
    x: usize,
    cells: usize,
}

/// A row laid out on the cell grid.
#[derive(Debug, Clone)]
pub struct MonospaceLayout {
    clusters: Vec<Cluster>,
    /// Characters in the row, terminator included.
    char_count: usize,
    /// Cell width of each visual line.
    line_widths: Vec<usize>,
    em_width: f64,
    line_height: f64,
}

impl MonospaceLayout {
    /// Lay out `text`, wrapping at `wrap_cells` if set.
    pub fn new(text: &str, tab_width: usize, wrap_cells: Option<usize>, em_width: f64, line_height: f64) -> Self {
        let mut clusters = Vec::new();
        let mut line_widths = vec![0usize];
        let mut char_start = 0usize;
        let mut line = 0usize;
        let mut x = 0usize;
        let mut x_in_row = 0usize;

        for grapheme in text.graphemes(true) {
            let char_len = grapheme.chars().count();
            let cells = if grapheme.starts_with(NEW_LINE) {
                0
            } else {
                let mut cells = 0usize;
                for ch in grapheme.chars() {
                    cells += cell_width_at(ch, x_in_row + cells, tab_width);
                }
                cells
            };

            // Wide clusters move to the next line intact when they do not fit.
            if let Some(limit) = wrap_cells
                && limit > 0
                && x > 0
                && x + cells > limit
            {
                line += 1;
                x = 0;
                line_widths.push(0);
            }

            clusters.push(Cluster {
                char_start,
                char_len,
                line,
                x,
                cells,
            });
            x += cells;
            x_in_row += cells;
            line_widths[line] = x;
            char_start += char_len;
        }

        Self {
            clusters,
            char_count: char_start,
            line_widths,
            em_width,
            line_height,
        }
    }

    /// Number of visual lines.
    pub fn visual_line_count(&self) -> usize {
        self.line_widths.len()
    }

    /// Cluster containing `index`, or `None` at or past the end.
    fn cluster_at(&self, index: usize) -> Option<&Cluster> {
        let slot = self
            .clusters
            .partition_point(|c| c.char_start + c.char_len <= index);
        self.clusters.get(slot)
    }

    /// `(line, x)` of `index`; the end of the row sits after the last cluster.
    fn cell_of(&self, index: usize) -> (usize, usize) {
        match self.cluster_at(index) {
            Some(cluster) => (cluster.line, cluster.x),
            None => {
                let line = self.line_widths.len() - 1;
                (line, self.line_widths[line])
            }
        }
    }

    fn index_on_line(&self, line: usize, x: f64) -> usize {
        let cell = (x / self.em_width).max(0.0);
        let mut last_on_line = None;
        for cluster in self.clusters.iter().filter(|c| c.line == line) {
            let mid = cluster.x as f64 + cluster.cells as f64 / 2.0;
            if cell < mid {
                return cluster.char_start;
            }
            last_on_line = Some(cluster);
        }
        match last_on_line {
            // The caret cannot sit after a line break.
            Some(c) if self.is_break(c) => c.char_start,
            Some(c) if line + 1 < self.line_widths.len() => c.char_start,
            Some(c) => c.char_start + c.char_len,
            None => self.char_count,
        }
    }

    fn is_break(&self, cluster: &Cluster) -> bool {
        cluster.cells == 0 && cluster.char_start + cluster.char_len == self.char_count && cluster.char_len > 0
    }
}

impl TextLayout for MonospaceLayout {
    fn width(&self) -> f64 {
        self.line_widths.iter().copied().max().unwrap_or(0) as f64 * self.em_width
    }

    fn height(&self) -> f64 {
        self.line_widths.len() as f64 * self.line_height
    }

    fn index_from_col_position(&self, x: f64) -> usize {
        self.index_on_line(0, x)
    }

    fn width_from_index(&self, index: usize) -> f64 {
        self.cluster_at(index)
            .map(|c| c.cells as f64 * self.em_width)
            .unwrap_or(0.0)
    }

    fn col_position_from_index(&self, index: usize) -> f64 {
        self.cell_of(index).1 as f64 * self.em_width
    }

    fn index_from_position(&self, x: f64, y: f64) -> usize {
        let line = (y / self.line_height).max(0.0) as usize;
        self.index_on_line(line.min(self.line_widths.len() - 1), x)
    }

    fn position_from_index(&self, index: usize) -> Point {
        let (line, x) = self.cell_of(index);
        Point::new(x as f64 * self.em_width, line as f64 * self.line_height)
    }

    fn align_index_to_nearest_cluster(&self, index: usize, direction: AlignDirection) -> usize {
        match (self.cluster_at(index), direction) {
            (Some(c), AlignDirection::Back) => c.char_start,
            (Some(c), AlignDirection::Forward) => c.char_start + c.char_len,
            (None, _) => self.char_count,
        }
    }
}

/// [`TextRender`] over a fixed cell grid.
#[derive(Debug, Clone, Copy)]
pub struct MonospaceRender {
    em_width: f64,
    line_height: f64,
}

impl MonospaceRender {
    /// One unit per cell and per line.
    pub fn new() -> Self {
        Self::with_metrics(1.0, 1.0)
    }

    /// Explicit cell width and line height.
    pub fn with_metrics(em_width: f64, line_height: f64) -> Self {
        Self {
            em_width: if em_width > 0.0 { em_width } else { 1.0 },
            line_height: if line_height > 0.0 { line_height } else { 1.0 },
        }
    }
}

impl Default for MonospaceRender {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRender for MonospaceRender {
    fn create_layout(&self, input: LayoutInput<'_>) -> Box<dyn TextLayout> {
        let wrap_cells = input
            .wrap_width
            .map(|w| (w / self.em_width).floor().max(1.0) as usize);
        Box::new(MonospaceLayout::new(
            input.text,
            input.tab_width,
            wrap_cells,
            self.em_width,
            self.line_height,
        ))
    }

    fn line_height(&self) -> f64 {
        self.line_height
    }

    fn em_width(&self) -> f64 {
        self.em_width
    }
}
