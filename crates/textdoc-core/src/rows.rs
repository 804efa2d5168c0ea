//! Row records with lazily maintained head indices.
//!
//! Rewriting the head index of every later row on each keystroke costs O(rows). Instead one
//! *step* row and a pending delta are tracked: heads at or before the step row are exact, heads
//! after it are stored without the delta and corrected on read. Moving the step applies the delta
//! only to the rows it passes over, so repeated edits near one spot stay O(1).

use crate::error::{EngineError, Result};
use crate::gap_buffer::GapBuffer;
use crate::highlight::{EncloserType, SyntaxSpan};
use crate::render::TextLayout;
use std::cell::Cell;
use std::fmt;

/// One row of the line table.
pub struct LineRecord {
    /// Head index as stored. Rows after the step row lag by the step delta.
    index: isize,
    length: usize,
    line_end: bool,
    dirty: bool,
    syntax: Vec<SyntaxSpan>,
    encloser: EncloserType,
    layout: Option<Box<dyn TextLayout>>,
}

impl LineRecord {
    /// A record whose true head is `head`.
    pub fn new(head: usize, length: usize, line_end: bool, dirty: bool) -> Self {
        Self {
            index: head as isize,
            length,
            line_end,
            dirty,
            syntax: Vec::new(),
            encloser: EncloserType::None,
            layout: None,
        }
    }

    /// Characters in the row, terminator included.
    pub fn length(&self) -> usize {
        self.length
    }

    /// `true` if the row ends in a line break or at the end of the text.
    pub fn line_end(&self) -> bool {
        self.line_end
    }

    pub(crate) fn set_line_end(&mut self, line_end: bool) {
        self.line_end = line_end;
    }

    /// `true` if the row changed since the host last cleared the flag.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Set or clear the dirty flag.
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Highlighted tokens, relative to the row head.
    pub fn syntax(&self) -> &[SyntaxSpan] {
        &self.syntax
    }

    /// Replace the highlighted tokens.
    pub fn set_syntax(&mut self, syntax: Vec<SyntaxSpan>) {
        self.syntax = syntax;
    }

    /// Multi-row construct state at this row.
    pub fn encloser(&self) -> EncloserType {
        self.encloser
    }

    /// Record the multi-row construct state.
    pub fn set_encloser(&mut self, encloser: EncloserType) {
        self.encloser = encloser;
    }

    /// The cached layout, if one was built and is still valid.
    pub fn layout(&self) -> Option<&dyn TextLayout> {
        self.layout.as_deref().filter(|l| !l.is_invalid())
    }

    /// Cache a layout for this row.
    pub fn set_layout(&mut self, layout: Box<dyn TextLayout>) {
        self.layout = Some(layout);
    }

    /// Drop the cached layout.
    pub fn clear_layout(&mut self) {
        self.layout = None;
    }
}

impl fmt::Debug for LineRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineRecord")
            .field("index", &self.index)
            .field("length", &self.length)
            .field("line_end", &self.line_end)
            .field("dirty", &self.dirty)
            .field("syntax", &self.syntax.len())
            .field("layout", &self.layout.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Step {
    row: usize,
    delta: isize,
}

/// Row records plus the step bookkeeping.
#[derive(Default)]
pub struct RowIndex {
    records: GapBuffer<LineRecord>,
    step: Step,
    last_row: Cell<usize>,
}

impl RowIndex {
    /// No rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record of `row`.
    pub fn record(&self, row: usize) -> Option<&LineRecord> {
        self.records.get(row)
    }

    /// Mutable record of `row`.
    pub fn record_mut(&mut self, row: usize) -> Option<&mut LineRecord> {
        self.records.get_mut(row)
    }

    /// Every record in row order.
    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut LineRecord> + '_ {
        self.records.iter_mut()
    }

    /// True head index of `row`.
    pub fn head(&self, row: usize) -> Option<usize> {
        self.records.get(row).map(|r| self.true_head(row, r))
    }

    /// Length of `row`.
    pub fn length(&self, row: usize) -> Option<usize> {
        self.records.get(row).map(|r| r.length)
    }

    /// Line-end flag of `row`.
    pub fn line_end(&self, row: usize) -> Option<bool> {
        self.records.get(row).map(|r| r.line_end)
    }

    fn true_head(&self, row: usize, record: &LineRecord) -> usize {
        let delta = if row > self.step.row {
            self.step.delta
        } else {
            0
        };
        (record.index + delta) as usize
    }

    pub(crate) fn head_of(&self, row: usize) -> usize {
        self.true_head(row, &self.records[row])
    }

    pub(crate) fn length_of(&self, row: usize) -> usize {
        self.records[row].length
    }

    /// Row containing `index`.
    ///
    /// An index equal to the text length belongs to the last row.
    pub fn row_of(&self, index: usize) -> Option<usize> {
        let len = self.records.len();
        if len == 0 {
            return None;
        }
        if index == 0 {
            return Some(0);
        }

        let cached = self.last_row.get();
        if cached < len {
            let head = self.head_of(cached);
            if head <= index && index < head + self.length_of(cached) {
                return Some(cached);
            }
        }

        // Last row whose head is at or before `index`.
        let (mut lo, mut hi) = (0usize, len);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.head_of(mid) <= index {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let row = lo.checked_sub(1)?;
        if row == len - 1 && index > self.head_of(row) + self.length_of(row) {
            return None;
        }
        self.last_row.set(row);
        Some(row)
    }

    /// Make `row` the step row, settling the heads of the rows the step passes over.
    fn move_step_to(&mut self, row: usize) {
        let Step { row: step_row, delta } = self.step;
        let len = self.records.len();
        if delta != 0 {
            if step_row < row {
                for r in (step_row + 1)..=row.min(len.saturating_sub(1)) {
                    if let Some(record) = self.records.get_mut(r) {
                        record.index += delta;
                    }
                }
            } else if step_row > row {
                for r in (row + 1)..=step_row.min(len.saturating_sub(1)) {
                    if let Some(record) = self.records.get_mut(r) {
                        record.index -= delta;
                    }
                }
            }
        }
        self.step.row = row;
    }

    /// Replace `remove_count` rows at `start` with `rows`.
    ///
    /// `rows` carry their true heads; `delta` is the change in text length.
    pub(crate) fn replace_rows(
        &mut self,
        start: usize,
        remove_count: usize,
        rows: Vec<LineRecord>,
        delta: isize,
    ) -> Result<()> {
        let len = self.records.len();
        if start > len || remove_count > len - start {
            return Err(EngineError::OutOfRange {
                index: start,
                length: remove_count,
                len,
            });
        }

        self.move_step_to(start);
        let step_delta = self.step.delta + delta;

        if remove_count == 1 && rows.len() == 1 {
            if let (Some(slot), Some(record)) = (self.records.get_mut(start), rows.into_iter().next()) {
                *slot = record;
            }
        } else {
            // The exact row at `start` survives an insertion and becomes a lagging row.
            if remove_count == 0
                && let Some(record) = self.records.get_mut(start)
            {
                record.index -= self.step.delta;
            }
            let inserted = rows.len();
            let rows = rows.into_iter().enumerate().map(|(i, mut record)| {
                if i > 0 {
                    record.index -= step_delta;
                }
                record
            });
            self.records.splice(start, remove_count, rows)?;
            if inserted == 0
                && let Some(record) = self.records.get_mut(start)
            {
                record.index += step_delta;
            }
        }

        let len = self.records.len();
        self.step = if len == 0 {
            Step::default()
        } else if start >= len {
            Step {
                row: len - 1,
                delta: 0,
            }
        } else {
            Step {
                row: start,
                delta: step_delta,
            }
        };
        self.last_row.set(start.min(len.saturating_sub(1)));
        Ok(())
    }

    /// Grow or shrink `row` by `delta` characters without re-splitting it.
    pub(crate) fn resize_row(&mut self, row: usize, delta: isize) -> Result<()> {
        let len = self.records.len();
        let record = self.records.get_mut(row).ok_or(EngineError::OutOfRange {
            index: row,
            length: 1,
            len,
        })?;
        let length = record.length as isize + delta;
        if length < 0 {
            return Err(EngineError::InvalidArgument("row would shrink below zero"));
        }
        record.length = length as usize;
        record.clear_layout();
        self.move_step_to(row);
        self.step.delta += delta;
        Ok(())
    }

    /// Append a row whose true head is its `index`.
    pub(crate) fn push(&mut self, mut record: LineRecord) {
        if self.records.is_empty() {
            self.step = Step::default();
        } else if self.step.row < self.records.len() {
            record.index -= self.step.delta;
        }
        self.records.append(std::iter::once(record));
    }

    /// Drop every row.
    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.step = Step::default();
        self.last_row.set(0);
    }
}

impl fmt::Debug for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowIndex")
            .field("rows", &self.records.len())
            .field("step", &self.step)
            .finish()
    }
}
