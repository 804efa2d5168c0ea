//! Line table: offsets, rows and per-row metadata.
//!
//! Rows are physical lines split at `\n` and, for very long lines, at the configured maximum
//! row length. After an edit only the rows the edit touches are re-split (widened to whole
//! physical lines); heads of later rows are deferred through the step bookkeeping in
//! [`RowIndex`]. A trailing empty row exists whenever the text ends with a line break so a caret
//! can sit after it.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::folding::{FoldingCollection, FoldingGenerator, FoldingStrategy};
use crate::gap_buffer::GapBuffer;
use crate::generator::{Clock, LineInfoGenerator};
use crate::highlight::{Highlighter, SyntaxHighlightGenerator};
use crate::rows::{LineRecord, RowIndex};
use crate::text_point::{TextPoint, TextRectangle};
use crate::text_store::NEW_LINE;
use std::sync::Arc;
use tracing::trace;
use unicode_width::UnicodeWidthChar;

/// Row table with folding and highlighting state.
#[derive(Debug)]
pub struct LineTable {
    rows: RowIndex,
    folding: FoldingGenerator,
    highlight: SyntaxHighlightGenerator,
    max_line_length: usize,
    freeze_dirty: bool,
}

impl LineTable {
    /// A table for an empty text: a single empty row.
    pub fn new(config: &EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let mut table = Self {
            rows: RowIndex::new(),
            folding: FoldingGenerator::new(clock.clone(), config.generate_quantum),
            highlight: SyntaxHighlightGenerator::new(clock, config.generate_quantum),
            max_line_length: config.max_line_length.max(1),
            freeze_dirty: false,
        };
        table.rows.push(LineRecord::new(0, 0, true, false));
        table
    }

    /// Number of rows, the trailing empty row included.
    pub fn line_count(&self) -> usize {
        self.rows.len()
    }

    /// The raw row records.
    pub fn rows(&self) -> &RowIndex {
        &self.rows
    }

    /// Mutable row records, for hosts attaching per-row state.
    pub fn rows_mut(&mut self) -> &mut RowIndex {
        &mut self.rows
    }

    /// Longest row before a physical line is split.
    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    fn out_of_rows(&self, row: usize) -> EngineError {
        EngineError::OutOfRange {
            index: row,
            length: 1,
            len: self.rows.len(),
        }
    }

    /// Absolute index of the first character of `row`.
    pub fn line_head_index(&self, row: usize) -> Result<usize> {
        self.rows.head(row).ok_or_else(|| self.out_of_rows(row))
    }

    /// Characters in `row`, terminator included.
    pub fn line_length(&self, row: usize) -> Result<usize> {
        self.rows.length(row).ok_or_else(|| self.out_of_rows(row))
    }

    /// Whether `row` ends in a line break or at the end of the text.
    pub fn line_end(&self, row: usize) -> Result<bool> {
        self.rows.line_end(row).ok_or_else(|| self.out_of_rows(row))
    }

    /// Text of `row`, terminator included.
    pub fn line_text(&self, text: &GapBuffer<char>, row: usize) -> Result<String> {
        let head = self.line_head_index(row)?;
        text.range_to_string(head, self.rows.length_of(row))
    }

    /// Row containing `index`. The text length maps to the last row.
    pub fn row_of_index(&self, index: usize) -> Result<usize> {
        self.rows.row_of(index).ok_or(EngineError::OutOfRange {
            index,
            length: 0,
            len: self.text_len(),
        })
    }

    fn text_len(&self) -> usize {
        match self.rows.len() {
            0 => 0,
            n => self.rows.head_of(n - 1) + self.rows.length_of(n - 1),
        }
    }

    /// Row and column of `index`.
    pub fn text_point_from_index(&self, index: usize) -> Result<TextPoint> {
        let row = self.row_of_index(index)?;
        Ok(TextPoint::new(row, index - self.rows.head_of(row)))
    }

    /// Absolute index of `point`.
    pub fn index_from_text_point(&self, point: TextPoint) -> Result<usize> {
        let head = self.line_head_index(point.row)?;
        let length = self.rows.length_of(point.row);
        if point.col > length {
            return Err(EngineError::OutOfRange {
                index: point.col,
                length: 0,
                len: length,
            });
        }
        Ok(head + point.col)
    }

    /// Rows and columns spanned by `[start, end]`.
    pub fn text_rectangle_from_index_pair(&self, start: usize, end: usize) -> Result<TextRectangle> {
        Ok(TextRectangle::new(
            self.text_point_from_index(start)?,
            self.text_point_from_index(end)?,
        ))
    }

    /// Whether `row` changed since [`LineTable::clear_dirty`].
    pub fn is_dirty(&self, row: usize) -> Result<bool> {
        self.rows
            .record(row)
            .map(LineRecord::is_dirty)
            .ok_or_else(|| self.out_of_rows(row))
    }

    /// Clear the dirty flag of `row`.
    pub fn clear_dirty(&mut self, row: usize) -> Result<()> {
        let err = self.out_of_rows(row);
        self.rows.record_mut(row).ok_or(err)?.set_dirty(false);
        Ok(())
    }

    /// While set, rows produced by an update are not marked dirty.
    pub fn set_freeze_dirty_flag(&mut self, freeze: bool) {
        self.freeze_dirty = freeze;
    }

    /// See [`LineTable::set_freeze_dirty_flag`].
    pub fn is_dirty_flag_frozen(&self) -> bool {
        self.freeze_dirty
    }

    /// Drop every cached layout.
    pub fn clear_layout_cache(&mut self) {
        for record in self.rows.records_mut() {
            record.clear_layout();
        }
    }

    /// Drop the cached layouts of the rows covering `[index, index + length)`.
    pub fn clear_layout_cache_range(&mut self, index: usize, length: usize) {
        let text_len = self.text_len();
        if index >= text_len {
            return;
        }
        let last = (index + length.max(1) - 1).min(text_len - 1);
        let (Some(start_row), Some(end_row)) = (self.rows.row_of(index), self.rows.row_of(last)) else {
            return;
        };
        for row in start_row..=end_row {
            if let Some(record) = self.rows.record_mut(row) {
                record.clear_layout();
            }
        }
    }

    /// The folding state.
    pub fn folding(&self) -> &FoldingGenerator {
        &self.folding
    }

    /// Mutable folding state.
    pub fn folding_mut(&mut self) -> &mut FoldingGenerator {
        &mut self.folding
    }

    /// The folds.
    pub fn folds(&self) -> &FoldingCollection {
        self.folding.folds()
    }

    /// Install or remove the folding strategy.
    pub fn set_folding_strategy(&mut self, strategy: Option<Box<dyn FoldingStrategy>>) {
        let clear = strategy.is_none();
        self.folding.set_strategy(strategy);
        if clear {
            self.folding.clear(&mut self.rows);
        }
    }

    /// The highlighting state.
    pub fn highlight(&self) -> &SyntaxHighlightGenerator {
        &self.highlight
    }

    /// Install or remove the highlighter. Removing it drops every span.
    pub fn set_highlighter(&mut self, highlighter: Option<Box<dyn Highlighter>>) {
        let clear = highlighter.is_none();
        self.highlight.set_highlighter(highlighter);
        if clear {
            self.highlight.clear(&mut self.rows);
        }
    }

    /// Re-run folding if due. Returns `true` if it ran.
    pub fn generate_folding(&mut self, text: &GapBuffer<char>, force: bool) -> bool {
        self.folding.generate(text, &mut self.rows, force)
    }

    /// Re-run highlighting if due. Returns `true` if it ran.
    pub fn highlight_all(&mut self, text: &GapBuffer<char>, force: bool) -> bool {
        self.highlight.generate(text, &mut self.rows, force)
    }

    /// Drop every fold.
    pub fn clear_folding(&mut self) {
        self.folding.clear(&mut self.rows);
    }

    /// Drop every highlighted span.
    pub fn clear_highlight(&mut self) {
        self.highlight.clear(&mut self.rows);
    }

    /// Whether a collapsed fold hides `row`.
    pub fn is_row_hidden(&self, row: usize) -> bool {
        match self.rows.head(row) {
            Some(head) => self.folds().is_hidden(head),
            None => false,
        }
    }

    /// Rows not hidden by a collapsed fold, in order.
    pub fn visible_rows(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.rows.len()).filter(|row| !self.is_row_hidden(*row))
    }

    /// Number of visible rows.
    pub fn fold_line_count(&self) -> usize {
        self.visible_rows().count()
    }

    /// Row shown at visible position `ordinal`.
    pub fn row_from_visible(&self, ordinal: usize) -> Option<usize> {
        self.visible_rows().nth(ordinal)
    }

    /// Visible position of `row`, or `None` while hidden.
    pub fn visible_from_row(&self, row: usize) -> Option<usize> {
        if row >= self.rows.len() || self.is_row_hidden(row) {
            return None;
        }
        Some((0..row).filter(|r| !self.is_row_hidden(*r)).count())
    }

    /// Re-split the rows touched by replacing `removed` chars at `index` with `inserted` chars.
    ///
    /// `text` is the buffer after the edit.
    pub(crate) fn update_as_replace(
        &mut self,
        text: &GapBuffer<char>,
        index: usize,
        removed: usize,
        inserted: usize,
    ) -> Result<()> {
        let (start_row, end_row) = self.remove_range(index, removed)?;
        let head = self.rows.head_of(start_row);
        let old_end = self.rows.head_of(end_row) + self.rows.length_of(end_row);
        let analyze_len = (index - head) + old_end.saturating_sub(index + removed) + inserted;

        let new_rows = self.create_line_list(text, head, analyze_len)?;
        let new_count = new_rows.len();
        let delta = inserted as isize - removed as isize;
        self.rows
            .replace_rows(start_row, end_row - start_row + 1, new_rows, delta)?;
        self.add_dummy_line(text);

        self.folding.update(index, inserted, removed);
        self.highlight.update(index, inserted, removed);
        trace!(
            target: "textdoc.lines",
            index,
            removed,
            inserted,
            start_row,
            end_row,
            new_rows = new_count,
            "update rows"
        );
        Ok(())
    }

    /// Resize `row` in place after an edit confined to it that did not add or remove breaks.
    pub(crate) fn update_line_as_replace(
        &mut self,
        row: usize,
        index: usize,
        removed: usize,
        inserted: usize,
    ) -> Result<()> {
        self.rows
            .resize_row(row, inserted as isize - removed as isize)?;
        let dirty = !self.freeze_dirty;
        if let Some(record) = self.rows.record_mut(row) {
            record.set_dirty(dirty);
            record.set_syntax(Vec::new());
        }
        self.folding.update(index, inserted, removed);
        self.highlight.update(index, inserted, removed);
        Ok(())
    }

    /// Widen `[index, index + removed]` to whole physical lines.
    fn remove_range(&self, index: usize, removed: usize) -> Result<(usize, usize)> {
        let mut start_row = self.row_of_index(index)?;
        while start_row > 0 && self.rows.line_end(start_row - 1) == Some(false) {
            start_row -= 1;
        }
        let mut end_row = self.row_of_index(index + removed)?;
        while end_row + 1 < self.rows.len() && self.rows.line_end(end_row) == Some(false) {
            end_row += 1;
        }
        Ok((start_row, end_row))
    }

    /// Split `length` chars at `head` into rows.
    fn create_line_list(&self, text: &GapBuffer<char>, head: usize, length: usize) -> Result<Vec<LineRecord>> {
        let dirty = !self.freeze_dirty;
        let mut rows = Vec::new();
        let mut line_head = head;
        let mut line_len = 0usize;
        let mut chars = text.iter_range(head, length)?.copied().peekable();

        while let Some(ch) = chars.next() {
            line_len += 1;
            // A combining mark stays with the character before it.
            let next_is_mark = chars
                .peek()
                .is_some_and(|n| *n != NEW_LINE && n.width() == Some(0));
            if ch == NEW_LINE || (line_len >= self.max_line_length && !next_is_mark) {
                rows.push(LineRecord::new(line_head, line_len, ch == NEW_LINE, dirty));
                line_head += line_len;
                line_len = 0;
            }
        }
        if line_len > 0 {
            rows.push(LineRecord::new(line_head, line_len, true, dirty));
        }
        if let Some(last) = rows.last_mut() {
            last.set_line_end(true);
        }
        Ok(rows)
    }

    /// Keep exactly one empty row after a trailing line break, and one row for an empty text.
    fn add_dummy_line(&mut self, text: &GapBuffer<char>) {
        if self.rows.is_empty() {
            self.rows.push(LineRecord::new(0, 0, true, false));
            return;
        }
        let last = self.rows.len() - 1;
        let length = self.rows.length_of(last);
        if length != 0 && text.last() == Some(&NEW_LINE) {
            let head = self.rows.head_of(last) + length;
            self.rows.push(LineRecord::new(head, 0, true, false));
        }
    }

    /// Back to a single empty row, dropping folds.
    pub(crate) fn clear(&mut self) {
        self.rows.clear();
        self.folding.clear(&mut self.rows);
        self.highlight.clear(&mut self.rows);
        self.rows.push(LineRecord::new(0, 0, true, false));
        trace!(target: "textdoc.lines", "clear rows");
    }

    /// Rebuild every row from `text`.
    pub(crate) fn rebuild(&mut self, text: &GapBuffer<char>) -> Result<()> {
        self.clear();
        self.update_as_replace(text, 0, 0, text.len())
    }

    /// Re-split every row from `text`, keeping folds. Syntax spans are dropped and the
    /// highlighter is marked stale.
    pub(crate) fn relayout(&mut self, text: &GapBuffer<char>) -> Result<()> {
        let rows = self.create_line_list(text, 0, text.len())?;
        self.rows.clear();
        for row in rows {
            self.rows.push(row);
        }
        self.add_dummy_line(text);
        self.highlight.update(0, 0, 0);
        trace!(target: "textdoc.lines", rows = self.rows.len(), "relayout");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ManualClock;
    use pretty_assertions::assert_eq;

    struct Fixture {
        text: GapBuffer<char>,
        table: LineTable,
    }

    impl Fixture {
        fn new(max_line_length: usize) -> Self {
            let config = EngineConfig {
                max_line_length,
                ..EngineConfig::default()
            };
            Self {
                text: GapBuffer::new(),
                table: LineTable::new(&config, Arc::new(ManualClock::new())),
            }
        }

        fn replace(&mut self, index: usize, removed: usize, inserted: &str) {
            let chars: Vec<char> = inserted.chars().collect();
            self.text.splice(index, removed, chars.iter().copied()).unwrap();
            self.table
                .update_as_replace(&self.text, index, removed, chars.len())
                .unwrap();
        }

        fn lines(&self) -> Vec<String> {
            (0..self.table.line_count())
                .map(|row| self.table.line_text(&self.text, row).unwrap())
                .collect()
        }
    }

    #[test]
    fn test_hello_world() {
        let mut f = Fixture::new(1000);
        f.replace(0, 0, "hello\nworld");
        assert_eq!(f.lines(), vec!["hello\n", "world"]);
        assert_eq!(f.table.text_point_from_index(6).unwrap(), TextPoint::new(1, 0));
        assert_eq!(f.table.index_from_text_point(TextPoint::new(1, 3)).unwrap(), 9);
    }

    #[test]
    fn test_trailing_break_adds_empty_row() {
        let mut f = Fixture::new(1000);
        f.replace(0, 0, "a");
        assert_eq!(f.table.line_count(), 1);
        f.replace(1, 0, "\n");
        assert_eq!(f.lines(), vec!["a\n", ""]);
        assert_eq!(f.table.text_point_from_index(2).unwrap(), TextPoint::new(1, 0));
        f.replace(2, 0, "b");
        assert_eq!(f.lines(), vec!["a\n", "b"]);
        f.replace(1, 2, "");
        assert_eq!(f.lines(), vec!["a"]);
        f.replace(0, 1, "");
        assert_eq!(f.lines(), vec![""]);
    }

    #[test]
    fn test_join_and_split_lines() {
        let mut f = Fixture::new(1000);
        f.replace(0, 0, "one\ntwo\nthree");
        f.replace(3, 1, " ");
        assert_eq!(f.lines(), vec!["one two\n", "three"]);
        f.replace(7, 1, "\n\n");
        assert_eq!(f.lines(), vec!["one two\n", "\n", "three"]);
        assert_eq!(f.table.line_head_index(2).unwrap(), 9);
    }

    #[test]
    fn test_long_lines_split_at_max_length() {
        let mut f = Fixture::new(4);
        f.replace(0, 0, "abcdefghij\nxy");
        assert_eq!(f.lines(), vec!["abcd", "efgh", "ij\n", "xy"]);
        assert!(!f.table.line_end(0).unwrap());
        // Editing a soft row re-splits its whole physical line.
        f.replace(1, 0, "Z");
        assert_eq!(f.lines(), vec!["aZbc", "defg", "hij\n", "xy"]);
    }

    #[test]
    fn test_combining_mark_not_split_from_base() {
        let mut f = Fixture::new(2);
        f.replace(0, 0, "abe\u{301}c");
        assert_eq!(f.lines(), vec!["ab", "e\u{301}", "c"]);
        let mut f = Fixture::new(3);
        f.replace(0, 0, "abe\u{301}c");
        assert_eq!(f.lines(), vec!["abe\u{301}", "c"]);
    }

    #[test]
    fn test_dirty_flags_and_freeze() {
        let mut f = Fixture::new(1000);
        f.replace(0, 0, "a\nb");
        assert!(f.table.is_dirty(0).unwrap());
        f.table.clear_dirty(0).unwrap();
        assert!(!f.table.is_dirty(0).unwrap());
        f.table.set_freeze_dirty_flag(true);
        f.replace(0, 0, "x");
        assert!(!f.table.is_dirty(0).unwrap());
    }

    #[test]
    fn test_update_line_as_replace_resizes_in_place() {
        let mut f = Fixture::new(1000);
        f.replace(0, 0, "foo\nfoo\n");
        f.text.splice(4, 3, "quux".chars()).unwrap();
        f.table.update_line_as_replace(1, 4, 3, 4).unwrap();
        assert_eq!(f.lines(), vec!["foo\n", "quux\n", ""]);
        assert_eq!(f.table.line_head_index(2).unwrap(), 9);
    }

    #[test]
    fn test_out_of_range() {
        let mut f = Fixture::new(1000);
        f.replace(0, 0, "abc");
        assert!(f.table.text_point_from_index(4).is_err());
        assert!(f.table.index_from_text_point(TextPoint::new(0, 4)).is_err());
        assert!(f.table.index_from_text_point(TextPoint::new(1, 0)).is_err());
        assert!(f.table.line_text(&f.text, 3).is_err());
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let mut f = Fixture::new(3);
        f.replace(0, 0, "ab\ncdefg\n");
        f.replace(4, 2, "");
        let incremental = f.lines();
        f.table.rebuild(&f.text).unwrap();
        assert_eq!(f.lines(), incremental);
    }
}
