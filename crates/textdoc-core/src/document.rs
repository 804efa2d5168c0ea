//! The document facade.
//!
//! [`Document`] owns the text store, line table, undo log, markers, folds and selections and
//! is the single mutation entry point. Every edit runs in the same order:
//!
//! ```text
//! validate -> drop markers under the edit -> buffer mutation -> undo push
//!          -> line table update -> marker/selection shift -> update listeners
//! ```
//!
//! Folding and highlighting are not re-run on the edit path; call
//! [`Document::update_line_info`] before drawing.

use crate::cancel::CancelToken;
use crate::config::{EngineConfig, IndentMode, LineBreakMethod};
use crate::error::{EngineError, Result, check_range};
use crate::events::{
    DocumentUpdate, Listeners, ProgressEvent, ProgressKind, StatusKind, SubscriptionId,
};
use crate::folding::{FoldingCollection, FoldingItem, FoldingStrategy};
use crate::gap_buffer::GapBuffer;
use crate::generator::{Clock, SystemClock};
use crate::highlight::Highlighter;
use crate::layout::MonospaceRender;
use crate::line_table::LineTable;
use crate::markers::{Color, HilightType, Marker, MarkerCollection, MarkerIds, MarkerPattern, MarkerPatternSet, RegexMarkerPattern};
use crate::ranges::{SelectCollection, Selection, TextRange};
use crate::render::{LayoutInput, TextLayout, TextRender};
use crate::search::{FindParams, SearchCursor, SearchOptions, SearchResult};
use crate::text_point::{TextPoint, TextRectangle};
use crate::text_store::{NEW_LINE, QuickSearch, TextStore};
use crate::undo::{Command, ReplaceCommand, UndoManager, UndoTarget};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};
use unicode_segmentation::UnicodeSegmentation;

/// Display flags. Not copied by [`Document::from_document`].
#[derive(Debug, Clone, PartialEq)]
struct DocumentFlags {
    tab_stops: usize,
    line_break: LineBreakMethod,
    line_break_char_count: usize,
    page_width: Option<f64>,
    right_to_left: bool,
    show_full_space: bool,
    show_half_space: bool,
    show_tab: bool,
    show_line_break: bool,
    insert_mode: bool,
    hide_caret: bool,
    hide_line_marker: bool,
    hide_ruler: bool,
    draw_line_number: bool,
    url_mark: bool,
    rect_selection: bool,
    indent_mode: IndentMode,
}

impl DocumentFlags {
    fn new(config: &EngineConfig) -> Self {
        Self {
            tab_stops: config.tab_width,
            line_break: LineBreakMethod::None,
            line_break_char_count: 80,
            page_width: None,
            right_to_left: false,
            show_full_space: false,
            show_half_space: false,
            show_tab: false,
            show_line_break: false,
            insert_mode: true,
            hide_caret: false,
            hide_line_marker: true,
            hide_ruler: true,
            draw_line_number: false,
            url_mark: false,
            rect_selection: false,
            indent_mode: IndentMode::Tab,
        }
    }
}

/// A text document.
pub struct Document {
    store: TextStore,
    table: LineTable,
    undo: UndoManager,
    markers: MarkerCollection,
    patterns: MarkerPatternSet,
    selections: SelectCollection,
    render: Box<dyn TextRender>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    flags: DocumentFlags,
    caret: TextPoint,
    anchor: usize,
    dirty: bool,
    fire_update: bool,
    find: Option<FindParams>,
    update_listeners: Listeners<DocumentUpdate>,
    status_listeners: Listeners<StatusKind>,
    progress_listeners: Listeners<ProgressEvent>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// An empty document.
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// An empty document whose generators are throttled against `clock`.
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: TextStore::new(),
            table: LineTable::new(&config, clock.clone()),
            undo: UndoManager::new(),
            markers: MarkerCollection::new(),
            patterns: MarkerPatternSet::new(),
            selections: SelectCollection::new(),
            render: Box::new(MonospaceRender::new()),
            flags: DocumentFlags::new(&config),
            config,
            clock,
            caret: TextPoint::default(),
            anchor: 0,
            dirty: false,
            fire_update: true,
            find: None,
            update_listeners: Listeners::new(),
            status_listeners: Listeners::new(),
            progress_listeners: Listeners::new(),
        }
    }

    /// A document holding a copy of `other`'s text and configuration. Flags, history, markers
    /// and folds are not copied.
    pub fn from_document(other: &Document) -> Result<Self> {
        let mut doc = Self::with_clock(other.config.clone(), other.clock.clone());
        doc.store.restore(other.store.snapshot()?)?;
        doc.rebuild_rows()?;
        Ok(doc)
    }

    /// A document holding `text`.
    pub fn from_text(text: &str) -> Result<Self> {
        let mut doc = Self::new();
        doc.store = TextStore::from_text(text);
        doc.rebuild_rows()?;
        Ok(doc)
    }

    fn rebuild_rows(&mut self) -> Result<()> {
        let text = self.store.read()?;
        self.table.rebuild(&text)
    }

    /// The configuration the document was created with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- text access ----

    /// Number of characters.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns `true` when the document holds no text.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// The underlying store. Clones share the buffer.
    pub fn store(&self) -> &TextStore {
        &self.store
    }

    /// Character at `index`.
    pub fn char_at(&self, index: usize) -> Result<char> {
        self.store.char_at(index)
    }

    /// Copy `length` characters starting at `index`.
    pub fn to_string_range(&self, index: usize, length: usize) -> Result<String> {
        self.store.to_string_range(index, length)
    }

    /// The whole text.
    pub fn text(&self) -> Result<String> {
        self.store.to_string_range(0, self.len())
    }

    /// Text of `row`, terminator included.
    pub fn get_line_text(&self, row: usize) -> Result<String> {
        let text = self.store.read()?;
        self.table.line_text(&text, row)
    }

    /// Find `target` at or after `start` with QuickSearch.
    pub fn index_of(&self, target: &str, start: usize, ci: bool) -> Result<Option<usize>> {
        self.store.index_of(target, start, ci)
    }

    /// The run around `index` bounded by characters for which `is_separator` holds.
    ///
    /// Returns `(start, end)` with `end` exclusive, or `None` at or past the end of the text.
    pub fn get_separator<F>(&self, index: usize, is_separator: F) -> Result<Option<(usize, usize)>>
    where
        F: Fn(char) -> bool,
    {
        let text = self.store.read()?;
        if index >= text.len() {
            return Ok(None);
        }
        let mut start = index;
        while start > 0 && !is_separator(text[start]) {
            start -= 1;
        }
        if is_separator(text[start]) {
            start += 1;
        }
        let mut end = index;
        while end < text.len() && !is_separator(text[end]) {
            end += 1;
        }
        Ok(Some((start.min(end), end)))
    }

    /// A reader over a snapshot of the current text.
    pub fn reader(&self) -> Result<DocumentReader> {
        Ok(DocumentReader::new(self.store.snapshot()?))
    }

    // ---- line table ----

    /// The line table.
    pub fn line_table(&self) -> &LineTable {
        &self.table
    }

    /// Mutable line table, for per-row host state such as dirty flags and layouts.
    pub fn line_table_mut(&mut self) -> &mut LineTable {
        &mut self.table
    }

    /// Number of rows.
    pub fn line_count(&self) -> usize {
        self.table.line_count()
    }

    /// Row and column of `index`.
    pub fn text_point_from_index(&self, index: usize) -> Result<TextPoint> {
        self.table.text_point_from_index(index)
    }

    /// Absolute index of `point`.
    pub fn index_from_text_point(&self, point: TextPoint) -> Result<usize> {
        self.table.index_from_text_point(point)
    }

    // ---- editing ----

    /// Replace `length` characters at `index` with `text`.
    ///
    /// The edit is recorded for undo; markers touching the edited range are dropped.
    pub fn replace(&mut self, index: usize, length: usize, text: &str) -> Result<()> {
        check_range(index, length, self.len())?;
        if length == 0 && text.is_empty() {
            return Ok(());
        }
        let ids: Vec<i32> = self.markers.ids().collect();
        for id in ids {
            self.markers.remove_all_in(id, index, length);
        }
        let chars: Vec<char> = text.chars().collect();
        self.apply_replace(index, length, &chars, true)
    }

    fn apply_replace(&mut self, index: usize, remove_len: usize, chars: &[char], record: bool) -> Result<()> {
        let caret_before = self.caret_index()?;
        let removed = self.store.replace(index, remove_len, chars)?;
        if record {
            self.undo.push(Command::Replace(ReplaceCommand::new(
                index,
                removed,
                chars.to_vec(),
                caret_before,
            )));
        }
        {
            let text = self.store.read()?;
            self.table
                .update_as_replace(&text, index, remove_len, chars.len())?;
        }
        self.after_edit(DocumentUpdate::replace(index, remove_len, chars.len()));
        Ok(())
    }

    /// Bookkeeping shared by every edit once the rows are up to date.
    fn after_edit(&mut self, update: DocumentUpdate) {
        self.markers
            .update_markers(update.start_index, update.inserted_length, update.removed_length);
        self.selections.shift(
            update.start_index,
            update.removed_length,
            update.inserted_length,
        );
        self.set_dirty(true);
        self.clamp_caret();
        self.notify_update(update);
    }

    /// Drop all text, history, markers and selections. Clears the dirty flag.
    pub fn clear(&mut self) -> Result<()> {
        let removed = self.store.clear()?;
        self.table.clear();
        self.markers.clear();
        self.selections.clear();
        self.undo.clear();
        self.caret = TextPoint::default();
        self.anchor = 0;
        self.notify_update(DocumentUpdate::clear(removed));
        self.set_dirty(false);
        Ok(())
    }

    /// Re-layout. `quick` only drops cached layouts; otherwise every row is re-split from the
    /// buffer without marking rows dirty, folds are kept and a rebuild event is fired.
    pub fn perform_layout(&mut self, quick: bool) -> Result<()> {
        if quick {
            self.table.clear_layout_cache();
            return Ok(());
        }
        self.table.set_freeze_dirty_flag(true);
        let rebuilt = match self.store.read() {
            Ok(text) => self.table.relayout(&text),
            Err(err) => Err(err),
        };
        self.table.set_freeze_dirty_flag(false);
        rebuilt?;
        self.clamp_caret();
        self.notify_update(DocumentUpdate::rebuild_layout(self.len()));
        Ok(())
    }

    // ---- undo ----

    /// The undo log.
    pub fn undo_manager(&self) -> &UndoManager {
        &self.undo
    }

    /// Mutable undo log, for grouping and locking.
    pub fn undo_manager_mut(&mut self) -> &mut UndoManager {
        &mut self.undo
    }

    /// Undo the last command or group. Returns `false` if there was nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        let mut undo = std::mem::take(&mut self.undo);
        let result = undo.undo(self);
        self.undo = undo;
        result
    }

    /// Redo the last undone command or group.
    pub fn redo(&mut self) -> Result<bool> {
        let mut undo = std::mem::take(&mut self.undo);
        let result = undo.redo(self);
        self.undo = undo;
        result
    }

    // ---- caret and selection ----

    /// Caret position.
    pub fn caret_position(&self) -> TextPoint {
        self.caret
    }

    /// Move the caret. `point` must address an existing row and a column within it.
    pub fn set_caret_position(&mut self, point: TextPoint) -> Result<()> {
        self.table.index_from_text_point(point)?;
        if self.caret != point {
            self.caret = point;
            self.notify_status(StatusKind::CaretPosition);
        }
        Ok(())
    }

    /// Absolute index of the caret.
    pub fn caret_index(&self) -> Result<usize> {
        self.table.index_from_text_point(self.caret)
    }

    fn clamp_caret(&mut self) {
        let last = self.table.line_count().saturating_sub(1);
        let row = self.caret.row.min(last);
        let col = self.caret.col.min(self.table.line_length(row).unwrap_or(0));
        let point = TextPoint::new(row, col);
        if point != self.caret {
            self.caret = point;
            self.notify_status(StatusKind::CaretPosition);
        }
        if self.anchor > self.len() {
            self.anchor = self.len();
            self.notify_status(StatusKind::AnchorIndex);
        }
    }

    /// Where a selection started.
    pub fn anchor_index(&self) -> usize {
        self.anchor
    }

    /// Move the selection anchor.
    pub fn set_anchor_index(&mut self, index: usize) -> Result<()> {
        check_range(index, 0, self.len())?;
        if self.anchor != index {
            self.anchor = index;
            self.notify_status(StatusKind::AnchorIndex);
        }
        Ok(())
    }

    /// Current selections, sorted by start.
    pub fn selections(&self) -> &SelectCollection {
        &self.selections
    }

    fn require_update_events(&self) -> Result<()> {
        if self.fire_update {
            Ok(())
        } else {
            Err(EngineError::InvalidOperation("selection changes need update events enabled"))
        }
    }

    fn reset_selections(&mut self) {
        let old: Vec<Selection> = self.selections.iter().copied().collect();
        for sel in old {
            self.table.clear_layout_cache_range(sel.start, sel.length);
        }
        self.selections.clear();
    }

    /// Select `length` characters from `start`; a negative length selects backwards.
    ///
    /// In rectangle mode the range's corners span a rectangle and every row in it gets its own
    /// selection, clamped to the row's text.
    pub fn select(&mut self, start: usize, length: isize) -> Result<()> {
        self.require_update_events()?;
        let (start, length) = normalize_selection(start, length, self.len())?;
        self.reset_selections();
        if length != 0 {
            if self.flags.rect_selection {
                let rect = self
                    .table
                    .text_rectangle_from_index_pair(start, start + length)?;
                self.select_by_rectangle(rect)?;
            } else {
                self.selections.add(Selection::new(start, length as isize));
            }
            self.table.clear_layout_cache_range(start, length);
        }
        self.notify_status(StatusKind::Selection);
        Ok(())
    }

    /// Rectangle selection from `point` to `width` columns right and `height` rows down.
    pub fn select_rect(&mut self, point: TextPoint, width: usize, height: usize) -> Result<()> {
        self.require_update_events()?;
        if !self.flags.rect_selection {
            return Err(EngineError::InvalidOperation("rectangle selection is off"));
        }
        let bottom = point.row + height;
        if bottom >= self.table.line_count() {
            return Err(EngineError::OutOfRange {
                index: bottom,
                length: 1,
                len: self.table.line_count(),
            });
        }
        self.reset_selections();
        let corner = TextPoint::new(bottom, point.col + width);
        self.select_by_rectangle(TextRectangle::new(point, corner))?;
        self.notify_status(StatusKind::Selection);
        Ok(())
    }

    fn select_by_rectangle(&mut self, rect: TextRectangle) -> Result<()> {
        let top = rect.top_left();
        let bottom = rect.bottom_right();
        for row in top.row..=bottom.row {
            let last_col = self.row_content_length(row)?;
            let left = top.col.min(last_col);
            let right = bottom.col.min(last_col);
            let start = self.table.index_from_text_point(TextPoint::new(row, left))?;
            let end = self.table.index_from_text_point(TextPoint::new(row, right))?;
            self.selections
                .add(Selection::new(start, end as isize - start as isize));
            self.table.clear_layout_cache_range(start, end - start);
        }
        Ok(())
    }

    /// Length of `row` without its line break.
    fn row_content_length(&self, row: usize) -> Result<usize> {
        let length = self.table.line_length(row)?;
        let head = self.table.line_head_index(row)?;
        if length > 0 && self.store.char_at(head + length - 1)? == NEW_LINE {
            Ok(length - 1)
        } else {
            Ok(length)
        }
    }

    /// Select the word at `index`, using Unicode word boundaries.
    pub fn select_word(&mut self, index: usize, change_anchor: bool) -> Result<()> {
        self.require_update_events()?;
        if index >= self.len() {
            return Ok(());
        }
        let row = self.table.row_of_index(index)?;
        let head = self.table.line_head_index(row)?;
        let line = self.get_line_text(row)?;
        let col = index - head;

        let mut char_pos = 0usize;
        let mut bounds = None;
        for word in line.split_word_bounds() {
            let len = word.chars().count();
            if col < char_pos + len {
                bounds = Some((head + char_pos, len));
                break;
            }
            char_pos += len;
        }
        let Some((start, length)) = bounds else {
            return Ok(());
        };
        self.select(start, length as isize)?;
        if change_anchor {
            self.set_anchor_index(start)?;
        }
        Ok(())
    }

    /// Select the physical line around `index`, without its line break.
    pub fn select_line(&mut self, index: usize, change_anchor: bool) -> Result<()> {
        self.require_update_events()?;
        let Some((start, end)) = self.get_separator(index, |c| c == NEW_LINE)? else {
            return Ok(());
        };
        self.select(start, (end - start) as isize)?;
        if change_anchor {
            self.set_anchor_index(start)?;
        }
        Ok(())
    }

    /// The selected text. Rectangle selections are joined with line breaks.
    pub fn selected_text(&self) -> Result<String> {
        let mut parts = Vec::with_capacity(self.selections.len());
        for sel in &self.selections {
            parts.push(self.store.to_string_range(sel.start, sel.length)?);
        }
        if self.flags.rect_selection {
            Ok(parts.join("\n"))
        } else {
            Ok(parts.into_iter().next().unwrap_or_default())
        }
    }

    /// Replace the selection with `text`.
    ///
    /// In stream mode the first selection is replaced, or `text` is inserted at the anchor
    /// when nothing is selected. In rectangle mode every row's selection is replaced inside
    /// one undo group; with an empty rectangle the lines of `text` are inserted at the same
    /// column on successive rows, appending rows once the document runs out.
    pub fn replace_selection(&mut self, text: &str) -> Result<()> {
        if !self.flags.rect_selection {
            let (start, length) = match self.selections.first() {
                Some(sel) => (sel.start, sel.length),
                None => (self.anchor, 0),
            };
            self.replace(start, length, text)?;
            self.reset_selections();
            let caret = self
                .table
                .text_point_from_index(start + text.chars().count())?;
            return self.set_caret_position(caret);
        }

        self.require_update_events()?;
        self.undo.begin_undo_group();
        let result = if self.selections.iter().all(|s| s.length == 0) {
            self.insert_rect_lines(text)
        } else {
            self.replace_rect_selections(text)
        };
        let ended = self.undo.end_undo_group();
        result?;
        ended?;
        self.notify_status(StatusKind::Selection);
        Ok(())
    }

    fn replace_rect_selections(&mut self, text: &str) -> Result<()> {
        let sels: Vec<Selection> = self.selections.iter().copied().collect();
        let text_len = text.chars().count() as isize;
        // Back to front so earlier offsets stay valid.
        for sel in sels.iter().rev() {
            self.replace(sel.start, sel.length, text)?;
        }

        self.selections.clear();
        let mut shift = 0isize;
        for sel in &sels {
            let at = (sel.start as isize + shift + text_len) as usize;
            self.selections.add(Selection::new(at, 0));
            shift += text_len - sel.length as isize;
        }
        Ok(())
    }

    fn insert_rect_lines(&mut self, text: &str) -> Result<()> {
        let origin = match self.selections.first() {
            Some(sel) => sel.start,
            None => self.anchor,
        };
        let mut point = self.table.text_point_from_index(origin)?;
        let lines: Vec<&str> = text.split(NEW_LINE).filter(|l| !l.is_empty()).collect();

        let mut inserted = 0usize;
        while inserted < lines.len() && point.row < self.table.line_count() {
            let col = point.col.min(self.row_content_length(point.row)?);
            let index = self
                .table
                .index_from_text_point(TextPoint::new(point.row, col))?;
            self.replace(index, 0, lines[inserted])?;
            inserted += 1;
            point.row += 1;
        }
        for line in &lines[inserted..] {
            let appended = format!("{NEW_LINE}{line}");
            self.replace(self.len(), 0, &appended)?;
        }
        self.selections.clear();
        Ok(())
    }

    // ---- markers ----

    /// Every marker, by id.
    pub fn markers(&self) -> &MarkerCollection {
        &self.markers
    }

    /// Add `marker` under `id`.
    pub fn set_marker(&mut self, id: i32, marker: Marker) -> Result<()> {
        check_range(marker.start, marker.length, self.len())?;
        self.markers.add(id, marker);
        self.table
            .clear_layout_cache_range(marker.start, marker.length);
        Ok(())
    }

    /// Drop the markers under `id` touching `[start, start + length)`.
    pub fn remove_marker(&mut self, id: i32, start: usize, length: usize) -> Result<()> {
        check_range(start, length, self.len())?;
        self.markers.remove_all_in(id, start, length);
        self.table.clear_layout_cache_range(start, length);
        Ok(())
    }

    /// Drop the markers under `id` drawn as `hilight`.
    pub fn remove_marker_type(&mut self, id: i32, hilight: HilightType) {
        self.markers.remove_all_of_type(id, hilight);
        self.table.clear_layout_cache();
    }

    /// Drop every marker under `id`.
    pub fn remove_all_markers(&mut self, id: i32) {
        self.markers.clear_id(id);
        self.table.clear_layout_cache();
    }

    /// Markers under `id` at `index`.
    pub fn get_markers(&self, id: i32, index: usize) -> Result<Vec<Marker>> {
        check_range(index, 0, self.len())?;
        Ok(self.markers.get_range(id, index, 0))
    }

    /// Install a watchdog pattern that marks every row it matches at layout time.
    pub fn add_marker_pattern<P: MarkerPattern + 'static>(&mut self, id: i32, pattern: P) {
        self.patterns.add(id, pattern);
        self.table.clear_layout_cache();
    }

    /// Remove the watchdog pattern under `id`.
    pub fn remove_marker_pattern(&mut self, id: i32) -> bool {
        let removed = self.patterns.remove(id);
        if removed {
            self.table.clear_layout_cache();
        }
        removed
    }

    // ---- folding and highlighting ----

    /// Install or remove the folding strategy.
    pub fn set_folding_strategy(&mut self, strategy: Option<Box<dyn FoldingStrategy>>) {
        self.table.set_folding_strategy(strategy);
        self.table.clear_layout_cache();
    }

    /// Install or remove the highlighter.
    pub fn set_highlighter(&mut self, highlighter: Option<Box<dyn Highlighter>>) {
        self.table.set_highlighter(highlighter);
        self.table.clear_layout_cache();
    }

    /// Re-run folding and highlighting if they are due (or always, with `force`).
    ///
    /// Returns `true` if either generator ran.
    pub fn update_line_info(&mut self, force: bool) -> Result<bool> {
        let (folded, highlighted) = {
            let text = self.store.read()?;
            let folded = self.table.generate_folding(&text, force);
            let highlighted = self.table.highlight_all(&text, force);
            (folded, highlighted)
        };
        if folded {
            self.table.clear_layout_cache();
            self.notify_status(StatusKind::Folding);
        }
        Ok(folded || highlighted)
    }

    /// The folds.
    pub fn folds(&self) -> &FoldingCollection {
        self.table.folds()
    }

    /// The fold starting closest before `index` among those covering it.
    pub fn fold_at(&self, index: usize) -> Option<FoldingItem> {
        self.table.folds().get(index, 1)
    }

    /// Expand `item` and the folds overlapping it.
    pub fn expand_fold(&mut self, item: &FoldingItem) -> bool {
        let changed = self.table.folding_mut().folds_mut().expand(item);
        self.after_fold_change(changed, item)
    }

    /// Collapse `item` and the folds nested in it.
    pub fn collapse_fold(&mut self, item: &FoldingItem) -> bool {
        let changed = self.table.folding_mut().folds_mut().collapse(item);
        self.after_fold_change(changed, item)
    }

    fn after_fold_change(&mut self, changed: bool, item: &FoldingItem) -> bool {
        if changed {
            self.table
                .clear_layout_cache_range(item.start(), item.end() - item.start() + 1);
            self.notify_status(StatusKind::Folding);
        }
        changed
    }

    /// `true` if a collapsed fold hides `index`.
    pub fn is_hidden(&self, index: usize) -> bool {
        self.table.folds().is_hidden(index)
    }

    // ---- layout ----

    /// Replace the renderer. Every cached layout is dropped.
    pub fn set_render(&mut self, render: Box<dyn TextRender>) {
        self.render = render;
        self.table.clear_layout_cache();
    }

    /// The renderer.
    pub fn render(&self) -> &dyn TextRender {
        self.render.as_ref()
    }

    /// Layout of `row`, built on first use and cached until the row changes.
    pub fn layout(&mut self, row: usize) -> Result<&dyn TextLayout> {
        let cached = self
            .table
            .rows()
            .record(row)
            .ok_or(EngineError::OutOfRange {
                index: row,
                length: 1,
                len: self.table.line_count(),
            })?
            .layout()
            .is_some();

        if !cached {
            let layout = self.create_layout(row)?;
            if let Some(record) = self.table.rows_mut().record_mut(row) {
                record.set_layout(layout);
            }
        }

        self.table
            .rows()
            .record(row)
            .and_then(|record| record.layout())
            .ok_or(EngineError::InvalidOperation("renderer produced an invalid layout"))
    }

    fn create_layout(&self, row: usize) -> Result<Box<dyn TextLayout>> {
        let head = self.table.line_head_index(row)?;
        let length = self.table.line_length(row)?;
        let text = self.get_line_text(row)?;

        let mut markers: Vec<Marker> = self.markers.get_all_in(head, length);
        markers.extend(self.patterns.markers(head, &text));
        let markers: Vec<Marker> = markers
            .iter()
            .filter_map(|m| m.to_relative(head, length))
            .collect();
        let selections: Vec<Selection> = self
            .selections
            .get(head, length)
            .filter_map(|s| s.to_relative(head, length))
            .collect();
        let syntax = self
            .table
            .rows()
            .record(row)
            .map(|r| r.syntax().to_vec())
            .unwrap_or_default();

        let wrap_width = match self.flags.line_break {
            LineBreakMethod::None => None,
            LineBreakMethod::PageBound => self.flags.page_width,
            LineBreakMethod::CharUnit => {
                Some(self.flags.line_break_char_count as f64 * self.render.em_width())
            }
        };

        Ok(self.render.create_layout(LayoutInput {
            text: &text,
            syntax: &syntax,
            markers: &markers,
            selections: &selections,
            wrap_width,
            tab_width: self.flags.tab_stops,
        }))
    }

    // ---- load / save ----

    /// Replace the document's text with the contents of `reader`.
    ///
    /// The document is cleared first. Progress listeners see a `Begin` and an `End` event.
    /// On cancellation the rows describe the partially loaded text and
    /// [`EngineError::Cancelled`] is returned; the caller should discard or reset it.
    pub async fn load<R>(&mut self, reader: R, cancel: &CancelToken) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        self.progress_listeners
            .notify(&ProgressEvent::Begin(ProgressKind::Load));
        let result = self.load_inner(reader, cancel).await;
        self.progress_listeners.notify(&ProgressEvent::End {
            kind: ProgressKind::Load,
            completed: result.is_ok(),
        });
        result
    }

    async fn load_inner<R>(&mut self, reader: R, cancel: &CancelToken) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        self.clear()?;
        let loaded = self
            .store
            .load(reader, cancel, self.config.load_chunk_size)
            .await;
        self.rebuild_rows()?;
        self.notify_update(DocumentUpdate::rebuild_layout(self.len()));
        self.set_dirty(false);
        debug!(target: "textdoc.store", len = self.len(), rows = self.line_count(), "document loaded");
        loaded
    }

    /// Write the text to `writer` using the configured line ending. Returns the lines written.
    pub async fn save<W>(&mut self, writer: W, cancel: &CancelToken) -> Result<usize>
    where
        W: AsyncWrite + Unpin,
    {
        self.progress_listeners
            .notify(&ProgressEvent::Begin(ProgressKind::Save));
        let result = self
            .store
            .save(writer, self.config.line_ending, cancel)
            .await;
        self.progress_listeners.notify(&ProgressEvent::End {
            kind: ProgressKind::Save,
            completed: result.is_ok(),
        });
        if result.is_ok() {
            self.set_dirty(false);
        }
        result
    }

    /// The line break written on save.
    pub fn line_ending(&self) -> crate::line_ending::LineEnding {
        self.config.line_ending
    }

    /// Change the line break written on save.
    pub fn set_line_ending(&mut self, line_ending: crate::line_ending::LineEnding) {
        self.config.line_ending = line_ending;
    }

    // ---- search ----

    /// Compile the pattern used by [`Document::find`] and [`Document::replace_all`].
    pub fn set_find_param(&mut self, pattern: &str, use_regex: bool, options: SearchOptions) -> Result<()> {
        self.find = Some(FindParams::new(pattern, use_regex, options)?);
        Ok(())
    }

    fn find_params(&self) -> Result<&FindParams> {
        self.find
            .as_ref()
            .ok_or(EngineError::InvalidOperation("set_find_param was not called"))
    }

    /// A marker pattern highlighting every hit of the current find pattern.
    pub fn find_marker_pattern(&self, hilight: HilightType, color: Color) -> Result<RegexMarkerPattern> {
        Ok(self.find_params()?.marker_pattern(hilight, color))
    }

    /// Start a search over `[start, start + length)`.
    ///
    /// Step it with [`Document::find_next`]; the hit just returned may be replaced between
    /// steps.
    pub fn find(&self, start: usize, length: usize) -> Result<SearchCursor> {
        self.find_params()?;
        check_range(start, length, self.len())?;
        Ok(SearchCursor::new(start, start + length, self.len()))
    }

    /// Next hit of `cursor`.
    pub fn find_next(&self, cursor: &mut SearchCursor) -> Result<Option<SearchResult>> {
        let params = self.find_params()?;
        let text = self.store.read()?;
        cursor.next_in(params, &text)
    }

    /// Every hit in the document.
    pub fn find_all(&self) -> Result<Vec<SearchResult>> {
        let mut cursor = self.find(0, self.len())?;
        let mut hits = Vec::new();
        while let Some(hit) = self.find_next(&mut cursor)? {
            hits.push(hit);
        }
        Ok(hits)
    }

    /// `replacement` expanded with `result`'s groups.
    pub fn expand_replacement(&self, result: &SearchResult, replacement: &str) -> Result<String> {
        Ok(self.find_params()?.expand(result, replacement))
    }

    /// Replace every hit of the current pattern, row by row, as one undo step.
    ///
    /// With `group_replace` the replacement may reference capture groups. Each rewritten row
    /// fires its own update event.
    pub fn replace_all(&mut self, replacement: &str, group_replace: bool) -> Result<usize> {
        let params = self.find_params()?.clone();
        let snapshot = self.store.snapshot()?;
        let rows = self.rewrite_rows(|line| params.replace_line(line, replacement, group_replace))?;
        if rows > 0 {
            self.undo.push(Command::ReplaceAll(snapshot));
        }
        debug!(target: "textdoc.search", rows, "replace_all");
        Ok(rows)
    }

    /// Replace every occurrence of `target` with `replacement`, as one undo step.
    ///
    /// Uses QuickSearch; `ci` folds ASCII letters only.
    pub fn replace_all_literal(&mut self, target: &str, replacement: &str, ci: bool) -> Result<usize> {
        let search = QuickSearch::new(target, ci)?;
        let snapshot = self.store.snapshot()?;
        let rows = self.rewrite_rows(|line| {
            let chars: GapBuffer<char> = line.into();
            let hits = search.find_all(&chars, 0, chars.len());
            if hits.is_empty() {
                return None;
            }
            let mut out = String::with_capacity(line.len());
            let mut at = 0usize;
            for hit in hits {
                out.extend(chars.iter_range(at, hit - at).ok()?);
                out.push_str(replacement);
                at = hit + search.len();
            }
            out.extend(chars.iter_range(at, chars.len() - at).ok()?);
            Some(out)
        })?;
        if rows > 0 {
            self.undo.push(Command::FastReplaceAll(snapshot));
        }
        debug!(target: "textdoc.search", rows, "replace_all_literal");
        Ok(rows)
    }

    /// Walk the text row by row, replacing each row's unvisited tail with `rewrite`'s output.
    ///
    /// Returns how many rows changed.
    fn rewrite_rows<F>(&mut self, mut rewrite: F) -> Result<usize>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut pos = 0usize;
        let mut changed = 0usize;
        while pos < self.len() {
            let row = self.table.row_of_index(pos)?;
            let row_end = self.table.line_head_index(row)? + self.table.line_length(row)?;
            let segment_len = row_end - pos;
            let segment = self.store.to_string_range(pos, segment_len)?;
            match rewrite(&segment) {
                Some(output) => {
                    let chars: Vec<char> = output.chars().collect();
                    self.replace_in_row(row, pos, segment_len, &chars)?;
                    pos += chars.len();
                    changed += 1;
                }
                None => pos = row_end,
            }
            if segment_len == 0 {
                break;
            }
        }
        Ok(changed)
    }

    /// Replace inside `row` without recording undo, resizing the row in place when its break
    /// structure is unchanged.
    fn replace_in_row(&mut self, row: usize, index: usize, remove_len: usize, chars: &[char]) -> Result<()> {
        let removed = self.store.replace(index, remove_len, chars)?;
        let new_len = self.table.line_length(row)? + chars.len() - removed.len();
        let in_place = self.table.line_end(row)?
            && new_len > 0
            && new_len <= self.table.max_line_length()
            && same_break_shape(&removed, chars);
        if in_place {
            self.table
                .update_line_as_replace(row, index, removed.len(), chars.len())?;
        } else {
            let text = self.store.read()?;
            self.table
                .update_as_replace(&text, index, removed.len(), chars.len())?;
        }
        trace!(target: "textdoc.search", row, index, in_place, "row rewritten");
        self.after_edit(DocumentUpdate::replace_row(row, index, removed.len(), chars.len()));
        Ok(())
    }

    // ---- flags ----

    /// Whether an unsaved change exists.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Set or clear the unsaved-changes flag.
    pub fn set_dirty(&mut self, dirty: bool) {
        if self.dirty != dirty {
            self.dirty = dirty;
            self.notify_status(StatusKind::Dirty);
        }
    }

    fn set_flag<T: PartialEq>(
        &mut self,
        value: T,
        field: impl FnOnce(&mut DocumentFlags) -> &mut T,
        kind: StatusKind,
    ) -> bool {
        let slot = field(&mut self.flags);
        if *slot == value {
            return false;
        }
        *slot = value;
        self.notify_status(kind);
        true
    }

    /// Tab stop width in cells.
    pub fn tab_stops(&self) -> usize {
        self.flags.tab_stops
    }

    /// Change the tab stop width. Cached layouts are dropped.
    pub fn set_tab_stops(&mut self, tab_stops: usize) {
        if self.set_flag(tab_stops.max(1), |f| &mut f.tab_stops, StatusKind::TabStops) {
            self.table.clear_layout_cache();
        }
    }

    /// How rows wrap.
    pub fn line_break(&self) -> LineBreakMethod {
        self.flags.line_break
    }

    /// Change how rows wrap. Cached layouts are dropped.
    pub fn set_line_break(&mut self, method: LineBreakMethod) {
        if self.set_flag(method, |f| &mut f.line_break, StatusKind::LineBreak) {
            self.table.clear_layout_cache();
        }
    }

    /// Wrap column for [`LineBreakMethod::CharUnit`].
    pub fn line_break_char_count(&self) -> usize {
        self.flags.line_break_char_count
    }

    /// Change the wrap column for [`LineBreakMethod::CharUnit`].
    pub fn set_line_break_char_count(&mut self, count: usize) {
        if self.set_flag(count.max(1), |f| &mut f.line_break_char_count, StatusKind::LineBreak) {
            self.table.clear_layout_cache();
        }
    }

    /// Wrap width for [`LineBreakMethod::PageBound`].
    pub fn page_width(&self) -> Option<f64> {
        self.flags.page_width
    }

    /// Change the view width used by [`LineBreakMethod::PageBound`].
    pub fn set_page_width(&mut self, width: Option<f64>) {
        if self.set_flag(width, |f| &mut f.page_width, StatusKind::LineBreak) {
            self.table.clear_layout_cache();
        }
    }

    /// Right-to-left flow.
    pub fn right_to_left(&self) -> bool {
        self.flags.right_to_left
    }

    /// Change the flow direction.
    pub fn set_right_to_left(&mut self, value: bool) {
        if self.set_flag(value, |f| &mut f.right_to_left, StatusKind::RightToLeft) {
            self.table.clear_layout_cache();
        }
    }

    /// Whether full-width spaces are marked.
    pub fn show_full_space(&self) -> bool {
        self.flags.show_full_space
    }

    /// Mark full-width spaces.
    pub fn set_show_full_space(&mut self, value: bool) {
        self.set_flag(value, |f| &mut f.show_full_space, StatusKind::ShowFullSpace);
    }

    /// Whether half-width spaces are marked.
    pub fn show_half_space(&self) -> bool {
        self.flags.show_half_space
    }

    /// Mark half-width spaces.
    pub fn set_show_half_space(&mut self, value: bool) {
        self.set_flag(value, |f| &mut f.show_half_space, StatusKind::ShowHalfSpace);
    }

    /// Whether tabs are marked.
    pub fn show_tab(&self) -> bool {
        self.flags.show_tab
    }

    /// Mark tabs.
    pub fn set_show_tab(&mut self, value: bool) {
        self.set_flag(value, |f| &mut f.show_tab, StatusKind::ShowTab);
    }

    /// Whether line breaks are marked.
    pub fn show_line_break(&self) -> bool {
        self.flags.show_line_break
    }

    /// Mark line breaks.
    pub fn set_show_line_break(&mut self, value: bool) {
        self.set_flag(value, |f| &mut f.show_line_break, StatusKind::ShowLineBreak);
    }

    /// Insert (`true`) or overwrite mode.
    pub fn insert_mode(&self) -> bool {
        self.flags.insert_mode
    }

    /// Switch between insert and overwrite mode.
    pub fn set_insert_mode(&mut self, value: bool) {
        self.set_flag(value, |f| &mut f.insert_mode, StatusKind::InsertMode);
    }

    /// Whether the caret is hidden.
    pub fn hide_caret(&self) -> bool {
        self.flags.hide_caret
    }

    /// Hide or show the caret.
    pub fn set_hide_caret(&mut self, value: bool) {
        self.set_flag(value, |f| &mut f.hide_caret, StatusKind::HideCaret);
    }

    /// Whether the current-line marker is hidden.
    pub fn hide_line_marker(&self) -> bool {
        self.flags.hide_line_marker
    }

    /// Hide or show the current-line marker.
    pub fn set_hide_line_marker(&mut self, value: bool) {
        self.set_flag(value, |f| &mut f.hide_line_marker, StatusKind::HideLineMarker);
    }

    /// Whether the ruler is hidden.
    pub fn hide_ruler(&self) -> bool {
        self.flags.hide_ruler
    }

    /// Hide or show the ruler.
    pub fn set_hide_ruler(&mut self, value: bool) {
        self.set_flag(value, |f| &mut f.hide_ruler, StatusKind::HideRuler);
    }

    /// Whether line numbers are drawn.
    pub fn draw_line_number(&self) -> bool {
        self.flags.draw_line_number
    }

    /// Draw or hide line numbers.
    pub fn set_draw_line_number(&mut self, value: bool) {
        self.set_flag(value, |f| &mut f.draw_line_number, StatusKind::DrawLineNumber);
    }

    /// Whether URLs are marked.
    pub fn url_mark(&self) -> bool {
        self.flags.url_mark
    }

    /// Turn URL marking on or off. Installs or removes the URL pattern under
    /// [`MarkerIds::URL`].
    pub fn set_url_mark(&mut self, value: bool) -> Result<()> {
        if value == self.flags.url_mark {
            return Ok(());
        }
        if value {
            self.patterns
                .add(MarkerIds::URL, RegexMarkerPattern::url(Color::default())?);
        } else {
            self.patterns.remove(MarkerIds::URL);
        }
        self.table.clear_layout_cache();
        self.set_flag(value, |f| &mut f.url_mark, StatusKind::UrlMark);
        Ok(())
    }

    /// Whether selections are rectangular.
    pub fn rect_selection(&self) -> bool {
        self.flags.rect_selection
    }

    /// Switch between stream and rectangle selection.
    pub fn set_rect_selection(&mut self, value: bool) {
        self.set_flag(value, |f| &mut f.rect_selection, StatusKind::RectSelection);
    }

    /// What the tab key inserts.
    pub fn indent_mode(&self) -> IndentMode {
        self.flags.indent_mode
    }

    /// Change what the tab key inserts.
    pub fn set_indent_mode(&mut self, mode: IndentMode) {
        self.set_flag(mode, |f| &mut f.indent_mode, StatusKind::IndentMode);
    }

    // ---- events ----

    /// Whether update listeners are notified.
    pub fn fire_update_event(&self) -> bool {
        self.fire_update
    }

    /// Suspend or resume update notifications. Resuming fires no catch-up event.
    pub fn set_fire_update_event(&mut self, fire: bool) {
        self.fire_update = fire;
    }

    /// Call `callback` after every text change.
    pub fn subscribe_update<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&DocumentUpdate) + Send + 'static,
    {
        self.update_listeners.subscribe(callback)
    }

    /// Remove an update listener.
    pub fn unsubscribe_update(&mut self, id: SubscriptionId) -> bool {
        self.update_listeners.unsubscribe(id)
    }

    /// Call `callback` when a flag, the caret, the selection or the folds change.
    pub fn subscribe_status<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&StatusKind) + Send + 'static,
    {
        self.status_listeners.subscribe(callback)
    }

    /// Remove a status listener.
    pub fn unsubscribe_status(&mut self, id: SubscriptionId) -> bool {
        self.status_listeners.unsubscribe(id)
    }

    /// Call `callback` around loads and saves.
    pub fn subscribe_progress<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&ProgressEvent) + Send + 'static,
    {
        self.progress_listeners.subscribe(callback)
    }

    /// Remove a progress listener.
    pub fn unsubscribe_progress(&mut self, id: SubscriptionId) -> bool {
        self.progress_listeners.unsubscribe(id)
    }

    fn notify_update(&mut self, update: DocumentUpdate) {
        if self.fire_update {
            self.update_listeners.notify(&update);
        }
    }

    fn notify_status(&mut self, kind: StatusKind) {
        self.status_listeners.notify(&kind);
    }
}

impl UndoTarget for Document {
    fn replace_text(&mut self, index: usize, remove_len: usize, chars: &[char]) -> Result<()> {
        check_range(index, remove_len, self.len())?;
        self.apply_replace(index, remove_len, chars, false)
    }

    fn swap_text(&mut self, text: GapBuffer<char>) -> Result<GapBuffer<char>> {
        let previous = self.store.snapshot()?;
        self.store.restore(text)?;
        self.rebuild_rows()?;
        self.markers.clear();
        self.selections.clear();
        self.set_dirty(true);
        self.clamp_caret();
        self.notify_update(DocumentUpdate::rebuild_layout(self.len()));
        Ok(previous)
    }

    fn set_caret_index(&mut self, index: usize) -> Result<()> {
        let point = self.table.text_point_from_index(index)?;
        self.set_caret_position(point)
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("len", &self.len())
            .field("rows", &self.table.line_count())
            .field("caret", &self.caret)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

/// Forward `(start, length)` inside a text of `len` chars.
fn normalize_selection(start: usize, length: isize, len: usize) -> Result<(usize, usize)> {
    let end = start as isize + length;
    if start > len || end < 0 || end as usize > len {
        return Err(EngineError::OutOfRange {
            index: start,
            length: length.unsigned_abs(),
            len,
        });
    }
    let (lo, hi) = if length < 0 {
        (end as usize, start)
    } else {
        (start, end as usize)
    };
    Ok((lo, hi - lo))
}

/// `true` when replacing `removed` with `inserted` keeps a row's line-break structure: no
/// break in the middle and the same trailing break.
fn same_break_shape(removed: &[char], inserted: &[char]) -> bool {
    fn inner_break(chars: &[char]) -> bool {
        chars
            .iter()
            .take(chars.len().saturating_sub(1))
            .any(|c| *c == NEW_LINE)
    }
    !inner_break(removed)
        && !inner_break(inserted)
        && (removed.last() == Some(&NEW_LINE)) == (inserted.last() == Some(&NEW_LINE))
}

/// Reads a snapshot of a document as characters, lines or UTF-8 bytes.
#[derive(Debug, Clone)]
pub struct DocumentReader {
    text: GapBuffer<char>,
    pos: usize,
    /// Bytes of a character split across two `read` calls.
    pending: Vec<u8>,
}

impl DocumentReader {
    fn new(text: GapBuffer<char>) -> Self {
        Self {
            text,
            pos: 0,
            pending: Vec::new(),
        }
    }

    /// The next character without consuming it.
    pub fn peek(&self) -> Option<char> {
        self.text.get(self.pos).copied()
    }

    /// Consume one character.
    pub fn read_char(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    /// Consume up to and including the next line break; the break is not returned.
    pub fn read_line(&mut self) -> Option<String> {
        self.peek()?;
        let mut line = String::new();
        while let Some(ch) = self.read_char() {
            if ch == NEW_LINE {
                break;
            }
            line.push(ch);
        }
        Some(line)
    }

    /// Consume the rest of the text.
    pub fn read_to_end_string(&mut self) -> String {
        let rest: String = self.text.iter().skip(self.pos).collect();
        self.pos = self.text.len();
        rest
    }
}

impl Iterator for DocumentReader {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        self.read_char()
    }
}

impl io::Read for DocumentReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0usize;
        while written < buf.len() {
            if self.pending.is_empty() {
                let Some(ch) = self.read_char() else {
                    break;
                };
                let mut utf8 = [0u8; 4];
                self.pending
                    .extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
            }
            let n = self.pending.len().min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            written += n;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ManualClock;
    use std::io::Read;
    use std::sync::Mutex;

    fn doc(text: &str) -> Document {
        Document::from_text(text).unwrap()
    }

    #[test]
    fn test_replace_updates_rows() {
        let mut d = Document::new();
        d.replace(0, 0, "hello\nworld").unwrap();
        assert_eq!(d.line_count(), 2);
        assert_eq!(d.get_line_text(0).unwrap(), "hello\n");
        assert_eq!(d.get_line_text(1).unwrap(), "world");
        assert_eq!(d.text_point_from_index(6).unwrap(), TextPoint::new(1, 0));
        assert!(d.is_dirty());
    }

    #[test]
    fn test_replace_out_of_range_is_rejected() {
        let mut d = doc("abc");
        assert!(matches!(d.replace(2, 5, "x"), Err(EngineError::OutOfRange { .. })));
        assert!(matches!(d.replace(4, 0, "x"), Err(EngineError::OutOfRange { .. })));
        assert_eq!(d.text().unwrap(), "abc");
        assert!(!d.undo_manager().can_undo());
    }

    #[test]
    fn test_update_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut d = Document::new();
        let sink = seen.clone();
        d.subscribe_update(move |u| sink.lock().unwrap().push(*u));

        d.replace(0, 0, "ab").unwrap();
        d.set_fire_update_event(false);
        d.replace(2, 0, "c").unwrap();
        d.set_fire_update_event(true);
        d.replace(0, 1, "").unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![DocumentUpdate::replace(0, 0, 2), DocumentUpdate::replace(0, 1, 0)]
        );
        assert_eq!(d.text().unwrap(), "bc");
    }

    #[test]
    fn test_status_events_fire_on_change_only() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut d = Document::new();
        let sink = seen.clone();
        d.subscribe_status(move |k| sink.lock().unwrap().push(*k));

        d.set_show_tab(true);
        d.set_show_tab(true);
        d.set_tab_stops(8);
        d.set_line_break(LineBreakMethod::CharUnit);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![StatusKind::ShowTab, StatusKind::TabStops, StatusKind::LineBreak]
        );
    }

    #[test]
    fn test_caret_is_restored_by_undo() {
        let mut d = Document::new();
        d.undo_manager_mut().begin_undo_group();
        for (i, s) in ["a", "b", "c"].iter().enumerate() {
            d.replace(i, 0, s).unwrap();
            d.set_caret_position(TextPoint::new(0, i + 1)).unwrap();
        }
        d.undo_manager_mut().end_undo_group().unwrap();

        assert!(d.undo().unwrap());
        assert_eq!(d.text().unwrap(), "");
        assert_eq!(d.caret_position(), TextPoint::new(0, 0));
        assert!(!d.undo_manager().can_undo());

        assert!(d.redo().unwrap());
        assert_eq!(d.text().unwrap(), "abc");
        assert_eq!(d.caret_position(), TextPoint::new(0, 3));
    }

    #[test]
    fn test_markers_shift_and_drop() {
        let mut d = doc("hello world");
        d.set_marker(MarkerIds::DEFAULT, Marker::new(6, 5, HilightType::Sold))
            .unwrap();
        d.replace(0, 0, ">> ").unwrap();
        let m: Vec<Marker> = d.markers().get(MarkerIds::DEFAULT).copied().collect();
        assert_eq!((m[0].start, m[0].length), (9, 5));

        d.replace(10, 2, "").unwrap();
        assert_eq!(d.markers().get(MarkerIds::DEFAULT).count(), 0);
        assert!(d.set_marker(0, Marker::new(0, 100, HilightType::Sold)).is_err());
    }

    #[test]
    fn test_stream_selection() {
        let mut d = doc("one two\nthree");
        d.select(7, -3).unwrap();
        assert_eq!(d.selected_text().unwrap(), "two");
        d.replace_selection("2").unwrap();
        assert_eq!(d.text().unwrap(), "one 2\nthree");
        assert!(d.selections().is_empty());
        assert_eq!(d.caret_position(), TextPoint::new(0, 5));
        assert!(d.select(0, 100).is_err());
    }

    #[test]
    fn test_select_word_and_line() {
        let mut d = doc("foo bar_baz, qux\nnext");
        d.select_word(6, true).unwrap();
        assert_eq!(d.selected_text().unwrap(), "bar_baz");
        assert_eq!(d.anchor_index(), 4);

        d.select_line(2, false).unwrap();
        assert_eq!(d.selected_text().unwrap(), "foo bar_baz, qux");
        d.select_line(18, false).unwrap();
        assert_eq!(d.selected_text().unwrap(), "next");
    }

    #[test]
    fn test_selection_needs_update_events() {
        let mut d = doc("abc");
        d.set_fire_update_event(false);
        assert!(matches!(d.select(0, 1), Err(EngineError::InvalidOperation(_))));
    }

    #[test]
    fn test_rect_selection_is_clamped_per_row() {
        let mut d = doc("abcdef\nab\nabcdef");
        d.set_rect_selection(true);
        // (0,1) .. (2,4)
        d.select(1, 13).unwrap();
        let sels: Vec<(usize, usize)> = d.selections().iter().map(|s| (s.start, s.length)).collect();
        assert_eq!(sels, vec![(1, 3), (8, 1), (11, 3)]);
        assert_eq!(d.selected_text().unwrap(), "bcd\nb\nbcd");
    }

    #[test]
    fn test_rect_replace_is_one_undo_step() {
        let mut d = doc("abcd\nabcd\nabcd");
        d.set_rect_selection(true);
        d.select_rect(TextPoint::new(0, 1), 2, 2).unwrap();
        d.replace_selection("X").unwrap();
        assert_eq!(d.text().unwrap(), "aXd\naXd\naXd");
        let points: Vec<usize> = d.selections().iter().map(|s| s.start).collect();
        assert_eq!(points, vec![2, 6, 10]);

        d.undo().unwrap();
        assert_eq!(d.text().unwrap(), "abcd\nabcd\nabcd");
    }

    #[test]
    fn test_rect_insert_appends_rows() {
        let mut d = doc("ab\ncd");
        d.set_rect_selection(true);
        d.set_anchor_index(1).unwrap();
        d.replace_selection("1\n2\n3").unwrap();
        assert_eq!(d.text().unwrap(), "a1b\nc2d\n3");
        d.undo().unwrap();
        assert_eq!(d.text().unwrap(), "ab\ncd");
    }

    #[test]
    fn test_fold_events_and_hidden() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut d = doc("aaa\nbbb\nccc\n");
        let sink = seen.clone();
        d.subscribe_status(move |k| sink.lock().unwrap().push(*k));
        d.line_table_mut()
            .folding_mut()
            .folds_mut()
            .add_range([FoldingItem::new(3, 7).unwrap()]);

        let fold = d.fold_at(5).unwrap();
        assert!(d.collapse_fold(&fold));
        assert!(d.is_hidden(5));
        assert!(!d.is_hidden(3));
        assert_eq!(d.line_table().fold_line_count(), 3);
        assert!(d.expand_fold(&fold));
        assert!(!d.is_hidden(5));
        assert_eq!(*seen.lock().unwrap(), vec![StatusKind::Folding, StatusKind::Folding]);
    }

    #[test]
    fn test_layout_is_cached_until_edit() {
        let mut d = doc("a\tb\nxyz");
        d.set_tab_stops(4);
        assert_eq!(d.layout(0).unwrap().width(), 5.0);
        assert!(d.line_table().rows().record(0).unwrap().layout().is_some());

        d.replace(0, 0, "q").unwrap();
        assert!(d.line_table().rows().record(0).unwrap().layout().is_none());
        assert!(d.layout(5).is_err());
    }

    #[test]
    fn test_char_unit_wrap() {
        let mut d = doc("abcdefgh");
        d.set_line_break(LineBreakMethod::CharUnit);
        d.set_line_break_char_count(3);
        assert_eq!(d.layout(0).unwrap().height(), 3.0);
    }

    #[test]
    fn test_url_mark_reaches_layout_input() {
        let mut d = doc("see https://example.com now");
        d.set_url_mark(true).unwrap();
        assert!(d.url_mark());
        assert!(d.layout(0).is_ok());
        d.set_url_mark(false).unwrap();
        assert!(!d.url_mark());
    }

    #[test]
    fn test_find_and_replace_hits_one_by_one() {
        let mut d = doc("cat dog cat\ncat");
        d.set_find_param("cat", false, SearchOptions::default())
            .unwrap();
        let mut cursor = d.find(0, d.len()).unwrap();
        while let Some(hit) = d.find_next(&mut cursor).unwrap() {
            d.replace(hit.start, hit.len(), "tiger").unwrap();
        }
        assert_eq!(d.text().unwrap(), "tiger dog tiger\ntiger");
    }

    #[test]
    fn test_find_without_params_fails() {
        let d = doc("abc");
        assert!(matches!(d.find(0, 3), Err(EngineError::InvalidOperation(_))));
    }

    #[test]
    fn test_regex_replace_all_is_one_undo_step() {
        let mut d = doc("a1 b2\nc3\n");
        d.set_find_param(r"([a-z])(\d)", true, SearchOptions::default())
            .unwrap();
        let rows = d.replace_all("$2$1", true).unwrap();
        assert_eq!(rows, 2);
        assert_eq!(d.text().unwrap(), "1a 2b\n3c\n");
        assert_eq!(d.line_count(), 3);

        d.undo().unwrap();
        assert_eq!(d.text().unwrap(), "a1 b2\nc3\n");
        d.redo().unwrap();
        assert_eq!(d.text().unwrap(), "1a 2b\n3c\n");
    }

    #[test]
    fn test_replace_all_with_line_breaks_rebuilds_rows() {
        let mut d = doc("a,b\nc");
        d.set_find_param(",", false, SearchOptions::default())
            .unwrap();
        d.replace_all("\n", false).unwrap();
        assert_eq!(d.text().unwrap(), "a\nb\nc");
        assert_eq!(d.line_count(), 3);
        assert_eq!(d.get_line_text(1).unwrap(), "b\n");
    }

    #[test]
    fn test_replace_all_literal_fires_row_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut d = doc("xx\nyy\nxy");
        let sink = seen.clone();
        d.subscribe_update(move |u| sink.lock().unwrap().push(u.row));
        assert_eq!(d.replace_all_literal("x", "zz", false).unwrap(), 2);
        assert_eq!(d.text().unwrap(), "zzzz\nyy\nzzy");
        assert_eq!(*seen.lock().unwrap(), vec![Some(0), Some(2)]);
    }

    #[test]
    fn test_from_document_copies_text_not_flags() {
        let mut a = doc("text\nmore");
        a.set_show_tab(true);
        let b = Document::from_document(&a).unwrap();
        assert_eq!(b.text().unwrap(), "text\nmore");
        assert_eq!(b.line_count(), 2);
        assert!(!b.show_tab());
        assert!(!b.is_dirty());
    }

    #[test]
    fn test_perform_layout_keeps_rows_clean() {
        let mut d = doc("ab\ncd");
        d.line_table_mut().clear_dirty(0).unwrap();
        d.line_table_mut().clear_dirty(1).unwrap();
        d.perform_layout(false).unwrap();
        assert!(!d.line_table().is_dirty(0).unwrap());
        assert_eq!(d.line_count(), 2);
    }

    #[test]
    fn test_generators_follow_the_clock() {
        use crate::highlight::TokenType;

        struct Digits;
        impl Highlighter for Digits {
            fn reset(&mut self) {}
            fn highlight(&mut self, text: &str, emit: &mut dyn FnMut(usize, usize, TokenType)) -> i32 {
                for (i, c) in text.chars().enumerate() {
                    if c.is_ascii_digit() {
                        emit(i, 1, TokenType::Keyword1);
                    }
                }
                0
            }
        }

        let clock = ManualClock::new();
        let mut d = Document::with_clock(EngineConfig::default(), Arc::new(clock.clone()));
        d.replace(0, 0, "a1\nb").unwrap();
        d.set_highlighter(Some(Box::new(Digits)));
        assert!(d.update_line_info(true).unwrap());
        assert_eq!(d.line_table().rows().record(0).unwrap().syntax().len(), 1);

        d.replace(4, 0, "2").unwrap();
        assert!(!d.update_line_info(false).unwrap());
        clock.advance(std::time::Duration::from_secs(2));
        assert!(d.update_line_info(false).unwrap());
        assert_eq!(d.line_table().rows().record(1).unwrap().syntax().len(), 1);
    }

    #[test]
    fn test_reader() {
        let d = doc("héllo\nworld");
        let mut r = d.reader().unwrap();
        assert_eq!(r.peek(), Some('h'));
        assert_eq!(r.read_line().as_deref(), Some("héllo"));
        let mut rest = String::new();
        r.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "world");
        assert_eq!(r.read_line(), None);
    }

    #[test]
    fn test_separator() {
        let d = doc("ab cd");
        assert_eq!(d.get_separator(4, |c| c == ' ').unwrap(), Some((3, 5)));
        assert_eq!(d.get_separator(0, |c| c == ' ').unwrap(), Some((0, 2)));
        assert_eq!(d.get_separator(5, |c| c == ' ').unwrap(), None);
    }
}
