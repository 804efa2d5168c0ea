//! Collapsible regions.
//!
//! Folds live in an [`IntervalTree`] keyed by their closed `[start, end]` range. Edits shift or
//! collapse them through [`FoldingCollection::update_data`]; a [`FoldingStrategy`] regenerates
//! them from the text when the [`FoldingGenerator`] decides a pass is due.

use crate::error::{EngineError, Result};
use crate::gap_buffer::GapBuffer;
use crate::generator::{Clock, LineInfoGenerator, Throttle};
use crate::intervals::{IntervalItem, IntervalTree};
use crate::rows::RowIndex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// One collapsible region, `start` and `end` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FoldingItem {
    start: usize,
    end: usize,
    expand: bool,
}

impl FoldingItem {
    /// An expanded fold. Requires `start < end`.
    pub fn new(start: usize, end: usize) -> Result<Self> {
        Self::with_state(start, end, true)
    }

    /// A fold with an explicit expand state. Requires `start < end`.
    pub fn with_state(start: usize, end: usize, expand: bool) -> Result<Self> {
        if start >= end {
            return Err(EngineError::InvalidArgument("fold start must precede its end"));
        }
        Ok(Self { start, end, expand })
    }

    /// First character.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last character.
    pub fn end(&self) -> usize {
        self.end
    }

    /// `false` while collapsed.
    pub fn is_expanded(&self) -> bool {
        self.expand
    }

    fn same_range(&self, other: &FoldingItem) -> bool {
        self.start == other.start && self.end == other.end
    }

    fn strictly_contains(&self, other: &FoldingItem) -> bool {
        self.start < other.start && self.end > other.end
    }
}

impl IntervalItem for FoldingItem {
    fn interval_start(&self) -> usize {
        self.start
    }

    fn interval_end(&self) -> usize {
        self.end
    }
}

/// Produces folds from the text.
pub trait FoldingStrategy: Send {
    /// Folds found in `text[start..=end]`.
    fn analyze(&self, text: &GapBuffer<char>, start: usize, end: usize) -> Vec<FoldingItem>;
}

/// The set of folds of a document.
#[derive(Debug, Clone, Default)]
pub struct FoldingCollection {
    tree: IntervalTree<FoldingItem>,
}

impl FoldingCollection {
    /// No folds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of folds.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns `true` without folds.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Every fold.
    pub fn iter(&self) -> impl Iterator<Item = &FoldingItem> + '_ {
        self.tree.items().iter()
    }

    /// Add a fold unless one with the same range exists.
    pub fn add(&mut self, item: FoldingItem) {
        if self.tree.items().iter().any(|i| i.same_range(&item)) {
            return;
        }
        self.tree.push(item);
    }

    /// Add several folds.
    pub fn add_range<I: IntoIterator<Item = FoldingItem>>(&mut self, items: I) {
        for item in items {
            self.add(item);
        }
        self.tree.rebuild();
    }

    /// Remove the fold with `item`'s range.
    pub fn remove(&mut self, item: &FoldingItem) -> bool {
        let before = self.tree.len();
        self.tree.retain(|i| !i.same_range(item));
        before != self.tree.len()
    }

    /// Drop every fold.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    fn query(&self, start: usize, end: usize) -> impl Iterator<Item = &FoldingItem> + '_ {
        self.tree
            .query_range(start, end)
            .into_iter()
            .filter_map(|slot| self.tree.get(slot))
    }

    /// Folds overlapping `[index, index + length)`.
    pub fn get_range(&self, index: usize, length: usize) -> Vec<FoldingItem> {
        if length == 0 {
            return Vec::new();
        }
        self.query(index, index + length - 1).copied().collect()
    }

    /// The overlapping fold whose start is closest before `index`.
    pub fn get(&self, index: usize, length: usize) -> Option<FoldingItem> {
        if length == 0 {
            return None;
        }
        self.query(index, index + length - 1)
            .min_by_key(|item| index.abs_diff(item.start))
            .copied()
    }

    /// The fold whose range equals `start..=end`.
    pub fn find(&self, start: usize, end: usize) -> Option<FoldingItem> {
        self.query(start, end)
            .find(|i| i.start == start && i.end == end)
            .copied()
    }

    /// Copy the expand state of `items` onto the folds with the same ranges.
    pub fn apply_expand_status<'a, I>(&mut self, items: I)
    where
        I: IntoIterator<Item = &'a FoldingItem>,
    {
        let items: Vec<&FoldingItem> = items.into_iter().collect();
        for target in self.tree.items_mut() {
            if let Some(source) = items.iter().find(|i| i.same_range(target)) {
                target.expand = source.expand;
            }
        }
        self.tree.rebuild();
    }

    /// Expand `item` and every fold overlapping it.
    pub fn expand(&mut self, item: &FoldingItem) -> bool {
        let slots = self.tree.query_range(item.start, item.end);
        if slots.is_empty() {
            return false;
        }
        for slot in slots {
            if let Some(target) = self.tree.get_mut(slot) {
                target.expand = true;
            }
        }
        true
    }

    /// Collapse `item` and every fold nested inside it.
    pub fn collapse(&mut self, item: &FoldingItem) -> bool {
        let slots = self.tree.query_range(item.start, item.end);
        let mut found = false;
        for slot in slots {
            if let Some(target) = self.tree.get_mut(slot) {
                if target.same_range(item) {
                    target.expand = false;
                    found = true;
                } else if target.start > item.start && target.end <= item.end {
                    target.expand = false;
                }
            }
        }
        found
    }

    /// `true` if a collapsed fold hides `index`. A fold's own first character stays visible.
    pub fn is_hidden(&self, index: usize) -> bool {
        self.query(index, index)
            .any(|i| !i.expand && index > i.start && index <= i.end)
    }

    /// `true` if a collapsed fold strictly encloses `item`.
    pub fn is_parent_hidden(&self, item: &FoldingItem) -> bool {
        self.query(item.start, item.end)
            .any(|i| !i.same_range(item) && !i.expand && i.strictly_contains(item))
    }

    /// `true` if any fold strictly encloses `item`.
    pub fn has_parent(&self, item: &FoldingItem) -> bool {
        self.query(item.start, item.end).any(|i| i.strictly_contains(item))
    }

    /// The widest collapsed fold overlapping `[index, index + length)`.
    pub fn farthest_hidden(&self, index: usize, length: usize) -> Option<FoldingItem> {
        if length == 0 {
            return None;
        }
        self.query(index, index + length - 1)
            .filter(|i| !i.expand)
            .max_by_key(|i| i.end - i.start)
            .copied()
    }

    /// Shift folds after `removed` chars at `start` were replaced by `inserted` chars.
    ///
    /// Folds before the edit stay put, folds after it move by the length delta, and folds the
    /// edit cuts through are dropped.
    pub fn update_data(&mut self, start: usize, inserted: usize, removed: usize) {
        if self.tree.is_empty() {
            return;
        }
        let delta = inserted as isize - removed as isize;
        let shift = |v: usize| (v as isize + delta).max(0) as usize;
        // Last removed character; only meaningful when `removed > 0`.
        let end = start + removed.saturating_sub(1);

        for item in self.tree.items_mut() {
            if start <= item.start {
                if removed > 0 && end >= item.start {
                    item.end = item.start;
                } else {
                    item.start = shift(item.start);
                    item.end = shift(item.end);
                }
            } else if start <= item.end {
                if removed > 0 && end > item.end {
                    item.end = item.start;
                } else {
                    item.end = shift(item.end);
                }
            }
        }
        self.tree.retain(|i| i.start < i.end);
        self.tree.rebuild();
    }
}

/// Keeps a [`FoldingCollection`] in step with the text.
pub struct FoldingGenerator {
    folds: FoldingCollection,
    strategy: Option<Box<dyn FoldingStrategy>>,
    throttle: Throttle,
}

impl FoldingGenerator {
    /// Generator without a strategy.
    pub fn new(clock: Arc<dyn Clock>, quantum: Duration) -> Self {
        Self {
            folds: FoldingCollection::new(),
            strategy: None,
            throttle: Throttle::new(clock, quantum),
        }
    }

    /// Install or remove the strategy. Removing it drops every fold.
    pub fn set_strategy(&mut self, strategy: Option<Box<dyn FoldingStrategy>>) {
        if strategy.is_none() {
            self.folds.clear();
        }
        self.strategy = strategy;
        self.throttle.invalidate();
    }

    /// Returns `true` when a strategy is installed.
    pub fn has_strategy(&self) -> bool {
        self.strategy.is_some()
    }

    /// The folds.
    pub fn folds(&self) -> &FoldingCollection {
        &self.folds
    }

    /// Mutable folds, for hosts that add folds by hand.
    pub fn folds_mut(&mut self) -> &mut FoldingCollection {
        &mut self.folds
    }

    /// Returns `true` when the folds reflect the current text.
    pub fn is_synced(&self) -> bool {
        self.throttle.is_synced()
    }
}

impl LineInfoGenerator for FoldingGenerator {
    fn update(&mut self, start: usize, inserted: usize, removed: usize) {
        self.folds.update_data(start, inserted, removed);
        self.throttle.mark_edited();
    }

    fn clear(&mut self, _rows: &mut RowIndex) {
        self.folds.clear();
        self.throttle.invalidate();
    }

    fn generate(&mut self, text: &GapBuffer<char>, _rows: &mut RowIndex, force: bool) -> bool {
        if text.is_empty() || !self.throttle.should_generate(force) {
            return false;
        }
        let Some(strategy) = self.strategy.as_deref() else {
            return false;
        };

        // A fresh analysis yields expanded folds; carry the collapsed ones over.
        let collapsed: Vec<FoldingItem> = self.folds.iter().filter(|i| !i.expand).copied().collect();
        self.folds.clear();
        self.folds.add_range(strategy.analyze(text, 0, text.len() - 1));
        self.folds.apply_expand_status(&collapsed);
        self.throttle.mark_generated();
        trace!(target: "textdoc.folding", folds = self.folds.len(), collapsed = collapsed.len(), "folding pass");
        true
    }
}

impl fmt::Debug for FoldingGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FoldingGenerator")
            .field("folds", &self.folds.len())
            .field("strategy", &self.strategy.is_some())
            .field("throttle", &self.throttle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::ManualClock;

    fn fold(start: usize, end: usize) -> FoldingItem {
        FoldingItem::new(start, end).unwrap()
    }

    fn folds(items: &[(usize, usize)]) -> FoldingCollection {
        let mut folds = FoldingCollection::new();
        folds.add_range(items.iter().map(|(s, e)| fold(*s, *e)));
        folds
    }

    #[test]
    fn test_new_rejects_empty_range() {
        assert!(FoldingItem::new(3, 3).is_err());
        assert!(FoldingItem::new(4, 3).is_err());
    }

    #[test]
    fn test_add_dedups() {
        let mut folds = folds(&[(0, 10)]);
        folds.add(fold(0, 10));
        assert_eq!(folds.len(), 1);
    }

    #[test]
    fn test_collapse_hides_nested_contents() {
        let mut folds = folds(&[(0, 20), (5, 10), (30, 40)]);
        assert!(folds.collapse(&fold(0, 20)));

        assert!(!folds.is_hidden(0));
        assert!(folds.is_hidden(1));
        assert!(folds.is_hidden(7));
        assert!(folds.is_hidden(20));
        assert!(!folds.is_hidden(21));
        assert!(!folds.is_hidden(35));
        assert!(!folds.find(5, 10).unwrap().is_expanded());
        assert!(folds.is_parent_hidden(&fold(5, 10)));
        assert!(folds.has_parent(&fold(5, 10)));
        assert!(!folds.has_parent(&fold(0, 20)));
    }

    #[test]
    fn test_expand_opens_overlapping() {
        let mut folds = folds(&[(0, 20), (5, 10)]);
        folds.collapse(&fold(0, 20));
        assert!(folds.expand(&fold(0, 20)));
        assert!(folds.iter().all(|f| f.is_expanded()));
        assert!(!folds.is_hidden(7));
    }

    #[test]
    fn test_update_shifts_and_prunes() {
        let mut folds = folds(&[(0, 4), (10, 20), (30, 40)]);
        // Insert 3 chars inside the middle fold.
        folds.update_data(12, 3, 0);
        let ranges: Vec<(usize, usize)> = folds.iter().map(|f| (f.start(), f.end())).collect();
        assert_eq!(ranges, vec![(0, 4), (10, 23), (33, 43)]);

        // Delete a span that cuts through the last fold's start.
        folds.update_data(30, 0, 5);
        let ranges: Vec<(usize, usize)> = folds.iter().map(|f| (f.start(), f.end())).collect();
        assert_eq!(ranges, vec![(0, 4), (10, 23)]);
    }

    #[test]
    fn test_farthest_hidden_and_nearest() {
        let mut folds = folds(&[(0, 20), (5, 10)]);
        folds.collapse(&fold(5, 10));
        assert_eq!(
            folds.farthest_hidden(0, 30).map(|f| (f.start(), f.end())),
            Some((5, 10))
        );
        assert_eq!(folds.get(6, 1).map(|f| f.start()), Some(5));
    }

    struct Braces;

    impl FoldingStrategy for Braces {
        fn analyze(&self, text: &GapBuffer<char>, start: usize, end: usize) -> Vec<FoldingItem> {
            let mut stack = Vec::new();
            let mut found = Vec::new();
            for (i, ch) in text.iter().enumerate().take(end + 1).skip(start) {
                match *ch {
                    '{' => stack.push(i),
                    '}' => {
                        if let Some(begin) = stack.pop()
                            && let Ok(item) = FoldingItem::new(begin, i)
                        {
                            found.push(item);
                        }
                    }
                    _ => {}
                }
            }
            found
        }
    }

    #[test]
    fn test_generator_keeps_collapsed_state() {
        let clock = ManualClock::new();
        let text = GapBuffer::from("{a{b}c}");
        let mut rows = RowIndex::new();
        let mut generator = FoldingGenerator::new(Arc::new(clock.clone()), Duration::from_secs(1));
        generator.set_strategy(Some(Box::new(Braces)));
        assert!(generator.generate(&text, &mut rows, true));
        assert_eq!(generator.folds().len(), 2);

        generator.folds_mut().collapse(&fold(2, 4));
        generator.update(7, 0, 0);
        assert!(!generator.generate(&text, &mut rows, false));
        clock.advance(Duration::from_secs(2));
        assert!(generator.generate(&text, &mut rows, false));
        assert!(!generator.folds().find(2, 4).unwrap().is_expanded());
        assert!(generator.folds().find(0, 6).unwrap().is_expanded());
    }
}
