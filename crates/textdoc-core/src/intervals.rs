//! Interval tree over closed `[start, end]` ranges.
//!
//! A sorted vector with a prefix-maximum-end array: queries binary search on `start` and use
//! `prefix_max_end` to stop scanning backwards once no earlier interval can reach the query.
//! Insertions only append and mark the tree dirty; [`IntervalTree::rebuild`] sorts once before a
//! batch of queries. Queries on a dirty tree fall back to a linear scan so they stay correct.

/// An item with a closed interval key.
pub trait IntervalItem {
    /// Inclusive start.
    fn interval_start(&self) -> usize;
    /// Inclusive end.
    fn interval_end(&self) -> usize;
}

/// Sorted-vector interval tree.
///
/// Query results are slot indices into [`IntervalTree::items`], valid until the next mutation.
#[derive(Debug, Clone)]
pub struct IntervalTree<T> {
    /// Items, sorted by `(start, end)` whenever `dirty` is false.
    items: Vec<T>,
    /// `prefix_max_end[i] = max(items[0..=i].end)`.
    prefix_max_end: Vec<usize>,
    dirty: bool,
}

impl<T: IntervalItem> IntervalTree<T> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            prefix_max_end: Vec::new(),
            dirty: false,
        }
    }

    /// Append an item; call [`IntervalTree::rebuild`] before querying a batch.
    pub fn push(&mut self, item: T) {
        self.items.push(item);
        self.dirty = true;
    }

    /// Sort and recompute the pruning array.
    pub fn rebuild(&mut self) {
        if !self.dirty && self.prefix_max_end.len() == self.items.len() {
            return;
        }
        self.items
            .sort_by_key(|i| (i.interval_start(), i.interval_end()));
        self.prefix_max_end.clear();
        let mut max_end = 0;
        for item in &self.items {
            max_end = max_end.max(item.interval_end());
            self.prefix_max_end.push(max_end);
        }
        self.dirty = false;
    }

    /// Returns `true` if items changed since the last rebuild.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag that item keys were changed in place through [`IntervalTree::get_mut`].
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// All items, sorted if the tree is not dirty.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Item in `slot`.
    pub fn get(&self, slot: usize) -> Option<&T> {
        self.items.get(slot)
    }

    /// Mutable item in `slot`. Changing its interval requires [`IntervalTree::mark_dirty`].
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.items.get_mut(slot)
    }

    /// Mutable access to every item; marks the tree dirty.
    pub fn items_mut(&mut self) -> &mut [T] {
        self.dirty = true;
        &mut self.items
    }

    /// Keep only items for which `keep` returns `true`.
    pub fn retain<F: FnMut(&T) -> bool>(&mut self, keep: F) {
        let before = self.items.len();
        self.items.retain(keep);
        if self.items.len() != before {
            self.dirty = true;
        }
    }

    /// Slots of the intervals containing `pos`.
    pub fn query_point(&self, pos: usize) -> Vec<usize> {
        self.query_range(pos, pos)
    }

    /// Slots of the intervals overlapping the closed range `[start, end]`.
    pub fn query_range(&self, start: usize, end: usize) -> Vec<usize> {
        if self.items.is_empty() || start > end {
            return Vec::new();
        }
        if self.dirty || self.prefix_max_end.len() != self.items.len() {
            return self
                .items
                .iter()
                .enumerate()
                .filter(|(_, i)| overlaps(*i, start, end))
                .map(|(slot, _)| slot)
                .collect();
        }

        // First slot whose start is past `end`.
        let search_end = self.items.partition_point(|i| i.interval_start() <= end);
        let mut result = Vec::new();
        for slot in (0..search_end).rev() {
            if self.prefix_max_end[slot] < start {
                break;
            }
            if overlaps(&self.items[slot], start, end) {
                result.push(slot);
            }
        }
        result.reverse();
        result
    }

    /// Clear all intervals.
    pub fn clear(&mut self) {
        self.items.clear();
        self.prefix_max_end.clear();
        self.dirty = false;
    }

    /// Number of intervals.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg(test)]
    fn query_point_scan_count(&self, pos: usize) -> usize {
        let search_end = self.items.partition_point(|i| i.interval_start() <= pos);
        (0..search_end)
            .rev()
            .take_while(|slot| self.prefix_max_end[*slot] >= pos)
            .count()
    }
}

fn overlaps<T: IntervalItem>(item: &T, start: usize, end: usize) -> bool {
    item.interval_start() <= end && item.interval_end() >= start
}

impl<T: IntervalItem> Default for IntervalTree<T> {
    fn default() -> Self {
        Self::new()
    }
}
