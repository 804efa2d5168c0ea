//! Sorted range collections used for markers and selections.
//!
//! Items are kept sorted by start in a plain `Vec` (the arena). Lookups are binary searches
//! over `[start, start + length)`, edits to an item go through its slot index.

/// A `{start, length}` range stored in a [`RangeCollection`].
pub trait TextRange: Clone {
    /// First character offset.
    fn start(&self) -> usize;
    /// Length in characters.
    fn length(&self) -> usize;
    /// Move the range.
    fn set_start(&mut self, start: usize);
    /// Resize the range.
    fn set_length(&mut self, length: usize);

    /// Exclusive end offset.
    fn end(&self) -> usize {
        self.start() + self.length()
    }

    /// Returns `true` if `index` lies in `[start, end)`.
    fn contains(&self, index: usize) -> bool {
        index >= self.start() && index < self.end()
    }

    /// Returns `true` if the range intersects the closed window `[first, last]`.
    fn touches(&self, first: usize, last: usize) -> bool {
        if self.length() == 0 {
            return self.start() >= first && self.start() <= last;
        }
        self.start() <= last && self.end() - 1 >= first
    }

    /// Clip to the window `[line_start, line_start + line_len)` and make it window relative.
    ///
    /// Returns `None` when nothing of the range falls inside the window. An empty range sitting
    /// on the window (including its end) projects to an empty relative range.
    fn to_relative(&self, line_start: usize, line_len: usize) -> Option<Self> {
        let line_end = line_start + line_len;
        let (start, end) = (self.start(), self.end());
        if self.length() == 0 {
            if start < line_start || start > line_end {
                return None;
            }
        } else if end <= line_start || start >= line_end {
            return None;
        }
        let clipped_start = start.max(line_start);
        let clipped_end = end.min(line_end);
        let mut out = self.clone();
        out.set_start(clipped_start - line_start);
        out.set_length(clipped_end.saturating_sub(clipped_start));
        Some(out)
    }
}

/// Turn a possibly negative `length` into a forward `(start, length)` pair.
///
/// A negative length means the range was built from its end towards its start; the result
/// starts at `start + length`, saturating at 0.
pub fn normalize_range(start: usize, length: isize) -> (usize, usize) {
    if length >= 0 {
        (start, length as usize)
    } else {
        let back = length.unsigned_abs();
        let new_start = start.saturating_sub(back);
        (new_start, start - new_start)
    }
}

/// A sorted list of ranges.
#[derive(Debug, Clone)]
pub struct RangeCollection<T> {
    items: Vec<T>,
}

impl<T: TextRange> RangeCollection<T> {
    /// Empty collection.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Range at slot `i`.
    pub fn get_slot(&self, i: usize) -> Option<&T> {
        self.items.get(i)
    }

    /// Overwrite slot `i`. The caller keeps sort order.
    pub fn set_slot(&mut self, i: usize, item: T) {
        if let Some(slot) = self.items.get_mut(i) {
            *slot = item;
        }
    }

    /// First range.
    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    /// Last range.
    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    /// Iterate in start order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Insert keeping sort order, bubbling from the tail.
    pub fn add(&mut self, item: T) {
        self.items.push(item);
        let mut i = self.items.len() - 1;
        while i > 0 && self.items[i].start() < self.items[i - 1].start() {
            self.items.swap(i, i - 1);
            i -= 1;
        }
    }

    /// Slot of the range containing `index`.
    pub fn index_of(&self, index: usize) -> Option<usize> {
        self.index_of_nearest(index).ok()
    }

    /// `Ok(slot)` if a range contains `index`, otherwise `Err(nearest slot)`.
    ///
    /// The nearest slot is the first range starting after `index`, or the last range if none
    /// does. An empty collection reports `Err(0)`.
    pub fn index_of_nearest(&self, index: usize) -> Result<usize, usize> {
        let mut left = 0usize;
        let mut right = self.items.len();
        while left < right {
            let mid = (left + right) / 2;
            let item = &self.items[mid];
            if item.contains(index) {
                return Ok(mid);
            }
            if index < item.start() {
                right = mid;
            } else {
                left = mid + 1;
            }
        }
        Err(left.min(self.items.len().saturating_sub(1)))
    }

    /// The range containing `index`, if any.
    pub fn get_at(&self, index: usize) -> Option<&T> {
        self.index_of(index).map(|i| &self.items[i])
    }

    /// All ranges overlapping `[start, start + length)` (an empty query touches `start`).
    pub fn get(&self, start: usize, length: usize) -> impl Iterator<Item = &T> + '_ {
        let last = (start + length).saturating_sub(1).max(start);
        let from = self.scan_start(start);
        self.items[from..]
            .iter()
            .take_while(move |item| item.start() <= last)
            .filter(move |item| item.touches(start, last))
    }

    // Stored ranges do not overlap each other in practice; step back over any predecessor
    // that still reaches `start` anyway.
    fn scan_start(&self, start: usize) -> usize {
        let mut from = match self.index_of_nearest(start) {
            Ok(i) | Err(i) => i,
        };
        while from > 0 && self.items[from - 1].end() > start {
            from -= 1;
        }
        from.min(self.items.len())
    }

    /// Remove every range touching `[start, start + length)`.
    ///
    /// With `length == 0` the window is the insertion point and the character before it, so a
    /// typed character removes the ranges it lands in or right after.
    pub fn remove(&mut self, start: usize, length: usize) {
        let (first, last) = if length == 0 {
            (start.saturating_sub(1), start)
        } else {
            (start, start + length - 1)
        };
        self.items.retain(|r| !(r.length() > 0 && r.touches(first, last)));
    }

    /// Remove ranges overlapping `[start, start + length)`, leaving neighbours alone.
    pub fn remove_nearest(&mut self, start: usize, length: usize) {
        let last = (start + length).saturating_sub(1).max(start);
        self.items.retain(|r| !r.touches(start, last));
    }

    /// Remove the range in slot `i`.
    pub fn remove_at(&mut self, i: usize) -> Option<T> {
        (i < self.items.len()).then(|| self.items.remove(i))
    }

    /// Keep only the ranges for which `keep` returns `true`.
    pub fn retain<F: FnMut(&T) -> bool>(&mut self, keep: F) {
        self.items.retain(keep);
    }

    /// Move ranges through an edit that replaced `removed` chars at `start_index` with
    /// `inserted` chars.
    ///
    /// A range ending at or before `start_index` stays put. A range starting at or after it
    /// shifts by the length delta. A range straddling the edit point keeps its start; its end
    /// follows the text after the edit, so an insertion inside it grows it and a deletion
    /// clips it.
    pub fn shift(&mut self, start_index: usize, removed: usize, inserted: usize) {
        let removed_end = start_index + removed;
        let after = |pos: usize, inside: usize| {
            if pos >= removed_end {
                pos - removed + inserted
            } else {
                inside
            }
        };
        for item in &mut self.items {
            let (start, end) = (item.start(), item.end());
            if item.length() == 0 {
                if start >= start_index {
                    item.set_start(after(start, start_index + inserted));
                }
                continue;
            }
            if end <= start_index {
                continue;
            }
            if start < start_index {
                let new_end = after(end, start_index);
                item.set_length(new_end - start);
            } else {
                let new_start = after(start, start_index + inserted);
                let new_end = after(end, start_index + inserted);
                item.set_start(new_start);
                item.set_length(new_end - new_start);
            }
        }
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: TextRange> Default for RangeCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TextRange> FromIterator<T> for RangeCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut out = Self::new();
        for item in iter {
            out.add(item);
        }
        out
    }
}

impl<'a, T: TextRange> IntoIterator for &'a RangeCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A selected range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Selection {
    /// First selected character.
    pub start: usize,
    /// Selected characters.
    pub length: usize,
}

impl Selection {
    /// Create a selection; a negative `length` selects backwards from `start`.
    pub fn new(start: usize, length: isize) -> Self {
        let (start, length) = normalize_range(start, length);
        Self { start, length }
    }
}

impl TextRange for Selection {
    fn start(&self) -> usize {
        self.start
    }

    fn length(&self) -> usize {
        self.length
    }

    fn set_start(&mut self, start: usize) {
        self.start = start;
    }

    fn set_length(&mut self, length: usize) {
        self.length = length;
    }
}

/// The document's selections: one range in stream mode, one per row in rectangle mode.
pub type SelectCollection = RangeCollection<Selection>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sel(start: usize, length: usize) -> Selection {
        Selection { start, length }
    }

    #[test]
    fn test_add_keeps_sorted() {
        let mut c = RangeCollection::new();
        c.add(sel(10, 2));
        c.add(sel(2, 2));
        c.add(sel(6, 1));
        c.add(sel(20, 1));
        let starts: Vec<usize> = c.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![2, 6, 10, 20]);
    }

    #[test]
    fn test_index_of_nearest() {
        let c: SelectCollection = [sel(2, 2), sel(6, 1), sel(10, 2)].into_iter().collect();
        assert_eq!(c.index_of_nearest(3), Ok(0));
        assert_eq!(c.index_of_nearest(11), Ok(2));
        assert_eq!(c.index_of_nearest(5), Err(1));
        assert_eq!(c.index_of_nearest(50), Err(2));
        assert_eq!(c.index_of(4), None);
        assert_eq!(SelectCollection::new().index_of_nearest(3), Err(0));
    }

    #[test]
    fn test_get_overlapping() {
        let c: SelectCollection = [sel(0, 3), sel(5, 5), sel(12, 2), sel(20, 1)]
            .into_iter()
            .collect();
        let hits: Vec<usize> = c.get(4, 9).map(|s| s.start).collect();
        assert_eq!(hits, vec![5, 12]);
        let hits: Vec<usize> = c.get(7, 0).map(|s| s.start).collect();
        assert_eq!(hits, vec![5]);
    }

    #[test]
    fn test_get_steps_back_over_overlapping_predecessor() {
        let c: SelectCollection = [sel(0, 6), sel(4, 4), sel(12, 1)].into_iter().collect();
        let hits: Vec<usize> = c.get(5, 2).map(|s| s.start).collect();
        assert_eq!(hits, vec![0, 4]);
    }

    #[test]
    fn test_remove_touching_insertion_point() {
        let mut c: SelectCollection = [sel(0, 3), sel(5, 3), sel(10, 2)].into_iter().collect();
        // Typing right after the first range removes it.
        c.remove(3, 0);
        let starts: Vec<usize> = c.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![5, 10]);
        c.remove(6, 5);
        assert!(c.is_empty());
    }

    #[test]
    fn test_remove_nearest_only_overlapping() {
        let mut c: SelectCollection = [sel(0, 3), sel(5, 3), sel(10, 2)].into_iter().collect();
        c.remove_nearest(3, 2);
        assert_eq!(c.len(), 3);
        c.remove_nearest(7, 4);
        let starts: Vec<usize> = c.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0]);
    }

    #[test]
    fn test_shift() {
        let mut c: SelectCollection = [sel(0, 3), sel(5, 3), sel(10, 2)].into_iter().collect();
        c.shift(4, 0, 3);
        let starts: Vec<usize> = c.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0, 8, 13]);
        c.shift(3, 2, 0);
        let starts: Vec<usize> = c.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0, 6, 11]);
    }

    #[test]
    fn test_shift_keeps_start_of_straddling_range() {
        // "cdef" in "abcdefghij"
        let mut c: SelectCollection = [sel(2, 4)].into_iter().collect();
        c.shift(4, 0, 3);
        assert_eq!(c.get_slot(0), Some(&sel(2, 7)));

        let mut c: SelectCollection = [sel(2, 4)].into_iter().collect();
        c.shift(4, 2, 0);
        assert_eq!(c.get_slot(0), Some(&sel(2, 2)));

        // The deletion runs past the end of the range.
        let mut c: SelectCollection = [sel(2, 4)].into_iter().collect();
        c.shift(4, 5, 1);
        assert_eq!(c.get_slot(0), Some(&sel(2, 2)));
    }

    #[test]
    fn test_shift_range_inside_deletion() {
        let mut c: SelectCollection = [sel(5, 2), sel(6, 0)].into_iter().collect();
        c.shift(4, 4, 1);
        let items: Vec<Selection> = c.iter().copied().collect();
        assert_eq!(items, vec![sel(5, 0), sel(5, 0)]);
    }

    #[test]
    fn test_to_relative() {
        let line_start = 10;
        let line_len = 5;
        assert_eq!(sel(11, 2).to_relative(line_start, line_len), Some(sel(1, 2)));
        assert_eq!(sel(8, 4).to_relative(line_start, line_len), Some(sel(0, 2)));
        assert_eq!(sel(13, 10).to_relative(line_start, line_len), Some(sel(3, 2)));
        assert_eq!(sel(0, 40).to_relative(line_start, line_len), Some(sel(0, 5)));
        assert_eq!(sel(0, 10).to_relative(line_start, line_len), None);
        assert_eq!(sel(15, 3).to_relative(line_start, line_len), None);
        assert_eq!(sel(15, 0).to_relative(line_start, line_len), Some(sel(5, 0)));
    }

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize_range(5, 3), (5, 3));
        assert_eq!(normalize_range(5, -3), (2, 3));
        assert_eq!(normalize_range(2, -5), (0, 2));
        assert_eq!(Selection::new(9, -4), sel(5, 4));
    }
}
