//! Gap buffer: a sequence with a movable hole at the last edit point.
//!
//! The backing store looks like
//!
//! ```text
//!  [ before gap | gap (None slots) | after gap ]
//!    0..gap_start  gap_start..gap_end  gap_end..buf.len()
//! ```
//!
//! Edits move the gap to the edit position first, so a run of nearby edits (typing) costs
//! O(1) each and a jump costs O(distance to the gap). Gap slots hold `None`; for `char` and
//! most records `Option<T>` has the same size as `T`.

use crate::error::{EngineError, Result, check_range};
use std::fmt;
use std::ops::Index;

const MIN_GAP: usize = 64;

/// A generic gap buffer.
///
/// It backs both the document text (`GapBuffer<char>`) and the line table rows.
pub struct GapBuffer<T> {
    buf: Vec<Option<T>>,
    gap_start: usize,
    gap_end: usize,
}

impl<T> GapBuffer<T> {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty buffer whose gap can take `capacity` items without growing.
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = capacity.max(MIN_GAP);
        let mut buf = Vec::with_capacity(cap);
        buf.resize_with(cap, || None);
        Self {
            buf,
            gap_start: 0,
            gap_end: cap,
        }
    }

    /// Number of items, excluding the gap.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len() - self.gap_len()
    }

    /// Returns `true` when the buffer holds no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slots including the gap.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    fn gap_len(&self) -> usize {
        self.gap_end - self.gap_start
    }

    #[inline]
    fn physical(&self, index: usize) -> usize {
        if index < self.gap_start {
            index
        } else {
            index + self.gap_len()
        }
    }

    /// Item at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }
        self.buf[self.physical(index)].as_ref()
    }

    /// Mutable item at `index`, or `None` past the end.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len() {
            return None;
        }
        let phys = self.physical(index);
        self.buf[phys].as_mut()
    }

    /// Last item.
    pub fn last(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    fn move_gap(&mut self, index: usize) {
        let gap = self.gap_len();
        if index < self.gap_start {
            self.buf[index..self.gap_end].rotate_right(gap);
        } else if index > self.gap_start {
            self.buf[self.gap_start..index + gap].rotate_left(gap);
        }
        self.gap_start = index;
        self.gap_end = index + gap;
    }

    fn ensure_gap(&mut self, needed: usize) {
        if self.gap_len() >= needed {
            return;
        }
        let extra = needed.max(self.buf.len()).max(MIN_GAP);
        let at = self.gap_end;
        self.buf
            .splice(at..at, std::iter::repeat_with(|| None).take(extra));
        self.gap_end += extra;
    }

    /// Insert `items` before `index`.
    pub fn insert<I>(&mut self, index: usize, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        check_range(index, 0, self.len())?;
        self.move_gap(index);
        let iter = items.into_iter();
        self.ensure_gap(iter.size_hint().0);
        for item in iter {
            self.ensure_gap(1);
            self.buf[self.gap_start] = Some(item);
            self.gap_start += 1;
        }
        Ok(())
    }

    /// Insert one item before `index`.
    pub fn insert_one(&mut self, index: usize, item: T) -> Result<()> {
        self.insert(index, std::iter::once(item))
    }

    /// Append items at the end.
    pub fn append<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        let len = self.len();
        // `len` is always a valid insertion point.
        let _ = self.insert(len, items);
    }

    /// Remove `count` items starting at `index` and return them.
    pub fn remove_range(&mut self, index: usize, count: usize) -> Result<Vec<T>> {
        check_range(index, count, self.len())?;
        self.move_gap(index);
        let removed = self.buf[self.gap_end..self.gap_end + count]
            .iter_mut()
            .filter_map(Option::take)
            .collect();
        self.gap_end += count;
        Ok(removed)
    }

    /// Replace `count` items at `index` with `items`, returning the removed ones.
    pub fn splice<I>(&mut self, index: usize, count: usize, items: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = T>,
    {
        let removed = self.remove_range(index, count)?;
        self.insert(index, items)?;
        Ok(removed)
    }

    /// Remove every item.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.buf.resize_with(MIN_GAP, || None);
        self.gap_start = 0;
        self.gap_end = MIN_GAP;
    }

    /// Iterate over all items in order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.buf[..self.gap_start]
            .iter()
            .chain(self.buf[self.gap_end..].iter())
            .filter_map(Option::as_ref)
    }

    /// Iterate over `count` items starting at `index`.
    pub fn iter_range(
        &self,
        index: usize,
        count: usize,
    ) -> Result<impl Iterator<Item = &T> + '_> {
        check_range(index, count, self.len())?;
        let (head, tail) = self.slices(index, count);
        Ok(head.iter().chain(tail.iter()).filter_map(Option::as_ref))
    }

    fn slices(&self, index: usize, count: usize) -> (&[Option<T>], &[Option<T>]) {
        let end = index + count;
        let gap = self.gap_len();
        if end <= self.gap_start {
            (&self.buf[index..end], &[])
        } else if index >= self.gap_start {
            (&self.buf[index + gap..end + gap], &[])
        } else {
            (&self.buf[index..self.gap_start], &self.buf[self.gap_end..end + gap])
        }
    }

    /// Iterate mutably over all items.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        let (before, rest) = self.buf.split_at_mut(self.gap_start);
        let after = &mut rest[self.gap_end - self.gap_start..];
        before
            .iter_mut()
            .chain(after.iter_mut())
            .filter_map(Option::as_mut)
    }
}

impl<T: Clone> GapBuffer<T> {
    /// Copy `count` items starting at `index`.
    pub fn to_vec_range(&self, index: usize, count: usize) -> Result<Vec<T>> {
        Ok(self.iter_range(index, count)?.cloned().collect())
    }
}

impl GapBuffer<char> {
    /// Collect `count` chars starting at `index` into a `String`.
    pub fn range_to_string(&self, index: usize, count: usize) -> Result<String> {
        Ok(self.iter_range(index, count)?.collect())
    }
}

impl<T> Default for GapBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for GapBuffer<T> {
    fn clone(&self) -> Self {
        let mut out = Self::with_capacity(self.len() + MIN_GAP);
        out.append(self.iter().cloned());
        out
    }
}

impl<T: fmt::Debug> fmt::Debug for GapBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> FromIterator<T> for GapBuffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut out = Self::new();
        out.append(iter);
        out
    }
}

impl<T> Extend<T> for GapBuffer<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.append(iter);
    }
}

impl From<&str> for GapBuffer<char> {
    fn from(text: &str) -> Self {
        text.chars().collect()
    }
}

impl fmt::Display for GapBuffer<char> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write;
        for ch in self.iter() {
            f.write_char(*ch)?;
        }
        Ok(())
    }
}

impl<T> Index<usize> for GapBuffer<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(item) => item,
            None => panic!("{}", EngineError::OutOfRange {
                index,
                length: 1,
                len: self.len()
            }),
        }
    }
}

impl<T: PartialEq> PartialEq for GapBuffer<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for GapBuffer<T> {}
