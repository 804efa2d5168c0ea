//! Document notifications and listener registration.
//!
//! Every event kind has its own [`Listeners`] list. An empty list is the "no subscriber" state,
//! so notifying never needs a null check.

use std::fmt;

/// What a [`DocumentUpdate`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    /// A range was replaced.
    Replace,
    /// The whole text was dropped.
    Clear,
    /// The line table was rebuilt from scratch (after load or an explicit layout pass).
    RebuildLayout,
}

/// A change to the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentUpdate {
    /// Change kind.
    pub kind: UpdateKind,
    /// First affected character offset.
    pub start_index: usize,
    /// Characters removed at `start_index`.
    pub removed_length: usize,
    /// Characters inserted at `start_index`.
    pub inserted_length: usize,
    /// Set when a bulk replace rewrote exactly one row in place.
    pub row: Option<usize>,
}

impl DocumentUpdate {
    /// A replace of `removed` chars by `inserted` chars at `start`.
    pub fn replace(start: usize, removed: usize, inserted: usize) -> Self {
        Self {
            kind: UpdateKind::Replace,
            start_index: start,
            removed_length: removed,
            inserted_length: inserted,
            row: None,
        }
    }

    /// A replace confined to `row`, whose head index is `start`.
    pub fn replace_row(row: usize, start: usize, removed: usize, inserted: usize) -> Self {
        Self {
            row: Some(row),
            ..Self::replace(start, removed, inserted)
        }
    }

    /// The text (of length `removed`) was cleared.
    pub fn clear(removed: usize) -> Self {
        Self {
            kind: UpdateKind::Clear,
            start_index: 0,
            removed_length: removed,
            inserted_length: 0,
            row: None,
        }
    }

    /// The layout of a document of length `len` was rebuilt.
    pub fn rebuild_layout(len: usize) -> Self {
        Self {
            kind: UpdateKind::RebuildLayout,
            start_index: 0,
            removed_length: 0,
            inserted_length: len,
            row: None,
        }
    }

    /// `inserted - removed`.
    pub fn delta(&self) -> isize {
        self.inserted_length as isize - self.removed_length as isize
    }
}

/// Which document property changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// Tab stop width.
    TabStops,
    /// Line break mode or its char count.
    LineBreak,
    /// Right-to-left flow.
    RightToLeft,
    /// Full-width space marks.
    ShowFullSpace,
    /// Half-width space marks.
    ShowHalfSpace,
    /// Tab marks.
    ShowTab,
    /// Line break marks.
    ShowLineBreak,
    /// Insert/overwrite mode.
    InsertMode,
    /// Caret visibility.
    HideCaret,
    /// Current line marker visibility.
    HideLineMarker,
    /// Ruler visibility.
    HideRuler,
    /// Line number gutter.
    DrawLineNumber,
    /// URL marking.
    UrlMark,
    /// Stream vs rectangular selection.
    RectSelection,
    /// Tab vs space indentation.
    IndentMode,
    /// Caret moved.
    CaretPosition,
    /// Selection anchor moved.
    AnchorIndex,
    /// Selection set changed.
    Selection,
    /// Unsaved-changes flag.
    Dirty,
    /// Fold expand/collapse state.
    Folding,
}

/// Long running operation reported through progress listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressKind {
    /// Streaming load.
    Load,
    /// Streaming save.
    Save,
}

/// Start/end of a load or save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressEvent {
    /// The operation started.
    Begin(ProgressKind),
    /// The operation finished; `completed` is `false` on cancellation or error.
    End {
        /// Which operation.
        kind: ProgressKind,
        /// Whether it ran to completion.
        completed: bool,
    },
}

/// Handle returned by [`Listeners::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// An ordered list of callbacks for one event type.
pub struct Listeners<E> {
    callbacks: Vec<(SubscriptionId, Box<dyn FnMut(&E) + Send>)>,
    next_id: u64,
}

impl<E> Listeners<E> {
    /// Empty list.
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
            next_id: 0,
        }
    }

    /// Register `callback`; it is called in registration order.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&E) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.callbacks.push((id, Box::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cid, _)| *cid != id);
        before != self.callbacks.len()
    }

    /// Call every registered callback.
    pub fn notify(&mut self, event: &E) {
        for (_, callback) in &mut self.callbacks {
            callback(event);
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Returns `true` when nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.callbacks.len())
            .finish()
    }
}
