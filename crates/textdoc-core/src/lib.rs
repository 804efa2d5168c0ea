#![warn(missing_docs)]
//! textdoc-core - Text Document Engine for Editor Controls
//!
//! # Overview
//!
//! `textdoc-core` is the document layer behind a text editing control. It owns the text, keeps a
//! row table in step with every edit, and tracks the per-row state a view needs: dirty flags,
//! cached layouts, syntax spans, folds, markers and selections. Drawing is left to the host,
//! which plugs in a [`TextRender`].
//!
//! # Core Features
//!
//! - **Gap Buffer Storage**: amortised O(1) edits near the last edit point, shared behind a lock
//! - **Lazy Row Index**: deferred head shifting, so an edit only re-splits the rows it touches
//! - **Undo Log**: typing merges into one step, groups undo as a unit
//! - **Folding**: interval tree of nested folds with expand/collapse and hidden-row queries
//! - **Markers**: highlight ranges by id that follow edits, plus regex watchdog patterns
//! - **Search**: regex and literal search, resumable across replacements, row-wise replace-all
//! - **Async I/O**: chunked, cancellable load and save on `tokio` readers and writers
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Document (edits, undo, events, search)     │  ← Public API
//! ├─────────────────────────────────────────────┤
//! │  Markers / Selections / Folding             │  ← Range State
//! ├─────────────────────────────────────────────┤
//! │  Line Table + Generators + Layout Cache     │  ← Row Metadata
//! ├─────────────────────────────────────────────┤
//! │  Lazy Row Index                             │  ← Row Access
//! ├─────────────────────────────────────────────┤
//! │  Text Store (Gap Buffer)                    │  ← Text Storage
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use textdoc_core::{Document, TextPoint};
//!
//! let mut doc = Document::new();
//! doc.replace(0, 0, "hello\nworld").unwrap();
//!
//! assert_eq!(doc.line_count(), 2);
//! assert_eq!(doc.get_line_text(1).unwrap(), "world");
//! assert_eq!(doc.text_point_from_index(6).unwrap(), TextPoint::new(1, 0));
//!
//! doc.undo().unwrap();
//! assert!(doc.is_empty());
//! ```
//!
//! ## Search and Replace
//!
//! ```rust
//! use textdoc_core::{Document, SearchOptions};
//!
//! let mut doc = Document::from_text("Foo foo FOO").unwrap();
//! let options = SearchOptions { case_sensitive: false, ..SearchOptions::default() };
//! doc.set_find_param("foo", false, options).unwrap();
//! doc.replace_all("bar", false).unwrap();
//! assert_eq!(doc.text().unwrap(), "bar bar bar");
//!
//! // A replace-all is one undo step.
//! doc.undo().unwrap();
//! assert_eq!(doc.text().unwrap(), "Foo foo FOO");
//! ```
//!
//! # Module Description
//!
//! - [`gap_buffer`] - Gap buffer
//! - [`text_store`] - Shared text store, async load/save, QuickSearch
//! - [`rows`] - Row records and the lazily shifted row index
//! - [`line_table`] - Row splitting, projections, dirty flags, layout cache
//! - [`folding`] / [`highlight`] - Line info generators
//! - [`markers`] / [`ranges`] - Markers and selections
//! - [`undo`] - Undo log
//! - [`search`] - Regex and literal search
//! - [`document`] - The facade tying it together
//!
//! # Offsets
//!
//! Every index is a character (Unicode scalar) offset. The line break inside the buffer is always
//! `\n`; carriage returns are stripped on load and the configured [`LineEnding`] is written on
//! save.

pub mod cancel;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod folding;
pub mod gap_buffer;
pub mod generator;
pub mod highlight;
pub mod intervals;
pub mod layout;
pub mod line_ending;
pub mod line_table;
pub mod markers;
pub mod ranges;
pub mod render;
pub mod rows;
pub mod search;
pub mod text_point;
pub mod text_store;
pub mod undo;

pub use cancel::{CancelHandle, CancelToken, cancel_pair};
pub use config::{EngineConfig, IndentMode, LineBreakMethod};
pub use document::{Document, DocumentReader};
pub use error::{EngineError, Result};
pub use events::{
    DocumentUpdate, Listeners, ProgressEvent, ProgressKind, StatusKind, SubscriptionId,
    UpdateKind,
};
pub use folding::{FoldingCollection, FoldingItem, FoldingStrategy};
pub use gap_buffer::GapBuffer;
pub use generator::{Clock, ManualClock, SystemClock};
pub use highlight::{EncloserType, Highlighter, SyntaxSpan, TokenType};
pub use layout::{MonospaceLayout, MonospaceRender};
pub use line_ending::LineEnding;
pub use line_table::LineTable;
pub use markers::{
    Color, HilightType, Marker, MarkerCollection, MarkerIds, MarkerPattern, RegexMarkerPattern,
};
pub use ranges::{SelectCollection, Selection, TextRange};
pub use render::{AlignDirection, LayoutInput, Point, TextLayout, TextRender};
pub use rows::{LineRecord, RowIndex};
pub use search::{FindParams, SearchCursor, SearchOptions, SearchResult};
pub use text_point::{TextPoint, TextRectangle};
pub use text_store::{QuickSearch, TextStore};
pub use undo::UndoManager;
