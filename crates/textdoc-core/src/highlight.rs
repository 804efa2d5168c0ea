//! Syntax highlighting hooks.
//!
//! A [`Highlighter`] tokenises one row at a time and reports an encloser level so constructs that
//! span rows (block comments, heredocs) can be tracked. [`SyntaxHighlightGenerator`] runs it over
//! every row when asked and stores the spans on the row records.

use crate::gap_buffer::GapBuffer;
use crate::generator::{Clock, LineInfoGenerator, Throttle};
use crate::rows::RowIndex;
use crate::text_store::NEW_LINE;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Token classes a highlighter can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TokenType {
    /// Plain text; not stored.
    #[default]
    None,
    /// Primary keywords.
    Keyword1,
    /// Secondary keywords.
    Keyword2,
    /// Comments.
    Comment,
    /// String and number literals.
    Literal,
    /// Control characters; not stored.
    Control,
}

/// A highlighted span, relative to the start of its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyntaxSpan {
    /// First character, relative to the row head.
    pub index: usize,
    /// Length in characters.
    pub length: usize,
    /// Token class.
    pub token: TokenType,
}

impl SyntaxSpan {
    /// Create a span.
    pub fn new(index: usize, length: usize, token: TokenType) -> Self {
        Self {
            index,
            length,
            token,
        }
    }
}

/// Where a row sits relative to a construct spanning several rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncloserType {
    /// Outside any construct.
    #[default]
    None,
    /// The row opens a construct.
    Begin,
    /// The row is inside a construct.
    Now,
    /// The row closes a construct.
    End,
}

impl EncloserType {
    fn from_levels(before: i32, after: i32) -> Self {
        match (before > 0, after > 0) {
            (false, true) => Self::Begin,
            (true, true) => Self::Now,
            (true, false) => Self::End,
            (false, false) => Self::None,
        }
    }
}

/// Row tokenizer.
pub trait Highlighter: Send {
    /// Forget state carried across rows.
    fn reset(&mut self);

    /// Tokenise `text`, calling `emit` with `(index, length, token)` in characters.
    ///
    /// Returns the encloser level change: positive when the row opens a multi-row construct,
    /// negative when it closes one, zero otherwise.
    fn highlight(&mut self, text: &str, emit: &mut dyn FnMut(usize, usize, TokenType)) -> i32;
}

/// Runs the installed [`Highlighter`] over every row.
pub struct SyntaxHighlightGenerator {
    highlighter: Option<Box<dyn Highlighter>>,
    throttle: Throttle,
}

impl SyntaxHighlightGenerator {
    /// Generator without a highlighter.
    pub fn new(clock: Arc<dyn Clock>, quantum: Duration) -> Self {
        Self {
            highlighter: None,
            throttle: Throttle::new(clock, quantum),
        }
    }

    /// Install or remove the highlighter. Existing spans are kept until the next pass.
    pub fn set_highlighter(&mut self, highlighter: Option<Box<dyn Highlighter>>) {
        self.highlighter = highlighter;
        self.throttle.invalidate();
    }

    /// Returns `true` when a highlighter is installed.
    pub fn has_highlighter(&self) -> bool {
        self.highlighter.is_some()
    }

    /// Returns `true` when the spans reflect the current text.
    pub fn is_synced(&self) -> bool {
        self.throttle.is_synced()
    }

    fn highlight_row(highlighter: &mut dyn Highlighter, text: &str) -> (Vec<SyntaxSpan>, i32) {
        let chars: Vec<char> = text.chars().collect();
        let mut spans = Vec::new();
        let level = highlighter.highlight(text, &mut |index, length, token| {
            if matches!(token, TokenType::None | TokenType::Control) || length == 0 {
                return;
            }
            let mut length = length;
            if chars.get(index + length - 1) == Some(&NEW_LINE) {
                length -= 1;
            }
            if length > 0 {
                spans.push(SyntaxSpan::new(index, length, token));
            }
        });
        (spans, level)
    }
}

impl LineInfoGenerator for SyntaxHighlightGenerator {
    fn update(&mut self, _start: usize, _inserted: usize, _removed: usize) {
        self.throttle.mark_edited();
    }

    fn clear(&mut self, rows: &mut RowIndex) {
        for record in rows.records_mut() {
            record.set_syntax(Vec::new());
            record.set_encloser(EncloserType::None);
            record.clear_layout();
        }
        self.throttle.invalidate();
    }

    fn generate(&mut self, text: &GapBuffer<char>, rows: &mut RowIndex, force: bool) -> bool {
        let Some(highlighter) = self.highlighter.as_deref_mut() else {
            return false;
        };
        if !self.throttle.should_generate(force) {
            return false;
        }

        let mut level = 0i32;
        for row in 0..rows.len() {
            let head = rows.head_of(row);
            let line = match text.range_to_string(head, rows.length_of(row)) {
                Ok(line) => line,
                Err(_) => break,
            };
            let (spans, delta) = Self::highlight_row(highlighter, &line);
            let after = (level + delta).max(0);
            if let Some(record) = rows.record_mut(row) {
                record.set_syntax(spans);
                record.set_encloser(EncloserType::from_levels(level, after));
                record.clear_layout();
            }
            level = after;
        }
        highlighter.reset();
        self.throttle.mark_generated();
        trace!(target: "textdoc.lines", rows = rows.len(), "highlight pass");
        true
    }
}

impl fmt::Debug for SyntaxHighlightGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxHighlightGenerator")
            .field("highlighter", &self.highlighter.is_some())
            .field("throttle", &self.throttle)
            .finish()
    }
}
