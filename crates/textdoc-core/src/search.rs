//! Regex and literal search over the live buffer.
//!
//! All public offsets are **character offsets**. A [`SearchCursor`] scans the buffer row by row
//! (one `\n`-terminated line at a time) and can be resumed after the caller replaced the hit it
//! just returned: when the buffer length changed since the previous step, the cursor moves its
//! scan position and end by the observed delta instead of failing. A resumed scan still reads
//! the row from its head, so `^` and whole-word checks see the text before the resume point.

use crate::error::{EngineError, Result};
use crate::gap_buffer::GapBuffer;
use crate::markers::{Color, HilightType, RegexMarkerPattern};
use crate::text_store::NEW_LINE;
use regex::{Captures, Regex, RegexBuilder};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// Options that control how a pattern is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// If `true`, performs a case-sensitive search.
    pub case_sensitive: bool,
    /// If `true`, matches only whole words (alphanumeric and `_`).
    pub whole_word: bool,
    /// If `true`, `^` and `$` match at line boundaries inside a row.
    pub multi_line: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            whole_word: false,
            multi_line: true,
        }
    }
}

/// A hit, as a half-open character range plus the matched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// First character of the hit.
    pub start: usize,
    /// One past the last character of the hit.
    pub end: usize,
    /// The matched text.
    pub value: String,
    /// Row text the hit was found in, kept to expand group references later.
    line: Arc<str>,
    byte_start: usize,
}

impl SearchResult {
    /// Length of the hit in characters.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` for an empty hit.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug)]
pub(crate) struct CharIndex {
    char_to_byte: Vec<usize>,
    text_len: usize,
}

impl CharIndex {
    pub(crate) fn new(text: &str) -> Self {
        let mut char_to_byte: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        char_to_byte.push(text.len());
        Self {
            char_to_byte,
            text_len: text.len(),
        }
    }

    pub(crate) fn char_count(&self) -> usize {
        self.char_to_byte.len().saturating_sub(1)
    }

    pub(crate) fn byte_to_char(&self, byte_offset: usize) -> usize {
        let clamped = byte_offset.min(self.text_len);
        match self.char_to_byte.binary_search(&clamped) {
            Ok(idx) => idx,
            Err(idx) => idx,
        }
    }

    fn char_to_byte(&self, char_offset: usize) -> usize {
        self.char_to_byte[char_offset.min(self.char_count())]
    }

    fn char_at(&self, text: &str, char_offset: usize) -> Option<char> {
        if char_offset >= self.char_count() {
            return None;
        }
        let start = self.char_to_byte[char_offset];
        let end = self.char_to_byte[char_offset + 1];
        text.get(start..end)?.chars().next()
    }
}

fn is_word_char(ch: char) -> bool {
    ch == '_' || ch.is_alphanumeric()
}

fn is_whole_word(text: &str, index: &CharIndex, start: usize, end: usize) -> bool {
    if start == end {
        return false;
    }
    let before = match start {
        0 => None,
        _ => index.char_at(text, start - 1),
    };
    let after = index.char_at(text, end);
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

/// A compiled find pattern.
#[derive(Debug, Clone)]
pub struct FindParams {
    regex: Regex,
    whole_word: bool,
}

impl FindParams {
    /// Compile `pattern`. Without `use_regex` it is matched literally.
    pub fn new(pattern: &str, use_regex: bool, options: SearchOptions) -> Result<Self> {
        if pattern.is_empty() {
            return Err(EngineError::InvalidArgument("empty search pattern"));
        }
        let source = if use_regex {
            pattern.to_string()
        } else {
            regex::escape(pattern)
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(!options.case_sensitive)
            .multi_line(options.multi_line)
            .build()?;
        Ok(Self {
            regex,
            whole_word: options.whole_word,
        })
    }

    /// The compiled regex.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// A marker pattern that highlights every hit of this pattern.
    pub fn marker_pattern(&self, hilight: HilightType, color: Color) -> RegexMarkerPattern {
        RegexMarkerPattern::new(self.regex.clone(), hilight, color)
    }

    /// `replacement` with `$1`, `${name}` and friends expanded from `result`'s groups.
    pub fn expand(&self, result: &SearchResult, replacement: &str) -> String {
        let mut out = String::new();
        match self.regex.captures_at(&result.line, result.byte_start) {
            Some(caps) => caps.expand(replacement, &mut out),
            None => out.push_str(replacement),
        }
        out
    }

    fn accepts(&self, line: &str, index: &CharIndex, byte_start: usize, byte_end: usize) -> bool {
        !self.whole_word
            || is_whole_word(
                line,
                index,
                index.byte_to_char(byte_start),
                index.byte_to_char(byte_end),
            )
    }

    /// Hits in one row that start at or after char `from` and end at or before char `until`,
    /// both relative to the row. The regex always sees the whole row, so anchors and word
    /// boundaries judge the real context.
    fn matches_in(&self, line: &Arc<str>, line_start: usize, from: usize, until: usize) -> Vec<SearchResult> {
        let index = CharIndex::new(line);
        let mut out = Vec::new();
        let mut at = index.char_to_byte(from);
        while at <= line.len() {
            let Some(m) = self.regex.find_at(line, at) else {
                break;
            };
            if m.is_empty() {
                match line[m.end()..].chars().next() {
                    Some(ch) => at = m.end() + ch.len_utf8(),
                    None => break,
                }
                continue;
            }
            let end = index.byte_to_char(m.end());
            if end > until {
                break;
            }
            if self.accepts(line, &index, m.start(), m.end()) {
                out.push(SearchResult {
                    start: line_start + index.byte_to_char(m.start()),
                    end: line_start + end,
                    value: m.as_str().to_string(),
                    line: Arc::clone(line),
                    byte_start: m.start(),
                });
            }
            at = m.end();
        }
        out
    }

    /// Replace every hit in `line`. Returns `None` when nothing matched.
    ///
    /// With `group_replace` the replacement may reference groups; otherwise it is inserted
    /// verbatim.
    pub(crate) fn replace_line(&self, line: &str, replacement: &str, group_replace: bool) -> Option<String> {
        let index = CharIndex::new(line);
        let mut replaced = false;
        let out = self.regex.replace_all(line, |caps: &Captures<'_>| {
            let Some(m) = caps.get(0) else {
                return String::new();
            };
            if !self.accepts(line, &index, m.start(), m.end()) {
                return m.as_str().to_string();
            }
            replaced = true;
            if group_replace {
                let mut dst = String::new();
                caps.expand(replacement, &mut dst);
                dst
            } else {
                replacement.to_string()
            }
        });
        replaced.then(|| out.into_owned())
    }
}

/// Resumable row-by-row scan over `[start, end)`.
#[derive(Debug, Clone)]
pub struct SearchCursor {
    pos: usize,
    end: usize,
    observed_len: usize,
    last_end: Option<usize>,
    pending: VecDeque<SearchResult>,
}

impl SearchCursor {
    pub(crate) fn new(start: usize, end: usize, text_len: usize) -> Self {
        Self {
            pos: start,
            end,
            observed_len: text_len,
            last_end: None,
            pending: VecDeque::new(),
        }
    }

    /// Next hit, or `None` once the range is exhausted.
    pub(crate) fn next_in(&mut self, params: &FindParams, text: &GapBuffer<char>) -> Result<Option<SearchResult>> {
        let len = text.len();
        if len != self.observed_len {
            // The caller replaced the previous hit: resume right after its replacement.
            let delta = len as isize - self.observed_len as isize;
            if let Some(last_end) = self.last_end {
                self.pos = last_end.saturating_add_signed(delta);
            }
            self.end = self.end.saturating_add_signed(delta);
            self.observed_len = len;
            self.pending.clear();
            trace!(target: "textdoc.search", delta, pos = self.pos, "resync");
        }

        loop {
            if let Some(hit) = self.pending.pop_front() {
                self.last_end = Some(hit.end);
                return Ok(Some(hit));
            }
            let end = self.end.min(len);
            if self.pos >= end {
                return Ok(None);
            }

            // Read the whole row holding `pos`, from its head to its terminator.
            let from = self.pos;
            let mut line_start = from;
            while line_start > 0 && text.get(line_start - 1).is_some_and(|ch| *ch != NEW_LINE) {
                line_start -= 1;
            }
            let mut line = String::new();
            let mut row_end = line_start;
            for ch in text.iter_range(line_start, len - line_start)? {
                line.push(*ch);
                row_end += 1;
                if *ch == NEW_LINE {
                    break;
                }
            }
            self.pos = row_end;
            let line: Arc<str> = line.into();
            self.pending.extend(params.matches_in(
                &line,
                line_start,
                from - line_start,
                end - line_start,
            ));
        }
    }
}
