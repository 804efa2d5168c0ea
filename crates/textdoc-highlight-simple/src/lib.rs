//! `textdoc-highlight-simple` - Simple (regex-based) highlighters and folding strategies for
//! `textdoc-core`.
//!
//! This crate is intended for lightweight formats (JSON/INI/C-like braces) where a full parser is
//! unnecessary.

use regex::Regex;
use textdoc_core::{FoldingItem, FoldingStrategy, GapBuffer, Highlighter, TokenType};

/// A single regex highlighting rule.
#[derive(Debug, Clone)]
pub struct RegexRule {
    regex: Regex,
    token: TokenType,
    capture_group: Option<usize>,
}

impl RegexRule {
    /// Color every match of `pattern` as `token`.
    pub fn new(pattern: &str, token: TokenType) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            token,
            capture_group: None,
        })
    }

    /// Highlight only a capture group of each match.
    ///
    /// Example (INI key):
    /// - pattern: `^\\s*([^=\\s]+)\\s*=`
    /// - capture_group: `1` (the key)
    pub fn with_capture_group(mut self, group: usize) -> Self {
        self.capture_group = Some(group);
        self
    }

    /// Token reported for this rule's matches.
    pub fn token(&self) -> TokenType {
        self.token
    }

    /// Byte ranges this rule colors in `text`.
    fn byte_ranges(&self, text: &str) -> Vec<(usize, usize)> {
        match self.capture_group {
            Some(group) => self
                .regex
                .captures_iter(text)
                .filter_map(|caps| caps.get(group))
                .map(|m| (m.start(), m.end()))
                .collect(),
            None => self
                .regex
                .find_iter(text)
                .map(|m| (m.start(), m.end()))
                .collect(),
        }
    }
}

/// A simple regex-based syntax highlighter.
///
/// Rules are tried in order and the first rule to claim a character wins. An optional block
/// comment pair is tracked across rows, so a comment opened on one row colors the following rows
/// until it is closed.
///
/// Designed for simple formats (JSON/INI/etc.). It is *not* intended to be a full parser.
#[derive(Debug, Clone)]
pub struct RegexHighlighter {
    rules: Vec<RegexRule>,
    block_comment: Option<(String, String)>,
    in_block: bool,
}

impl RegexHighlighter {
    /// A highlighter running `rules`.
    pub fn new(rules: Vec<RegexRule>) -> Self {
        Self {
            rules,
            block_comment: None,
            in_block: false,
        }
    }

    /// Track `open` .. `close` as a block comment. Empty delimiters are ignored.
    pub fn with_block_comment(mut self, open: &str, close: &str) -> Self {
        if !open.is_empty() && !close.is_empty() {
            self.block_comment = Some((open.to_string(), close.to_string()));
        }
        self
    }

    /// The rules, in priority order.
    pub fn rules(&self) -> &[RegexRule] {
        &self.rules
    }

    /// A small default JSON grammar (strings, numbers, booleans, null).
    pub fn json_default() -> Result<Self, regex::Error> {
        Ok(Self::new(vec![
            // JSON string (single-line, handles escapes)
            RegexRule::new(r#""(?:\\.|[^"\\])*""#, TokenType::Literal)?,
            // JSON number
            RegexRule::new(r#"-?(?:0|[1-9]\d*)(?:\.\d+)?(?:[eE][+-]?\d+)?"#, TokenType::Literal)?,
            // JSON boolean / null
            RegexRule::new(r#"\b(?:true|false)\b"#, TokenType::Keyword1)?,
            RegexRule::new(r#"\bnull\b"#, TokenType::Keyword2)?,
        ]))
    }

    /// A small default INI grammar (section, key, comment).
    pub fn ini_default() -> Result<Self, regex::Error> {
        Ok(Self::new(vec![
            // Comment: ;... or #...
            RegexRule::new(r#"(?m)^\s*[;#].*$"#, TokenType::Comment)?,
            // Section header: [section]
            RegexRule::new(r#"^\s*\[([^\]]+)\]\s*$"#, TokenType::Keyword1)?.with_capture_group(1),
            // Key: key = value
            RegexRule::new(r#"^\s*([^=\s]+)\s*="#, TokenType::Keyword2)?.with_capture_group(1),
        ]))
    }

    /// A C-like grammar: `//` and `/* */` comments, string literals and a keyword list.
    pub fn c_like(keywords: &[&str]) -> Result<Self, regex::Error> {
        let mut rules = vec![
            RegexRule::new(r#"//.*"#, TokenType::Comment)?,
            RegexRule::new(r#""(?:\\.|[^"\\])*""#, TokenType::Literal)?,
            RegexRule::new(r#"\b\d+(?:\.\d+)?\b"#, TokenType::Literal)?,
        ];
        if !keywords.is_empty() {
            let alternation: Vec<String> = keywords.iter().map(|k| regex::escape(k)).collect();
            rules.push(RegexRule::new(
                &format!(r"\b(?:{})\b", alternation.join("|")),
                TokenType::Keyword1,
            )?);
        }
        Ok(Self::new(rules).with_block_comment("/*", "*/"))
    }

    /// Run the rules over `text[from..to]` (bytes), skipping already claimed bytes.
    fn run_rules(&self, text: &str, from: usize, to: usize, claimed: &mut [bool], spans: &mut Vec<(usize, usize, TokenType)>) {
        let segment = &text[from..to];
        for rule in &self.rules {
            for (start, end) in rule.byte_ranges(segment) {
                let (start, end) = (from + start, from + end);
                if start >= end || claimed[start..end].iter().any(|c| *c) {
                    continue;
                }
                claimed[start..end].iter_mut().for_each(|c| *c = true);
                spans.push((start, end, rule.token));
            }
        }
    }
}

impl Highlighter for RegexHighlighter {
    fn reset(&mut self) {
        self.in_block = false;
    }

    fn highlight(&mut self, text: &str, emit: &mut dyn FnMut(usize, usize, TokenType)) -> i32 {
        let mut spans = Vec::new();
        let mut claimed = vec![false; text.len()];
        let mut level = 0i32;
        let mut pos = 0usize;

        while pos < text.len() {
            let Some((open, close)) = self.block_comment.as_ref() else {
                self.run_rules(text, pos, text.len(), &mut claimed, &mut spans);
                break;
            };
            if self.in_block {
                let end = match text[pos..].find(close.as_str()) {
                    Some(at) => {
                        self.in_block = false;
                        level -= 1;
                        pos + at + close.len()
                    }
                    None => text.len(),
                };
                claimed[pos..end].iter_mut().for_each(|c| *c = true);
                spans.push((pos, end, TokenType::Comment));
                pos = end;
                continue;
            }

            // A block opener inside a line comment or string does not count.
            let mut line_spans = Vec::new();
            self.run_rules(text, pos, text.len(), &mut vec![false; text.len()], &mut line_spans);
            let opener = text[pos..]
                .match_indices(open.as_str())
                .map(|(at, _)| pos + at)
                .find(|at| !line_spans.iter().any(|(s, e, _)| s <= at && at < e));
            match opener {
                Some(at) => {
                    self.run_rules(text, pos, at, &mut claimed, &mut spans);
                    let body = at + open.len();
                    let end = match text[body..].find(close.as_str()) {
                        Some(rel) => body + rel + close.len(),
                        None => {
                            self.in_block = true;
                            level += 1;
                            text.len()
                        }
                    };
                    claimed[at..end].iter_mut().for_each(|c| *c = true);
                    spans.push((at, end, TokenType::Comment));
                    pos = end;
                }
                None => {
                    self.run_rules(text, pos, text.len(), &mut claimed, &mut spans);
                    break;
                }
            }
        }

        spans.sort_by_key(|(start, _, _)| *start);
        for (start, end, token) in spans {
            let index = text[..start].chars().count();
            let length = text[start..end].chars().count();
            emit(index, length, token);
        }
        level
    }
}

/// Folds every `begin` .. `end` character pair, nesting by a stack.
///
/// An unmatched `end` is ignored, as are pairs with nothing between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharFoldingStrategy {
    begin: char,
    end: char,
}

impl CharFoldingStrategy {
    /// Fold between `begin` and `end`.
    pub fn new(begin: char, end: char) -> Self {
        Self { begin, end }
    }

    /// `{` .. `}` folding.
    pub fn braces() -> Self {
        Self::new('{', '}')
    }
}

impl FoldingStrategy for CharFoldingStrategy {
    fn analyze(&self, text: &GapBuffer<char>, start: usize, end: usize) -> Vec<FoldingItem> {
        let mut open = Vec::new();
        let mut items = Vec::new();
        if text.is_empty() || start > end {
            return items;
        }
        let end = end.min(text.len() - 1);
        let Ok(chars) = text.iter_range(start, end + 1 - start) else {
            return items;
        };
        for (i, ch) in chars.enumerate() {
            let index = start + i;
            if *ch == self.begin {
                open.push(index);
            } else if *ch == self.end {
                let Some(begin) = open.pop() else {
                    continue;
                };
                if begin < index
                    && let Ok(item) = FoldingItem::new(begin, index)
                {
                    items.push(item);
                }
            }
        }
        items
    }
}

/// Folds from each row matching `begin` to the next row matching `end`, nesting by a stack.
///
/// Handy for marker comments such as `#region` / `#endregion`.
#[derive(Debug, Clone)]
pub struct RegexFoldingStrategy {
    begin: Regex,
    end: Regex,
}

impl RegexFoldingStrategy {
    /// Fold between rows matching `begin` and `end`.
    pub fn new(begin: &str, end: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            begin: Regex::new(begin)?,
            end: Regex::new(end)?,
        })
    }
}

impl FoldingStrategy for RegexFoldingStrategy {
    fn analyze(&self, text: &GapBuffer<char>, start: usize, end: usize) -> Vec<FoldingItem> {
        let mut items = Vec::new();
        if text.is_empty() || start > end {
            return items;
        }
        let end = end.min(text.len() - 1);
        let Ok(source) = text.range_to_string(start, end + 1 - start) else {
            return items;
        };

        let mut open = Vec::new();
        let mut head = start;
        for line in source.split_inclusive('\n') {
            let body = line.trim_end_matches('\n');
            if self.begin.is_match(body) {
                open.push(head);
            } else if self.end.is_match(body)
                && let Some(begin) = open.pop()
            {
                let close = head + body.chars().count().max(1) - 1;
                if let Ok(item) = FoldingItem::new(begin, close) {
                    items.push(item);
                }
            }
            head += line.chars().count();
        }
        items
    }
}
