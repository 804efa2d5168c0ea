//! Engine configuration.

use crate::line_ending::LineEnding;
use crate::text_store::DEFAULT_LOAD_CHUNK;
use std::time::Duration;

/// Longest row before the line table splits a physical line.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1000;

/// Settings fixed when a [`crate::Document`] is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Rows longer than this are split, so one huge line cannot stall layout.
    pub max_line_length: usize,
    /// Tab stop width in cells.
    pub tab_width: usize,
    /// Quiet period before folding and highlighting re-run on their own.
    pub generate_quantum: Duration,
    /// Bytes read per chunk while loading.
    pub load_chunk_size: usize,
    /// Terminator written on save.
    pub line_ending: LineEnding,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            tab_width: 4,
            generate_quantum: Duration::from_secs(1),
            load_chunk_size: DEFAULT_LOAD_CHUNK,
            line_ending: LineEnding::default(),
        }
    }
}

/// How rows wrap on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineBreakMethod {
    /// No wrapping.
    #[default]
    None,
    /// Wrap at the page (view) width.
    PageBound,
    /// Wrap after a fixed number of characters.
    CharUnit,
}

/// What the tab key inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndentMode {
    /// A tab character.
    #[default]
    Tab,
    /// Spaces up to the next tab stop.
    Space,
}
