//! Undo/redo log.
//!
//! Two stacks of reversible commands. Composite gestures are bracketed by `Begin`/`End`
//! sentinels so that one undo reverses the whole group; only the outermost
//! [`UndoManager::begin_undo_group`]/[`UndoManager::end_undo_group`] pair pushes sentinels.
//!
//! While merging is on (always inside a group, or when a host enables it), a new
//! single-range replace is folded into the previous one when they continue each other, so
//! typing a word becomes one step.

use crate::error::{EngineError, Result};
use crate::gap_buffer::GapBuffer;
use tracing::trace;

/// A single-range replace with both character runs kept for exact reversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReplaceCommand {
    index: usize,
    removed: Vec<char>,
    inserted: Vec<char>,
    /// Caret before the edit, restored on undo.
    caret: usize,
}

impl ReplaceCommand {
    pub(crate) fn new(index: usize, removed: Vec<char>, inserted: Vec<char>, caret: usize) -> Self {
        Self {
            index,
            removed,
            inserted,
            caret,
        }
    }

    fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.inserted.is_empty()
    }

    /// Try to absorb `next`, which was applied right after `self`.
    fn merge(&mut self, next: &ReplaceCommand) -> bool {
        let inserted_end = self.index + self.inserted.len();

        // `next` edits inside the run `self` inserted: splice it into that run.
        if self.removed.is_empty() && next.index >= self.index && next.index + next.removed.len() <= inserted_end {
            let offset = next.index - self.index;
            self.inserted
                .splice(offset..offset + next.removed.len(), next.inserted.iter().copied());
            return true;
        }

        // `next` starts where `self`'s replacement ends: extend both runs.
        if inserted_end == next.index {
            self.removed.extend_from_slice(&next.removed);
            self.inserted.extend_from_slice(&next.inserted);
            return true;
        }

        false
    }
}

/// One entry of the undo log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    /// Opens a group. On the undo stack it sits below the group's commands.
    Begin,
    /// Closes a group.
    End,
    /// A single-range replace.
    Replace(ReplaceCommand),
    /// Regex replace-all. Holds the text to swap back in.
    ReplaceAll(GapBuffer<char>),
    /// Literal replace-all. Holds the text to swap back in.
    FastReplaceAll(GapBuffer<char>),
}

impl Command {
    fn merge(&mut self, next: &Command) -> bool {
        match (self, next) {
            (Command::Replace(last), Command::Replace(next)) => last.merge(next),
            _ => false,
        }
    }

    fn is_empty(&self) -> bool {
        matches!(self, Command::Replace(cmd) if cmd.is_empty())
    }
}

/// What undo and redo act on.
pub(crate) trait UndoTarget {
    /// Replace `remove_len` characters at `index` with `chars`, without recording undo.
    fn replace_text(&mut self, index: usize, remove_len: usize, chars: &[char]) -> Result<()>;

    /// Install `text` as the whole buffer and return the text it replaced.
    fn swap_text(&mut self, text: GapBuffer<char>) -> Result<GapBuffer<char>>;

    /// Move the caret to `index`.
    fn set_caret_index(&mut self, index: usize) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

/// Undo and redo stacks plus grouping state.
#[derive(Debug, Default)]
pub struct UndoManager {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    locked: bool,
    grouping: bool,
    group_level: usize,
    auto_merge: bool,
}

impl UndoManager {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `cmd`. Ignored while locked. Any push invalidates the redo history.
    pub(crate) fn push(&mut self, cmd: Command) {
        if self.locked {
            return;
        }

        let merged = self.auto_merge
            && self
                .undo_stack
                .last_mut()
                .is_some_and(|last| last.merge(&cmd));
        if !merged {
            self.undo_stack.push(cmd);
        } else if self.undo_stack.last().is_some_and(Command::is_empty) {
            // Typing then deleting the same run leaves nothing to undo.
            self.undo_stack.pop();
        }
        self.redo_stack.clear();
        trace!(target: "textdoc.undo", merged, depth = self.undo_stack.len(), "push");
    }

    /// Open a group. Nested calls only bump a counter.
    pub fn begin_undo_group(&mut self) {
        if self.grouping {
            self.group_level += 1;
        } else {
            self.push(Command::Begin);
            self.grouping = true;
            self.auto_merge = true;
        }
    }

    /// Close the innermost open group.
    ///
    /// Closing the outermost group of an empty gesture drops its `Begin` sentinel.
    pub fn end_undo_group(&mut self) -> Result<()> {
        if !self.grouping {
            return Err(EngineError::InvalidOperation("end_undo_group without begin_undo_group"));
        }
        if self.group_level > 0 {
            self.group_level -= 1;
            return Ok(());
        }

        if matches!(self.undo_stack.last(), Some(Command::Begin)) {
            self.undo_stack.pop();
        } else {
            self.push(Command::End);
        }
        self.grouping = false;
        self.auto_merge = false;
        Ok(())
    }

    /// `true` between the outermost begin/end pair.
    pub fn is_grouping(&self) -> bool {
        self.grouping
    }

    /// Nesting depth below the outermost open group.
    pub fn group_level(&self) -> usize {
        self.group_level
    }

    /// Whether consecutive replaces are merged.
    pub fn auto_merge(&self) -> bool {
        self.auto_merge
    }

    /// Turn merging on or off outside of groups.
    pub fn set_auto_merge(&mut self, auto_merge: bool) {
        self.auto_merge = auto_merge;
    }

    /// Stop recording.
    pub fn begin_lock(&mut self) {
        self.locked = true;
    }

    /// Resume recording.
    pub fn end_lock(&mut self) {
        self.locked = false;
    }

    /// `true` while recording is suspended.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Returns `true` if there is something to undo.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Returns `true` if there is something to redo.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Commands on the undo stack, sentinels included.
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Commands on the redo stack, sentinels included.
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Drop the whole history. Ignored while locked.
    pub fn clear(&mut self) {
        if self.locked {
            return;
        }
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Reverse the last command or group. Returns `false` if nothing was undone.
    pub(crate) fn undo(&mut self, target: &mut dyn UndoTarget) -> Result<bool> {
        self.replay(target, Direction::Undo)
    }

    /// Reapply the last undone command or group.
    pub(crate) fn redo(&mut self, target: &mut dyn UndoTarget) -> Result<bool> {
        self.replay(target, Direction::Redo)
    }

    fn replay(&mut self, target: &mut dyn UndoTarget, direction: Direction) -> Result<bool> {
        if self.locked {
            return Ok(false);
        }
        let (opener, closer) = match direction {
            Direction::Undo => (Command::End, Command::Begin),
            Direction::Redo => (Command::Begin, Command::End),
        };

        let mut replayed = 0usize;
        let mut in_group = false;
        loop {
            let popped = match direction {
                Direction::Undo => self.undo_stack.pop(),
                Direction::Redo => self.redo_stack.pop(),
            };
            let Some(mut cmd) = popped else {
                break;
            };

            self.locked = true;
            let applied = apply(&mut cmd, target, direction);
            self.locked = false;
            if let Err(err) = applied {
                // Leave the failed command where it was.
                match direction {
                    Direction::Undo => self.undo_stack.push(cmd),
                    Direction::Redo => self.redo_stack.push(cmd),
                }
                return Err(err);
            }

            if cmd == opener {
                in_group = true;
            } else if cmd == closer {
                in_group = false;
            }
            match direction {
                Direction::Undo => self.redo_stack.push(cmd),
                Direction::Redo => self.undo_stack.push(cmd),
            }
            replayed += 1;
            if !in_group {
                break;
            }
        }

        trace!(target: "textdoc.undo", ?direction, replayed, "replay");
        Ok(replayed > 0)
    }
}

fn apply(cmd: &mut Command, target: &mut dyn UndoTarget, direction: Direction) -> Result<()> {
    match cmd {
        Command::Begin | Command::End => Ok(()),
        Command::Replace(replace) => match direction {
            Direction::Undo => {
                target.replace_text(replace.index, replace.inserted.len(), &replace.removed)?;
                target.set_caret_index(replace.caret)
            }
            Direction::Redo => {
                target.replace_text(replace.index, replace.removed.len(), &replace.inserted)?;
                target.set_caret_index(replace.index + replace.inserted.len())
            }
        },
        Command::ReplaceAll(text) | Command::FastReplaceAll(text) => {
            let previous = target.swap_text(std::mem::take(text))?;
            *text = previous;
            Ok(())
        }
    }
}
