//! Text store: the gap buffer behind a reader/writer lock.
//!
//! Synchronous callers (edits, rendering, search) use `try_read`/`try_write`; if a background
//! load or save currently holds the lock they get [`EngineError::Busy`] instead of blocking.
//! `load`/`save` are the only suspending operations and take the lock per chunk (load) or for
//! the whole stream (save).

use crate::cancel::CancelToken;
use crate::error::{EngineError, Result, check_range};
use crate::gap_buffer::GapBuffer;
use crate::line_ending::LineEnding;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Internal line terminator.
pub const NEW_LINE: char = '\n';

/// Default load chunk, in bytes.
pub const DEFAULT_LOAD_CHUNK: usize = 1024 * 1024;

/// Shared read access to the characters.
pub type TextReadGuard<'a> = RwLockReadGuard<'a, GapBuffer<char>>;

/// The character store.
///
/// Cloning is cheap and yields another handle to the same buffer, which is how a background
/// task gets to save while the owning document keeps serving reads.
#[derive(Clone, Default)]
pub struct TextStore {
    buf: Arc<RwLock<GapBuffer<char>>>,
    len: Arc<AtomicUsize>,
}

impl TextStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `text` (carriage returns and NULs are dropped).
    pub fn from_text(text: &str) -> Self {
        let buf: GapBuffer<char> = text.chars().filter(|c| keep_char(*c)).collect();
        let len = buf.len();
        Self {
            buf: Arc::new(RwLock::new(buf)),
            len: Arc::new(AtomicUsize::new(len)),
        }
    }

    /// Number of characters. Lock free.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Returns `true` when the store holds no text.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shared access to the buffer.
    pub fn read(&self) -> Result<TextReadGuard<'_>> {
        self.buf.try_read().map_err(|_| EngineError::Busy)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, GapBuffer<char>>> {
        self.buf.try_write().map_err(|_| EngineError::Busy)
    }

    /// Character at `index`.
    pub fn char_at(&self, index: usize) -> Result<char> {
        let buf = self.read()?;
        buf.get(index).copied().ok_or(EngineError::OutOfRange {
            index,
            length: 1,
            len: buf.len(),
        })
    }

    /// Copy `length` characters starting at `index`.
    pub fn to_string_range(&self, index: usize, length: usize) -> Result<String> {
        self.read()?.range_to_string(index, length)
    }

    /// Remove `remove_len` characters at `index` and insert `chars` there.
    ///
    /// Returns the removed characters.
    pub fn replace(&self, index: usize, remove_len: usize, chars: &[char]) -> Result<Vec<char>> {
        let mut buf = self.write()?;
        check_range(index, remove_len, buf.len())?;
        let removed = buf.splice(index, remove_len, chars.iter().copied())?;
        self.len.store(buf.len(), Ordering::Release);
        Ok(removed)
    }

    /// Drop all text and return how many characters were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut buf = self.write()?;
        let removed = buf.len();
        buf.clear();
        self.len.store(0, Ordering::Release);
        Ok(removed)
    }

    /// Copy of the whole buffer, used as an undo pre-image by bulk replaces.
    pub fn snapshot(&self) -> Result<GapBuffer<char>> {
        Ok(self.read()?.clone())
    }

    /// Swap in a previously taken snapshot.
    pub fn restore(&self, snapshot: GapBuffer<char>) -> Result<()> {
        let mut buf = self.write()?;
        *buf = snapshot;
        self.len.store(buf.len(), Ordering::Release);
        Ok(())
    }

    /// Find `target` at or after `start` using QuickSearch.
    pub fn index_of(&self, target: &str, start: usize, ci: bool) -> Result<Option<usize>> {
        let search = QuickSearch::new(target, ci)?;
        let buf = self.read()?;
        check_range(start, 0, buf.len())?;
        Ok(search.find(&buf, start, buf.len()))
    }

    /// Stream text from `reader` into the end of the buffer.
    ///
    /// `\r` and `\0` are dropped. The writer lock is taken once per chunk, so readers can
    /// observe the partially loaded text. Cancellation is checked after every chunk; on
    /// [`EngineError::Cancelled`] the buffer holds whatever was appended so far.
    pub async fn load<R>(&self, mut reader: R, cancel: &CancelToken, chunk_size: usize) -> Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = vec![0u8; chunk_size.max(4)];
        let mut pending: Vec<u8> = Vec::new();
        let mut loaded = 0usize;
        let mut chunks = 0usize;

        loop {
            let read = reader.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            pending.extend_from_slice(&chunk[..read]);

            let valid = utf8_prefix_len(&pending)?;
            let chars: Vec<char> = std::str::from_utf8(&pending[..valid])
                .map_err(invalid_utf8)?
                .chars()
                .filter(|c| keep_char(*c))
                .collect();
            pending.drain(..valid);

            {
                let mut buf = self.buf.write().await;
                loaded += chars.len();
                buf.append(chars);
                self.len.store(buf.len(), Ordering::Release);
            }
            chunks += 1;

            if cancel.is_cancelled() {
                debug!(target: "textdoc.store", chunks, loaded, "load_cancelled");
                return Err(EngineError::Cancelled);
            }
        }

        if !pending.is_empty() {
            return Err(invalid_utf8(()).into());
        }
        debug!(target: "textdoc.store", chunks, loaded, "load_finished");
        Ok(loaded)
    }

    /// Stream the buffer to `writer` line by line, rewriting `\n` to `ending`.
    ///
    /// Holds the reader lock for the whole save. Returns the number of lines written.
    pub async fn save<W>(&self, mut writer: W, ending: LineEnding, cancel: &CancelToken) -> Result<usize>
    where
        W: AsyncWrite + Unpin,
    {
        let buf = self.buf.read().await;
        let mut line = String::new();
        let mut lines = 0usize;
        let last = buf.len().saturating_sub(1);

        for (i, ch) in buf.iter().enumerate() {
            if *ch == NEW_LINE {
                line.push_str(ending.as_str());
            } else {
                line.push(*ch);
            }
            if *ch == NEW_LINE || i == last {
                writer.write_all(line.as_bytes()).await?;
                line.clear();
                lines += 1;
                if cancel.is_cancelled() {
                    debug!(target: "textdoc.store", lines, "save_cancelled");
                    return Err(EngineError::Cancelled);
                }
            }
        }
        writer.flush().await?;
        debug!(target: "textdoc.store", lines, "save_finished");
        Ok(lines)
    }
}

impl std::fmt::Debug for TextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextStore").field("len", &self.len()).finish()
    }
}

fn keep_char(ch: char) -> bool {
    ch != '\r' && ch != '\0'
}

fn utf8_prefix_len(bytes: &[u8]) -> Result<usize> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.len()),
        // An incomplete sequence at the end continues in the next chunk.
        Err(err) if err.error_len().is_none() => Ok(err.valid_up_to()),
        Err(err) => Err(invalid_utf8(err).into()),
    }
}

fn invalid_utf8<E>(_: E) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, "stream is not valid UTF-8")
}

/// Sunday's QuickSearch over a char gap buffer.
///
/// The case-insensitive mode folds ASCII letters only.
#[derive(Debug, Clone)]
pub struct QuickSearch {
    pattern: Vec<char>,
    shift: HashMap<char, usize>,
    ci: bool,
}

impl QuickSearch {
    /// Precompute the shift table for `pattern`.
    pub fn new(pattern: &str, ci: bool) -> Result<Self> {
        if pattern.is_empty() {
            return Err(EngineError::InvalidArgument("search pattern is empty"));
        }
        let pattern: Vec<char> = if ci {
            pattern.chars().map(|c| c.to_ascii_uppercase()).collect()
        } else {
            pattern.chars().collect()
        };
        let len = pattern.len();
        let mut shift = HashMap::with_capacity(len * 2);
        for (i, ch) in pattern.iter().enumerate() {
            shift.insert(*ch, len - i);
            if ci {
                shift.insert(ch.to_ascii_lowercase(), len - i);
            }
        }
        Ok(Self { pattern, shift, ci })
    }

    /// Pattern length in chars.
    pub fn len(&self) -> usize {
        self.pattern.len()
    }

    /// Always `false`; an empty pattern is rejected by [`QuickSearch::new`].
    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    #[inline]
    fn fold(&self, ch: char) -> char {
        if self.ci { ch.to_ascii_uppercase() } else { ch }
    }

    /// First match starting in `start..` that ends at or before `end`.
    pub fn find(&self, buf: &GapBuffer<char>, start: usize, end: usize) -> Option<usize> {
        let plen = self.pattern.len();
        let end = end.min(buf.len());
        let search_end = end.checked_sub(plen)?;
        let mut i = start;

        while i <= search_end {
            let matched = self
                .pattern
                .iter()
                .enumerate()
                .all(|(j, p)| buf.get(i + j).is_some_and(|c| self.fold(*c) == *p));
            if matched {
                return Some(i);
            }
            let next = buf.get(i + plen)?;
            i += self.shift.get(next).copied().unwrap_or(plen + 1);
        }
        None
    }

    /// All non-overlapping matches in `start..end`.
    pub fn find_all(&self, buf: &GapBuffer<char>, start: usize, end: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut at = start;
        while let Some(hit) = self.find(buf, at, end) {
            out.push(hit);
            at = hit + self.pattern.len();
        }
        out
    }
}
