//! Line-info generators and the throttle that decides when they re-run.
//!
//! Generators keep derived per-row state (folds, syntax spans) in step with the text. Edits only
//! call [`LineInfoGenerator::update`], which shifts ranges and bumps an edit generation. The
//! expensive [`LineInfoGenerator::generate`] pass runs when a consumer asks for it, and then only
//! if the state is out of date and the text has been quiet for one quantum (or the call is
//! forced).

use crate::gap_buffer::GapBuffer;
use crate::rows::RowIndex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Clock whose origin is the moment of construction.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Clock starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to `at`.
    pub fn set(&self, at: Duration) {
        self.nanos.store(at.as_nanos() as u64, Ordering::Release);
    }

    /// Move forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }
}

/// Edit-generation bookkeeping for one generator.
pub struct Throttle {
    clock: Arc<dyn Clock>,
    quantum: Duration,
    edit_generation: u64,
    generated_generation: u64,
    last_edit: Duration,
}

impl Throttle {
    /// A throttle that starts in sync.
    pub fn new(clock: Arc<dyn Clock>, quantum: Duration) -> Self {
        let last_edit = clock.now();
        Self {
            clock,
            quantum,
            edit_generation: 0,
            generated_generation: 0,
            last_edit,
        }
    }

    /// Record an edit. Restarts the quiet period.
    pub fn mark_edited(&mut self) {
        self.edit_generation += 1;
        self.last_edit = self.clock.now();
    }

    /// Drop sync without restarting the quiet period.
    pub fn invalidate(&mut self) {
        self.edit_generation += 1;
    }

    /// Returns `true` when nothing changed since the last generation.
    pub fn is_synced(&self) -> bool {
        self.edit_generation == self.generated_generation
    }

    /// Whether a generation pass should run now.
    pub fn should_generate(&self, force: bool) -> bool {
        if force {
            return true;
        }
        !self.is_synced() && self.clock.now().saturating_sub(self.last_edit) >= self.quantum
    }

    /// Record a completed generation pass.
    pub fn mark_generated(&mut self) {
        self.generated_generation = self.edit_generation;
    }

    /// Edits recorded so far.
    pub fn edit_generation(&self) -> u64 {
        self.edit_generation
    }

    /// Change the quiet period.
    pub fn set_quantum(&mut self, quantum: Duration) {
        self.quantum = quantum;
    }
}

impl fmt::Debug for Throttle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throttle")
            .field("quantum", &self.quantum)
            .field("edit_generation", &self.edit_generation)
            .field("generated_generation", &self.generated_generation)
            .finish()
    }
}

/// Derived per-row state kept in step with the text.
pub trait LineInfoGenerator {
    /// Shift state after `removed` chars at `start` were replaced by `inserted` chars.
    fn update(&mut self, start: usize, inserted: usize, removed: usize);

    /// Drop all derived state.
    fn clear(&mut self, rows: &mut RowIndex);

    /// Re-analyse the text if due. Returns `true` if a pass ran.
    fn generate(&mut self, text: &GapBuffer<char>, rows: &mut RowIndex, force: bool) -> bool;
}
