//! Confirmed key state and the per-cycle scratch snapshot.

use crate::event::{EventSink, KeyEvent};

/// A `ROWS x COLS` grid of pressed flags.
pub type Grid<const ROWS: usize, const COLS: usize> = [[bool; COLS]; ROWS];

/// Outcome of committing one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Commit {
    /// Number of cells that changed, one event each.
    pub changes: usize,
    /// Whether any cell of the snapshot is pressed.
    pub any_pressed: bool,
}

/// Last confirmed key state plus the snapshot being read.
pub struct KeyMatrix<const ROWS: usize, const COLS: usize> {
    confirmed: Grid<ROWS, COLS>,
    scratch: Grid<ROWS, COLS>,
}

impl<const ROWS: usize, const COLS: usize> Default for KeyMatrix<ROWS, COLS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const ROWS: usize, const COLS: usize> KeyMatrix<ROWS, COLS> {
    /// Creates a matrix with every key released.
    pub const fn new() -> Self {
        Self {
            confirmed: [[false; COLS]; ROWS],
            scratch: [[false; COLS]; ROWS],
        }
    }

    /// Whether `(row, col)` is confirmed pressed. Out-of-range cells are released.
    pub fn is_pressed(&self, row: usize, col: usize) -> bool {
        self.confirmed
            .get(row)
            .and_then(|cols| cols.get(col))
            .copied()
            .unwrap_or(false)
    }

    /// The confirmed state.
    pub fn confirmed(&self) -> &Grid<ROWS, COLS> {
        &self.confirmed
    }

    /// Confirmed-pressed cells in row-major order.
    pub fn pressed_keys(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.confirmed.iter().enumerate().flat_map(|(row, cols)| {
            cols.iter()
                .enumerate()
                .filter(|(_, pressed)| **pressed)
                .map(move |(col, _)| (row, col))
        })
    }

    /// Starts a new snapshot with every cell released.
    pub fn begin(&mut self) {
        self.scratch = [[false; COLS]; ROWS];
    }

    /// Records a sampled cell in the snapshot.
    pub fn record(&mut self, row: usize, col: usize, pressed: bool) {
        if let Some(cell) = self.scratch.get_mut(row).and_then(|cols| cols.get_mut(col)) {
            *cell = pressed;
        }
    }

    /// Carries the confirmed value of a cell that could not be sampled.
    pub fn hold(&mut self, row: usize, col: usize) {
        self.record(row, col, self.is_pressed(row, col));
    }

    /// Diffs the snapshot against the confirmed state, confirms every change and reports it.
    ///
    /// Events are emitted in row-major order.
    pub fn commit<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> Commit {
        let mut commit = Commit::default();
        for (row, (confirmed, scratch)) in self.confirmed.iter_mut().zip(&self.scratch).enumerate() {
            for (col, (state, pressed)) in confirmed.iter_mut().zip(scratch).enumerate() {
                commit.any_pressed |= *pressed;
                if *state != *pressed {
                    log::debug!(
                        "kscan: sending event at {row},{col} state {}",
                        if *pressed { "on" } else { "off" }
                    );
                    *state = *pressed;
                    commit.changes += 1;
                    sink.on_event(KeyEvent::new(row, col, *pressed));
                }
            }
        }
        commit
    }
}
