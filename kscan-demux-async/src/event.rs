//! Key events and where they are delivered.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Sender, TrySendError};

/// A confirmed change of one matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyEvent {
    /// Logical row.
    pub row: usize,
    /// Logical column.
    pub col: usize,
    /// `true` on press, `false` on release.
    pub pressed: bool,
}

impl KeyEvent {
    /// Creates a new `KeyEvent`.
    pub const fn new(row: usize, col: usize, pressed: bool) -> Self {
        Self { row, col, pressed }
    }

    /// Row-major index of the cell in a matrix `num_cols` wide.
    pub const fn key_index(&self, num_cols: usize) -> usize {
        self.row * num_cols + self.col
    }
}

/// Receives key events from the scanner.
///
/// Called from the scan task only, once per transition, in row-major order within a cycle.
pub trait EventSink {
    /// Handles one event.
    fn on_event(&mut self, event: KeyEvent);
}

impl<F: FnMut(KeyEvent)> EventSink for F {
    fn on_event(&mut self, event: KeyEvent) {
        self(event)
    }
}

/// Forwards events into an embassy channel without blocking the scan.
///
/// An event that does not fit is logged and dropped.
pub struct ChannelSink<'ch, M: RawMutex, const N: usize> {
    sender: Sender<'ch, M, KeyEvent, N>,
}

impl<'ch, M: RawMutex, const N: usize> ChannelSink<'ch, M, N> {
    /// Creates a sink sending into `sender`'s channel.
    pub fn new(sender: Sender<'ch, M, KeyEvent, N>) -> Self {
        Self { sender }
    }
}

impl<M: RawMutex, const N: usize> EventSink for ChannelSink<'_, M, N> {
    fn on_event(&mut self, event: KeyEvent) {
        if let Err(TrySendError::Full(event)) = self.sender.try_send(event) {
            log::warn!("kscan: event channel full, dropping {event:?}");
        }
    }
}
