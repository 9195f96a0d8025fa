//! Binary demux addressing.
//!
//! Select line `b` carries bit `b` of the output index, so `N` lines address `2^N` outputs.

use embedded_hal::digital::OutputPin;
use heapless::Vec;

use crate::conf::MAX_SELECT_LINES;
use crate::pins::SelectLine;

/// Returns the select-line pattern for `index`: bit `b` is the level of line `b`.
///
/// Bits beyond `lines` are dropped.
pub const fn select_pattern(index: usize, lines: usize) -> u32 {
    let mask = if lines >= u32::BITS as usize {
        u32::MAX
    } else {
        (1u32 << lines) - 1
    };
    (index as u32) & mask
}

/// The select lines of one demux, least significant bit first.
pub struct Demux<O> {
    lines: Vec<SelectLine<O>, MAX_SELECT_LINES>,
}

impl<O: OutputPin> Demux<O> {
    /// Creates a demux over `lines`.
    pub fn new(lines: Vec<SelectLine<O>, MAX_SELECT_LINES>) -> Self {
        Self { lines }
    }

    /// Number of select lines.
    pub fn lines(&self) -> usize {
        self.lines.len()
    }

    /// Number of addressable outputs.
    pub fn capacity(&self) -> usize {
        1 << self.lines.len()
    }

    /// Drives the select lines to address `index`, wrapping at [`Demux::capacity`].
    ///
    /// A line that fails to switch is logged and skipped; the remaining lines are still
    /// driven. Returns the number of failed lines.
    pub fn select(&mut self, index: usize) -> usize {
        let pattern = select_pattern(index, self.lines.len());
        let mut failures = 0;
        for (bit, line) in self.lines.iter_mut().enumerate() {
            let level = (pattern >> bit) & 1 == 1;
            if let Err(err) = line.set(level) {
                log::debug!("kscan: failed to set select line {bit} to {level} for output {index}: {err:?}");
                failures += 1;
            }
        }
        failures
    }

    /// Drives every select line to the same logical level.
    ///
    /// Best effort, like [`Demux::select`].
    pub fn drive_all(&mut self, active: bool) -> usize {
        let mut failures = 0;
        for (bit, line) in self.lines.iter_mut().enumerate() {
            if let Err(err) = line.set(active) {
                log::debug!("kscan: failed to set select line {bit} to {active}: {err:?}");
                failures += 1;
            }
        }
        failures
    }
}
