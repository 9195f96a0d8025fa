//! The scan cycle: drive every demux address, sample every sensed line, diff and report.

use core::future::pending;
use core::pin::pin;

use embassy_futures::select::select_slice;
use embassy_time::Duration;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::digital::Wait;
use heapless::Vec;

use crate::conf::{MatrixConfig, Orientation, MAX_GROUP_PINS};
use crate::demux::Demux;
use crate::event::EventSink;
use crate::matrix::KeyMatrix;
use crate::pins::{ResolvedPins, SenseLine};

/// What one scan cycle observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    /// Number of emitted events.
    pub changes: usize,
    /// Whether any key was down in this cycle's snapshot.
    pub any_pressed: bool,
    /// Pin reads and select-line writes that failed during the cycle.
    pub pin_faults: usize,
}

/// Whether another scan must follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rearm {
    /// Keys are held and there is no debounce period: scan again right away.
    Immediate,
    /// Keys are held: scan again after the debounce period.
    After(Duration),
    /// Nothing is held: hand control back to the trigger.
    Idle,
}

/// Owns the live pins and the key state of one matrix.
pub struct Scanner<I, O, const ROWS: usize, const COLS: usize> {
    inputs: Vec<SenseLine<I>, MAX_GROUP_PINS>,
    demux: Demux<O>,
    matrix: KeyMatrix<ROWS, COLS>,
    orientation: Orientation,
    num_outputs: usize,
    debounce_period: Duration,
}

impl<I, O, const ROWS: usize, const COLS: usize> Scanner<I, O, ROWS, COLS>
where
    I: InputPin,
    O: OutputPin,
{
    /// Creates a scanner over already-resolved pins with every key released.
    pub fn new(config: &MatrixConfig, pins: ResolvedPins<I, O>) -> Self {
        let demux = Demux::new(pins.outputs);
        Self {
            inputs: pins.inputs,
            num_outputs: config.num_outputs(),
            demux,
            matrix: KeyMatrix::new(),
            orientation: config.orientation,
            debounce_period: config.debounce_period,
        }
    }

    /// The key state.
    pub fn matrix(&self) -> &KeyMatrix<ROWS, COLS> {
        &self.matrix
    }

    /// Number of outputs addressed each cycle.
    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Runs one full scan cycle and reports every confirmed transition to `sink`.
    ///
    /// Pin faults are logged and counted; a cell whose read fails keeps its confirmed value.
    pub fn scan_cycle<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> CycleReport {
        let mut pin_faults = 0;
        self.matrix.begin();

        // Blank the outputs so a stale address does not leak into the first reads.
        pin_faults += self.demux.drive_all(false);

        for output in 0..self.num_outputs {
            pin_faults += self.demux.select(output);

            for (input, line) in self.inputs.iter_mut().enumerate() {
                let (row, col) = self.orientation.cell(input, output);
                match line.is_active() {
                    Ok(pressed) => self.matrix.record(row, col, pressed),
                    Err(err) => {
                        log::debug!("kscan: failed to read input {input} at output {output}: {err:?}");
                        pin_faults += 1;
                        self.matrix.hold(row, col);
                    }
                }
            }
        }

        pin_faults += self.demux.drive_all(true);

        let commit = self.matrix.commit(sink);
        if pin_faults > 0 {
            log::warn!("kscan: {pin_faults} pin faults during scan");
        }

        CycleReport {
            changes: commit.changes,
            any_pressed: commit.any_pressed,
            pin_faults,
        }
    }

    /// Decides whether a follow-up scan is needed after `report`.
    pub fn rearm(&self, report: &CycleReport) -> Rearm {
        if !report.any_pressed {
            Rearm::Idle
        } else if self.debounce_period == Duration::from_ticks(0) {
            Rearm::Immediate
        } else {
            Rearm::After(self.debounce_period)
        }
    }
}

impl<I, O, const ROWS: usize, const COLS: usize> Scanner<I, O, ROWS, COLS>
where
    I: InputPin + Wait,
    O: OutputPin,
{
    /// Waits until any sensed line is at its active level and returns its index.
    ///
    /// Level triggered: returns at once if a line is already active. A line whose wait fails
    /// is reported as fired so that a scan re-samples it.
    pub async fn wait_for_any_input(&mut self) -> usize {
        let mut lines = self.inputs.iter_mut();
        let waits: [_; MAX_GROUP_PINS] = core::array::from_fn(|_| wait_line(lines.next()));
        let (result, index) = select_slice(pin!(waits)).await;
        if let Err(err) = result {
            log::warn!("kscan: failed waiting on input {index}: {err:?}");
        }
        index
    }
}

/// Waits for `line` to become active. Slots past the configured lines never complete.
async fn wait_line<I: InputPin + Wait>(line: Option<&mut SenseLine<I>>) -> Result<(), I::Error> {
    match line {
        Some(line) => line.wait_for_active().await,
        None => pending().await,
    }
}
