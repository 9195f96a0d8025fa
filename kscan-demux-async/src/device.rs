//! The scanner device and its task loop.

use core::future::pending;

use embassy_futures::select::{select, Either};
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Instant, Timer};
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::digital::Wait;

use crate::conf::MatrixConfig;
use crate::err::{ConfigError, KscanError};
use crate::event::EventSink;
use crate::pins::{resolve, PinResolver};
use crate::scan::{Rearm, Scanner};
use crate::trigger::{ScanPhase, Trigger};

/// A request from another task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlRequest {
    /// Same as [`KscanDemux::enable`].
    Enable,
    /// Same as [`KscanDemux::disable`].
    Disable,
}

/// Carries [`ControlRequest`]s to a device running [`KscanDemux::run_with_control`].
pub type KscanControl<M> = Signal<M, ControlRequest>;

/// A demultiplexed key matrix.
///
/// `ROWS` and `COLS` must match the configuration. The device owns its pins, key state and
/// event sink, and is meant to be driven by a single task.
pub struct KscanDemux<I, O, S, const ROWS: usize, const COLS: usize> {
    scanner: Scanner<I, O, ROWS, COLS>,
    trigger: Trigger,
    sink: Option<S>,
}

impl<I, O, S, const ROWS: usize, const COLS: usize> KscanDemux<I, O, S, ROWS, COLS>
where
    I: InputPin + Wait,
    O: OutputPin,
    S: EventSink,
{
    /// Validates `config` and resolves every pin through `resolver`.
    ///
    /// Stops at the first invalid setting or pin. Does not start scanning.
    pub fn new<R>(config: &MatrixConfig, resolver: &mut R) -> Result<Self, KscanError<R::Error>>
    where
        R: PinResolver<Input = I, Output = O>,
    {
        config.validate()?;
        if (config.num_rows, config.num_cols) != (ROWS, COLS) {
            return Err(ConfigError::DimensionMismatch {
                configured: (config.num_rows, config.num_cols),
                storage: (ROWS, COLS),
            }
            .into());
        }

        let pins = resolve(config, resolver)?;
        let scanner = Scanner::new(config, pins);

        log::debug!(
            "kscan: {}x{} matrix, {:?}, {:?}, {} of {} outputs addressed",
            ROWS,
            COLS,
            config.orientation,
            config.trigger,
            scanner.num_outputs(),
            config.output_dim()
        );
        config.log_coverage();

        Ok(Self {
            scanner,
            trigger: Trigger::new(config.trigger, config.debounce_period),
            sink: None,
        })
    }

    /// Sets the event sink, replacing any previous one.
    pub fn configure(&mut self, sink: S) {
        log::debug!("kscan: configure");
        self.sink = Some(sink);
    }

    /// Starts scanning.
    ///
    /// In interrupt mode, runs one scan right away so keys held at enable time are reported.
    pub fn enable(&mut self) -> Result<(), KscanError> {
        if self.sink.is_none() {
            log::warn!("kscan: enable without an event sink");
            return Err(KscanError::NoCallback);
        }
        log::debug!("kscan: enable");
        if self.trigger.enable(Instant::now()) {
            self.scan_now();
        }
        Ok(())
    }

    /// Stops scanning. Key state is kept.
    pub fn disable(&mut self) {
        log::debug!("kscan: disable");
        self.trigger.disable();
    }

    /// Whether `(row, col)` is confirmed pressed.
    pub fn is_pressed(&self, row: usize, col: usize) -> bool {
        self.scanner.matrix().is_pressed(row, col)
    }

    /// Confirmed-pressed cells in row-major order.
    pub fn pressed_keys(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.scanner.matrix().pressed_keys()
    }

    /// The current scan phase.
    pub fn phase(&self) -> ScanPhase {
        self.trigger.phase()
    }

    /// Waits for the next trigger and handles it.
    ///
    /// Every await happens before any pin is touched, so the returned future may be dropped at
    /// any point. Never completes while disabled.
    pub async fn process(&mut self) {
        if self.trigger.phase() == ScanPhase::Disabled {
            return pending().await;
        }

        if self.trigger.interrupts_armed() {
            let line = self.scanner.wait_for_any_input().await;
            log::trace!("kscan: input {line} active");
            self.trigger.on_interrupt(Instant::now());
            return;
        }

        match self.trigger.next_deadline() {
            Some(deadline) if deadline <= Instant::now() => yield_now().await,
            Some(deadline) => Timer::at(deadline).await,
            None => return pending().await,
        }

        if self.trigger.fire(Instant::now()) {
            self.scan_now();
        }
    }

    /// Processes triggers forever.
    pub async fn run(&mut self) -> ! {
        loop {
            self.process().await;
        }
    }

    /// Processes triggers forever, applying requests from `control` between them.
    pub async fn run_with_control<M: RawMutex>(&mut self, control: &KscanControl<M>) -> ! {
        loop {
            match select(control.wait(), self.process()).await {
                Either::First(ControlRequest::Enable) => {
                    if let Err(err) = self.enable() {
                        log::warn!("kscan: enable request failed: {err:?}");
                    }
                }
                Either::First(ControlRequest::Disable) => self.disable(),
                Either::Second(()) => {}
            }
        }
    }

    fn scan_now(&mut self) {
        let Some(sink) = self.sink.as_mut() else {
            self.trigger.on_scan_complete(Rearm::Idle, Instant::now());
            return;
        };
        let report = self.scanner.scan_cycle(sink);
        let rearm = self.scanner.rearm(&report);
        log::trace!("kscan: scan done, {report:?}, {rearm:?}");
        self.trigger.on_scan_complete(rearm, Instant::now());
    }
}
