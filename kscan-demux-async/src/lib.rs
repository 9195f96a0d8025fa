//! An asynchronous, `no_std` scanner for key matrices addressed through a binary demultiplexer.
//!
//! Instead of driving one GPIO per column, the driven side of the matrix is selected through
//! `N` demux select lines that encode `2^N` outputs. This crate drives those select lines,
//! samples the sensed lines, diffs the result against the last confirmed state and reports
//! `(row, col, pressed)` events.
//!
//! The main entry point is [`KscanDemux`]. It is built from a [`MatrixConfig`] and a
//! platform [`PinResolver`] that turns each configured [`PinRef`] into an `embedded-hal` pin.
//! Scans are triggered either by a fixed polling interval or by level interrupts on the
//! sensed lines (via `embedded-hal-async`'s `Wait`), as selected by [`TriggerMode`].
//!
//! # Usage
//!
//! ```ignore
//! use embassy_time::Duration;
//! use kscan_demux_async::{KscanDemux, MatrixConfig, Orientation, PinFlags, PinRef, TriggerMode};
//!
//! static ROWS: [PinRef; 4] = [
//!     PinRef::new(0, 4, PinFlags::ACTIVE_HIGH),
//!     PinRef::new(0, 5, PinFlags::ACTIVE_HIGH),
//!     PinRef::new(0, 6, PinFlags::ACTIVE_HIGH),
//!     PinRef::new(0, 7, PinFlags::ACTIVE_HIGH),
//! ];
//! static SELECTS: [PinRef; 3] = [
//!     PinRef::new(0, 10, PinFlags::ACTIVE_HIGH),
//!     PinRef::new(0, 11, PinFlags::ACTIVE_HIGH),
//!     PinRef::new(0, 12, PinFlags::ACTIVE_HIGH),
//! ];
//! static CONFIG: MatrixConfig = MatrixConfig::new(4, 8, Orientation::ColsAreOutputs, &ROWS, &SELECTS)
//!     .with_debounce_period(Duration::from_millis(5))
//!     .with_trigger(TriggerMode::polling());
//!
//! #[embassy_executor::task]
//! async fn scan(mut resolver: BoardPins) {
//!     let mut kscan = KscanDemux::<_, _, _, 4, 8>::new(&CONFIG, &mut resolver).unwrap();
//!     kscan.configure(|event| log::info!("{event:?}"));
//!     kscan.enable().unwrap();
//!     kscan.run().await
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod conf;
pub mod demux;
pub mod device;
pub mod event;
pub mod matrix;
pub mod pins;
pub mod scan;
pub mod trigger;

mod err;

#[cfg(test)]
mod mock;

pub use conf::{MatrixConfig, Orientation, PinFlags, PinRef, Pull, TriggerMode};
pub use device::{ControlRequest, KscanControl, KscanDemux};
pub use err::{ConfigError, KscanError};
pub use event::{ChannelSink, EventSink, KeyEvent};
pub use pins::{PinGroup, PinResolver};
pub use scan::{CycleReport, Rearm};
pub use trigger::ScanPhase;
