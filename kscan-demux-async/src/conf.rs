//! Hardware description of a demultiplexed key matrix.

use embassy_time::Duration;

use crate::err::ConfigError;

/// The largest number of pins in either configured pin group.
pub const MAX_GROUP_PINS: usize = 16;

/// The largest number of demux select lines (and so `2^8` addressable outputs).
pub const MAX_SELECT_LINES: usize = 8;

/// The polling interval used by [`TriggerMode::polling`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Which side of the matrix is driven through the demux.
///
/// Follows the diode direction naming of the wiring: `row2col` drives rows, `col2row`
/// drives columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Orientation {
    /// Rows are driven, columns are sensed (`row2col`).
    RowsAreOutputs,
    /// Columns are driven, rows are sensed (`col2row`).
    ColsAreOutputs,
}

/// Internal bias applied to a sensed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    /// Floating input.
    #[default]
    None,
    /// Pull-up resistor enabled.
    Up,
    /// Pull-down resistor enabled.
    Down,
}

/// Electrical flags of a configured pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinFlags {
    /// The logical "active" level is the physical low level.
    pub active_low: bool,
    /// Bias for input pins. Ignored for outputs.
    pub pull: Pull,
}

impl PinFlags {
    /// Active high, no bias.
    pub const ACTIVE_HIGH: Self = Self {
        active_low: false,
        pull: Pull::None,
    };

    /// Active low, no bias.
    pub const ACTIVE_LOW: Self = Self {
        active_low: true,
        pull: Pull::None,
    };

    /// Returns these flags with the given bias.
    pub const fn with_pull(self, pull: Pull) -> Self {
        Self {
            active_low: self.active_low,
            pull,
        }
    }
}

/// A reference to a physical pin: GPIO controller, pin number and flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinRef {
    /// The GPIO controller (port) the pin belongs to.
    pub port: u8,
    /// The pin number within the port.
    pub pin: u8,
    /// Electrical flags.
    pub flags: PinFlags,
}

impl PinRef {
    /// Creates a new `PinRef`.
    pub const fn new(port: u8, pin: u8, flags: PinFlags) -> Self {
        Self { port, pin, flags }
    }
}

/// What decides when a scan cycle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Scan on a fixed period, independent of the debounce period.
    Polling {
        /// Time between two scheduled scans.
        interval: Duration,
    },
    /// Scan when a sensed line becomes active, then keep scanning until every key is released.
    ///
    /// Between scans the select lines rest at their active level, which addresses only the
    /// last output (`2^N - 1`). Only keys on that output can wake the scanner; if the matrix
    /// has fewer outputs than the demux addresses, no key can.
    Interrupt,
}

impl TriggerMode {
    /// Polling with [`DEFAULT_POLL_INTERVAL`].
    pub const fn polling() -> Self {
        Self::Polling {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Default for TriggerMode {
    fn default() -> Self {
        Self::polling()
    }
}

/// Immutable description of one demux key matrix.
///
/// Which pin group is driven through the demux depends on [`Orientation`]: the driven group's
/// pins are the select lines, the other group's pins are read directly.
#[derive(Debug, Clone, Copy)]
pub struct MatrixConfig {
    /// Number of logical rows.
    pub num_rows: usize,
    /// Number of logical columns. May exceed what the demux can address.
    pub num_cols: usize,
    /// Which side is driven.
    pub orientation: Orientation,
    /// Delay before a follow-up scan while keys are held. Zero re-scans immediately.
    pub debounce_period: Duration,
    /// Polling or interrupt-driven scanning.
    pub trigger: TriggerMode,
    /// Pins wired to the matrix rows.
    pub row_pins: &'static [PinRef],
    /// Pins wired to the demux (column) side.
    pub demux_pins: &'static [PinRef],
}

impl MatrixConfig {
    /// Creates a configuration with no debounce period, polling every [`DEFAULT_POLL_INTERVAL`].
    pub const fn new(
        num_rows: usize,
        num_cols: usize,
        orientation: Orientation,
        row_pins: &'static [PinRef],
        demux_pins: &'static [PinRef],
    ) -> Self {
        Self {
            num_rows,
            num_cols,
            orientation,
            debounce_period: Duration::from_ticks(0),
            trigger: TriggerMode::polling(),
            row_pins,
            demux_pins,
        }
    }

    /// Sets the debounce period.
    pub const fn with_debounce_period(mut self, debounce_period: Duration) -> Self {
        self.debounce_period = debounce_period;
        self
    }

    /// Sets the trigger mode.
    pub const fn with_trigger(mut self, trigger: TriggerMode) -> Self {
        self.trigger = trigger;
        self
    }

    /// Logical size of the driven dimension.
    pub fn output_dim(&self) -> usize {
        match self.orientation {
            Orientation::RowsAreOutputs => self.num_rows,
            Orientation::ColsAreOutputs => self.num_cols,
        }
    }

    /// Logical size of the sensed dimension.
    pub fn input_dim(&self) -> usize {
        match self.orientation {
            Orientation::RowsAreOutputs => self.num_cols,
            Orientation::ColsAreOutputs => self.num_rows,
        }
    }

    /// Number of physical demux select lines.
    pub fn num_demux_selects(&self) -> usize {
        self.output_pins().len()
    }

    /// Number of distinct addresses the select lines can encode.
    pub fn demux_capacity(&self) -> usize {
        1 << self.num_demux_selects().min(MAX_SELECT_LINES)
    }

    /// Number of outputs addressed each cycle.
    ///
    /// Logical outputs beyond the demux capacity are never sampled.
    pub fn num_outputs(&self) -> usize {
        self.output_dim().min(self.demux_capacity())
    }

    /// Number of sensed lines read for every output.
    pub fn num_inputs(&self) -> usize {
        self.input_pins().len()
    }

    /// Checks the invariants the scanner relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_rows == 0 || self.num_cols == 0 {
            return Err(ConfigError::EmptyMatrix);
        }

        let selects = self.num_demux_selects();
        if selects == 0 {
            return Err(ConfigError::NoSelectLines);
        }
        if selects > MAX_SELECT_LINES {
            return Err(ConfigError::TooManySelectLines {
                lines: selects,
                limit: MAX_SELECT_LINES,
            });
        }

        let inputs = self.num_inputs();
        if inputs == 0 {
            return Err(ConfigError::NoInputLines);
        }
        let limit = self.input_dim().min(MAX_GROUP_PINS);
        if inputs > limit {
            return Err(ConfigError::TooManyInputLines {
                lines: inputs,
                limit,
            });
        }

        Ok(())
    }

    /// Logs the parts of a valid configuration that leave cells unsampled.
    pub(crate) fn log_coverage(&self) {
        if self.output_dim() > self.demux_capacity() {
            log::warn!(
                "kscan: {} logical outputs but {} select lines address only {}; the rest are never sampled",
                self.output_dim(),
                self.num_demux_selects(),
                self.demux_capacity()
            );
        }
        if self.num_inputs() < self.input_dim() {
            log::warn!(
                "kscan: {} sensed lines for {} logical inputs; the rest are never sampled",
                self.num_inputs(),
                self.input_dim()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOUR_ROWS: [PinRef; 4] = [
        PinRef::new(0, 0, PinFlags::ACTIVE_HIGH),
        PinRef::new(0, 1, PinFlags::ACTIVE_HIGH),
        PinRef::new(0, 2, PinFlags::ACTIVE_HIGH),
        PinRef::new(0, 3, PinFlags::ACTIVE_HIGH),
    ];
    const THREE_SELECTS: [PinRef; 3] = [
        PinRef::new(1, 0, PinFlags::ACTIVE_HIGH),
        PinRef::new(1, 1, PinFlags::ACTIVE_HIGH),
        PinRef::new(1, 2, PinFlags::ACTIVE_HIGH),
    ];

    #[test]
    fn derived_sizes_for_cols_as_outputs() {
        let config =
            MatrixConfig::new(4, 8, Orientation::ColsAreOutputs, &FOUR_ROWS, &THREE_SELECTS);
        assert_eq!(config.num_demux_selects(), 3);
        assert_eq!(config.demux_capacity(), 8);
        assert_eq!(config.num_outputs(), 8);
        assert_eq!(config.num_inputs(), 4);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn outputs_are_capped_at_demux_capacity() {
        let config =
            MatrixConfig::new(4, 12, Orientation::ColsAreOutputs, &FOUR_ROWS, &THREE_SELECTS);
        assert_eq!(config.num_outputs(), 8);
        assert_eq!(config.validate(), Ok(()));

        let config =
            MatrixConfig::new(4, 5, Orientation::ColsAreOutputs, &FOUR_ROWS, &THREE_SELECTS);
        assert_eq!(config.num_outputs(), 5);
    }

    #[test]
    fn rows_as_outputs_swaps_groups() {
        // 3 row select lines address up to 8 rows; the 4 "demux" pins are read as columns.
        let config =
            MatrixConfig::new(6, 4, Orientation::RowsAreOutputs, &THREE_SELECTS, &FOUR_ROWS);
        assert_eq!(config.num_demux_selects(), 3);
        assert_eq!(config.num_outputs(), 6);
        assert_eq!(config.num_inputs(), 4);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_invalid_shapes() {
        let empty = MatrixConfig::new(0, 8, Orientation::ColsAreOutputs, &FOUR_ROWS, &THREE_SELECTS);
        assert_eq!(empty.validate(), Err(ConfigError::EmptyMatrix));

        let no_selects = MatrixConfig::new(4, 8, Orientation::ColsAreOutputs, &FOUR_ROWS, &[]);
        assert_eq!(no_selects.validate(), Err(ConfigError::NoSelectLines));

        let no_inputs = MatrixConfig::new(4, 8, Orientation::ColsAreOutputs, &[], &THREE_SELECTS);
        assert_eq!(no_inputs.validate(), Err(ConfigError::NoInputLines));

        // More sensed pins than logical rows would map reads outside the matrix.
        let too_many =
            MatrixConfig::new(2, 8, Orientation::ColsAreOutputs, &FOUR_ROWS, &THREE_SELECTS);
        assert_eq!(
            too_many.validate(),
            Err(ConfigError::TooManyInputLines { lines: 4, limit: 2 })
        );
    }

    #[test]
    fn polling_is_the_default_trigger() {
        let config =
            MatrixConfig::new(4, 8, Orientation::ColsAreOutputs, &FOUR_ROWS, &THREE_SELECTS);
        assert_eq!(config.trigger, TriggerMode::default());
        assert_eq!(
            config.trigger,
            TriggerMode::Polling {
                interval: DEFAULT_POLL_INTERVAL
            }
        );
    }

    #[test]
    fn builder_sets_trigger_and_debounce() {
        let config =
            MatrixConfig::new(4, 8, Orientation::ColsAreOutputs, &FOUR_ROWS, &THREE_SELECTS)
                .with_debounce_period(Duration::from_millis(5))
                .with_trigger(TriggerMode::Interrupt);
        assert_eq!(config.debounce_period, Duration::from_millis(5));
        assert_eq!(config.trigger, TriggerMode::Interrupt);
    }
}
