//! Pin roles and pin resolution.
//!
//! [`Orientation::roles`] is the single place deciding which configured group is driven
//! through the demux and which is sensed. Every lookup of configured pins and every
//! resolution of live handles goes through it.

use core::fmt::Debug;

use embedded_hal::digital::{InputPin, OutputPin, PinState};
use embedded_hal_async::digital::Wait;
use heapless::Vec;

use crate::conf::{MatrixConfig, Orientation, PinRef, MAX_GROUP_PINS, MAX_SELECT_LINES};
use crate::err::KscanError;

/// One of the two configured pin groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinGroup {
    /// [`MatrixConfig::row_pins`].
    Rows,
    /// [`MatrixConfig::demux_pins`].
    Demux,
}

/// The role assignment of both pin groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinRoles {
    /// The group driven as demux select lines.
    pub outputs: PinGroup,
    /// The group read as sensed lines.
    pub inputs: PinGroup,
}

impl Orientation {
    /// Returns which pin group is driven and which is sensed.
    pub const fn roles(self) -> PinRoles {
        match self {
            Orientation::RowsAreOutputs => PinRoles {
                outputs: PinGroup::Rows,
                inputs: PinGroup::Demux,
            },
            Orientation::ColsAreOutputs => PinRoles {
                outputs: PinGroup::Demux,
                inputs: PinGroup::Rows,
            },
        }
    }

    /// Maps a sensed line index and an output address to a `(row, col)` cell.
    pub const fn cell(self, input: usize, output: usize) -> (usize, usize) {
        match self {
            Orientation::RowsAreOutputs => (output, input),
            Orientation::ColsAreOutputs => (input, output),
        }
    }
}

impl MatrixConfig {
    /// The configured pins of a group.
    pub fn group(&self, group: PinGroup) -> &'static [PinRef] {
        match group {
            PinGroup::Rows => self.row_pins,
            PinGroup::Demux => self.demux_pins,
        }
    }

    /// The configured pins driven as select lines.
    pub fn output_pins(&self) -> &'static [PinRef] {
        self.group(self.orientation.roles().outputs)
    }

    /// The configured pins read as sensed lines.
    pub fn input_pins(&self) -> &'static [PinRef] {
        self.group(self.orientation.roles().inputs)
    }
}

/// Turns configured [`PinRef`]s into live pin handles.
///
/// Implemented by the platform binding. Each call both looks up the pin and configures its
/// mode, so a returned handle is ready to use.
pub trait PinResolver {
    /// Handle for a sensed line.
    type Input: InputPin;
    /// Handle for a select line.
    type Output: OutputPin;
    /// Lookup or configuration failure.
    type Error: Debug;

    /// Resolves `pin` as an input with its configured bias.
    fn input(&mut self, pin: &PinRef) -> Result<Self::Input, Self::Error>;

    /// Resolves `pin` as an output, initially driven to `initial`.
    fn output(&mut self, pin: &PinRef, initial: PinState) -> Result<Self::Output, Self::Error>;
}

/// A sensed line that reports its logical level.
pub struct SenseLine<I> {
    pin: I,
    active_low: bool,
}

impl<I: InputPin> SenseLine<I> {
    /// Wraps `pin`, inverting reads when `active_low` is set.
    pub fn new(pin: I, active_low: bool) -> Self {
        Self { pin, active_low }
    }

    /// Returns `true` when the line is at its active level.
    pub fn is_active(&mut self) -> Result<bool, I::Error> {
        Ok(self.pin.is_high()? != self.active_low)
    }
}

impl<I: InputPin + Wait> SenseLine<I> {
    /// Waits until the line is at its active level. Returns at once if it already is.
    pub async fn wait_for_active(&mut self) -> Result<(), I::Error> {
        if self.active_low {
            self.pin.wait_for_low().await
        } else {
            self.pin.wait_for_high().await
        }
    }
}

/// A driven line that accepts logical levels.
pub struct SelectLine<O> {
    pin: O,
    active_low: bool,
}

impl<O: OutputPin> SelectLine<O> {
    /// Wraps `pin`, inverting writes when `active_low` is set.
    pub fn new(pin: O, active_low: bool) -> Self {
        Self { pin, active_low }
    }

    /// Drives the line to its active (`true`) or inactive level.
    pub fn set(&mut self, active: bool) -> Result<(), O::Error> {
        self.pin.set_state(physical_state(active, self.active_low))
    }
}

pub(crate) fn physical_state(active: bool, active_low: bool) -> PinState {
    PinState::from(active != active_low)
}

/// Live handles for both roles, in configuration order.
pub struct ResolvedPins<I, O> {
    /// Sensed lines.
    pub inputs: Vec<SenseLine<I>, MAX_GROUP_PINS>,
    /// Select lines, least significant address bit first.
    pub outputs: Vec<SelectLine<O>, MAX_SELECT_LINES>,
}

/// Resolves every configured pin, inputs first.
///
/// Stops at the first pin that fails and reports it. Outputs start at their active level.
pub fn resolve<R: PinResolver>(
    config: &MatrixConfig,
    resolver: &mut R,
) -> Result<ResolvedPins<R::Input, R::Output>, KscanError<R::Error>> {
    let roles = config.orientation.roles();
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();

    for (index, pin) in config.group(roles.inputs).iter().enumerate() {
        let handle = resolver.input(pin).map_err(|source| {
            log::warn!("kscan: unable to configure pin {} on port {} for input", pin.pin, pin.port);
            KscanError::Pin {
                group: roles.inputs,
                index,
                pin: *pin,
                source,
            }
        })?;
        log::debug!("kscan: configured pin {} on port {} for input", pin.pin, pin.port);
        if inputs
            .push(SenseLine::new(handle, pin.flags.active_low))
            .is_err()
        {
            return Err(crate::err::ConfigError::TooManyInputLines {
                lines: config.group(roles.inputs).len(),
                limit: MAX_GROUP_PINS,
            }
            .into());
        }
    }

    for (index, pin) in config.group(roles.outputs).iter().enumerate() {
        let handle = resolver
            .output(pin, physical_state(true, pin.flags.active_low))
            .map_err(|source| {
                log::warn!(
                    "kscan: unable to configure pin {} on port {} for output",
                    pin.pin,
                    pin.port
                );
                KscanError::Pin {
                    group: roles.outputs,
                    index,
                    pin: *pin,
                    source,
                }
            })?;
        log::debug!("kscan: configured pin {} on port {} for output", pin.pin, pin.port);
        if outputs
            .push(SelectLine::new(handle, pin.flags.active_low))
            .is_err()
        {
            return Err(crate::err::ConfigError::TooManySelectLines {
                lines: config.group(roles.outputs).len(),
                limit: MAX_SELECT_LINES,
            }
            .into());
        }
    }

    Ok(ResolvedPins { inputs, outputs })
}
