//! Error types for the demux key scanner.

use core::convert::Infallible;
use core::fmt::{self, Debug};

use crate::conf::PinRef;
use crate::pins::PinGroup;

/// A [`MatrixConfig`](crate::MatrixConfig) that cannot be scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The matrix has zero rows or zero columns.
    EmptyMatrix,
    /// The driven pin group is empty.
    NoSelectLines,
    /// The driven pin group has more pins than the demux supports.
    TooManySelectLines {
        /// Configured select lines.
        lines: usize,
        /// Supported maximum.
        limit: usize,
    },
    /// The sensed pin group is empty.
    NoInputLines,
    /// The sensed pin group has more pins than the logical dimension (or storage) allows.
    TooManyInputLines {
        /// Configured sensed lines.
        lines: usize,
        /// Supported maximum.
        limit: usize,
    },
    /// The scanner's matrix dimensions differ from the configuration.
    DimensionMismatch {
        /// Configured `(rows, cols)`.
        configured: (usize, usize),
        /// Storage `(rows, cols)` of the scanner.
        storage: (usize, usize),
    },
}

/// The main error type of the scanner.
///
/// `E` is the platform's pin error, only produced while the device is brought up.
pub enum KscanError<E = Infallible> {
    /// The configuration is invalid.
    Config(ConfigError),
    /// A configured pin could not be resolved or configured.
    Pin {
        /// The group the pin belongs to.
        group: PinGroup,
        /// Position of the pin within its group.
        index: usize,
        /// The pin as configured.
        pin: PinRef,
        /// The platform error.
        source: E,
    },
    /// The device was enabled before an event sink was configured.
    NoCallback,
}

impl<E: Debug> Debug for KscanError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "Config({err:?})"),
            Self::Pin {
                group,
                index,
                pin,
                source,
            } => write!(
                f,
                "Pin({group:?}[{index}] port {} pin {}: {source:?})",
                pin.port, pin.pin
            ),
            Self::NoCallback => write!(f, "NoCallback"),
        }
    }
}

impl<E> From<ConfigError> for KscanError<E> {
    fn from(err: ConfigError) -> Self {
        KscanError::Config(err)
    }
}

impl<E: PartialEq> PartialEq for KscanError<E> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Config(a), Self::Config(b)) => a == b,
            (
                Self::Pin {
                    group: ga,
                    index: ia,
                    pin: pa,
                    source: sa,
                },
                Self::Pin {
                    group: gb,
                    index: ib,
                    pin: pb,
                    source: sb,
                },
            ) => ga == gb && ia == ib && pa == pb && sa == sb,
            (Self::NoCallback, Self::NoCallback) => true,
            _ => false,
        }
    }
}
