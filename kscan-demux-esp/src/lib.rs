//! `esp-hal` pins for [`kscan_demux_async`].
//!
//! [`EspPinResolver`] holds the GPIOs handed over by the application and configures them as
//! [`Input`]s and [`Output`]s when a [`KscanDemux`](kscan_demux_async::KscanDemux) is created.
//!
//! A [`PinRef`] addresses a GPIO by bank and offset: `port` 0 covers GPIO0 to GPIO31 and
//! `port` 1 covers GPIO32 and up.
//!
//! ```ignore
//! # use esp_hal::gpio::Pin;
//! # let peripherals = esp_hal::init(esp_hal::Config::default());
//! use kscan_demux_esp::EspPinResolver;
//!
//! let mut resolver = EspPinResolver::<'_, 8>::new();
//! resolver.register(4, peripherals.GPIO4.degrade()).ok();
//! resolver.register(10, peripherals.GPIO10.degrade()).ok();
//! ```

#![no_std]

use embedded_hal::digital::PinState;
use esp_hal::gpio::{AnyPin, Input, InputConfig, Level, Output, OutputConfig, Pull as EspPull};
use heapless::Vec;
use kscan_demux_async::{PinRef, PinResolver, Pull};

/// GPIOs per bank.
const BANK_WIDTH: u8 = 32;

/// Why a configured pin could not be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EspPinError {
    /// The GPIO was never registered, or was already resolved.
    Unavailable {
        /// Global GPIO number.
        gpio: u8,
    },
    /// The bank/offset pair does not name a GPIO.
    InvalidPin {
        /// Configured bank.
        port: u8,
        /// Configured offset.
        pin: u8,
    },
}

/// Hands out registered GPIOs by [`PinRef`].
///
/// `N` is the number of GPIOs that can be registered.
pub struct EspPinResolver<'d, const N: usize> {
    pins: Vec<(u8, AnyPin<'d>), N>,
}

impl<'d, const N: usize> Default for EspPinResolver<'d, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d, const N: usize> EspPinResolver<'d, N> {
    /// Creates a resolver with no GPIOs.
    pub const fn new() -> Self {
        Self { pins: Vec::new() }
    }

    /// Makes `pin` available as GPIO number `gpio`.
    ///
    /// Gives the pin back if the resolver is full.
    pub fn register(&mut self, gpio: u8, pin: AnyPin<'d>) -> Result<(), AnyPin<'d>> {
        self.pins.push((gpio, pin)).map_err(|(_, pin)| pin)
    }

    /// Number of GPIOs still available.
    pub fn available(&self) -> usize {
        self.pins.len()
    }

    fn take(&mut self, pin: &PinRef) -> Result<(u8, AnyPin<'d>), EspPinError> {
        let gpio = gpio_number(pin)?;
        let position = self
            .pins
            .iter()
            .position(|(number, _)| *number == gpio)
            .ok_or(EspPinError::Unavailable { gpio })?;
        Ok(self.pins.swap_remove(position))
    }
}

fn gpio_number(pin: &PinRef) -> Result<u8, EspPinError> {
    let invalid = EspPinError::InvalidPin {
        port: pin.port,
        pin: pin.pin,
    };
    if pin.pin >= BANK_WIDTH {
        return Err(invalid);
    }
    pin.port
        .checked_mul(BANK_WIDTH)
        .and_then(|base| base.checked_add(pin.pin))
        .ok_or(invalid)
}

fn esp_pull(pull: Pull) -> EspPull {
    match pull {
        Pull::None => EspPull::None,
        Pull::Up => EspPull::Up,
        Pull::Down => EspPull::Down,
    }
}

impl<'d, const N: usize> PinResolver for EspPinResolver<'d, N> {
    type Input = Input<'d>;
    type Output = Output<'d>;
    type Error = EspPinError;

    fn input(&mut self, pin: &PinRef) -> Result<Input<'d>, EspPinError> {
        let (number, gpio) = self.take(pin)?;
        let config = InputConfig::default().with_pull(esp_pull(pin.flags.pull));
        log::trace!("kscan-esp: GPIO{number} as input, {:?}", pin.flags.pull);
        Ok(Input::new(gpio, config))
    }

    fn output(&mut self, pin: &PinRef, initial: PinState) -> Result<Output<'d>, EspPinError> {
        let (number, gpio) = self.take(pin)?;
        let level = match initial {
            PinState::High => Level::High,
            PinState::Low => Level::Low,
        };
        log::trace!("kscan-esp: GPIO{number} as output, {level:?}");
        Ok(Output::new(gpio, level, OutputConfig::default()))
    }
}
