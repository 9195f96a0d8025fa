//! A simulated demux board for host tests.
//!
//! Select lines store their physical level. A sensed line decodes the current select-line
//! levels into an address and reports the keys pressed at that address.

use core::future::poll_fn;
use core::task::Poll;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::digital::{Error, ErrorKind, ErrorType, InputPin, OutputPin, PinState};
use embedded_hal_async::digital::Wait;

use crate::conf::{MatrixConfig, Orientation, PinRef};
use crate::pins::PinResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

impl Error for MockError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Input,
    Output,
}

pub type SharedBoard = Rc<RefCell<Board>>;

pub struct Board {
    orientation: Orientation,
    select_pins: Vec<PinRef>,
    sense_pins: Vec<PinRef>,
    levels: HashMap<u8, bool>,
    pub pressed: Vec<(usize, usize)>,
    pub missing: Vec<u8>,
    pub failing_reads: Vec<u8>,
    pub failing_writes: Vec<u8>,
    pub resolved: Vec<(u8, Role)>,
    pub writes: Vec<(u8, bool)>,
}

impl Board {
    pub fn shared(config: &MatrixConfig) -> SharedBoard {
        Rc::new(RefCell::new(Board {
            orientation: config.orientation,
            select_pins: config.output_pins().to_vec(),
            sense_pins: config.input_pins().to_vec(),
            levels: HashMap::new(),
            pressed: Vec::new(),
            missing: Vec::new(),
            failing_reads: Vec::new(),
            failing_writes: Vec::new(),
            resolved: Vec::new(),
            writes: Vec::new(),
        }))
    }

    pub fn press(&mut self, row: usize, col: usize) {
        if !self.pressed.contains(&(row, col)) {
            self.pressed.push((row, col));
        }
    }

    pub fn release(&mut self, row: usize, col: usize) {
        self.pressed.retain(|key| *key != (row, col));
    }

    /// Physical level last driven on an output pin.
    pub fn physical(&self, pin: u8) -> Option<bool> {
        self.levels.get(&pin).copied()
    }

    /// The address currently encoded by the select lines.
    pub fn address(&self) -> usize {
        self.select_pins
            .iter()
            .enumerate()
            .map(|(bit, pin)| {
                let high = self.physical(pin.pin).unwrap_or(false);
                usize::from(high != pin.flags.active_low) << bit
            })
            .sum()
    }

    fn sense_physical(&self, pin: u8) -> bool {
        let (index, sense) = self
            .sense_pins
            .iter()
            .enumerate()
            .find(|(_, p)| p.pin == pin)
            .expect("pin is not a sensed line");
        let cell = self.orientation.cell(index, self.address());
        let active = self.pressed.contains(&cell);
        active != sense.flags.active_low
    }
}

pub struct MockInput {
    board: SharedBoard,
    pin: u8,
}

impl ErrorType for MockInput {
    type Error = MockError;
}

impl InputPin for MockInput {
    fn is_high(&mut self) -> Result<bool, MockError> {
        let board = self.board.borrow();
        if board.failing_reads.contains(&self.pin) {
            return Err(MockError);
        }
        Ok(board.sense_physical(self.pin))
    }

    fn is_low(&mut self) -> Result<bool, MockError> {
        self.is_high().map(|high| !high)
    }
}

impl MockInput {
    async fn wait_for_level(&mut self, high: bool) -> Result<(), MockError> {
        poll_fn(|cx| match self.is_high() {
            Ok(level) if level == high => Poll::Ready(Ok(())),
            Ok(_) => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Err(err) => Poll::Ready(Err(err)),
        })
        .await
    }
}

impl Wait for MockInput {
    async fn wait_for_high(&mut self) -> Result<(), MockError> {
        self.wait_for_level(true).await
    }

    async fn wait_for_low(&mut self) -> Result<(), MockError> {
        self.wait_for_level(false).await
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), MockError> {
        self.wait_for_level(false).await?;
        self.wait_for_level(true).await
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), MockError> {
        self.wait_for_level(true).await?;
        self.wait_for_level(false).await
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), MockError> {
        let start = self.is_high()?;
        self.wait_for_level(!start).await
    }
}

pub struct MockOutput {
    board: SharedBoard,
    pin: u8,
}

impl MockOutput {
    fn drive(&mut self, high: bool) -> Result<(), MockError> {
        let mut board = self.board.borrow_mut();
        if board.failing_writes.contains(&self.pin) {
            return Err(MockError);
        }
        board.levels.insert(self.pin, high);
        board.writes.push((self.pin, high));
        Ok(())
    }
}

impl ErrorType for MockOutput {
    type Error = MockError;
}

impl OutputPin for MockOutput {
    fn set_low(&mut self) -> Result<(), MockError> {
        self.drive(false)
    }

    fn set_high(&mut self) -> Result<(), MockError> {
        self.drive(true)
    }
}

pub struct MockResolver {
    board: SharedBoard,
}

impl MockResolver {
    pub fn new(board: SharedBoard) -> Self {
        Self { board }
    }
}

impl PinResolver for MockResolver {
    type Input = MockInput;
    type Output = MockOutput;
    type Error = MockError;

    fn input(&mut self, pin: &PinRef) -> Result<MockInput, MockError> {
        let mut board = self.board.borrow_mut();
        if board.missing.contains(&pin.pin) {
            return Err(MockError);
        }
        board.resolved.push((pin.pin, Role::Input));
        Ok(MockInput {
            board: self.board.clone(),
            pin: pin.pin,
        })
    }

    fn output(&mut self, pin: &PinRef, initial: PinState) -> Result<MockOutput, MockError> {
        let mut board = self.board.borrow_mut();
        if board.missing.contains(&pin.pin) {
            return Err(MockError);
        }
        board.resolved.push((pin.pin, Role::Output));
        board.levels.insert(pin.pin, initial == PinState::High);
        Ok(MockOutput {
            board: self.board.clone(),
            pin: pin.pin,
        })
    }
}
