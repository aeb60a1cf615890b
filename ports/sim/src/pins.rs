//! [`OutputSink`] over the simulated GPIO bank

use softpwm_core::{Level, OutputSink, PinId, NO_PIN};

use crate::board::SimBoard;

/// The board's digital pins. Lines are the pin numbers themselves.
pub struct SimPins {
    board: SimBoard,
}

impl SimPins {
    pub(crate) fn new(board: SimBoard) -> Self {
        Self { board }
    }

    pub fn board(&self) -> &SimBoard {
        &self.board
    }
}

impl OutputSink for SimPins {
    type Line = PinId;

    fn resolve(&self, pin: PinId) -> Option<PinId> {
        let count = self.board.lock().config.pin_count;
        (pin != NO_PIN && pin < count).then_some(pin)
    }

    fn configure_output(&mut self, line: PinId) {
        if let Some(output) = self.board.lock().outputs.get_mut(usize::from(line)) {
            *output = true;
        }
    }

    fn write(&mut self, line: PinId, level: Level) {
        self.board.lock().drive(line, level);
    }

    fn read(&mut self, line: PinId) -> Level {
        self.board
            .lock()
            .levels
            .get(usize::from(line))
            .copied()
            .unwrap_or(Level::Low)
    }
}
