//! [`CompareCounter`] over the simulated board

use softpwm_timer::CompareCounter;

use crate::board::SimBoard;

/// The board's compare counter, as firmware sees it
pub struct SimCounter {
    board: SimBoard,
}

impl SimCounter {
    pub(crate) fn new(board: SimBoard) -> Self {
        Self { board }
    }

    pub fn board(&self) -> &SimBoard {
        &self.board
    }
}

impl CompareCounter for SimCounter {
    fn width(&self) -> u32 {
        self.board.lock().config.width
    }

    fn prescalers(&self) -> &'static [u32] {
        self.board.lock().config.prescalers
    }

    /// The read is charged before the value is latched
    fn count(&self) -> u32 {
        let mut state = self.board.lock();
        let cost = state.config.read_cost;
        state.advance(cost);
        state.count
    }

    fn set_compare(&mut self, target: u32) {
        self.board.lock().compare = target;
    }

    fn start(&mut self, index: usize) {
        self.board.lock().start(index);
    }

    fn stop(&mut self) {
        self.board.lock().stop();
    }

    fn set_match_interrupt(&mut self, enabled: bool) {
        self.board.lock().match_enabled = enabled;
    }

    fn clear_match(&mut self) {
        self.board.lock().pending = false;
    }
}
