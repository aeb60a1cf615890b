//! Virtual-time board: one compare counter, a GPIO bank and a CPU clock

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use softpwm_core::{Level, PinId};
use softpwm_timer::{max_count, AVR_TIMER1_PRESCALERS};

use crate::counter::SimCounter;
use crate::pins::SimPins;

/// One recorded level change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub pin: PinId,
    pub level: Level,
    /// CPU cycle of the write
    pub cycle: u64,
}

/// Board parameters
#[derive(Debug, Clone, Copy)]
pub struct BoardConfig {
    pub cpu_hz: u32,
    pub width: u32,
    pub prescalers: &'static [u32],
    pub pin_count: u8,
    /// CPU cycles charged for every counter read
    pub read_cost: u64,
}

impl Default for BoardConfig {
    /// An ATmega328P-like part: 16 MHz, 16-bit TIMER1, 20 digital pins
    fn default() -> Self {
        Self {
            cpu_hz: 16_000_000,
            width: 16,
            prescalers: &AVR_TIMER1_PRESCALERS,
            pin_count: 20,
            read_cost: 16,
        }
    }
}

pub(crate) struct BoardState {
    pub(crate) config: BoardConfig,
    pub(crate) cycles: u64,
    pub(crate) clock: Option<usize>,
    pub(crate) count: u32,
    residue: u64,
    pub(crate) compare: u32,
    pub(crate) match_enabled: bool,
    pub(crate) pending: bool,
    pub(crate) levels: Vec<Level>,
    pub(crate) outputs: Vec<bool>,
    pub(crate) edges: Vec<Edge>,
}

impl BoardState {
    fn new(config: BoardConfig) -> Self {
        let pins = usize::from(config.pin_count);
        Self {
            config,
            cycles: 0,
            clock: None,
            count: 0,
            residue: 0,
            compare: 0,
            match_enabled: false,
            pending: false,
            levels: vec![Level::Low; pins],
            outputs: vec![false; pins],
            edges: Vec::new(),
        }
    }

    fn mask(&self) -> u32 {
        max_count(self.config.width)
    }

    fn divisor(&self) -> Option<u64> {
        let index = self.clock?;
        let divisor = self.config.prescalers.get(index).copied().unwrap_or(1);
        Some(u64::from(divisor.max(1)))
    }

    /// Counter ticks from the current count to the next compare match
    fn ticks_to_match(&self) -> u64 {
        let distance = self.compare.wrapping_sub(self.count) & self.mask();
        if distance == 0 {
            u64::from(self.mask()) + 1
        } else {
            u64::from(distance)
        }
    }

    /// Let `cycles` CPU cycles pass
    pub(crate) fn advance(&mut self, cycles: u64) {
        self.cycles += cycles;
        let Some(divisor) = self.divisor() else {
            return;
        };

        let total = self.residue + cycles;
        let ticks = total / divisor;
        self.residue = total % divisor;
        if ticks == 0 {
            return;
        }

        if ticks >= self.ticks_to_match() {
            self.pending = true;
        }
        let mask = u64::from(self.mask());
        self.count = ((u64::from(self.count) + ticks) & mask) as u32;
    }

    /// CPU cycles until the next compare match, `None` when stopped
    fn cycles_to_match(&self) -> Option<u64> {
        let divisor = self.divisor()?;
        Some((self.ticks_to_match() * divisor).saturating_sub(self.residue).max(1))
    }

    pub(crate) fn start(&mut self, index: usize) {
        if self.clock != Some(index) {
            self.residue = 0;
        }
        self.clock = Some(index);
    }

    pub(crate) fn stop(&mut self) {
        self.clock = None;
        self.residue = 0;
    }

    pub(crate) fn drive(&mut self, pin: PinId, level: Level) {
        let index = usize::from(pin);
        if let Some(current) = self.levels.get_mut(index) {
            if *current != level {
                *current = level;
                self.edges.push(Edge {
                    pin,
                    level,
                    cycle: self.cycles,
                });
            }
        }
    }
}

/// Simulated board shared by its counter, its pins and the test harness.
///
/// Time only moves when the harness runs or when firmware reads the
/// counter, which costs [`BoardConfig::read_cost`] cycles.
#[derive(Clone)]
pub struct SimBoard {
    state: Arc<Mutex<BoardState>>,
}

impl SimBoard {
    pub fn new(config: BoardConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(BoardState::new(config))),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Compare counter half of the board
    pub fn counter(&self) -> SimCounter {
        SimCounter::new(self.clone())
    }

    /// GPIO half of the board
    pub fn pins(&self) -> SimPins {
        SimPins::new(self.clone())
    }

    /// Run for `cycles` CPU cycles, calling `isr` on every compare match
    /// while the match interrupt is enabled.
    ///
    /// The pending flag is cleared on entry, as the hardware does. The
    /// board lock is not held while `isr` runs.
    pub fn run_for(&self, cycles: u64, mut isr: impl FnMut()) {
        let end = self.lock().cycles.saturating_add(cycles);

        loop {
            let fire = {
                let mut state = self.lock();
                if state.pending && state.match_enabled {
                    state.pending = false;
                    true
                } else if state.cycles >= end {
                    break;
                } else {
                    let remaining = end - state.cycles;
                    let step = match (state.match_enabled, state.cycles_to_match()) {
                        (true, Some(to_match)) => to_match.min(remaining),
                        _ => remaining,
                    };
                    state.advance(step);
                    false
                }
            };

            if fire {
                isr();
            }
        }
    }

    /// Run for `micros` microseconds of CPU time
    pub fn run_for_micros(&self, micros: u64, isr: impl FnMut()) {
        let cycles = micros * u64::from(self.lock().config.cpu_hz) / 1_000_000;
        self.run_for(cycles, isr);
    }

    pub fn cycles(&self) -> u64 {
        self.lock().cycles
    }

    pub fn micros(&self) -> u64 {
        let state = self.lock();
        state.cycles * 1_000_000 / u64::from(state.config.cpu_hz.max(1))
    }

    pub fn cpu_hz(&self) -> u32 {
        self.lock().config.cpu_hz
    }

    /// Convert a cycle count to microseconds, as a float
    pub fn cycles_to_micros(&self, cycles: u64) -> f64 {
        cycles as f64 * 1_000_000.0 / f64::from(self.cpu_hz())
    }

    /// Level currently on `pin`
    pub fn level(&self, pin: PinId) -> Level {
        self.lock()
            .levels
            .get(usize::from(pin))
            .copied()
            .unwrap_or(Level::Low)
    }

    /// Whether firmware switched `pin` to output
    pub fn is_output(&self, pin: PinId) -> bool {
        self.lock()
            .outputs
            .get(usize::from(pin))
            .copied()
            .unwrap_or(false)
    }

    /// Level changes on `pin`, oldest first
    pub fn edges(&self, pin: PinId) -> Vec<Edge> {
        self.lock()
            .edges
            .iter()
            .filter(|edge| edge.pin == pin)
            .copied()
            .collect()
    }

    pub fn clear_edges(&self) {
        self.lock().edges.clear();
    }

    /// Whether the counter is clocked
    pub fn is_counting(&self) -> bool {
        self.lock().clock.is_some()
    }
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new(BoardConfig::default())
    }
}
