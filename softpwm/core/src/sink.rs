//! Output sink capability: how a channel reaches its pin

use core::fmt;
use core::ops::Not;

use embedded_hal::digital::{PinState, StatefulOutputPin};

/// Logical pin number as the application knows it
pub type PinId = u8;

/// Sentinel for "no pin"; never resolves
pub const NO_PIN: PinId = 0xFF;

/// Output levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    /// Inactive (0V)
    #[default]
    Low,
    /// Active (VCC)
    High,
}

impl Level {
    /// `High` when `high` is true
    pub const fn from_bool(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }

    /// Check for the active level
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl From<Level> for PinState {
    fn from(level: Level) -> Self {
        match level {
            Level::Low => PinState::Low,
            Level::High => PinState::High,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => write!(f, "low"),
            Level::High => write!(f, "high"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Level {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Level::Low => defmt::write!(fmt, "Low"),
            Level::High => defmt::write!(fmt, "High"),
        }
    }
}

/// Platform service that drives the physical pins.
///
/// The multiplexer never owns pins. It resolves a logical pin number once,
/// keeps the returned `Line` handle (a register/bit-mask pair on most
/// parts) and goes through the sink for every access. `write` sits on the
/// interrupt path and must not block.
pub trait OutputSink {
    /// Resolved, platform-specific handle for one pin
    type Line: Copy;

    /// Map a logical pin to its line, `None` if the pin does not exist
    fn resolve(&self, pin: PinId) -> Option<Self::Line>;

    /// Switch the line to push-pull output
    fn configure_output(&mut self, line: Self::Line);

    /// Drive a level
    fn write(&mut self, line: Self::Line, level: Level);

    /// Read back the level currently driven
    fn read(&mut self, line: Self::Line) -> Level;
}

/// [`OutputSink`] over a fixed bank of embedded-hal output pins.
///
/// Logical pin `n` is `pins[n]`. Pin errors are dropped: a pin that fails
/// to switch simply does not toggle.
pub struct PinBank<P, const K: usize> {
    pins: [P; K],
}

impl<P, const K: usize> PinBank<P, K>
where
    P: StatefulOutputPin,
{
    /// Wrap already-configured output pins
    pub fn new(pins: [P; K]) -> Self {
        Self { pins }
    }

    /// Give the pins back
    pub fn release(self) -> [P; K] {
        self.pins
    }
}

impl<P, const K: usize> OutputSink for PinBank<P, K>
where
    P: StatefulOutputPin,
{
    type Line = usize;

    fn resolve(&self, pin: PinId) -> Option<usize> {
        let index = usize::from(pin);
        (pin != NO_PIN && index < K).then_some(index)
    }

    fn configure_output(&mut self, _line: usize) {
        // embedded-hal output pins are outputs by type
    }

    fn write(&mut self, line: usize, level: Level) {
        if let Some(pin) = self.pins.get_mut(line) {
            let _ = pin.set_state(level.into());
        }
    }

    fn read(&mut self, line: usize) -> Level {
        self.pins
            .get_mut(line)
            .and_then(|pin| pin.is_set_high().ok())
            .map_or(Level::Low, Level::from_bool)
    }
}
