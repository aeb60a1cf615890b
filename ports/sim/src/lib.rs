//! Host simulation port for softpwm
//!
//! A cycle-counting model of an AVR-style board: a 16-bit up-counter with
//! the TIMER1 prescaler set and one compare-match flag, plus a bank of
//! digital pins that logs every level change with its CPU cycle. Time is
//! virtual; [`SimBoard::run_for`] advances it and plays the interrupt
//! controller.
//!
//! ```ignore
//! let board = SimBoard::default();
//! let pwm: Pwm<SimCounter, SimPins, 4> = Pwm::new();
//! pwm.initialize(board.counter(), board.pins(), PwmConfig::default());
//! // ...
//! board.run_for_micros(5_000, || pwm.on_interrupt());
//! ```

pub mod board;
pub mod counter;
pub mod pins;

pub use board::{BoardConfig, Edge, SimBoard};
pub use counter::SimCounter;
pub use pins::SimPins;
