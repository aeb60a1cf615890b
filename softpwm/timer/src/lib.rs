#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

//! # softpwm timer
//!
//! Hardware timer abstraction for the software PWM multiplexer.
//!
//! A platform implements [`CompareCounter`] for one free-running counter
//! with a compare-match interrupt. [`TimerDriver`] builds on it:
//!
//! - a monotonic CPU-cycle clock folded from counter deltas
//! - prescaler selection per arm (finest divisor that fits)
//! - one-shot, periodic and "at most" arming with overhead compensation

pub mod config;
pub mod counter;
pub mod driver;
pub mod prescale;

pub use config::{OverheadTune, TimerConfig, TimerConfigBuilder};
pub use counter::{max_count, CompareCounter, AVR_TIMER1_PRESCALERS};
pub use driver::{ArmState, FireCallback, MicrosSource, TimerDriver};
pub use prescale::Prescale;
