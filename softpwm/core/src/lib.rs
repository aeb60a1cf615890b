#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

//! # softpwm core
//!
//! Shared types for the software PWM multiplexer: the error taxonomy, the
//! scheduler tick domain and the output-sink capability through which
//! channels drive their pins.
//!
//! Nothing in here touches hardware. Platform crates implement
//! [`OutputSink`] for their GPIO banks and the timer crate implements the
//! counter side.

use core::fmt;

pub mod sink;
pub mod time;

pub use sink::*;
pub use time::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used throughout the multiplexer
pub type PwmResult<T> = Result<T, PwmError>;

/// Reasons a control operation declined to change anything.
///
/// None of these are faults: the state is left exactly as it was and the
/// caller decides whether it cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmError {
    /// The multiplexer has not been initialized or was freed
    NotInitialized,
    /// Every registry slot is taken
    CapacityFull,
    /// A channel for this pin is already registered
    DuplicatePin,
    /// The pin is the `NO_PIN` sentinel or the sink cannot resolve it
    InvalidPin,
    /// No registered channel drives this pin
    NotFound,
    /// Registry index out of range
    InvalidIndex,
}

impl fmt::Display for PwmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PwmError::NotInitialized => write!(f, "multiplexer not initialized"),
            PwmError::CapacityFull => write!(f, "channel registry is full"),
            PwmError::DuplicatePin => write!(f, "pin already registered"),
            PwmError::InvalidPin => write!(f, "invalid pin"),
            PwmError::NotFound => write!(f, "no channel for pin"),
            PwmError::InvalidIndex => write!(f, "registry index out of range"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PwmError {}

#[cfg(feature = "defmt")]
impl defmt::Format for PwmError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            PwmError::NotInitialized => defmt::write!(fmt, "NotInitialized"),
            PwmError::CapacityFull => defmt::write!(fmt, "CapacityFull"),
            PwmError::DuplicatePin => defmt::write!(fmt, "DuplicatePin"),
            PwmError::InvalidPin => defmt::write!(fmt, "InvalidPin"),
            PwmError::NotFound => defmt::write!(fmt, "NotFound"),
            PwmError::InvalidIndex => defmt::write!(fmt, "InvalidIndex"),
        }
    }
}
