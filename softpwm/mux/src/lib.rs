#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

//! # softpwm mux
//!
//! Many software PWM channels on one hardware compare-match timer.
//!
//! Each [`Channel`] has its own period, duty and phase. The [`Scheduler`]
//! runs in the timer interrupt: it toggles every channel whose deadline has
//! passed, finds the earliest next deadline across the [`Registry`] and
//! re-arms the timer for it. The [`Pwm`] handle is the main-line surface;
//! it shares the scheduler state with the interrupt through a
//! `critical_section::Mutex`.
//!
//! ## Quick start
//!
//! ```ignore
//! static PWM: Pwm<Timer1, Pins, 8> = Pwm::new();
//!
//! PWM.initialize(timer1, pins, PwmConfig::default());
//! PWM.register_pin(3)?;
//! PWM.set_period_and_duty(3, 1_000, 0.25)?;
//! PWM.enable_pin(3)?;
//! PWM.start()?;
//! ```

pub mod channel;
pub mod config;
pub mod pwm;
pub mod registry;
pub mod scheduler;

pub use channel::{Channel, DutyMap};
pub use config::{
    PwmConfig, PwmConfigBuilder, TickTuning, TimingConfig, TimingConfigBuilder,
    DEFAULT_MAX_CHANNELS,
};
pub use pwm::Pwm;
pub use registry::Registry;
pub use scheduler::Scheduler;

pub use softpwm_core::{Level, OutputSink, PinId, PwmError, PwmResult, NO_PIN};
pub use softpwm_timer::{CompareCounter, TimerConfig};
