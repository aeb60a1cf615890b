//! Multiplexer configuration and the tick-domain tunables derived from it

use softpwm_core::TickBase;
use softpwm_timer::{MicrosSource, TimerConfig};

/// Default upper bound on registered channels
pub const DEFAULT_MAX_CHANNELS: usize = 32;

/// Scheduler tunables, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Longest acceptable scheduler tick, in nanoseconds
    pub min_resolution_ns: u32,
    /// Slack before the next deadline that lets the draining loop return
    pub min_gap_us: u32,
    /// Shortest lead between the end of a pass and the next interrupt
    pub min_lead_us: u32,
    /// Execution budget of one interrupt
    pub max_duration_us: u32,
    /// Longest time between two interrupts
    pub max_horizon_us: u32,
    /// Upper bound for every tunable once converted to ticks
    pub max_tunable_ticks: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_resolution_ns: 1_000,
            min_gap_us: 100,
            min_lead_us: 15,
            max_duration_us: 1_000,
            max_horizon_us: 10_000,
            max_tunable_ticks: 60_000,
        }
    }
}

impl TimingConfig {
    pub fn builder() -> TimingConfigBuilder {
        TimingConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimingConfigBuilder {
    config: TimingConfig,
}

impl TimingConfigBuilder {
    pub fn min_resolution_ns(mut self, ns: u32) -> Self {
        self.config.min_resolution_ns = ns;
        self
    }

    pub fn min_gap_us(mut self, us: u32) -> Self {
        self.config.min_gap_us = us;
        self
    }

    pub fn min_lead_us(mut self, us: u32) -> Self {
        self.config.min_lead_us = us;
        self
    }

    pub fn max_duration_us(mut self, us: u32) -> Self {
        self.config.max_duration_us = us;
        self
    }

    pub fn max_horizon_us(mut self, us: u32) -> Self {
        self.config.max_horizon_us = us;
        self
    }

    pub fn max_tunable_ticks(mut self, ticks: u32) -> Self {
        self.config.max_tunable_ticks = ticks;
        self
    }

    pub fn build(self) -> TimingConfig {
        self.config
    }
}

/// The [`TimingConfig`] tunables converted to scheduler ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTuning {
    pub min_gap: u64,
    pub min_lead: u64,
    pub max_duration: u64,
    pub max_horizon: u64,
}

impl TickTuning {
    /// Convert with truncation, then clamp each tunable to
    /// `max_tunable_ticks`. The horizon is kept at one tick or more.
    pub fn new(timing: &TimingConfig, base: &TickBase) -> Self {
        let clamp = u64::from(timing.max_tunable_ticks);
        let ns = u64::from(base.ns_per_tick().max(1));
        let convert = |us: u32| (u64::from(us) * 1_000 / ns).min(clamp);

        Self {
            min_gap: convert(timing.min_gap_us),
            min_lead: convert(timing.min_lead_us),
            max_duration: convert(timing.max_duration_us),
            max_horizon: convert(timing.max_horizon_us).max(1),
        }
    }
}

/// Everything [`Pwm::initialize`](crate::Pwm::initialize) needs.
#[derive(Debug, Clone, Copy)]
pub struct PwmConfig {
    pub timer: TimerConfig,
    pub timing: TimingConfig,
    /// Requested registry capacity, clamped to the handle's storage
    pub max_channels: usize,
    /// External microsecond clock for [`Pwm::micros`](crate::Pwm::micros)
    pub micros_source: Option<MicrosSource>,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            timing: TimingConfig::default(),
            max_channels: DEFAULT_MAX_CHANNELS,
            micros_source: None,
        }
    }
}

impl PwmConfig {
    /// Creates a new multiplexer configuration builder.
    pub fn builder() -> PwmConfigBuilder {
        PwmConfigBuilder::default()
    }
}

/// Builder for [`PwmConfig`].
#[derive(Debug, Clone, Default)]
pub struct PwmConfigBuilder {
    config: PwmConfig,
}

impl PwmConfigBuilder {
    pub fn timer(mut self, timer: TimerConfig) -> Self {
        self.config.timer = timer;
        self
    }

    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.config.timing = timing;
        self
    }

    /// Sets the requested channel capacity.
    pub fn max_channels(mut self, count: usize) -> Self {
        self.config.max_channels = count;
        self
    }

    /// Sets the external microsecond clock.
    pub fn micros_source(mut self, source: MicrosSource) -> Self {
        self.config.micros_source = Some(source);
        self
    }

    pub fn build(self) -> PwmConfig {
        self.config
    }
}
