//! Timer driver configuration

/// Instruction latency between computing a delay and the counter being
/// reloaded, in CPU cycles. Subtracted from delay-based arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverheadTune {
    pub one_shot: u32,
    pub periodic: u32,
}

impl Default for OverheadTune {
    fn default() -> Self {
        Self {
            one_shot: 20,
            periodic: 93,
        }
    }
}

/// Configuration for a [`TimerDriver`](crate::TimerDriver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub cpu_hz: u32,
    pub tune: OverheadTune,
    /// Shortest delay ever programmed, in counter ticks
    pub min_arm_ticks: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            cpu_hz: 16_000_000,
            tune: OverheadTune::default(),
            min_arm_ticks: 4,
        }
    }
}

impl TimerConfig {
    /// Creates a new timer configuration builder.
    pub fn builder() -> TimerConfigBuilder {
        TimerConfigBuilder::default()
    }
}

/// Builder for [`TimerConfig`].
#[derive(Debug, Clone, Default)]
pub struct TimerConfigBuilder {
    config: TimerConfig,
}

impl TimerConfigBuilder {
    /// Sets the CPU clock feeding the prescaler.
    pub fn cpu_hz(mut self, hz: u32) -> Self {
        self.config.cpu_hz = hz;
        self
    }

    /// Sets the overhead tunes, in CPU cycles.
    ///
    /// # Parameters
    /// - `one_shot`: subtracted from one-shot delays
    /// - `periodic`: subtracted from the first period of a periodic arm
    pub fn overhead_tune(mut self, one_shot: u32, periodic: u32) -> Self {
        self.config.tune = OverheadTune { one_shot, periodic };
        self
    }

    /// Sets the minimum delay, in counter ticks.
    pub fn min_arm_ticks(mut self, ticks: u32) -> Self {
        self.config.min_arm_ticks = ticks;
        self
    }

    /// Builds the timer configuration.
    pub fn build(self) -> TimerConfig {
        self.config
    }
}
