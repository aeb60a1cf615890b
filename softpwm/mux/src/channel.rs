//! One virtual PWM output

use softpwm_core::{
    frequency_from_period, split_period, Level, OutputSink, PinId, Tick, TickBase,
};

/// Affine map applied to every caller-supplied duty: `raw * scale + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyMap {
    /// Stored duty per unit of caller duty
    pub scale: f32,
    /// Stored duty for a caller duty of zero
    pub offset: f32,
}

impl DutyMap {
    /// Caller duties are stored unchanged
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        offset: 0.0,
    };

    /// The map that sends `mapped_a` to `duty_a` and `mapped_b` to
    /// `duty_b`, `None` when the two inputs coincide.
    pub fn through(duty_a: f32, mapped_a: f32, duty_b: f32, mapped_b: f32) -> Option<Self> {
        if mapped_a == mapped_b {
            return None;
        }
        let scale = (duty_b - duty_a) / (mapped_b - mapped_a);
        Some(Self {
            scale,
            offset: duty_a - mapped_a * scale,
        })
    }

    /// Map a raw duty and clamp it to `[0, 1]`; NaN maps to 0
    pub fn apply(&self, raw: f32) -> f32 {
        let duty = raw * self.scale + self.offset;
        if duty.is_nan() {
            0.0
        } else {
            duty.clamp(0.0, 1.0)
        }
    }

    /// Raw duty for a stored one; 0.0 when the map is constant
    pub fn invert(&self, duty: f32) -> f32 {
        if self.scale == 0.0 {
            0.0
        } else {
            (duty - self.offset) / self.scale
        }
    }
}

impl Default for DutyMap {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// State of one software PWM output.
///
/// A channel is bound to its pin's sink line at registration. Before that it
/// only carries configuration: build one with [`Channel::new`] and the
/// `with_*` methods, then hand it to [`Pwm::register`](crate::Pwm::register).
///
/// Timing lives in scheduler ticks. `high_ticks + low_ticks` is the period
/// whenever the period is non-zero. A channel with no next event is either
/// disabled, off (period 0) or pinned at 0 % / 100 % duty.
#[derive(Debug, Clone)]
pub struct Channel<L> {
    pin: PinId,
    line: Option<L>,
    enabled: bool,
    period_us: u32,
    duty: f32,
    map: DutyMap,
    high_ticks: u32,
    low_ticks: u32,
    next_event: Option<Tick>,
    level: Level,
    owned: bool,
}

impl<L: Copy> Channel<L> {
    /// Unbound, disabled channel for `pin`: period 0, duty 0.5, identity map
    pub fn new(pin: PinId) -> Self {
        Self {
            pin,
            line: None,
            enabled: false,
            period_us: 0,
            duty: 0.5,
            map: DutyMap::IDENTITY,
            high_ticks: 0,
            low_ticks: 0,
            next_event: None,
            level: Level::Low,
            owned: false,
        }
    }

    /// Set the period in microseconds
    pub fn with_period(mut self, period_us: u32) -> Self {
        self.period_us = period_us;
        self
    }

    /// Set the duty through the current map
    pub fn with_duty(mut self, raw_duty: f32) -> Self {
        self.duty = self.map.apply(raw_duty);
        self
    }

    /// Set the duty map, see [`Pwm::set_map`](crate::Pwm::set_map)
    pub fn with_map(mut self, duty_a: f32, mapped_a: f32, duty_b: f32, mapped_b: f32) -> Self {
        self.set_map(duty_a, mapped_a, duty_b, mapped_b);
        self
    }

    /// Pin this channel drives
    pub fn pin(&self) -> PinId {
        self.pin
    }

    /// Whether the pin is being driven
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the channel has been registered and has a sink line
    pub fn is_bound(&self) -> bool {
        self.line.is_some()
    }

    /// Whether the registry allocated this channel
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Period in microseconds, 0 when off
    pub fn period(&self) -> u32 {
        self.period_us
    }

    /// Duty as the caller sees it, through the inverse map
    pub fn duty(&self) -> f32 {
        self.map.invert(self.duty)
    }

    /// Stored duty after mapping and clamping
    pub fn raw_duty(&self) -> f32 {
        self.duty
    }

    /// Frequency in hertz, 0.0 when off
    pub fn frequency(&self) -> f32 {
        frequency_from_period(self.period_us)
    }

    /// Current duty map
    pub fn map(&self) -> DutyMap {
        self.map
    }

    /// High half of the period in scheduler ticks
    pub fn high_ticks(&self) -> u32 {
        self.high_ticks
    }

    /// Low half of the period in scheduler ticks
    pub fn low_ticks(&self) -> u32 {
        self.low_ticks
    }

    /// Instant of the next toggle, `None` when not scheduled
    pub fn next_event(&self) -> Option<Tick> {
        self.next_event
    }

    /// Last level the multiplexer wrote or read back
    pub fn level(&self) -> Level {
        self.level
    }

    /// Replace the duty map. A degenerate map (equal inputs) is ignored.
    /// The stored duty is left as is until the next duty update.
    pub fn set_map(&mut self, duty_a: f32, mapped_a: f32, duty_b: f32, mapped_b: f32) {
        if let Some(map) = DutyMap::through(duty_a, mapped_a, duty_b, mapped_b) {
            self.map = map;
        }
    }

    pub(crate) fn line(&self) -> Option<L> {
        self.line
    }

    pub(crate) fn bind(&mut self, line: L, owned: bool, base: &TickBase) {
        self.line = Some(line);
        self.owned = owned;
        self.enabled = false;
        self.next_event = None;
        self.split(base);
    }

    /// Apply a new period and raw duty.
    ///
    /// Returns the channel's next event when it is toggling and enabled, so
    /// the caller can pull the timer in. The half-period in progress is
    /// never cut short: the next event only moves earlier if a full new
    /// period from `now` ends before it.
    pub(crate) fn set_period_and_duty<S>(
        &mut self,
        period_us: u32,
        raw_duty: f32,
        now: Tick,
        base: &TickBase,
        sink: &mut S,
    ) -> Option<Tick>
    where
        S: OutputSink<Line = L>,
    {
        self.period_us = period_us;
        self.duty = self.map.apply(raw_duty);

        let ticks = match self.split(base) {
            Timing::Toggling(ticks) => ticks,
            Timing::Pinned(level) => {
                self.hold(level, sink);
                return None;
            }
        };
        if !self.enabled {
            self.next_event = None;
            return None;
        }

        let line = self.line?;
        self.level = sink.read(line);
        let bound = now.after(u64::from(ticks));
        let next = self.next_event.map_or(bound, |next| next.min(bound));
        self.next_event = Some(next);
        Some(next)
    }

    /// Start driving the pin: output mode, low, then the first event at `now`.
    ///
    /// No-op when already enabled or unbound.
    pub(crate) fn enable<S>(&mut self, now: Tick, base: &TickBase, sink: &mut S) -> Option<Tick>
    where
        S: OutputSink<Line = L>,
    {
        if self.enabled {
            return None;
        }
        let line = self.line?;

        sink.configure_output(line);
        sink.write(line, Level::Low);
        self.level = Level::Low;
        self.enabled = true;
        self.next_event = None;

        match self.split(base) {
            Timing::Toggling(_) => {
                self.next_event = Some(now);
                Some(now)
            }
            Timing::Pinned(level) => {
                self.hold(level, sink);
                None
            }
        }
    }

    /// Force the pin low and stop scheduling. Idempotent.
    pub(crate) fn disable<S>(&mut self, sink: &mut S)
    where
        S: OutputSink<Line = L>,
    {
        if let Some(line) = self.line {
            sink.write(line, Level::Low);
        }
        self.level = Level::Low;
        self.enabled = false;
        self.next_event = None;
    }

    /// Pull the next event in to one period from `now`
    pub(crate) fn reset_phase(&mut self, now: Tick) -> Option<Tick> {
        if !self.enabled {
            return None;
        }
        let period = u64::from(self.high_ticks) + u64::from(self.low_ticks);
        let next = self.next_event?;
        let next = next.min(now.after(period));
        self.next_event = Some(next);
        Some(next)
    }

    /// Toggle if the next event is due. Returns whether the pin changed.
    ///
    /// Runs inside the interrupt; the half that just started is measured
    /// from the previous event, not from `now`.
    pub(crate) fn service<S>(&mut self, now: Tick, sink: &mut S) -> bool
    where
        S: OutputSink<Line = L>,
    {
        let (Some(next), Some(line)) = (self.next_event, self.line) else {
            return false;
        };
        if next > now {
            return false;
        }

        if self.level.is_high() && self.low_ticks > 0 {
            sink.write(line, Level::Low);
            self.level = Level::Low;
            self.next_event = Some(next.after(u64::from(self.low_ticks)));
        } else if self.high_ticks > 0 {
            sink.write(line, Level::High);
            self.level = Level::High;
            self.next_event = Some(next.after(u64::from(self.high_ticks)));
        } else {
            self.next_event = None;
            return false;
        }
        true
    }

    /// Recompute the half-periods from period and duty. A channel that
    /// cannot toggle loses its next event.
    fn split(&mut self, base: &TickBase) -> Timing {
        let ticks = base
            .micros_to_ticks(u64::from(self.period_us))
            .min(u64::from(u32::MAX)) as u32;

        if ticks == 0 {
            self.high_ticks = 0;
            self.low_ticks = 0;
            self.next_event = None;
            return Timing::Pinned(Level::from_bool(self.duty > 0.5));
        }

        let (high, low) = split_period(ticks, self.duty);
        self.high_ticks = high;
        self.low_ticks = low;

        if high == 0 || low == 0 {
            self.next_event = None;
            Timing::Pinned(Level::from_bool(low == 0))
        } else {
            Timing::Toggling(ticks)
        }
    }

    /// Drive a constant level, only while enabled
    fn hold<S>(&mut self, level: Level, sink: &mut S)
    where
        S: OutputSink<Line = L>,
    {
        if let (true, Some(line)) = (self.enabled, self.line) {
            sink.write(line, level);
            self.level = level;
        }
    }
}

enum Timing {
    /// Period in ticks
    Toggling(u32),
    Pinned(Level),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Wires {
        levels: [Level; 8],
        writes: usize,
    }

    impl OutputSink for Wires {
        type Line = usize;

        fn resolve(&self, pin: PinId) -> Option<usize> {
            (usize::from(pin) < 8).then_some(usize::from(pin))
        }

        fn configure_output(&mut self, _line: usize) {}

        fn write(&mut self, line: usize, level: Level) {
            self.levels[line] = level;
            self.writes += 1;
        }

        fn read(&mut self, line: usize) -> Level {
            self.levels[line]
        }
    }

    // 500 ns ticks
    fn base() -> TickBase {
        TickBase::new(16_000_000, 8)
    }

    fn bound(pin: PinId) -> Channel<usize> {
        let mut channel = Channel::new(pin);
        channel.bind(usize::from(pin), true, &base());
        channel
    }

    #[test]
    fn duty_is_clamped_and_halves_sum_to_period() {
        let mut wires = Wires::default();
        let mut channel = bound(1);

        for raw in [-3.0, -0.1, 0.0, 0.3, 0.5, 0.999, 1.0, 1.5, f32::NAN, f32::INFINITY] {
            channel.set_period_and_duty(1_000, raw, Tick::ZERO, &base(), &mut wires);
            assert!((0.0..=1.0).contains(&channel.raw_duty()));
            assert_eq!(channel.high_ticks() + channel.low_ticks(), 2_000);
        }
    }

    #[test]
    fn half_periods_round_half_up() {
        let mut wires = Wires::default();
        let mut channel = bound(1);

        channel.set_period_and_duty(1_000, 0.25, Tick::ZERO, &base(), &mut wires);
        assert_eq!((channel.high_ticks(), channel.low_ticks()), (500, 1_500));

        // 6 ticks at a quarter: 1.5 rounds up to 2
        channel.set_period_and_duty(3, 0.25, Tick::ZERO, &base(), &mut wires);
        assert_eq!((channel.high_ticks(), channel.low_ticks()), (2, 4));
    }

    #[test]
    fn zero_period_pins_by_duty() {
        let mut wires = Wires::default();
        let mut channel = bound(2).with_period(0).with_duty(0.75);
        channel.enable(Tick::ZERO, &base(), &mut wires);

        assert_eq!(wires.levels[2], Level::High);
        assert_eq!(channel.next_event(), None);

        channel.set_period_and_duty(0, 0.5, Tick::ZERO, &base(), &mut wires);
        assert_eq!(wires.levels[2], Level::Low);
        assert_eq!(channel.next_event(), None);
    }

    #[test]
    fn edge_duties_pin_the_output() {
        let mut wires = Wires::default();
        let mut channel = bound(3).with_period(500);
        channel.enable(Tick::ZERO, &base(), &mut wires);
        assert_eq!(channel.next_event(), Some(Tick::ZERO));

        channel.set_period_and_duty(500, 1.0, Tick::new(10), &base(), &mut wires);
        assert_eq!(wires.levels[3], Level::High);
        assert_eq!(channel.next_event(), None);

        channel.set_period_and_duty(500, 0.0, Tick::new(20), &base(), &mut wires);
        assert_eq!(wires.levels[3], Level::Low);
        assert_eq!(channel.next_event(), None);
    }

    #[test]
    fn disabled_channel_never_writes() {
        let mut wires = Wires::default();
        let mut channel = bound(4);

        channel.set_period_and_duty(0, 1.0, Tick::ZERO, &base(), &mut wires);
        channel.set_period_and_duty(100, 0.5, Tick::ZERO, &base(), &mut wires);
        assert_eq!(wires.writes, 0);
        assert_eq!(channel.next_event(), None);
    }

    #[test]
    fn unbound_channel_does_not_enable() {
        let mut wires = Wires::default();
        let mut channel: Channel<usize> = Channel::new(5).with_period(100);

        assert_eq!(channel.enable(Tick::ZERO, &base(), &mut wires), None);
        assert!(!channel.is_enabled());
    }

    #[test]
    fn service_walks_levels_from_previous_event() {
        let mut wires = Wires::default();
        let mut channel = bound(1).with_duty(0.25);
        channel.set_period_and_duty(1_000, 0.25, Tick::ZERO, &base(), &mut wires);
        channel.enable(Tick::new(100), &base(), &mut wires);

        assert!(!channel.service(Tick::new(99), &mut wires));
        // late by 7 ticks; the high half is still measured from 100
        assert!(channel.service(Tick::new(107), &mut wires));
        assert_eq!(wires.levels[1], Level::High);
        assert_eq!(channel.next_event(), Some(Tick::new(600)));

        assert!(channel.service(Tick::new(600), &mut wires));
        assert_eq!(wires.levels[1], Level::Low);
        assert_eq!(channel.next_event(), Some(Tick::new(2_100)));
    }

    #[test]
    fn update_never_cuts_current_half() {
        let mut wires = Wires::default();
        let mut channel = bound(1);
        channel.set_period_and_duty(1_000, 0.5, Tick::ZERO, &base(), &mut wires);
        channel.enable(Tick::ZERO, &base(), &mut wires);
        channel.service(Tick::ZERO, &mut wires);
        assert_eq!(channel.next_event(), Some(Tick::new(1_000)));

        // a much shorter period only pulls the event in to now + period
        let next = channel.set_period_and_duty(100, 0.5, Tick::new(400), &base(), &mut wires);
        assert_eq!(next, Some(Tick::new(600)));
        assert_eq!(channel.level(), Level::High);

        // a longer one keeps the pending event
        let next = channel.set_period_and_duty(5_000, 0.5, Tick::new(500), &base(), &mut wires);
        assert_eq!(next, Some(Tick::new(600)));
    }

    #[test]
    fn map_and_inverse() {
        // 0..100 percent onto 0.1..0.9
        let mut channel: Channel<usize> = Channel::new(0).with_map(0.1, 0.0, 0.9, 100.0);
        channel = channel.with_duty(50.0);
        assert!((channel.raw_duty() - 0.5).abs() < 1e-6);
        assert!((channel.duty() - 50.0).abs() < 1e-3);

        let before = channel.map();
        channel.set_map(0.0, 1.0, 1.0, 1.0);
        assert_eq!(channel.map(), before);
    }
}
