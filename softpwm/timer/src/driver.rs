//! One-shot and periodic arming on top of a [`CompareCounter`]

use crate::config::TimerConfig;
use crate::counter::{max_count, CompareCounter};
use crate::prescale;

const MICROS_PER_SEC: u128 = 1_000_000;

/// Invoked after every armed compare match, from interrupt context
pub type FireCallback = fn();

/// External monotonic microsecond clock
pub type MicrosSource = fn() -> u64;

/// What the compare register is currently programmed for.
///
/// All instants are absolute CPU cycles on the driver clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmState {
    /// Nothing armed; compare matches are ignored
    Idle,
    /// Fires once, then falls back to `Idle`
    Once { deadline: u64 },
    /// Fires every `interval` cycles; `next` is the upcoming match
    Periodic { interval: u64, next: u64 },
}

impl ArmState {
    /// The next instant this state fires at, if any
    pub const fn deadline(&self) -> Option<u64> {
        match *self {
            ArmState::Idle => None,
            ArmState::Once { deadline } => Some(deadline),
            ArmState::Periodic { next, .. } => Some(next),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ArmState {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            ArmState::Idle => defmt::write!(fmt, "Idle"),
            ArmState::Once { deadline } => defmt::write!(fmt, "Once({})", deadline),
            ArmState::Periodic { interval, next } => {
                defmt::write!(fmt, "Periodic({}, next {})", interval, next)
            }
        }
    }
}

/// Compare-match timer with a monotonic cycle clock.
///
/// The driver rebuilds a 64-bit CPU-cycle clock from the counter by folding
/// `(count - last) * divisor` on every access, so switching prescalers
/// between arms keeps the clock monotonic. The counter has to be sampled at
/// least once per wrap for that to hold; an armed driver always is.
pub struct TimerDriver<C> {
    counter: C,
    config: TimerConfig,
    prescaler: usize,
    running: bool,
    last_count: u32,
    cycles: u64,
    compare: u32,
    reload: u32,
    state: ArmState,
    on_fire: Option<FireCallback>,
    micros_source: Option<MicrosSource>,
}

impl<C: CompareCounter> TimerDriver<C> {
    /// Wrap a counter. Nothing is written to it until [`configure`](Self::configure).
    pub fn new(counter: C, config: TimerConfig) -> Self {
        let last_count = counter.count();
        Self {
            counter,
            config,
            prescaler: 0,
            running: false,
            last_count,
            cycles: 0,
            compare: 0,
            reload: 0,
            state: ArmState::Idle,
            on_fire: None,
            micros_source: None,
        }
    }

    /// Bind the fire callback and the optional external clock.
    ///
    /// The counter clock stays disconnected until the first arm or
    /// [`start`](Self::start).
    pub fn configure(&mut self, on_fire: Option<FireCallback>, micros_source: Option<MicrosSource>) {
        self.sync();
        self.counter.stop();
        self.running = false;
        self.on_fire = on_fire;
        self.micros_source = micros_source;
        self.state = ArmState::Idle;
        self.counter.clear_match();
        self.counter.set_match_interrupt(true);
        log::debug!("timer configured at {} Hz", self.config.cpu_hz);
    }

    /// Connect the counter clock at the current prescaler
    pub fn start(&mut self) {
        if !self.running {
            self.sync();
            self.counter.start(self.prescaler);
            self.running = true;
        }
    }

    /// Disconnect the counter clock; count, clock and arm state are kept
    pub fn stop(&mut self) {
        if self.running {
            self.sync();
            self.counter.stop();
            self.running = false;
        }
    }

    /// Whether the counter is clocked
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Driver clock in CPU cycles
    pub fn now_cycles(&mut self) -> u64 {
        self.sync()
    }

    /// Microseconds from the external source, or the driver clock
    pub fn now(&mut self) -> u64 {
        match self.micros_source {
            Some(source) => source(),
            None => {
                let cycles = self.sync();
                self.cycles_to_micros(cycles)
            }
        }
    }

    pub fn cycles_to_micros(&self, cycles: u64) -> u64 {
        let hz = u128::from(self.config.cpu_hz.max(1));
        let micros = (u128::from(cycles) * MICROS_PER_SEC + hz / 2) / hz;
        micros.min(u128::from(u64::MAX)) as u64
    }

    pub fn micros_to_cycles(&self, micros: u64) -> u64 {
        let hz = u128::from(self.config.cpu_hz);
        let cycles = (u128::from(micros) * hz + MICROS_PER_SEC / 2) / MICROS_PER_SEC;
        cycles.min(u128::from(u64::MAX)) as u64
    }

    /// Fire once at the absolute driver time `micros`
    pub fn arm_once_at(&mut self, micros: u64) {
        let deadline = self.micros_to_cycles(micros);
        if self.arm_once_at_cycles(deadline) {
            log::warn!("one-shot at {} us beyond counter range, clipped", micros);
        }
    }

    /// Fire once `micros` from now
    pub fn arm_once_after(&mut self, micros: u64) {
        let delay = self.micros_to_cycles(micros);
        let now = self.sync();
        let (ticks, clipped) = self.program(delay, self.config.tune.one_shot);
        let deadline = if clipped {
            now.saturating_add(self.ticks_to_cycles(ticks))
        } else {
            now.saturating_add(delay)
        };
        self.state = ArmState::Once { deadline };
        if clipped {
            log::warn!("one-shot delay of {} us beyond counter range, clipped", micros);
        }
    }

    /// Fire every `micros`, starting one interval from now.
    ///
    /// The periodic tune shortens the first interval only; later ones
    /// reload the compare register by the untuned interval.
    pub fn arm_periodic(&mut self, micros: u64) {
        let interval_cycles = self.micros_to_cycles(micros);
        let now = self.sync();

        let fit = prescale::select(interval_cycles, self.counter.prescalers(), self.counter.width());
        let divisor = self.divisor_at(fit.index);
        let reload = fit.ticks.max(self.floor());
        let first = interval_cycles.saturating_sub(u64::from(self.config.tune.periodic)) / divisor;
        let first = (first.min(u64::from(reload)) as u32).max(self.floor());

        self.switch_prescaler(fit.index);
        self.load_compare(first);
        self.reload = reload;

        let interval = u64::from(reload) * divisor;
        self.state = ArmState::Periodic {
            interval,
            next: now.saturating_add(interval),
        };
        if fit.clipped {
            log::warn!("period of {} us beyond counter range, clipped", micros);
        }
    }

    /// Fire at `micros` or earlier.
    ///
    /// Keeps a one-shot that already fires no later than `micros`. A
    /// periodic arm is replaced by a one-shot unconditionally.
    pub fn arm_at_most_at(&mut self, micros: u64) {
        let deadline = self.micros_to_cycles(micros);
        self.arm_at_most_at_cycles(deadline);
    }

    /// [`arm_once_at`](Self::arm_once_at) on the cycle clock. Returns
    /// whether the deadline had to be clipped to the counter range.
    pub fn arm_once_at_cycles(&mut self, deadline: u64) -> bool {
        let now = self.sync();
        let (ticks, clipped) = self.program(deadline.saturating_sub(now), 0);
        let deadline = if clipped {
            now.saturating_add(self.ticks_to_cycles(ticks))
        } else {
            deadline
        };
        self.state = ArmState::Once { deadline };
        clipped
    }

    /// [`arm_at_most_at`](Self::arm_at_most_at) on the cycle clock. Returns
    /// whether the timer was reprogrammed.
    pub fn arm_at_most_at_cycles(&mut self, deadline: u64) -> bool {
        match self.state {
            ArmState::Once { deadline: armed } if armed <= deadline => false,
            _ => {
                self.arm_once_at_cycles(deadline);
                true
            }
        }
    }

    /// Drop whatever is armed; the clock keeps running
    pub fn disarm(&mut self) {
        self.counter.set_match_interrupt(false);
        self.counter.clear_match();
        self.state = ArmState::Idle;
    }

    /// Acknowledge a compare match. Call from the interrupt handler.
    ///
    /// Returns `true` when the match belonged to an armed state (and the
    /// fire callback ran), `false` for a spurious one.
    pub fn on_compare_match(&mut self) -> bool {
        self.counter.clear_match();
        self.sync();

        match self.state {
            ArmState::Idle => return false,
            ArmState::Once { .. } => {
                self.counter.set_match_interrupt(false);
                self.state = ArmState::Idle;
            }
            ArmState::Periodic { interval, next } => {
                let mask = max_count(self.counter.width());
                self.compare = self.compare.wrapping_add(self.reload) & mask;
                self.counter.set_compare(self.compare);
                self.state = ArmState::Periodic {
                    interval,
                    next: next.saturating_add(interval),
                };
            }
        }

        if let Some(callback) = self.on_fire {
            callback();
        }
        true
    }

    /// Armed deadline in CPU cycles
    pub fn armed_deadline(&self) -> Option<u64> {
        self.state.deadline()
    }

    pub fn state(&self) -> ArmState {
        self.state
    }

    /// Index of the active prescaler
    pub fn prescaler(&self) -> usize {
        self.prescaler
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn counter(&self) -> &C {
        &self.counter
    }

    pub fn counter_mut(&mut self) -> &mut C {
        &mut self.counter
    }

    /// Stop the counter and give it back
    pub fn release(mut self) -> C {
        self.disarm();
        self.stop();
        self.counter
    }

    fn sync(&mut self) -> u64 {
        let count = self.counter.count();
        let mask = max_count(self.counter.width());
        let delta = count.wrapping_sub(self.last_count) & mask;
        self.last_count = count;
        let divisor = self.divisor_at(self.prescaler);
        self.cycles = self.cycles.saturating_add(u64::from(delta) * divisor);
        self.cycles
    }

    /// Program a one-shot `delay` cycles out, less `tune`. The caller has
    /// just synced. Returns the ticks programmed and whether they were
    /// clipped.
    fn program(&mut self, delay: u64, tune: u32) -> (u32, bool) {
        let tuned = delay.saturating_sub(u64::from(tune));
        let fit = prescale::select(tuned, self.counter.prescalers(), self.counter.width());
        let ticks = fit.ticks.max(self.floor());

        self.switch_prescaler(fit.index);
        self.load_compare(ticks);
        (ticks, fit.clipped)
    }

    fn switch_prescaler(&mut self, index: usize) {
        if !self.running || index != self.prescaler {
            self.counter.start(index);
            self.prescaler = index;
            self.running = true;
        }
    }

    fn load_compare(&mut self, ticks: u32) {
        let mask = max_count(self.counter.width());
        self.compare = self.last_count.wrapping_add(ticks) & mask;
        self.counter.set_compare(self.compare);
        self.counter.clear_match();
        self.counter.set_match_interrupt(true);
    }

    fn floor(&self) -> u32 {
        self.config
            .min_arm_ticks
            .clamp(1, max_count(self.counter.width()))
    }

    fn divisor_at(&self, index: usize) -> u64 {
        u64::from(
            self.counter
                .prescalers()
                .get(index)
                .copied()
                .unwrap_or(1)
                .max(1),
        )
    }

    fn ticks_to_cycles(&self, ticks: u32) -> u64 {
        u64::from(ticks) * self.divisor_at(self.prescaler)
    }
}
