//! Scheduler tick domain and the rounding rules that go with it
//!
//! Every conversion between microseconds, ticks and frequencies rounds half
//! up. Calibrated overhead constants on existing boards depend on that, so
//! do not swap in truncation or banker's rounding.

use core::fmt;

/// Microseconds, the unit of every user-facing period and timestamp
pub type Micros = u64;

const NANOS_PER_SEC: u64 = 1_000_000_000;
const NANOS_PER_MICRO: u64 = 1_000;
const MICROS_PER_SEC: f64 = 1_000_000.0;

/// Absolute instant on the scheduler clock, in ticks since the clock started.
///
/// The scheduler clock only moves forward; it is rebuilt from hardware
/// counter deltas and never wraps in practice (64 bits of ticks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tick(u64);

impl Tick {
    /// Clock origin
    pub const ZERO: Self = Self(0);

    /// Furthest representable instant
    pub const MAX: Self = Self(u64::MAX);

    /// Create an instant from a raw tick count
    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Get the raw tick count
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The instant `ticks` after this one, saturating at [`Tick::MAX`]
    pub const fn after(self, ticks: u64) -> Self {
        Self(self.0.saturating_add(ticks))
    }

    /// Ticks from `self` until `later`, zero if `later` already passed
    pub const fn until(self, later: Tick) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick:{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Tick {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "tick:{}", self.0);
    }
}

/// Length of one scheduler tick, fixed when the multiplexer is initialized.
///
/// A tick is one hardware counter increment at the prescaler chosen for the
/// scheduler, so it is expressed both in CPU cycles (exact) and in
/// nanoseconds (truncated, used for the microsecond conversions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickBase {
    cycles_per_tick: u32,
    ns_per_tick: u32,
}

impl TickBase {
    /// Tick base for a counter clocked at `cpu_hz / divisor`
    pub fn new(cpu_hz: u32, divisor: u32) -> Self {
        let cpu_hz = u64::from(cpu_hz.max(1));
        let divisor = divisor.max(1);
        let ns = (NANOS_PER_SEC * u64::from(divisor)) / cpu_hz;

        Self {
            cycles_per_tick: divisor,
            ns_per_tick: ns.clamp(1, u64::from(u32::MAX)) as u32,
        }
    }

    /// Pick the coarsest prescaler whose tick is still no longer than
    /// `min_resolution_ns`.
    ///
    /// `divisors` must be ordered finest first. When even the finest
    /// divisor is too coarse it is used anyway. Returns the chosen index
    /// together with the resulting tick base.
    pub fn select(cpu_hz: u32, divisors: &[u32], min_resolution_ns: u32) -> (usize, Self) {
        let mut chosen = (0, Self::new(cpu_hz, divisors.first().copied().unwrap_or(1)));

        for (index, &divisor) in divisors.iter().enumerate().skip(1) {
            let base = Self::new(cpu_hz, divisor);
            if base.ns_per_tick > min_resolution_ns {
                break;
            }
            chosen = (index, base);
        }

        chosen
    }

    /// CPU cycles per tick (the prescaler divisor)
    pub const fn cycles_per_tick(&self) -> u32 {
        self.cycles_per_tick
    }

    /// Nanoseconds per tick
    pub const fn ns_per_tick(&self) -> u32 {
        self.ns_per_tick
    }

    /// Convert a duration to ticks, rounding half up
    pub fn micros_to_ticks(&self, micros: Micros) -> u64 {
        let ns = u128::from(self.ns_per_tick);
        let ticks = (u128::from(micros) * u128::from(NANOS_PER_MICRO) + ns / 2) / ns;
        ticks.min(u128::from(u64::MAX)) as u64
    }

    /// Convert ticks to microseconds, rounding half up
    pub fn ticks_to_micros(&self, ticks: u64) -> Micros {
        let ns = u128::from(ticks) * u128::from(self.ns_per_tick);
        let micros = (ns + u128::from(NANOS_PER_MICRO / 2)) / u128::from(NANOS_PER_MICRO);
        micros.min(u128::from(u64::MAX)) as u64
    }

    /// Scheduler instant for an absolute CPU cycle count
    pub const fn tick_at(&self, cycles: u64) -> Tick {
        Tick(cycles / self.cycles_per_tick as u64)
    }

    /// Absolute CPU cycle count of a scheduler instant
    pub const fn cycles_at(&self, tick: Tick) -> u64 {
        tick.0.saturating_mul(self.cycles_per_tick as u64)
    }
}

/// Period in microseconds for a frequency in hertz.
///
/// Non-positive (and NaN) frequencies map to period 0, which switches the
/// channel off.
pub fn period_from_frequency(frequency_hz: f32) -> u32 {
    if !(frequency_hz > 0.0) {
        return 0;
    }

    let period = MICROS_PER_SEC / f64::from(frequency_hz) + 0.5;
    if period >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        period as u32
    }
}

/// Frequency in hertz for a period in microseconds; 0.0 for period 0
pub fn frequency_from_period(period_us: u32) -> f32 {
    if period_us == 0 {
        0.0
    } else {
        (MICROS_PER_SEC / f64::from(period_us)) as f32
    }
}

/// Split a period of `ticks` into `(high, low)` half-periods.
///
/// `duty` must already be clamped to `[0, 1]`. The high half is
/// `round(ticks * duty)` and the two halves always add up to `ticks`.
pub fn split_period(ticks: u32, duty: f32) -> (u32, u32) {
    let high = (f64::from(ticks) * f64::from(duty) + 0.5) as u64;
    let high = high.min(u64::from(ticks)) as u32;
    (high, ticks - high)
}
