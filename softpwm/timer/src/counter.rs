//! Register-level counter abstraction

/// Clock divisors of the AVR TIMER1 family (clk/1 .. clk/1024)
pub const AVR_TIMER1_PRESCALERS: [u32; 5] = [1, 8, 64, 256, 1024];

/// A free-running up-counter with one compare-match interrupt and a
/// selectable clock prescaler.
///
/// This is the only piece a platform has to provide. Everything above it
/// (clock folding, prescaler choice, one-shot and periodic arming) lives in
/// [`TimerDriver`](crate::TimerDriver).
pub trait CompareCounter {
    /// Counter width in bits
    fn width(&self) -> u32;

    /// Selectable clock divisors, finest first
    fn prescalers(&self) -> &'static [u32];

    /// Current counter value
    fn count(&self) -> u32;

    /// Program the compare register
    fn set_compare(&mut self, target: u32);

    /// Clock the counter from prescaler `index`; counting resumes from the
    /// current value
    fn start(&mut self, index: usize);

    /// Disconnect the clock source; the counter value is kept
    fn stop(&mut self);

    /// Enable or disable the compare-match interrupt
    fn set_match_interrupt(&mut self, enabled: bool);

    /// Clear a pending compare-match flag
    fn clear_match(&mut self);
}

/// Largest value a counter of `width` bits can hold
pub const fn max_count(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_count_by_width() {
        assert_eq!(max_count(8), 0xFF);
        assert_eq!(max_count(16), 0xFFFF);
        assert_eq!(max_count(24), 0x00FF_FFFF);
        assert_eq!(max_count(32), u32::MAX);
    }
}
