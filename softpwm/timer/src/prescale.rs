//! Prescaler selection

use crate::counter::max_count;

/// Outcome of fitting a delay onto the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prescale {
    /// Index into the counter's prescaler table
    pub index: usize,
    /// Counter ticks at that prescaler
    pub ticks: u32,
    /// The delay did not fit even at the coarsest prescaler and was cut
    /// down to the longest representable one
    pub clipped: bool,
}

/// Fit `cycles` onto a counter of `width` bits.
///
/// Walks the divisors finest first and takes the first one whose tick count
/// fits the counter, which keeps the best resolution available for the
/// delay. Delays beyond the coarsest divisor's range are clipped, not
/// refused.
pub fn select(cycles: u64, divisors: &[u32], width: u32) -> Prescale {
    let max = u64::from(max_count(width));

    for (index, &divisor) in divisors.iter().enumerate() {
        let ticks = cycles / u64::from(divisor.max(1));
        if ticks <= max {
            return Prescale {
                index,
                ticks: ticks as u32,
                clipped: false,
            };
        }
    }

    Prescale {
        index: divisors.len().saturating_sub(1),
        ticks: max as u32,
        clipped: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AVR_TIMER1_PRESCALERS;

    #[test]
    fn finest_fitting_divisor_wins() {
        let p = select(1_600, &AVR_TIMER1_PRESCALERS, 16);
        assert_eq!(p, Prescale { index: 0, ticks: 1_600, clipped: false });

        // 10 ms at 16 MHz
        let p = select(160_000, &AVR_TIMER1_PRESCALERS, 16);
        assert_eq!(p, Prescale { index: 1, ticks: 20_000, clipped: false });

        let p = select(65_535, &AVR_TIMER1_PRESCALERS, 16);
        assert_eq!(p.index, 0);
        let p = select(65_536, &AVR_TIMER1_PRESCALERS, 16);
        assert_eq!(p.index, 1);
    }

    #[test]
    fn oversized_delay_is_clipped() {
        let p = select(u64::from(u32::MAX), &AVR_TIMER1_PRESCALERS, 16);
        assert_eq!(p, Prescale { index: 4, ticks: 0xFFFF, clipped: true });
    }

    #[test]
    fn zero_delay() {
        let p = select(0, &AVR_TIMER1_PRESCALERS, 16);
        assert_eq!(p, Prescale { index: 0, ticks: 0, clipped: false });
    }
}
