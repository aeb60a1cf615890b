//! Control API handle shared between the main line and the interrupt

use core::cell::RefCell;
use critical_section::Mutex;

use softpwm_core::{period_from_frequency, Level, OutputSink, PinId, PwmError, PwmResult};
use softpwm_timer::CompareCounter;

use crate::channel::Channel;
use crate::config::PwmConfig;
use crate::scheduler::Scheduler;

/// Software PWM multiplexer.
///
/// Holds up to `N` channels on one compare counter `C`, driving pins
/// through `S`. The handle starts out uninitialized, so it can live in a
/// `static` and be reached from both `main` and the timer interrupt:
///
/// ```ignore
/// static PWM: Pwm<Timer1, Pins, 8> = Pwm::new();
///
/// #[interrupt]
/// fn TIMER1_COMPA() {
///     PWM.on_interrupt();
/// }
/// ```
///
/// Every method runs inside a critical section. Mutations that cannot
/// apply return an error and change nothing; getters return zero values
/// for unknown pins.
pub struct Pwm<C, S: OutputSink, const N: usize> {
    state: Mutex<RefCell<Option<Scheduler<C, S, N>>>>,
}

impl<C, S, const N: usize> Pwm<C, S, N>
where
    C: CompareCounter,
    S: OutputSink,
{
    /// Uninitialized handle with zero capacity
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(None)),
        }
    }

    /// Take the counter and the pins and get ready to run.
    ///
    /// The capacity is `min(config.max_channels, N)`. The counter stays
    /// stopped until [`start`](Self::start). An already initialized handle
    /// is freed first and its peripherals are returned.
    pub fn initialize(&self, counter: C, sink: S, config: PwmConfig) -> Option<(C, S)> {
        if config.max_channels > N {
            log::warn!(
                "requested {} channels, storage holds {}",
                config.max_channels,
                N
            );
        }

        let scheduler = Scheduler::new(counter, sink, &config);
        log::debug!(
            "pwm initialized: capacity {}, tick {} ns",
            scheduler.registry.capacity(),
            scheduler.base().ns_per_tick()
        );

        let previous = critical_section::with(|cs| self.state.borrow_ref_mut(cs).replace(scheduler));
        previous.map(Scheduler::release)
    }

    /// Disable every channel, stop the counter and return the peripherals.
    /// The handle goes back to zero capacity.
    pub fn free(&self) -> Option<(C, S)> {
        let released = critical_section::with(|cs| self.state.borrow_ref_mut(cs).take())
            .map(Scheduler::release);
        if released.is_some() {
            log::debug!("pwm freed");
        }
        released
    }

    pub fn is_initialized(&self) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).is_some())
    }

    /// Resume the counter and reschedule every enabled channel
    pub fn start(&self) -> PwmResult<()> {
        self.apply(|s| {
            s.start();
            Ok(())
        })?;
        log::debug!("pwm started");
        Ok(())
    }

    /// Pause the counter; outputs hold their current level
    pub fn stop(&self) -> PwmResult<()> {
        self.apply(|s| {
            s.stop();
            Ok(())
        })?;
        log::debug!("pwm stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.read(|s| s.is_running()).unwrap_or(false)
    }

    /// Compare-match interrupt handler body
    pub fn on_interrupt(&self) {
        critical_section::with(|cs| {
            if let Some(scheduler) = self.state.borrow_ref_mut(cs).as_mut() {
                scheduler.on_interrupt();
            }
        });
    }

    /// Register a caller-built channel. It is handed back by
    /// [`remove_pin`](Self::remove_pin).
    pub fn register(&self, channel: Channel<S::Line>) -> PwmResult<usize> {
        let pin = channel.pin();
        let result = self.apply(|s| s.register(channel));
        Self::log_registration(pin, &result);
        result
    }

    /// Register a channel for `pin`, allocated and owned by the registry
    pub fn register_pin(&self, pin: PinId) -> PwmResult<usize> {
        let result = self.apply(|s| s.register_pin(pin));
        Self::log_registration(pin, &result);
        result
    }

    /// Disable and unregister the channel on `pin`. Returns the channel if
    /// it was registered with [`register`](Self::register).
    pub fn remove_pin(&self, pin: PinId) -> PwmResult<Option<Channel<S::Line>>> {
        let removed = self.apply(|s| s.remove_pin(pin))?;
        log::debug!("pin {} removed", pin);
        Ok(removed)
    }

    /// [`remove_pin`](Self::remove_pin) by registry index
    pub fn remove_at(&self, index: usize) -> PwmResult<Option<Channel<S::Line>>> {
        let removed = self.apply(|s| s.remove_at(index))?;
        log::debug!("channel {} removed", index);
        Ok(removed)
    }

    /// Set period (µs) and duty together; period 0 holds a constant level
    pub fn set_period_and_duty(&self, pin: PinId, period_us: u32, duty: f32) -> PwmResult<()> {
        log::trace!("pin {}: period {} us, duty {}", pin, period_us, duty);
        self.apply(|s| s.set_period_and_duty(pin, period_us, duty))
    }

    pub fn set_period(&self, pin: PinId, period_us: u32) -> PwmResult<()> {
        log::trace!("pin {}: period {} us", pin, period_us);
        self.apply(|s| s.set_period(pin, period_us))
    }

    pub fn set_duty(&self, pin: PinId, duty: f32) -> PwmResult<()> {
        log::trace!("pin {}: duty {}", pin, duty);
        self.apply(|s| s.set_duty(pin, duty))
    }

    /// Set the frequency in hertz; zero or negative switches the channel off
    pub fn set_frequency(&self, pin: PinId, frequency_hz: f32) -> PwmResult<()> {
        self.set_period(pin, period_from_frequency(frequency_hz))
    }

    pub fn set_frequency_and_duty(&self, pin: PinId, frequency_hz: f32, duty: f32) -> PwmResult<()> {
        self.set_period_and_duty(pin, period_from_frequency(frequency_hz), duty)
    }

    /// Install the affine duty map through `(mapped_a, duty_a)` and
    /// `(mapped_b, duty_b)`. Ignored when `mapped_a == mapped_b`.
    pub fn set_map(
        &self,
        pin: PinId,
        duty_a: f32,
        mapped_a: f32,
        duty_b: f32,
        mapped_b: f32,
    ) -> PwmResult<()> {
        self.apply(|s| s.set_map(pin, duty_a, mapped_a, duty_b, mapped_b))
    }

    pub fn enable_pin(&self, pin: PinId) -> PwmResult<()> {
        self.apply(|s| s.enable(pin))
    }

    /// Force the pin low and stop toggling it
    pub fn disable_pin(&self, pin: PinId) -> PwmResult<()> {
        self.apply(|s| s.disable(pin))
    }

    pub fn enable_all(&self) -> PwmResult<()> {
        self.apply(|s| {
            s.enable_all();
            Ok(())
        })
    }

    pub fn disable_all(&self) -> PwmResult<()> {
        self.apply(|s| {
            s.disable_all();
            Ok(())
        })
    }

    /// Period in microseconds, 0 if unknown
    pub fn period(&self, pin: PinId) -> u32 {
        self.with_channel(pin, Channel::period).unwrap_or(0)
    }

    /// Duty as last set, through the inverse map; 0.0 if unknown
    pub fn duty(&self, pin: PinId) -> f32 {
        self.with_channel(pin, Channel::duty).unwrap_or(0.0)
    }

    /// Stored duty in `[0, 1]`; 0.0 if unknown
    pub fn raw_duty(&self, pin: PinId) -> f32 {
        self.with_channel(pin, Channel::raw_duty).unwrap_or(0.0)
    }

    /// Frequency in hertz, 0.0 if off or unknown
    pub fn frequency(&self, pin: PinId) -> f32 {
        self.with_channel(pin, Channel::frequency).unwrap_or(0.0)
    }

    /// Next toggle in microseconds on the scheduler clock. `None` when the
    /// channel is off, pinned, disabled or unknown.
    pub fn next_event(&self, pin: PinId) -> Option<u64> {
        self.read(|s| {
            let next = s.registry.find(pin)?.next_event()?;
            Some(s.base().ticks_to_micros(next.raw()))
        })
        .flatten()
    }

    /// Armed timer wakeup in microseconds on the scheduler clock
    pub fn armed_wakeup(&self) -> Option<u64> {
        self.read(|s| s.armed().map(|tick| s.base().ticks_to_micros(tick.raw())))
            .flatten()
    }

    /// Level read back from the sink; `Low` if unknown
    pub fn level(&self, pin: PinId) -> Level {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let scheduler = state.as_mut()?;
            let line = scheduler.registry.find(pin)?.line()?;
            Some(scheduler.sink.read(line))
        })
        .unwrap_or(Level::Low)
    }

    /// Registry capacity, 0 before initialization
    pub fn capacity(&self) -> usize {
        self.read(|s| s.registry.capacity()).unwrap_or(0)
    }

    /// Number of registered channels
    pub fn len(&self) -> usize {
        self.read(|s| s.registry.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pin of the channel at `index`
    pub fn pin_at(&self, index: usize) -> Option<PinId> {
        self.read(|s| s.registry.get(index).map(Channel::pin)).flatten()
    }

    /// Registry index of `pin`
    pub fn index_of(&self, pin: PinId) -> Option<usize> {
        self.read(|s| s.registry.position(pin)).flatten()
    }

    /// Microseconds from the configured source or the timer clock
    pub fn micros(&self) -> u64 {
        critical_section::with(|cs| {
            self.state
                .borrow_ref_mut(cs)
                .as_mut()
                .map(|s| s.timer.now())
        })
        .unwrap_or(0)
    }

    /// Run `f` on the channel for `pin`.
    ///
    /// `f` runs inside the critical section and must not call back into
    /// this handle.
    pub fn with_channel<R>(&self, pin: PinId, f: impl FnOnce(&Channel<S::Line>) -> R) -> Option<R> {
        self.read(|s| s.registry.find(pin).map(f)).flatten()
    }

    fn apply<R>(&self, f: impl FnOnce(&mut Scheduler<C, S, N>) -> PwmResult<R>) -> PwmResult<R> {
        critical_section::with(|cs| match self.state.borrow_ref_mut(cs).as_mut() {
            Some(scheduler) => f(scheduler),
            None => Err(PwmError::NotInitialized),
        })
    }

    fn read<R>(&self, f: impl FnOnce(&Scheduler<C, S, N>) -> R) -> Option<R> {
        critical_section::with(|cs| self.state.borrow_ref(cs).as_ref().map(f))
    }

    fn log_registration(pin: PinId, result: &PwmResult<usize>) {
        match result {
            Ok(index) => log::debug!("pin {} registered at {}", pin, index),
            Err(err) => log::warn!("pin {} not registered: {}", pin, err),
        }
    }
}

impl<C, S, const N: usize> Default for Pwm<C, S, N>
where
    C: CompareCounter,
    S: OutputSink,
{
    fn default() -> Self {
        Self::new()
    }
}
