//! Interrupt-level draining loop and the state it owns

use softpwm_core::{OutputSink, PinId, PwmError, PwmResult, Tick, TickBase, NO_PIN};
use softpwm_timer::{CompareCounter, TimerDriver};

use crate::channel::Channel;
use crate::config::{PwmConfig, TickTuning};
use crate::registry::Registry;

/// Timer, sink and channels of an initialized multiplexer.
///
/// [`Pwm`](crate::Pwm) keeps one of these behind a critical section; the
/// interrupt handler and the control methods each borrow it exclusively.
pub struct Scheduler<C, S: OutputSink, const N: usize> {
    pub(crate) timer: TimerDriver<C>,
    pub(crate) sink: S,
    pub(crate) registry: Registry<S::Line, N>,
    base: TickBase,
    tuning: TickTuning,
    running: bool,
}

impl<C, S, const N: usize> Scheduler<C, S, N>
where
    C: CompareCounter,
    S: OutputSink,
{
    /// Configure the timer and pick the scheduler tick.
    ///
    /// The tick is the coarsest prescaler no longer than the configured
    /// resolution. The counter stays stopped.
    pub fn new(counter: C, sink: S, config: &PwmConfig) -> Self {
        let (_, base) = TickBase::select(
            config.timer.cpu_hz,
            counter.prescalers(),
            config.timing.min_resolution_ns,
        );
        let tuning = TickTuning::new(&config.timing, &base);

        let mut timer = TimerDriver::new(counter, config.timer);
        timer.configure(None, config.micros_source);

        Self {
            timer,
            sink,
            registry: Registry::new(config.max_channels),
            base,
            tuning,
            running: false,
        }
    }

    pub fn base(&self) -> &TickBase {
        &self.base
    }

    pub fn tuning(&self) -> &TickTuning {
        &self.tuning
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current scheduler instant
    pub fn clock(&mut self) -> Tick {
        self.base.tick_at(self.timer.now_cycles())
    }

    /// Armed wakeup on the scheduler clock
    pub fn armed(&self) -> Option<Tick> {
        self.timer
            .armed_deadline()
            .map(|cycles| self.base.tick_at(cycles))
    }

    /// Compare-match entry point. Spurious matches and matches while
    /// stopped do nothing.
    pub fn on_interrupt(&mut self) {
        if self.timer.on_compare_match() && self.running {
            self.service();
        }
    }

    /// Toggle every due channel, then arm the next wakeup.
    ///
    /// Passes repeat while the next deadline is closer than the minimum gap,
    /// so bunched edges are handled in one interrupt. The loop gives up once
    /// the execution budget is spent, or when a pass changed nothing and
    /// the clock stood still.
    pub fn service(&mut self) {
        let start = self.clock();
        let deadline = start.after(self.tuning.max_duration);
        let mut now = start;
        let mut next_wake;

        loop {
            let previous = now;
            now = self.clock();
            next_wake = now.after(self.tuning.max_horizon);

            let mut toggled = false;
            for channel in self.registry.iter_mut() {
                if !channel.is_enabled() {
                    continue;
                }
                toggled |= channel.service(now, &mut self.sink);
                if let Some(next) = channel.next_event() {
                    next_wake = next_wake.min(next);
                }
            }

            if now.after(self.tuning.min_gap) <= next_wake
                || now >= deadline
                || (!toggled && now == previous)
            {
                break;
            }
        }

        let now = self.clock();
        let target = next_wake.max(now.after(self.tuning.min_lead));
        self.timer.arm_once_at_cycles(self.base.cycles_at(target));
    }

    /// Resume the counter, re-base every enabled channel to at most one
    /// period from now, and arm the earliest event.
    pub fn start(&mut self) {
        self.timer.start();
        self.running = true;

        let now = self.clock();
        for channel in self.registry.iter_mut() {
            channel.reset_phase(now);
        }
        self.rearm();
    }

    /// Arm the earliest next event over all channels, or the horizon when
    /// nothing is scheduled. Only while running.
    fn rearm(&mut self) {
        if !self.running {
            return;
        }
        let now = self.clock();
        let target = self
            .registry
            .iter()
            .filter_map(Channel::next_event)
            .fold(now.after(self.tuning.max_horizon), Tick::min);
        self.timer.arm_once_at_cycles(self.base.cycles_at(target));
    }

    /// Pause the counter; channels keep their state
    pub fn stop(&mut self) {
        self.running = false;
        self.timer.disarm();
        self.timer.stop();
    }

    /// Pull the timer in to `next` if that is sooner than what is armed
    fn arm_at_most(&mut self, next: Option<Tick>) {
        if let (true, Some(next)) = (self.running, next) {
            self.timer.arm_at_most_at_cycles(self.base.cycles_at(next));
        }
    }

    /// Register an externally built channel
    pub fn register(&mut self, mut channel: Channel<S::Line>) -> PwmResult<usize> {
        let line = self.admit(channel.pin())?;
        channel.bind(line, false, &self.base);
        self.registry.register(channel)
    }

    /// Register a registry-owned channel for `pin`
    pub fn register_pin(&mut self, pin: PinId) -> PwmResult<usize> {
        let line = self.admit(pin)?;
        let mut channel = Channel::new(pin);
        channel.bind(line, true, &self.base);
        self.registry.register(channel)
    }

    /// Disable and remove the channel at `index`. External channels are
    /// handed back.
    pub fn remove_at(&mut self, index: usize) -> PwmResult<Option<Channel<S::Line>>> {
        let mut channel = self.registry.remove(index)?;
        channel.disable(&mut self.sink);
        self.rearm();
        Ok((!channel.is_owned()).then_some(channel))
    }

    pub fn remove_pin(&mut self, pin: PinId) -> PwmResult<Option<Channel<S::Line>>> {
        let index = self.registry.position(pin).ok_or(PwmError::NotFound)?;
        self.remove_at(index)
    }

    pub fn set_period_and_duty(&mut self, pin: PinId, period_us: u32, raw_duty: f32) -> PwmResult<()> {
        let now = self.clock();
        let channel = self.registry.find_mut(pin).ok_or(PwmError::NotFound)?;
        let scheduled = channel.next_event().is_some();
        let next = channel.set_period_and_duty(period_us, raw_duty, now, &self.base, &mut self.sink);
        match next {
            // pinned or idle now: the armed wakeup may belong to this channel
            None if scheduled => self.rearm(),
            _ => self.arm_at_most(next),
        }
        Ok(())
    }

    pub fn set_period(&mut self, pin: PinId, period_us: u32) -> PwmResult<()> {
        let duty = self.channel(pin)?.duty();
        self.set_period_and_duty(pin, period_us, duty)
    }

    pub fn set_duty(&mut self, pin: PinId, raw_duty: f32) -> PwmResult<()> {
        let period = self.channel(pin)?.period();
        self.set_period_and_duty(pin, period, raw_duty)
    }

    pub fn set_map(
        &mut self,
        pin: PinId,
        duty_a: f32,
        mapped_a: f32,
        duty_b: f32,
        mapped_b: f32,
    ) -> PwmResult<()> {
        let channel = self.registry.find_mut(pin).ok_or(PwmError::NotFound)?;
        channel.set_map(duty_a, mapped_a, duty_b, mapped_b);
        Ok(())
    }

    pub fn enable(&mut self, pin: PinId) -> PwmResult<()> {
        let now = self.clock();
        let channel = self.registry.find_mut(pin).ok_or(PwmError::NotFound)?;
        let next = channel.enable(now, &self.base, &mut self.sink);
        self.arm_at_most(next);
        Ok(())
    }

    pub fn disable(&mut self, pin: PinId) -> PwmResult<()> {
        let channel = self.registry.find_mut(pin).ok_or(PwmError::NotFound)?;
        channel.disable(&mut self.sink);
        self.rearm();
        Ok(())
    }

    pub fn enable_all(&mut self) {
        let now = self.clock();
        let mut earliest: Option<Tick> = None;
        for channel in self.registry.iter_mut() {
            if let Some(next) = channel.enable(now, &self.base, &mut self.sink) {
                earliest = Some(earliest.map_or(next, |e| e.min(next)));
            }
        }
        self.arm_at_most(earliest);
    }

    pub fn disable_all(&mut self) {
        for channel in self.registry.iter_mut() {
            channel.disable(&mut self.sink);
        }
        self.rearm();
    }

    /// Disable every channel, stop the timer and hand the peripherals back
    pub fn release(mut self) -> (C, S) {
        self.disable_all();
        self.stop();
        (self.timer.release(), self.sink)
    }

    pub fn channel(&self, pin: PinId) -> PwmResult<&Channel<S::Line>> {
        self.registry.find(pin).ok_or(PwmError::NotFound)
    }

    /// Check a pin for registration and resolve its line
    fn admit(&self, pin: PinId) -> PwmResult<S::Line> {
        if self.registry.position(pin).is_some() {
            return Err(PwmError::DuplicatePin);
        }
        if self.registry.is_full() {
            return Err(PwmError::CapacityFull);
        }
        if pin == NO_PIN {
            return Err(PwmError::InvalidPin);
        }
        self.sink.resolve(pin).ok_or(PwmError::InvalidPin)
    }
}
