//! Output sink tests for softpwm-core

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};
use softpwm_core::{Level, OutputSink, PinBank, PwmError, NO_PIN};

#[derive(Default)]
struct FakePin {
    high: bool,
    writes: usize,
}

impl ErrorType for FakePin {
    type Error = Infallible;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.high = false;
        self.writes += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.high = true;
        self.writes += 1;
        Ok(())
    }
}

impl StatefulOutputPin for FakePin {
    fn is_set_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.high)
    }
}

#[test]
fn test_level_helpers() {
    assert_eq!(Level::from_bool(true), Level::High);
    assert_eq!(!Level::High, Level::Low);
    assert!(Level::High.is_high());
    assert_eq!(Level::default(), Level::Low);
}

#[test]
fn test_pin_bank_resolve() {
    let bank = PinBank::new([FakePin::default(), FakePin::default(), FakePin::default()]);
    assert_eq!(bank.resolve(0), Some(0));
    assert_eq!(bank.resolve(2), Some(2));
    assert_eq!(bank.resolve(3), None);
    assert_eq!(bank.resolve(NO_PIN), None);
}

#[test]
fn test_pin_bank_write_read() {
    let mut bank = PinBank::new([FakePin::default(), FakePin::default()]);
    let line = bank.resolve(1).unwrap();

    bank.configure_output(line);
    bank.write(line, Level::High);
    assert_eq!(bank.read(line), Level::High);
    bank.write(line, Level::Low);
    assert_eq!(bank.read(line), Level::Low);

    let pins = bank.release();
    assert_eq!(pins[1].writes, 2);
    assert_eq!(pins[0].writes, 0);
}

#[test]
fn test_error_display() {
    assert_eq!(PwmError::CapacityFull.to_string(), "channel registry is full");
    assert_eq!(PwmError::NotFound.to_string(), "no channel for pin");
}
