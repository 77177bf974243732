use embedded_hal::digital::v2::{OutputPin, PinState};
use esp32c3_hal::gpio::{AnyPin, Output, PushPull};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

pub type AnyOutput = AnyPin<Output<PushPull>>;

/// A unipolar stepper, driven two coils at a time.
pub struct Stepper {
    phase: u8,
    pins: [AnyOutput; 4],
    /// Which way the shaft turns when the wheel rolls forward; the two
    /// wheels are mirror images of each other.
    forward: Direction,
}

impl Stepper {
    pub fn new(
        forward: Direction,
        p0: impl Into<AnyOutput>,
        p1: impl Into<AnyOutput>,
        p2: impl Into<AnyOutput>,
        p3: impl Into<AnyOutput>,
    ) -> Self {
        let pins = [p0.into(), p1.into(), p2.into(), p3.into()];
        let mut ret = Self {
            phase: 0,
            pins,
            forward,
        };
        ret.energize();
        ret
    }

    fn energize(&mut self) {
        for (idx, p) in self.pins.iter_mut().enumerate() {
            let idx = idx as u8;
            // Setting a GPIO level can't fail.
            let _ = p.set_state(PinState::from(
                idx == self.phase || idx == (self.phase + 1) % 4,
            ));
        }
    }

    /// Rolls the wheel by one step.
    pub fn step(&mut self, dir: Direction) {
        let inc = if dir == self.forward { 1 } else { 3 };
        self.phase = (self.phase + inc) % 4;
        self.energize();
    }

    /// Turns off all the coils, so the motor doesn't heat up while parked.
    pub fn release(&mut self) {
        for p in &mut self.pins {
            let _ = p.set_low();
        }
    }
}
