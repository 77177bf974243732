use domino_draw::{DrawConfig, Drivetrain, TurnRate};

use crate::stepper::{Direction, Stepper};

// 28BYJ-48 with the 64:1 gearbox, driven in full steps.
const STEPS_PER_REV: f32 = 2048.0;
const WHEEL_DIAMETER_MM: f32 = 60.0;
const MM_PER_STEP: f32 = WHEEL_DIAMETER_MM * core::f32::consts::PI / STEPS_PER_REV;
// Distance between the two wheels' contact points.
const TRACK_MM: f32 = 120.0;

/// Driving speed when going straight.
const CRUISE_STEPS_PER_SEC: f32 = 200.0;
/// The motors stall above this.
const MAX_STEPS_PER_SEC: f32 = 400.0;

/// A differential drive on two steppers.
///
/// The turn rate is converted to a difference in wheel speeds using the same
/// calibration as the heading controller, so that the robot turns the way
/// the controller thinks it does.
pub struct Wheels {
    left: Stepper,
    right: Stepper,
    degrees_per_us: f32,
    // In steps per microsecond.
    left_rate: f32,
    right_rate: f32,
    left_pending: f32,
    right_pending: f32,
    total_steps: u64,
    parked: bool,
}

impl Wheels {
    pub fn new(left: Stepper, right: Stepper, config: &DrawConfig) -> Self {
        Self {
            left,
            right,
            degrees_per_us: config.degrees_per_us,
            left_rate: 0.0,
            right_rate: 0.0,
            left_pending: 0.0,
            right_pending: 0.0,
            total_steps: 0,
            parked: true,
        }
    }

    /// Steps the motors for `delta_us` worth of motion.
    ///
    /// This should be called often enough that neither wheel needs more than
    /// a step or two per call.
    pub fn run(&mut self, delta_us: u32) {
        self.left_pending += self.left_rate * delta_us as f32;
        while self.left_pending >= 1.0 {
            self.left.step(Direction::Forward);
            self.left_pending -= 1.0;
            self.total_steps += 1;
        }
        self.right_pending += self.right_rate * delta_us as f32;
        while self.right_pending >= 1.0 {
            self.right.step(Direction::Forward);
            self.right_pending -= 1.0;
            self.total_steps += 1;
        }
    }

    fn park(&mut self) {
        if !self.parked {
            self.left.release();
            self.right.release();
            self.parked = true;
        }
        self.left_rate = 0.0;
        self.right_rate = 0.0;
    }
}

impl Drivetrain for Wheels {
    fn distance_traveled_mm(&mut self) -> u32 {
        // The center of the robot moves by the average of the two wheels.
        (self.total_steps as f32 / 2.0 * MM_PER_STEP) as u32
    }

    fn drive(&mut self, moving: bool, direction: TurnRate) {
        if !moving {
            self.park();
            return;
        }
        self.parked = false;

        // A positive turn rate turns clockwise, so the left wheel speeds up.
        let degrees_per_sec = self.degrees_per_us * 1e6 * f32::from(direction.get());
        let diff_mm_per_sec = degrees_per_sec.to_radians() * TRACK_MM / 2.0;
        let diff = diff_mm_per_sec / MM_PER_STEP;

        let left = (CRUISE_STEPS_PER_SEC + diff).clamp(0.0, MAX_STEPS_PER_SEC);
        let right = (CRUISE_STEPS_PER_SEC - diff).clamp(0.0, MAX_STEPS_PER_SEC);
        self.left_rate = left / 1e6;
        self.right_rate = right / 1e6;
    }
}
