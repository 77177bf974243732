use domino_protocol::Status;
use serde::{Deserialize, Serialize};

/// A turn-rate command, as consumed by the wheels.
///
/// Zero is straight ahead. Positive values make the heading estimate
/// decrease. The value is always within `[-MAX, MAX]`.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i8", into = "i8")]
pub struct TurnRate(i8);

impl TurnRate {
    pub const MAX: i8 = 80;
    pub const ZERO: TurnRate = TurnRate(0);

    pub fn new(rate: i8) -> Option<Self> {
        (-Self::MAX..=Self::MAX)
            .contains(&rate)
            .then_some(TurnRate(rate))
    }

    pub fn saturating(rate: i8) -> Self {
        TurnRate(rate.clamp(-Self::MAX, Self::MAX))
    }

    /// Clamps to the allowed range, then truncates towards zero.
    ///
    /// NaN becomes zero.
    pub fn clamped(rate: f32) -> Self {
        let max = f32::from(Self::MAX);
        TurnRate(rate.clamp(-max, max) as i8)
    }

    pub fn get(self) -> i8 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<i8> for TurnRate {
    type Error = &'static str;

    fn try_from(rate: i8) -> Result<Self, Self::Error> {
        TurnRate::new(rate).ok_or("turn rate out of range")
    }
}

impl From<TurnRate> for i8 {
    fn from(rate: TurnRate) -> i8 {
        rate.0
    }
}

/// Who gets to steer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// The phone sends turn rates directly.
    #[default]
    Manual,
    /// The draw-path engine steers along an uploaded path.
    Draw,
}

/// Everything the robot wants and knows about its motion.
///
/// The flags are plain fields. The turn rate and the odometer are not:
/// the turn rate can only be written through a [`Steering`] handle, and
/// only the component owning the current [`Mode`] can get one. The odometer
/// only moves forward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RobotState {
    pub moving: bool,
    pub dispensing: bool,
    pub stop_on_empty: bool,
    pub is_empty: bool,
    mode: Mode,
    direction: TurnRate,
    distance_traveled_mm: u32,
}

impl Default for RobotState {
    fn default() -> Self {
        Self {
            moving: false,
            dispensing: true,
            stop_on_empty: true,
            is_empty: false,
            mode: Mode::Manual,
            direction: TurnRate::ZERO,
            distance_traveled_mm: 0,
        }
    }
}

impl RobotState {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            log::info!("switching to {mode:?} mode");
            self.mode = mode;
        }
    }

    pub fn is_draw_mode(&self) -> bool {
        self.mode == Mode::Draw
    }

    pub fn direction(&self) -> TurnRate {
        self.direction
    }

    /// Borrows the turn rate for writing, if `owner` is the active mode.
    pub fn steering(&mut self, owner: Mode) -> Option<Steering<'_>> {
        (self.mode == owner).then_some(Steering {
            direction: &mut self.direction,
        })
    }

    pub fn distance_traveled_mm(&self) -> u32 {
        self.distance_traveled_mm
    }

    /// Records a new odometer reading.
    ///
    /// Readings lower than the last one are ignored: step thresholds assume
    /// the distance never goes backwards.
    pub fn record_distance(&mut self, mm: u32) {
        if mm < self.distance_traveled_mm {
            log::warn!(
                "odometer went backwards ({} -> {mm} mm), keeping the old reading",
                self.distance_traveled_mm
            );
        } else {
            self.distance_traveled_mm = mm;
        }
    }

    pub fn advance_distance(&mut self, delta_mm: u32) {
        self.distance_traveled_mm = self.distance_traveled_mm.saturating_add(delta_mm);
    }

    pub fn status(&self) -> Status {
        Status {
            moving: self.moving,
            dispensing: self.dispensing,
            stop_on_empty: self.stop_on_empty,
            is_empty: self.is_empty,
            manual_mode: self.mode == Mode::Manual,
            direction: self.direction.get(),
            distance_traveled_mm: self.distance_traveled_mm,
        }
    }
}

/// Write access to the shared turn rate.
pub struct Steering<'a> {
    direction: &'a mut TurnRate,
}

impl<'a> Steering<'a> {
    pub fn get(&self) -> TurnRate {
        *self.direction
    }

    pub fn set(&mut self, rate: TurnRate) {
        *self.direction = rate;
    }
}
