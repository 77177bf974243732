use serde::{Deserialize, Serialize};

use crate::DecodeError;

/// A direct command from the manual-drive screen.
///
/// Also carries the mode switch: `manual_mode == false` hands the heading
/// over to the draw-path engine, in which case `direction` is ignored.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualCommand {
    pub moving: bool,
    pub dispensing: bool,
    pub stop_on_empty: bool,
    pub manual_mode: bool,
    pub direction: i8,
}

impl Default for ManualCommand {
    fn default() -> Self {
        Self {
            moving: false,
            dispensing: true,
            stop_on_empty: true,
            manual_mode: true,
            direction: 0,
        }
    }
}

impl ManualCommand {
    pub const LEN: usize = 5;

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let bytes: &[u8; Self::LEN] = bytes.try_into().map_err(|_| DecodeError::Length {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(ManualCommand {
            moving: bytes[0] != 0,
            dispensing: bytes[1] != 0,
            stop_on_empty: bytes[2] != 0,
            manual_mode: bytes[3] != 0,
            direction: bytes[4] as i8,
        })
    }

    pub fn encode(&self) -> [u8; Self::LEN] {
        [
            self.moving.into(),
            self.dispensing.into(),
            self.stop_on_empty.into(),
            self.manual_mode.into(),
            self.direction as u8,
        ]
    }
}

/// The robot's state, as pushed to the connected client.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub moving: bool,
    pub dispensing: bool,
    pub stop_on_empty: bool,
    pub is_empty: bool,
    pub manual_mode: bool,
    pub direction: i8,
    pub distance_traveled_mm: u32,
}

impl Status {
    pub const LEN: usize = 10;

    pub fn encode(&self) -> [u8; Self::LEN] {
        let d = self.distance_traveled_mm.to_le_bytes();
        [
            self.moving.into(),
            self.dispensing.into(),
            self.stop_on_empty.into(),
            self.is_empty.into(),
            self.manual_mode.into(),
            self.direction as u8,
            d[0],
            d[1],
            d[2],
            d[3],
        ]
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let bytes: &[u8; Self::LEN] = bytes.try_into().map_err(|_| DecodeError::Length {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Status {
            moving: bytes[0] != 0,
            dispensing: bytes[1] != 0,
            stop_on_empty: bytes[2] != 0,
            is_empty: bytes[3] != 0,
            manual_mode: bytes[4] != 0,
            direction: bytes[5] as i8,
            distance_traveled_mm: u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
        })
    }
}
