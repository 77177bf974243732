//! Wire formats shared between the domino robot and its controllers.
//!
//! All records are packed little-endian structs with no padding. They are
//! small enough to fit in a single BLE write, so we encode them by hand
//! instead of going through a serde format: the byte layout is the protocol.

#![cfg_attr(not(feature = "std"), no_std)]

use serde::{Deserialize, Serialize};

mod command;
mod fragment;

pub use command::{ManualCommand, Status};
pub use fragment::{Fragment, Fragments, FragmentBytes};

/// The name the robot advertises itself under.
pub const DEVICE_NAME: &str = "HackPackDomino";

pub const SERVICE_UUID: &str = "faa94de0-cd7c-43fa-b71d-40324ff9ab2b";
pub const STATUS_UUID: &str = "b43a1a69-5dc4-4573-b47c-53e31ca661f2";
pub const MANUAL_CONTROL_UUID: &str = "874b19c2-4bfa-4453-83b4-e0d3a28317fd";
pub const DRAW_CONTROL_UUID: &str = "56d0d406-5ae9-4e66-8ff7-bd43c12e6263";

/// Maximum number of path steps a single fragment can carry.
pub const POINTS_PER_FRAGMENT: usize = 8;

/// Size of the `{offset, total_size}` header at the start of every fragment.
pub const FRAGMENT_HEADER_LEN: usize = 4;

/// Size of one encoded [`PathStep`].
pub const STEP_LEN: usize = 4;

/// The largest fragment the encoding can express.
pub const MAX_FRAGMENT_LEN: usize = FRAGMENT_HEADER_LEN + POINTS_PER_FRAGMENT * STEP_LEN;

/// The robot ignores writes shorter than this.
pub const MIN_FRAGMENT_LEN: usize = 6;

/// A default BLE connection (23 byte MTU) leaves 20 bytes for each write.
pub const BLE_WRITE_LEN: usize = 20;

/// How many points the sender puts in each fragment so that it fits in [`BLE_WRITE_LEN`].
pub const POINTS_PER_BLE_WRITE: usize = (BLE_WRITE_LEN - FRAGMENT_HEADER_LEN) / STEP_LEN;

/// One segment of a path.
///
/// `distance_mm` is incremental: it's how far to travel after this step is
/// armed before moving on to the next one. `angle` is the absolute heading,
/// in degrees, that the robot should turn to while travelling this step.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathStep {
    pub distance_mm: u16,
    pub angle: u16,
}

impl PathStep {
    pub const fn new(distance_mm: u16, angle: u16) -> Self {
        Self { distance_mm, angle }
    }

    pub fn to_bytes(self) -> [u8; STEP_LEN] {
        let d = self.distance_mm.to_le_bytes();
        let a = self.angle.to_le_bytes();
        [d[0], d[1], a[0], a[1]]
    }

    pub fn from_bytes(bytes: [u8; STEP_LEN]) -> Self {
        Self {
            distance_mm: u16::from_le_bytes([bytes[0], bytes[1]]),
            angle: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }
}

/// Serves a read of `src` starting at `offset`, as for a BLE long read.
///
/// Returns the number of bytes copied into `dst`. Reading past the end
/// copies nothing.
pub fn read_at(src: &[u8], offset: usize, dst: &mut [u8]) -> usize {
    let rest = src.get(offset..).unwrap_or(&[]);
    let len = rest.len().min(dst.len());
    dst[..len].copy_from_slice(&rest[..len]);
    len
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid length: expected {expected}, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("fragment too short: {0} bytes")]
    TooShort(usize),
    #[error("fragment carries {0} points, at most 8 fit")]
    TooManyPoints(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_reads() {
        let status = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let mut out = [0; 4];
        assert_eq!(read_at(&status, 0, &mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(read_at(&status, 8, &mut out), 2);
        assert_eq!(out[..2], [9, 10]);
        assert_eq!(read_at(&status, 10, &mut out), 0);
        assert_eq!(read_at(&status, 22, &mut out), 0);
    }
}
