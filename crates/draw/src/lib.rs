//! The draw-path engine of the domino robot.
//!
//! A path arrives from the phone in fragments, gets reassembled into a list
//! of [`PathStep`]s, and is then followed by steering the robot: every step
//! has a target heading and a distance, and we turn towards the heading until
//! the odometer says we've gone far enough to start on the next step.
//!
//! The transport (BLE) and the hardware (wheels, odometry) live elsewhere.
//! They talk to this crate through the [`Inbox`] and the [`Drivetrain`]
//! trait; everything else runs inside [`Controller::tick`], which is meant to
//! be called periodically from a single task.
//!
//! This crate supports `no_std`, and uses `libm` for the little bit of
//! floating point that the heading controller needs.

#![cfg_attr(not(feature = "std"), no_std)]

pub use domino_protocol::{Fragment, ManualCommand, PathStep, Status};

mod buffer;
mod config;
mod controller;
mod engine;
pub mod heading;
mod inbox;
mod link;
pub mod manual;
mod scheduler;
mod state;

pub use buffer::{PathBuffer, TransferError, DEFAULT_PATH_CAPACITY};
pub use config::{ConfigBuilder, DrawConfig};
pub use controller::Controller;
pub use engine::DrawEngine;
pub use heading::HeadingController;
pub use inbox::{Inbox, FRAGMENT_QUEUE_LEN};
pub use link::{LinkMonitor, StatusPublisher};
pub use scheduler::{PathScheduler, SchedulerState, StepEvent};
pub use state::{Mode, RobotState, Steering, TurnRate};

/// The hardware side of the robot: the wheels and the odometer.
pub trait Drivetrain {
    /// Total distance travelled since power-on, in millimeters.
    fn distance_traveled_mm(&mut self) -> u32;

    /// Applies the current motion command.
    fn drive(&mut self, moving: bool, direction: TurnRate);
}
