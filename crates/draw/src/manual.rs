//! Commands from the manual-drive screen.

use domino_protocol::ManualCommand;

use crate::{Mode, RobotState, TurnRate};

/// Applies a manual command to the robot state.
///
/// The turn rate is only taken in manual mode; in draw mode, the path
/// engine steers. The robot won't start moving with an empty hopper if it's
/// supposed to stop when empty, but it can always be stopped.
pub fn apply(cmd: &ManualCommand, state: &mut RobotState) {
    state.stop_on_empty = cmd.stop_on_empty;
    state.dispensing = cmd.dispensing;
    state.set_mode(if cmd.manual_mode {
        Mode::Manual
    } else {
        Mode::Draw
    });

    if let Some(mut steering) = state.steering(Mode::Manual) {
        steering.set(TurnRate::saturating(cmd.direction));
    }

    if cmd.moving && !state.moving {
        if !state.is_empty || !state.stop_on_empty {
            state.moving = true;
        } else {
            log::info!("hopper is empty, not starting");
        }
    } else if !cmd.moving && state.moving {
        state.moving = false;
    }
}
