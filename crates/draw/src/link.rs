use domino_protocol::Status;

use crate::RobotState;

/// Watches the connection flag for changes.
#[derive(Clone, Debug, Default)]
pub struct LinkMonitor {
    was_connected: bool,
}

impl LinkMonitor {
    /// Reacts to connection changes since the last call.
    ///
    /// Losing the client stops the robot.
    pub fn update(&mut self, connected: bool, state: &mut RobotState) {
        if self.was_connected && !connected {
            log::info!("client disconnected, stopping");
            state.moving = false;
        } else if connected && !self.was_connected {
            log::info!("client connected");
        }
        self.was_connected = connected;
    }
}

/// Periodically produces the status record for a connected client.
#[derive(Clone, Debug)]
pub struct StatusPublisher {
    interval_ms: u64,
    next_due_ms: u64,
}

impl StatusPublisher {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            next_due_ms: 0,
        }
    }

    pub fn poll(
        &mut self,
        now_ms: u64,
        connected: bool,
        state: &RobotState,
    ) -> Option<[u8; Status::LEN]> {
        if !connected || now_ms < self.next_due_ms {
            return None;
        }
        self.next_due_ms = now_ms.saturating_add(self.interval_ms);
        Some(state.status().encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_stops() {
        let mut link = LinkMonitor::default();
        let mut state = RobotState::default();
        link.update(true, &mut state);
        state.moving = true;
        link.update(true, &mut state);
        assert!(state.moving);
        link.update(false, &mut state);
        assert!(!state.moving);

        // Only the moment of the disconnect stops the robot.
        state.moving = true;
        link.update(false, &mut state);
        assert!(state.moving);
    }

    #[test]
    fn status_interval() {
        let mut status = StatusPublisher::new(1000);
        let state = RobotState::default();
        assert!(status.poll(5, false, &state).is_none());
        assert!(status.poll(10, true, &state).is_some());
        assert!(status.poll(500, true, &state).is_none());
        assert!(status.poll(1009, true, &state).is_none());
        assert_eq!(status.poll(1010, true, &state), Some(state.status().encode()));
    }
}
