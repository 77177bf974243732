use domino_protocol::Status;

use crate::{
    manual, DrawConfig, DrawEngine, Drivetrain, Inbox, LinkMonitor, RobotState, StatusPublisher,
    DEFAULT_PATH_CAPACITY,
};

/// Runs the robot: one [`tick`](Controller::tick) per control period.
///
/// Each tick picks up whatever the transport left in the inbox, applies it,
/// runs the draw engine, and maybe produces a status record to push.
pub struct Controller<'a, const N: usize = DEFAULT_PATH_CAPACITY> {
    inbox: &'a Inbox,
    state: RobotState,
    engine: DrawEngine<N>,
    link: LinkMonitor,
    status: StatusPublisher,
}

impl<'a, const N: usize> Controller<'a, N> {
    pub fn new(inbox: &'a Inbox, config: &DrawConfig) -> Self {
        Self {
            inbox,
            state: RobotState::default(),
            engine: DrawEngine::new(config),
            link: LinkMonitor::default(),
            status: StatusPublisher::new(config.status_interval_ms),
        }
    }

    pub fn state(&self) -> &RobotState {
        &self.state
    }

    /// For the collaborators that own the odometer and the hopper sensor.
    pub fn state_mut(&mut self) -> &mut RobotState {
        &mut self.state
    }

    pub fn engine(&self) -> &DrawEngine<N> {
        &self.engine
    }

    pub fn is_connected(&self) -> bool {
        self.inbox.is_connected()
    }

    pub fn tick(&mut self, delta_us: u32, now_ms: u64) -> Option<[u8; Status::LEN]> {
        let connected = self.inbox.is_connected();
        self.link.update(connected, &mut self.state);

        if let Some(cmd) = self.inbox.take_manual() {
            manual::apply(&cmd, &mut self.state);
        }
        while let Some(frag) = self.inbox.next_fragment() {
            self.engine.apply_fragment(&frag);
        }
        self.engine.tick(&mut self.state, delta_us);

        self.status.poll(now_ms, connected, &self.state)
    }

    /// Like [`tick`](Controller::tick), but also reads the odometer from
    /// `drive` beforehand and hands it the resulting command afterwards.
    pub fn run<D: Drivetrain>(
        &mut self,
        drive: &mut D,
        delta_us: u32,
        now_ms: u64,
    ) -> Option<[u8; Status::LEN]> {
        self.state.record_distance(drive.distance_traveled_mm());
        let status = self.tick(delta_us, now_ms);
        drive.drive(self.state.moving, self.state.direction());
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mode, TurnRate};
    use domino_protocol::{Fragments, ManualCommand, PathStep};

    fn draw_cmd(moving: bool) -> [u8; ManualCommand::LEN] {
        ManualCommand {
            moving,
            manual_mode: false,
            ..ManualCommand::default()
        }
        .encode()
    }

    fn send_path(inbox: &Inbox, steps: &[PathStep]) {
        for f in Fragments::new(steps, 4) {
            assert!(inbox.receive_fragment(&f.encode()));
        }
    }

    #[test]
    fn status_only_while_connected() {
        let inbox = Inbox::new();
        let mut ctl = Controller::<64>::new(&inbox, &DrawConfig::default());
        assert!(ctl.tick(1000, 0).is_none());
        inbox.set_connected(true);
        let status = ctl.tick(1000, 1).unwrap();
        assert_eq!(Status::decode(&status).unwrap(), ctl.state().status());
    }

    #[test]
    fn disconnect_stops_the_robot() {
        let inbox = Inbox::new();
        let mut ctl = Controller::<64>::new(&inbox, &DrawConfig::default());
        inbox.set_connected(true);
        inbox.receive_manual(&[1, 1, 1, 1, 0]);
        ctl.tick(1000, 0);
        assert!(ctl.state().moving);
        inbox.set_connected(false);
        ctl.tick(1000, 1);
        assert!(!ctl.state().moving);
    }

    #[test]
    fn path_then_draw_mode() {
        let inbox = Inbox::new();
        let mut ctl = Controller::<64>::new(&inbox, &DrawConfig::default());
        send_path(&inbox, &[PathStep::new(20, 0), PathStep::new(20, 30)]);
        inbox.receive_manual(&draw_cmd(true));
        ctl.tick(1000, 0);
        assert!(ctl.state().moving);
        assert!(ctl.engine().scheduler().is_active());

        ctl.state_mut().record_distance(20);
        ctl.tick(1000, 1);
        // 0 - 30 = -30 degrees of error, with the step ending at 40mm.
        assert_eq!(ctl.state().direction().get(), -30);

        ctl.state_mut().record_distance(40);
        ctl.tick(1000, 2);
        assert!(!ctl.state().moving);
    }

    #[test]
    fn switching_modes_hands_over_steering() {
        let inbox = Inbox::new();
        let mut ctl = Controller::<64>::new(&inbox, &DrawConfig::default());
        send_path(&inbox, &[PathStep::new(0, 0), PathStep::new(50, 60)]);
        inbox.receive_manual(&draw_cmd(true));
        ctl.tick(1000, 0);
        ctl.tick(1000, 1);
        assert_eq!(ctl.state().direction().get(), -60);

        // Back to manual: the manual turn rate wins, and the engine keeps quiet.
        inbox.receive_manual(
            &ManualCommand {
                moving: true,
                direction: 15,
                ..ManualCommand::default()
            }
            .encode(),
        );
        ctl.tick(1000, 2);
        assert_eq!(ctl.state().mode(), Mode::Manual);
        assert_eq!(ctl.state().direction(), TurnRate::saturating(15));

        // And to draw mode again: the manual value is ignored and the engine
        // publishes its own command.
        let mut cmd = ManualCommand::decode(&draw_cmd(true)).unwrap();
        cmd.direction = 70;
        inbox.receive_manual(&cmd.encode());
        ctl.tick(1000, 3);
        assert_eq!(ctl.state().direction(), ctl.engine().scheduler().command());
        assert_ne!(ctl.state().direction().get(), 70);
    }
}
