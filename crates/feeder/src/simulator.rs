use std::path::Path;

use domino_draw::{
    Controller, DrawConfig, Drivetrain, Inbox, SchedulerState, TurnRate, FRAGMENT_QUEUE_LEN,
};
use domino_protocol::{Fragments, ManualCommand, PathStep, Status, POINTS_PER_BLE_WRITE};
use kurbo::{Point, Rect, Vec2};
use svg::{
    node::element::{path::Data, Circle, Path as SvgPath},
    Document,
};

use crate::{connection::DominoLike, trace};

/// Length of one simulated control tick.
pub const TICK_US: u32 = 10_000;

/// Wheels on a perfectly flat floor.
///
/// They turn at exactly the rate the heading controller assumes, so the
/// simulated track shows what the path following does on its own, without
/// any motor error.
pub struct Wheels {
    speed_mm_per_s: f64,
    degrees_per_us: f64,
    position: Point,
    heading: f64,
    traveled_mm: f64,
    moving: bool,
    direction: TurnRate,
    track: Vec<Point>,
}

impl Wheels {
    pub fn new(speed_mm_per_s: f64, config: &DrawConfig) -> Self {
        Self {
            speed_mm_per_s,
            degrees_per_us: config.degrees_per_us as f64,
            position: Point::ZERO,
            heading: 0.0,
            traveled_mm: 0.0,
            moving: false,
            direction: TurnRate::ZERO,
            track: vec![Point::ZERO],
        }
    }

    /// Moves the wheels according to the last command.
    pub fn advance(&mut self, delta_us: u32) {
        if !self.moving {
            return;
        }
        self.heading -= self.degrees_per_us * delta_us as f64 * self.direction.get() as f64;
        let dist = self.speed_mm_per_s * delta_us as f64 / 1e6;
        self.position += Vec2::from_angle(self.heading.to_radians()) * dist;
        self.traveled_mm += dist;
        self.track.push(self.position);
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn track(&self) -> &[Point] {
        &self.track
    }
}

impl Drivetrain for Wheels {
    fn distance_traveled_mm(&mut self) -> u32 {
        self.traveled_mm as u32
    }

    fn drive(&mut self, moving: bool, direction: TurnRate) {
        self.moving = moving;
        self.direction = direction;
    }
}

/// Runs the robot's controller against [`Wheels`].
pub struct Simulator<'a> {
    inbox: &'a Inbox,
    controller: Controller<'a>,
    wheels: Wheels,
    now_us: u64,
    sent: Vec<PathStep>,
}

impl<'a> Simulator<'a> {
    pub fn new(inbox: &'a Inbox, config: &DrawConfig, speed_mm_per_s: f64) -> Self {
        inbox.set_connected(true);
        Self {
            inbox,
            controller: Controller::new(inbox, config),
            wheels: Wheels::new(speed_mm_per_s, config),
            now_us: 0,
            sent: Vec::new(),
        }
    }

    pub fn wheels(&self) -> &Wheels {
        &self.wheels
    }

    pub fn controller(&self) -> &Controller<'a> {
        &self.controller
    }

    fn step(&mut self) {
        self.controller
            .run(&mut self.wheels, TICK_US, self.now_us / 1000);
        self.wheels.advance(TICK_US);
        self.now_us += u64::from(TICK_US);
    }

    /// Runs until the path is finished, or until `max_secs` of simulated time.
    ///
    /// Returns true if the path was finished.
    pub fn run(&mut self, max_secs: f64) -> bool {
        let max_ticks = (max_secs * 1e6 / TICK_US as f64) as u64;
        for _ in 0..max_ticks {
            self.step();
            if self.controller.engine().scheduler().state() == SchedulerState::Complete
                && !self.controller.state().moving
            {
                return true;
            }
        }
        false
    }

    /// Draws the path we sent next to the track the wheels actually took.
    pub fn illustrate(&self, out: &Path) -> anyhow::Result<()> {
        // SVG's y axis points down.
        let flip = |p: &Point| Point::new(p.x, -p.y);
        let intended: Vec<Point> = trace::waypoints(&self.sent).iter().map(flip).collect();
        let track: Vec<Point> = self.wheels.track().iter().map(flip).collect();

        let bbox = intended
            .iter()
            .chain(&track)
            .fold(Rect::from_points(Point::ZERO, Point::ZERO), |r, p| {
                r.union_pt(*p)
            })
            .inflate(20.0, 20.0);

        let mut document =
            Document::new().set("viewBox", (bbox.x0, bbox.y0, bbox.width(), bbox.height()));
        document = document.add(polyline(&intended, "blue"));
        document = document.add(polyline(&track, "black"));
        for p in &intended {
            document = document.add(
                Circle::new()
                    .set("cx", p.x)
                    .set("cy", p.y)
                    .set("r", 2.0)
                    .set("fill", "blue"),
            );
        }
        svg::save(out, &document)?;
        Ok(())
    }
}

fn polyline(points: &[Point], color: &str) -> SvgPath {
    let mut data = Data::new();
    if let Some((first, rest)) = points.split_first() {
        data = data.move_to((first.x, first.y));
        for p in rest {
            data = data.line_to((p.x, p.y));
        }
    }
    SvgPath::new()
        .set("fill", "none")
        .set("stroke", color)
        .set("stroke-width", 1)
        .set("d", data)
}

impl DominoLike for Simulator<'_> {
    async fn read_status(&mut self) -> anyhow::Result<Status> {
        Ok(self.controller.state().status())
    }

    async fn send_manual(&mut self, cmd: ManualCommand) -> anyhow::Result<()> {
        if !self.inbox.receive_manual(&cmd.encode()) {
            anyhow::bail!("manual command was rejected");
        }
        self.step();
        Ok(())
    }

    async fn send_path(&mut self, steps: &[PathStep]) -> anyhow::Result<()> {
        let frags: Vec<_> = Fragments::new(steps, POINTS_PER_BLE_WRITE).collect();
        // The robot only queues a few fragments between ticks.
        for chunk in frags.chunks(FRAGMENT_QUEUE_LEN) {
            for frag in chunk {
                if !self.inbox.receive_fragment(&frag.encode()) {
                    anyhow::bail!("fragment at offset {} was rejected", frag.offset);
                }
            }
            self.step();
        }
        // We assume the robot was put down facing along the first step.
        if let Some(first) = steps.first() {
            self.wheels.heading = f64::from(first.angle);
        }
        self.sent = steps.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_drawing() -> ManualCommand {
        ManualCommand {
            moving: true,
            manual_mode: false,
            ..ManualCommand::default()
        }
    }

    async fn simulate(steps: &[PathStep]) -> (bool, Point, u32) {
        let config = DrawConfig::default();
        let inbox = Inbox::from_config(&config);
        let mut sim = Simulator::new(&inbox, &config, 100.0);
        sim.send_path(steps).await.unwrap();
        sim.send_manual(start_drawing()).await.unwrap();
        let finished = sim.run(120.0);
        let pos = sim.wheels().position();
        let dist = sim.controller().state().distance_traveled_mm();
        (finished, pos, dist)
    }

    #[tokio::test]
    async fn straight_line() {
        let steps = [
            PathStep::new(100, 0),
            PathStep::new(100, 0),
            PathStep::new(100, 0),
        ];
        let (finished, pos, dist) = simulate(&steps).await;
        assert!(finished);
        assert_eq!(dist, 300);
        assert!((pos.x - 300.0).abs() < 1e-6, "{pos:?}");
        assert!(pos.y.abs() < 1e-6, "{pos:?}");
    }

    #[tokio::test]
    async fn turns_left() {
        let steps = [PathStep::new(0, 0), PathStep::new(200, 90)];
        let (finished, pos, _) = simulate(&steps).await;
        assert!(finished);
        // Turning 90 degrees takes longer than driving 200mm, so this ends mid-turn.
        assert!(pos.x > 0.0, "{pos:?}");
        assert!(pos.y > 0.0, "{pos:?}");
    }

    #[tokio::test]
    async fn does_not_move_in_manual_mode() {
        let config = DrawConfig::default();
        let inbox = Inbox::from_config(&config);
        let mut sim = Simulator::new(&inbox, &config, 100.0);
        sim.send_path(&[PathStep::new(0, 0), PathStep::new(50, 0)])
            .await
            .unwrap();
        assert!(!sim.run(1.0));
        assert_eq!(sim.wheels().position(), Point::ZERO);
    }

    #[tokio::test]
    async fn illustrates() {
        let config = DrawConfig::default();
        let inbox = Inbox::from_config(&config);
        let mut sim = Simulator::new(&inbox, &config, 100.0);
        sim.send_path(&[PathStep::new(0, 0), PathStep::new(50, 0)])
            .await
            .unwrap();
        sim.send_manual(start_drawing()).await.unwrap();
        assert!(sim.run(10.0));

        let out = std::env::temp_dir().join("domino-feeder-illustrates.svg");
        sim.illustrate(&out).unwrap();
        let svg = std::fs::read_to_string(&out).unwrap();
        assert!(svg.contains("stroke=\"blue\""));
        assert!(svg.contains("stroke=\"black\""));
    }
}
