//! Turning a drawn line into path steps.

use domino_protocol::PathStep;
use kurbo::{Point, Vec2};

/// Points closer than this to where the line starts are ignored: a finger
/// (or a pen) wobbles a bit before it gets going.
pub const START_RADIUS: f64 = 5.0;

/// Converts a polyline into steps.
///
/// `points` are in drawing coordinates, with y pointing down. Each step
/// goes from one point to the next after scaling by `scale` and rounding to
/// whole millimeters; moves that round to nothing are skipped. Angles are
/// measured counter-clockwise from the x axis, with y pointing up.
pub fn trace(points: &[Point], scale: f64) -> Vec<PathStep> {
    let Some(&first) = points.first() else {
        return Vec::new();
    };
    let flip = |p: Point| Point::new(p.x, -p.y);
    let start_raw = flip(first);
    let start = start_raw.to_vec2() * scale;

    let mut steps = Vec::new();
    let mut prev = Vec2::ZERO;
    let mut past_start = false;
    for &p in points {
        let p = flip(p);
        if !past_start {
            if (p - start_raw).hypot() > START_RADIUS {
                past_start = true;
            } else {
                continue;
            }
        }

        let here = p.to_vec2() * scale - start;
        let here = Vec2::new(here.x.round(), here.y.round());
        if here != prev {
            steps.push(step_between(prev, here));
        }
        prev = here;
    }
    steps
}

fn step_between(from: Vec2, to: Vec2) -> PathStep {
    let d = to - from;
    let mut angle = d.atan2();
    if angle < 0.0 {
        angle += std::f64::consts::TAU;
    }
    PathStep {
        distance_mm: d.hypot() as u16,
        angle: angle.to_degrees() as u16,
    }
}

/// Where the robot would end up after each step, if it followed them exactly.
pub fn waypoints(steps: &[PathStep]) -> Vec<Point> {
    let mut pos = Point::ZERO;
    let mut ret = vec![pos];
    for step in steps {
        let a = f64::from(step.angle).to_radians();
        pos += Vec2::new(a.cos(), a.sin()) * f64::from(step.distance_mm);
        ret.push(pos);
    }
    ret
}
