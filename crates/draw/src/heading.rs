//! Turning towards each step's heading.
//!
//! There's no compass on the robot, so the heading is dead-reckoned: we
//! assume the robot starts out facing along the first step, and then
//! integrate the turn rate over time. The turn ends when the error stops
//! shrinking.

use domino_protocol::PathStep;

use crate::{DrawConfig, TurnRate};

/// Wraps a heading difference into `[-180, 180]`.
///
/// Differences between two headings in `[0, 360)` only need one correction
/// of 360 degrees. Anything larger is reduced first.
pub fn normalize_angle_diff(diff: f32) -> f32 {
    let diff = diff % 360.0;
    if diff > 180.0 {
        diff - 360.0
    } else if diff < -180.0 {
        diff + 360.0
    } else {
        diff
    }
}

/// How much harder to turn when the next step threshold is close.
///
/// Short segments don't leave much time to turn, so we turn faster.
pub fn proximity_gain(threshold_mm: u32, config: &DrawConfig) -> f32 {
    if threshold_mm < config.sharp_turn_below_mm {
        config.sharp_turn_gain
    } else if threshold_mm < config.short_turn_below_mm {
        config.short_turn_gain
    } else {
        1.0
    }
}

/// Have we arrived at the target heading?
///
/// We only know the error magnitude, not which side of the target we're on,
/// so we say we've arrived as soon as the error grows instead of shrinking.
/// This reacts one tick late, and it can't tell overshooting from an error
/// that shrinks to almost nothing and then opens up again over two ticks.
pub fn detect_arrival(current_diff: f32, last_diff: f32) -> bool {
    current_diff > last_diff
}

#[derive(Clone, Debug)]
pub struct HeadingController {
    current_angle: f32,
    target_angle: f32,
    last_diff: f32,
    command: TurnRate,
    config: DrawConfig,
}

impl HeadingController {
    pub fn new(config: &DrawConfig) -> Self {
        Self {
            current_angle: 0.0,
            target_angle: 0.0,
            last_diff: 0.0,
            command: TurnRate::ZERO,
            config: *config,
        }
    }

    /// Arms step `index` and returns the odometer reading at which the
    /// step is finished.
    ///
    /// On the first step we assume that we're already facing the right way.
    pub fn arm(&mut self, index: usize, step: PathStep, distance_now_mm: u32) -> u32 {
        let threshold = distance_now_mm.saturating_add(u32::from(step.distance_mm));
        self.target_angle = f32::from(step.angle);

        if index == 0 {
            self.current_angle = self.target_angle;
            self.command = TurnRate::ZERO;
        } else {
            let diff = normalize_angle_diff(self.current_angle - self.target_angle);
            let scaled = diff * proximity_gain(threshold, &self.config);
            self.command = TurnRate::clamped(scaled);
            self.last_diff = libm::fabsf(self.target_angle - self.current_angle);
        }
        threshold
    }

    /// Advances the heading estimate by `delta_us` of turning.
    ///
    /// Returns true if the turn finished on this tick.
    pub fn integrate(&mut self, delta_us: u32) -> bool {
        if self.command.is_zero() {
            return false;
        }

        self.current_angle -=
            self.config.degrees_per_us * delta_us as f32 * f32::from(self.command.get());

        let diff = libm::fabsf(self.target_angle - self.current_angle);
        if detect_arrival(diff, self.last_diff) {
            log::info!(
                "reached heading {} (target {})",
                self.current_angle,
                self.target_angle
            );
            self.current_angle = self.target_angle;
            self.command = TurnRate::ZERO;
            true
        } else {
            self.last_diff = diff;
            false
        }
    }

    /// The turn rate the controller wants.
    pub fn command(&self) -> TurnRate {
        self.command
    }

    pub fn current_angle(&self) -> f32 {
        self.current_angle
    }

    pub fn target_angle(&self) -> f32 {
        self.target_angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn armed_at(angle: u16) -> HeadingController {
        let mut h = HeadingController::new(&DrawConfig::default());
        h.arm(0, PathStep::new(0, angle), 0);
        h
    }

    #[test]
    fn first_step_does_not_turn() {
        let mut h = armed_at(10);
        h.arm(1, PathStep::new(50, 70), 0);
        assert!(!h.command().is_zero());

        let threshold = h.arm(0, PathStep::new(20, 270), 100);
        assert_eq!(threshold, 120);
        assert!(h.command().is_zero());
        assert_eq!(h.current_angle(), 270.0);
    }

    #[test]
    fn normalization_picks_the_short_way() {
        assert_eq!(normalize_angle_diff(350.0), -10.0);
        assert_eq!(normalize_angle_diff(-350.0), 10.0);
        assert_eq!(normalize_angle_diff(180.0), 180.0);
        assert_eq!(normalize_angle_diff(-90.0), -90.0);
    }

    #[test]
    fn proximity_scaling() {
        let config = DrawConfig::default();
        assert_eq!(proximity_gain(4, &config), 3.0);
        assert_eq!(proximity_gain(7, &config), 2.0);
        assert_eq!(proximity_gain(20, &config), 1.0);

        // 20 degrees of error at each distance.
        for (distance, expected) in [(4, 60), (7, 40), (20, 20)] {
            let mut h = armed_at(100);
            h.arm(1, PathStep::new(distance, 80), 0);
            assert_eq!(h.command().get(), expected);
        }
    }

    #[test]
    fn command_is_clamped() {
        let mut h = armed_at(0);
        h.arm(1, PathStep::new(4, 90), 0);
        assert_eq!(h.command().get(), -80);
        h.arm(2, PathStep::new(100, 270), 0);
        assert_eq!(h.command().get(), 80);
    }

    #[test]
    fn turn_stops_after_overshoot() {
        let mut h = armed_at(90);
        h.arm(1, PathStep::new(100, 180), 0);
        assert_eq!(h.command().get(), -80);

        // 80 units for 100ms is 1.6 degrees.
        let mut ticks = 0;
        while !h.integrate(100_000) {
            ticks += 1;
            assert!(h.current_angle() <= 181.6);
            assert!(ticks < 100);
        }
        // 90 / 1.6 = 56.25, so the 57th tick overshoots and ends the turn.
        assert_eq!(ticks, 56);
        assert_eq!(h.current_angle(), 180.0);
        assert!(h.command().is_zero());
        assert!(!h.integrate(100_000));
    }

    #[test]
    fn angles_past_a_full_turn_are_kept() {
        let mut h = armed_at(0);
        h.arm(1, PathStep::new(100, 370), 0);
        assert_eq!(h.target_angle(), 370.0);
        assert_eq!(h.command().get(), -10);

        let mut ticks = 0;
        while !h.integrate(1_000_000) {
            ticks += 1;
            assert!(ticks < 1000);
        }
        assert_eq!(h.current_angle(), 370.0);

        // 370 and 10 are the same heading.
        h.arm(2, PathStep::new(100, 10), 0);
        assert!(h.command().is_zero());
    }

    #[test]
    fn arrival_rule() {
        assert!(detect_arrival(2.0, 1.0));
        assert!(!detect_arrival(1.0, 1.0));
        assert!(!detect_arrival(0.5, 1.0));
    }

    proptest! {
        #[test]
        fn normalized_diff_in_range(a in 0u16..=u16::MAX, b in 0u16..=u16::MAX) {
            let d = normalize_angle_diff(f32::from(a) - f32::from(b));
            prop_assert!((-180.0..=180.0).contains(&d));
        }

        #[test]
        fn armed_command_in_range(from in 0u16..360, to in 0u16..=u16::MAX, dist in 0u16..=u16::MAX) {
            let mut h = armed_at(from);
            h.arm(1, PathStep::new(dist, to), 0);
            let c = h.command().get();
            prop_assert!((-80..=80).contains(&c));
        }
    }
}
