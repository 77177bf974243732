use domino_protocol::PathStep;

use crate::{DrawConfig, HeadingController, TurnRate};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// No path, or the path was abandoned.
    Idle,
    /// Following step `index`.
    Active { index: usize },
    /// Went past the last step.
    Complete,
}

/// What happened on a scheduler tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepEvent {
    /// Nothing to do: there's no active path.
    Idle,
    /// Still on the same step (and maybe turning).
    Holding,
    /// The turn towards the current step's heading just finished.
    Aligned,
    /// Moved on to step `index`.
    Advanced { index: usize },
    /// Went past the last step.
    Finished,
}

/// Walks through the steps of a path as the odometer advances.
///
/// At most one step is taken per tick, even if the odometer has jumped past
/// several thresholds at once; the following ticks catch up.
#[derive(Clone, Debug)]
pub struct PathScheduler {
    state: SchedulerState,
    next_threshold_mm: u32,
    step_elapsed_us: u32,
    heading: HeadingController,
}

impl PathScheduler {
    pub fn new(config: &DrawConfig) -> Self {
        Self {
            state: SchedulerState::Idle,
            next_threshold_mm: 0,
            step_elapsed_us: 0,
            heading: HeadingController::new(config),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SchedulerState::Active { .. })
    }

    /// The odometer reading at which the current step ends.
    pub fn next_threshold_mm(&self) -> u32 {
        self.next_threshold_mm
    }

    pub fn heading(&self) -> &HeadingController {
        &self.heading
    }

    pub fn command(&self) -> TurnRate {
        self.heading.command()
    }

    /// Starts following `steps` from the beginning.
    ///
    /// An empty path doesn't start anything; returns whether the scheduler
    /// is now active.
    pub fn start(&mut self, steps: &[PathStep], distance_now_mm: u32) -> bool {
        if steps.is_empty() {
            self.state = SchedulerState::Idle;
            return false;
        }
        self.arm(steps, 0, distance_now_mm);
        true
    }

    /// Abandons the current path, if any.
    pub fn cancel(&mut self) {
        if self.is_active() {
            log::info!("abandoning path at {:?}", self.state);
        }
        self.state = SchedulerState::Idle;
    }

    fn arm(&mut self, steps: &[PathStep], index: usize, distance_now_mm: u32) {
        let step = steps[index];
        self.next_threshold_mm = self.heading.arm(index, step, distance_now_mm);
        self.state = SchedulerState::Active { index };
        log::info!(
            "step {index}/{} after {} us: dir={}, dist={}mm, target={}, current={}",
            steps.len(),
            self.step_elapsed_us,
            self.heading.command().get(),
            step.distance_mm,
            self.heading.target_angle(),
            self.heading.current_angle(),
        );
        self.step_elapsed_us = 0;
    }

    /// Runs one tick while the robot is moving.
    pub fn tick(&mut self, steps: &[PathStep], distance_mm: u32, delta_us: u32) -> StepEvent {
        let SchedulerState::Active { index } = self.state else {
            return StepEvent::Idle;
        };
        self.step_elapsed_us = self.step_elapsed_us.saturating_add(delta_us);

        if distance_mm >= self.next_threshold_mm {
            let next = index + 1;
            if next >= steps.len() {
                log::info!("at end of path, stopping");
                self.state = SchedulerState::Complete;
                StepEvent::Finished
            } else {
                self.arm(steps, next, distance_mm);
                StepEvent::Advanced { index: next }
            }
        } else if self.heading.integrate(delta_us) {
            log::debug!("aligned after {} us", self.step_elapsed_us);
            StepEvent::Aligned
        } else {
            StepEvent::Holding
        }
    }
}
