use domino_protocol::Fragment;

use crate::{
    DrawConfig, Mode, PathBuffer, PathScheduler, RobotState, StepEvent, DEFAULT_PATH_CAPACITY,
};

/// The draw-mode half of the robot: path reassembly plus path following.
#[derive(Clone, Debug)]
pub struct DrawEngine<const N: usize = DEFAULT_PATH_CAPACITY> {
    buffer: PathBuffer<N>,
    scheduler: PathScheduler,
    path_ready: bool,
    was_drawing: bool,
}

impl<const N: usize> DrawEngine<N> {
    pub fn new(config: &DrawConfig) -> Self {
        Self {
            buffer: PathBuffer::new(),
            scheduler: PathScheduler::new(config),
            path_ready: false,
            was_drawing: false,
        }
    }

    pub fn buffer(&self) -> &PathBuffer<N> {
        &self.buffer
    }

    pub fn scheduler(&self) -> &PathScheduler {
        &self.scheduler
    }

    /// Feeds a received fragment into the path buffer.
    ///
    /// The start of a new transfer abandons whatever path we were following.
    /// Bad fragments are logged and dropped.
    pub fn apply_fragment(&mut self, frag: &Fragment) {
        match self.buffer.apply(frag) {
            Ok(ready) => {
                if frag.offset == 0 {
                    self.scheduler.cancel();
                    self.path_ready = false;
                }
                if ready {
                    self.path_ready = true;
                }
            }
            Err(e) => log::warn!("dropping fragment: {e}"),
        }
    }

    /// Runs one control tick.
    ///
    /// Leaving draw mode abandons the path being followed. A path that
    /// arrives while in manual mode waits for the switch to draw mode.
    pub fn tick(&mut self, state: &mut RobotState, delta_us: u32) {
        let drawing = state.is_draw_mode();
        if self.was_drawing && !drawing {
            self.scheduler.cancel();
        }
        self.was_drawing = drawing;

        if self.path_ready {
            self.path_ready = false;
            let steps = self.buffer.steps();
            if self.scheduler.start(steps, state.distance_traveled_mm()) {
                log::info!("set up new path: 0/{}", steps.len());
            } else {
                log::info!("received an empty path");
            }
        }

        if !drawing {
            return;
        }

        if state.moving && !self.scheduler.is_active() {
            log::warn!("draw mode can't move without a path");
            state.moving = false;
        }

        if state.moving {
            let event = self.scheduler.tick(
                self.buffer.steps(),
                state.distance_traveled_mm(),
                delta_us,
            );
            if event == StepEvent::Finished {
                state.moving = false;
            }
        }

        if self.scheduler.is_active() {
            if let Some(mut steering) = state.steering(Mode::Draw) {
                steering.set(self.scheduler.command());
            }
        }
    }
}
