//! Flips the frame about its midline: the old photograph rotates away for
//! the first half of the animation, the new one rotates in for the second.

use std::time::{Duration, Instant};

use glam::Vec3;
use rand::rngs::StdRng;
use rand::Rng;

use super::{emit_textured, pivot_rotation, ready, DrawOp, Timing};
use crate::world::PhotoFrame;

const DURATION: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipMode {
    Horizontal,
    Vertical,
}

pub struct FlipTransition {
    mode: FlipMode,
    timing: Timing,
}

impl FlipTransition {
    pub fn new() -> Self {
        Self {
            mode: FlipMode::Horizontal,
            timing: Timing::new(DURATION),
        }
    }

    pub fn select(&mut self, _frame: &PhotoFrame, rng: &mut StdRng) {
        self.mode = if rng.gen_bool(0.5) {
            FlipMode::Horizontal
        } else {
            FlipMode::Vertical
        };
        self.timing.reset();
    }

    pub fn reset(&mut self) {
        self.timing.reset();
    }

    pub fn is_running(&self) -> bool {
        self.timing.is_running()
    }

    #[cfg(test)]
    pub(crate) fn force_mode(&mut self, mode: FlipMode) {
        self.mode = mode;
    }

    pub fn apply(
        &mut self,
        src: &PhotoFrame,
        dst: Option<&PhotoFrame>,
        now: Instant,
        out: &mut Vec<DrawOp>,
    ) {
        let Some(dst) = ready(src, dst) else {
            return;
        };
        let delta = self.timing.delta(now);

        // First half shows the source folding away, second half the
        // destination folding in; the angle peaks at 90 degrees mid-way.
        let target = if delta <= 0.5 { src } else { dst };
        let angle = if delta <= 0.5 {
            delta * 90.0 / 0.5
        } else {
            90.0 - (delta - 0.5) * 90.0 / 0.5
        };

        let (cx, cy) = src.frame_quad.center();
        let (pivot, axis) = match self.mode {
            FlipMode::Horizontal => (Vec3::new(cx, 0.0, 0.0), Vec3::new(0.0, -1.0, 0.0)),
            FlipMode::Vertical => (Vec3::new(0.0, cy, 0.0), Vec3::new(-1.0, 0.0, 0.0)),
        };
        emit_textured(target, pivot_rotation(pivot, axis, angle), out);

        if delta >= 1.0 {
            self.timing.finish();
        }
    }
}
