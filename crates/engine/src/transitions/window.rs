//! Swings the old photograph open like a window shutter hinged on the far
//! frame edge, bowing the free edge outward as it accelerates.

use std::time::{Duration, Instant};

use glam::{Mat4, Vec3};
use rand::rngs::StdRng;
use rand::Rng;

use super::{emit_textured, pivot_rotation, ready, DrawOp, Timing};
use crate::world::PhotoFrame;

const DURATION: Duration = Duration::from_millis(800);

/// Fraction of the frame width the free edge bows out by at full swing.
const SCALE_AMOUNT: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// Hinged on the right frame edge, opening towards the right.
    LeftToRight,
    /// Hinged on the left frame edge, opening towards the left.
    RightToLeft,
}

pub struct WindowTransition {
    mode: WindowMode,
    timing: Timing,
    amount: f32,
}

impl WindowTransition {
    pub fn new() -> Self {
        Self {
            mode: WindowMode::LeftToRight,
            timing: Timing::new(DURATION),
            amount: 0.0,
        }
    }

    /// The hinge must sit on a vertical screen edge.
    pub fn selectable(frame: &PhotoFrame) -> bool {
        frame.frame_quad.on_left_screen_edge() || frame.frame_quad.on_right_screen_edge()
    }

    pub fn select(&mut self, frame: &PhotoFrame, rng: &mut StdRng) {
        let q = &frame.frame_quad;
        let mut modes = vec![WindowMode::LeftToRight, WindowMode::RightToLeft];
        if !q.on_left_screen_edge() {
            modes.retain(|m| *m != WindowMode::RightToLeft);
        }
        if !q.on_right_screen_edge() {
            modes.retain(|m| *m != WindowMode::LeftToRight);
        }
        // An interior frame leaves no mode; selectable() should have
        // rejected it, so either hinge serves.
        self.mode = match modes.as_slice() {
            [] => WindowMode::LeftToRight,
            modes => modes[rng.gen_range(0..modes.len())],
        };
        self.amount = q.width() * SCALE_AMOUNT / 2.0;
        self.timing.reset();
    }

    pub fn reset(&mut self) {
        self.timing.reset();
    }

    pub fn is_running(&self) -> bool {
        self.timing.is_running()
    }

    #[cfg(test)]
    pub(crate) fn force_mode(&mut self, mode: WindowMode) {
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

        emit_textured(dst, Mat4::IDENTITY, out);
        if delta < 1.0 {
            let Some(texture) = &src.texture else {
                return;
            };
            let mut vertices = src.frame_quad.0;
            // Accelerating bow on the free edge.
            let interpolation = delta * delta;
            match self.mode {
                WindowMode::LeftToRight => {
                    vertices[1] -= interpolation * self.amount;
                    vertices[5] += interpolation * self.amount;
                }
                WindowMode::RightToLeft => {
                    vertices[3] -= interpolation * self.amount;
                    vertices[7] += interpolation * self.amount;
                }
            }
            let (angle, pivot_x) = match self.mode {
                WindowMode::LeftToRight => (delta * 90.0, src.frame_quad.0[2]),
                WindowMode::RightToLeft => (delta * -90.0, src.frame_quad.0[0]),
            };
            out.push(DrawOp::Textured {
                texture: texture.id,
                vertices,
                transform: pivot_rotation(
                    Vec3::new(pivot_x, 0.0, 0.0),
                    Vec3::new(0.0, -1.0, 0.0),
                    angle,
                ),
            });
        }
        if delta >= 1.0 {
            self.timing.finish();
        }
    }
}
