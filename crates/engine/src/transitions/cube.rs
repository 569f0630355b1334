//! Rotates the frame like a cube face: the old photograph collapses towards
//! one vertical edge while the new one unfolds from the other, both bowing
//! at the midpoint of the turn.

use std::time::{Duration, Instant};

use glam::{Mat4, Vec3};
use rand::rngs::StdRng;
use rand::Rng;

use super::{emit_textured, pivot_rotation, ready, DrawOp, Timing};
use crate::texture::TextureId;
use crate::world::PhotoFrame;

const DURATION: Duration = Duration::from_millis(1000);

/// Fraction of the frame width the horizontal edges bow by mid-turn.
const SCALE_AMOUNT: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CubeMode {
    LeftToRight,
    RightToLeft,
}

pub struct CubeTransition {
    mode: CubeMode,
    timing: Timing,
    amount: f32,
}

impl CubeTransition {
    pub fn new() -> Self {
        Self {
            mode: CubeMode::LeftToRight,
            timing: Timing::new(DURATION),
            amount: 0.0,
        }
    }

    pub fn select(&mut self, frame: &PhotoFrame, rng: &mut StdRng) {
        self.mode = if rng.gen_bool(0.5) {
            CubeMode::LeftToRight
        } else {
            CubeMode::RightToLeft
        };
        self.amount = frame.frame_quad.width() * SCALE_AMOUNT / 2.0;
        self.timing.reset();
    }

    pub fn reset(&mut self) {
        self.timing.reset();
    }

    pub fn is_running(&self) -> bool {
        self.timing.is_running()
    }

    #[cfg(test)]
    pub(crate) fn force_mode(&mut self, mode: CubeMode) {
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

        if delta < 1.0 {
            // Both faces are carved out of the source frame's quad.
            let (Some(src_texture), Some(dst_texture)) = (&src.texture, &dst.texture) else {
                return;
            };
            let bow = if delta > 0.5 { 1.0 - delta } else { delta } * self.amount;
            let base = src.frame_quad.0;
            let width = (base[6] - base[4]).abs();

            // Destination face unfolding in.
            let mut vertices = base;
            let (angle, pivot_x) = match self.mode {
                CubeMode::LeftToRight => {
                    vertices[1] -= bow;
                    vertices[5] += bow;
                    vertices[4] += width * (1.0 - delta);
                    vertices[0] = vertices[4];
                    (90.0 - delta * 90.0, vertices[2])
                }
                CubeMode::RightToLeft => {
                    vertices[3] -= bow;
                    vertices[7] += bow;
                    vertices[6] -= width * (1.0 - delta);
                    vertices[2] = vertices[6];
                    (-90.0 + delta * 90.0, vertices[0])
                }
            };
            push_face(dst_texture.id, vertices, pivot_x, angle, out);

            // Source face collapsing onto the opposite edge.
            let mut vertices = base;
            let (angle, pivot_x) = match self.mode {
                CubeMode::RightToLeft => {
                    vertices[1] -= bow;
                    vertices[5] += bow;
                    vertices[4] += width * delta;
                    vertices[0] = vertices[4];
                    (delta * 90.0, vertices[2])
                }
                CubeMode::LeftToRight => {
                    vertices[3] -= bow;
                    vertices[7] += bow;
                    vertices[6] -= width * delta;
                    vertices[2] = vertices[6];
                    (delta * -90.0, vertices[0])
                }
            };
            push_face(src_texture.id, vertices, pivot_x, angle, out);
        } else {
            emit_textured(dst, Mat4::IDENTITY, out);
            self.timing.finish();
        }
    }
}

fn push_face(texture: TextureId, vertices: [f32; 8], pivot_x: f32, angle: f32, out: &mut Vec<DrawOp>) {
    out.push(DrawOp::Textured {
        texture,
        vertices,
        transform: pivot_rotation(
            Vec3::new(pivot_x, 0.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            angle,
        ),
    });
}
