//! Slides the old photograph off the screen edge it sits on, revealing the
//! new one underneath.

use std::time::{Duration, Instant};

use glam::{Mat4, Vec3};
use rand::rngs::StdRng;
use rand::Rng;

use super::{emit_textured, ready, DrawOp, Timing};
use crate::world::PhotoFrame;

const DURATION: Duration = Duration::from_millis(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateMode {
    LeftToRight,
    RightToLeft,
    UpToDown,
    DownToUp,
}

pub struct TranslateTransition {
    mode: TranslateMode,
    timing: Timing,
}

impl TranslateTransition {
    pub fn new() -> Self {
        Self {
            mode: TranslateMode::LeftToRight,
            timing: Timing::new(DURATION),
        }
    }

    /// Needs at least one frame edge on the screen boundary to slide past.
    pub fn selectable(frame: &PhotoFrame) -> bool {
        let q = &frame.frame_quad;
        q.on_left_screen_edge()
            || q.on_right_screen_edge()
            || q.on_top_screen_edge()
            || q.on_bottom_screen_edge()
    }

    pub fn select(&mut self, frame: &PhotoFrame, rng: &mut StdRng) {
        let q = &frame.frame_quad;
        let mut modes = vec![
            TranslateMode::LeftToRight,
            TranslateMode::RightToLeft,
            TranslateMode::UpToDown,
            TranslateMode::DownToUp,
        ];
        if !q.on_left_screen_edge() {
            modes.retain(|m| *m != TranslateMode::RightToLeft);
        }
        if !q.on_right_screen_edge() {
            modes.retain(|m| *m != TranslateMode::LeftToRight);
        }
        if !q.on_top_screen_edge() {
            modes.retain(|m| *m != TranslateMode::DownToUp);
        }
        if !q.on_bottom_screen_edge() {
            modes.retain(|m| *m != TranslateMode::UpToDown);
        }
        // An interior frame leaves no mode; selectable() should have
        // rejected it, so any direction serves.
        self.mode = match modes.as_slice() {
            [] => TranslateMode::LeftToRight,
            modes => modes[rng.gen_range(0..modes.len())],
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
    pub(crate) fn mode(&self) -> TranslateMode {
        self.mode
    }

    #[cfg(test)]
    pub(crate) fn force_mode(&mut self, mode: TranslateMode) {
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

        // Destination underneath, source sliding over it.
        emit_textured(dst, Mat4::IDENTITY, out);
        if delta < 1.0 {
            let horizontal = matches!(
                self.mode,
                TranslateMode::LeftToRight | TranslateMode::RightToLeft
            );
            let mut distance = if horizontal {
                src.frame_quad.width()
            } else {
                src.frame_quad.height()
            };
            if matches!(self.mode, TranslateMode::RightToLeft | TranslateMode::DownToUp) {
                distance = -distance;
            }
            distance *= delta;
            let translation = if horizontal {
                Vec3::new(distance, 0.0, 0.0)
            } else {
                Vec3::new(0.0, distance, 0.0)
            };
            emit_textured(src, Mat4::from_translation(translation), out);
        }
        if delta >= 1.0 {
            self.timing.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::frame_with_texture;
    use crate::geometry::Quad;
    use rand::SeedableRng;

    #[test]
    fn restricted_to_edges_the_frame_touches() {
        // Frame on the right screen edge only.
        let frame = frame_with_texture(1, Quad([0.0, -0.5, 1.0, -0.5, 0.0, 0.5, 1.0, 0.5]));
        let mut rng = StdRng::seed_from_u64(0);
        let mut transition = TranslateTransition::new();
        for _ in 0..16 {
            transition.select(&frame, &mut rng);
            assert_eq!(transition.mode(), TranslateMode::LeftToRight);
        }
        assert!(TranslateTransition::selectable(&frame));

        // Interior frame: no usable edge.
        let interior = frame_with_texture(2, Quad([-0.5, -0.5, 0.5, -0.5, -0.5, 0.5, 0.5, 0.5]));
        assert!(!TranslateTransition::selectable(&interior));
    }

    #[test]
    fn source_slides_by_frame_width() {
        let quad = Quad([0.0, -0.5, 1.0, -0.5, 0.0, 0.5, 1.0, 0.5]);
        let src = frame_with_texture(1, quad);
        let dst = frame_with_texture(2, quad);
        let mut transition = TranslateTransition::new();
        let mut rng = StdRng::seed_from_u64(0);
        transition.select(&src, &mut rng);
        transition.force_mode(TranslateMode::LeftToRight);

        let t0 = Instant::now();
        let mut ops = Vec::new();
        transition.apply(&src, Some(&dst), t0, &mut ops);
        transition.apply(
            &src,
            Some(&dst),
            t0 + Duration::from_millis(300),
            &mut ops,
        );

        // Second apply: dst at identity, src shifted by half the frame width.
        let DrawOp::Textured { transform, .. } = &ops[3] else {
            panic!("expected textured source op");
        };
        let expected = Mat4::from_translation(Vec3::new(quad.width() * 0.5, 0.0, 0.0));
        assert!(transform.abs_diff_eq(expected, 1e-4));
        assert!(transition.is_running());
    }

    #[test]
    fn finishes_at_full_delta() {
        let quad = Quad::FULL_SCREEN;
        let src = frame_with_texture(1, quad);
        let dst = frame_with_texture(2, quad);
        let mut transition = TranslateTransition::new();
        let mut rng = StdRng::seed_from_u64(0);
        transition.select(&src, &mut rng);

        let t0 = Instant::now();
        let mut ops = Vec::new();
        transition.apply(&src, Some(&dst), t0, &mut ops);
        ops.clear();
        transition.apply(&src, Some(&dst), t0 + Duration::from_secs(1), &mut ops);
        // Only the destination remains.
        assert_eq!(ops.len(), 1);
        assert!(!transition.is_running());
    }

    #[test]
    fn reselect_after_reset_restarts_the_clock() {
        let quad = Quad::FULL_SCREEN;
        let src = frame_with_texture(1, quad);
        let dst = frame_with_texture(2, quad);
        let mut transition = TranslateTransition::new();
        let mut rng = StdRng::seed_from_u64(0);
        transition.select(&src, &mut rng);

        // Run the first animation to completion.
        let t0 = Instant::now();
        let mut ops = Vec::new();
        transition.apply(&src, Some(&dst), t0, &mut ops);
        transition.apply(&src, Some(&dst), t0 + Duration::from_secs(1), &mut ops);
        assert!(!transition.is_running());

        transition.reset();
        transition.select(&src, &mut rng);
        assert!(transition.is_running());

        // The first apply after reuse stamps a fresh start: delta 0, so the
        // source has not moved yet.
        let t1 = t0 + Duration::from_secs(5);
        ops.clear();
        transition.apply(&src, Some(&dst), t1, &mut ops);
        assert_eq!(ops.len(), 2);
        let DrawOp::Textured { transform, .. } = &ops[1] else {
            panic!("expected textured source op");
        };
        assert!(transform.abs_diff_eq(Mat4::IDENTITY, 1e-6));
        assert!(transition.is_running());
    }

    #[test]
    fn interior_frame_select_defaults_without_panicking() {
        let interior = frame_with_texture(1, Quad([-0.5, -0.5, 0.5, -0.5, -0.5, 0.5, 0.5, 0.5]));
        let mut transition = TranslateTransition::new();
        let mut rng = StdRng::seed_from_u64(0);
        transition.select(&interior, &mut rng);
        assert_eq!(transition.mode(), TranslateMode::LeftToRight);
    }

    #[test]
    fn missing_texture_is_a_no_op() {
        let quad = Quad::FULL_SCREEN;
        let src = frame_with_texture(1, quad);
        let mut bare = frame_with_texture(2, quad);
        bare.texture = None;
        let mut transition = TranslateTransition::new();
        let mut ops = Vec::new();
        transition.apply(&src, Some(&bare), Instant::now(), &mut ops);
        transition.apply(&src, None, Instant::now(), &mut ops);
        assert!(ops.is_empty());
        assert!(transition.is_running());
    }
}
