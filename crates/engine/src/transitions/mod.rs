//! The transition engine. Each variant animates a photo frame from its
//! current photograph to a destination photograph; the math lives here as
//! pure functions over time, emitting [`DrawOp`]s for the GPU layer instead
//! of touching the device. That keeps every formula unit-testable and every
//! GPU call on the render thread.
//!
//! State machine per transition: Unselected -> Selected (`select` picks the
//! variant's sub-mode for the frame) -> Animating (the first `apply` stamps
//! the start time; progress is `clamp(elapsed / duration, 0, 1)`) ->
//! Finished (`is_running` turns false at progress 1). `reset` rewinds to
//! Unselected for pool reuse.

use std::time::{Duration, Instant};

use glam::{Mat4, Vec3};
use rand::rngs::StdRng;
use tileconfig::{Color, TransitionType};

use crate::texture::TextureId;
use crate::world::PhotoFrame;

mod cube;
mod flip;
mod translate;
mod window;

pub use cube::CubeTransition;
pub use flip::FlipTransition;
pub use translate::TranslateTransition;
pub use window::WindowTransition;

/// A transition stuck longer than this is forcibly deselected.
pub const MAX_TRANSITION_TIME: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Swap,
    Translate,
    Flip,
    Window,
    Cube,
}

impl From<TransitionType> for TransitionKind {
    fn from(value: TransitionType) -> Self {
        match value {
            TransitionType::Swap => TransitionKind::Swap,
            TransitionType::Translate => TransitionKind::Translate,
            TransitionType::Flip => TransitionKind::Flip,
            TransitionType::Window => TransitionKind::Window,
            TransitionType::Cube => TransitionKind::Cube,
        }
    }
}

/// One draw emitted by a transition, consumed in order by the GPU layer.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Textured {
        texture: TextureId,
        vertices: [f32; 8],
        transform: Mat4,
    },
    Colored {
        vertices: [f32; 8],
        color: Color,
        transform: Mat4,
    },
}

/// Lazily stamped animation clock shared by the animated variants.
#[derive(Debug, Clone)]
pub(crate) struct Timing {
    start: Option<Instant>,
    duration: Duration,
    running: bool,
}

impl Timing {
    pub(crate) fn new(duration: Duration) -> Self {
        Self {
            start: None,
            duration,
            running: true,
        }
    }

    /// Progress in `[0, 1]`; the first call stamps the start time.
    pub(crate) fn delta(&mut self, now: Instant) -> f32 {
        let start = *self.start.get_or_insert(now);
        let elapsed = now.saturating_duration_since(start).as_secs_f32();
        (elapsed / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    pub(crate) fn finish(&mut self) {
        self.running = false;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn reset(&mut self) {
        self.start = None;
        self.running = true;
    }
}

/// Rotation of `angle_deg` about `axis` around a fixed pivot point.
pub(crate) fn pivot_rotation(pivot: Vec3, axis: Vec3, angle_deg: f32) -> Mat4 {
    Mat4::from_translation(pivot)
        * Mat4::from_axis_angle(axis, angle_deg.to_radians())
        * Mat4::from_translation(-pivot)
}

/// The instantaneous photo swap. Doubles as the idle transition assigned to
/// every frame between animations: an idle swap just redraws its frame, a
/// scheduled one shows the destination once and finishes.
#[derive(Debug, Clone)]
pub struct SwapTransition {
    pending: bool,
}

impl SwapTransition {
    fn idle() -> Self {
        Self { pending: false }
    }

    fn scheduled() -> Self {
        Self { pending: true }
    }

    fn apply(&mut self, src: &PhotoFrame, dst: Option<&PhotoFrame>, out: &mut Vec<DrawOp>) {
        if self.pending {
            let Some(dst) = dst else {
                return;
            };
            if dst.texture.is_none() || src.texture.is_none() {
                return;
            }
            emit_frame(dst, Mat4::IDENTITY, out);
            self.pending = false;
        } else {
            emit_frame(src, Mat4::IDENTITY, out);
        }
    }
}

/// Draws a frame in place: its photograph, or its background color while the
/// photograph is still being decoded.
pub(crate) fn emit_frame(frame: &PhotoFrame, transform: Mat4, out: &mut Vec<DrawOp>) {
    match &frame.texture {
        Some(texture) => out.push(DrawOp::Textured {
            texture: texture.id,
            vertices: frame.photo_quad.0,
            transform,
        }),
        None => out.push(DrawOp::Colored {
            vertices: frame.photo_quad.0,
            color: frame.background,
            transform,
        }),
    }
}

pub enum Transition {
    Swap(SwapTransition),
    Translate(TranslateTransition),
    Flip(FlipTransition),
    Window(WindowTransition),
    Cube(CubeTransition),
}

impl Transition {
    /// A fresh transition ready to be scheduled.
    pub fn new(kind: TransitionKind) -> Self {
        match kind {
            TransitionKind::Swap => Transition::Swap(SwapTransition::scheduled()),
            TransitionKind::Translate => Transition::Translate(TranslateTransition::new()),
            TransitionKind::Flip => Transition::Flip(FlipTransition::new()),
            TransitionKind::Window => Transition::Window(WindowTransition::new()),
            TransitionKind::Cube => Transition::Cube(CubeTransition::new()),
        }
    }

    /// The do-nothing transition every frame holds while not animating.
    pub fn idle() -> Self {
        Transition::Swap(SwapTransition::idle())
    }

    pub fn kind(&self) -> TransitionKind {
        match self {
            Transition::Swap(_) => TransitionKind::Swap,
            Transition::Translate(_) => TransitionKind::Translate,
            Transition::Flip(_) => TransitionKind::Flip,
            Transition::Window(_) => TransitionKind::Window,
            Transition::Cube(_) => TransitionKind::Cube,
        }
    }

    /// Whether `kind` can animate this frame at all. Translate needs the
    /// frame on some screen edge, Window a left or right one; the rest are
    /// unconditional.
    pub fn selectable(kind: TransitionKind, frame: &PhotoFrame) -> bool {
        match kind {
            TransitionKind::Translate => TranslateTransition::selectable(frame),
            TransitionKind::Window => WindowTransition::selectable(frame),
            TransitionKind::Swap | TransitionKind::Flip | TransitionKind::Cube => true,
        }
    }

    /// Binds the transition to `frame`: picks the sub-mode the frame's
    /// position allows and rewinds the clock.
    pub fn select(&mut self, frame: &PhotoFrame, rng: &mut StdRng) {
        match self {
            Transition::Swap(swap) => swap.pending = true,
            Transition::Translate(t) => t.select(frame, rng),
            Transition::Flip(t) => t.select(frame, rng),
            Transition::Window(t) => t.select(frame, rng),
            Transition::Cube(t) => t.select(frame, rng),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Transition::Swap(swap) => swap.pending = false,
            Transition::Translate(t) => t.reset(),
            Transition::Flip(t) => t.reset(),
            Transition::Window(t) => t.reset(),
            Transition::Cube(t) => t.reset(),
        }
    }

    pub fn is_running(&self) -> bool {
        match self {
            Transition::Swap(swap) => swap.pending,
            Transition::Translate(t) => t.is_running(),
            Transition::Flip(t) => t.is_running(),
            Transition::Window(t) => t.is_running(),
            Transition::Cube(t) => t.is_running(),
        }
    }

    /// Emits this frame's draws for the current instant. A no-op while an
    /// animating variant is missing either endpoint texture.
    pub fn apply(
        &mut self,
        src: &PhotoFrame,
        dst: Option<&PhotoFrame>,
        now: Instant,
        out: &mut Vec<DrawOp>,
    ) {
        match self {
            Transition::Swap(swap) => swap.apply(src, dst, out),
            Transition::Translate(t) => t.apply(src, dst, now, out),
            Transition::Flip(t) => t.apply(src, dst, now, out),
            Transition::Window(t) => t.apply(src, dst, now, out),
            Transition::Cube(t) => t.apply(src, dst, now, out),
        }
    }
}

/// Draws a frame's photograph under a transform, skipping frames whose
/// photograph has not arrived yet.
pub(crate) fn emit_textured(frame: &PhotoFrame, transform: Mat4, out: &mut Vec<DrawOp>) {
    if let Some(texture) = &frame.texture {
        out.push(DrawOp::Textured {
            texture: texture.id,
            vertices: frame.photo_quad.0,
            transform,
        });
    }
}

/// Returns the destination frame when both endpoint textures exist.
pub(crate) fn ready<'a>(src: &PhotoFrame, dst: Option<&'a PhotoFrame>) -> Option<&'a PhotoFrame> {
    let dst = dst?;
    if src.texture.is_none() || dst.texture.is_none() {
        return None;
    }
    Some(dst)
}
