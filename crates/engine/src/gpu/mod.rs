//! wgpu-backed rendering: device/surface setup and the scene that turns
//! [`crate::transitions::DrawOp`]s into draw calls.

mod context;
mod scene;

pub use context::GpuContext;
pub use scene::GpuScene;
