//! GPU texture handles and the store seam. All texture objects are created
//! and destroyed through [`TextureStore`], which only the render thread
//! implements against a real device; everything above it stays GPU-free.

use std::path::PathBuf;

use image::RgbaImage;

use crate::effects::EffectKind;

/// Opaque handle to a texture owned by a [`TextureStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// A decoded photograph bound to a GPU texture.
///
/// The pixel buffer is retained only while an aspect-ratio correction may
/// still need it; callers drop it as soon as the texture reaches its final
/// size.
#[derive(Debug)]
pub struct GpuTexture {
    pub id: TextureId,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub pixels: Option<RgbaImage>,
    /// Effect still to be applied during aspect-ratio correction.
    pub effect: Option<EffectKind>,
}

impl GpuTexture {
    pub fn release_pixels(&mut self) {
        self.pixels = None;
    }
}

/// The single interface through which GPU texture objects come and go.
/// Deletion is always explicit; dropping a [`GpuTexture`] never frees the
/// underlying object.
pub trait TextureStore {
    fn upload(&mut self, image: &RgbaImage) -> anyhow::Result<TextureId>;
    fn delete(&mut self, id: TextureId);
    fn contains(&self, id: TextureId) -> bool;
}
