//! Photo collage wallpaper engine.
//!
//! The engine is split along the thread boundary: media discovery and photo
//! decoding run on background threads and hand GPU work to the render thread
//! through [`dispatcher`]; the render thread owns the [`texture::TextureStore`],
//! the [`world::WallpaperWorld`], and the transition state machine, and the
//! [`renderer::SceneRenderer`] drives all of it once per frame.

pub mod dispatcher;
pub mod effects;
pub mod geometry;
pub mod gpu;
pub mod manager;
pub mod queue;
pub mod renderer;
pub mod texture;
pub mod transitions;
pub mod world;

pub use dispatcher::{render_channel, RenderDispatcher, RenderJob, RenderJobQueue};
pub use geometry::Quad;
pub use manager::{ManagerStatus, Requestor, TextureManager, TextureManagerOptions};
pub use renderer::{RenderCadence, SceneRenderer, SettingsEvent};
pub use texture::{GpuTexture, TextureId, TextureStore};
pub use transitions::{DrawOp, Transition, TransitionKind};
pub use world::{PhotoFrame, WallpaperWorld};

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashSet;

    use image::RgbaImage;

    use crate::geometry::Quad;
    use crate::texture::{GpuTexture, TextureId, TextureStore};
    use crate::world::PhotoFrame;
    use tileconfig::Color;

    /// Store that tracks live texture ids without touching a GPU.
    #[derive(Default)]
    pub struct MemoryTextureStore {
        next_id: u32,
        live: HashSet<TextureId>,
    }

    impl MemoryTextureStore {
        pub fn live_textures(&self) -> usize {
            self.live.len()
        }
    }

    impl TextureStore for MemoryTextureStore {
        fn upload(&mut self, _image: &RgbaImage) -> anyhow::Result<TextureId> {
            let id = TextureId(self.next_id);
            self.next_id += 1;
            self.live.insert(id);
            Ok(id)
        }

        fn delete(&mut self, id: TextureId) {
            self.live.remove(&id);
        }

        fn contains(&self, id: TextureId) -> bool {
            self.live.contains(&id)
        }
    }

    pub fn frame_with_texture(id: u32, quad: Quad) -> PhotoFrame {
        PhotoFrame {
            frame_quad: quad,
            photo_quad: quad,
            background: Color::BLACK,
            texture: Some(GpuTexture {
                id: TextureId(id),
                path: format!("/photos/{id}.png").into(),
                width: 4,
                height: 4,
                pixels: None,
                effect: None,
            }),
        }
    }
}
