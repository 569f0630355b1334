//! The wallpaper world: the set of photo frames currently on screen and the
//! transitions animating them.
//!
//! Frames take turns: a rotation queue guarantees every frame transitions
//! once before any frame goes twice. Selecting a transition picks an enabled
//! variant the frame's position allows, falling back to the instantaneous
//! swap after a bounded number of attempts, and requests the incoming
//! photograph for a shadow destination frame. Deselecting moves the
//! destination's texture into the slot and retires the transition instance
//! into an unused pool, where the next selection of the same variant reuses
//! it after a reset.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, warn};

use tileconfig::{Color, Disposition};

use crate::geometry::Quad;
use crate::manager::{Requestor, TextureManager};
use crate::texture::{GpuTexture, TextureStore};
use crate::transitions::{DrawOp, Transition, TransitionKind};

/// Attempts at picking a transition the frame's position allows before
/// falling back to a plain swap.
const SELECT_ATTEMPTS: usize = 8;

/// One tile of the collage: its cell on screen, the padded quad the
/// photograph is drawn into, and the photograph itself once decoded.
pub struct PhotoFrame {
    pub frame_quad: Quad,
    pub photo_quad: Quad,
    pub background: Color,
    pub texture: Option<GpuTexture>,
}

impl PhotoFrame {
    pub fn new(
        disposition: &Disposition,
        cols: u32,
        rows: u32,
        screen: (u32, u32),
        background: Color,
    ) -> Self {
        let cell_w = 2.0 / cols as f32;
        let cell_h = 2.0 / rows as f32;
        let frame_quad = Quad::from_disposition(disposition, cell_w, cell_h);
        let photo_quad = frame_quad.with_padding(screen.0, screen.1);
        Self {
            frame_quad,
            photo_quad,
            background,
            texture: None,
        }
    }

    /// Releases the frame's GPU texture, if any.
    pub fn recycle(&mut self, store: &mut dyn TextureStore) {
        if let Some(texture) = self.texture.take() {
            if store.contains(texture.id) {
                store.delete(texture.id);
            } else {
                warn!(path = %texture.path.display(), "frame texture was already deleted");
            }
        }
    }
}

pub struct WallpaperWorld {
    slots: Vec<PhotoFrame>,
    destinations: Vec<Option<PhotoFrame>>,
    transitions: Vec<Transition>,
    /// Retired transition instances, reused on later selections.
    unused_transitions: Vec<Transition>,
    /// Frame indices that have not transitioned in the current round.
    queue: Vec<usize>,
    used_queue: Vec<usize>,
    enabled: Vec<TransitionKind>,
    background: Color,
}

impl WallpaperWorld {
    pub fn new(enabled: Vec<TransitionKind>, background: Color) -> Self {
        Self {
            slots: Vec::new(),
            destinations: Vec::new(),
            transitions: Vec::new(),
            unused_transitions: Vec::new(),
            queue: Vec::new(),
            used_queue: Vec::new(),
            enabled,
            background,
        }
    }

    pub fn set_enabled_transitions(&mut self, enabled: Vec<TransitionKind>) {
        self.enabled = enabled;
    }

    /// Rebuilds the world for a new layout or surface size. Existing frames
    /// are recycled and every in-flight texture request is invalidated.
    pub fn recreate(
        &mut self,
        screen: (u32, u32),
        dispositions: &[Disposition],
        cols: u32,
        rows: u32,
        manager: &TextureManager,
        store: &mut dyn TextureStore,
    ) {
        self.recycle(manager, store);
        manager.bump_generation();

        self.slots = dispositions
            .iter()
            .map(|d| PhotoFrame::new(d, cols, rows, screen, self.background))
            .collect();
        for (i, frame) in self.slots.iter_mut().enumerate() {
            frame.texture = manager.request(Requestor::Slot(i), frame.photo_quad, store);
        }
        let count = self.slots.len();
        self.destinations = (0..count).map(|_| None).collect();
        self.transitions = (0..count).map(|_| Transition::idle()).collect();
        self.queue = (0..count).collect();
        self.used_queue = Vec::new();
        debug!(frames = count, cols, rows, "world recreated");
    }

    pub fn frames(&self) -> &[PhotoFrame] {
        &self.slots
    }

    #[cfg(test)]
    pub(crate) fn frames_mut(&mut self) -> &mut [PhotoFrame] {
        &mut self.slots
    }

    #[cfg(test)]
    pub(crate) fn unused_transition_count(&self) -> usize {
        self.unused_transitions.len()
    }

    pub fn has_running_transition(&self) -> bool {
        self.destinations.iter().any(Option::is_some)
    }

    /// Picks the next frame in the fair rotation and schedules a transition
    /// on it. Returns the chosen frame index.
    pub fn select_random_transition(
        &mut self,
        manager: &TextureManager,
        store: &mut dyn TextureStore,
        rng: &mut StdRng,
    ) -> Option<usize> {
        if self.slots.is_empty() {
            return None;
        }
        if self.queue.is_empty() {
            self.queue = std::mem::take(&mut self.used_queue);
        }
        let pick = rng.gen_range(0..self.queue.len());
        let pos = self.queue.swap_remove(pick);
        self.used_queue.push(pos);
        self.select_transition_at(pos, manager, store, rng);
        Some(pos)
    }

    /// Schedules a transition on `pos`: an enabled variant the frame's
    /// position allows, or a swap when none qualifies after a few tries.
    pub fn select_transition_at(
        &mut self,
        pos: usize,
        manager: &TextureManager,
        store: &mut dyn TextureStore,
        rng: &mut StdRng,
    ) {
        let frame = &self.slots[pos];
        let mut kind = TransitionKind::Swap;
        if !self.enabled.is_empty() {
            for _ in 0..SELECT_ATTEMPTS {
                let candidate = self.enabled[rng.gen_range(0..self.enabled.len())];
                if Transition::selectable(candidate, frame) {
                    kind = candidate;
                    break;
                }
            }
        }

        let mut transition = self
            .unused_transitions
            .iter()
            .position(|t| t.kind() == kind)
            .map(|i| self.unused_transitions.swap_remove(i))
            .unwrap_or_else(|| Transition::new(kind));
        transition.reset();
        transition.select(frame, rng);
        self.transitions[pos] = transition;

        let mut destination = PhotoFrame {
            frame_quad: frame.frame_quad,
            photo_quad: frame.photo_quad,
            background: frame.background,
            texture: None,
        };
        destination.texture =
            manager.request(Requestor::Destination(pos), destination.photo_quad, store);
        self.destinations[pos] = Some(destination);
    }

    /// Completes every finished transition: the destination's photograph
    /// replaces the slot's and the frame goes back to idling.
    pub fn finish_transitions(&mut self, manager: &TextureManager, store: &mut dyn TextureStore) {
        for pos in 0..self.slots.len() {
            if self.destinations[pos].is_some() && !self.transitions[pos].is_running() {
                self.deselect_transition(pos, manager, store);
            }
        }
    }

    /// Forcibly completes every transition, finished or not. Used when a
    /// transition overstays its welcome or the surface is torn down.
    pub fn abort_transitions(&mut self, manager: &TextureManager, store: &mut dyn TextureStore) {
        for pos in 0..self.slots.len() {
            if self.destinations[pos].is_some() {
                self.deselect_transition(pos, manager, store);
            }
        }
    }

    fn deselect_transition(
        &mut self,
        pos: usize,
        manager: &TextureManager,
        store: &mut dyn TextureStore,
    ) {
        let Some(destination) = self.destinations[pos].take() else {
            return;
        };
        match destination.texture {
            Some(texture) => {
                self.slots[pos].recycle(store);
                self.slots[pos].texture = Some(texture);
            }
            // The incoming photograph never arrived; keep the old one and
            // drop the parked request.
            None => manager.cancel_request(Requestor::Destination(pos)),
        }
        let retired = std::mem::replace(&mut self.transitions[pos], Transition::idle());
        self.unused_transitions.push(retired);
    }

    /// Routes textures the manager resolved for parked requestors into their
    /// frames. Textures whose frame vanished in the meantime are released.
    pub fn apply_fulfilled(&mut self, manager: &TextureManager, store: &mut dyn TextureStore) {
        for (requestor, texture) in manager.take_fulfilled(store) {
            match requestor {
                Requestor::Slot(pos) if pos < self.slots.len() => {
                    self.slots[pos].recycle(store);
                    self.slots[pos].texture = Some(texture);
                }
                Requestor::Destination(pos) if pos < self.slots.len() => {
                    match &mut self.destinations[pos] {
                        Some(destination) => destination.texture = Some(texture),
                        // The transition was already deselected; reuse the
                        // photograph on the slot if it still needs one.
                        None if self.slots[pos].texture.is_none() => {
                            self.slots[pos].texture = Some(texture);
                        }
                        None => {
                            warn!(path = %texture.path.display(),
                                "dropping texture for a finished transition");
                            store.delete(texture.id);
                        }
                    }
                }
                _ => {
                    warn!(?requestor, "dropping texture for a vanished frame");
                    store.delete(texture.id);
                }
            }
        }
    }

    /// Emits the draws for one wallpaper frame: idle tiles first, animating
    /// ones on top.
    pub fn draw(&mut self, now: Instant, out: &mut Vec<DrawOp>) {
        for pass in [false, true] {
            for pos in 0..self.slots.len() {
                let animating = self.destinations[pos].is_some();
                if animating != pass {
                    continue;
                }
                self.transitions[pos].apply(
                    &self.slots[pos],
                    self.destinations[pos].as_ref(),
                    now,
                    out,
                );
            }
        }
    }

    /// Recycles every frame and cancels their texture requests.
    pub fn recycle(&mut self, manager: &TextureManager, store: &mut dyn TextureStore) {
        for (pos, frame) in self.slots.iter_mut().enumerate() {
            if frame.texture.is_none() {
                manager.cancel_request(Requestor::Slot(pos));
            }
            frame.recycle(store);
        }
        for (pos, destination) in self.destinations.iter_mut().enumerate() {
            if let Some(destination) = destination.as_mut() {
                if destination.texture.is_none() {
                    manager.cancel_request(Requestor::Destination(pos));
                }
                destination.recycle(store);
            }
        }
        self.destinations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::render_channel;
    use crate::manager::TextureManagerOptions;
    use crate::test_support::MemoryTextureStore;
    use mediascan::MediaScanner;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn grid(cols: u32, rows: u32) -> Vec<Disposition> {
        let mut dispositions = Vec::new();
        for y in 0..rows {
            for x in 0..cols {
                dispositions.push(Disposition { x, y, w: 1, h: 1 });
            }
        }
        dispositions
    }

    fn test_manager() -> (TextureManager, tempfile::TempDir) {
        let temp = tempfile::tempdir().unwrap();
        let (dispatcher, _jobs) = render_channel(Arc::new(|| {}));
        let scanner = MediaScanner::new(vec![temp.path().to_path_buf()]);
        let manager = TextureManager::new(
            dispatcher,
            scanner,
            TextureManagerOptions {
                screen: (400, 800),
                decode_dimensions: (64, 64),
                fix_aspect_ratio: false,
                effects: Vec::new(),
                seed: 5,
            },
        );
        (manager, temp)
    }

    fn world_with_textures(
        enabled: Vec<TransitionKind>,
        cols: u32,
        rows: u32,
        manager: &TextureManager,
        store: &mut MemoryTextureStore,
    ) -> WallpaperWorld {
        let mut world = WallpaperWorld::new(enabled, Color::BLACK);
        world.recreate((400, 800), &grid(cols, rows), cols, rows, manager, store);
        for (i, frame) in world.slots.iter_mut().enumerate() {
            let image = image::RgbaImage::new(4, 4);
            let id = store.upload(&image).unwrap();
            frame.texture = Some(GpuTexture {
                id,
                path: format!("/photos/{i}.png").into(),
                width: 4,
                height: 4,
                pixels: None,
                effect: None,
            });
        }
        world
    }

    #[test]
    fn rotation_visits_every_frame_before_repeating() {
        let (manager, _temp) = test_manager();
        let mut store = MemoryTextureStore::default();
        let mut world = world_with_textures(
            vec![TransitionKind::Swap],
            2,
            4,
            &manager,
            &mut store,
        );
        let mut rng = StdRng::seed_from_u64(42);

        let mut seen = Vec::new();
        for _ in 0..8 {
            let pos = world
                .select_random_transition(&manager, &mut store, &mut rng)
                .unwrap();
            seen.push(pos);
            world.abort_transitions(&manager, &mut store);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn interior_frame_falls_back_to_swap() {
        let (manager, _temp) = test_manager();
        let mut store = MemoryTextureStore::default();
        // A 3x3 grid has a center tile touching no screen edge; with only
        // edge-bound variants enabled the selection must fall back.
        let mut world = world_with_textures(
            vec![TransitionKind::Translate, TransitionKind::Window],
            3,
            3,
            &manager,
            &mut store,
        );
        let mut rng = StdRng::seed_from_u64(0);
        world.select_transition_at(4, &manager, &mut store, &mut rng);
        assert_eq!(world.transitions[4].kind(), TransitionKind::Swap);
        // A corner tile keeps the edge-bound variant.
        world.select_transition_at(0, &manager, &mut store, &mut rng);
        assert_ne!(world.transitions[0].kind(), TransitionKind::Swap);
    }

    #[test]
    fn retired_transitions_are_reused_from_the_pool() {
        let (manager, _temp) = test_manager();
        let mut store = MemoryTextureStore::default();
        // Every tile of a 2x2 grid touches a screen edge, so Translate is
        // always selectable.
        let mut world = world_with_textures(
            vec![TransitionKind::Translate],
            2,
            2,
            &manager,
            &mut store,
        );
        let mut rng = StdRng::seed_from_u64(3);

        world.select_transition_at(0, &manager, &mut store, &mut rng);
        assert_eq!(world.transitions[0].kind(), TransitionKind::Translate);
        assert_eq!(world.unused_transition_count(), 0);

        world.abort_transitions(&manager, &mut store);
        assert_eq!(world.unused_transition_count(), 1);

        // The next selection of the same variant drains the pool instead of
        // constructing a new instance.
        world.select_transition_at(1, &manager, &mut store, &mut rng);
        assert_eq!(world.transitions[1].kind(), TransitionKind::Translate);
        assert_eq!(world.unused_transition_count(), 0);
    }

    #[test]
    fn no_enabled_transitions_falls_back_to_swap() {
        let (manager, _temp) = test_manager();
        let mut store = MemoryTextureStore::default();
        let mut world = world_with_textures(Vec::new(), 2, 2, &manager, &mut store);
        let mut rng = StdRng::seed_from_u64(1);

        world.select_transition_at(0, &manager, &mut store, &mut rng);
        assert_eq!(world.transitions[0].kind(), TransitionKind::Swap);
    }

    #[test]
    fn deselect_moves_the_destination_into_the_slot() {
        let (manager, _temp) = test_manager();
        let mut store = MemoryTextureStore::default();
        let mut world = world_with_textures(
            vec![TransitionKind::Swap],
            2,
            2,
            &manager,
            &mut store,
        );
        let mut rng = StdRng::seed_from_u64(9);
        let old_id = world.slots[1].texture.as_ref().unwrap().id;

        world.select_transition_at(1, &manager, &mut store, &mut rng);
        // The empty library parks the destination request; hand the frame a
        // texture directly, as apply_fulfilled would.
        let image = image::RgbaImage::new(4, 4);
        let new_id = store.upload(&image).unwrap();
        world.destinations[1].as_mut().unwrap().texture = Some(GpuTexture {
            id: new_id,
            path: "/photos/new.png".into(),
            width: 4,
            height: 4,
            pixels: None,
            effect: None,
        });

        world.finish_transitions(&manager, &mut store);
        // A pending swap with both endpoints still counts as running until
        // it draws once, so force completion.
        let mut ops = Vec::new();
        world.draw(Instant::now(), &mut ops);
        world.finish_transitions(&manager, &mut store);

        assert!(world.destinations[1].is_none());
        assert_eq!(world.slots[1].texture.as_ref().unwrap().id, new_id);
        assert!(!store.contains(old_id));
        assert!(store.contains(new_id));
    }

    #[test]
    fn fulfilled_slot_textures_land_on_their_frames() {
        let (manager, _temp) = test_manager();
        let mut store = MemoryTextureStore::default();
        let mut world = WallpaperWorld::new(vec![TransitionKind::Swap], Color::BLACK);
        world.recreate((400, 800), &grid(1, 2), 1, 2, &manager, &mut store);
        assert!(world.slots.iter().all(|f| f.texture.is_none()));

        // Nothing pending was resolved, so the world stays bare.
        world.apply_fulfilled(&manager, &mut store);
        assert!(world.slots.iter().all(|f| f.texture.is_none()));
    }

    #[test]
    fn recreate_recycles_previous_textures() {
        let (manager, _temp) = test_manager();
        let mut store = MemoryTextureStore::default();
        let mut world = world_with_textures(
            vec![TransitionKind::Swap],
            2,
            2,
            &manager,
            &mut store,
        );
        assert_eq!(store.live_textures(), 4);

        world.recreate((800, 400), &grid(4, 2), 4, 2, &manager, &mut store);
        assert_eq!(store.live_textures(), 0);
        assert_eq!(world.frames().len(), 8);
    }
}
