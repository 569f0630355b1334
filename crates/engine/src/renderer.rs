//! Frame-by-frame driver for the wallpaper scene. Owns the world, the
//! texture manager, and the scheduling timers; the daemon calls
//! [`SceneRenderer::draw_frame`] once per frame and obeys the returned
//! cadence, polling while a transition animates and waiting otherwise.

use std::time::{Duration, Instant};

use glam::Mat4;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use tileconfig::layout::{self, LANDSCAPE_TEMPLATES, PORTRAIT_TEMPLATES};
use tileconfig::{Color, ConfigError, Disposition, Settings};

use crate::dispatcher::RenderJobQueue;
use crate::geometry::Quad;
use crate::manager::{ManagerStatus, TextureManager};
use crate::texture::TextureStore;
use crate::transitions::{DrawOp, TransitionKind, MAX_TRANSITION_TIME};
use crate::world::WallpaperWorld;

/// Shortest gap between a finished transition and the next selection.
const MIN_TRANSITION_DELAY: Duration = Duration::from_millis(200);

/// How the daemon should drive the event loop until the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderCadence {
    /// A transition is animating; redraw as fast as the surface allows.
    Continuous,
    /// Static scene; redraw on the next wake deadline or external event.
    OnDemand,
}

/// Configuration changes routed to the render thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsEvent {
    Redraw,
    RecreateWorld,
    EmptyTextureQueue,
    MediaReload { user_request: bool },
    MediaIntervalChanged,
    DispositionIntervalChanged,
}

pub struct SceneRenderer {
    settings: Settings,
    background: Color,
    manager: TextureManager,
    jobs: RenderJobQueue,
    world: WallpaperWorld,
    rng: StdRng,
    screen: (u32, u32),
    paused: bool,
    next_transition_at: Option<Instant>,
    transition_started: Option<Instant>,
    next_disposition_at: Option<Instant>,
    next_media_rescan: Option<Instant>,
    no_pictures_logged: bool,
}

impl SceneRenderer {
    pub fn new(
        settings: Settings,
        manager: TextureManager,
        jobs: RenderJobQueue,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        let background = settings.background_color()?;
        let enabled = enabled_kinds(&settings);
        Ok(Self {
            world: WallpaperWorld::new(enabled, background),
            settings,
            background,
            manager,
            jobs,
            rng: StdRng::seed_from_u64(seed),
            screen: (0, 0),
            paused: false,
            next_transition_at: None,
            transition_started: None,
            next_disposition_at: None,
            next_media_rescan: None,
            no_pictures_logged: false,
        })
    }

    pub fn background(&self) -> Color {
        self.background
    }

    /// Surface size changed: retarget decode dimensions and rebuild the
    /// world for the new orientation.
    pub fn resize(&mut self, width: u32, height: u32, store: &mut dyn TextureStore) {
        debug!(width, height, "surface resized");
        self.screen = (width, height);
        self.manager.set_screen_dimensions(width, height);
        self.manager
            .set_decode_dimensions((width / 4).max(1), (height / 4).max(1));
        self.recreate_world(store);
    }

    fn recreate_world(&mut self, store: &mut dyn TextureStore) {
        let (dispositions, cols, rows) = self.dispositions_for(self.screen);
        self.world
            .recreate(self.screen, &dispositions, cols, rows, &self.manager, store);
        self.transition_started = None;
        self.next_transition_at = None;
    }

    /// The frame layout for the current settings and orientation. Landscape
    /// swaps the configured grid; random mode draws from the builtin
    /// template pool instead of the fixed ones.
    fn dispositions_for(&mut self, screen: (u32, u32)) -> (Vec<Disposition>, u32, u32) {
        let portrait = screen.1 >= screen.0;
        let (cols, rows, template) = if self.settings.layout.random_dispositions {
            let pool = if portrait {
                PORTRAIT_TEMPLATES
            } else {
                LANDSCAPE_TEMPLATES
            };
            let pick = pool[self.rng.gen_range(0..pool.len())];
            if portrait {
                (2, 4, pick.to_string())
            } else {
                (4, 2, pick.to_string())
            }
        } else if portrait {
            (
                self.settings.layout.cols,
                self.settings.layout.rows,
                self.settings.layout.portrait.clone(),
            )
        } else {
            (
                self.settings.layout.rows,
                self.settings.layout.cols,
                self.settings.layout.landscape.clone(),
            )
        };

        let dispositions = match layout::parse_template(&template) {
            Ok(dispositions) => dispositions,
            Err(err) => {
                warn!(error = %err, "bad disposition template, using the full grid");
                full_grid(cols, rows)
            }
        };
        (dispositions, cols, rows)
    }

    /// Draws one frame into `out` and advances the scheduling timers.
    pub fn draw_frame(
        &mut self,
        now: Instant,
        store: &mut dyn TextureStore,
        out: &mut Vec<DrawOp>,
    ) -> RenderCadence {
        self.jobs.run_pending(store);
        self.world.apply_fulfilled(&self.manager, store);

        if !self.paused {
            self.run_timers(now, store);
        }

        if self.manager.status() == ManagerStatus::Loaded && self.manager.is_empty() {
            if !self.no_pictures_logged {
                info!("no pictures found in the configured sources");
                self.no_pictures_logged = true;
            }
        } else {
            self.no_pictures_logged = false;
        }

        // Frames keep their last photographs even when the library empties;
        // a bare frame draws its background color until one arrives.
        let was_running = self.world.has_running_transition();
        self.world.draw(now, out);
        self.world.finish_transitions(&self.manager, store);
        if was_running && !self.world.has_running_transition() {
            self.schedule_next_transition(now);
        }

        if self.settings.render.wallpaper_dim > 0 {
            out.push(DrawOp::Colored {
                vertices: Quad::FULL_SCREEN.0,
                color: Color::BLACK.with_alpha(self.settings.render.wallpaper_dim as f32 / 100.0),
                transform: Mat4::IDENTITY,
            });
        }

        if self.world.has_running_transition() {
            RenderCadence::Continuous
        } else {
            RenderCadence::OnDemand
        }
    }

    fn run_timers(&mut self, now: Instant, store: &mut dyn TextureStore) {
        let rescan = self.settings.media.refresh_interval;
        if !rescan.is_zero() {
            let at = *self.next_media_rescan.get_or_insert(now + rescan);
            if now >= at {
                self.manager.reload_media(false);
                self.next_media_rescan = Some(now + rescan);
            }
        }

        let reshuffle = self.settings.layout.random_dispositions_interval;
        if self.settings.layout.random_dispositions && !reshuffle.is_zero() {
            let at = *self.next_disposition_at.get_or_insert(now + reshuffle);
            if now >= at {
                debug!("generating a new random disposition");
                self.recreate_world(store);
                self.next_disposition_at = Some(now + reshuffle);
            }
        }

        if let (Some(started), true) = (self.transition_started, self.world.has_running_transition())
        {
            if now.saturating_duration_since(started) >= MAX_TRANSITION_TIME {
                warn!("transition exceeded its time budget, forcing completion");
                self.world.abort_transitions(&self.manager, store);
                self.schedule_next_transition(now);
            }
        }

        let interval = self.settings.transitions.interval;
        if !interval.is_zero() && !self.world.has_running_transition() {
            let at = *self.next_transition_at.get_or_insert(now + interval);
            if now >= at {
                if self
                    .world
                    .select_random_transition(&self.manager, store, &mut self.rng)
                    .is_some()
                {
                    self.transition_started = Some(now);
                }
                self.next_transition_at = None;
            }
        }
    }

    /// The next transition goes out `interval` after the previous one
    /// started, but never sooner than the minimum delay from now.
    fn schedule_next_transition(&mut self, now: Instant) {
        let interval = self.settings.transitions.interval;
        let elapsed = self
            .transition_started
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();
        let delay = interval.saturating_sub(elapsed).max(MIN_TRANSITION_DELAY);
        self.next_transition_at = Some(now + delay);
        self.transition_started = None;
    }

    /// The earliest instant a timer needs the render thread again, for the
    /// daemon's wait deadline. `None` while paused or with nothing armed.
    pub fn next_wake(&self) -> Option<Instant> {
        if self.paused {
            return None;
        }
        [
            self.next_transition_at,
            self.next_disposition_at,
            self.next_media_rescan,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub fn handle_event(&mut self, event: SettingsEvent, store: &mut dyn TextureStore) {
        debug!(?event, "settings event");
        match event {
            SettingsEvent::Redraw => {}
            SettingsEvent::RecreateWorld => self.recreate_world(store),
            SettingsEvent::EmptyTextureQueue => self.manager.empty_texture_queue(true, store),
            SettingsEvent::MediaReload { user_request } => {
                self.no_pictures_logged = false;
                self.manager.reload_media(user_request);
            }
            SettingsEvent::MediaIntervalChanged => self.next_media_rescan = None,
            SettingsEvent::DispositionIntervalChanged => self.next_disposition_at = None,
        }
    }

    /// Swaps in a freshly loaded configuration and rebuilds the world.
    pub fn update_settings(
        &mut self,
        settings: Settings,
        store: &mut dyn TextureStore,
    ) -> Result<(), ConfigError> {
        self.background = settings.background_color()?;
        self.world.set_enabled_transitions(enabled_kinds(&settings));
        self.settings = settings;
        self.next_media_rescan = None;
        self.next_disposition_at = None;
        self.recreate_world(store);
        Ok(())
    }

    /// Frees texture memory without tearing the scene down.
    pub fn trim_memory(&mut self, store: &mut dyn TextureStore) {
        self.manager.empty_texture_queue(false, store);
    }

    pub fn pause(&mut self) {
        self.paused = true;
        self.manager.set_pause(true);
    }

    pub fn resume(&mut self, now: Instant) {
        self.paused = false;
        self.manager.set_pause(false);
        self.next_transition_at = Some(now + MIN_TRANSITION_DELAY);
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

fn enabled_kinds(settings: &Settings) -> Vec<TransitionKind> {
    settings
        .transitions
        .types
        .iter()
        .map(|t| TransitionKind::from(*t))
        .collect()
}

fn full_grid(cols: u32, rows: u32) -> Vec<Disposition> {
    let mut dispositions = Vec::with_capacity((cols * rows) as usize);
    for y in 0..rows {
        for x in 0..cols {
            dispositions.push(Disposition { x, y, w: 1, h: 1 });
        }
    }
    dispositions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::render_channel;
    use crate::manager::TextureManagerOptions;
    use crate::test_support::MemoryTextureStore;
    use mediascan::MediaScanner;
    use std::sync::Arc;

    fn test_renderer(settings: Settings) -> (SceneRenderer, tempfile::TempDir) {
        let temp = tempfile::tempdir().unwrap();
        let (dispatcher, jobs) = render_channel(Arc::new(|| {}));
        let scanner = MediaScanner::new(vec![temp.path().to_path_buf()]);
        let manager = TextureManager::new(
            dispatcher,
            scanner,
            TextureManagerOptions {
                screen: (400, 800),
                decode_dimensions: (64, 64),
                fix_aspect_ratio: false,
                effects: Vec::new(),
                seed: 17,
            },
        );
        let renderer = SceneRenderer::new(settings, manager, jobs, 17).expect("renderer");
        (renderer, temp)
    }

    fn give_frames_textures(renderer: &mut SceneRenderer, store: &mut MemoryTextureStore) {
        use crate::texture::{GpuTexture, TextureStore};
        for (i, frame) in renderer.world.frames_mut().iter_mut().enumerate() {
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
    }

    #[test]
    fn landscape_swaps_the_grid() {
        let (mut renderer, _temp) = test_renderer(Settings::default());
        let (_, cols, rows) = renderer.dispositions_for((400, 800));
        assert_eq!((cols, rows), (2, 4));
        let (_, cols, rows) = renderer.dispositions_for((800, 400));
        assert_eq!((cols, rows), (4, 2));
    }

    #[test]
    fn random_mode_uses_builtin_templates() {
        let mut settings = Settings::default();
        settings.layout.random_dispositions = true;
        let (mut renderer, _temp) = test_renderer(settings);
        let (dispositions, cols, rows) = renderer.dispositions_for((400, 800));
        assert_eq!((cols, rows), (2, 4));
        assert!(dispositions.iter().all(|d| d.fits(cols, rows)));
    }

    #[test]
    fn transition_fires_after_the_interval() {
        let mut settings = Settings::default();
        settings.transitions.interval = Duration::from_millis(50);
        let (mut renderer, _temp) = test_renderer(settings);
        let mut store = MemoryTextureStore::default();
        renderer.resize(400, 800, &mut store);
        give_frames_textures(&mut renderer, &mut store);

        let t0 = Instant::now();
        let mut ops = Vec::new();
        assert_eq!(
            renderer.draw_frame(t0, &mut store, &mut ops),
            RenderCadence::OnDemand
        );
        ops.clear();
        let cadence = renderer.draw_frame(t0 + Duration::from_millis(60), &mut store, &mut ops);
        assert_eq!(cadence, RenderCadence::Continuous);
        assert!(renderer.world.has_running_transition());
    }

    #[test]
    fn stuck_transition_is_forced_out() {
        let mut settings = Settings::default();
        settings.transitions.interval = Duration::from_millis(10);
        let (mut renderer, _temp) = test_renderer(settings);
        let mut store = MemoryTextureStore::default();
        renderer.resize(400, 800, &mut store);

        let t0 = Instant::now();
        let mut ops = Vec::new();
        renderer.draw_frame(t0, &mut store, &mut ops);
        // Bare frames keep the transition from ever drawing; it must still
        // be evicted after the time budget.
        renderer.draw_frame(t0 + Duration::from_millis(20), &mut store, &mut ops);
        assert!(renderer.world.has_running_transition());
        let cadence = renderer.draw_frame(t0 + Duration::from_secs(3), &mut store, &mut ops);
        assert!(!renderer.world.has_running_transition());
        assert_eq!(cadence, RenderCadence::OnDemand);
    }

    #[test]
    fn frames_persist_after_the_library_empties() {
        let (mut renderer, _temp) = test_renderer(Settings::default());
        let mut store = MemoryTextureStore::default();
        renderer.resize(400, 800, &mut store);
        give_frames_textures(&mut renderer, &mut store);

        // The scanner points at an empty directory; wait for discovery to
        // finish with nothing.
        let deadline = Instant::now() + Duration::from_secs(5);
        while renderer.manager.status() != ManagerStatus::Loaded {
            assert!(Instant::now() < deadline, "discovery never completed");
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(renderer.manager.is_empty());

        let mut ops = Vec::new();
        renderer.draw_frame(Instant::now(), &mut store, &mut ops);
        let textured = ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Textured { .. }))
            .count();
        assert_eq!(textured, renderer.world.frames().len());
    }

    #[test]
    fn pause_stops_the_scheduler() {
        let mut settings = Settings::default();
        settings.transitions.interval = Duration::from_millis(10);
        let (mut renderer, _temp) = test_renderer(settings);
        let mut store = MemoryTextureStore::default();
        renderer.resize(400, 800, &mut store);
        renderer.pause();

        let mut ops = Vec::new();
        let far = Instant::now() + Duration::from_secs(60);
        renderer.draw_frame(far, &mut store, &mut ops);
        assert!(!renderer.world.has_running_transition());
        assert!(renderer.next_wake().is_none());

        renderer.resume(far);
        assert!(renderer.next_wake().is_some());
    }

    #[test]
    fn dim_overlay_is_drawn_last() {
        let mut settings = Settings::default();
        settings.render.wallpaper_dim = 30;
        let (mut renderer, _temp) = test_renderer(settings);
        let mut store = MemoryTextureStore::default();
        renderer.resize(400, 800, &mut store);

        let mut ops = Vec::new();
        renderer.draw_frame(Instant::now(), &mut store, &mut ops);
        let DrawOp::Colored { color, vertices, .. } = ops.last().expect("dim overlay") else {
            panic!("expected the dim overlay on top");
        };
        assert!((color.a - 0.3).abs() < 1e-6);
        assert_eq!(*vertices, Quad::FULL_SCREEN.0);
    }
}
