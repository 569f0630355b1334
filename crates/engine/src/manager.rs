//! Supplies decoded, GPU-ready photographs to the wallpaper world.
//!
//! The manager keeps a fixed-size queue of textures topped up by a background
//! decode worker. Frames ask for their next photo with [`TextureManager::request`];
//! when the queue is empty the requestor is parked and served as soon as the
//! worker lands the next decode, which the world collects through
//! [`TextureManager::take_fulfilled`]. Decoding happens in a job dispatched to
//! the render thread, so every texture upload and delete stays there.
//!
//! The worker rotates through the photo library without repeats: fresh paths
//! live in a `new` pool and move to `used` once shown; when `new` drains the
//! pools swap, and when both are empty a rediscovery scan is triggered.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use anyhow::Context;
use image::imageops::FilterType;
use image::RgbaImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use mediascan::{MediaObserver, MediaScanner};
use tileconfig::EffectType;

use crate::dispatcher::RenderDispatcher;
use crate::effects::EffectProvider;
use crate::geometry::Quad;
use crate::queue::{QueueError, TextureQueue};
use crate::texture::{GpuTexture, TextureStore};

/// Who asked for a texture: a world slot showing its photo, or the
/// destination frame of a scheduled transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requestor {
    Slot(usize),
    Destination(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerStatus {
    Loading,
    Loaded,
    Error,
}

#[derive(Debug, Clone)]
pub struct TextureManagerOptions {
    /// Physical surface size, used to size aspect-corrected thumbnails.
    pub screen: (u32, u32),
    /// Upper bound for decoded picture dimensions.
    pub decode_dimensions: (u32, u32),
    pub fix_aspect_ratio: bool,
    pub effects: Vec<EffectType>,
    pub seed: u64,
}

struct PendingRequest {
    requestor: Requestor,
    quad: Quad,
    generation: u64,
}

struct Fulfilled {
    requestor: Requestor,
    texture: GpuTexture,
    generation: u64,
}

struct ManagerState {
    queue: TextureQueue,
    pending: Vec<PendingRequest>,
    fulfilled: Vec<Fulfilled>,
    status: ManagerStatus,
    generation: u64,
    screen: (u32, u32),
    decode_dimensions: (u32, u32),
    fix_aspect_ratio: bool,
    effects: EffectProvider,
    rng: StdRng,
}

struct WorkerState {
    new_images: Vec<PathBuf>,
    used_images: Vec<PathBuf>,
    empty: bool,
    paused: bool,
    shutdown: bool,
    rng: StdRng,
}

impl WorkerState {
    /// Replaces the pools with a freshly discovered library, keeping paths
    /// that were already shown in the used pool so they are not repeated
    /// before the rest.
    fn set_available(&mut self, all: &[PathBuf]) {
        let all_set: HashSet<&PathBuf> = all.iter().collect();
        self.used_images.retain(|path| all_set.contains(path));
        let used_set: HashSet<&PathBuf> = self.used_images.iter().collect();
        self.new_images = all
            .iter()
            .filter(|path| !used_set.contains(path))
            .cloned()
            .collect();
        self.empty = all.is_empty();
    }

    fn add_partial(&mut self, batch: &[PathBuf]) {
        self.new_images.extend_from_slice(batch);
        self.empty = batch.is_empty();
    }

    /// Makes every shown picture eligible again.
    fn reset_pools(&mut self) {
        let used = std::mem::take(&mut self.used_images);
        self.new_images.extend(used);
    }
}

struct Shared {
    state: Mutex<ManagerState>,
    worker: Mutex<WorkerState>,
    wake: Condvar,
}

pub struct TextureManager {
    shared: Arc<Shared>,
    scanner: Arc<MediaScanner>,
    worker_handle: Option<thread::JoinHandle<()>>,
}

impl TextureManager {
    /// Spawns the decode worker and kicks off the initial media discovery.
    pub fn new(
        dispatcher: RenderDispatcher,
        scanner: MediaScanner,
        options: TextureManagerOptions,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(ManagerState {
                queue: TextureQueue::default(),
                pending: Vec::new(),
                fulfilled: Vec::new(),
                status: ManagerStatus::Loading,
                generation: 0,
                screen: options.screen,
                decode_dimensions: options.decode_dimensions,
                fix_aspect_ratio: options.fix_aspect_ratio,
                effects: EffectProvider::new(&options.effects),
                rng: StdRng::seed_from_u64(options.seed),
            }),
            worker: Mutex::new(WorkerState {
                new_images: Vec::new(),
                used_images: Vec::new(),
                empty: false,
                paused: false,
                shutdown: false,
                rng: StdRng::seed_from_u64(options.seed.wrapping_add(1)),
            }),
            wake: Condvar::new(),
        });

        let scanner = Arc::new(scanner);
        let worker_handle = {
            let shared = Arc::clone(&shared);
            let scanner = Arc::clone(&scanner);
            thread::Builder::new()
                .name("decode-worker".into())
                .spawn(move || worker_loop(shared, dispatcher, scanner))
                .ok()
        };
        if worker_handle.is_none() {
            warn!("failed to spawn the decode worker");
        }

        let manager = Self {
            shared,
            scanner,
            worker_handle,
        };
        manager.reload_media(false);
        manager
    }

    /// Pops the next ready texture for `requestor`, aspect-correcting it to
    /// the requestor's quad. With an empty queue the requestor is parked and
    /// the worker is woken; the texture arrives later via [`Self::take_fulfilled`].
    pub fn request(
        &self,
        requestor: Requestor,
        quad: Quad,
        store: &mut dyn TextureStore,
    ) -> Option<GpuTexture> {
        let result = {
            let mut state = self.shared.state.lock().unwrap();
            match state.queue.remove() {
                Ok(mut texture) => {
                    let screen = state.screen;
                    let fix = state.fix_aspect_ratio;
                    fix_aspect_ratio(screen, fix, &mut texture, quad, store);
                    texture.release_pixels();
                    Some(texture)
                }
                Err(QueueError::Empty) => {
                    let generation = state.generation;
                    state.pending.push(PendingRequest {
                        requestor,
                        quad,
                        generation,
                    });
                    None
                }
                Err(QueueError::Full) => unreachable!("remove never reports a full queue"),
            }
        };
        self.notify_worker();
        result
    }

    /// Removes a parked request. Idempotent.
    pub fn cancel_request(&self, requestor: Requestor) {
        let mut state = self.shared.state.lock().unwrap();
        state.pending.retain(|pending| pending.requestor != requestor);
    }

    /// Drains textures the decode worker resolved for parked requestors.
    /// Fulfillments from before the last [`Self::bump_generation`] belong to
    /// frames that no longer exist; their textures are deleted here.
    pub fn take_fulfilled(&self, store: &mut dyn TextureStore) -> Vec<(Requestor, GpuTexture)> {
        let mut state = self.shared.state.lock().unwrap();
        let generation = state.generation;
        let mut delivered = Vec::new();
        for fulfilled in state.fulfilled.drain(..) {
            if fulfilled.generation == generation {
                delivered.push((fulfilled.requestor, fulfilled.texture));
            } else {
                warn!(path = %fulfilled.texture.path.display(), "dropping stale texture fulfillment");
                store.delete(fulfilled.texture.id);
            }
        }
        delivered
    }

    /// Invalidates every parked request; called when the world is rebuilt.
    pub fn bump_generation(&self) {
        let mut state = self.shared.state.lock().unwrap();
        state.generation += 1;
        state.pending.clear();
    }

    /// Deletes every queued texture. With `reload` the worker pools are
    /// reset so the whole library becomes eligible again.
    pub fn empty_texture_queue(&self, reload: bool, store: &mut dyn TextureStore) {
        {
            let mut state = self.shared.state.lock().unwrap();
            for texture in state.queue.remove_all() {
                if store.contains(texture.id) {
                    store.delete(texture.id);
                } else {
                    warn!(path = %texture.path.display(), "queued texture was already deleted");
                }
            }
        }
        if reload {
            self.shared.worker.lock().unwrap().reset_pools();
            self.notify_worker();
        }
    }

    /// Starts a fresh media discovery on a background thread. Results feed
    /// back through the discovery observer.
    pub fn reload_media(&self, user_request: bool) {
        debug!(user_request, "reloading media library");
        spawn_discovery(
            Arc::clone(&self.shared),
            Arc::clone(&self.scanner),
            user_request,
        );
    }

    /// Pauses or resumes the decode worker without tearing it down.
    pub fn set_pause(&self, paused: bool) {
        let mut worker = self.shared.worker.lock().unwrap();
        worker.paused = paused;
        if !paused {
            self.shared.wake.notify_all();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.worker.lock().unwrap().paused
    }

    pub fn status(&self) -> ManagerStatus {
        self.shared.state.lock().unwrap().status
    }

    /// True when the last completed discovery found no pictures at all.
    pub fn is_empty(&self) -> bool {
        self.shared.worker.lock().unwrap().empty
    }

    pub fn queued(&self) -> usize {
        self.shared.state.lock().unwrap().queue.len()
    }

    pub fn set_screen_dimensions(&self, width: u32, height: u32) {
        self.shared.state.lock().unwrap().screen = (width, height);
    }

    pub fn set_decode_dimensions(&self, width: u32, height: u32) {
        self.shared.state.lock().unwrap().decode_dimensions = (width, height);
    }

    fn notify_worker(&self) {
        let _worker = self.shared.worker.lock().unwrap();
        self.shared.wake.notify_all();
    }
}

impl Drop for TextureManager {
    fn drop(&mut self) {
        {
            let mut worker = self.shared.worker.lock().unwrap();
            worker.shutdown = true;
            self.shared.wake.notify_all();
        }
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}

fn spawn_discovery(shared: Arc<Shared>, scanner: Arc<MediaScanner>, user_request: bool) {
    let spawned = thread::Builder::new().name("media-scan".into()).spawn(move || {
        let mut observer = DiscoveryObserver { shared: Arc::clone(&shared) };
        if let Err(err) = scanner.discover(&mut observer, user_request) {
            warn!(error = %err, "media discovery failed");
            shared.state.lock().unwrap().status = ManagerStatus::Error;
        }
    });
    if spawned.is_err() {
        warn!("failed to spawn the media discovery thread");
    }
}

/// Feeds discovery progress into the worker pools.
struct DiscoveryObserver {
    shared: Arc<Shared>,
}

impl MediaObserver for DiscoveryObserver {
    fn on_start_discovery(&mut self, _user_request: bool) {
        self.shared.state.lock().unwrap().status = ManagerStatus::Loading;
        let mut worker = self.shared.worker.lock().unwrap();
        worker.set_available(&[]);
        self.shared.wake.notify_all();
    }

    fn on_partial_result(&mut self, batch: &[PathBuf], _user_request: bool) {
        let mut worker = self.shared.worker.lock().unwrap();
        worker.add_partial(batch);
        self.shared.wake.notify_all();
    }

    fn on_end_discovery(&mut self, all: &[PathBuf], user_request: bool) {
        {
            let mut worker = self.shared.worker.lock().unwrap();
            worker.set_available(all);
            self.shared.wake.notify_all();
        }
        self.shared.state.lock().unwrap().status = ManagerStatus::Loaded;
        debug!(images = all.len(), "media library reloaded");
        if user_request {
            info!(images = all.len(), "media reload complete");
        }
    }
}

fn worker_loop(shared: Arc<Shared>, dispatcher: RenderDispatcher, scanner: Arc<MediaScanner>) {
    loop {
        loop {
            {
                let worker = shared.worker.lock().unwrap();
                if worker.shutdown {
                    return;
                }
                if worker.paused {
                    break;
                }
            }
            if shared.state.lock().unwrap().queue.is_full() {
                break;
            }

            let image = {
                let mut worker = shared.worker.lock().unwrap();
                if worker.new_images.is_empty() {
                    worker.reset_pools();
                }
                if worker.new_images.is_empty() {
                    if !worker.empty {
                        drop(worker);
                        spawn_discovery(Arc::clone(&shared), Arc::clone(&scanner), false);
                    }
                    break;
                }
                let len = worker.new_images.len();
                let pick = worker.rng.gen_range(0..len);
                worker.new_images.swap_remove(pick)
            };

            // One decode in flight: wait for the render thread to finish the
            // job before choosing the next picture.
            let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
            let job_shared = Arc::clone(&shared);
            let job_path = image.clone();
            dispatcher.dispatch(Box::new(move |store| {
                decode_and_publish(&job_shared, &job_path, store);
                let _ = done_tx.send(());
            }));
            if done_rx.recv().is_err() {
                // Render side is gone.
                return;
            }

            shared.worker.lock().unwrap().used_images.push(image);
        }

        let worker = shared.worker.lock().unwrap();
        if worker.shutdown {
            return;
        }
        let worker = shared.wake.wait(worker).unwrap();
        if worker.shutdown {
            return;
        }
    }
}

/// Runs on the render thread: decode, upload, then either serve a parked
/// requestor or queue the texture.
fn decode_and_publish(shared: &Shared, path: &Path, store: &mut dyn TextureStore) {
    let (effect, fix, decode_dimensions) = {
        let mut state = shared.state.lock().unwrap();
        let ManagerState { effects, rng, .. } = &mut *state;
        let effect = effects.next(rng);
        (effect, state.fix_aspect_ratio, state.decode_dimensions)
    };

    let mut image = match decode_image(path, decode_dimensions) {
        Ok(image) => image,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "skipping undecodable picture");
            return;
        }
    };
    // With aspect correction enabled the effect is deferred to the corrected
    // thumbnail; otherwise it is burned in now.
    if !fix {
        if let Some(effect) = effect {
            effect.apply(&mut image);
        }
    }

    let id = match store.upload(&image) {
        Ok(id) => id,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "texture upload failed");
            return;
        }
    };
    let mut texture = GpuTexture {
        id,
        path: path.to_path_buf(),
        width: image.width(),
        height: image.height(),
        pixels: Some(image),
        effect: if fix { effect } else { None },
    };

    let mut state = shared.state.lock().unwrap();
    if state.pending.is_empty() {
        if let Err((_, rejected)) = state.queue.insert(texture) {
            warn!(path = %rejected.path.display(), "texture queue filled up mid-decode, dropping");
            store.delete(rejected.id);
        }
    } else {
        let pending = state.pending.remove(0);
        let screen = state.screen;
        fix_aspect_ratio(screen, state.fix_aspect_ratio, &mut texture, pending.quad, store);
        texture.release_pixels();
        state.fulfilled.push(Fulfilled {
            requestor: pending.requestor,
            texture,
            generation: pending.generation,
        });
    }
}

fn decode_image(path: &Path, max: (u32, u32)) -> anyhow::Result<RgbaImage> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode '{}'", path.display()))?;
    let image = if image.width() > max.0 || image.height() > max.1 {
        image.thumbnail(max.0, max.1)
    } else {
        image
    };
    Ok(image.into_rgba8())
}

/// Re-cuts the texture to the exact pixel size of the requestor's quad: the
/// quad's NDC span is mapped to screen pixels, the retained pixel buffer is
/// center-cropped to that size, uploaded, and the oversized original deleted.
fn fix_aspect_ratio(
    screen: (u32, u32),
    enabled: bool,
    texture: &mut GpuTexture,
    quad: Quad,
    store: &mut dyn TextureStore,
) {
    if !enabled {
        return;
    }
    let Some(pixels) = texture.pixels.take() else {
        return;
    };
    let target_w = (screen.0 as f32 * quad.width() / 2.0) as u32;
    let target_h = (screen.1 as f32 * quad.height() / 2.0) as u32;
    if target_w == 0 || target_h == 0 {
        return;
    }

    let mut thumb = center_crop_thumbnail(&pixels, target_w, target_h);
    if let Some(effect) = texture.effect.take() {
        effect.apply(&mut thumb);
    }
    match store.upload(&thumb) {
        Ok(new_id) => {
            store.delete(texture.id);
            texture.id = new_id;
            texture.width = thumb.width();
            texture.height = thumb.height();
        }
        Err(err) => {
            warn!(path = %texture.path.display(), error = %err,
                "aspect correction upload failed, keeping original texture");
        }
    }
}

/// Scales the source to cover `w` x `h` and crops the overflow evenly.
fn center_crop_thumbnail(source: &RgbaImage, w: u32, h: u32) -> RgbaImage {
    let scale = f32::max(
        w as f32 / source.width() as f32,
        h as f32 / source.height() as f32,
    );
    let scaled_w = ((source.width() as f32 * scale).ceil() as u32).max(w);
    let scaled_h = ((source.height() as f32 * scale).ceil() as u32).max(h);
    let resized = image::imageops::resize(source, scaled_w, scaled_h, FilterType::Triangle);
    let x = (resized.width() - w) / 2;
    let y = (resized.height() - h) / 2;
    image::imageops::crop_imm(&resized, x, y, w, h).to_image()
}
