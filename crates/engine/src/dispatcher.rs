//! Hand-off of GPU work to the render thread. Background threads never touch
//! the device; they box a closure, send it through the channel, and the
//! render thread drains the queue at the top of every frame. The wake
//! callback nudges the platform event loop out of its wait state so a job
//! dispatched while idle still runs promptly.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::trace;

use crate::texture::TextureStore;

/// A unit of work executed on the render thread with store access.
pub type RenderJob = Box<dyn FnOnce(&mut dyn TextureStore) + Send>;

/// Cloneable producer half, handed to the decode worker and anything else
/// that needs the render thread.
#[derive(Clone)]
pub struct RenderDispatcher {
    sender: Sender<RenderJob>,
    waker: Arc<dyn Fn() + Send + Sync>,
}

impl RenderDispatcher {
    pub fn dispatch(&self, job: RenderJob) {
        if self.sender.send(job).is_ok() {
            (self.waker)();
        }
    }
}

/// Consumer half, owned by the render thread.
pub struct RenderJobQueue {
    receiver: Receiver<RenderJob>,
}

impl RenderJobQueue {
    /// Runs every queued job. Called once per frame before drawing.
    pub fn run_pending(&self, store: &mut dyn TextureStore) -> usize {
        let mut executed = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job(store);
            executed += 1;
        }
        if executed > 0 {
            trace!(jobs = executed, "ran render jobs");
        }
        executed
    }
}

/// Creates the dispatcher pair. `waker` is invoked after each dispatch; the
/// daemon wires it to the event-loop proxy, tests pass a no-op.
pub fn render_channel(waker: Arc<dyn Fn() + Send + Sync>) -> (RenderDispatcher, RenderJobQueue) {
    let (sender, receiver) = unbounded();
    (RenderDispatcher { sender, waker }, RenderJobQueue { receiver })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryTextureStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn jobs_run_in_dispatch_order() {
        let (dispatcher, queue) = render_channel(Arc::new(|| {}));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            dispatcher.dispatch(Box::new(move |_store| {
                order.lock().unwrap().push(i);
            }));
        }

        let mut store = MemoryTextureStore::default();
        assert_eq!(queue.run_pending(&mut store), 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(queue.run_pending(&mut store), 0);
    }

    #[test]
    fn dispatch_invokes_the_waker() {
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        let (dispatcher, _queue) = render_channel(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        dispatcher.dispatch(Box::new(|_| {}));
        dispatcher.dispatch(Box::new(|_| {}));
        assert_eq!(wakes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn jobs_cross_threads() {
        let (dispatcher, queue) = render_channel(Arc::new(|| {}));
        let handle = std::thread::spawn(move || {
            dispatcher.dispatch(Box::new(|store| {
                let image = image::RgbaImage::new(2, 2);
                store.upload(&image).unwrap();
            }));
        });
        handle.join().unwrap();

        let mut store = MemoryTextureStore::default();
        assert_eq!(queue.run_pending(&mut store), 1);
        assert_eq!(store.live_textures(), 1);
    }
}
