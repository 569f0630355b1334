//! Fixed-capacity FIFO of ready-to-use textures. The texture manager keeps
//! it topped up from the decode worker and pops from it on every request;
//! all access is serialized by the manager's lock.

use std::collections::VecDeque;

use crate::texture::GpuTexture;

/// How many decoded textures are kept ahead of demand.
pub const TEXTURE_QUEUE_CAPACITY: usize = 8;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("texture queue is full")]
    Full,
    #[error("texture queue is empty")]
    Empty,
}

#[derive(Debug)]
pub struct TextureQueue {
    items: VecDeque<GpuTexture>,
    capacity: usize,
}

impl TextureQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn insert(&mut self, texture: GpuTexture) -> Result<(), (QueueError, GpuTexture)> {
        if self.items.len() >= self.capacity {
            return Err((QueueError::Full, texture));
        }
        self.items.push_back(texture);
        Ok(())
    }

    /// Pops the oldest texture.
    pub fn remove(&mut self) -> Result<GpuTexture, QueueError> {
        self.items.pop_front().ok_or(QueueError::Empty)
    }

    /// Drains every queued texture; an empty queue yields an empty vec.
    pub fn remove_all(&mut self) -> Vec<GpuTexture> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TextureQueue {
    fn default() -> Self {
        Self::new(TEXTURE_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::TextureId;

    fn texture(id: u32) -> GpuTexture {
        GpuTexture {
            id: TextureId(id),
            path: format!("/photos/{id}.jpg").into(),
            width: 4,
            height: 4,
            pixels: None,
            effect: None,
        }
    }

    #[test]
    fn pops_in_insertion_order() {
        let mut queue = TextureQueue::new(3);
        queue.insert(texture(1)).unwrap();
        queue.insert(texture(2)).unwrap();
        assert_eq!(queue.remove().unwrap().id, TextureId(1));
        assert_eq!(queue.remove().unwrap().id, TextureId(2));
        assert_eq!(queue.remove().unwrap_err(), QueueError::Empty);
    }

    #[test]
    fn rejects_inserts_beyond_capacity() {
        let mut queue = TextureQueue::new(2);
        queue.insert(texture(1)).unwrap();
        queue.insert(texture(2)).unwrap();
        assert!(queue.is_full());
        let (err, rejected) = queue.insert(texture(3)).unwrap_err();
        assert_eq!(err, QueueError::Full);
        assert_eq!(rejected.id, TextureId(3));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn remove_all_drains_infallibly() {
        let mut queue = TextureQueue::default();
        assert_eq!(queue.capacity(), TEXTURE_QUEUE_CAPACITY);
        assert!(queue.remove_all().is_empty());
        queue.insert(texture(1)).unwrap();
        queue.insert(texture(2)).unwrap();
        let drained = queue.remove_all();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }
}
