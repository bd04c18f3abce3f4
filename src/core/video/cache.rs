use super::frame::Frame;
use crate::config::DEFAULT_FRAME_CACHE_SIZE;
use log::debug;
use std::collections::VecDeque;

/// 解码帧 LRU 缓存
///
/// Entries are kept in recency order, oldest at the front. Both `get` and
/// `put` hand out / store copies so callers never alias the cached buffer.
///
/// Not synchronized: share across threads only behind a lock, or give each
/// worker its own cache.
pub struct FrameCache {
    entries: VecDeque<(usize, Frame)>,
    max_size: usize,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FRAME_CACHE_SIZE)
    }

    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    /// Copy of the cached frame; promotes it to most-recently-used.
    pub fn get(&mut self, index: usize) -> Option<Frame> {
        let pos = self.position(index)?;
        let entry = self.entries.remove(pos)?;
        let frame = entry.1.clone();
        self.entries.push_back(entry);
        Some(frame)
    }

    pub fn put(&mut self, index: usize, frame: &Frame) {
        if let Some(pos) = self.position(index) {
            self.entries.remove(pos);
        }
        self.entries.push_back((index, frame.clone()));

        while self.entries.len() > self.max_size {
            if let Some((evicted, _)) = self.entries.pop_front() {
                debug!("FrameCache: evicted frame {}", evicted);
            }
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.position(index).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    fn position(&self, index: usize) -> Option<usize> {
        self.entries.iter().position(|(i, _)| *i == index)
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_frame(fill: u8, frame_number: u64) -> Frame {
        let mut frame = Frame::filled(4, 4, [fill, fill, fill]);
        frame.frame_number = frame_number;
        frame
    }

    #[test]
    fn test_lru_order_respected() {
        let mut cache = FrameCache::with_capacity(2);
        cache.put(0, &create_test_frame(0, 0));
        cache.put(1, &create_test_frame(1, 1));
        assert!(cache.get(0).is_some());
        cache.put(2, &create_test_frame(2, 2));

        assert!(cache.get(1).is_none());
        assert!(cache.get(0).is_some());
        assert!(cache.get(2).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_get_returns_independent_copy() {
        let mut cache = FrameCache::new();
        cache.put(7, &create_test_frame(50, 7));

        let mut first = cache.get(7).unwrap();
        first.data[0] = 255;

        let second = cache.get(7).unwrap();
        assert_eq!(second.data[0], 50);
    }

    #[test]
    fn test_put_stores_copy_and_replaces() {
        let mut cache = FrameCache::with_capacity(3);
        let mut frame = create_test_frame(10, 1);
        cache.put(1, &frame);
        frame.data[0] = 99;
        assert_eq!(cache.get(1).unwrap().data[0], 10);

        cache.put(1, &frame);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(1).unwrap().data[0], 99);
    }

    #[test]
    fn test_clear() {
        let mut cache = FrameCache::new();
        cache.put(0, &create_test_frame(0, 0));
        cache.put(1, &create_test_frame(1, 1));
        assert_eq!(cache.capacity(), 100);

        cache.clear();

        assert!(cache.is_empty());
        assert!(!cache.contains(0));
    }
}
