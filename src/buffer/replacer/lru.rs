//! Age-counter LRU replacement policy.
//!
//! Each frame carries an age. Touching a frame resets its age to zero and
//! increments the age of every other frame, so the largest age marks the
//! least recently used frame. This is O(pool size) per access, which is fine
//! for the small pools an index workload runs with.

use crate::common::FrameId;

/// LRU eviction policy over a fixed number of frames.
///
/// Only frames marked evictable (bound and unpinned) are victim candidates.
pub struct LruReplacer {
    /// Per-frame age; larger means less recently used.
    ages: Vec<u64>,

    /// Frames that may currently be evicted.
    evictable: Vec<bool>,
}

impl LruReplacer {
    /// Create a replacer tracking `capacity` frames, all non-evictable.
    pub fn new(capacity: usize) -> Self {
        Self {
            ages: vec![0; capacity],
            evictable: vec![false; capacity],
        }
    }

    /// Record that a frame was read or allocated.
    pub fn record_access(&mut self, frame_id: FrameId) {
        for (i, age) in self.ages.iter_mut().enumerate() {
            if i == frame_id.0 {
                *age = 0;
            } else {
                *age = age.saturating_add(1);
            }
        }
    }

    /// Mark a frame as evictable (pin count dropped to 0) or not.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        self.evictable[frame_id.0] = evictable;
    }

    /// Select the evictable frame with the largest age.
    ///
    /// Returns `None` if no frame is evictable.
    pub fn evict(&mut self) -> Option<FrameId> {
        self.evict_where(|_| true)
    }

    /// Select the evictable frame with the largest age among those accepted
    /// by `eligible`. Ties go to the lowest frame index.
    ///
    /// The chosen frame stops being evictable; the caller re-binds it.
    pub fn evict_where<F>(&mut self, eligible: F) -> Option<FrameId>
    where
        F: Fn(FrameId) -> bool,
    {
        let mut victim: Option<(FrameId, u64)> = None;
        for (i, (&age, &evictable)) in self.ages.iter().zip(&self.evictable).enumerate() {
            let frame_id = FrameId::new(i);
            if !evictable || !eligible(frame_id) {
                continue;
            }
            if victim.map_or(true, |(_, best)| age > best) {
                victim = Some((frame_id, age));
            }
        }

        let (frame_id, _) = victim?;
        self.evictable[frame_id.0] = false;
        Some(frame_id)
    }

    /// Forget a frame that was unbound without eviction.
    pub fn remove(&mut self, frame_id: FrameId) {
        self.evictable[frame_id.0] = false;
        self.ages[frame_id.0] = 0;
    }

    /// Current age of a frame.
    pub fn age(&self, frame_id: FrameId) -> u64 {
        self.ages[frame_id.0]
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable.iter().filter(|&&e| e).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_all(replacer: &mut LruReplacer, ids: &[usize]) {
        for &id in ids {
            replacer.record_access(FrameId::new(id));
            replacer.set_evictable(FrameId::new(id), true);
        }
    }

    #[test]
    fn test_lru_ages() {
        let mut replacer = LruReplacer::new(3);
        touch_all(&mut replacer, &[0, 1, 2]);

        assert_eq!(replacer.age(FrameId::new(0)), 2);
        assert_eq!(replacer.age(FrameId::new(1)), 1);
        assert_eq!(replacer.age(FrameId::new(2)), 0);
    }

    #[test]
    fn test_lru_evicts_oldest() {
        let mut replacer = LruReplacer::new(3);
        touch_all(&mut replacer, &[0, 1, 2]);
        assert_eq!(replacer.size(), 3);

        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_reaccess_reorders() {
        let mut replacer = LruReplacer::new(3);
        touch_all(&mut replacer, &[0, 1, 2]);

        // Touching frame 0 again makes frame 1 the oldest
        replacer.record_access(FrameId::new(0));

        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_skips_pinned() {
        let mut replacer = LruReplacer::new(3);
        touch_all(&mut replacer, &[0, 1, 2]);

        replacer.set_evictable(FrameId::new(0), false);

        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
    }

    #[test]
    fn test_lru_evict_where_respects_filter() {
        let mut replacer = LruReplacer::new(4);
        touch_all(&mut replacer, &[0, 1, 2, 3]);

        let victim = replacer.evict_where(|fid| fid.0 % 2 == 1);
        assert_eq!(victim, Some(FrameId::new(1)));

        assert_eq!(replacer.evict_where(|_| false), None);
    }

    #[test]
    fn test_lru_remove() {
        let mut replacer = LruReplacer::new(2);
        touch_all(&mut replacer, &[0, 1]);

        replacer.remove(FrameId::new(0));

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), None);
    }
}
