use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::page::FrameId;

/// Replacer tracks page usage for replacement in case the buffer pool is
/// full.
pub trait Replacer: Send + Sync {
    /// Record the event that the given frame id is accessed at the current
    /// timestamp. Create a new entry for the access history if the frame id
    /// has not been seen before.
    ///
    /// Panics if the frame id is outside `[0, pool_size)`; passing one is a
    /// caller bug.
    fn record_access(&self, frame_id: FrameId);

    /// Find the frame to evict by the replacement policy (backward
    /// k-distance). Only frames that are marked as evictable are candidates
    /// for eviction.
    ///
    /// Successful eviction of a frame decrements the size of the replacer
    /// and removes the frame's access history.
    ///
    /// Return the frame id if a frame is evicted successfully, None if no
    /// frame can be evicted.
    fn evict(&self) -> Option<FrameId>;

    /// Toggle whether a frame is evictable or non-evictable. This function
    /// also controls the replacer size: a frame moving from evictable to
    /// non-evictable decrements it, the opposite transition increments it,
    /// and a call matching the current state changes nothing.
    ///
    /// Panics if the frame id is outside `[0, pool_size)`.
    fn set_evictable(&self, frame_id: FrameId, evictable: bool);

    /// Check if a frame is evictable. If the frame is not found, return
    /// true.
    fn is_evictable(&self, frame_id: FrameId) -> bool;

    /// Remove an evictable frame from the replacer, along with its access
    /// history, decrementing the replacer size. Unlike evict this ignores
    /// the replacement policy and removes the specified frame, whatever its
    /// backward k-distance.
    ///
    /// Panics when called on a non-evictable frame; silently returns when
    /// the frame has no recorded accesses.
    fn remove(&self, frame_id: FrameId);

    /// Number of frames currently evictable. Note this is not the number of
    /// tracked frames.
    fn size(&self) -> usize;
}

struct LRUKNode {
    /// Last up-to-k access timestamps, least recent in front. Once the frame
    /// has k or more accesses the front is the k-th most recent access.
    history: VecDeque<usize>,
    /// Accesses recorded since the frame was (re)admitted.
    count: usize,
    is_evictable: bool,
    /// Timestamp of the k-th most recent access; meaningful once
    /// `count >= k` and the frame sits in the cache list.
    kth: usize,
}

impl LRUKNode {
    fn new(k: usize) -> Self {
        LRUKNode { history: VecDeque::with_capacity(k), count: 0, is_evictable: false, kth: 0 }
    }

    fn record(&mut self, timestamp: usize, k: usize) {
        if self.history.len() == k {
            self.history.pop_front();
        }
        self.history.push_back(timestamp);
        self.count += 1;
    }
}

/// LRUKReplacer implements the LRU-k replacement policy.
///
/// The LRU-k algorithm evicts the frame whose backward k-distance is the
/// maximum over all frames, where backward k-distance is the time between
/// now and the k-th most recent access. A frame with fewer than k recorded
/// accesses has infinite backward k-distance; among those, the classic FIFO
/// rule applies (evict the frame first seen the longest ago).
///
/// Frames live in one of two orderings. The history list holds frames with
/// fewer than k accesses, newest first access at the front, so eviction
/// scans it from the back. The cache list holds frames with k or more
/// accesses, kept sorted ascending by k-th most recent access timestamp;
/// each re-access repositions the frame by binary search.
pub struct LRUKReplacer {
    nodes: HashMap<FrameId, LRUKNode>,
    /// Frames with fewer than k accesses; eviction order is back to front.
    history_list: VecDeque<FrameId>,
    /// Frames with at least k accesses, sorted by k-th timestamp ascending.
    cache_list: Vec<(usize, FrameId)>,
    current_timestamp: usize,
    curr_evictable: usize,
    replacer_size: usize,
    k: usize,
}

impl LRUKReplacer {
    pub fn new(k: usize, size: usize) -> Self {
        assert!(k > 0, "replacer k should be larger than zero");
        LRUKReplacer {
            nodes: HashMap::new(),
            history_list: VecDeque::new(),
            cache_list: Vec::new(),
            current_timestamp: 0,
            curr_evictable: 0,
            replacer_size: size,
            k,
        }
    }

    fn record_access(&mut self, frame_id: FrameId) {
        if frame_id >= self.replacer_size {
            panic!("invalid frame id {}", frame_id);
        }
        self.current_timestamp += 1;
        let timestamp = self.current_timestamp;

        let k = self.k;
        let node = self.nodes.entry(frame_id).or_insert_with(|| LRUKNode::new(k));
        node.record(timestamp, k);

        if node.count < k {
            if node.count == 1 {
                self.history_list.push_front(frame_id);
            }
            // later sub-k accesses leave the position alone: the history
            // list orders by first access, not last
        } else if node.count == k {
            // the frame graduates from the history list to the cache list.
            // history is capped at k entries, so its front is now the k-th
            // most recent access.
            node.kth = *node.history.front().unwrap();
            let key = (node.kth, frame_id);
            if let Some(pos) = self.history_list.iter().position(|&f| f == frame_id) {
                self.history_list.remove(pos);
            }
            let pos = match self.cache_list.binary_search(&key) {
                Ok(pos) | Err(pos) => pos,
            };
            self.cache_list.insert(pos, key);
        } else {
            // reposition within the cache list under the new k-th timestamp
            let old = (node.kth, frame_id);
            node.kth = *node.history.front().unwrap();
            let new = (node.kth, frame_id);
            if let Ok(pos) = self.cache_list.binary_search(&old) {
                self.cache_list.remove(pos);
            }
            let pos = match self.cache_list.binary_search(&new) {
                Ok(pos) | Err(pos) => pos,
            };
            self.cache_list.insert(pos, new);
        }
    }

    fn evict(&mut self) -> Option<FrameId> {
        // frames with infinite backward k-distance go first, FIFO by first
        // access: the oldest first access sits at the back
        for idx in (0..self.history_list.len()).rev() {
            let frame_id = self.history_list[idx];
            if self.nodes.get(&frame_id).map_or(false, |n| n.is_evictable) {
                self.history_list.remove(idx);
                self.nodes.remove(&frame_id);
                self.curr_evictable -= 1;
                return Some(frame_id);
            }
        }

        // then the smallest k-th timestamp, i.e. the largest k-distance
        for idx in 0..self.cache_list.len() {
            let (_, frame_id) = self.cache_list[idx];
            if self.nodes.get(&frame_id).map_or(false, |n| n.is_evictable) {
                self.cache_list.remove(idx);
                self.nodes.remove(&frame_id);
                self.curr_evictable -= 1;
                return Some(frame_id);
            }
        }

        None
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if frame_id >= self.replacer_size {
            panic!("invalid frame id {}", frame_id);
        }
        let node = match self.nodes.get_mut(&frame_id) {
            Some(node) => node,
            None => return,
        };
        if node.is_evictable == evictable {
            return;
        }
        node.is_evictable = evictable;
        if evictable {
            self.curr_evictable += 1;
        } else {
            self.curr_evictable -= 1;
        }
    }

    fn is_evictable(&self, frame_id: FrameId) -> bool {
        match self.nodes.get(&frame_id) {
            Some(node) => node.is_evictable,
            None => true,
        }
    }

    fn remove(&mut self, frame_id: FrameId) {
        let node = match self.nodes.get(&frame_id) {
            Some(node) => node,
            None => return,
        };
        if !node.is_evictable {
            panic!("can't remove non-evictable frame {}", frame_id);
        }
        if node.count < self.k {
            if let Some(pos) = self.history_list.iter().position(|&f| f == frame_id) {
                self.history_list.remove(pos);
            }
        } else if let Ok(pos) = self.cache_list.binary_search(&(node.kth, frame_id)) {
            self.cache_list.remove(pos);
        }
        self.nodes.remove(&frame_id);
        self.curr_evictable -= 1;
    }

    fn size(&self) -> usize {
        self.curr_evictable
    }
}

/// SyncLRUKReplacer is the thread-safe version of the LRU-k replacement
/// policy; all the heavy lifting happens in the LRUKReplacer.
pub struct SyncLRUKReplacer {
    inner: Mutex<LRUKReplacer>,
}

impl SyncLRUKReplacer {
    pub fn new(k: usize, size: usize) -> Self {
        let inner = Mutex::new(LRUKReplacer::new(k, size));
        SyncLRUKReplacer { inner }
    }
}

impl Replacer for SyncLRUKReplacer {
    fn record_access(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().unwrap();
        guard.record_access(frame_id)
    }

    fn evict(&self) -> Option<FrameId> {
        let mut guard = self.inner.lock().unwrap();
        guard.evict()
    }

    fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut guard = self.inner.lock().unwrap();
        guard.set_evictable(frame_id, evictable)
    }

    fn is_evictable(&self, frame_id: FrameId) -> bool {
        let guard = self.inner.lock().unwrap();
        guard.is_evictable(frame_id)
    }

    fn remove(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock().unwrap();
        guard.remove(frame_id)
    }

    fn size(&self) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.size()
    }
}
