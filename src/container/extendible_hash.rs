use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::hash::Hash;
use std::sync::Mutex;

struct Bucket<K, V> {
    /// Number of low hash bits shared by every key in this bucket.
    depth: usize,
    items: Vec<(K, V)>,
}

impl<K, V> Bucket<K, V> {
    fn new(depth: usize, size: usize) -> Self {
        Bucket { depth, items: Vec::with_capacity(size) }
    }
}

/// Directory state: a slot vector of `2^global_depth` indices into a bucket
/// arena. Multiple slots reference the same bucket while its local depth is
/// below the global depth; buckets are never freed.
struct Directory<K, V> {
    global_depth: usize,
    bucket_size: usize,
    dir: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
}

impl<K, V> Directory<K, V> {
    fn slot_of(&self, hash: usize) -> usize {
        hash & ((1 << self.global_depth) - 1)
    }
}

/// ExtendibleHashTable implements a dynamically growing hash table with
/// amortized O(1) point operations.
///
/// The directory doubles when a full bucket at maximum local depth must
/// split; otherwise a split only redistributes the one bucket and rewires
/// the slots referencing it. The directory never shrinks and buckets never
/// coalesce.
///
/// The hasher is a type parameter so tests can pin hash values; the default
/// is the standard `RandomState`. All operations take `&self`, the table
/// carries its own mutex.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    inner: Mutex<Directory<K, V>>,
    hasher: S,
}

impl<K, V> ExtendibleHashTable<K, V, RandomState>
where
    K: Hash + Eq,
    V: Clone,
{
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq,
    V: Clone,
    S: BuildHasher,
{
    pub fn with_hasher(bucket_size: usize, hasher: S) -> Self {
        assert!(bucket_size > 0, "bucket size should be larger than zero");
        let inner = Directory {
            global_depth: 0,
            bucket_size,
            dir: vec![0],
            buckets: vec![Bucket::new(0, bucket_size)],
        };
        ExtendibleHashTable { inner: Mutex::new(inner), hasher }
    }

    fn hash(&self, key: &K) -> usize {
        self.hasher.hash_one(key) as usize
    }

    /// Look up a key, returning the value of the most recent insert.
    pub fn find(&self, key: &K) -> Option<V> {
        let hash = self.hash(key);
        let inner = self.inner.lock().unwrap();
        let bi = inner.dir[inner.slot_of(hash)];
        inner.buckets[bi].items.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    /// Insert a key/value pair, overwriting the value if the key is present.
    /// A full bucket splits, doubling the directory when the bucket already
    /// uses every addressed bit; one insert may cascade several splits when
    /// the redistributed entries keep colliding.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hash(&key);
        let mut inner = self.inner.lock().unwrap();
        loop {
            let bi = inner.dir[inner.slot_of(hash)];
            let bucket_size = inner.bucket_size;
            let bucket = &mut inner.buckets[bi];
            if let Some(entry) = bucket.items.iter_mut().find(|(k, _)| *k == key) {
                entry.1 = value;
                return;
            }
            if bucket.items.len() < bucket_size {
                bucket.items.push((key, value));
                return;
            }
            self.split(&mut inner, bi);
        }
    }

    /// Remove a key, returning whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash(key);
        let mut inner = self.inner.lock().unwrap();
        let bi = inner.dir[inner.slot_of(hash)];
        let bucket = &mut inner.buckets[bi];
        match bucket.items.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                bucket.items.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Split the full bucket `bi` in two, raising its local depth. Entries
    /// are redistributed by the newly-addressed hash bit and every directory
    /// slot referencing the old bucket is rewired by that bit.
    fn split(&self, inner: &mut Directory<K, V>, bi: usize) {
        let local_depth = inner.buckets[bi].depth;
        if local_depth == inner.global_depth {
            // double the directory; each new slot mirrors its low-bits twin
            let n = inner.dir.len();
            inner.dir.extend_from_within(0..n);
            inner.global_depth += 1;
        }

        let local_mask = 1usize << local_depth;
        let new_depth = local_depth + 1;
        let items = std::mem::take(&mut inner.buckets[bi].items);
        inner.buckets[bi].depth = new_depth;
        let b1 = inner.buckets.len();
        inner.buckets.push(Bucket::new(new_depth, inner.bucket_size));

        for (k, v) in items {
            let target = if self.hash(&k) & local_mask != 0 { b1 } else { bi };
            inner.buckets[target].items.push((k, v));
        }

        for i in 0..inner.dir.len() {
            if inner.dir[i] == bi && i & local_mask != 0 {
                inner.dir[i] = b1;
            }
        }
    }

    pub fn global_depth(&self) -> usize {
        self.inner.lock().unwrap().global_depth
    }

    pub fn local_depth(&self, dir_index: usize) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.buckets[inner.dir[dir_index]].depth
    }

    pub fn num_buckets(&self) -> usize {
        self.inner.lock().unwrap().buckets.len()
    }

    /// Total number of stored entries.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.buckets.iter().map(|b| b.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
