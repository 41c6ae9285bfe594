//! Bounded cache of decoded segments.
//!
//! Segments are located by floor lookup on their first key and decoded on
//! first use. When the cache is full, the most used half survives and the rest
//! is dropped; usage counts outlive eviction, so a segment that was popular
//! before keeps its rank when it is loaded again.

use crate::Result;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Decodes the segment stored in `file_name`, whose first key is `first_key`.
pub trait SegmentLoader<K, S> {
    fn load(&self, first_key: &K, file_name: &str) -> Result<S>;
}

impl<K, S, F> SegmentLoader<K, S> for F
where
    F: Fn(&K, &str) -> Result<S>,
{
    fn load(&self, first_key: &K, file_name: &str) -> Result<S> {
        self(first_key, file_name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct SegmentCache<K, S, L> {
    files: BTreeMap<K, String>,
    loaded: BTreeMap<K, Arc<S>>,
    usage: BTreeMap<K, u64>,
    capacity: usize,
    loader: L,
    stats: CacheStats,
}

impl<K, S, L> SegmentCache<K, S, L>
where
    K: Ord + Clone + Debug,
    L: SegmentLoader<K, S>,
{
    /// `files` maps each segment's first key to its file name.
    pub fn new(files: BTreeMap<K, String>, capacity: usize, loader: L) -> Self {
        Self { files, loaded: BTreeMap::new(), usage: BTreeMap::new(), capacity: capacity.max(1), loader, stats: CacheStats::default() }
    }

    /// The segment whose key range covers `key`, or `None` if `key` sorts before every segment.
    pub fn get(&mut self, key: &K) -> Result<Option<Arc<S>>> {
        let Some((first_key, file_name)) = self.files.range(..=key).next_back() else {
            return Ok(None);
        };
        if let Some(segment) = self.loaded.get(first_key) {
            *self.usage.entry(first_key.clone()).or_insert(0) += 1;
            self.stats.hits += 1;
            return Ok(Some(Arc::clone(segment)));
        }

        let first_key = first_key.clone();
        let file_name = file_name.clone();
        self.stats.misses += 1;
        if self.loaded.len() >= self.capacity {
            self.evict();
        }
        let segment = Arc::new(self.loader.load(&first_key, &file_name)?);
        tracing::debug!(file = file_name.as_str(), ?first_key, loaded = self.loaded.len() + 1, "loaded segment");
        self.loaded.insert(first_key.clone(), Arc::clone(&segment));
        *self.usage.entry(first_key).or_insert(0) += 1;
        Ok(Some(segment))
    }

    /// Keeps the most used half of the loaded segments.
    fn evict(&mut self) {
        let mut ranked: Vec<(K, u64)> =
            self.loaded.keys().map(|k| (k.clone(), self.usage.get(k).copied().unwrap_or(0))).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        let keep = self.capacity / 2;
        for (key, _) in ranked.into_iter().skip(keep) {
            self.loaded.remove(&key);
            self.stats.evictions += 1;
        }
        tracing::debug!(kept = self.loaded.len(), capacity = self.capacity, "evicted segments");
    }

    pub fn is_loaded(&self, first_key: &K) -> bool {
        self.loaded.contains_key(first_key)
    }

    pub fn loaded_len(&self) -> usize {
        self.loaded.len()
    }

    pub fn usage(&self, first_key: &K) -> u64 {
        self.usage.get(first_key).copied().unwrap_or(0)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    type Loader = Box<dyn Fn(&u32, &str) -> Result<String>>;

    fn cache(segments: u32, capacity: usize) -> (SegmentCache<u32, String, Loader>, Rc<Cell<usize>>) {
        let files = (0..segments).map(|i| (i * 10, format!("seg-{i}"))).collect();
        let loads = Rc::new(Cell::new(0));
        let counter = Rc::clone(&loads);
        let loader: Loader = Box::new(move |_k: &u32, name: &str| {
            counter.set(counter.get() + 1);
            Ok(name.to_string())
        });
        (SegmentCache::new(files, capacity, loader), loads)
    }

    #[test]
    fn floor_lookup_picks_the_earlier_segment() {
        let (mut c, _) = cache(3, 4);
        assert_eq!(c.get(&15).unwrap().unwrap().as_str(), "seg-1");
        assert_eq!(c.get(&20).unwrap().unwrap().as_str(), "seg-2");
        assert_eq!(c.get(&99).unwrap().unwrap().as_str(), "seg-2");
    }

    #[test]
    fn keys_before_the_first_segment_have_no_owner() {
        let files = BTreeMap::from([(5u32, "seg".to_string())]);
        let mut c = SegmentCache::new(files, 1, |_: &u32, n: &str| -> Result<String> { Ok(n.to_string()) });
        assert!(c.get(&4).unwrap().is_none());
    }

    #[test]
    fn hits_do_not_reload() {
        let (mut c, loads) = cache(2, 2);
        c.get(&1).unwrap();
        c.get(&2).unwrap();
        c.get(&3).unwrap();
        assert_eq!(loads.get(), 1);
        assert_eq!(c.usage(&0), 3);
        assert_eq!(c.stats(), CacheStats { hits: 2, misses: 1, evictions: 0 });
    }

    #[test]
    fn overflow_keeps_the_most_used_half() {
        let capacity = 4;
        let (mut c, _) = cache(5, capacity);
        for (key, uses) in [(0u32, 5), (10, 1), (20, 4), (30, 2)] {
            for _ in 0..uses {
                c.get(&key).unwrap();
            }
        }
        assert_eq!(c.loaded_len(), capacity);
        c.get(&40).unwrap();
        assert!(c.loaded_len() <= capacity.div_ceil(2) + 1);
        assert!(c.is_loaded(&0));
        assert!(c.is_loaded(&20));
        assert!(c.is_loaded(&40));
        assert!(!c.is_loaded(&10));
        assert!(!c.is_loaded(&30));
        assert_eq!(c.stats().evictions, 2);
    }

    #[test]
    fn usage_survives_eviction() {
        let (mut c, loads) = cache(3, 2);
        for _ in 0..3 {
            c.get(&10).unwrap();
        }
        c.get(&0).unwrap();
        c.get(&20).unwrap(); // evicts 0, keeps 10
        assert!(c.is_loaded(&10));
        assert!(!c.is_loaded(&0));
        c.get(&0).unwrap();
        assert_eq!(c.usage(&0), 2);
        assert_eq!(loads.get(), 4);
    }

    #[test]
    fn capacity_one_still_serves() {
        let (mut c, _) = cache(3, 1);
        for key in [0u32, 10, 20, 0] {
            assert!(c.get(&key).unwrap().is_some());
            assert_eq!(c.loaded_len(), 1);
        }
    }
}
