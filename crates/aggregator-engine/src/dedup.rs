//! DedupStore (C3). Spec.md §3/§4.3.
//!
//! Sharded by fingerprint (SPEC_FULL.md §3 "DedupStore sharding" — spec.md
//! §5 permits either a single lock or sharding; sharding bounds contention
//! under the pack's "low expected contention" assumption without a single
//! global mutex, mirroring the sharded concurrent-map idiom `dashmap` and
//! the teacher's region-scoped `EmbeddingCache`). Each shard owns an LRU
//! list (via `lru::LruCache`, which evicts the tail automatically once a
//! `put` exceeds capacity — spec.md §4.3 `evict()`) plus a time-bucketed
//! index so `sweep` is O(bucket) instead of O(n).

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use aggregator_common::types::Fingerprint;
use lru::LruCache;

const NUM_SHARDS: usize = 16;

#[derive(Debug, Clone)]
pub struct DedupEntry {
    pub fingerprint: Fingerprint,
    pub first_seen: SystemTime,
    pub last_seen: SystemTime,
    pub count: u64,
    pub time_bucket: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupDecision {
    New,
    Duplicate { count: u64 },
}

struct Shard {
    entries: LruCache<Fingerprint, DedupEntry>,
    /// time_bucket -> fingerprints currently in that bucket, for O(bucket) sweep.
    buckets: HashMap<u64, Vec<Fingerprint>>,
}

impl Shard {
    fn new(capacity: usize) -> Self {
        Shard {
            entries: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()),
            buckets: HashMap::new(),
        }
    }
}

pub struct DedupStore {
    shards: Vec<Mutex<Shard>>,
    bucket_size: Duration,
}

fn shard_index(fp: &Fingerprint) -> usize {
    (fp.0[0] as usize) % NUM_SHARDS
}

fn time_bucket(now: SystemTime, bucket_size: Duration) -> u64 {
    let secs = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    secs / bucket_size.as_secs().max(1)
}

impl DedupStore {
    pub fn new(max_size: usize, bucket_size: Duration) -> Self {
        let per_shard = (max_size / NUM_SHARDS).max(1);
        let shards = (0..NUM_SHARDS).map(|_| Mutex::new(Shard::new(per_shard))).collect();
        DedupStore { shards, bucket_size }
    }

    /// `touch` — the only entry point that can race for a given fingerprint;
    /// each shard's `Mutex` serializes it, so `new`/`duplicate` decisions are
    /// linearizable per spec.md §5.
    pub fn touch(&self, fp: Fingerprint, now: SystemTime, window: Duration) -> DedupDecision {
        let idx = shard_index(&fp);
        let mut shard = self.shards[idx].lock().unwrap();

        if let Some(entry) = shard.entries.get_mut(&fp) {
            let within_window = now
                .duration_since(entry.last_seen)
                .map(|d| d <= window)
                .unwrap_or(true);

            if within_window {
                entry.last_seen = now;
                entry.count += 1;
                let new_bucket = time_bucket(now, self.bucket_size);
                if new_bucket != entry.time_bucket {
                    remove_from_bucket(&mut shard.buckets, entry.time_bucket, &fp);
                    shard.buckets.entry(new_bucket).or_default().push(fp);
                    entry.time_bucket = new_bucket;
                }
                return DedupDecision::Duplicate { count: entry.count };
            }
            // Window elapsed: treat as a fresh entry (falls through to insert).
        }

        let bucket = time_bucket(now, self.bucket_size);
        let entry = DedupEntry {
            fingerprint: fp,
            first_seen: now,
            last_seen: now,
            count: 1,
            time_bucket: bucket,
        };
        if let Some((evicted_fp, evicted)) = shard.entries.push(fp, entry) {
            if evicted_fp != fp {
                remove_from_bucket(&mut shard.buckets, evicted.time_bucket, &evicted_fp);
            }
        }
        shard.buckets.entry(bucket).or_default().push(fp);
        DedupDecision::New
    }

    /// Drop entries whose window has elapsed relative to `now`. Only
    /// buckets strictly older than the window need scanning.
    pub fn sweep(&self, now: SystemTime, window: Duration) {
        let cur_bucket = time_bucket(now, self.bucket_size);
        let window_buckets = (window.as_secs() / self.bucket_size.as_secs().max(1)).max(1);

        for shard_mutex in &self.shards {
            let mut shard = shard_mutex.lock().unwrap();
            let stale_buckets: Vec<u64> = shard
                .buckets
                .keys()
                .copied()
                .filter(|b| cur_bucket.saturating_sub(*b) > window_buckets)
                .collect();

            for bucket in stale_buckets {
                if let Some(fps) = shard.buckets.remove(&bucket) {
                    for fp in fps {
                        if let Some(entry) = shard.entries.peek(&fp) {
                            let expired = now
                                .duration_since(entry.last_seen)
                                .map(|d| d > window)
                                .unwrap_or(false);
                            if expired {
                                shard.entries.pop(&fp);
                            }
                        }
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().unwrap().entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_for(&self, fp: Fingerprint) -> Option<u64> {
        let idx = shard_index(&fp);
        let shard = self.shards[idx].lock().unwrap();
        shard.entries.peek(&fp).map(|e| e.count)
    }
}

fn remove_from_bucket(buckets: &mut HashMap<u64, Vec<Fingerprint>>, bucket: u64, fp: &Fingerprint) {
    if let Some(v) = buckets.get_mut(&bucket) {
        v.retain(|f| f != fp);
        if v.is_empty() {
            buckets.remove(&bucket);
        }
    }
}
