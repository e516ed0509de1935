use super::bucket::{BucketManager, KeyHeader, ResidualKey};
use super::slab::SlabRef;

const N_BUCKETS: usize = 1 << 18;
const REDUCTION_BUDGET: u32 = 7;
const DEAD_SIZE_MIN_TESTS: u64 = 1024;

/// The caching policy of the engine.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CacheMode {
    /// No caching at all.
    Off,
    /// Every component is cached.
    Classic,
    /// Like [`Classic`](Self::Classic), but component sizes whose hit rate
    /// stays negligible are progressively banned from the cache.
    Dynamic,
}

/// The aging policy applied by the periodic cache reduction.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ReductionStrategy {
    /// Entry counters start at the component size, grow by one per hit and
    /// lose a constant per reduction.
    Subtract,
    /// Entry counters are reset to the lookup clock on every hit and are
    /// halved by each reduction.
    Halve,
}

/// The cache configuration.
#[derive(Copy, Clone, Debug)]
pub struct CacheSettings {
    /// The caching policy.
    pub mode: CacheMode,
    /// Reduction periodicity: a reduction pass runs every
    /// `1 << reduce_period_bits` lookups (0 disables reduction).
    pub reduce_period_bits: u32,
    /// The aging policy.
    pub strategy: ReductionStrategy,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            mode: CacheMode::Classic,
            reduce_period_bits: 20,
            strategy: ReductionStrategy::Subtract,
        }
    }
}

struct CacheEntry<T> {
    header: KeyHeader,
    key: SlabRef,
    hash: u32,
    count: u32,
    dirty: bool,
    value: T,
}

/// The result of a cache lookup: either the stored value, or a handle with
/// which the caller inserts the value once computed.
pub(crate) enum Lookup<T> {
    Hit(T),
    Miss(MissHandle),
}

/// The handle returned by a failed lookup; it owns the freshly built key.
pub(crate) struct MissHandle {
    key: ResidualKey,
    hash: u32,
}

/// The component cache: a hash table from residual keys to computed results.
///
/// Open chaining over a fixed power-of-two bucket count; candidate entries
/// are compared by header first, then by byte equality of the key payload.
/// A periodic reduction pass ages the entries and evicts the ones whose
/// counter reaches zero, handing their key bytes back to the slab allocator.
pub struct ComponentCache<T> {
    buckets: Vec<Vec<CacheEntry<T>>>,
    settings: CacheSettings,
    n_entries: usize,
    n_pos_hits: u64,
    n_neg_hits: u64,
    n_lookups: u64,
    n_reduce_calls: u64,
    n_evicted: u64,
    tests_by_size: Vec<u64>,
    hits_by_size: Vec<u64>,
    dead_size: Vec<bool>,
}

impl<T: Clone> ComponentCache<T> {
    /// Builds an empty cache for a formula over `n_vars` variables.
    #[must_use]
    pub fn new(settings: CacheSettings, n_vars: usize) -> Self {
        Self {
            buckets: (0..N_BUCKETS).map(|_| Vec::new()).collect(),
            settings,
            n_entries: 0,
            n_pos_hits: 0,
            n_neg_hits: 0,
            n_lookups: 0,
            n_reduce_calls: 0,
            n_evicted: 0,
            tests_by_size: vec![0; n_vars + 1],
            hits_by_size: vec![0; n_vars + 1],
            dead_size: vec![false; n_vars + 1],
        }
    }

    /// Returns `true` if components of the given size are currently cached.
    #[must_use]
    pub fn wants(&self, component_size: usize) -> bool {
        match self.settings.mode {
            CacheMode::Off => false,
            CacheMode::Classic => true,
            CacheMode::Dynamic => !self.dead_size[component_size],
        }
    }

    pub(crate) fn search(&mut self, key: ResidualKey, bm: &mut BucketManager) -> Lookup<T> {
        self.n_lookups += 1;
        self.tests_by_size[key.header.n_vars as usize] += 1;
        let hash = hash_key(bm.key_bytes(&key));
        let bucket = hash as usize & (N_BUCKETS - 1);
        let found = {
            let bytes = bm.key_bytes(&key);
            self.buckets[bucket].iter().position(|e| {
                e.hash == hash
                    && e.header == key.header
                    && bm.block_bytes(e.key, e.header.len as usize) == bytes
            })
        };
        match found {
            Some(i) => {
                self.n_pos_hits += 1;
                let entry = &mut self.buckets[bucket][i];
                if !entry.dirty {
                    self.hits_by_size[entry.header.n_vars as usize] += 1;
                }
                entry.dirty = true;
                entry.count = match self.settings.strategy {
                    ReductionStrategy::Subtract => entry.count.saturating_add(1),
                    ReductionStrategy::Halve => {
                        u32::try_from(self.n_pos_hits + self.n_neg_hits).unwrap_or(u32::MAX)
                    }
                };
                let value = entry.value.clone();
                bm.release_key(key);
                Lookup::Hit(value)
            }
            None => {
                self.n_neg_hits += 1;
                Lookup::Miss(MissHandle { key, hash })
            }
        }
    }

    pub(crate) fn insert(&mut self, handle: MissHandle, value: T, bm: &mut BucketManager) {
        let MissHandle { key, hash } = handle;
        let count = match self.settings.strategy {
            ReductionStrategy::Subtract => key.header.n_vars,
            ReductionStrategy::Halve => {
                u32::try_from(self.n_pos_hits + self.n_neg_hits).unwrap_or(u32::MAX)
            }
        };
        let bucket = hash as usize & (N_BUCKETS - 1);
        self.buckets[bucket].push(CacheEntry {
            header: key.header,
            key: key.data,
            hash,
            count: count.max(1),
            dirty: false,
            value,
        });
        self.n_entries += 1;
        if self.settings.reduce_period_bits > 0
            && self.n_lookups >= self.next_reduction_clock()
        {
            self.reduce(bm);
        }
    }

    /// Ages every entry and evicts the ones whose counter reaches zero,
    /// returning their key bytes to the slab free lists.
    fn reduce(&mut self, bm: &mut BucketManager) {
        self.n_reduce_calls += 1;
        let strategy = self.settings.strategy;
        let mut evicted = 0u64;
        for bucket in &mut self.buckets {
            bucket.retain_mut(|e| {
                e.count = match strategy {
                    ReductionStrategy::Subtract => e.count.saturating_sub(REDUCTION_BUDGET),
                    ReductionStrategy::Halve => e.count >> 1,
                };
                if e.count == 0 {
                    bm.release_block(e.key, e.header.len as usize);
                    evicted += 1;
                    false
                } else {
                    true
                }
            });
        }
        self.n_evicted += evicted;
        self.n_entries -= usize::try_from(evicted).expect("eviction count fits in usize");
        if self.settings.mode == CacheMode::Dynamic {
            for size in 0..self.dead_size.len() {
                if !self.dead_size[size]
                    && self.tests_by_size[size] >= DEAD_SIZE_MIN_TESTS
                    && self.hits_by_size[size] * 20 < self.tests_by_size[size]
                {
                    self.dead_size[size] = true;
                    log::debug!("cache gives up on components of {size} variables");
                }
            }
        }
        log::debug!(
            "cache reduction #{}: {evicted} entries evicted, {} remain",
            self.n_reduce_calls,
            self.n_entries
        );
    }

    fn next_reduction_clock(&self) -> u64 {
        (self.n_reduce_calls + 1) << self.settings.reduce_period_bits
    }

    /// Returns the number of lookups answered from the cache.
    #[must_use]
    pub fn n_positive_hits(&self) -> u64 {
        self.n_pos_hits
    }

    /// Returns the number of lookups that missed.
    #[must_use]
    pub fn n_negative_hits(&self) -> u64 {
        self.n_neg_hits
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn n_entries(&self) -> usize {
        self.n_entries
    }

    /// Returns the number of reduction passes run so far.
    #[must_use]
    pub fn n_reduce_calls(&self) -> u64 {
        self.n_reduce_calls
    }

    /// Returns the number of entries evicted by reduction passes.
    #[must_use]
    pub fn n_evicted(&self) -> u64 {
        self.n_evicted
    }

    /// Logs the summary counters of the cache, one comment line each.
    pub fn log_final_stats(&self) {
        log::info!("Number of positive hit: {}", self.n_pos_hits);
        log::info!("Number of negative hit: {}", self.n_neg_hits);
        log::info!("Number of reduceCall: {}", self.n_reduce_calls);
        log::info!("Number of entries: {}", self.n_entries);
    }

    #[cfg(test)]
    fn count_of_sizes(&self) -> usize {
        self.dead_size.len()
    }
}

/// A Murmur-style 32-bit mixing hash of the key bytes.
fn hash_key(key: &[u8]) -> u32 {
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;
    let mut h: u32 = 0x2911_1983 ^ u32::try_from(key.len()).unwrap_or(u32::MAX);
    let mut chunks = key.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        if rest.len() > 2 {
            h ^= u32::from(rest[2]) << 16;
        }
        if rest.len() > 1 {
            h ^= u32::from(rest[1]) << 8;
        }
        h ^= u32::from(rest[0]);
        h = h.wrapping_mul(M);
    }
    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h
}
