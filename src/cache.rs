//! Reference-counted, cost-accounted store of font engines.
//!
//! Engines live in an arena indexed by [`EngineId`]. Keys map to engine ids
//! through a multimap: the same key may be inserted more than once, and one
//! engine may be reachable through several keys (one physical engine serving
//! several scripts). Every inserted key entry counts once towards the
//! engine's cache-count; the engine's cost is charged only for the first one.
//!
//! Inserting never evicts. Growth raises the budget and arms the sweep timer,
//! see `sweep.rs`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::backend::FontEngine;
use crate::config::CacheConfig;
use crate::sweep::SweepTimer;
use crate::{Pitch, Script, Slant, StyleHint, StyleKey, StyleStrategy};

/// Identity of a cached engine, resolved font + rendering target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineCacheKey {
    /// Resolved family name, empty for the box engine
    pub family: String,
    pub pixel_size: u16,
    pub weight: u8,
    pub slant: Slant,
    pub stretch: u16,
    pub script: Script,
    pub screen: u32,
}

/// Coarse identity of an engine-data bundle: the request without its script.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineDataKey {
    /// Requested family list, lowercased and comma-joined
    pub families: String,
    /// Requested foundry, lowercased
    pub foundry: Option<String>,
    pub style_name: Option<String>,
    pub pixel_size: u16,
    pub style: StyleKey,
    pub style_strategy: StyleStrategy,
    pub style_hint: StyleHint,
    pub pitch: Pitch,
    pub screen: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineId(pub u64);

/// Holds an engine alive. The cache never deletes an engine while a handle
/// to it exists.
#[derive(Debug)]
pub struct EngineHandle {
    id: EngineId,
    engine: Arc<dyn FontEngine>,
    refs: Arc<AtomicUsize>,
}

impl EngineHandle {
    fn new(id: EngineId, engine: Arc<dyn FontEngine>, refs: Arc<AtomicUsize>) -> Self {
        refs.fetch_add(1, Ordering::AcqRel);
        EngineHandle { id, engine, refs }
    }

    pub fn id(&self) -> EngineId {
        self.id
    }

    pub fn engine(&self) -> &Arc<dyn FontEngine> {
        &self.engine
    }

    /// Number of live handles to this engine.
    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    /// Whether both handles point to the same physical engine.
    pub fn same_engine(&self, other: &EngineHandle) -> bool {
        Arc::ptr_eq(&self.refs, &other.refs)
    }
}

impl Clone for EngineHandle {
    fn clone(&self) -> Self {
        EngineHandle::new(self.id, self.engine.clone(), self.refs.clone())
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        let previous = self.refs.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "engine {:?} reference count underflow", self.id);
    }
}

/// One engine slot per script, filled lazily.
#[derive(Debug)]
pub struct EngineData {
    engines: Vec<Option<EngineHandle>>,
}

impl EngineData {
    fn new() -> Self {
        EngineData {
            engines: (0..Script::COUNT).map(|_| None).collect(),
        }
    }

    fn clear(&mut self) {
        for slot in self.engines.iter_mut() {
            *slot = None;
        }
    }
}

/// Shared, reference-counted handle to an engine-data bundle.
#[derive(Debug)]
pub struct EngineDataHandle {
    data: Arc<Mutex<EngineData>>,
    refs: Arc<AtomicUsize>,
}

impl EngineDataHandle {
    fn new(data: Arc<Mutex<EngineData>>, refs: Arc<AtomicUsize>) -> Self {
        refs.fetch_add(1, Ordering::AcqRel);
        EngineDataHandle { data, refs }
    }

    fn lock(&self) -> MutexGuard<'_, EngineData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn engine(&self, script: Script) -> Option<EngineHandle> {
        self.lock().engines[script.index()].clone()
    }

    pub fn set_engine(&self, script: Script, engine: &EngineHandle) {
        self.lock().engines[script.index()] = Some(engine.clone());
    }

    /// Stores `engine` in every empty slot.
    pub fn fill_empty(&self, engine: &EngineHandle) {
        for slot in self.lock().engines.iter_mut() {
            if slot.is_none() {
                *slot = Some(engine.clone());
            }
        }
    }

    /// Number of filled script slots.
    pub fn engine_count(&self) -> usize {
        self.lock().engines.iter().filter(|e| e.is_some()).count()
    }

    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }
}

impl Clone for EngineDataHandle {
    fn clone(&self) -> Self {
        EngineDataHandle::new(self.data.clone(), self.refs.clone())
    }
}

impl Drop for EngineDataHandle {
    fn drop(&mut self) {
        let previous = self.refs.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "engine data reference count underflow");
    }
}

#[derive(Debug)]
pub(crate) struct CachedEngine {
    pub(crate) engine: Arc<dyn FontEngine>,
    pub(crate) refs: Arc<AtomicUsize>,
    /// Key entries currently pointing at this engine
    pub(crate) cache_count: usize,
    /// Bytes, as reported by the engine when first inserted
    pub(crate) cost: usize,
}

impl CachedEngine {
    pub(crate) fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }
}

/// Per-key bookkeeping used to pick eviction victims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeyEntry {
    pub(crate) id: EngineId,
    pub(crate) hits: u32,
    pub(crate) timestamp: u64,
}

#[derive(Debug)]
pub(crate) struct CachedData {
    pub(crate) data: Arc<Mutex<EngineData>>,
    pub(crate) refs: Arc<AtomicUsize>,
}

impl CachedData {
    pub(crate) fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    pub(crate) fn clear_engines(&self) {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Rounds a byte cost up to whole KB, at least 1.
pub fn cost_to_kb(bytes: usize) -> u32 {
    let kb = (bytes as u64 + 1023) / 1024;
    kb.clamp(1, u32::MAX as u64) as u32
}

#[derive(Debug)]
pub struct EngineCache {
    pub(crate) config: CacheConfig,
    pub(crate) engines: BTreeMap<EngineId, CachedEngine>,
    pub(crate) keys: HashMap<EngineCacheKey, Vec<KeyEntry>>,
    pub(crate) data: HashMap<EngineDataKey, CachedData>,
    next_id: u64,
    /// Monotonic access counter, not wall-clock
    pub(crate) current_timestamp: u64,
    pub(crate) total_cost: u32,
    pub(crate) max_cost: u32,
    pub(crate) timer: SweepTimer,
}

impl Default for EngineCache {
    fn default() -> Self {
        EngineCache::new(CacheConfig::default())
    }
}

impl EngineCache {
    pub fn new(config: CacheConfig) -> Self {
        let max_cost = config.min_cost_kb;
        EngineCache {
            config,
            engines: BTreeMap::new(),
            keys: HashMap::new(),
            data: HashMap::new(),
            next_id: 0,
            current_timestamp: 0,
            total_cost: 0,
            max_cost,
            timer: SweepTimer::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Sum of the costs of all inserted entries, in KB.
    pub fn total_cost_kb(&self) -> u32 {
        self.total_cost
    }

    /// Current budget, in KB.
    pub fn max_cost_kb(&self) -> u32 {
        self.max_cost
    }

    /// Number of physical engines in the cache.
    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    /// Number of key entries (one per insertion).
    pub fn key_entry_count(&self) -> usize {
        self.keys.values().map(Vec::len).sum()
    }

    pub fn engine_data_count(&self) -> usize {
        self.data.len()
    }

    /// Number of key entries pointing at engine `id`, `0` if not cached.
    pub fn cache_count(&self, id: EngineId) -> usize {
        self.engines.get(&id).map(|e| e.cache_count).unwrap_or(0)
    }

    pub fn contains_engine(&self, id: EngineId) -> bool {
        self.engines.contains_key(&id)
    }

    /// Looks up an engine by key. A hit counts towards the key entry's
    /// popularity and stamps it with the current access counter.
    pub fn find_engine(&mut self, key: &EngineCacheKey) -> Option<EngineHandle> {
        let entry = self.keys.get_mut(key)?.first_mut()?;

        self.current_timestamp += 1;
        entry.hits += 1;
        entry.timestamp = self.current_timestamp;

        let cached = self.engines.get(&entry.id)?;
        log::debug!(
            "font cache: found engine {:?} '{}': timestamp {} hits {} ref {}/{}",
            entry.id,
            cached.engine.family_name(),
            entry.timestamp,
            entry.hits,
            cached.ref_count(),
            cached.cache_count
        );

        Some(EngineHandle::new(
            entry.id,
            cached.engine.clone(),
            cached.refs.clone(),
        ))
    }

    /// Inserts a newly created engine under `key` and charges its cost.
    pub fn insert_engine(
        &mut self,
        key: EngineCacheKey,
        engine: Arc<dyn FontEngine>,
    ) -> EngineHandle {
        let id = EngineId(self.next_id);
        self.next_id += 1;

        let cost = engine.cache_cost();
        let refs = Arc::new(AtomicUsize::new(0));
        log::debug!(
            "font cache: inserting new engine {:?} '{}' ({} bytes)",
            id,
            engine.family_name(),
            cost
        );

        self.engines.insert(
            id,
            CachedEngine {
                engine: engine.clone(),
                refs: refs.clone(),
                cache_count: 0,
                cost,
            },
        );
        self.insert_key_entry(key, id);

        EngineHandle::new(id, engine, refs)
    }

    /// Inserts one more key entry for an engine that is already cached. The
    /// cost is not charged again. Returns false if `id` is not cached.
    pub fn insert_engine_alias(&mut self, key: EngineCacheKey, id: EngineId) -> bool {
        if !self.engines.contains_key(&id) {
            return false;
        }
        self.insert_key_entry(key, id);
        true
    }

    fn insert_key_entry(&mut self, key: EngineCacheKey, id: EngineId) {
        self.current_timestamp += 1;
        let entry = KeyEntry {
            id,
            hits: 0,
            timestamp: self.current_timestamp,
        };

        let cost = match self.engines.get_mut(&id) {
            Some(cached) => {
                cached.cache_count += 1;
                (cached.cache_count == 1).then_some(cached.cost)
            }
            None => return,
        };
        self.keys.entry(key).or_default().push(entry);

        if let Some(cost) = cost {
            self.increase_cost(cost);
        }
    }

    pub fn find_engine_data(&self, key: &EngineDataKey) -> Option<EngineDataHandle> {
        let cached = self.data.get(key)?;
        Some(EngineDataHandle::new(cached.data.clone(), cached.refs.clone()))
    }

    /// Inserts an empty bundle under `key`, replacing any previous one, and
    /// charges the configured bundle cost.
    pub fn insert_engine_data(&mut self, key: EngineDataKey) -> EngineDataHandle {
        log::debug!("font cache: inserting new engine data for '{}'", key.families);

        let data = Arc::new(Mutex::new(EngineData::new()));
        let refs = Arc::new(AtomicUsize::new(0));
        let handle = EngineDataHandle::new(data.clone(), refs.clone());

        if let Some(previous) = self.data.insert(key, CachedData { data, refs }) {
            previous.clear_engines();
            self.decrease_cost(self.config.engine_data_cost);
        }
        self.increase_cost(self.config.engine_data_cost);

        handle
    }

    /// Adds `bytes` to the total cost. Growing past the budget raises the
    /// budget and arms the fast sweep timer.
    pub fn increase_cost(&mut self, bytes: usize) {
        let cost = cost_to_kb(bytes);
        self.total_cost = self.total_cost.saturating_add(cost);

        log::debug!(
            "font cache: cost increased {} kb, total {} kb, max {} kb",
            cost,
            self.total_cost,
            self.max_cost
        );

        if self.total_cost > self.max_cost {
            self.max_cost = self.total_cost;
            self.timer.arm_fast(Instant::now(), &self.config);
        }
    }

    pub fn decrease_cost(&mut self, bytes: usize) {
        let cost = cost_to_kb(bytes);
        debug_assert!(
            cost <= self.total_cost,
            "font cache: cost underflow ({} kb > {} kb)",
            cost,
            self.total_cost
        );
        self.total_cost = self.total_cost.saturating_sub(cost);

        log::debug!(
            "font cache: cost decreased {} kb, total {} kb, max {} kb",
            cost,
            self.total_cost,
            self.max_cost
        );
    }

    /// Removes the key entry at `keys[key][index]`, deleting the engine when
    /// it was the last one. Returns true if the engine was deleted.
    pub(crate) fn remove_key_entry(&mut self, key: &EngineCacheKey, index: usize) -> bool {
        let entry = match self.keys.get_mut(key) {
            Some(entries) if index < entries.len() => {
                let entry = entries.remove(index);
                if entries.is_empty() {
                    self.keys.remove(key);
                }
                entry
            }
            _ => return false,
        };

        let delete = match self.engines.get_mut(&entry.id) {
            Some(cached) => {
                debug_assert!(cached.cache_count > 0);
                cached.cache_count = cached.cache_count.saturating_sub(1);
                cached.cache_count == 0
            }
            None => false,
        };
        if !delete {
            return false;
        }

        match self.engines.remove(&entry.id) {
            Some(cached) => {
                debug_assert_eq!(
                    cached.ref_count(),
                    0,
                    "font cache: deleting referenced engine {:?}",
                    entry.id
                );
                log::debug!(
                    "font cache: deleting engine {:?} '{}'",
                    entry.id,
                    cached.engine.family_name()
                );
                self.decrease_cost(cached.cost);
                true
            }
            None => false,
        }
    }

    /// Drops every engine-data bundle's engines, then removes every bundle
    /// and engine that is no longer referenced. Referenced entries stay.
    pub fn clear(&mut self) {
        for cached in self.data.values() {
            cached.clear_engines();
        }

        let unused_data: Vec<EngineDataKey> = self
            .data
            .iter()
            .filter(|(_, d)| d.ref_count() == 0)
            .map(|(k, _)| k.clone())
            .collect();
        for key in unused_data {
            self.data.remove(&key);
            self.decrease_cost(self.config.engine_data_cost);
        }

        let keys: Vec<EngineCacheKey> = self.keys.keys().cloned().collect();
        for key in keys {
            let mut index = 0;
            while let Some(entry) = self.keys.get(&key).and_then(|e| e.get(index)).copied() {
                let referenced = self
                    .engines
                    .get(&entry.id)
                    .map(|c| c.ref_count() != 0)
                    .unwrap_or(false);
                if referenced {
                    index += 1;
                } else {
                    self.remove_key_entry(&key, index);
                }
            }
        }

        for (id, cached) in &self.engines {
            log::debug!(
                "font cache: engine {:?} '{}' still has {} references, kept",
                id,
                cached.engine.family_name(),
                cached.ref_count()
            );
        }
    }
}
