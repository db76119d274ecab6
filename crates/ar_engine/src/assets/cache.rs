//! Reference-counted model cache with background loading
//!
//! [`AssetCache::acquire`] never blocks. It hands back an [`AssetHandle`]
//! that is either ready or resolves later when a loader worker finishes.
//! Concurrent acquires of the same id share one in-flight load.
//!
//! Eviction is LRU by last acquire and only touches entries with no live
//! handles whose load has finished. Referenced entries may push the cache
//! past its capacity; they are trimmed once released.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use super::{AssetError, AssetId, AssetStore, LoaderPool, ModelAsset, PlaceholderReason};
use crate::core::config::AssetConfig;
use crate::events::{EventArg, EventQueue, EventType};

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Loads handed to the pool
    pub loads: u64,
    /// Acquires served by an existing entry
    pub hits: u64,
    /// Entries evicted by the LRU policy
    pub evictions: u64,
    /// Live handles across all entries
    pub outstanding_refs: usize,
    /// Entries currently cached
    pub entries: usize,
}

/// One-shot result cell shared by every handle to an entry
struct LoadSlot {
    asset: Mutex<Option<Arc<ModelAsset>>>,
    ready: Condvar,
}

impl LoadSlot {
    fn pending() -> Arc<Self> {
        Arc::new(Self {
            asset: Mutex::new(None),
            ready: Condvar::new(),
        })
    }

    /// First resolution wins
    fn resolve(&self, asset: ModelAsset) {
        let mut slot = self.asset.lock();
        if slot.is_none() {
            *slot = Some(Arc::new(asset));
            self.ready.notify_all();
        }
    }

    fn get(&self) -> Option<Arc<ModelAsset>> {
        self.asset.lock().clone()
    }

    fn wait(&self, timeout: Duration) -> Option<Arc<ModelAsset>> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.asset.lock();
        while slot.is_none() {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        slot.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryStatus {
    Loading,
    Ready,
    Failed,
    Saturated,
}

struct Entry {
    slot: Arc<LoadSlot>,
    status: EntryStatus,
    refs: usize,
    last_acquire: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<AssetId, Entry>,
    tick: u64,
    closed: bool,
    stats: CacheStats,
}

struct Shared {
    state: Mutex<CacheState>,
    store: Arc<dyn AssetStore>,
    events: Arc<EventQueue>,
    capacity: usize,
    retries: u32,
    retry_delay: Duration,
}

impl Shared {
    fn release(&self, id: &AssetId, slot: &Arc<LoadSlot>) {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.get_mut(id) {
            if Arc::ptr_eq(&entry.slot, slot) {
                entry.refs = entry.refs.saturating_sub(1);
            }
        }
        self.evict_over_capacity(&mut state);
    }

    fn evict_over_capacity(&self, state: &mut CacheState) {
        while state.entries.len() > self.capacity {
            let victim = state
                .entries
                .iter()
                .filter(|(_, entry)| entry.refs == 0 && entry.status != EntryStatus::Loading)
                .min_by_key(|(_, entry)| entry.last_acquire)
                .map(|(id, _)| id.clone());

            let Some(id) = victim else { break };
            state.entries.remove(&id);
            state.stats.evictions += 1;
            log::debug!("Evicted asset {}", id);
        }
    }

    fn load(&self, id: &AssetId) -> Result<ModelAsset, AssetError> {
        let mut attempt = 0;
        loop {
            let result = self
                .store
                .load(id)
                .and_then(|bytes| ModelAsset::from_glb(id.clone(), bytes));
            match result {
                Err(err) if err.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    log::debug!("Retrying {} ({}/{}): {}", id, attempt, self.retries, err);
                    std::thread::sleep(self.retry_delay);
                }
                other => return other,
            }
        }
    }

    fn finish_load(&self, id: &AssetId, slot: &Arc<LoadSlot>, result: Result<ModelAsset, AssetError>) {
        let (asset, status) = match result {
            Ok(asset) => {
                log::debug!("Loaded asset {} ({} bytes)", id, asset.bytes().len());
                (asset, EntryStatus::Ready)
            }
            Err(err) => {
                log::warn!("Asset {} failed to load, using placeholder: {}", id, err);
                self.events.emit(
                    EventType::AssetLoadFailed,
                    [
                        ("asset_id", EventArg::AssetId(id.to_string())),
                        ("message", EventArg::Message(err.to_string())),
                    ],
                );
                (ModelAsset::placeholder(id.clone(), PlaceholderReason::LoadFailed), EntryStatus::Failed)
            }
        };

        // Status first, so a waiter woken by the slot sees a settled entry
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.get_mut(id) {
            if Arc::ptr_eq(&entry.slot, slot) && entry.status == EntryStatus::Loading {
                entry.status = status;
            }
        }
        slot.resolve(asset);
        self.evict_over_capacity(&mut state);
    }
}

/// Shared model cache
pub struct AssetCache {
    shared: Arc<Shared>,
    pool: Mutex<Option<LoaderPool>>,
}

impl AssetCache {
    /// Cache reading from `store`, loading on its own worker pool
    pub fn new(config: &AssetConfig, store: Arc<dyn AssetStore>, events: Arc<EventQueue>) -> std::io::Result<Self> {
        let pool = LoaderPool::new(config.workers, config.queue_capacity)?;
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(CacheState::default()),
                store,
                events,
                capacity: config.capacity.max(1),
                retries: config.load_retries,
                retry_delay: config.retry_delay(),
            }),
            pool: Mutex::new(Some(pool)),
        })
    }

    /// Handle to `id`, starting a background load if needed
    pub fn acquire(&self, id: &AssetId) -> AssetHandle {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        state.tick += 1;
        let tick = state.tick;

        if let Some(entry) = state.entries.get_mut(id) {
            let stale = matches!(entry.status, EntryStatus::Failed | EntryStatus::Saturated) && entry.refs == 0;
            if !stale {
                entry.refs += 1;
                entry.last_acquire = tick;
                let slot = Arc::clone(&entry.slot);
                state.stats.hits += 1;
                return self.handle(id, slot);
            }
            log::debug!("Retrying previously failed asset {}", id);
            state.entries.remove(id);
        }

        let slot = LoadSlot::pending();
        let status = if state.closed {
            slot.resolve(ModelAsset::placeholder(id.clone(), PlaceholderReason::ShutDown));
            EntryStatus::Failed
        } else {
            self.submit_load(id, &slot, &mut state.stats)
        };

        state.entries.insert(
            id.clone(),
            Entry {
                slot: Arc::clone(&slot),
                status,
                refs: 1,
                last_acquire: tick,
            },
        );
        self.shared.evict_over_capacity(state);
        self.handle(id, slot)
    }

    fn submit_load(&self, id: &AssetId, slot: &Arc<LoadSlot>, stats: &mut CacheStats) -> EntryStatus {
        let shared = Arc::clone(&self.shared);
        let job_id = id.clone();
        let job_slot = Arc::clone(slot);
        let job = move || {
            let result = shared.load(&job_id);
            shared.finish_load(&job_id, &job_slot, result);
        };

        let submitted = match self.pool.lock().as_ref() {
            Some(pool) => pool.try_submit(job),
            None => Err(AssetError::ShutDown),
        };

        match submitted {
            Ok(()) => {
                stats.loads += 1;
                log::trace!("Queued load of {}", id);
                EntryStatus::Loading
            }
            Err(AssetError::PoolSaturated) => {
                log::warn!("Asset loader pool saturated; {} rendered undecorated", id);
                self.shared.events.emit(
                    EventType::AssetPoolSaturated,
                    [("asset_id", EventArg::AssetId(id.to_string()))],
                );
                slot.resolve(ModelAsset::placeholder(id.clone(), PlaceholderReason::PoolSaturated));
                EntryStatus::Saturated
            }
            Err(_) => {
                slot.resolve(ModelAsset::placeholder(id.clone(), PlaceholderReason::ShutDown));
                EntryStatus::Failed
            }
        }
    }

    fn handle(&self, id: &AssetId, slot: Arc<LoadSlot>) -> AssetHandle {
        AssetHandle {
            id: id.clone(),
            slot,
            cache: Arc::downgrade(&self.shared),
        }
    }

    /// Give a handle back; same as dropping it
    pub fn release(&self, handle: AssetHandle) {
        drop(handle);
    }

    /// Whether `id` currently has an entry
    pub fn contains(&self, id: &AssetId) -> bool {
        self.shared.state.lock().entries.contains_key(id)
    }

    /// Counters and current occupancy
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        CacheStats {
            outstanding_refs: state.entries.values().map(|entry| entry.refs).sum(),
            entries: state.entries.len(),
            ..state.stats
        }
    }

    /// Stop the loader pool and resolve unfinished loads to placeholders
    pub fn shutdown(&self) {
        let pool = self.pool.lock().take();
        let Some(mut pool) = pool else { return };

        self.shared.state.lock().closed = true;
        pool.shutdown();

        let mut state = self.shared.state.lock();
        for (id, entry) in state.entries.iter_mut() {
            if entry.status == EntryStatus::Loading {
                entry.slot.resolve(ModelAsset::placeholder(id.clone(), PlaceholderReason::ShutDown));
                entry.status = EntryStatus::Failed;
            }
        }
        log::info!("Asset cache shut down with {} entries", state.entries.len());
    }
}

impl Drop for AssetCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Counted reference to a cached model
///
/// Cloning adds a reference; dropping removes one.
pub struct AssetHandle {
    id: AssetId,
    slot: Arc<LoadSlot>,
    cache: Weak<Shared>,
}

impl AssetHandle {
    /// Asset id
    pub fn id(&self) -> &AssetId {
        &self.id
    }

    /// The model if loading has finished
    pub fn get(&self) -> Option<Arc<ModelAsset>> {
        self.slot.get()
    }

    /// Block up to `timeout` for the load; not for the render path
    pub fn wait(&self, timeout: Duration) -> Option<Arc<ModelAsset>> {
        self.slot.wait(timeout)
    }

    /// Loading has finished (real or placeholder)
    pub fn is_ready(&self) -> bool {
        self.slot.asset.lock().is_some()
    }

    /// Ready and standing in for real art
    pub fn is_placeholder(&self) -> bool {
        self.placeholder_reason().is_some()
    }

    /// Why the model is a placeholder, if it is one
    pub fn placeholder_reason(&self) -> Option<PlaceholderReason> {
        self.get().and_then(|asset| asset.placeholder_reason())
    }

    /// Both handles refer to the same cache entry
    pub fn same_entry(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl Clone for AssetHandle {
    fn clone(&self) -> Self {
        if let Some(shared) = self.cache.upgrade() {
            let mut state = shared.state.lock();
            if let Some(entry) = state.entries.get_mut(&self.id) {
                if Arc::ptr_eq(&entry.slot, &self.slot) {
                    entry.refs += 1;
                }
            }
        }
        Self {
            id: self.id.clone(),
            slot: Arc::clone(&self.slot),
            cache: self.cache.clone(),
        }
    }
}

impl Drop for AssetHandle {
    fn drop(&mut self) {
        if let Some(shared) = self.cache.upgrade() {
            shared.release(&self.id, &self.slot);
        }
    }
}

impl fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("id", &self.id)
            .field("ready", &self.is_ready())
            .finish()
    }
}
