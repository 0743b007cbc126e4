//! Least-frequently-used cache.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

struct Entry<V> {
    value: V,
    frequency: u64,
    /// Last touch, used to break frequency ties (oldest goes first)
    tick: u64,
}

struct LfuState<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// `(frequency, tick)` of every entry; the first key is the next victim
    order: BTreeMap<(u64, u64), K>,
    tick: u64,
}

impl<K: Hash + Eq + Clone, V> LfuState<K, V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Bump the frequency of `key` and return its entry.
    fn touch(&mut self, key: &K) -> Option<&mut Entry<V>> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        self.order.remove(&(entry.frequency, entry.tick));
        entry.frequency = entry.frequency.saturating_add(1);
        entry.tick = tick;
        self.order.insert((entry.frequency, entry.tick), key.clone());
        Some(entry)
    }

    fn evict(&mut self) {
        if let Some((_, victim)) = self.order.pop_first() {
            self.entries.remove(&victim);
        }
    }
}

/// A capacity-bounded cache that evicts the least frequently used entry.
///
/// Among entries with the same use count, the one touched longest ago is
/// evicted first. Reads bump the use count, so every access takes the lock.
pub struct LfuCache<K, V> {
    capacity: usize,
    state: Mutex<LfuState<K, V>>,
}

impl<K: Hash + Eq + Clone, V> LfuCache<K, V> {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// A zero capacity cache stores nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(LfuState {
                entries: HashMap::with_capacity(capacity),
                order: BTreeMap::new(),
                tick: 0,
            }),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace `key`.
    ///
    /// A new key starts with a use count of one, evicting the least
    /// frequently used entry when the cache is full. Replacing a value counts
    /// as a use.
    pub fn put(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let mut state = self.state.lock();
        if let Some(entry) = state.touch(&key) {
            entry.value = value;
            return;
        }
        if state.entries.len() >= self.capacity {
            state.evict();
        }
        let tick = state.next_tick();
        state.order.insert((1, tick), key.clone());
        state.entries.insert(
            key,
            Entry {
                value,
                frequency: 1,
                tick,
            },
        );
    }

    /// Clone out the value for `key`, counting a use.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let mut state = self.state.lock();
        state.touch(key).map(|entry| entry.value.clone())
    }

    /// Lock the cache and borrow the value for `key` mutably, counting a use.
    ///
    /// The cache stays locked until the guard is dropped.
    pub fn get_locked(&self, key: &K) -> Option<MappedMutexGuard<'_, V>> {
        let state = self.state.lock();
        MutexGuard::try_map(state, |state| state.touch(key).map(|entry| &mut entry.value)).ok()
    }

    /// Whether `key` is present; does not count as a use.
    pub fn contains_key(&self, key: &K) -> bool {
        self.state.lock().entries.contains_key(key)
    }
}

impl<K, V> fmt::Debug for LfuCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LfuCache")
            .field("capacity", &self.capacity)
            .field("len", &self.state.lock().entries.len())
            .finish()
    }
}
