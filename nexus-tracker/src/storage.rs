//! Storage trait for slab-like containers with stable keys.
//!
//! Storage provides insert/remove/get operations where keys remain valid
//! until explicitly removed. Every node of a [`Graph`](crate::Graph) lives in
//! one storage instance, which lets the binding protocol link nodes by key
//! instead of by pointer.

use crate::Key;

/// Slab-like storage with stable keys.
///
/// # Requirements
///
/// Implementations must provide:
/// - **Stable keys**: a key remains valid until explicitly removed
/// - **O(1)** insert, remove, get operations
/// - **Non-failing removal**: `remove` never allocates and never fails
///
/// # Implementations
///
/// - [`BoxedStorage<T>`] - fixed capacity, single allocation (in this crate)
/// - `slab::Slab<T>` - growable, never full (feature `slab`)
pub trait Storage<T> {
    /// Key type handed out by this storage.
    type Key: Key;

    /// Inserts a value, returning its stable key.
    ///
    /// # Errors
    ///
    /// Returns `Err(Full(value))` if the storage cannot hold another value.
    fn try_insert(&mut self, value: T) -> Result<Self::Key, Full<T>>;

    /// Removes and returns the value at `key`, if present.
    fn remove(&mut self, key: Self::Key) -> Option<T>;

    /// Returns a reference to the value at `key`, if present.
    fn get(&self, key: Self::Key) -> Option<&T>;

    /// Returns a mutable reference to the value at `key`, if present.
    fn get_mut(&mut self, key: Self::Key) -> Option<&mut T>;

    /// Returns the number of occupied entries.
    fn len(&self) -> usize;

    /// Returns `true` if no entries are occupied.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Error returned when storage is full.
///
/// Carries the value that could not be inserted, allowing recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Returns the value that could not be inserted.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> core::fmt::Display for Full<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "storage is full")
    }
}

impl<T: core::fmt::Debug> std::error::Error for Full<T> {}

// =============================================================================
// BoxedStorage - fixed capacity, single allocation, intrusive free list
// =============================================================================

#[derive(Debug)]
enum Entry<T, K> {
    Occupied(T),
    /// Vacant entry holding the next free key (or `NONE`).
    Vacant(K),
}

/// Fixed-capacity storage allocated once at construction.
///
/// Vacant entries form a free list, so removed keys are reused LIFO. Once
/// every entry is occupied, [`try_insert`](Storage::try_insert) fails with
/// [`Full`]; this is the failure mode the binding protocol recovers from.
///
/// # Example
///
/// ```
/// use nexus_tracker::{BoxedStorage, Storage};
///
/// let mut storage: BoxedStorage<u64> = BoxedStorage::with_capacity(2);
///
/// let a = storage.try_insert(1).unwrap();
/// let _b = storage.try_insert(2).unwrap();
/// assert!(storage.try_insert(3).is_err());
///
/// assert_eq!(storage.remove(a), Some(1));
/// assert!(storage.try_insert(3).is_ok());
/// ```
#[derive(Debug)]
pub struct BoxedStorage<T, K: Key = u32> {
    entries: Box<[Entry<T, K>]>,
    /// Head of the free list.
    free: K,
    len: usize,
}

impl<T, K: Key> BoxedStorage<T, K> {
    /// Creates storage with exactly `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0 or does not fit the key type (the key's
    /// `NONE` sentinel is never a valid index).
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        assert!(
            capacity <= K::NONE.as_usize(),
            "capacity exceeds key type maximum"
        );

        let entries = (0..capacity)
            .map(|i| {
                let next = if i + 1 < capacity {
                    K::from_usize(i + 1)
                } else {
                    K::NONE
                };
                Entry::Vacant(next)
            })
            .collect();

        Self {
            entries,
            free: K::from_usize(0),
            len: 0,
        }
    }

    /// Returns the capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if all entries are occupied.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free.is_none()
    }

    /// Removes all values from storage.
    ///
    /// # Warning
    ///
    /// Any key handed out before this call is dangling afterwards. Only call
    /// this when nothing else references the storage.
    pub fn clear(&mut self) {
        *self = Self::with_capacity(self.capacity());
    }
}

impl<T, K: Key> Storage<T> for BoxedStorage<T, K> {
    type Key = K;

    #[inline]
    fn try_insert(&mut self, value: T) -> Result<K, Full<T>> {
        if self.free.is_none() {
            return Err(Full(value));
        }

        let key = self.free;
        let entry = &mut self.entries[key.as_usize()];
        let Entry::Vacant(next) = *entry else {
            unreachable!("free list points at an occupied entry");
        };

        *entry = Entry::Occupied(value);
        self.free = next;
        self.len += 1;
        Ok(key)
    }

    #[inline]
    fn remove(&mut self, key: K) -> Option<T> {
        let entry = self.entries.get_mut(key.as_usize())?;
        if matches!(entry, Entry::Vacant(_)) {
            return None;
        }

        let Entry::Occupied(value) = core::mem::replace(entry, Entry::Vacant(self.free)) else {
            unreachable!();
        };
        self.free = key;
        self.len -= 1;
        Some(value)
    }

    #[inline]
    fn get(&self, key: K) -> Option<&T> {
        match self.entries.get(key.as_usize())? {
            Entry::Occupied(value) => Some(value),
            Entry::Vacant(_) => None,
        }
    }

    #[inline]
    fn get_mut(&mut self, key: K) -> Option<&mut T> {
        match self.entries.get_mut(key.as_usize())? {
            Entry::Occupied(value) => Some(value),
            Entry::Vacant(_) => None,
        }
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }
}

// =============================================================================
// slab::Slab implementation
// =============================================================================

#[cfg(feature = "slab")]
impl<T> Storage<T> for slab::Slab<T> {
    type Key = usize;

    #[inline]
    fn try_insert(&mut self, value: T) -> Result<usize, Full<T>> {
        Ok(self.insert(value))
    }

    #[inline]
    fn remove(&mut self, key: usize) -> Option<T> {
        self.try_remove(key)
    }

    #[inline]
    fn get(&self, key: usize) -> Option<&T> {
        slab::Slab::get(self, key)
    }

    #[inline]
    fn get_mut(&mut self, key: usize) -> Option<&mut T> {
        slab::Slab::get_mut(self, key)
    }

    #[inline]
    fn len(&self) -> usize {
        slab::Slab::len(self)
    }
}
