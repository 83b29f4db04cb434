use core::borrow::Borrow;
use core::fmt::Debug;
use core::fmt::Formatter;
use core::fmt::Result;
use core::hash::BuildHasher;
use core::hash::Hash;
use std::hash::RandomState;

use crate::error::ConfigError;
use crate::iter::EntryRef;
use crate::iter::Iter;
use crate::params::Capacity;
use crate::params::Config;
use crate::reclaim::CollectorWeak;
use crate::reclaim::DefaultCollector;
use crate::table::Table;

/// A lock-free concurrent hash map with Robin Hood displacement.
///
/// Keys live in an open-addressed bucket table. Every insertion and erasure
/// is a single multi-word compare-and-swap over the buckets it reads or
/// moves, so readers never observe a half-finished displacement chain.
///
/// See the [crate-level documentation][crate] for an overview and examples.
///
/// # Type Parameters
///
/// - `K`: The key type.
/// - `V`: The value type.
/// - `S`: The [`BuildHasher`] used to hash keys. Defaults to [`RandomState`].
/// - `C`: The memory reclamation strategy. Defaults to [`DefaultCollector`].
///
/// # Examples
///
/// ```
/// use crh::RobinMap;
///
/// let map: RobinMap<u64, &str> = RobinMap::new();
///
/// assert!(map.emplace(1, "one"));
/// assert!(!map.emplace(1, "uno"));
///
/// assert_eq!(map.read(&1), Some("one"));
/// assert!(map.erase(&1));
/// assert!(!map.contains(&1));
/// ```
///
/// Borrowing entries requires a guard:
///
/// ```
/// use crh::RobinMap;
///
/// let map: RobinMap<String, u32> = RobinMap::new();
/// let guard = map.guard();
///
/// let (entry, inserted) = map.emplace_or_get("a".to_string(), 1, &guard);
/// assert!(inserted);
/// assert_eq!(*entry.value(), 1);
///
/// let found = map.find("a", &guard).unwrap();
/// assert_eq!(found.key(), "a");
/// ```
///
/// [`DefaultCollector`]: crate::garbage::DefaultCollector
pub struct RobinMap<K, V, S = RandomState, C = DefaultCollector>
where
  C: CollectorWeak,
{
  inner: Table<K, V, S, C>,
}

impl<K, V> RobinMap<K, V> {
  /// Creates an empty map with the default configuration.
  ///
  /// # Examples
  ///
  /// ```
  /// use crh::RobinMap;
  ///
  /// let map: RobinMap<u32, u32> = RobinMap::new();
  /// assert!(map.is_empty());
  /// ```
  #[inline]
  pub fn new() -> Self {
    Self::with_config(Config::new())
  }

  /// Creates an empty map with at least `capacity` buckets.
  ///
  /// The capacity is rounded up to a power of two and clamped to
  /// <code>[Capacity::MIN]..=[Capacity::MAX]</code>.
  ///
  /// # Examples
  ///
  /// ```
  /// use crh::RobinMap;
  ///
  /// let map: RobinMap<u32, u32> = RobinMap::with_capacity(1000);
  /// assert_eq!(map.capacity(), 1024);
  /// ```
  #[inline]
  pub fn with_capacity(capacity: usize) -> Self {
    Self::with_capacity_and_hasher(capacity, RandomState::new())
  }
}

impl<K, V, S, C> RobinMap<K, V, S, C>
where
  C: CollectorWeak,
{
  /// Creates an empty map using `config` and the default hasher.
  ///
  /// # Panics
  ///
  /// Panics if `config` is invalid; see [`Config::validate`].
  #[inline]
  #[track_caller]
  pub fn with_config(config: Config) -> Self
  where
    S: Default,
  {
    Self::with_config_and_hasher(config, S::default())
  }

  /// Creates an empty map using `config` and the default hasher.
  ///
  /// # Errors
  ///
  /// Returns the first invalid setting of `config`.
  ///
  /// # Examples
  ///
  /// ```
  /// use crh::{Config, ConfigError, RobinMap};
  ///
  /// let config = Config::new().with_capacity(100);
  /// let error = RobinMap::<u32, u32>::try_with_config(config).unwrap_err();
  ///
  /// assert_eq!(error, ConfigError::NotPowerOfTwo(100));
  /// ```
  #[inline]
  pub fn try_with_config(config: Config) -> core::result::Result<Self, ConfigError>
  where
    S: Default,
  {
    Self::try_with_config_and_hasher(config, S::default())
  }

  /// Creates an empty map that hashes keys with `hasher`.
  #[inline]
  pub fn with_hasher(hasher: S) -> Self {
    Self::with_config_and_hasher(Config::new(), hasher)
  }

  /// Creates an empty map with at least `capacity` buckets that hashes keys
  /// with `hasher`.
  #[inline]
  pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
    let capacity: Capacity = Capacity::new(capacity);

    Self::with_config_and_hasher(Config::new().with_capacity(capacity.as_usize()), hasher)
  }

  /// Creates an empty map using `config` that hashes keys with `hasher`.
  ///
  /// # Panics
  ///
  /// Panics if `config` is invalid; see [`Config::validate`].
  #[inline]
  #[track_caller]
  pub fn with_config_and_hasher(config: Config, hasher: S) -> Self {
    match Self::try_with_config_and_hasher(config, hasher) {
      Ok(map) => map,
      Err(error) => panic!("invalid map configuration: {error}"),
    }
  }

  /// Creates an empty map using `config` that hashes keys with `hasher`.
  ///
  /// # Errors
  ///
  /// Returns the first invalid setting of `config`.
  #[inline]
  pub fn try_with_config_and_hasher(config: Config, hasher: S) -> core::result::Result<Self, ConfigError> {
    Ok(Self {
      inner: Table::new(config, hasher)?,
    })
  }

  /// Returns the current number of buckets.
  ///
  /// The capacity doubles whenever the map grows.
  #[inline]
  pub fn capacity(&self) -> usize {
    self.inner.capacity()
  }

  /// Returns the number of entries in the map.
  ///
  /// This value may change immediately after reading due to concurrent
  /// operations in other threads.
  ///
  /// # Examples
  ///
  /// ```
  /// use crh::RobinMap;
  ///
  /// let map: RobinMap<u32, u32> = RobinMap::new();
  ///
  /// map.emplace(1, 10);
  /// map.emplace(2, 20);
  /// assert_eq!(map.len(), 2);
  /// ```
  #[inline]
  pub fn len(&self) -> usize {
    self.inner.len()
  }

  /// Returns `true` if the map contains no entries.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.inner.is_empty()
  }

  /// Returns how many times the map has grown.
  ///
  /// # Examples
  ///
  /// ```
  /// use crh::RobinMap;
  ///
  /// let map: RobinMap<u32, u32> = RobinMap::with_capacity(8);
  /// assert_eq!(map.version(), 0);
  ///
  /// for key in 0..64 {
  ///   map.emplace(key, key);
  /// }
  ///
  /// assert!(map.version() > 0);
  /// ```
  #[inline]
  pub fn version(&self) -> usize {
    self.inner.version()
  }

  /// Returns the configuration the map was created with.
  #[inline]
  pub fn config(&self) -> &Config {
    self.inner.config()
  }

  /// Returns the map's hasher.
  #[inline]
  pub fn hasher(&self) -> &S {
    self.inner.hasher()
  }

  /// Pins the current thread.
  ///
  /// Entries borrowed through the guard stay valid until it is dropped, even
  /// if they are erased in the meantime.
  #[inline]
  pub fn guard(&self) -> C::Guard {
    C::guard()
  }
}

impl<K, V, S, C> RobinMap<K, V, S, C>
where
  K: Hash + Eq + Send + 'static,
  V: Send + 'static,
  S: BuildHasher,
  C: CollectorWeak,
{
  /// Inserts `key` with `value` unless `key` is already present.
  ///
  /// Returns `true` if the entry was inserted. An existing entry is never
  /// overwritten.
  ///
  /// # Panics
  ///
  /// Panics if every bucket of a map at [`Capacity::MAX`] is occupied, which
  /// takes a load factor of one.
  ///
  /// # Examples
  ///
  /// ```
  /// use crh::RobinMap;
  ///
  /// let map: RobinMap<u32, &str> = RobinMap::new();
  ///
  /// assert!(map.emplace(7, "seven"));
  /// assert!(!map.emplace(7, "siete"));
  /// assert_eq!(map.read(&7), Some("seven"));
  /// ```
  #[inline]
  #[track_caller]
  pub fn emplace(&self, key: K, value: V) -> bool {
    let guard: C::Guard = C::guard();

    self.inner.insert(key, value, &guard).1
  }

  /// Inserts `key` with `value` unless `key` is already present.
  ///
  /// Returns the entry stored under `key` afterwards and `true` if it is the
  /// one just inserted. If `key` was present, `value` is dropped.
  #[inline]
  #[track_caller]
  pub fn emplace_or_get<'g>(&'g self, key: K, value: V, guard: &'g C::Guard) -> (EntryRef<'g, K, V>, bool) {
    let (entry, inserted) = self.inner.insert(key, value, guard);

    (EntryRef::new(entry), inserted)
  }

  /// Returns the entry stored under `key`, inserting `value` first if `key`
  /// is absent.
  ///
  /// Unlike [`emplace_or_get`], the map is searched before the new entry is
  /// allocated.
  ///
  /// # Examples
  ///
  /// ```
  /// use crh::RobinMap;
  ///
  /// let map: RobinMap<u32, u32> = RobinMap::new();
  /// let guard = map.guard();
  ///
  /// let (entry, inserted) = map.get_or_emplace(1, 100, &guard);
  /// assert!(inserted);
  ///
  /// let (entry, inserted) = map.get_or_emplace(1, 200, &guard);
  /// assert!(!inserted);
  /// assert_eq!(*entry.value(), 100);
  /// ```
  ///
  /// [`emplace_or_get`]: Self::emplace_or_get
  #[inline]
  #[track_caller]
  pub fn get_or_emplace<'g>(&'g self, key: K, value: V, guard: &'g C::Guard) -> (EntryRef<'g, K, V>, bool) {
    self.get_or_emplace_with(key, || value, guard)
  }

  /// Returns the entry stored under `key`, inserting the result of `f` first
  /// if `key` is absent.
  ///
  /// `f` runs at most once, and only if `key` was absent when searched. If
  /// another thread inserts `key` in the meantime, its entry wins and the
  /// built value is dropped.
  #[inline]
  #[track_caller]
  pub fn get_or_emplace_with<'g, F>(&'g self, key: K, f: F, guard: &'g C::Guard) -> (EntryRef<'g, K, V>, bool)
  where
    F: FnOnce() -> V,
  {
    if let Some(entry) = self.inner.find(&key, guard) {
      return (EntryRef::new(entry), false);
    }

    let (entry, inserted) = self.inner.insert(key, f(), guard);

    (EntryRef::new(entry), inserted)
  }

  /// Removes `key` from the map.
  ///
  /// Returns `true` if an entry was removed. Its memory is reclaimed once no
  /// guard can still observe it.
  ///
  /// # Examples
  ///
  /// ```
  /// use crh::RobinMap;
  ///
  /// let map: RobinMap<u32, u32> = RobinMap::new();
  /// map.emplace(1, 1);
  ///
  /// assert!(map.erase(&1));
  /// assert!(!map.erase(&1));
  /// ```
  #[inline]
  pub fn erase<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.inner.erase(key)
  }

  /// Removes the entry `entry` refers to.
  ///
  /// Returns `false` if that entry is no longer in the map, including when
  /// its key was erased and inserted again: the new entry is left in place.
  ///
  /// # Examples
  ///
  /// ```
  /// use crh::RobinMap;
  ///
  /// let map: RobinMap<u32, u32> = RobinMap::new();
  /// let guard = map.guard();
  ///
  /// let (stale, _) = map.emplace_or_get(1, 10, &guard);
  /// assert!(map.erase(&1));
  /// map.emplace(1, 20);
  ///
  /// assert!(!map.erase_entry(stale));
  /// assert_eq!(map.read(&1), Some(20));
  ///
  /// let (current, _) = map.emplace_or_get(1, 30, &guard);
  /// assert!(map.erase_entry(current));
  /// assert!(map.is_empty());
  /// ```
  #[inline]
  pub fn erase_entry(&self, entry: EntryRef<'_, K, V>) -> bool {
    self.inner.erase_entry(entry.entry())
  }

  /// Returns `true` if `key` is present.
  ///
  /// The result may become stale immediately due to concurrent operations.
  #[inline]
  pub fn contains<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let guard: C::Guard = C::guard();

    self.inner.find(key, &guard).is_some()
  }

  /// Returns the entry stored under `key`.
  #[inline]
  pub fn find<'g, Q>(&'g self, key: &Q, guard: &'g C::Guard) -> Option<EntryRef<'g, K, V>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.inner.find(key, guard).map(EntryRef::new)
  }

  /// Applies `f` to the value stored under `key`.
  ///
  /// The value stays valid for the duration of `f`, even if another thread
  /// erases the entry concurrently.
  ///
  /// # Examples
  ///
  /// ```
  /// use crh::RobinMap;
  ///
  /// let map: RobinMap<u32, String> = RobinMap::new();
  /// map.emplace(1, "hello".to_string());
  ///
  /// assert_eq!(map.with(&1, |value| value.len()), Some(5));
  /// assert_eq!(map.with(&2, |value| value.len()), None);
  /// ```
  #[inline]
  pub fn with<Q, F, R>(&self, key: &Q, f: F) -> Option<R>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    F: FnOnce(&V) -> R,
  {
    let guard: C::Guard = C::guard();

    self.inner.find(key, &guard).map(|entry| f(&entry.value))
  }

  /// Returns a clone of the value stored under `key`.
  ///
  /// This is a convenience method equivalent to `map.with(key, V::clone)`.
  #[inline]
  pub fn read<Q>(&self, key: &Q) -> Option<V>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    V: Clone,
  {
    self.with(key, V::clone)
  }

  /// Returns an iterator over the entries of the map.
  ///
  /// Iteration is weakly consistent; see [`Iter`].
  ///
  /// # Examples
  ///
  /// ```
  /// use crh::RobinMap;
  ///
  /// let map: RobinMap<u32, u32> = RobinMap::new();
  ///
  /// for key in 0..10 {
  ///   map.emplace(key, key * 2);
  /// }
  ///
  /// let guard = map.guard();
  /// let mut pairs: Vec<(u32, u32)> = map.iter(&guard).map(|(k, v)| (*k, *v)).collect();
  /// pairs.sort_unstable();
  ///
  /// assert_eq!(pairs.len(), 10);
  /// assert_eq!(pairs[3], (3, 6));
  /// ```
  #[inline]
  pub fn iter<'g>(&'g self, guard: &'g C::Guard) -> Iter<'g, K, V> {
    self.inner.iter(guard)
  }

  #[cfg(test)]
  pub(crate) fn layout(&self) -> Vec<Option<(u64, usize)>> {
    self.inner.layout()
  }

  #[cfg(test)]
  pub(crate) fn start_resize(&self) {
    self.inner.start_resize();
  }
}

impl<K, V, S, C> Debug for RobinMap<K, V, S, C>
where
  K: Hash + Eq + Send + Debug + 'static,
  V: Send + Debug + 'static,
  S: BuildHasher,
  C: CollectorWeak,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    f.debug_struct("RobinMap")
      .field("capacity", &self.capacity())
      .field("version", &self.version())
      .field("entries", &self.inner)
      .finish()
  }
}

impl<K, V, S, C> Default for RobinMap<K, V, S, C>
where
  S: Default,
  C: CollectorWeak,
{
  #[inline]
  fn default() -> Self {
    Self::with_config(Config::new())
  }
}

// SAFETY: The map owns its entries; moving it moves the keys, values and
// hasher.
unsafe impl<K, V, S, C> Send for RobinMap<K, V, S, C>
where
  K: Send,
  V: Send,
  S: Send,
  C: CollectorWeak,
{
}

// SAFETY: Shared access hands out `&K` and `&V` to any thread, and entries
// inserted on one thread may be dropped on another, so both `Send` and
// `Sync` are required of keys and values.
unsafe impl<K, V, S, C> Sync for RobinMap<K, V, S, C>
where
  K: Send + Sync,
  V: Send + Sync,
  S: Sync,
  C: CollectorWeak,
{
}
