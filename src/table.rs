//! Core map implementation.
//!
//! Every mutation is planned by reading the current bucket table through the
//! k-CAS engine, then committed as a single k-CAS covering each bucket it
//! read or moves plus the timestamps of every shard it visited. A plan that
//! loses a race simply fails and is rebuilt.
//!
//! Growing links a table of twice the size behind the current one. Shards are
//! then frozen and copied into it one at a time, by whichever threads take
//! part: the resizer, and every mutator that runs into a frozen shard. The
//! thread that finds the last shard copied publishes the new table.

use core::borrow::Borrow;
use core::fmt::Debug;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::marker::PhantomData;
use core::ptr;

use crossbeam_utils::CachePadded;

use crate::backoff::Backoff;
use crate::bucket::Buckets;
use crate::bucket::EMPTY;
use crate::bucket::Entry;
use crate::bucket::FROZEN;
use crate::bucket::MIGRATED;
use crate::bucket::Stamps;
use crate::bucket::Words;
use crate::error::ConfigError;
use crate::iter::Iter;
use crate::kcas::Context;
use crate::kcas::Engine;
use crate::kcas::INLINE_WORDS;
use crate::kcas::RawWord;
use crate::params::Capacity;
use crate::params::Config;
use crate::reclaim::CollectorWeak;
use crate::sync::atomic::AtomicPtr;
use crate::sync::atomic::AtomicUsize;
use crate::sync::atomic::Ordering::AcqRel;
use crate::sync::atomic::Ordering::Acquire;
use crate::sync::atomic::Ordering::Relaxed;
use crate::sync::atomic::Ordering::Release;
use crate::word::is_plain;

/// The outcome of planning an insertion.
enum Insert<'g, K, V> {
  Commit(Words),
  Found(&'g Entry<K, V>),
  Frozen,
  Full,
}

/// The outcome of planning an erasure.
enum Erase {
  Commit(Words, usize),
  Missing(Stamps),
  Frozen,
}

#[inline]
fn is_frozen(stamp: usize) -> bool {
  stamp & FROZEN != 0
}

// -----------------------------------------------------------------------------
// Table State
// -----------------------------------------------------------------------------

#[repr(C)]
pub(crate) struct Table<K, V, S, C> {
  volatile: CachePadded<Volatile>,
  readonly: CachePadded<ReadOnly<S>>,
  marker: PhantomData<(Box<Entry<K, V>>, fn(C))>,
}

impl<K, V, S, C> Table<K, V, S, C>
where
  C: CollectorWeak,
{
  #[inline]
  pub(crate) fn new(config: Config, hasher: S) -> Result<Self, ConfigError> {
    config.validate()?;

    let capacity: Capacity = config.capacity()?;
    let buckets: Buckets = Buckets::new(capacity, config.stamp_shift(), config.map_to_bucket());

    Ok(Self {
      volatile: CachePadded::new(Volatile::new()),
      readonly: CachePadded::new(ReadOnly {
        buckets: AtomicPtr::new(Box::into_raw(Box::new(buckets))),
        engine: Engine::new(config.backoff()),
        config,
        hasher,
      }),
      marker: PhantomData,
    })
  }

  #[inline]
  pub(crate) fn config(&self) -> &Config {
    &self.readonly.config
  }

  #[inline]
  pub(crate) fn hasher(&self) -> &S {
    &self.readonly.hasher
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    let entries: usize = self.volatile.entries.load(Relaxed);

    // An erase may be counted before the insert it undoes.
    if entries > isize::MAX as usize { 0 } else { entries }
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns the number of completed resizes.
  #[inline]
  pub(crate) fn version(&self) -> usize {
    self.volatile.version.load(Acquire)
  }

  #[inline]
  pub(crate) fn capacity(&self) -> usize {
    let guard: C::Guard = C::guard();

    self.buckets(&guard).len()
  }

  #[inline]
  pub(crate) fn buckets<'g>(&'g self, _guard: &'g C::Guard) -> &'g Buckets {
    // SAFETY: A bucket table is retired only after being replaced, and the
    // guard keeps anything loaded while it is alive from being reclaimed.
    unsafe { &*self.readonly.buckets.load(Acquire) }
  }

  #[inline]
  fn is_current(&self, buckets: &Buckets) -> bool {
    ptr::eq(self.readonly.buckets.load(Acquire), buckets)
  }
}

impl<K, V, S, C> Table<K, V, S, C>
where
  K: Hash + Eq + Send + 'static,
  V: Send + 'static,
  S: BuildHasher,
  C: CollectorWeak,
{
  #[inline]
  fn hash<Q>(&self, key: &Q) -> u64
  where
    Q: Hash + ?Sized,
  {
    self.readonly.hasher.hash_one(key)
  }

  /// Inserts `key` unless it is present.
  ///
  /// Returns the entry now stored under `key` and whether it is the new one.
  #[track_caller]
  pub(crate) fn insert<'g>(&'g self, key: K, value: V, guard: &'g C::Guard) -> (&'g Entry<K, V>, bool) {
    let hash: u64 = self.hash(&key);
    let word: usize = Entry::into_word(hash, key, value);

    // SAFETY: The entry is either freed below without being published, or is
    // published and then only retired under a guard.
    let entry: &'g Entry<K, V> = unsafe { Entry::from_word(word) };

    let mut ctx: Context<'g> = self.readonly.engine.context();
    let mut backoff = ctx.policy().start();

    loop {
      let buckets: &'g Buckets = self.buckets(guard);

      match self.plan_insert(buckets, entry, word, &mut ctx) {
        Insert::Commit(mut words) => {
          let long: bool = words.len() > INLINE_WORDS;

          // SAFETY: Every target lives in `buckets`, which `guard` keeps alive.
          if unsafe { ctx.kcas(&mut words) } {
            self.volatile.entries.fetch_add(1, Relaxed);

            if self.len() > self.readonly.config.threshold(buckets.capacity())
              || (long && self.splits_run(buckets, hash, &mut ctx))
            {
              self.grow(buckets, guard, &mut ctx);
            }

            return (entry, true);
          }
        }
        Insert::Found(existing) => {
          // SAFETY: The new entry was never published.
          unsafe { Entry::<K, V>::drop_word(word) };

          return (existing, false);
        }
        Insert::Frozen => {
          log::trace!("insert found a frozen shard; helping the resize");
          self.help_resize(buckets, guard, &mut ctx);
          continue;
        }
        Insert::Full => {
          self.grow_or_panic(buckets, guard, &mut ctx);
          continue;
        }
      }

      backoff.backoff();
    }
  }

  /// Removes `key`, returning `true` if it was present.
  pub(crate) fn erase<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let hash: u64 = self.hash(key);

    self.remove(hash, |entry| entry.key.borrow() == key)
  }

  /// Removes `entry` itself, returning `false` if it is no longer present.
  ///
  /// An entry erased and then re-inserted under the same key is a different
  /// entry and is left alone.
  pub(crate) fn erase_entry(&self, entry: &Entry<K, V>) -> bool {
    self.remove(entry.hash, |resident| ptr::eq(resident, entry))
  }

  fn remove<F>(&self, hash: u64, matches: F) -> bool
  where
    F: Fn(&Entry<K, V>) -> bool,
  {
    let guard: C::Guard = C::guard();
    let mut ctx: Context<'_> = self.readonly.engine.context();
    let mut backoff = ctx.policy().start();

    loop {
      let buckets: &Buckets = self.buckets(&guard);

      match self.plan_erase(buckets, hash, &matches, &mut ctx) {
        Erase::Commit(mut words, word) => {
          // SAFETY: Every target lives in `buckets`, which `guard` keeps alive.
          if unsafe { ctx.kcas(&mut words) } {
            self.volatile.entries.fetch_sub(1, Relaxed);

            // SAFETY: The k-CAS above unlinked the entry from the only table
            // it was reachable from.
            unsafe { C::retire(Entry::<K, V>::as_ptr(word), &guard) };

            return true;
          }
        }
        Erase::Missing(stamps) => {
          if stamps.validate(buckets, &mut ctx) {
            return false;
          }
        }
        Erase::Frozen => {
          log::trace!("erase found a frozen shard; helping the resize");
          self.help_resize(buckets, &guard, &mut ctx);
          continue;
        }
      }

      backoff.backoff();
    }
  }

  /// Looks up `key`.
  pub(crate) fn find<'g, Q>(&'g self, key: &Q, guard: &'g C::Guard) -> Option<&'g Entry<K, V>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let hash: u64 = self.hash(key);
    let mut ctx: Context<'g> = self.readonly.engine.context();
    let mut backoff = ctx.policy().start();
    let mut stamps: Stamps = Stamps::new();

    loop {
      let buckets: &'g Buckets = self.buckets(guard);

      stamps.clear();

      if let Some(entry) = Self::search(buckets, hash, key, &mut stamps, &mut ctx) {
        return Some(entry);
      }

      if stamps.validate(buckets, &mut ctx) {
        return None;
      }

      backoff.backoff();
    }
  }

  #[inline]
  pub(crate) fn iter<'g>(&'g self, guard: &'g C::Guard) -> Iter<'g, K, V> {
    Iter::new(self.buckets(guard), &self.readonly.engine)
  }

  // ---------------------------------------------------------------------------
  // Planning
  // ---------------------------------------------------------------------------

  fn search<'g, Q>(
    buckets: &'g Buckets,
    hash: u64,
    key: &Q,
    stamps: &mut Stamps,
    ctx: &mut Context<'_>,
  ) -> Option<&'g Entry<K, V>>
  where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
  {
    let mut position: usize = buckets.home(hash);

    for distance in 0..buckets.len() {
      if distance == 0 || buckets.is_shard_start(position) {
        stamps.observe(buckets, position, ctx);
      }

      let current: usize = ctx.read(buckets.bucket(position));

      if current == EMPTY {
        return None;
      }

      // SAFETY: Non-empty buckets hold live entries while the caller is pinned.
      let entry: &'g Entry<K, V> = unsafe { Entry::from_word(current) };

      if entry.hash == hash && entry.key.borrow() == key {
        return Some(entry);
      }

      if buckets.displacement(entry.hash, position) < distance {
        return None;
      }

      position = buckets.next(position);
    }

    None
  }

  fn plan_insert<'g>(
    &self,
    buckets: &'g Buckets,
    entry: &Entry<K, V>,
    word: usize,
    ctx: &mut Context<'_>,
  ) -> Insert<'g, K, V> {
    let mut stamps: Stamps = Stamps::new();
    let mut words: Words = Words::new();
    let mut position: usize = buckets.home(entry.hash);
    let mut distance: usize = 0;
    let mut current: usize;

    // Find the key or the bucket the new entry belongs in. Every bucket passed
    // over is compared so the search cannot be invalidated underneath us.
    loop {
      if distance == buckets.len() {
        return Insert::Full;
      }

      if (distance == 0 || buckets.is_shard_start(position))
        && is_frozen(stamps.observe(buckets, position, ctx))
      {
        return Insert::Frozen;
      }

      current = ctx.read(buckets.bucket(position));

      if current == EMPTY {
        break;
      }

      // SAFETY: Non-empty buckets hold live entries while the caller is pinned.
      let resident: &'g Entry<K, V> = unsafe { Entry::from_word(current) };

      if resident.hash == entry.hash && resident.key == entry.key {
        return Insert::Found(resident);
      }

      if buckets.displacement(resident.hash, position) < distance {
        break;
      }

      words.push(RawWord::compare(buckets.bucket(position), current));

      position = buckets.next(position);
      distance += 1;
    }

    let moved: bool = current != EMPTY;
    let mut carry: usize = word;

    // Each displaced resident moves one bucket forward until the run ends.
    loop {
      words.push(RawWord::new(buckets.bucket(position), current, carry));

      if current == EMPTY {
        break;
      }

      carry = current;
      position = buckets.next(position);
      distance += 1;

      if distance == buckets.len() {
        return Insert::Full;
      }

      if buckets.is_shard_start(position) && is_frozen(stamps.observe(buckets, position, ctx)) {
        return Insert::Frozen;
      }

      current = ctx.read(buckets.bucket(position));
    }

    stamps.commit(buckets, moved, &mut words);

    Insert::Commit(words)
  }

  fn plan_erase<F>(&self, buckets: &Buckets, hash: u64, matches: &F, ctx: &mut Context<'_>) -> Erase
  where
    F: Fn(&Entry<K, V>) -> bool,
  {
    let mut stamps: Stamps = Stamps::new();
    let mut position: usize = buckets.home(hash);
    let mut distance: usize = 0;

    let found: usize = loop {
      if distance == buckets.len() {
        return Erase::Missing(stamps);
      }

      if (distance == 0 || buckets.is_shard_start(position))
        && is_frozen(stamps.observe(buckets, position, ctx))
      {
        return Erase::Frozen;
      }

      let current: usize = ctx.read(buckets.bucket(position));

      if current == EMPTY {
        return Erase::Missing(stamps);
      }

      // SAFETY: Non-empty buckets hold live entries while the caller is pinned.
      let resident: &Entry<K, V> = unsafe { Entry::from_word(current) };

      if resident.hash == hash && matches(resident) {
        break current;
      }

      if buckets.displacement(resident.hash, position) < distance {
        return Erase::Missing(stamps);
      }

      position = buckets.next(position);
      distance += 1;
    };

    let start: usize = position;
    let mut words: Words = Words::new();
    let mut hole: usize = position;
    let mut hole_word: usize = found;

    position = buckets.next(position);

    // Shift the rest of the run back by one. The bucket that ends the run is
    // compared so nothing can slip in behind the shifted entries.
    loop {
      // Every other bucket belongs to the run; the last hole stays empty.
      if position == start {
        words.push(RawWord::new(buckets.bucket(hole), hole_word, EMPTY));
        break;
      }

      if buckets.is_shard_start(position) && is_frozen(stamps.observe(buckets, position, ctx)) {
        return Erase::Frozen;
      }

      let current: usize = ctx.read(buckets.bucket(position));

      let ends: bool = current == EMPTY || {
        // SAFETY: Non-empty buckets hold live entries while the caller is pinned.
        let resident: &Entry<K, V> = unsafe { Entry::from_word(current) };

        buckets.displacement(resident.hash, position) == 0
      };

      if ends {
        words.push(RawWord::new(buckets.bucket(hole), hole_word, EMPTY));
        words.push(RawWord::compare(buckets.bucket(position), current));
        break;
      }

      words.push(RawWord::new(buckets.bucket(hole), hole_word, current));

      hole = position;
      hole_word = current;
      position = buckets.next(position);
    }

    stamps.commit(buckets, words.len() > 2, &mut words);

    Erase::Commit(words, found)
  }

  // ---------------------------------------------------------------------------
  // Resize
  // ---------------------------------------------------------------------------

  /// Returns `true` if doubling `buckets` would split the run that starts at
  /// the home of `hash`.
  ///
  /// Entries sharing a home in the doubled table stay in one run at any
  /// capacity; growing for them only costs memory.
  #[cold]
  #[inline(never)]
  fn splits_run(&self, buckets: &Buckets, hash: u64, ctx: &mut Context<'_>) -> bool {
    let Some(capacity) = buckets.capacity().doubled() else {
      return false;
    };

    let mut homes: Vec<usize> = Vec::new();
    let mut position: usize = buckets.home(hash);

    for _ in 0..buckets.len() {
      let word: usize = ctx.read(buckets.bucket(position));

      if word == EMPTY {
        break;
      }

      // SAFETY: Non-empty buckets hold live entries while the caller is pinned.
      let entry: &Entry<K, V> = unsafe { Entry::from_word(word) };

      homes.push(buckets.home_in(entry.hash, capacity));
      position = buckets.next(position);
    }

    homes.sort_unstable();

    let largest: usize = homes.chunk_by(|a, b| a == b).map(<[usize]>::len).max().unwrap_or(0);

    largest * 2 <= homes.len()
  }

  #[cold]
  #[inline(never)]
  #[track_caller]
  fn grow_or_panic(&self, buckets: &Buckets, guard: &C::Guard, ctx: &mut Context<'_>) {
    if !self.grow(buckets, guard, ctx) {
      panic!("map is full at maximum capacity ({:?})", Capacity::MAX);
    }
  }

  /// Replaces `old` with a table twice its size, helping any thread that
  /// already started doing so.
  ///
  /// Returns `false` only if `old` is already at [`Capacity::MAX`].
  #[cold]
  #[inline(never)]
  fn grow(&self, old: &Buckets, guard: &C::Guard, ctx: &mut Context<'_>) -> bool {
    let Some(capacity) = old.capacity().doubled() else {
      return false;
    };

    let new: &Buckets = match old.successor() {
      Some(new) => new,
      None if self.is_current(old) => {
        log::debug!("growing table from {} to {} buckets", old.len(), capacity.as_usize());

        let config: &Config = &self.readonly.config;

        old.link(Buckets::new(capacity, config.stamp_shift(), config.map_to_bucket()))
      }
      None => return true,
    };

    self.migrate(old, new, guard, ctx);

    true
  }

  /// Finishes the resize that froze a shard of `old`.
  #[cold]
  #[inline(never)]
  fn help_resize(&self, old: &Buckets, guard: &C::Guard, ctx: &mut Context<'_>) {
    if let Some(new) = old.successor() {
      self.migrate(old, new, guard, ctx);
    }
  }

  /// Copies every shard of `old` into `new`, then publishes `new`.
  ///
  /// Any number of threads may run this at once. Shards are handed out in
  /// order first; the sweep after that covers shards whose claimant stalled.
  fn migrate(&self, old: &Buckets, new: &Buckets, guard: &C::Guard, ctx: &mut Context<'_>) {
    while let Some(shard) = old.claim_shard() {
      self.migrate_shard(old, new, shard, ctx);
    }

    for shard in 0..old.shards() {
      self.migrate_shard(old, new, shard, ctx);
    }

    let prev: *mut Buckets = ptr::from_ref(old).cast_mut();
    let next: *mut Buckets = ptr::from_ref(new).cast_mut();

    if self
      .readonly
      .buckets
      .compare_exchange(prev, next, AcqRel, Acquire)
      .is_ok()
    {
      self.volatile.version.fetch_add(1, Release);

      // SAFETY: `prev` came from `Box::into_raw` and is no longer reachable by
      // threads that load the table after the exchange above. Only the thread
      // that won the exchange retires it.
      unsafe { C::retire(prev, guard) };

      log::debug!("table grown to {} buckets", new.len());
    }
  }

  /// Freezes `shard` of `old` and inserts each of its entries into `new`.
  ///
  /// Every insertion also compares the frozen timestamp, so one planned
  /// before the shard was marked migrated cannot land in `new` after it may
  /// have been published and changed.
  fn migrate_shard(&self, old: &Buckets, new: &Buckets, shard: usize, ctx: &mut Context<'_>) {
    let Some(stamp) = Self::freeze(old, shard, ctx) else {
      return;
    };

    for position in old.shard_range(shard) {
      let word: usize = ctx.read(old.bucket(position));

      if word == EMPTY {
        continue;
      }

      // SAFETY: The shard is frozen and the caller is pinned.
      let entry: &Entry<K, V> = unsafe { Entry::from_word(word) };
      let mut backoff = ctx.policy().start();

      loop {
        match self.plan_insert(new, entry, word, ctx) {
          Insert::Commit(mut words) => {
            words.push(RawWord::compare(old.stamp(shard), stamp));

            // SAFETY: The caller's guard keeps both tables alive.
            if unsafe { ctx.kcas(&mut words) } {
              break;
            }
          }
          Insert::Found(_) => break,
          Insert::Frozen | Insert::Full => {}
        }

        if ctx.read(old.stamp(shard)) != stamp {
          return;
        }

        backoff.backoff();
      }
    }

    let mut words: [RawWord; 1] = [RawWord::new(old.stamp(shard), stamp, stamp | MIGRATED)];

    // SAFETY: The caller's guard keeps `old` alive. Losing means another
    // thread marked the shard first.
    _ = unsafe { ctx.kcas(&mut words) };
  }

  /// Sets [`FROZEN`] on the timestamp of `shard`.
  ///
  /// Returns the frozen timestamp, or `None` if the shard is already
  /// migrated. Once frozen, every mutation that visits the shard fails to
  /// commit.
  fn freeze(buckets: &Buckets, shard: usize, ctx: &mut Context<'_>) -> Option<usize> {
    let stamp: &AtomicUsize = buckets.stamp(shard);
    let mut backoff = ctx.policy().start();

    loop {
      let value: usize = ctx.read(stamp);

      if value & MIGRATED != 0 {
        return None;
      }

      if is_frozen(value) {
        return Some(value);
      }

      let mut words: [RawWord; 1] = [RawWord::new(stamp, value, value | FROZEN)];

      // SAFETY: The caller's guard keeps `buckets` alive.
      if unsafe { ctx.kcas(&mut words) } {
        return Some(value | FROZEN);
      }

      backoff.backoff();
    }
  }

  /// Returns `(hash, displacement)` for every bucket of the current table.
  #[cfg(test)]
  pub(crate) fn layout(&self) -> Vec<Option<(u64, usize)>> {
    let guard: C::Guard = C::guard();
    let buckets: &Buckets = self.buckets(&guard);
    let mut ctx: Context<'_> = self.readonly.engine.context();

    (0..buckets.len())
      .map(|position| {
        let word: usize = ctx.read(buckets.bucket(position));

        if word == EMPTY {
          return None;
        }

        // SAFETY: The table is alive and the guard is held.
        let entry: &Entry<K, V> = unsafe { Entry::from_word(word) };

        Some((entry.hash, buckets.displacement(entry.hash, position)))
      })
      .collect()
  }

  /// Freezes one shard and starts a resize without finishing it, as a
  /// resizer that stalled right after its first shard would.
  #[cfg(test)]
  pub(crate) fn start_resize(&self) {
    let guard: C::Guard = C::guard();
    let old: &Buckets = self.buckets(&guard);
    let mut ctx: Context<'_> = self.readonly.engine.context();

    let Some(capacity) = old.capacity().doubled() else {
      return;
    };

    let config: &Config = &self.readonly.config;

    old.link(Buckets::new(capacity, config.stamp_shift(), config.map_to_bucket()));

    if let Some(shard) = old.claim_shard() {
      _ = Self::freeze(old, shard, &mut ctx);
    }
  }
}

impl<K, V, S, C> Drop for Table<K, V, S, C> {
  fn drop(&mut self) {
    let buckets: *mut Buckets = self.readonly.buckets.load(Relaxed);

    // SAFETY: `Drop` provides exclusive access; the current table was created
    // by `Box::into_raw` and never retired.
    let mut buckets: Box<Buckets> = unsafe { Box::from_raw(buckets) };

    // An unpublished successor only holds copies of entries owned below.
    drop(buckets.take_successor());

    for bucket in buckets.buckets() {
      let word: usize = bucket.load(Relaxed);

      debug_assert!(is_plain(word));

      if word != EMPTY {
        // SAFETY: No operation is in flight, so every entry is owned by the
        // table and reachable from exactly one bucket.
        unsafe { Entry::<K, V>::drop_word(word) };
      }
    }
  }
}

impl<K, V, S, C> Debug for Table<K, V, S, C>
where
  K: Hash + Eq + Send + Debug + 'static,
  V: Send + Debug + 'static,
  S: BuildHasher,
  C: CollectorWeak,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    let guard: C::Guard = C::guard();

    f.debug_map().entries(self.iter(&guard)).finish()
  }
}

// -----------------------------------------------------------------------------
// Volatile State
// -----------------------------------------------------------------------------

/// Counters updated by mutations.
///
/// Isolated from [`ReadOnly`] via cache padding to avoid false sharing.
#[repr(C)]
struct Volatile {
  /// Current number of live entries.
  entries: AtomicUsize,
  /// Completed resizes.
  version: AtomicUsize,
}

impl Volatile {
  #[inline]
  fn new() -> Self {
    Self {
      entries: AtomicUsize::new(0),
      version: AtomicUsize::new(0),
    }
  }
}

// -----------------------------------------------------------------------------
// Read-mostly State
// -----------------------------------------------------------------------------

/// State read by every operation and written only by resizes.
#[repr(C)]
struct ReadOnly<S> {
  /// The current bucket table.
  buckets: AtomicPtr<Buckets>,
  /// Descriptor records shared by every operation on this map.
  engine: Engine,
  config: Config,
  hasher: S,
}
