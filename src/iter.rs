use core::fmt::Debug;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;
use core::iter::FusedIterator;

use smallvec::SmallVec;

use crate::backoff::Backoff;
use crate::bucket::Buckets;
use crate::bucket::EMPTY;
use crate::bucket::Entry;
use crate::bucket::Stamps;
use crate::kcas::Context;
use crate::kcas::Engine;

// -----------------------------------------------------------------------------
// Entry Reference
// -----------------------------------------------------------------------------

/// A borrowed map entry, valid while the guard it was obtained with lives.
///
/// The entry may be erased concurrently; the reference stays valid anyway,
/// it just no longer describes a member of the map.
pub struct EntryRef<'g, K, V> {
  entry: &'g Entry<K, V>,
}

impl<'g, K, V> EntryRef<'g, K, V> {
  #[inline]
  pub(crate) const fn new(entry: &'g Entry<K, V>) -> Self {
    Self { entry }
  }

  #[inline]
  pub(crate) const fn entry(&self) -> &'g Entry<K, V> {
    self.entry
  }

  /// Returns the key.
  #[inline]
  pub const fn key(&self) -> &'g K {
    &self.entry.key
  }

  /// Returns the value.
  #[inline]
  pub const fn value(&self) -> &'g V {
    &self.entry.value
  }

  /// Returns the cached hash of the key.
  #[inline]
  pub const fn hash(&self) -> u64 {
    self.entry.hash
  }

  /// Returns the key and the value.
  #[inline]
  pub const fn pair(&self) -> (&'g K, &'g V) {
    (&self.entry.key, &self.entry.value)
  }
}

impl<K, V> Clone for EntryRef<'_, K, V> {
  #[inline]
  fn clone(&self) -> Self {
    *self
  }
}

impl<K, V> Copy for EntryRef<'_, K, V> {}

impl<K, V> Debug for EntryRef<'_, K, V>
where
  K: Debug,
  V: Debug,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("EntryRef")
      .field("key", &self.entry.key)
      .field("value", &self.entry.value)
      .finish()
  }
}

// -----------------------------------------------------------------------------
// Iterator
// -----------------------------------------------------------------------------

/// An iterator over the entries of a [`RobinMap`].
///
/// Iteration is weakly consistent. Entries are collected one shard at a time,
/// grouped by the shard of their home bucket, and each batch is re-validated
/// against the shard timestamps, so no entry is yielded twice. Entries
/// inserted or erased during iteration may or may not be observed. A resize
/// started during iteration does not disturb it; the old table stays
/// readable while the guard lives.
///
/// [`RobinMap`]: crate::RobinMap
pub struct Iter<'g, K, V> {
  buckets: &'g Buckets,
  engine: &'g Engine,
  shard: usize,
  batch: SmallVec<[&'g Entry<K, V>; 16]>,
  stamps: Stamps,
}

impl<'g, K, V> Iter<'g, K, V> {
  #[inline]
  pub(crate) fn new(buckets: &'g Buckets, engine: &'g Engine) -> Self {
    Self {
      buckets,
      engine,
      shard: 0,
      batch: SmallVec::new(),
      stamps: Stamps::new(),
    }
  }

  /// Collects, in reverse, every entry whose home is in the current shard.
  ///
  /// A descriptor record is held only for the duration of one batch, so
  /// parked iterators never exhaust the record arena.
  fn collect(&mut self) {
    let buckets: &'g Buckets = self.buckets;
    let start: usize = self.shard * buckets.shard_len();
    let mut ctx: Context<'g> = self.engine.context();
    let mut backoff = ctx.policy().start();

    loop {
      self.batch.clear();
      self.stamps.clear();

      let mut position: usize = start;

      // Scan the shard itself, then its overflow into the following buckets
      // until the run ends or reaches entries homed further on.
      for step in 0..buckets.len() {
        if step == 0 || buckets.is_shard_start(position) {
          self.stamps.observe(buckets, position, &mut ctx);
        }

        let current: usize = ctx.read(buckets.bucket(position));
        let overflow: bool = step >= buckets.shard_len();

        if current == EMPTY {
          if overflow {
            break;
          }
        } else {
          // SAFETY: Non-empty buckets hold live entries while the guard lives.
          let entry: &'g Entry<K, V> = unsafe { Entry::from_word(current) };

          if buckets.shard(buckets.home(entry.hash)) == self.shard {
            self.batch.push(entry);
          } else if overflow {
            break;
          }
        }

        position = buckets.next(position);
      }

      if self.stamps.validate(buckets, &mut ctx) {
        self.batch.reverse();
        return;
      }

      backoff.backoff();
    }
  }
}

impl<'g, K, V> Iterator for Iter<'g, K, V> {
  type Item = (&'g K, &'g V);

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      if let Some(entry) = self.batch.pop() {
        return Some((&entry.key, &entry.value));
      }

      if self.shard == self.buckets.shards() {
        return None;
      }

      self.collect();
      self.shard += 1;
    }
  }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Debug for Iter<'_, K, V> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("Iter")
      .field("shard", &self.shard)
      .field("shards", &self.buckets.shards())
      .finish_non_exhaustive()
  }
}
