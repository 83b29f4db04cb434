//! Bucket tables.
//!
//! A table is a power-of-two array of bucket words plus one timestamp word
//! per shard of `1 << shard_shift` consecutive buckets. A bucket word is
//! [`EMPTY`] or the address of a heap-allocated [`Entry`]; entries are
//! immutable once published, so moving an entry only moves its address.
//!
//! Timestamps advance by [`STAMP_STEP`] whenever entries move within their
//! shard. Readers record timestamps before scanning a shard and re-check them
//! to confirm that a miss was not caused by a concurrent move. A resize sets
//! [`FROZEN`] on a shard before copying it out and [`MIGRATED`] once every
//! entry of the shard is present in the successor table.

use core::ops::Range;
use core::ptr;

use smallvec::SmallVec;

use crate::array::Array;
use crate::hash::MapToBucket;
use crate::kcas::Context;
use crate::kcas::RawWord;
use crate::params::Capacity;
use crate::sync::atomic::AtomicPtr;
use crate::sync::atomic::AtomicUsize;
use crate::sync::atomic::Ordering::AcqRel;
use crate::sync::atomic::Ordering::Acquire;
use crate::sync::atomic::Ordering::Relaxed;

/// The value of an unoccupied bucket.
pub(crate) const EMPTY: usize = 0;

/// Set on the timestamp of a shard that no mutation may change anymore.
pub(crate) const FROZEN: usize = 0b100;

/// Set on a frozen timestamp once its shard has been copied out.
pub(crate) const MIGRATED: usize = 0b1000;

/// The amount a timestamp advances per move.
pub(crate) const STAMP_STEP: usize = 0b10000;

/// Timestamp bits that do not count as a change.
const FLAGS: usize = FROZEN | MIGRATED;

/// Words of one planned mutation.
pub(crate) type Words = SmallVec<[RawWord; 16]>;

// -----------------------------------------------------------------------------
// Entry
// -----------------------------------------------------------------------------

/// A key-value pair with its cached hash.
#[repr(C, align(8))]
pub(crate) struct Entry<K, V> {
  pub(crate) hash: u64,
  pub(crate) key: K,
  pub(crate) value: V,
}

impl<K, V> Entry<K, V> {
  /// Moves a new entry onto the heap and returns its bucket word.
  #[inline]
  pub(crate) fn into_word(hash: u64, key: K, value: V) -> usize {
    Box::into_raw(Box::new(Self { hash, key, value })).expose_provenance()
  }

  /// Borrows the entry stored in a non-empty bucket word.
  ///
  /// # Safety
  ///
  /// `word` must come from [`Entry::into_word`] with the same `K` and `V`,
  /// and the entry must not be reclaimed during `'a`.
  #[inline]
  pub(crate) unsafe fn from_word<'a>(word: usize) -> &'a Self {
    debug_assert!(word != EMPTY);

    // SAFETY: Guaranteed by the caller.
    unsafe { &*ptr::with_exposed_provenance::<Self>(word) }
  }

  /// Returns the raw pointer behind a bucket word.
  #[inline]
  pub(crate) fn as_ptr(word: usize) -> *mut Self {
    ptr::with_exposed_provenance_mut::<Self>(word)
  }

  /// Frees the entry stored in a bucket word.
  ///
  /// # Safety
  ///
  /// `word` must come from [`Entry::into_word`] with the same `K` and `V`,
  /// and no other thread may access the entry anymore.
  #[inline]
  pub(crate) unsafe fn drop_word(word: usize) {
    // SAFETY: Guaranteed by the caller.
    drop(unsafe { Box::from_raw(Self::as_ptr(word)) });
  }
}

// -----------------------------------------------------------------------------
// Buckets
// -----------------------------------------------------------------------------

pub(crate) struct Buckets {
  words: Array<AtomicUsize>,
  stamps: Array<AtomicUsize>,
  /// The table this one is being migrated into, once a resize has begun.
  ///
  /// Not owned: it becomes the current table when the resize completes.
  successor: AtomicPtr<Buckets>,
  /// The next shard handed out to a migrating thread.
  cursor: AtomicUsize,
  capacity: Capacity,
  shard_shift: u32,
  map_to_bucket: MapToBucket,
}

impl Buckets {
  pub(crate) fn new(capacity: Capacity, stamp_shift: u32, map_to_bucket: MapToBucket) -> Self {
    let shard_shift: u32 = stamp_shift.min(capacity.log2());

    Self {
      words: new_words(capacity.as_usize()),
      stamps: new_words(capacity.as_usize() >> shard_shift),
      successor: AtomicPtr::new(ptr::null_mut()),
      cursor: AtomicUsize::new(0),
      capacity,
      shard_shift,
      map_to_bucket,
    }
  }

  #[inline]
  pub(crate) const fn capacity(&self) -> Capacity {
    self.capacity
  }

  #[inline]
  pub(crate) const fn len(&self) -> usize {
    self.capacity.as_usize()
  }

  #[inline]
  pub(crate) const fn shards(&self) -> usize {
    self.stamps.len()
  }

  #[inline]
  pub(crate) const fn shard_len(&self) -> usize {
    1 << self.shard_shift
  }

  #[inline]
  const fn mask(&self) -> usize {
    self.len() - 1
  }

  #[inline]
  pub(crate) fn home(&self, hash: u64) -> usize {
    self.map_to_bucket.index(hash, self.len())
  }

  /// Returns the home of `hash` in a table of `capacity` buckets.
  #[inline]
  pub(crate) fn home_in(&self, hash: u64, capacity: Capacity) -> usize {
    self.map_to_bucket.index(hash, capacity.as_usize())
  }

  /// Returns how far an entry with `hash` sits from its home bucket.
  #[inline]
  pub(crate) fn displacement(&self, hash: u64, position: usize) -> usize {
    position.wrapping_sub(self.home(hash)) & self.mask()
  }

  #[inline]
  pub(crate) const fn next(&self, position: usize) -> usize {
    (position + 1) & self.mask()
  }

  #[inline]
  pub(crate) const fn shard(&self, position: usize) -> usize {
    position >> self.shard_shift
  }

  #[inline]
  pub(crate) const fn is_shard_start(&self, position: usize) -> bool {
    position & (self.shard_len() - 1) == 0
  }

  /// Returns the positions covered by `shard`.
  #[inline]
  pub(crate) const fn shard_range(&self, shard: usize) -> Range<usize> {
    let start: usize = shard << self.shard_shift;

    start..start + self.shard_len()
  }

  #[inline]
  pub(crate) fn bucket(&self, position: usize) -> &AtomicUsize {
    self.words.get(position)
  }

  #[inline]
  pub(crate) fn stamp(&self, shard: usize) -> &AtomicUsize {
    self.stamps.get(shard)
  }

  #[inline]
  pub(crate) fn buckets(&self) -> &[AtomicUsize] {
    self.words.as_slice()
  }

  #[inline]
  pub(crate) fn stamps(&self) -> &[AtomicUsize] {
    self.stamps.as_slice()
  }

  /// Returns the table this one is being migrated into, if any.
  #[inline]
  pub(crate) fn successor(&self) -> Option<&Buckets> {
    // SAFETY: A successor is freed only after it has been published and
    // then replaced in turn, under the same collector that keeps `self`
    // alive.
    unsafe { self.successor.load(Acquire).as_ref() }
  }

  /// Links `next` as the successor unless another thread got there first.
  ///
  /// Returns whichever table ended up linked.
  pub(crate) fn link(&self, next: Buckets) -> &Buckets {
    let next: *mut Buckets = Box::into_raw(Box::new(next));

    match self
      .successor
      .compare_exchange(ptr::null_mut(), next, AcqRel, Acquire)
    {
      // SAFETY: Published above; see `successor`.
      Ok(_) => unsafe { &*next },
      Err(current) => {
        // SAFETY: `next` was never shared.
        drop(unsafe { Box::from_raw(next) });

        // SAFETY: See `successor`.
        unsafe { &*current }
      }
    }
  }

  /// Takes the successor of a table that is being dropped.
  ///
  /// Only a resize that never finished leaves one behind.
  pub(crate) fn take_successor(&mut self) -> Option<Box<Buckets>> {
    let next: *mut Buckets = self.successor.swap(ptr::null_mut(), Relaxed);

    // SAFETY: Created by `link`; the successor was never published, so the
    // owner of `self` is its only owner.
    (!next.is_null()).then(|| unsafe { Box::from_raw(next) })
  }

  /// Hands out the next shard to migrate, until every shard was handed out.
  #[inline]
  pub(crate) fn claim_shard(&self) -> Option<usize> {
    if self.cursor.load(Relaxed) >= self.shards() {
      return None;
    }

    let shard: usize = self.cursor.fetch_add(1, Relaxed);

    (shard < self.shards()).then_some(shard)
  }
}

#[cfg(not(any(loom, shuttle)))]
fn new_words(length: usize) -> Array<AtomicUsize> {
  // SAFETY: All-zeros is a valid `AtomicUsize` holding `EMPTY`.
  unsafe { Array::<AtomicUsize>::new_zeroed(length).assume_init() }
}

#[cfg(any(loom, shuttle))]
fn new_words(length: usize) -> Array<AtomicUsize> {
  Array::new(length, |_, word: &mut core::mem::MaybeUninit<AtomicUsize>| {
    word.write(AtomicUsize::new(EMPTY));
  })
}

// -----------------------------------------------------------------------------
// Timestamp Set
// -----------------------------------------------------------------------------

/// The timestamps of every shard an operation has visited.
#[derive(Default)]
pub(crate) struct Stamps {
  seen: SmallVec<[(usize, usize); 4]>,
}

impl Stamps {
  #[inline]
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn clear(&mut self) {
    self.seen.clear();
  }

  /// Records the timestamp of the shard holding `position`, once per shard.
  ///
  /// Returns the recorded value.
  pub(crate) fn observe(&mut self, buckets: &Buckets, position: usize, ctx: &mut Context<'_>) -> usize {
    let shard: usize = buckets.shard(position);

    if let Some(&(_, value)) = self.seen.iter().find(|(seen, _)| *seen == shard) {
      return value;
    }

    let value: usize = ctx.read(buckets.stamp(shard));

    self.seen.push((shard, value));

    value
  }

  /// Returns `true` if no visited shard has moved entries since observation.
  ///
  /// Freezing and migration do not count as a change: a frozen shard is
  /// immutable.
  pub(crate) fn validate(&self, buckets: &Buckets, ctx: &mut Context<'_>) -> bool {
    self.seen.iter().all(|&(shard, value)| {
      (ctx.read(buckets.stamp(shard)) | FLAGS) == (value | FLAGS)
    })
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.seen.len()
  }

  /// Appends one k-CAS word per visited shard.
  ///
  /// Timestamps advance if `moved`, and are only compared otherwise.
  pub(crate) fn commit(&self, buckets: &Buckets, moved: bool, words: &mut Words) {
    for &(shard, value) in &self.seen {
      let new: usize = if moved { value.wrapping_add(STAMP_STEP) } else { value };

      words.push(RawWord::new(buckets.stamp(shard), value, new));
    }
  }
}
