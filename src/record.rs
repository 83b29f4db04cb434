//! Reusable descriptor records.
//!
//! Each in-flight operation owns exactly one [`Record`], holding the RDCSS and
//! k-CAS descriptors it publishes. Records are claimed per operation and
//! released when the operation finishes; they are never freed before the
//! arena itself, so a stale handle can always be checked against its record's
//! current sequence number instead of dereferencing freed memory.

use core::cell::Cell;
use core::ptr;

use crate::backoff::Backoff;
use crate::backoff::BackoffPolicy;
use crate::kcas::KCasDescriptor;
use crate::rdcss::RdcssDescriptor;
use crate::sync::atomic::AtomicBool;
use crate::sync::atomic::AtomicPtr;
use crate::sync::atomic::Ordering::Acquire;
use crate::sync::atomic::Ordering::Relaxed;
use crate::sync::atomic::Ordering::Release;
use crate::word::MAX_RECORDS;

std::thread_local! {
  /// The record this thread claimed last; where the next search starts.
  static RECORD_HINT: Cell<usize> = const { Cell::new(0) };
}

/// The descriptors owned by one operation at a time.
pub(crate) struct Record {
  pub(crate) rdcss: RdcssDescriptor,
  pub(crate) kcas: KCasDescriptor,
}

impl Record {
  fn new() -> Self {
    Self {
      rdcss: RdcssDescriptor::new(),
      kcas: KCasDescriptor::new(),
    }
  }
}

// -----------------------------------------------------------------------------
// Record Arena
// -----------------------------------------------------------------------------

struct Slot {
  claimed: AtomicBool,
  record: AtomicPtr<Record>,
}

impl Slot {
  fn new() -> Self {
    Self {
      claimed: AtomicBool::new(false),
      record: AtomicPtr::new(ptr::null_mut()),
    }
  }
}

/// A fixed arena of [`MAX_RECORDS`] lazily allocated records.
pub(crate) struct Records {
  slots: Box<[Slot]>,
}

impl Records {
  pub(crate) fn new() -> Self {
    Self {
      slots: (0..MAX_RECORDS).map(|_| Slot::new()).collect(),
    }
  }

  /// Returns the record at `index`, if it was ever allocated.
  #[inline]
  pub(crate) fn get(&self, index: usize) -> Option<&Record> {
    let record: *mut Record = self.slots.get(index)?.record.load(Acquire);

    // SAFETY: Records are allocated once and freed only when `self` drops.
    unsafe { record.as_ref() }
  }

  /// Claims an unused record, waiting if every record is in use.
  pub(crate) fn claim(&self, policy: BackoffPolicy) -> Claim<'_> {
    let start: usize = RECORD_HINT.with(Cell::get);
    let mut backoff = policy.start();

    loop {
      for offset in 0..MAX_RECORDS {
        let index: usize = (start + offset) % MAX_RECORDS;
        let slot: &Slot = &self.slots[index];

        if slot.claimed.load(Relaxed) {
          continue;
        }

        if slot
          .claimed
          .compare_exchange(false, true, Acquire, Relaxed)
          .is_ok()
        {
          RECORD_HINT.with(|hint| hint.set(index));

          return Claim {
            index,
            record: Self::materialize(slot),
            slot,
          };
        }
      }

      log::trace!("all {MAX_RECORDS} descriptor records in use; backing off");

      backoff.backoff();
    }
  }

  #[inline]
  fn materialize(slot: &Slot) -> &Record {
    let mut record: *mut Record = slot.record.load(Acquire);

    if record.is_null() {
      record = Box::into_raw(Box::new(Record::new()));
      slot.record.store(record, Release);
    }

    // SAFETY: `record` is non-null and lives as long as the arena.
    unsafe { &*record }
  }
}

impl Drop for Records {
  fn drop(&mut self) {
    for slot in &self.slots {
      let record: *mut Record = slot.record.load(Relaxed);

      if !record.is_null() {
        // SAFETY: Allocated by `Box::into_raw` in `materialize`; `Drop`
        // provides exclusive access, so no handle can still be followed.
        drop(unsafe { Box::from_raw(record) });
      }
    }
  }
}

// -----------------------------------------------------------------------------
// Claim
// -----------------------------------------------------------------------------

/// Exclusive ownership of one record; released on drop.
pub(crate) struct Claim<'a> {
  index: usize,
  record: &'a Record,
  slot: &'a Slot,
}

impl<'a> Claim<'a> {
  #[inline]
  pub(crate) const fn index(&self) -> usize {
    self.index
  }

  #[inline]
  pub(crate) const fn record(&self) -> &'a Record {
    self.record
  }
}

impl Drop for Claim<'_> {
  #[inline]
  fn drop(&mut self) {
    self.slot.claimed.store(false, Release);
  }
}
