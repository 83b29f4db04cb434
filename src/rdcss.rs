//! Restricted double-compare single-swap.
//!
//! `rdcss` writes `new_data` into a data word only if the data word holds
//! `expected_data` *and* a separate control word holds `expected_control`.
//! It works by first installing a tagged handle to its descriptor into the
//! data word, then reading the control word and resolving the handle to
//! either the new or the expected value. Any thread that meets the handle can
//! resolve it with [`complete`].

use core::ptr;

use crate::backoff::Backoff;
use crate::backoff::BackoffPolicy;
use crate::record::Records;
use crate::sync::atomic::AtomicPtr;
use crate::sync::atomic::AtomicUsize;
use crate::sync::atomic::Ordering::Acquire;
use crate::sync::atomic::Ordering::Relaxed;
use crate::sync::atomic::Ordering::Release;
use crate::sync::atomic::Ordering::SeqCst;
use crate::word::Handle;
use crate::word::Word;
use crate::word::next_sequence;

/// The arguments of one RDCSS.
#[derive(Clone, Copy)]
pub(crate) struct Rdcss<'a> {
  pub(crate) control: &'a AtomicUsize,
  pub(crate) expected_control: usize,
  pub(crate) data: &'a AtomicUsize,
  pub(crate) expected_data: usize,
  pub(crate) new_data: usize,
}

impl Rdcss<'_> {
  /// Resolves the handle installed for this RDCSS.
  #[inline]
  fn finish(&self, handle: Handle) {
    let value: usize = if self.control.load(SeqCst) == self.expected_control {
      self.new_data
    } else {
      self.expected_data
    };

    _ = self
      .data
      .compare_exchange(handle.into_bits(), value, SeqCst, SeqCst);
  }
}

// -----------------------------------------------------------------------------
// Descriptor
// -----------------------------------------------------------------------------

/// The shared form of an [`Rdcss`], reused by its record across operations.
///
/// Fields are rewritten by the owner before every publication; readers copy
/// them and then confirm the sequence number did not move.
pub(crate) struct RdcssDescriptor {
  sequence: AtomicUsize,
  control: AtomicPtr<AtomicUsize>,
  expected_control: AtomicUsize,
  data: AtomicPtr<AtomicUsize>,
  expected_data: AtomicUsize,
  new_data: AtomicUsize,
}

impl RdcssDescriptor {
  pub(crate) fn new() -> Self {
    Self {
      sequence: AtomicUsize::new(0),
      control: AtomicPtr::new(ptr::null_mut()),
      expected_control: AtomicUsize::new(0),
      data: AtomicPtr::new(ptr::null_mut()),
      expected_data: AtomicUsize::new(0),
      new_data: AtomicUsize::new(0),
    }
  }

  /// Writes `op` under a fresh sequence number and returns its handle.
  ///
  /// Must only be called by the thread holding the owning record. The handle
  /// is not installed anywhere yet.
  pub(crate) fn prepare(&self, record: usize, op: &Rdcss<'_>) -> Handle {
    let sequence: usize = next_sequence(self.sequence.load(Relaxed));

    // Invalidate outstanding handles before any field changes. A reader that
    // observes any of the release stores below also observes this store.
    self.sequence.store(sequence, Relaxed);

    self.control.store(ptr::from_ref(op.control).cast_mut(), Release);
    self.expected_control.store(op.expected_control, Release);
    self.data.store(ptr::from_ref(op.data).cast_mut(), Release);
    self.expected_data.store(op.expected_data, Release);
    self.new_data.store(op.new_data, Release);

    Handle::rdcss(record, sequence)
  }

  /// Copies the descriptor named by `handle`, or `None` if it was reused.
  ///
  /// # Safety
  ///
  /// The words referenced by the descriptor must still be alive for `'a`.
  /// This holds for every word reachable while the caller is pinned.
  unsafe fn snapshot<'a>(&self, handle: Handle) -> Option<Rdcss<'a>> {
    let control: *mut AtomicUsize = self.control.load(Acquire);
    let expected_control: usize = self.expected_control.load(Acquire);
    let data: *mut AtomicUsize = self.data.load(Acquire);
    let expected_data: usize = self.expected_data.load(Acquire);
    let new_data: usize = self.new_data.load(Acquire);

    if self.sequence.load(Relaxed) != handle.sequence() {
      return None;
    }

    // SAFETY: The sequence matched, so the fields belong to a published
    // operation whose words outlive `'a` (caller contract).
    unsafe {
      Some(Rdcss {
        control: &*control,
        expected_control,
        data: &*data,
        expected_data,
        new_data,
      })
    }
  }
}

// -----------------------------------------------------------------------------
// Operations
// -----------------------------------------------------------------------------

/// Performs `op` using the RDCSS descriptor of record `index`.
///
/// Returns the value observed in the data word: `op.expected_data` if the
/// handle was installed (whether or not the control comparison then held),
/// otherwise the conflicting value, which is never an RDCSS handle.
pub(crate) fn rdcss(
  records: &Records,
  index: usize,
  owner: &RdcssDescriptor,
  op: Rdcss<'_>,
  policy: BackoffPolicy,
) -> usize {
  let handle: Handle = owner.prepare(index, &op);
  let mut backoff = policy.start();

  loop {
    match op
      .data
      .compare_exchange(op.expected_data, handle.into_bits(), SeqCst, SeqCst)
    {
      Ok(_) => {
        op.finish(handle);
        return op.expected_data;
      }
      Err(current) => match Word::decode(current) {
        Word::Rdcss(other) => {
          complete(records, other);
          backoff.backoff();
        }
        Word::Value(_) | Word::KCas(_) => return current,
      },
    }
  }
}

/// Resolves the RDCSS named by `handle`, if it is still in flight.
pub(crate) fn complete(records: &Records, handle: Handle) {
  let Some(record) = records.get(handle.record()) else {
    return;
  };

  // SAFETY: Handles are only followed by pinned callers.
  if let Some(op) = unsafe { record.rdcss.snapshot(handle) } {
    op.finish(handle);
  }
}

/// Loads `word`, resolving any RDCSS found in it first.
pub(crate) fn read(records: &Records, word: &AtomicUsize, policy: BackoffPolicy) -> usize {
  let mut backoff = policy.start();

  loop {
    let current: usize = word.load(SeqCst);

    match Word::decode(current) {
      Word::Rdcss(handle) => {
        complete(records, handle);
        backoff.backoff();
      }
      Word::Value(_) | Word::KCas(_) => return current,
    }
  }
}
