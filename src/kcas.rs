//! Multi-word compare-and-swap.
//!
//! A k-CAS atomically replaces the contents of any number of words, provided
//! every word holds its expected value. The operation publishes a
//! descriptor, claims each word in address order by RDCSS-installing a handle
//! conditioned on the descriptor still being undecided, decides the outcome
//! with a single CAS on the descriptor state, and finally replaces every
//! handle with the new (success) or old (failure) value.
//!
//! Any thread that meets a handle helps the operation to completion, so a
//! stalled owner never blocks others.
//!
//! A descriptor stores [`INLINE_WORDS`] words in place. Longer operations
//! spill the rest into a heap area owned by the descriptor, which only ever
//! grows and is freed together with it.

use core::fmt::Debug;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;
use core::marker::PhantomData;
use core::ptr;

use smallvec::SmallVec;

use crate::backoff::Backoff;
use crate::backoff::BackoffPolicy;
use crate::rdcss;
use crate::rdcss::Rdcss;
use crate::record::Claim;
use crate::record::Record;
use crate::record::Records;
use crate::sync::atomic::AtomicPtr;
use crate::sync::atomic::AtomicUsize;
use crate::sync::atomic::Ordering::Acquire;
use crate::sync::atomic::Ordering::Relaxed;
use crate::sync::atomic::Ordering::Release;
use crate::sync::atomic::Ordering::SeqCst;
use crate::word::Handle;
use crate::word::Word;
use crate::word::is_plain;
use crate::word::next_sequence;

/// The number of words a descriptor holds without spilling.
pub(crate) const INLINE_WORDS: usize = 128;

const STATUS_BITS: u32 = 2;
const STATUS_MASK: usize = (1 << STATUS_BITS) - 1;

const UNDECIDED: usize = 0;
const SUCCEEDED: usize = 1;
const FAILED: usize = 2;

#[inline]
const fn state(sequence: usize, status: usize) -> usize {
  (sequence << STATUS_BITS) | status
}

/// Words copied out of a descriptor by a helper.
type Snapshot = SmallVec<[RawWord; 8]>;

// -----------------------------------------------------------------------------
// Raw Word
// -----------------------------------------------------------------------------

/// One (address, expected, new) triple.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawWord {
  pub(crate) target: *const AtomicUsize,
  pub(crate) old: usize,
  pub(crate) new: usize,
}

impl RawWord {
  #[inline]
  pub(crate) fn new(target: &AtomicUsize, old: usize, new: usize) -> Self {
    debug_assert!(is_plain(old) && is_plain(new));

    Self {
      target: ptr::from_ref(target),
      old,
      new,
    }
  }

  /// A word that is compared but left unchanged.
  #[inline]
  pub(crate) fn compare(target: &AtomicUsize, value: usize) -> Self {
    Self::new(target, value, value)
  }

  /// # Safety
  ///
  /// The target must still be alive for `'a`.
  #[inline]
  unsafe fn target<'a>(&self) -> &'a AtomicUsize {
    // SAFETY: Guaranteed by the caller.
    unsafe { &*self.target }
  }
}

impl Debug for RawWord {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("RawWord")
      .field("target", &self.target)
      .field("old", &format_args!("{:#x}", self.old))
      .field("new", &format_args!("{:#x}", self.new))
      .finish()
  }
}

// -----------------------------------------------------------------------------
// Descriptor
// -----------------------------------------------------------------------------

struct DescriptorWord {
  target: AtomicPtr<AtomicUsize>,
  old: AtomicUsize,
  new: AtomicUsize,
}

impl DescriptorWord {
  fn new() -> Self {
    Self {
      target: AtomicPtr::new(ptr::null_mut()),
      old: AtomicUsize::new(0),
      new: AtomicUsize::new(0),
    }
  }

  #[inline]
  fn store(&self, word: &RawWord) {
    self.target.store(word.target.cast_mut(), Release);
    self.old.store(word.old, Release);
    self.new.store(word.new, Release);
  }

  #[inline]
  fn load(&self) -> RawWord {
    RawWord {
      target: self.target.load(Acquire).cast_const(),
      old: self.old.load(Acquire),
      new: self.new.load(Acquire),
    }
  }
}

/// Descriptor words past [`INLINE_WORDS`].
///
/// Replaced areas stay linked through `older`, since a helper may still be
/// copying from one; all of them are freed with the descriptor.
struct Spill {
  words: Box<[DescriptorWord]>,
  older: *mut Spill,
}

/// The shared form of a k-CAS, reused by its record across operations.
///
/// `state` packs the sequence number of the current operation with its
/// status; status moves from undecided to a terminal value exactly once per
/// sequence number.
pub(crate) struct KCasDescriptor {
  state: AtomicUsize,
  length: AtomicUsize,
  words: [DescriptorWord; INLINE_WORDS],
  spill: AtomicPtr<Spill>,
}

impl KCasDescriptor {
  pub(crate) fn new() -> Self {
    Self {
      state: AtomicUsize::new(state(0, FAILED)),
      length: AtomicUsize::new(0),
      words: core::array::from_fn(|_| DescriptorWord::new()),
      spill: AtomicPtr::new(ptr::null_mut()),
    }
  }

  /// Writes `words` under a fresh sequence number and returns its handle.
  ///
  /// Must only be called by the thread holding the owning record. The handle
  /// is not installed anywhere yet.
  pub(crate) fn prepare(&self, record: usize, words: &[RawWord]) -> Handle {
    let sequence: usize = next_sequence(self.state.load(Relaxed) >> STATUS_BITS);

    // Invalidate outstanding handles before any field changes. A reader that
    // observes any of the release stores below also observes this store.
    self.state.store(state(sequence, UNDECIDED), SeqCst);

    let (inline, spilled): (&[RawWord], &[RawWord]) = words.split_at(words.len().min(INLINE_WORDS));

    for (slot, word) in self.words.iter().zip(inline) {
      slot.store(word);
    }

    if !spilled.is_empty() {
      for (slot, word) in self.reserve(spilled.len()).words.iter().zip(spilled) {
        slot.store(word);
      }
    }

    self.length.store(words.len(), Release);

    Handle::kcas(record, sequence)
  }

  /// Returns a spill area with room for at least `length` words.
  fn reserve(&self, length: usize) -> &Spill {
    let current: *mut Spill = self.spill.load(Relaxed);

    // SAFETY: Spill areas are freed only when the descriptor drops.
    if let Some(spill) = unsafe { current.as_ref() } {
      if spill.words.len() >= length {
        return spill;
      }
    }

    let spill: *mut Spill = Box::into_raw(Box::new(Spill {
      words: (0..length.next_power_of_two()).map(|_| DescriptorWord::new()).collect(),
      older: current,
    }));

    self.spill.store(spill, Release);

    // SAFETY: Allocated above; freed only when the descriptor drops.
    unsafe { &*spill }
  }

  /// Copies the words of the operation named by `handle`, or `None` if the
  /// descriptor has since been reused.
  fn snapshot(&self, handle: Handle) -> Option<Snapshot> {
    let length: usize = self.length.load(Acquire);
    let inline: usize = length.min(INLINE_WORDS);

    let mut words: Snapshot = self.words[..inline].iter().map(DescriptorWord::load).collect();

    if length > inline {
      // SAFETY: Spill areas are freed only when the descriptor drops.
      let spill: &Spill = unsafe { self.spill.load(Acquire).as_ref() }?;
      let spilled: usize = (length - inline).min(spill.words.len());

      words.extend(spill.words[..spilled].iter().map(DescriptorWord::load));
    }

    if self.state.load(SeqCst) >> STATUS_BITS != handle.sequence() {
      return None;
    }

    Some(words)
  }
}

impl Drop for KCasDescriptor {
  fn drop(&mut self) {
    let mut spill: *mut Spill = self.spill.load(Relaxed);

    while !spill.is_null() {
      // SAFETY: Every area was allocated by `reserve` and is linked exactly
      // once; `Drop` provides exclusive access.
      let owned: Box<Spill> = unsafe { Box::from_raw(spill) };

      spill = owned.older;
    }
  }
}

// -----------------------------------------------------------------------------
// Engine
// -----------------------------------------------------------------------------

/// The descriptor records and policy shared by all operations of one owner.
pub(crate) struct Engine {
  records: Records,
  policy: BackoffPolicy,
}

impl Engine {
  pub(crate) fn new(policy: BackoffPolicy) -> Self {
    Self {
      records: Records::new(),
      policy,
    }
  }

  #[inline]
  pub(crate) const fn policy(&self) -> BackoffPolicy {
    self.policy
  }

  #[cfg(test)]
  #[inline]
  pub(crate) const fn records(&self) -> &Records {
    &self.records
  }

  /// Starts an operation. A record is claimed only once one is needed.
  #[inline]
  pub(crate) const fn context(&self) -> Context<'_> {
    Context {
      engine: self,
      claim: None,
    }
  }
}

/// Per-operation state: the engine and the record claimed for it, if any.
///
/// Every method that follows handles must run while the caller is pinned, or
/// otherwise guarantees that every word reachable from a live descriptor
/// stays allocated.
pub(crate) struct Context<'e> {
  engine: &'e Engine,
  claim: Option<Claim<'e>>,
}

impl<'e> Context<'e> {
  #[inline]
  pub(crate) const fn policy(&self) -> BackoffPolicy {
    self.engine.policy
  }

  #[inline]
  fn record(&mut self) -> (usize, &'e Record) {
    let engine: &'e Engine = self.engine;
    let claim: &Claim<'e> = self
      .claim
      .get_or_insert_with(|| engine.records.claim(engine.policy));

    (claim.index(), claim.record())
  }

  /// Loads `word`, helping every descriptor found in it to completion.
  ///
  /// The result is always plain data.
  pub(crate) fn read(&mut self, word: &AtomicUsize) -> usize {
    let mut backoff = self.engine.policy.start();

    loop {
      let current: usize = rdcss::read(&self.engine.records, word, self.engine.policy);

      match Word::decode(current) {
        Word::KCas(handle) => {
          self.help(handle);
          backoff.backoff();
        }
        Word::Value(_) | Word::Rdcss(_) => return current,
      }
    }
  }

  /// Atomically applies every word of `words`, or none of them.
  ///
  /// `words` is sorted by address in place. Returns `true` on success; on
  /// failure nothing was written and the caller decides whether to retry.
  ///
  /// # Safety
  ///
  /// Every target must remain allocated until no thread can still be helping
  /// this operation; for map words this means the caller is pinned.
  ///
  /// # Panics
  ///
  /// Panics if `words` names the same target twice.
  pub(crate) unsafe fn kcas(&mut self, words: &mut [RawWord]) -> bool {
    if words.is_empty() {
      return true;
    }

    words.sort_unstable_by_key(|word| word.target.addr());

    assert!(
      words.windows(2).all(|pair| pair[0].target != pair[1].target),
      "k-CAS words must name distinct targets",
    );

    let (index, record): (usize, &'e Record) = self.record();
    let handle: Handle = record.kcas.prepare(index, words);

    self.run(handle, words, &record.kcas.state)
  }

  /// Helps the k-CAS named by `handle`, if it is still in flight.
  fn help(&mut self, handle: Handle) {
    let engine: &'e Engine = self.engine;

    let Some(record) = engine.records.get(handle.record()) else {
      return;
    };

    if let Some(words) = record.kcas.snapshot(handle) {
      self.run(handle, &words, &record.kcas.state);
    }
  }

  fn run(&mut self, handle: Handle, words: &[RawWord], control: &AtomicUsize) -> bool {
    let sequence: usize = handle.sequence();
    let undecided: usize = state(sequence, UNDECIDED);

    if control.load(SeqCst) == undecided {
      let status: usize = self.claim_all(handle, words, control, undecided);

      _ = control.compare_exchange(undecided, state(sequence, status), SeqCst, SeqCst);
    }

    let current: usize = control.load(SeqCst);

    // The descriptor moved on; its owner already released every word.
    if current >> STATUS_BITS != sequence {
      return false;
    }

    let succeeded: bool = current & STATUS_MASK == SUCCEEDED;

    for word in words {
      // SAFETY: See `Context::kcas`.
      let target: &AtomicUsize = unsafe { word.target() };
      let value: usize = if succeeded { word.new } else { word.old };

      // Pending RDCSS operations must resolve first; otherwise one that read
      // the undecided state could install our handle after this sweep.
      while let Err(current) = target.compare_exchange(handle.into_bits(), value, SeqCst, SeqCst) {
        match Word::decode(current) {
          Word::Rdcss(other) => rdcss::complete(&self.engine.records, other),
          Word::Value(_) | Word::KCas(_) => break,
        }
      }
    }

    succeeded
  }

  /// Installs `handle` into every word; returns the status to decide.
  fn claim_all(
    &mut self,
    handle: Handle,
    words: &[RawWord],
    control: &AtomicUsize,
    undecided: usize,
  ) -> usize {
    let mut backoff = self.engine.policy.start();

    for word in words {
      // SAFETY: See `Context::kcas`.
      let target: &AtomicUsize = unsafe { word.target() };

      loop {
        if control.load(SeqCst) != undecided {
          // Decided by another helper; the value we pass is ignored.
          return FAILED;
        }

        let (index, record): (usize, &'e Record) = self.record();

        let op: Rdcss<'_> = Rdcss {
          control,
          expected_control: undecided,
          data: target,
          expected_data: word.old,
          new_data: handle.into_bits(),
        };

        let seen: usize = rdcss::rdcss(
          &self.engine.records,
          index,
          &record.rdcss,
          op,
          self.engine.policy,
        );

        if seen == word.old || seen == handle.into_bits() {
          break;
        }

        match Word::decode(seen) {
          Word::KCas(other) => {
            self.help(other);
            backoff.backoff();
          }
          Word::Value(_) | Word::Rdcss(_) => return FAILED,
        }
      }

      backoff.reset();
    }

    SUCCEEDED
  }
}

// -----------------------------------------------------------------------------
// Public Engine
// -----------------------------------------------------------------------------

/// One word of a [`KCas`] operation.
#[derive(Clone, Copy)]
pub struct KCasWord<'w> {
  raw: RawWord,
  marker: PhantomData<&'w AtomicUsize>,
}

impl<'w> KCasWord<'w> {
  /// Describes replacing `expected` with `desired` in `target`.
  ///
  /// # Panics
  ///
  /// Panics if either value has any of the [`TAG_MASK`] bits set; those bits
  /// are reserved for descriptor handles.
  ///
  /// [`TAG_MASK`]: crate::word::TAG_MASK
  #[inline]
  pub fn new(target: &'w AtomicUsize, expected: usize, desired: usize) -> Self {
    assert!(
      is_plain(expected) && is_plain(desired),
      "k-CAS values must leave the two low bits clear",
    );

    Self {
      raw: RawWord::new(target, expected, desired),
      marker: PhantomData,
    }
  }
}

impl Debug for KCasWord<'_> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Debug::fmt(&self.raw, f)
  }
}

/// A lock-free multi-word compare-and-swap over caller-owned words.
///
/// All words passed to one engine must outlive it; the lifetime `'w` enforces
/// this. Words updated through a `KCas` must only be read through
/// [`KCas::read`], since they may transiently hold descriptor handles.
///
/// # Examples
///
/// ```
/// use core::sync::atomic::AtomicUsize;
/// use crh::KCas;
/// use crh::KCasWord;
///
/// let a = AtomicUsize::new(4);
/// let b = AtomicUsize::new(8);
/// let kcas = KCas::new();
///
/// // Both words match; both are replaced.
/// assert!(kcas.cas(&[KCasWord::new(&a, 4, 12), KCasWord::new(&b, 8, 16)]));
///
/// // `a` no longer matches; neither is replaced.
/// assert!(!kcas.cas(&[KCasWord::new(&a, 4, 20), KCasWord::new(&b, 16, 24)]));
///
/// assert_eq!(kcas.read(&a), 12);
/// assert_eq!(kcas.read(&b), 16);
/// ```
pub struct KCas<'w> {
  engine: Engine,
  marker: PhantomData<&'w AtomicUsize>,
}

impl<'w> KCas<'w> {
  /// Creates an engine with the default [`BackoffPolicy`].
  #[inline]
  pub fn new() -> Self {
    Self::with_backoff(BackoffPolicy::default())
  }

  /// Creates an engine with the given [`BackoffPolicy`].
  #[inline]
  pub fn with_backoff(policy: BackoffPolicy) -> Self {
    Self {
      engine: Engine::new(policy),
      marker: PhantomData,
    }
  }

  /// Atomically replaces every word, provided all hold their expected value.
  ///
  /// Returns `false`, leaving every word untouched, if any word differed.
  /// Failures are never retried internally.
  ///
  /// # Panics
  ///
  /// Panics if a word appears twice.
  pub fn cas(&self, words: &[KCasWord<'w>]) -> bool {
    let mut raw: Snapshot = words.iter().map(|word| word.raw).collect();

    // SAFETY: Every target outlives `'w`, which outlives `self`; helpers only
    // reach targets through `self`.
    unsafe { self.engine.context().kcas(&mut raw) }
  }

  /// Reads `word`, completing any operation in progress on it.
  pub fn read(&self, word: &'w AtomicUsize) -> usize {
    self.engine.context().read(word)
  }
}

impl Default for KCas<'_> {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl Debug for KCas<'_> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("KCas")
      .field("backoff", &self.engine.policy)
      .finish_non_exhaustive()
  }
}
