//! Tagged machine words.
//!
//! Every word touched by the k-CAS engine is either plain data or a handle to
//! an in-flight descriptor. The two low bits distinguish the cases:
//!
//! ```text
//! ...sequence... | record (8 bits) | K | R
//!                                    ^   ^
//!                                    |   +-- RDCSS in progress
//!                                    +------ k-CAS in progress
//! ```
//!
//! Handles carry the index of the descriptor record that owns them and the
//! sequence number that record had when the handle was published. A handle
//! whose sequence no longer matches its record is stale and is ignored.

use core::fmt::Debug;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;

/// Set while an RDCSS descriptor owns the word.
pub(crate) const RDCSS_TAG: usize = 0b01;

/// Set while a k-CAS descriptor owns the word.
pub(crate) const KCAS_TAG: usize = 0b10;

/// Bits reserved for descriptor tags; plain values must keep them clear.
pub const TAG_MASK: usize = RDCSS_TAG | KCAS_TAG;

const RECORD_SHIFT: u32 = 2;
const RECORD_BITS: u32 = 8;
const RECORD_MASK: usize = (1 << RECORD_BITS) - 1;
const SEQUENCE_SHIFT: u32 = RECORD_SHIFT + RECORD_BITS;

/// The number of descriptor records addressable by a handle.
pub(crate) const MAX_RECORDS: usize = 1 << RECORD_BITS;

/// The largest sequence number representable in a handle.
pub(crate) const SEQUENCE_MASK: usize = usize::MAX >> SEQUENCE_SHIFT;

const _: () = assert!(usize::BITS > SEQUENCE_SHIFT + 16);

/// Returns `true` if `value` can be stored as plain data.
#[inline]
pub const fn is_plain(value: usize) -> bool {
  value & TAG_MASK == 0
}

/// Advances a record sequence number, wrapping within the handle width.
///
/// Zero is skipped so a freshly created record never matches a handle.
#[inline]
pub(crate) const fn next_sequence(sequence: usize) -> usize {
  match (sequence + 1) & SEQUENCE_MASK {
    0 => 1,
    next => next,
  }
}

// -----------------------------------------------------------------------------
// Tagged Word
// -----------------------------------------------------------------------------

/// The decoded form of a raw word.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Word {
  /// Plain data.
  Value(usize),
  /// Owned by an in-flight RDCSS.
  Rdcss(Handle),
  /// Owned by an in-flight k-CAS.
  KCas(Handle),
}

impl Word {
  #[inline]
  pub(crate) const fn decode(bits: usize) -> Self {
    match bits & TAG_MASK {
      0 => Self::Value(bits),
      RDCSS_TAG => Self::Rdcss(Handle { bits }),
      KCAS_TAG => Self::KCas(Handle { bits }),
      _ => {
        debug_assert!(false, "word has both descriptor tags set");
        Self::Value(bits)
      }
    }
  }
}

impl Debug for Word {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    match self {
      Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
      Self::Rdcss(handle) => f.debug_tuple("Rdcss").field(handle).finish(),
      Self::KCas(handle) => f.debug_tuple("KCas").field(handle).finish(),
    }
  }
}

// -----------------------------------------------------------------------------
// Descriptor Handle
// -----------------------------------------------------------------------------

/// A reference to a descriptor published into a word.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub(crate) struct Handle {
  bits: usize,
}

impl Handle {
  #[inline]
  const fn new(tag: usize, record: usize, sequence: usize) -> Self {
    debug_assert!(record <= RECORD_MASK);
    debug_assert!(sequence <= SEQUENCE_MASK);

    Self {
      bits: tag | (record << RECORD_SHIFT) | (sequence << SEQUENCE_SHIFT),
    }
  }

  #[inline]
  pub(crate) const fn rdcss(record: usize, sequence: usize) -> Self {
    Self::new(RDCSS_TAG, record, sequence)
  }

  #[inline]
  pub(crate) const fn kcas(record: usize, sequence: usize) -> Self {
    Self::new(KCAS_TAG, record, sequence)
  }

  /// Returns the index of the record owning the descriptor.
  #[inline]
  pub(crate) const fn record(self) -> usize {
    (self.bits >> RECORD_SHIFT) & RECORD_MASK
  }

  /// Returns the sequence number the record had when this handle was made.
  #[inline]
  pub(crate) const fn sequence(self) -> usize {
    self.bits >> SEQUENCE_SHIFT
  }

  #[inline]
  pub(crate) const fn into_bits(self) -> usize {
    self.bits
  }
}

impl Debug for Handle {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("Handle")
      .field("record", &self.record())
      .field("sequence", &self.sequence())
      .finish()
  }
}
