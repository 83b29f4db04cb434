//! Hashing collaborators.
//!
//! Keys are hashed with any [`BuildHasher`]; the resulting 64-bit hash is
//! mapped onto a bucket by a [`MapToBucket`] strategy. [`AlignedPtrHash`]
//! is provided for maps keyed by addresses.

use core::fmt::Debug;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;
use core::hash::BuildHasher;
use core::hash::Hasher;
use core::marker::PhantomData;

// -----------------------------------------------------------------------------
// Bucket Mapping
// -----------------------------------------------------------------------------

/// Maps a hash onto a bucket index of a power-of-two table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MapToBucket {
  /// `hash % len`, using the low bits of the hash.
  #[default]
  Modulo,
  /// Fibonacci (multiplicative) hashing, using the high bits of the product.
  ///
  /// Useful when the low bits of the hash are poorly distributed.
  Fibonacci,
}

impl MapToBucket {
  const GOLDEN_RATIO: u64 = 0x9E37_79B9_7F4A_7C15;

  /// Returns the home bucket of `hash` in a table of `len` buckets.
  ///
  /// `len` must be a power of two.
  #[inline]
  pub const fn index(self, hash: u64, len: usize) -> usize {
    debug_assert!(len.is_power_of_two());

    match self {
      Self::Modulo => (hash & (len as u64 - 1)) as usize,
      Self::Fibonacci => {
        let bits: u32 = len.trailing_zeros();

        if bits == 0 {
          0
        } else {
          (hash.wrapping_mul(Self::GOLDEN_RATIO) >> (u64::BITS - bits)) as usize
        }
      }
    }
  }
}

// -----------------------------------------------------------------------------
// Aligned Pointer Hash
// -----------------------------------------------------------------------------

/// A [`BuildHasher`] for addresses of `T`.
///
/// Addresses of `T` are multiples of `align_of::<T>()`, so their low bits
/// carry no information. The hasher discards them, producing dense hashes
/// for densely allocated objects.
///
/// Only [`Hasher::write_usize`] is meaningful; this is what raw pointers and
/// [`NonNull`] feed into a hasher. Writing a misaligned address is checked in
/// debug builds only.
///
/// # Examples
///
/// ```
/// use core::hash::BuildHasher;
/// use crh::hash::AlignedPtrHash;
///
/// let build: AlignedPtrHash<u64> = AlignedPtrHash::new();
/// let value: u64 = 0;
/// let address: *const u64 = &value;
///
/// assert_eq!(build.hash_one(address), (address as usize >> 3) as u64);
/// ```
///
/// [`NonNull`]: core::ptr::NonNull
pub struct AlignedPtrHash<T> {
  marker: PhantomData<fn(*const T)>,
}

impl<T> AlignedPtrHash<T> {
  /// The number of low address bits that are always zero.
  pub const SHIFT: u32 = align_of::<T>().trailing_zeros();

  /// Creates a new `AlignedPtrHash`.
  #[inline]
  pub const fn new() -> Self {
    Self {
      marker: PhantomData,
    }
  }
}

impl<T> Clone for AlignedPtrHash<T> {
  #[inline]
  fn clone(&self) -> Self {
    *self
  }
}

impl<T> Copy for AlignedPtrHash<T> {}

impl<T> Default for AlignedPtrHash<T> {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Debug for AlignedPtrHash<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("AlignedPtrHash")
      .field("shift", &Self::SHIFT)
      .finish()
  }
}

impl<T> BuildHasher for AlignedPtrHash<T> {
  type Hasher = AlignedPtrHasher<T>;

  #[inline]
  fn build_hasher(&self) -> Self::Hasher {
    AlignedPtrHasher {
      state: 0,
      marker: PhantomData,
    }
  }
}

/// The [`Hasher`] created by [`AlignedPtrHash`].
pub struct AlignedPtrHasher<T> {
  state: u64,
  marker: PhantomData<fn(*const T)>,
}

impl<T> Debug for AlignedPtrHasher<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("AlignedPtrHasher")
      .field("state", &self.state)
      .finish()
  }
}

impl<T> Hasher for AlignedPtrHasher<T> {
  #[inline]
  fn finish(&self) -> u64 {
    self.state
  }

  #[inline]
  fn write(&mut self, bytes: &[u8]) {
    for byte in bytes {
      self.state = self.state.rotate_left(8) ^ u64::from(*byte);
    }
  }

  #[inline]
  fn write_usize(&mut self, address: usize) {
    debug_assert!(
      address.trailing_zeros() >= AlignedPtrHash::<T>::SHIFT,
      "AlignedPtrHash requires aligned addresses",
    );

    self.state = (address >> AlignedPtrHash::<T>::SHIFT) as u64;
  }
}
