use core::hash::BuildHasher;
use core::hash::Hasher;

mod params;
mod rdcss;

/// Hashes integers to themselves, so tests can pick home buckets directly.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct IdentityHash;

impl BuildHasher for IdentityHash {
  type Hasher = IdentityHasher;

  #[inline]
  fn build_hasher(&self) -> Self::Hasher {
    IdentityHasher(0)
  }
}

#[derive(Debug)]
pub(crate) struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
  #[inline]
  fn finish(&self) -> u64 {
    self.0
  }

  fn write(&mut self, bytes: &[u8]) {
    for byte in bytes {
      self.0 = (self.0 << 8) | u64::from(*byte);
    }
  }

  #[inline]
  fn write_u64(&mut self, value: u64) {
    self.0 = value;
  }

  #[inline]
  fn write_usize(&mut self, value: usize) {
    self.0 = value as u64;
  }
}

/// Hashes every key to the same value.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct ConstantHash;

impl BuildHasher for ConstantHash {
  type Hasher = ConstantHasher;

  #[inline]
  fn build_hasher(&self) -> Self::Hasher {
    ConstantHasher
  }
}

#[derive(Debug)]
pub(crate) struct ConstantHasher;

impl Hasher for ConstantHasher {
  #[inline]
  fn finish(&self) -> u64 {
    0x2A
  }

  #[inline]
  fn write(&mut self, _bytes: &[u8]) {}
}
