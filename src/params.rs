use core::fmt::Debug;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;
use core::mem;
use core::num::NonZeroUsize;

use crossbeam_utils::CachePadded;

use crate::backoff::BackoffPolicy;
use crate::error::ConfigError;
use crate::hash::MapToBucket;

// -----------------------------------------------------------------------------
// Cache-line Properties
// -----------------------------------------------------------------------------

/// The size of a cache line in bytes.
///
/// Bucket and timestamp arrays are aligned to this value, and the map's
/// counters are padded to it, to minimize false sharing.
pub const CACHE_LINE: usize = size_of::<CachePadded<u8>>();

const _: () = assert!(
  CACHE_LINE.is_power_of_two(),
  "invalid system: `CACHE_LINE` must be a power of two",
);

// -----------------------------------------------------------------------------
// Map Configuration
// -----------------------------------------------------------------------------

/// Runtime configuration for a [`RobinMap`].
///
/// Every setting has a sensible default; override only what you need:
///
/// ```
/// use crh::config::Config;
/// use crh::RobinMap;
///
/// let config: Config = Config::new()
///   .with_capacity(1024)
///   .with_load_factor(0.5);
///
/// let map: RobinMap<u64, u64> = RobinMap::with_config(config);
/// assert_eq!(map.capacity(), 1024);
/// ```
///
/// Invalid settings are reported by [`validate()`]:
///
/// ```
/// use crh::config::Config;
/// use crh::ConfigError;
///
/// let config: Config = Config::new().with_capacity(1000);
/// assert_eq!(config.validate(), Err(ConfigError::NotPowerOfTwo(1000)));
/// ```
///
/// [`RobinMap`]: crate::RobinMap
/// [`validate()`]: Self::validate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
  capacity: usize,
  load_factor: f64,
  stamp_shift: u32,
  backoff: BackoffPolicy,
  map_to_bucket: MapToBucket,
}

impl Config {
  /// The default maximum load factor.
  pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;

  /// The default number of buckets per timestamp shard, as a power of two.
  pub const DEFAULT_STAMP_SHIFT: u32 = 6;

  /// The largest supported number of buckets per timestamp shard, as a
  /// power of two.
  pub const MAX_STAMP_SHIFT: u32 = 16;

  /// Creates the default configuration.
  #[inline]
  pub const fn new() -> Self {
    Self {
      capacity: Capacity::DEF.as_usize(),
      load_factor: Self::DEFAULT_LOAD_FACTOR,
      stamp_shift: Self::DEFAULT_STAMP_SHIFT,
      backoff: BackoffPolicy::Exponential {
        max_spins: BackoffPolicy::DEFAULT_MAX_SPINS,
      },
      map_to_bucket: MapToBucket::Modulo,
    }
  }

  /// Sets the initial number of buckets.
  ///
  /// Must be a power of two in <code>[Capacity::MIN]..=[Capacity::MAX]</code>.
  #[inline]
  pub const fn with_capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity;
    self
  }

  /// Sets the load factor above which the table doubles in size.
  ///
  /// Must be within `(0, 1]`.
  #[inline]
  pub const fn with_load_factor(mut self, load_factor: f64) -> Self {
    self.load_factor = load_factor;
    self
  }

  /// Sets the number of buckets covered by one timestamp, as a power of two.
  ///
  /// Smaller shards let readers detect concurrent moves more precisely at
  /// the cost of more timestamp words per mutation.
  #[inline]
  pub const fn with_stamp_shift(mut self, stamp_shift: u32) -> Self {
    self.stamp_shift = stamp_shift;
    self
  }

  /// Sets the backoff policy used by every retry loop.
  #[inline]
  pub const fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
    self.backoff = backoff;
    self
  }

  /// Sets the strategy mapping hashes onto buckets.
  #[inline]
  pub const fn with_map_to_bucket(mut self, map_to_bucket: MapToBucket) -> Self {
    self.map_to_bucket = map_to_bucket;
    self
  }

  /// Returns the configured initial capacity.
  ///
  /// # Errors
  ///
  /// See [`Capacity::try_new`].
  #[inline]
  pub const fn capacity(&self) -> Result<Capacity, ConfigError> {
    Capacity::try_new(self.capacity)
  }

  /// Returns the configured load factor.
  #[inline]
  pub const fn load_factor(&self) -> f64 {
    self.load_factor
  }

  /// Returns the configured timestamp shard shift.
  #[inline]
  pub const fn stamp_shift(&self) -> u32 {
    self.stamp_shift
  }

  /// Returns the configured backoff policy.
  #[inline]
  pub const fn backoff(&self) -> BackoffPolicy {
    self.backoff
  }

  /// Returns the configured bucket mapping.
  #[inline]
  pub const fn map_to_bucket(&self) -> MapToBucket {
    self.map_to_bucket
  }

  /// Checks every setting.
  ///
  /// # Errors
  ///
  /// Returns the first invalid setting found.
  pub fn validate(&self) -> Result<(), ConfigError> {
    Capacity::try_new(self.capacity)?;

    if !(self.load_factor > 0.0 && self.load_factor <= 1.0) {
      return Err(ConfigError::LoadFactor(self.load_factor));
    }

    if self.stamp_shift > Self::MAX_STAMP_SHIFT {
      return Err(ConfigError::StampShift {
        value: self.stamp_shift,
        max: Self::MAX_STAMP_SHIFT,
      });
    }

    Ok(())
  }

  /// Returns the entry count above which a table of `capacity` buckets grows.
  #[inline]
  pub(crate) fn threshold(&self, capacity: Capacity) -> usize {
    let limit: f64 = capacity.as_usize() as f64 * self.load_factor;

    // The table must always keep at least one empty bucket.
    (limit as usize).min(capacity.as_usize() - 1)
  }
}

impl Default for Config {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

// -----------------------------------------------------------------------------
// Capacity
// -----------------------------------------------------------------------------

/// A validated table capacity value.
///
/// Represents a power-of-two value in the range <code>[MIN]..=[MAX]</code>.
///
/// # Construction
///
/// Use [`new()`] to create from an arbitrary value; it rounds up to the nearest
/// power of two and clamps to the valid range. Use [`try_new()`] to reject
/// anything that is not already valid.
///
/// ```
/// use crh::Capacity;
///
/// // Exact power of two
/// let cap = Capacity::new(256);
/// assert_eq!(cap.as_usize(), 256);
///
/// // Rounded up
/// let cap = Capacity::new(100);
/// assert_eq!(cap.as_usize(), 128);
///
/// // Clamped to minimum
/// let cap = Capacity::new(1);
/// assert_eq!(cap, Capacity::MIN);
///
/// // Rejected
/// assert!(Capacity::try_new(100).is_err());
/// ```
///
/// [MIN]: Self::MIN
/// [MAX]: Self::MAX
/// [`new()`]: Self::new
/// [`try_new()`]: Self::try_new
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Capacity(CapacityEnum);

impl Capacity {
  /// The minimum supported capacity (2³ buckets).
  pub const MIN: Self = Self(CapacityEnum::_Capacity1Shl3);

  /// The maximum supported capacity (2²⁷ buckets).
  pub const MAX: Self = Self(CapacityEnum::_Capacity1Shl27);

  /// The default capacity (2⁶ buckets).
  pub const DEF: Self = Self(CapacityEnum::_Capacity1Shl6);

  /// Creates a new [`Capacity`] from an arbitrary value.
  ///
  /// Rounds up to the nearest power of two and clamps to
  /// <code>[MIN]..=[MAX]</code>.
  ///
  /// [MIN]: Self::MIN
  /// [MAX]: Self::MAX
  #[inline]
  pub const fn new(value: usize) -> Self {
    let Some(capacity) = value.checked_next_power_of_two() else {
      return Self::MAX;
    };

    if capacity < Self::MIN.as_usize() {
      Self::MIN
    } else if capacity > Self::MAX.as_usize() {
      Self::MAX
    } else {
      // SAFETY: `capacity` is a power of two within range.
      unsafe { Self::new_unchecked(capacity) }
    }
  }

  /// Creates a new [`Capacity`], rejecting values that are not valid as-is.
  ///
  /// # Errors
  ///
  /// Returns an error if `value` is zero, not a power of two, or outside
  /// <code>[MIN]..=[MAX]</code>.
  ///
  /// [MIN]: Self::MIN
  /// [MAX]: Self::MAX
  #[inline]
  pub const fn try_new(value: usize) -> Result<Self, ConfigError> {
    if value == 0 {
      Err(ConfigError::ZeroCapacity)
    } else if !value.is_power_of_two() {
      Err(ConfigError::NotPowerOfTwo(value))
    } else if value < Self::MIN.as_usize() || value > Self::MAX.as_usize() {
      Err(ConfigError::CapacityRange {
        value,
        min: Self::MIN.as_usize(),
        max: Self::MAX.as_usize(),
      })
    } else {
      // SAFETY: `value` is a power of two within range.
      Ok(unsafe { Self::new_unchecked(value) })
    }
  }

  /// Creates a new [`Capacity`] without validation.
  ///
  /// # Safety
  ///
  /// `value` must be a power of two in <code>[MIN]..=[MAX]</code>.
  ///
  /// [MIN]: Self::MIN
  /// [MAX]: Self::MAX
  #[inline]
  pub const unsafe fn new_unchecked(value: usize) -> Self {
    // SAFETY: Caller guarantees `value` is a valid `Capacity`.
    unsafe { mem::transmute::<usize, Self>(value) }
  }

  /// Returns twice this capacity, or `None` at [`MAX`].
  ///
  /// [`MAX`]: Self::MAX
  #[inline]
  pub const fn doubled(self) -> Option<Self> {
    if self.as_usize() >= Self::MAX.as_usize() {
      None
    } else {
      // SAFETY: Doubling a power of two below `MAX` stays within range.
      Some(unsafe { Self::new_unchecked(self.as_usize() << 1) })
    }
  }

  /// Returns the capacity as a [`usize`].
  #[inline]
  pub const fn as_usize(self) -> usize {
    self.0 as usize
  }

  /// Returns the capacity as a [`NonZeroUsize`].
  #[inline]
  pub const fn as_nonzero(self) -> NonZeroUsize {
    // SAFETY: All `Capacity` values are non-zero by construction.
    unsafe { mem::transmute::<Self, NonZeroUsize>(self) }
  }

  /// Returns the base-2 logarithm of the capacity.
  ///
  /// # Examples
  ///
  /// ```
  /// use crh::Capacity;
  ///
  /// assert_eq!(Capacity::new(1024).log2(), 10);
  /// ```
  #[inline]
  pub const fn log2(self) -> u32 {
    self.as_nonzero().trailing_zeros()
  }
}

impl Debug for Capacity {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "{:?} (1 << {:?})", self.as_nonzero(), self.log2())
  }
}

impl Default for Capacity {
  #[inline]
  fn default() -> Self {
    Self::DEF
  }
}

impl From<Capacity> for NonZeroUsize {
  #[inline]
  fn from(other: Capacity) -> Self {
    other.as_nonzero()
  }
}

impl From<Capacity> for usize {
  #[inline]
  fn from(other: Capacity) -> Self {
    other.as_usize()
  }
}

impl TryFrom<usize> for Capacity {
  type Error = ConfigError;

  #[inline]
  fn try_from(other: usize) -> Result<Self, Self::Error> {
    Self::try_new(other)
  }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(usize)]
enum CapacityEnum {
  _Capacity1Shl3 = 1 << 3,
  _Capacity1Shl4 = 1 << 4,
  _Capacity1Shl5 = 1 << 5,
  _Capacity1Shl6 = 1 << 6,
  _Capacity1Shl7 = 1 << 7,
  _Capacity1Shl8 = 1 << 8,
  _Capacity1Shl9 = 1 << 9,
  _Capacity1Shl10 = 1 << 10,
  _Capacity1Shl11 = 1 << 11,
  _Capacity1Shl12 = 1 << 12,
  _Capacity1Shl13 = 1 << 13,
  _Capacity1Shl14 = 1 << 14,
  _Capacity1Shl15 = 1 << 15,
  _Capacity1Shl16 = 1 << 16,
  _Capacity1Shl17 = 1 << 17,
  _Capacity1Shl18 = 1 << 18,
  _Capacity1Shl19 = 1 << 19,
  _Capacity1Shl20 = 1 << 20,
  _Capacity1Shl21 = 1 << 21,
  _Capacity1Shl22 = 1 << 22,
  _Capacity1Shl23 = 1 << 23,
  _Capacity1Shl24 = 1 << 24,
  _Capacity1Shl25 = 1 << 25,
  _Capacity1Shl26 = 1 << 26,
  _Capacity1Shl27 = 1 << 27,
}
