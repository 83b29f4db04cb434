use thiserror::Error;

/// An invalid map [`Config`].
///
/// [`Config`]: crate::config::Config
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
  /// The requested capacity was zero.
  #[error("capacity must be non-zero")]
  ZeroCapacity,

  /// The requested capacity was not a power of two.
  #[error("capacity {0} is not a power of two")]
  NotPowerOfTwo(usize),

  /// The requested capacity was outside the supported range.
  #[error("capacity {value} is outside the supported range {min}..={max}")]
  CapacityRange {
    /// The rejected value.
    value: usize,
    /// The smallest supported capacity.
    min: usize,
    /// The largest supported capacity.
    max: usize,
  },

  /// The load factor was not within `(0, 1]`.
  #[error("load factor {0} must be within (0, 1]")]
  LoadFactor(f64),

  /// The timestamp shard shift was too large.
  #[error("timestamp shift {value} exceeds the maximum of {max}")]
  StampShift {
    /// The rejected value.
    value: u32,
    /// The largest supported shift.
    max: u32,
  },
}
