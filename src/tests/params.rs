use crate::backoff::BackoffPolicy;
use crate::error::ConfigError;
use crate::hash::MapToBucket;
use crate::params::CACHE_LINE;
use crate::params::Capacity;
use crate::params::Config;
use crate::utils::each_capacity;

#[test]
fn test_capacity_min() {
  assert_eq!(
    Capacity::new(1).as_usize(),
    Capacity::MIN.as_usize(),
    "invalid capacity: expected clamp to MIN",
  );
}

#[test]
fn test_capacity_max() {
  assert_eq!(
    Capacity::new(1 << 30).as_usize(),
    Capacity::MAX.as_usize(),
    "invalid capacity: expected clamp to MAX",
  );

  assert_eq!(Capacity::new(usize::MAX), Capacity::MAX);
}

#[test]
fn test_capacity_round_up() {
  assert_eq!(
    Capacity::new((1 << 7) - 25).as_usize(),
    1 << 7,
    "invalid capacity: expected round up",
  );
}

#[test]
fn test_capacity_exact() {
  assert_eq!(
    Capacity::new(1 << 8).as_usize(),
    1 << 8,
    "invalid capacity: expected no change",
  );
}

#[test]
fn test_capacity_try_new() {
  assert_eq!(Capacity::try_new(0), Err(ConfigError::ZeroCapacity));
  assert_eq!(Capacity::try_new(100), Err(ConfigError::NotPowerOfTwo(100)));
  assert_eq!(
    Capacity::try_new(4),
    Err(ConfigError::CapacityRange {
      value: 4,
      min: Capacity::MIN.as_usize(),
      max: Capacity::MAX.as_usize(),
    }),
  );
  assert_eq!(Capacity::try_new(1 << 12), Ok(Capacity::new(1 << 12)));
  assert_eq!(Capacity::try_from(1 << 9), Ok(Capacity::new(1 << 9)));
}

#[test]
fn test_capacity_doubled() {
  each_capacity!({
    match CAPACITY.doubled() {
      Some(doubled) => assert_eq!(doubled.as_usize(), CAPACITY.as_usize() * 2),
      None => assert_eq!(CAPACITY, Capacity::MAX),
    }

    assert_eq!(1 << CAPACITY.log2(), CAPACITY.as_usize());
  });

  assert_eq!(Capacity::MAX.doubled(), None);
}

#[test]
fn test_cache_line() {
  assert!(CACHE_LINE.is_power_of_two());
  assert!(CACHE_LINE >= size_of::<usize>());
}

#[test]
fn test_config_default() {
  let config: Config = Config::default();

  assert_eq!(config.capacity(), Ok(Capacity::DEF));
  assert_eq!(config.load_factor(), Config::DEFAULT_LOAD_FACTOR);
  assert_eq!(config.stamp_shift(), Config::DEFAULT_STAMP_SHIFT);
  assert_eq!(config.backoff(), BackoffPolicy::default());
  assert_eq!(config.map_to_bucket(), MapToBucket::Modulo);
  assert_eq!(config.validate(), Ok(()));
}

#[test]
fn test_config_validate() {
  assert_eq!(
    Config::new().with_capacity(0).validate(),
    Err(ConfigError::ZeroCapacity),
  );

  assert_eq!(
    Config::new().with_load_factor(0.0).validate(),
    Err(ConfigError::LoadFactor(0.0)),
  );

  assert_eq!(
    Config::new().with_load_factor(1.5).validate(),
    Err(ConfigError::LoadFactor(1.5)),
  );

  assert!(matches!(
    Config::new().with_load_factor(f64::NAN).validate(),
    Err(ConfigError::LoadFactor(_)),
  ));

  assert_eq!(
    Config::new().with_stamp_shift(Config::MAX_STAMP_SHIFT + 1).validate(),
    Err(ConfigError::StampShift {
      value: Config::MAX_STAMP_SHIFT + 1,
      max: Config::MAX_STAMP_SHIFT,
    }),
  );

  assert_eq!(Config::new().with_load_factor(1.0).validate(), Ok(()));
}

#[test]
fn test_config_threshold() {
  let config: Config = Config::new();

  assert_eq!(config.threshold(Capacity::new(8)), 6);
  assert_eq!(config.threshold(Capacity::new(64)), 48);

  // A full load factor still leaves one bucket empty.
  let full: Config = Config::new().with_load_factor(1.0);

  assert_eq!(full.threshold(Capacity::new(8)), 7);
}

#[test]
fn test_config_error_display() {
  assert_eq!(
    ConfigError::NotPowerOfTwo(12).to_string(),
    "capacity 12 is not a power of two",
  );
}
