mod traits;

pub mod collector;

pub(crate) use self::traits::Retired;

pub use self::traits::Collector;
pub use self::traits::CollectorWeak;

/// The collector used when none is specified.
#[cfg(feature = "sdd")]
pub type DefaultCollector = collector::Sdd;

/// The collector used when none is specified.
#[cfg(not(feature = "sdd"))]
pub type DefaultCollector = collector::Leak;
