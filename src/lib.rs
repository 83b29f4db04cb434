//! A lock-free concurrent Robin Hood hash map built on multi-word CAS.
//!
//! `crh` provides [`RobinMap`], an open-addressed hash map whose insertions
//! and erasures are committed atomically by a lock-free k-word
//! compare-and-swap ([`KCas`]), itself built on restricted double-compare
//! single-swap (RDCSS). Robin Hood displacement keeps search chains short;
//! the k-CAS makes each displacement chain appear to move all at once.
//!
//! # Usage
//!
//! ```
//! use crh::RobinMap;
//!
//! let map: RobinMap<&str, u32> = RobinMap::new();
//!
//! // Insert entries; an existing key is never overwritten
//! assert!(map.emplace("apple", 3));
//! assert!(!map.emplace("apple", 5));
//!
//! // Look entries up
//! assert_eq!(map.read("apple"), Some(3));
//! assert_eq!(map.with("apple", |count| count * 2), Some(6));
//!
//! // Remove entries
//! assert!(map.erase("apple"));
//! assert!(!map.contains("apple"));
//! ```
//!
//! # Configuration
//!
//! Maps are configured at runtime through [`Config`]:
//!
//! ```
//! use crh::{Config, RobinMap};
//! use crh::backoff::BackoffPolicy;
//! use crh::hash::MapToBucket;
//!
//! let config: Config = Config::new()
//!   .with_capacity(256)
//!   .with_load_factor(0.5)
//!   .with_backoff(BackoffPolicy::None)
//!   .with_map_to_bucket(MapToBucket::Fibonacci);
//!
//! let map: RobinMap<u64, u64> = RobinMap::with_config(config);
//! assert_eq!(map.capacity(), 256);
//! ```
//!
//! Capacity must be a power of two in <code>[Capacity::MIN]..=[Capacity::MAX]</code>;
//! [`RobinMap::try_with_config`] reports invalid settings as a
//! [`ConfigError`] instead of panicking.
//!
//! # Concurrency
//!
//! All operations take `&self` and are lock-free. A mutator that meets a
//! resize in progress helps migrate the table instead of waiting for it.
//!
//! ```no_run
//! use crh::RobinMap;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let map: Arc<RobinMap<u64, u64>> = Arc::new(RobinMap::new());
//!
//! let handles: Vec<_> = (0..4)
//!   .map(|thread_id| {
//!     let map = Arc::clone(&map);
//!     thread::spawn(move || {
//!       for i in 0..100 {
//!         let key = thread_id * 1000 + i;
//!         map.emplace(key, i);
//!         map.erase(&key);
//!       }
//!     })
//!   })
//!   .collect();
//!
//! for handle in handles {
//!   handle.join().unwrap();
//! }
//! ```
//!
//! ## Memory Reclamation
//!
//! Erased entries and replaced bucket tables are retired through a
//! [`CollectorWeak`]; by default the epoch-based [`sdd`] collector. Borrowing
//! an entry ([`RobinMap::find`], [`RobinMap::iter`]) requires a guard from
//! [`RobinMap::guard`], which keeps the entry alive while it exists.
//!
//! ## Multi-word CAS
//!
//! The engine behind the map is available on its own as [`KCas`]. One
//! operation may cover any number of words. Values passed to it must leave
//! the low two bits clear; those bits tag descriptor handles (see
//! [`word::TAG_MASK`]).
//!
//! [Capacity::MAX]: crate::config::Capacity::MAX
//! [Capacity::MIN]: crate::config::Capacity::MIN
//! [`CollectorWeak`]: crate::garbage::CollectorWeak
//! [`sdd`]: https://docs.rs/sdd
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod array;
mod bucket;
mod error;
mod iter;
mod kcas;
mod params;
mod public;
mod rdcss;
mod reclaim;
mod record;
mod table;
mod utils;

pub mod backoff;
pub mod hash;
pub mod word;

#[cfg(all(test, not(any(loom, shuttle))))]
mod tests;

pub(crate) use crate::utils::alloc;
pub(crate) use crate::utils::sync;

pub mod implementation {
  #![doc = include_str!("../IMPLEMENTATION.md")]
}

pub mod config {
  //! Configuration types which can be used to override the default map
  //! settings.

  pub use crate::error::ConfigError;
  pub use crate::params::CACHE_LINE;
  pub use crate::params::Capacity;
  pub use crate::params::Config;
}

pub mod garbage {
  //! Memory reclamation traits and built-in strategies.
  //!
  //! You do not need to interact with these traits directly unless choosing
  //! a non-default collector for a [`RobinMap`].
  //!
  //! [`RobinMap`]: crate::RobinMap

  pub use crate::reclaim::Collector;
  pub use crate::reclaim::CollectorWeak;
  pub use crate::reclaim::DefaultCollector;
  pub use crate::reclaim::collector;
}

#[doc(inline)]
pub use self::config::Capacity;

#[doc(inline)]
pub use self::config::Config;

#[doc(inline)]
pub use self::config::ConfigError;

pub use self::iter::EntryRef;
pub use self::iter::Iter;
pub use self::kcas::KCas;
pub use self::kcas::KCasWord;
pub use self::public::RobinMap;
