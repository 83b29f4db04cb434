//! Contention management for retry loops.
//!
//! Every retry loop in the crate, from RDCSS installs to map-level restarts,
//! waits through the strategy selected by a [`BackoffPolicy`].

use crate::sync::hint::spin_loop;
use crate::sync::thread::yield_now;

/// A strategy invoked once per failed iteration of a retry loop.
///
/// Implementations are stateful; a fresh value is created for every loop.
pub(crate) trait Backoff {
  /// Waits before the next attempt.
  fn backoff(&mut self);

  /// Resets the strategy after progress has been made.
  fn reset(&mut self) {}
}

// -----------------------------------------------------------------------------
// No Backoff
// -----------------------------------------------------------------------------

/// Retries immediately.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct NoBackoff;

impl Backoff for NoBackoff {
  #[inline]
  fn backoff(&mut self) {
    // do nothing
  }
}

// -----------------------------------------------------------------------------
// Exponential Backoff
// -----------------------------------------------------------------------------

/// Spins for an exponentially growing number of iterations, then yields.
///
/// The spin count starts at one and doubles after every call until it reaches
/// `max_spins`; from then on each call yields the current thread instead.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ExponentialBackoff {
  spins: u32,
  max_spins: u32,
}

impl ExponentialBackoff {
  /// Creates a new backoff capped at `max_spins` spins per call.
  ///
  /// A cap of zero yields on every call.
  #[inline]
  pub(crate) const fn new(max_spins: u32) -> Self {
    Self {
      spins: 1,
      max_spins,
    }
  }

  /// Returns the number of spins the next call will perform.
  #[cfg(test)]
  #[inline]
  pub(crate) const fn spins(&self) -> u32 {
    if self.spins > self.max_spins {
      0
    } else {
      self.spins
    }
  }
}

impl Backoff for ExponentialBackoff {
  #[inline]
  fn backoff(&mut self) {
    if self.spins > self.max_spins {
      yield_now();
      return;
    }

    for _ in 0..self.spins {
      spin_loop();
    }

    self.spins = self.spins.saturating_mul(2);
  }

  #[inline]
  fn reset(&mut self) {
    self.spins = 1;
  }
}

// -----------------------------------------------------------------------------
// Backoff Policy
// -----------------------------------------------------------------------------

/// Selects how a map or k-CAS engine waits between failed attempts.
///
/// # Examples
///
/// ```
/// use crh::backoff::BackoffPolicy;
/// use crh::Config;
///
/// let config: Config = Config::new().with_backoff(BackoffPolicy::Exponential { max_spins: 16 });
///
/// assert_eq!(config.backoff(), BackoffPolicy::Exponential { max_spins: 16 });
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackoffPolicy {
  /// Retry immediately.
  None,
  /// Spin for an exponentially growing number of iterations up to
  /// `max_spins`, then yield the thread on every further attempt.
  Exponential {
    /// The maximum number of spins per wait.
    max_spins: u32,
  },
}

impl BackoffPolicy {
  /// The default spin cap for [`BackoffPolicy::Exponential`].
  pub const DEFAULT_MAX_SPINS: u32 = 1 << 6;

  /// Creates the state for a new retry loop.
  #[inline]
  pub(crate) const fn start(self) -> AnyBackoff {
    match self {
      Self::None => AnyBackoff::None(NoBackoff),
      Self::Exponential { max_spins } => AnyBackoff::Exponential(ExponentialBackoff::new(max_spins)),
    }
  }
}

impl Default for BackoffPolicy {
  #[inline]
  fn default() -> Self {
    Self::Exponential {
      max_spins: Self::DEFAULT_MAX_SPINS,
    }
  }
}

/// The retry-loop state created by [`BackoffPolicy::start`].
#[derive(Clone, Copy, Debug)]
pub(crate) enum AnyBackoff {
  None(NoBackoff),
  Exponential(ExponentialBackoff),
}

impl Backoff for AnyBackoff {
  #[inline]
  fn backoff(&mut self) {
    match self {
      Self::None(inner) => inner.backoff(),
      Self::Exponential(inner) => inner.backoff(),
    }
  }

  #[inline]
  fn reset(&mut self) {
    match self {
      Self::None(inner) => inner.reset(),
      Self::Exponential(inner) => inner.reset(),
    }
  }
}
