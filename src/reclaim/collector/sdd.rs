use crate::reclaim::Collector;
use crate::reclaim::CollectorWeak;
use crate::reclaim::Retired;

/// A reclamation strategy based on [`sdd`].
///
/// [`sdd`]: https://crates.io/crates/sdd
pub enum Sdd {}

// SAFETY: `sdd` runs every deferred closure once all guards that existed when
// it was deferred have been dropped.
unsafe impl Collector for Sdd {}

impl CollectorWeak for Sdd {
  type Guard = sdd::Guard;

  #[inline]
  fn guard() -> Self::Guard {
    sdd::Guard::new()
  }

  #[inline]
  unsafe fn retire<T>(ptr: *mut T, guard: &Self::Guard)
  where
    T: Send + 'static,
  {
    // SAFETY: Caller guarantees `ptr` is an unlinked `Box<T>` retired once.
    let retired: Retired<T> = unsafe { Retired::new(ptr) };

    guard.defer_execute(move || retired.reclaim());
  }

  #[inline]
  fn flush() {
    // sdd triggers reclamation after we've observed three new epochs; we
    // observe one extra since we might lag behind the global value.
    const EPOCH: usize = 4;

    for _ in 0..EPOCH {
      Self::guard().accelerate();
    }
  }
}
