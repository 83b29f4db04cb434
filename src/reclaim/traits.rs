// -----------------------------------------------------------------------------
// Collector API
// -----------------------------------------------------------------------------

/// A memory reclamation strategy that guarantees eventual reclamation of
/// retired objects.
///
/// # Safety
///
/// This is an **unsafe marker trait** extending [`CollectorWeak`]. By
/// implementing this trait, a collector makes the following guarantee:
///
/// > Any object passed to [`retire()`] will eventually have its destructor run
/// > and its memory reclaimed, assuming the program continues to make
/// > progress.
///
/// In particular, implementations of `Collector` **must not permanently leak**
/// retired objects. Temporary deferral of reclamation (e.g. due to pinned
/// threads or epoch lag) is expected, but reclamation must occur once it is
/// safe to do so.
///
/// [`retire()`]: crate::reclaim::CollectorWeak::retire
/// [`CollectorWeak`]: crate::reclaim::CollectorWeak
pub unsafe trait Collector: CollectorWeak {}

/// A memory reclamation strategy.
///
/// This trait defines the minimal interface required to free memory that
/// other threads may still be reading. It does *not* guarantee that retired
/// objects are eventually reclaimed.
///
/// Implementations are permitted to permanently leak retired objects. If
/// eventual reclamation is required, see [`Collector`].
///
/// # Overview
///
/// A `CollectorWeak` provides:
///
/// - A [`Guard`] type that pins the current thread. Creating one enters a
///   critical section; dropping it leaves.
/// - A mechanism ([`retire()`]) to hand an unlinked object to the collector.
/// - A mechanism ([`flush()`]) to attempt reclamation.
///
/// The collector is responsible for ensuring that an object retired while
/// some guard is alive is not destroyed before that guard is dropped.
///
/// The map uses guards around every operation and retires erased entries and
/// replaced bucket tables. Descriptor records are never retired; they live in
/// a per-map arena for the lifetime of the map.
///
/// [`Collector`]: crate::reclaim::Collector
/// [`flush()`]: crate::reclaim::CollectorWeak::flush
/// [`Guard`]: crate::reclaim::CollectorWeak::Guard
/// [`retire()`]: crate::reclaim::CollectorWeak::retire
pub trait CollectorWeak {
  /// A guard that keeps the current thread pinned.
  type Guard;

  /// Creates a new `Guard`, pinning the current thread.
  fn guard() -> Self::Guard;

  /// Schedules `ptr` for destruction once no guard can observe it.
  ///
  /// # Safety
  ///
  /// - `ptr` must come from [`Box::into_raw`] and must not be retired twice.
  /// - `ptr` must already be unreachable for threads that pin *after* this
  ///   call.
  unsafe fn retire<T>(ptr: *mut T, guard: &Self::Guard)
  where
    T: Send + 'static;

  /// Attempts to trigger memory reclamation.
  ///
  /// This function may:
  ///
  /// - Advance global epochs.
  /// - Drain deferred reclamation queues.
  /// - Execute destructors of previously retired objects.
  /// - Perform no work at all.
  ///
  /// # Guarantees
  ///
  /// - This function is best-effort.
  /// - It does **not** guarantee that reclamation will occur.
  /// - It does **not** guarantee progress.
  fn flush();
}

// -----------------------------------------------------------------------------
// Retired Object
// -----------------------------------------------------------------------------

/// An owned pointer awaiting deferred destruction.
pub(crate) struct Retired<T> {
  ptr: *mut T,
}

impl<T> Retired<T> {
  /// # Safety
  ///
  /// `ptr` must come from [`Box::into_raw`] and be owned by the caller.
  #[inline]
  pub(crate) const unsafe fn new(ptr: *mut T) -> Self {
    Self { ptr }
  }

  #[inline]
  pub(crate) fn reclaim(self) {
    // SAFETY:
    // - `self.ptr` was created by `Box::into_raw` (see `Retired::new`).
    // - `Retired` is consumed, so the box is reconstructed exactly once.
    drop(unsafe { Box::from_raw(self.ptr) });
  }
}

// SAFETY: `Retired<T>` owns a `Box<T>`; sending it sends the `T`.
unsafe impl<T: Send> Send for Retired<T> {}
