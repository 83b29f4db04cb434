use crate::reclaim::CollectorWeak;

/// A reclamation strategy that leaks retired objects.
///
/// Useful when the map lives for the whole program, or under model checkers
/// where epoch-based reclamation only adds noise.
pub enum Leak {}

impl CollectorWeak for Leak {
  type Guard = ();

  #[inline]
  fn guard() -> Self::Guard {
    // do nothing
  }

  #[inline]
  unsafe fn retire<T>(_ptr: *mut T, _guard: &Self::Guard)
  where
    T: Send + 'static,
  {
    // True to the name, the retired `Box<T>` is never freed
  }

  #[inline]
  fn flush() {
    // do nothing
  }
}
