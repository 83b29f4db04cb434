//! Cache-aligned array allocation.
//!
//! Provides [`Array`], the backing storage for bucket and timestamp words.

use core::mem::ManuallyDrop;
use core::mem::MaybeUninit;
use core::ptr;
use core::ptr::NonNull;
use core::slice;

use crate::alloc::Layout;
use crate::alloc::alloc;
use crate::alloc::dealloc;
use crate::alloc::handle_alloc_error;
use crate::params::CACHE_LINE;

/// A fixed-size, heap-allocated array aligned to [`CACHE_LINE`].
pub(crate) struct Array<T> {
  nonnull: NonNull<T>,
  length: usize,
}

impl<T> Array<T> {
  /// Creates a new array, initializing each element with the given function.
  #[allow(dead_code, reason = "only used under loom or shuttle")]
  #[inline]
  pub(crate) fn new<F>(length: usize, init: F) -> Self
  where
    F: Fn(usize, &mut MaybeUninit<T>),
  {
    let this: Array<MaybeUninit<T>> = Self::new_uninit(length);

    for index in 0..length {
      // SAFETY: `index < length` and allocation holds `length` elements.
      let ptr: NonNull<MaybeUninit<T>> = unsafe { this.nonnull.add(index) };

      // SAFETY: Pointer is valid and aligned; we have exclusive access.
      let uninit: &mut MaybeUninit<T> = unsafe { &mut *ptr.as_ptr() };

      init(index, uninit);
    }

    // SAFETY: All `length` elements initialized by the loop.
    unsafe { this.assume_init() }
  }

  /// Creates a new array with all bytes zeroed.
  #[allow(dead_code, reason = "not used under loom or shuttle")]
  #[inline]
  pub(crate) fn new_zeroed(length: usize) -> Array<MaybeUninit<T>> {
    let this: Array<MaybeUninit<T>> = Self::new_uninit(length);

    // SAFETY: Allocation holds `length` elements; zeroing `MaybeUninit` is valid.
    unsafe {
      this.nonnull.write_bytes(0, length);
    }

    this
  }

  /// Creates a new array without initializing its contents.
  #[inline]
  pub(crate) fn new_uninit(length: usize) -> Array<MaybeUninit<T>> {
    let layout: Layout = Self::layout(length);

    // SAFETY: `layout` has non-zero size.
    let raw: *mut u8 = unsafe { alloc(layout) };

    Array {
      nonnull: match NonNull::new(raw.cast()) {
        Some(ptr) => ptr,
        None => handle_alloc_error(layout),
      },
      length,
    }
  }

  #[inline]
  fn layout(length: usize) -> Layout {
    assert!(length != 0, "array length must be non-zero");
    assert!(size_of::<T>() != 0, "array element must not be zero-sized");

    match Layout::array::<T>(length).and_then(|layout| layout.align_to(CACHE_LINE)) {
      Ok(layout) => layout.pad_to_align(),
      Err(_) => panic!("array layout overflows `isize::MAX`"),
    }
  }

  #[inline]
  pub(crate) const fn len(&self) -> usize {
    self.length
  }

  #[inline]
  pub(crate) const fn as_slice(&self) -> &[T] {
    // SAFETY: Contiguous allocation of `length` initialized elements.
    unsafe { slice::from_raw_parts(self.nonnull.as_ptr(), self.length) }
  }

  /// Returns a reference to the element at `index`.
  ///
  /// # Panics
  ///
  /// Panics if `index` is out of bounds.
  #[inline]
  pub(crate) fn get(&self, index: usize) -> &T {
    &self.as_slice()[index]
  }
}

impl<T> Array<MaybeUninit<T>> {
  /// Converts to an initialized array.
  ///
  /// # Safety
  ///
  /// All elements must be initialized.
  #[inline]
  pub(crate) unsafe fn assume_init(self) -> Array<T> {
    // Prevent drop from running on `self` (would deallocate).
    let this: ManuallyDrop<Self> = ManuallyDrop::new(self);

    Array {
      nonnull: this.nonnull.cast(),
      length: this.length,
    }
  }
}

impl<T> Drop for Array<T> {
  fn drop(&mut self) {
    // SAFETY: All elements are initialized and exclusively owned.
    unsafe {
      ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
        self.nonnull.as_ptr(),
        self.length,
      ));
    }

    // SAFETY: Allocated with `Self::layout(self.length)` in `new_uninit`.
    unsafe {
      dealloc(self.nonnull.cast().as_ptr(), Self::layout(self.length));
    }
  }
}

// SAFETY: `Array<T>` owns its elements like `Box<[T]>`.
unsafe impl<T: Send> Send for Array<T> {}

// SAFETY: Shared access only hands out `&T`.
unsafe impl<T: Sync> Sync for Array<T> {}
