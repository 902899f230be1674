use std::alloc::{Layout, alloc, dealloc};
use std::ptr::NonNull;

use crate::AllocError;

/// A strategy for acquiring and releasing the raw memory blocks that back a
/// [`DoublingVec`][crate::DoublingVec].
///
/// The vector only ever requests blocks with a non-zero size. Zero-sized storage (an empty
/// vector or a vector of zero-sized items) never reaches the strategy.
///
/// A strategy may carry state (e.g. a budget or usage counters). Every block is released through
/// the same strategy instance that acquired it, because the strategy travels together with the
/// block when vectors are moved or swapped.
///
/// # Safety
///
/// Implementations must return from [`allocate()`][Self::allocate] a pointer to a block that is
/// valid for reads and writes of `layout.size()` bytes, is aligned to `layout.align()` and stays
/// valid until it is passed to [`deallocate()`][Self::deallocate] on the same instance (or on an
/// instance it has been moved into).
pub unsafe trait Allocator {
    /// Acquires a block that fits `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the strategy cannot provide such a block. The error is forwarded
    /// unchanged to the caller of the vector operation that requested the block.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Releases a block previously returned by [`allocate()`][Self::allocate].
    ///
    /// # Safety
    ///
    /// The caller must ensure that `ptr` was returned by `allocate()` of this instance with the
    /// same `layout` and has not already been released.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Returns the strategy instance that a copy of a vector using `self` should use.
    ///
    /// Copies never share blocks with their source, so this may return either an independent
    /// strategy or a handle to the same underlying state, whichever the strategy prefers.
    #[must_use]
    fn for_copy(&self) -> Self
    where
        Self: Sized;
}

/// The allocation strategy backed by the global Rust allocator.
///
/// This is the default strategy of [`DoublingVec`][crate::DoublingVec].
///
/// # Examples
///
/// ```
/// use doubling_vec::{DoublingVec, Global};
///
/// let mut numbers = DoublingVec::new_in(Global);
/// numbers.push(42_u64).unwrap();
///
/// assert_eq!(numbers[0], 42);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Global;

// SAFETY: Blocks come straight from the global allocator, which upholds the same contract.
unsafe impl Allocator for Global {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Err(AllocError::new(layout));
        }

        // SAFETY: The layout is not zero-sized (checked above).
        let ptr = unsafe { alloc(layout) };

        NonNull::new(ptr).ok_or_else(|| AllocError::new(layout))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Forwarding the caller's guarantee that the block came from `allocate()` with
        // this layout, which in turn means it came from `alloc()` with this layout.
        unsafe {
            dealloc(ptr.as_ptr(), layout);
        }
    }

    fn for_copy(&self) -> Self {
        Self
    }
}

// SAFETY: Forwards to the referenced strategy, which upholds the contract for us.
unsafe impl<A: Allocator> Allocator for &A {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Forwarding the caller's guarantees.
        unsafe {
            (**self).deallocate(ptr, layout);
        }
    }

    /// Copies share the referenced strategy.
    fn for_copy(&self) -> Self {
        *self
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(
    clippy::undocumented_unsafe_blocks,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn global_round_trip() {
        let layout = Layout::array::<u32>(16).unwrap();

        let ptr = Global.allocate(layout).unwrap();

        unsafe {
            ptr.cast::<u32>().write(0xDEAD_BEEF);
            assert_eq!(ptr.cast::<u32>().read(), 0xDEAD_BEEF);
        }

        unsafe { Global.deallocate(ptr, layout) };
    }

    #[test]
    fn global_rejects_zero_sized() {
        let layout = Layout::new::<()>();

        let error = Global.allocate(layout).unwrap_err();
        assert_eq!(error.layout(), layout);
    }

    #[test]
    fn global_is_aligned() {
        #[repr(align(64))]
        struct Wide(#[expect(dead_code, reason = "only the alignment matters")] u8);

        let layout = Layout::new::<Wide>();
        let ptr = Global.allocate(layout).unwrap();

        assert_eq!(ptr.as_ptr().align_offset(64), 0);

        unsafe { Global.deallocate(ptr, layout) };
    }

    #[derive(Debug, Default)]
    struct Counting {
        live: Cell<usize>,
    }

    unsafe impl Allocator for Counting {
        fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
            self.live.set(self.live.get() + 1);
            Global.allocate(layout)
        }

        unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
            self.live.set(self.live.get() - 1);
            unsafe { Global.deallocate(ptr, layout) };
        }

        fn for_copy(&self) -> Self {
            Self::default()
        }
    }

    #[test]
    fn reference_shares_state() {
        let counting = Counting::default();
        let by_ref = &counting;
        let copy = <&Counting as Allocator>::for_copy(&by_ref);

        let layout = Layout::new::<u64>();
        let ptr = copy.allocate(layout).unwrap();

        assert_eq!(counting.live.get(), 1);

        unsafe { by_ref.deallocate(ptr, layout) };

        assert_eq!(counting.live.get(), 0);
    }
}
