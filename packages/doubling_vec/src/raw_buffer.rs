use std::alloc::Layout;
use std::any::type_name;
use std::convert::Infallible;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};

use crate::{Allocator, Error, Result};

/// An owned block of `capacity` slots for items of type `T`, acquired from and released to an
/// allocation strategy.
///
/// This is the only place that talks to the [`Allocator`]. The buffer does not know which slots
/// hold items - that is the business of its owner, which must drop any live items before the
/// buffer itself is dropped. Dropping the buffer only releases the memory block.
///
/// A buffer with zero capacity, or with items of a zero-sized type, owns no block and uses a
/// dangling (but well-aligned) pointer instead.
pub(crate) struct RawBuffer<T, A: Allocator> {
    first_slot_ptr: NonNull<T>,

    capacity: usize,

    allocator: A,

    _items: PhantomData<T>,
}

impl<T, A: Allocator> RawBuffer<T, A> {
    /// Creates a buffer that owns no block.
    pub(crate) const fn new_in(allocator: A) -> Self {
        Self {
            first_slot_ptr: NonNull::dangling(),
            capacity: 0,
            allocator,
            _items: PhantomData,
        }
    }

    /// Creates a buffer with exactly `capacity` slots.
    pub(crate) fn with_capacity_in<E>(capacity: usize, allocator: A) -> Result<Self, E> {
        let mut buffer = Self::new_in(allocator);

        buffer.first_slot_ptr = buffer.acquire::<E>(capacity)?;
        buffer.capacity = capacity;

        Ok(buffer)
    }

    #[must_use]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub(crate) fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Pointer to the first slot. Valid for zero-length reads and writes even if the buffer owns
    /// no block.
    #[must_use]
    pub(crate) fn as_ptr(&self) -> *mut T {
        self.first_slot_ptr.as_ptr()
    }

    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    #[must_use]
    pub(crate) fn slot_ptr(&self, index: usize) -> NonNull<T> {
        assert!(
            index < self.capacity,
            "slot {index} out of bounds in buffer of {} with capacity {}",
            type_name::<T>(),
            self.capacity
        );

        // SAFETY: Guarded by bounds check above, so the pointer stays within the block.
        unsafe { self.first_slot_ptr.add(index) }
    }

    /// Moves the items in the first `live` slots into a new block of `new_capacity` slots and
    /// releases the old block.
    ///
    /// Either the whole relocation happens or, if the new block cannot be acquired, nothing
    /// changes and the error is returned. Moving items between blocks is a bitwise copy, which
    /// cannot fail.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the first `live` slots hold initialized items and that `live`
    /// does not exceed `new_capacity`.
    pub(crate) unsafe fn relocate<E>(&mut self, new_capacity: usize, live: usize) -> Result<(), E> {
        debug_assert!(live <= self.capacity);
        debug_assert!(live <= new_capacity);

        let new_first_slot_ptr = self.acquire::<E>(new_capacity)?;

        // SAFETY: The old block is valid for `live` reads (caller guarantee), the new block is
        // valid for `new_capacity >= live` writes and the two are distinct blocks, as required
        // from the allocator. Items in the old block become logically uninitialized, which is
        // fine because we release it without dropping anything.
        unsafe {
            ptr::copy_nonoverlapping(
                self.first_slot_ptr.as_ptr(),
                new_first_slot_ptr.as_ptr(),
                live,
            );
        }

        let old_first_slot_ptr = mem::replace(&mut self.first_slot_ptr, new_first_slot_ptr);
        let old_capacity = mem::replace(&mut self.capacity, new_capacity);

        // SAFETY: This is the block we acquired for the old capacity and nothing refers to it
        // any more.
        unsafe {
            self.release(old_first_slot_ptr, old_capacity);
        }

        Ok(())
    }

    fn layout<E>(capacity: usize) -> Result<Layout, E> {
        Layout::array::<T>(capacity)
            .ok()
            .ok_or(Error::CapacityOverflow)
    }

    fn acquire<E>(&self, capacity: usize) -> Result<NonNull<T>, E> {
        let layout = Self::layout::<E>(capacity)?;

        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }

        Ok(self.allocator.allocate(layout)?.cast())
    }

    /// # Safety
    ///
    /// The caller must ensure that the pointer was returned by `acquire()` for the same capacity
    /// and has not been released yet.
    unsafe fn release(&self, first_slot_ptr: NonNull<T>, capacity: usize) {
        let layout = Self::layout::<Infallible>(capacity)
            .expect("layout was valid when the block was acquired");

        if layout.size() == 0 {
            return;
        }

        // SAFETY: Forwarding the caller's guarantee. `acquire()` only asks the allocator for
        // blocks with a non-zero size, which is exactly the case we are in.
        unsafe {
            self.allocator.deallocate(first_slot_ptr.cast(), layout);
        }
    }
}

impl<T, A: Allocator> Drop for RawBuffer<T, A> {
    fn drop(&mut self) {
        // SAFETY: The buffer always holds the block acquired for its current capacity (or a
        // dangling pointer that `release()` recognizes as owning nothing).
        unsafe {
            self.release(self.first_slot_ptr, self.capacity);
        }
    }
}

// SAFETY: The buffer exclusively owns its block, so it can move between threads as long as the
// items and the allocation strategy can.
unsafe impl<T: Send, A: Allocator + Send> Send for RawBuffer<T, A> {}

// SAFETY: Shared access to the buffer only hands out pointers, all item access goes through the
// owner, which follows the normal borrowing rules for `T`.
unsafe impl<T: Sync, A: Allocator + Sync> Sync for RawBuffer<T, A> {}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use super::*;
    use crate::Global;
    use crate::test_support::TrackingAllocator;

    #[test]
    fn empty_owns_nothing() {
        let allocator = TrackingAllocator::new();

        let buffer = RawBuffer::<u32, _>::new_in(allocator.clone());
        assert_eq!(buffer.capacity(), 0);

        drop(buffer);

        assert_eq!(allocator.total_allocations(), 0);
    }

    #[test]
    fn with_capacity_acquires_once_and_releases_on_drop() {
        let allocator = TrackingAllocator::new();

        let buffer = RawBuffer::<u64, _>::with_capacity_in::<Infallible>(8, allocator.clone())
            .unwrap();

        assert_eq!(buffer.capacity(), 8);
        assert_eq!(allocator.live_blocks(), 1);

        drop(buffer);

        assert_eq!(allocator.live_blocks(), 0);
        assert_eq!(allocator.total_allocations(), 1);
    }

    #[test]
    fn zero_capacity_does_not_allocate() {
        let allocator = TrackingAllocator::new();

        let buffer =
            RawBuffer::<u64, _>::with_capacity_in::<Infallible>(0, allocator.clone()).unwrap();
        drop(buffer);

        assert_eq!(allocator.total_allocations(), 0);
    }

    #[test]
    fn zero_sized_items_do_not_allocate() {
        let allocator = TrackingAllocator::new();

        let mut buffer =
            RawBuffer::<(), _>::with_capacity_in::<Infallible>(16, allocator.clone()).unwrap();

        unsafe { buffer.relocate::<Infallible>(32, 0) }.unwrap();

        assert_eq!(buffer.capacity(), 32);
        assert_eq!(allocator.total_allocations(), 0);
    }

    #[test]
    fn relocate_moves_items() {
        let mut buffer = RawBuffer::<String, _>::with_capacity_in::<Infallible>(2, Global).unwrap();

        unsafe {
            buffer.slot_ptr(0).write("first".to_string());
            buffer.slot_ptr(1).write("second".to_string());
        }

        unsafe { buffer.relocate::<Infallible>(4, 2) }.unwrap();

        assert_eq!(buffer.capacity(), 4);

        unsafe {
            assert_eq!(buffer.slot_ptr(0).as_ref(), "first");
            assert_eq!(buffer.slot_ptr(1).as_ref(), "second");

            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(buffer.as_ptr(), 2));
        }
    }

    #[test]
    fn relocate_swaps_blocks() {
        let allocator = TrackingAllocator::new();

        let mut buffer =
            RawBuffer::<u32, _>::with_capacity_in::<Infallible>(1, allocator.clone()).unwrap();

        unsafe { buffer.relocate::<Infallible>(2, 0) }.unwrap();

        assert_eq!(allocator.total_allocations(), 2);
        assert_eq!(allocator.live_blocks(), 1);
    }

    #[test]
    fn failed_relocate_keeps_old_block() {
        let allocator = TrackingAllocator::with_budget(1);

        let mut buffer =
            RawBuffer::<u32, _>::with_capacity_in::<Infallible>(1, allocator.clone()).unwrap();

        unsafe { buffer.slot_ptr(0).write(7) };

        let result = unsafe { buffer.relocate::<Infallible>(2, 1) };

        assert!(matches!(result, Err(Error::Allocation(_))));
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(unsafe { buffer.slot_ptr(0).read() }, 7);
        assert_eq!(allocator.live_blocks(), 1);
    }

    #[test]
    fn overflowing_capacity_is_error() {
        let result = RawBuffer::<u64, _>::with_capacity_in::<Infallible>(usize::MAX, Global);

        assert!(matches!(result, Err(Error::CapacityOverflow)));
    }

    #[test]
    #[should_panic]
    fn slot_out_of_bounds_panics() {
        let buffer = RawBuffer::<u32, _>::with_capacity_in::<Infallible>(2, Global).unwrap();

        _ = buffer.slot_ptr(2);
    }
}
