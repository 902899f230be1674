use std::any::type_name;
use std::convert::Infallible;
use std::fmt;
use std::mem;
use std::ops::{Index, IndexMut};
use std::ptr;
use std::result;
use std::slice;

use tracing::{debug, trace};

use crate::{
    Allocator, DoublingVecBuilder, Error, FillGuard, Global, PushError, RawBuffer, Result, TryClone,
    raise,
};

/// A contiguous growable vector that stores its items in a single block obtained from a
/// pluggable [allocation strategy][Allocator].
///
/// Items are added to the end with [`push()`][1] (taking ownership of the item) or
/// [`push_copy()`][2] (copying the item via [`TryClone`]) and accessed by index. When the vector
/// is full, adding an item first doubles the capacity (or acquires a single slot if the vector
/// has no storage yet), which keeps appends amortized O(1).
///
/// # Failure behavior
///
/// All operations that can fail report the failure via [`Error`] and leave the vector exactly as
/// it was before the call:
///
/// * Growth either relocates every item into the new block or, if the block cannot be acquired,
///   leaves the existing block and items untouched.
/// * Copying ([`try_clone()`][3], [`Clone`]) builds the copy in a fresh block. If copying any
///   item fails, the items copied so far are dropped and the fresh block is released. The source
///   vector is never modified.
/// * Copy assignment ([`try_clone_from()`][4], [`Clone::clone_from()`]) builds the copy before
///   touching the target.
///
/// Moving ([`take()`][5], [`move_from()`][6]) and exchanging ([`swap()`][7]) contents cannot fail.
///
/// # Capacity
///
/// Storage is only acquired when the first item is added (unless configured otherwise via the
/// [builder][8]). [`clear()`][9] drops the items but keeps the storage. Copies are sized exactly
/// to the number of items of the source, regardless of the source capacity.
///
/// # Examples
///
/// ```
/// use doubling_vec::DoublingVec;
///
/// let mut words = DoublingVec::new();
/// words.push("one".to_string()).unwrap();
/// words.push("two".to_string()).unwrap();
/// words.push("three".to_string()).unwrap();
///
/// let copy = words.clone();
/// words.push("four".to_string()).unwrap();
///
/// assert_eq!(words.len(), 4);
/// assert_eq!(copy.len(), 3);
/// assert_eq!(copy[2], "three");
/// ```
///
/// [1]: Self::push
/// [2]: Self::push_copy
/// [3]: Self::try_clone
/// [4]: Self::try_clone_from
/// [5]: Self::take
/// [6]: Self::move_from
/// [7]: Self::swap
/// [8]: Self::builder
/// [9]: Self::clear
pub struct DoublingVec<T, A: Allocator = Global> {
    buffer: RawBuffer<T, A>,

    /// Number of leading slots in `buffer` that hold live items. All other slots are
    /// uninitialized.
    len: usize,
}

impl<T> DoublingVec<T, Global> {
    /// Creates an empty vector that uses the global allocator.
    ///
    /// No memory is acquired until the first item is added.
    ///
    /// # Examples
    ///
    /// ```
    /// use doubling_vec::DoublingVec;
    ///
    /// let numbers = DoublingVec::<u32>::new();
    ///
    /// assert!(numbers.is_empty());
    /// assert_eq!(numbers.capacity(), 0);
    /// ```
    #[must_use]
    pub const fn new() -> Self {
        Self::new_in(Global)
    }

    /// Creates a builder that can be used to customize the vector.
    pub fn builder() -> DoublingVecBuilder<T> {
        DoublingVecBuilder::new()
    }
}

impl<T, A: Allocator> DoublingVec<T, A> {
    /// Creates an empty vector that acquires its storage from `allocator`.
    ///
    /// No memory is acquired until the first item is added.
    #[must_use]
    pub const fn new_in(allocator: A) -> Self {
        Self::from_buffer(RawBuffer::new_in(allocator))
    }

    pub(crate) const fn from_buffer(buffer: RawBuffer<T, A>) -> Self {
        Self { buffer, len: 0 }
    }

    /// The number of items in the vector.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the vector contains no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of items the vector can hold before it needs to grow.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// The allocation strategy that provides the storage of this vector.
    #[must_use]
    pub fn allocator(&self) -> &A {
        self.buffer.allocator()
    }

    /// Adds an item to the end of the vector, growing the storage if the vector is full.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage needed to grow could not be acquired. The vector is
    /// unchanged in that case and the item is dropped. Use [`try_push()`][Self::try_push] to get
    /// the item back instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use doubling_vec::DoublingVec;
    ///
    /// let mut numbers = DoublingVec::new();
    /// numbers.push(1).unwrap();
    /// numbers.push(2).unwrap();
    /// numbers.push(3).unwrap();
    ///
    /// assert_eq!(numbers.len(), 3);
    /// assert_eq!(numbers[1], 2);
    /// ```
    pub fn push(&mut self, item: T) -> Result<()> {
        self.reserve_for_one::<Infallible>()?;
        self.write_next(item);

        Ok(())
    }

    /// Adds an item to the end of the vector, handing the item back if the storage needed to
    /// grow could not be acquired.
    ///
    /// # Errors
    ///
    /// Returns a [`PushError`] holding the item and the reason if the vector could not grow. The
    /// vector is unchanged in that case, so the caller may retry with the returned item.
    ///
    /// # Examples
    ///
    /// ```
    /// use doubling_vec::DoublingVec;
    ///
    /// let mut words = DoublingVec::new();
    ///
    /// if let Err(error) = words.try_push("precious".to_string()) {
    ///     let word = error.into_inner();
    ///     println!("no room for {word} yet");
    /// }
    /// ```
    pub fn try_push(&mut self, item: T) -> result::Result<(), PushError<T>> {
        if let Err(error) = self.reserve_for_one::<Infallible>() {
            return Err(PushError::new(item, error));
        }

        self.write_next(item);

        Ok(())
    }

    /// Adds a copy of an item to the end of the vector, growing the storage if the vector is full.
    ///
    /// The copy is made before any growth, so a failing copy never changes the vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ItemCopy`] if the item could not be copied, or another error if the
    /// storage needed to grow could not be acquired. The vector is unchanged in both cases.
    pub fn push_copy(&mut self, item: &T) -> Result<(), T::Error>
    where
        T: TryClone,
    {
        let copy = item.try_clone().map_err(|source| Error::ItemCopy {
            index: self.len,
            source,
        })?;

        self.reserve_for_one::<T::Error>()?;
        self.write_next(copy);

        Ok(())
    }

    /// Drops all items in index order, keeping the storage for reuse.
    ///
    /// # Examples
    ///
    /// ```
    /// use doubling_vec::DoublingVec;
    ///
    /// let mut numbers = DoublingVec::new();
    /// numbers.push(1).unwrap();
    /// numbers.push(2).unwrap();
    /// numbers.push(3).unwrap();
    ///
    /// numbers.clear();
    ///
    /// assert!(numbers.is_empty());
    /// assert!(numbers.capacity() >= 3);
    /// ```
    pub fn clear(&mut self) {
        // We forget the items before dropping them, so a panicking item destructor cannot
        // make us drop anything twice.
        let live = mem::replace(&mut self.len, 0);

        // SAFETY: The first `live` slots held initialized items that nothing else refers to
        // and that the vector no longer considers live.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(self.buffer.as_ptr(), live));
        }
    }

    /// The items of the vector as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: The first `len` slots hold initialized items and the pointer is valid (and
        // aligned) even when the vector owns no block.
        unsafe { slice::from_raw_parts(self.buffer.as_ptr(), self.len) }
    }

    /// The items of the vector as a mutable slice.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: As in `as_slice()`, plus we hold an exclusive reference to the vector.
        unsafe { slice::from_raw_parts_mut(self.buffer.as_ptr(), self.len) }
    }

    /// Returns a reference to the item at `index` without checking bounds.
    ///
    /// Use indexing (`vec[index]`) for the checked variant.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `index < self.len()`.
    #[must_use]
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        // SAFETY: Forwarding the caller's guarantee.
        unsafe { self.as_slice().get_unchecked(index) }
    }

    /// Returns an exclusive reference to the item at `index` without checking bounds.
    ///
    /// # Safety
    ///
    /// The caller must ensure that `index < self.len()`.
    #[must_use]
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        // SAFETY: Forwarding the caller's guarantee.
        unsafe { self.as_mut_slice().get_unchecked_mut(index) }
    }

    /// Creates an independent copy of the vector, reporting item copy failures as errors.
    ///
    /// The copy has a capacity equal to the number of items and uses the allocation strategy
    /// returned by [`Allocator::for_copy()`] of this vector's strategy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ItemCopy`] if any item could not be copied, or another error if the
    /// storage for the copy could not be acquired. Nothing is leaked and this vector is
    /// unchanged.
    pub fn try_clone(&self) -> Result<Self, T::Error>
    where
        T: TryClone,
    {
        self.copy_with(T::try_clone)
    }

    /// Replaces the contents of this vector with a copy of `source`.
    ///
    /// The copy is completed before this vector is touched, after which the two are exchanged
    /// and the previous contents dropped.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`try_clone()`][Self::try_clone]. This
    /// vector is unchanged in that case.
    pub fn try_clone_from(&mut self, source: &Self) -> Result<(), T::Error>
    where
        T: TryClone,
    {
        let mut copy = source.try_clone()?;
        self.swap(&mut copy);

        Ok(())
    }

    /// Moves the contents of this vector into a new vector, leaving this one empty with no
    /// storage.
    ///
    /// This vector keeps a strategy obtained from [`Allocator::for_copy()`], so it remains
    /// usable. No items are touched and no memory is acquired.
    ///
    /// # Examples
    ///
    /// ```
    /// use doubling_vec::DoublingVec;
    ///
    /// let mut source = DoublingVec::new();
    /// source.push("hello").unwrap();
    ///
    /// let moved = source.take();
    ///
    /// assert_eq!(moved[0], "hello");
    /// assert_eq!(source.len(), 0);
    /// assert_eq!(source.capacity(), 0);
    /// ```
    #[must_use]
    pub fn take(&mut self) -> Self {
        let empty = Self::new_in(self.buffer.allocator().for_copy());
        mem::replace(self, empty)
    }

    /// Drops the items and storage of this vector, then moves the contents of `source` into it,
    /// leaving `source` empty with no storage.
    ///
    /// # Examples
    ///
    /// ```
    /// use doubling_vec::DoublingVec;
    ///
    /// let mut source = DoublingVec::new();
    /// source.push(1).unwrap();
    /// source.push(2).unwrap();
    ///
    /// let mut target = DoublingVec::new();
    /// target.push(99).unwrap();
    ///
    /// target.move_from(&mut source);
    ///
    /// assert_eq!(target.as_slice(), &[1, 2]);
    /// assert_eq!(source.capacity(), 0);
    /// ```
    pub fn move_from(&mut self, source: &mut Self) {
        self.clear();
        *self = source.take();
    }

    /// Exchanges the contents (items, storage and allocation strategy) of two vectors.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Copies every item into a fresh block sized to the current length.
    fn copy_with<E>(
        &self,
        mut copy_item: impl FnMut(&T) -> result::Result<T, E>,
    ) -> Result<Self, E> {
        trace!(
            len = self.len,
            item_type = type_name::<T>(),
            "copying items into new storage"
        );

        let mut buffer =
            RawBuffer::with_capacity_in::<E>(self.len, self.buffer.allocator().for_copy())?;

        // If anything below fails, the guard drops the copies made so far and then `buffer`
        // releases the block.
        let mut fill = FillGuard::new(&mut buffer);

        for (index, item) in self.as_slice().iter().enumerate() {
            let copy = copy_item(item).map_err(|source| Error::ItemCopy { index, source })?;
            fill.push(copy);
        }

        let len = fill.finish();
        debug_assert_eq!(len, self.len);

        Ok(Self { buffer, len })
    }

    fn reserve_for_one<E>(&mut self) -> Result<(), E> {
        if self.len < self.buffer.capacity() {
            return Ok(());
        }

        self.grow()
    }

    fn grow<E>(&mut self) -> Result<(), E> {
        let old_capacity = self.buffer.capacity();

        let new_capacity = if old_capacity == 0 {
            1
        } else {
            old_capacity
                .checked_mul(2)
                .ok_or(Error::<E>::CapacityOverflow)?
        };

        trace!(
            old_capacity,
            new_capacity,
            item_type = type_name::<T>(),
            "growing storage"
        );

        // SAFETY: The first `len` slots hold initialized items and `len <= old_capacity`, which
        // is less than `new_capacity`.
        let result = unsafe { self.buffer.relocate(new_capacity, self.len) };

        if result.is_err() {
            debug!(
                old_capacity,
                new_capacity,
                item_type = type_name::<T>(),
                "growth failed, existing storage kept"
            );
        }

        result
    }

    /// # Panics
    ///
    /// Panics if the vector is full. Callers reserve space first.
    fn write_next(&mut self, item: T) {
        let slot = self.buffer.slot_ptr(self.len);

        // SAFETY: The slot is within the block (bounds checked by `slot_ptr()`) and beyond the
        // live items, so it is uninitialized and nothing refers to it.
        unsafe {
            slot.write(item);
        }

        self.len = self
            .len
            .checked_add(1)
            .expect("guarded by slot bounds check above");
    }
}

impl<T, A: Allocator> Drop for DoublingVec<T, A> {
    fn drop(&mut self) {
        // The buffer releases the block once we are done here.
        self.clear();
    }
}

impl<T: Clone, A: Allocator> Clone for DoublingVec<T, A> {
    /// Creates an independent copy of the vector.
    ///
    /// If cloning an item panics, the items cloned so far are dropped and the storage of the
    /// copy is released before the panic continues. This vector is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the storage for the copy cannot be acquired, in the same way `Vec` does.
    fn clone(&self) -> Self {
        match self.copy_with(|item| Ok::<T, Infallible>(item.clone())) {
            Ok(copy) => copy,
            Err(error) => raise(error),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        let mut copy = source.clone();
        self.swap(&mut copy);
    }
}

impl<T: TryClone, A: Allocator> TryClone for DoublingVec<T, A> {
    type Error = Error<T::Error>;

    fn try_clone(&self) -> Result<Self, T::Error> {
        self.copy_with(T::try_clone)
    }
}

impl<T, A: Allocator + Default> Default for DoublingVec<T, A> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<T, A: Allocator> Index<usize> for DoublingVec<T, A> {
    type Output = T;

    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    fn index(&self, index: usize) -> &T {
        assert!(
            index < self.len,
            "index {index} out of bounds in DoublingVec of {} with length {}",
            type_name::<T>(),
            self.len
        );

        // SAFETY: Guarded by bounds check above.
        unsafe { self.get_unchecked(index) }
    }
}

impl<T, A: Allocator> IndexMut<usize> for DoublingVec<T, A> {
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    fn index_mut(&mut self, index: usize) -> &mut T {
        assert!(
            index < self.len,
            "index {index} out of bounds in DoublingVec of {} with length {}",
            type_name::<T>(),
            self.len
        );

        // SAFETY: Guarded by bounds check above.
        unsafe { self.get_unchecked_mut(index) }
    }
}

impl<T: fmt::Debug, A: Allocator> fmt::Debug for DoublingVec<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::indexing_slicing,
    reason = "tests focus on succinct code and do not need to tick all the boxes"
)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;
    use crate::test_support::{CopyRefused, DropCounted, FailOnThree, TrackingAllocator};

    assert_impl_all!(DoublingVec<u32>: Send, Sync, Clone, Default);
    assert_impl_all!(DoublingVec<String>: Send, Sync, Clone, TryClone);
    assert_not_impl_any!(DoublingVec<Rc<u32>>: Send, Sync);
    assert_not_impl_any!(DoublingVec<RefCell<u32>>: Sync);
    assert_not_impl_any!(DoublingVec<u32, TrackingAllocator>: Send, Sync);

    fn filled(values: &[u32]) -> DoublingVec<u32, TrackingAllocator> {
        let mut vec = DoublingVec::new_in(TrackingAllocator::new());

        for &value in values {
            vec.push(value).unwrap();
        }

        vec
    }

    fn fail_on_three(values: &[u32], drops: &Rc<Cell<usize>>) -> DoublingVec<FailOnThree> {
        let mut vec = DoublingVec::new();

        for &value in values {
            vec.push(FailOnThree::new(value, drops)).unwrap();
        }

        vec
    }

    #[test]
    fn smoke_test() {
        let mut vec = DoublingVec::new();

        vec.push(1).unwrap();
        vec.push(2).unwrap();
        vec.push(3).unwrap();

        assert_eq!(vec.len(), 3);
        assert!(vec.capacity() >= 3);
        assert_eq!(vec[1], 2);
        assert_eq!(vec.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn new_is_empty_without_storage() {
        let vec = DoublingVec::<u32, _>::new_in(TrackingAllocator::new());

        assert!(vec.is_empty());
        assert_eq!(vec.len(), 0);
        assert_eq!(vec.capacity(), 0);
        assert_eq!(vec.allocator().total_allocations(), 0);
    }

    #[test]
    fn growth_doubles() {
        let mut vec = DoublingVec::new();
        let mut capacities = Vec::new();

        for value in 0..100_u32 {
            vec.push(value).unwrap();

            if capacities.last() != Some(&vec.capacity()) {
                capacities.push(vec.capacity());
            }
        }

        assert_eq!(capacities, [1, 2, 4, 8, 16, 32, 64, 128]);
    }

    #[test]
    fn len_tracks_pushes() {
        let mut vec = DoublingVec::new();

        for count in 1..=50_usize {
            vec.push(count).unwrap();

            assert_eq!(vec.len(), count);
            assert!(vec.capacity() >= vec.len());
        }

        for (index, value) in vec.as_slice().iter().enumerate() {
            assert_eq!(*value, index + 1);
        }
    }

    #[test]
    fn growth_releases_previous_blocks() {
        let vec = filled(&[1, 2, 3, 4, 5]);
        let allocator = vec.allocator().clone();

        // 1 -> 2 -> 4 -> 8
        assert_eq!(allocator.total_allocations(), 4);
        assert_eq!(allocator.live_blocks(), 1);

        drop(vec);

        assert_eq!(allocator.live_blocks(), 0);
    }

    #[test]
    fn failed_growth_leaves_vector_unchanged() {
        let mut vec = filled(&[1, 2]);
        vec.allocator().set_budget(Some(0));

        let result = vec.push(3);

        assert!(matches!(result, Err(Error::Allocation(_))));
        assert_eq!(vec.len(), 2);
        assert_eq!(vec.capacity(), 2);
        assert_eq!(vec.as_slice(), &[1, 2]);

        // Once memory is available again, the vector carries on as usual.
        vec.allocator().set_budget(None);
        vec.push(3).unwrap();

        assert_eq!(vec.as_slice(), &[1, 2, 3]);
        assert_eq!(vec.capacity(), 4);
    }

    #[test]
    fn failed_push_drops_the_item() {
        let drops = Rc::new(Cell::new(0));
        let mut vec = DoublingVec::new_in(TrackingAllocator::with_budget(0));

        let result = vec.push(DropCounted::new(1, &drops));

        assert!(result.is_err());
        assert_eq!(drops.get(), 1);
        assert!(vec.is_empty());
    }

    #[test]
    fn failed_try_push_returns_the_item() {
        let drops = Rc::new(Cell::new(0));
        let mut vec = DoublingVec::new_in(TrackingAllocator::with_budget(0));

        let error = vec.try_push(DropCounted::new(7, &drops)).unwrap_err();

        assert!(matches!(error.error(), Error::Allocation(_)));
        assert!(vec.is_empty());
        assert_eq!(drops.get(), 0);

        // Once memory is available again, the same item can be added.
        vec.allocator().set_budget(None);
        vec.try_push(error.into_inner()).unwrap();

        assert_eq!(vec.len(), 1);
        assert_eq!(vec[0].value, 7);
        assert_eq!(drops.get(), 0);
    }

    #[test]
    fn try_push_grows_like_push() {
        let mut vec = DoublingVec::new();

        for value in 0..5_u32 {
            vec.try_push(value).unwrap();
        }

        assert_eq!(vec.as_slice(), &[0, 1, 2, 3, 4]);
        assert_eq!(vec.capacity(), 8);
    }

    #[test]
    fn push_without_growth_does_not_allocate() {
        let mut vec = DoublingVec::<u32, _>::builder()
            .allocator(TrackingAllocator::new())
            .initial_capacity(4)
            .build()
            .unwrap();

        vec.allocator().set_budget(Some(0));

        for value in 0..4 {
            vec.push(value).unwrap();
        }

        assert_eq!(vec.len(), 4);
    }

    #[test]
    fn push_copy_copies() {
        let mut vec = DoublingVec::new();
        let word = "hello".to_string();

        vec.push_copy(&word).unwrap();
        vec.push_copy(&word).unwrap();

        vec[0].push_str(" world");

        assert_eq!(vec[0], "hello world");
        assert_eq!(vec[1], "hello");
        assert_eq!(word, "hello");
    }

    #[test]
    fn failed_push_copy_leaves_vector_unchanged() {
        let drops = Rc::new(Cell::new(0));
        let mut vec = fail_on_three(&[1, 2], &drops);
        let capacity = vec.capacity();

        let item = FailOnThree::new(3, &drops);
        let error = vec.push_copy(&item).unwrap_err();

        assert!(matches!(
            error,
            Error::ItemCopy {
                index: 2,
                source: CopyRefused(3)
            }
        ));
        assert_eq!(vec.len(), 2);
        assert_eq!(vec.capacity(), capacity);
        assert_eq!(drops.get(), 0);
    }

    #[test]
    fn push_copy_with_failed_growth_drops_copy() {
        let drops = Rc::new(Cell::new(0));
        let mut vec = DoublingVec::new_in(TrackingAllocator::with_budget(0));

        let item = FailOnThree::new(1, &drops);
        let result = vec.push_copy(&item);

        assert!(matches!(result, Err(Error::Allocation(_))));
        assert!(vec.is_empty());

        // The copy was made and dropped again, the original is still alive.
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn clear_retains_capacity() {
        let drops = Rc::new(Cell::new(0));
        let mut vec = DoublingVec::new();

        for value in 0..5 {
            vec.push(DropCounted::new(value, &drops)).unwrap();
        }

        let capacity = vec.capacity();
        vec.clear();

        assert!(vec.is_empty());
        assert_eq!(vec.capacity(), capacity);
        assert_eq!(drops.get(), 5);

        // Refilling up to the old capacity does not grow.
        for value in 0..5 {
            vec.push(DropCounted::new(value, &drops)).unwrap();
        }

        assert_eq!(vec.capacity(), capacity);
    }

    #[test]
    fn clear_drops_in_index_order() {
        struct Recorder {
            value: u32,
            order: Rc<RefCell<Vec<u32>>>,
        }

        impl Drop for Recorder {
            fn drop(&mut self) {
                self.order.borrow_mut().push(self.value);
            }
        }

        let order = Rc::new(RefCell::new(Vec::new()));
        let mut vec = DoublingVec::new();

        for value in 0..4 {
            vec.push(Recorder {
                value,
                order: Rc::clone(&order),
            })
            .unwrap();
        }

        vec.clear();

        assert_eq!(*order.borrow(), [0, 1, 2, 3]);
    }

    #[test]
    fn clear_with_panicking_drop_drops_each_item_once() {
        struct PanicOnOne {
            value: u32,
            drops: Rc<Cell<usize>>,
        }

        impl Drop for PanicOnOne {
            fn drop(&mut self) {
                self.drops.set(self.drops.get() + 1);

                assert!(self.value != 1, "dropping {} panics", self.value);
            }
        }

        let drops = Rc::new(Cell::new(0));
        let mut vec = DoublingVec::new();

        for value in 0..3 {
            vec.push(PanicOnOne {
                value,
                drops: Rc::clone(&drops),
            })
            .unwrap();
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| vec.clear()));

        assert!(result.is_err());
        assert_eq!(vec.len(), 0);
        assert_eq!(vec.capacity(), 4);
        assert_eq!(drops.get(), 3);

        drop(vec);

        assert_eq!(drops.get(), 3);
    }

    #[test]
    fn drop_drops_items_and_releases_storage() {
        let drops = Rc::new(Cell::new(0));
        let allocator = TrackingAllocator::new();
        let mut vec = DoublingVec::new_in(allocator.clone());

        for value in 0..3 {
            vec.push(DropCounted::new(value, &drops)).unwrap();
        }

        drop(vec);

        assert_eq!(drops.get(), 3);
        assert_eq!(allocator.live_blocks(), 0);
    }

    #[test]
    fn clone_is_deep_and_sized_to_len() {
        let mut original = DoublingVec::new();

        for word in ["one", "two", "three"] {
            original.push(word.to_string()).unwrap();
        }

        assert_eq!(original.capacity(), 4);

        let copy = original.clone();
        original.push("four".to_string()).unwrap();
        original[0].push('!');

        assert_eq!(original.len(), 4);
        assert_eq!(copy.len(), 3);
        assert_eq!(copy.capacity(), 3);
        assert_eq!(copy[0], "one");
        assert_eq!(copy[2], "three");
    }

    #[test]
    fn clone_of_empty_does_not_allocate() {
        let mut vec = filled(&[1, 2]);
        vec.clear();
        let allocator = vec.allocator().clone();

        let copy = vec.clone();

        assert_eq!(copy.capacity(), 0);
        assert_eq!(allocator.total_allocations(), 2);
    }

    #[test]
    fn copy_uses_strategy_for_copy() {
        let vec = filled(&[1, 2, 3]);
        let allocator = vec.allocator().clone();

        let copy = vec.try_clone().unwrap();

        assert_eq!(allocator.copies(), 1);
        assert_eq!(allocator.live_blocks(), 2);

        drop(copy);

        assert_eq!(allocator.live_blocks(), 1);
    }

    #[test]
    fn failed_try_clone_leaves_source_intact() {
        let drops = Rc::new(Cell::new(0));
        let vec = fail_on_three(&[1, 2, 3], &drops);

        let error = vec.try_clone().unwrap_err();

        assert!(matches!(
            error,
            Error::ItemCopy {
                index: 2,
                source: CopyRefused(3)
            }
        ));

        // The copies of 1 and 2 were made and dropped again.
        assert_eq!(drops.get(), 2);

        assert_eq!(vec.len(), 3);
        assert_eq!(vec[0].value, 1);
        assert_eq!(vec[1].value, 2);
        assert_eq!(vec[2].value, 3);
    }

    #[test]
    fn failed_try_clone_releases_storage() {
        let drops = Rc::new(Cell::new(0));
        let allocator = TrackingAllocator::new();
        let mut vec = DoublingVec::new_in(allocator.clone());

        for value in [1, 3] {
            vec.push(FailOnThree::new(value, &drops)).unwrap();
        }

        let live_before = allocator.live_blocks();

        assert!(vec.try_clone().is_err());
        assert_eq!(allocator.live_blocks(), live_before);
    }

    #[test]
    fn failed_copy_allocation_is_error() {
        let vec = filled(&[1, 2]);
        vec.allocator().set_budget(Some(0));

        let result = vec.try_clone();

        assert!(matches!(result, Err(Error::Allocation(_))));
        assert_eq!(vec.as_slice(), &[1, 2]);
    }

    #[test]
    fn panicking_clone_leaves_source_intact() {
        let drops = Rc::new(Cell::new(0));
        let vec = fail_on_three(&[1, 2, 3, 4], &drops);

        let result = panic::catch_unwind(AssertUnwindSafe(|| vec.clone()));

        assert!(result.is_err());
        assert_eq!(drops.get(), 2);
        assert_eq!(vec.len(), 4);
        assert_eq!(vec[2].value, 3);
    }

    #[test]
    fn try_clone_from_replaces_contents() {
        let mut target = filled(&[10]);
        let mut source = filled(&[1, 2]);

        target.try_clone_from(&source).unwrap();

        assert_eq!(target.as_slice(), &[1, 2]);

        source.push(3).unwrap();

        assert_eq!(target.len(), 2);
    }

    #[test]
    fn failed_try_clone_from_leaves_target_intact() {
        let drops = Rc::new(Cell::new(0));
        let mut target = fail_on_three(&[7, 8], &drops);
        let source = fail_on_three(&[1, 3], &drops);

        let result = target.try_clone_from(&source);

        assert!(matches!(result, Err(Error::ItemCopy { index: 1, .. })));
        assert_eq!(target.len(), 2);
        assert_eq!(target[0].value, 7);
        assert_eq!(target[1].value, 8);
    }

    #[test]
    fn clone_from_replaces_contents() {
        let mut target = DoublingVec::new();
        target.push("old".to_string()).unwrap();

        let mut source = DoublingVec::new();
        source.push("new".to_string()).unwrap();

        target.clone_from(&source);

        assert_eq!(target.len(), 1);
        assert_eq!(target[0], "new");
        assert_eq!(source[0], "new");
    }

    #[test]
    fn assigning_own_copy_is_noop() {
        let mut vec = DoublingVec::new();
        vec.push(42).unwrap();

        let snapshot = vec.clone();
        vec.clone_from(&snapshot);

        vec = vec.clone();

        assert_eq!(vec.len(), 1);
        assert_eq!(vec[0], 42);
    }

    #[test]
    fn take_leaves_source_empty() {
        let mut source = DoublingVec::new();
        source.push("hello".to_string()).unwrap();
        source.push("world".to_string()).unwrap();

        let moved = source.take();

        assert_eq!(moved.len(), 2);
        assert_eq!(moved[0], "hello");
        assert_eq!(moved[1], "world");

        assert_eq!(source.len(), 0);
        assert_eq!(source.capacity(), 0);

        // The source remains usable.
        source.push("again".to_string()).unwrap();
        assert_eq!(source[0], "again");
    }

    #[test]
    fn take_does_not_allocate() {
        let mut source = filled(&[1, 2, 3]);
        let allocator = source.allocator().clone();
        let allocations = allocator.total_allocations();

        let moved = source.take();

        assert_eq!(allocator.total_allocations(), allocations);
        assert_eq!(allocator.live_blocks(), 1);
        assert_eq!(moved.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn move_from_replaces_and_empties() {
        let drops = Rc::new(Cell::new(0));

        let mut source = DoublingVec::new();
        source.push(DropCounted::new(1, &drops)).unwrap();
        source.push(DropCounted::new(2, &drops)).unwrap();

        let mut target = DoublingVec::new();
        target.push(DropCounted::new(99, &drops)).unwrap();

        target.move_from(&mut source);

        // Only the previous item of the target has been dropped.
        assert_eq!(drops.get(), 1);

        assert_eq!(target.len(), 2);
        assert_eq!(target[0].value, 1);
        assert_eq!(target[1].value, 2);

        assert_eq!(source.len(), 0);
        assert_eq!(source.capacity(), 0);
    }

    #[test]
    fn move_from_releases_target_storage() {
        let allocator = TrackingAllocator::new();
        let mut target = DoublingVec::new_in(allocator.clone());
        target.push(1).unwrap();

        let mut source = DoublingVec::new_in(allocator.clone());
        source.push(2).unwrap();

        target.move_from(&mut source);

        assert_eq!(allocator.live_blocks(), 1);
    }

    #[test]
    fn swap_exchanges_everything() {
        let mut a = filled(&[1, 2, 3]);
        let mut b = DoublingVec::new_in(TrackingAllocator::new());
        b.push(9).unwrap();

        let a_allocator = a.allocator().clone();

        a.swap(&mut b);

        assert_eq!(a.as_slice(), &[9]);
        assert_eq!(a.capacity(), 1);
        assert_eq!(b.as_slice(), &[1, 2, 3]);
        assert_eq!(b.capacity(), 4);

        // The strategy travels with its storage.
        drop(b);
        assert_eq!(a_allocator.live_blocks(), 0);
    }

    #[test]
    fn zero_sized_items() {
        let allocator = TrackingAllocator::new();
        let mut vec = DoublingVec::new_in(allocator.clone());

        for _ in 0..10 {
            vec.push(()).unwrap();
        }

        assert_eq!(vec.len(), 10);
        assert_eq!(vec.capacity(), 16);
        assert_eq!(allocator.total_allocations(), 0);

        let copy = vec.clone();
        assert_eq!(copy.len(), 10);
    }

    #[test]
    fn nested_vectors_try_clone() {
        let mut inner = DoublingVec::new();
        inner.push(1_u8).unwrap();

        let mut outer = DoublingVec::new();
        outer.push_copy(&inner).unwrap();
        outer.push(inner).unwrap();

        let copy = outer.try_clone().unwrap();

        assert_eq!(copy.len(), 2);
        assert_eq!(copy[1][0], 1);
    }

    #[test]
    fn index_mut_modifies() {
        let mut vec = DoublingVec::new();
        vec.push(1).unwrap();

        vec[0] = 5;

        assert_eq!(vec[0], 5);
    }

    #[test]
    fn unchecked_access() {
        let mut vec = DoublingVec::new();
        vec.push(1).unwrap();
        vec.push(2).unwrap();

        unsafe {
            *vec.get_unchecked_mut(1) += 10;
        }

        assert_eq!(unsafe { *vec.get_unchecked(1) }, 12);
    }

    #[test]
    #[should_panic]
    fn index_out_of_bounds_panics() {
        let mut vec = DoublingVec::new();
        vec.push(1).unwrap();

        // Within capacity but beyond the live items.
        let _value = vec[1];
    }

    #[test]
    #[should_panic]
    fn index_mut_out_of_bounds_panics() {
        let mut vec = DoublingVec::<u32>::new();

        vec[0] = 1;
    }

    #[test]
    fn debug_lists_items() {
        let mut vec = DoublingVec::new();
        vec.push(1).unwrap();
        vec.push(2).unwrap();

        assert_eq!(format!("{vec:?}"), "[1, 2]");
    }

    #[test]
    fn default_is_empty() {
        let vec = DoublingVec::<String>::default();

        assert!(vec.is_empty());
        assert_eq!(vec.capacity(), 0);
    }
}
