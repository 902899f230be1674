//! Integration tests for `doubling_vec` through its public API.
//!
//! These tests plug in a custom allocation strategy and custom item types the way a downstream
//! crate would, and verify that failed operations never leave a vector half-modified.

use std::alloc::Layout;
use std::error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use doubling_vec::{AllocError, Allocator, DoublingVec, Error, Global, TryClone};

/// Shared bookkeeping of a `MeteredAllocator` and all strategies derived from it.
#[derive(Debug, Default)]
struct Meter {
    live_blocks: AtomicUsize,
    live_bytes: AtomicUsize,
    derived: AtomicUsize,

    /// Number of further allocations that succeed.
    remaining: AtomicUsize,
}

#[derive(Clone, Debug)]
struct MeteredAllocator {
    meter: Arc<Meter>,
}

impl MeteredAllocator {
    fn new() -> Self {
        Self::with_allowance(usize::MAX)
    }

    fn with_allowance(allocations: usize) -> Self {
        let meter = Meter::default();
        meter.remaining.store(allocations, Ordering::Relaxed);

        Self {
            meter: Arc::new(meter),
        }
    }

    fn allow(&self, allocations: usize) {
        self.meter.remaining.store(allocations, Ordering::Relaxed);
    }

    fn live_blocks(&self) -> usize {
        self.meter.live_blocks.load(Ordering::Relaxed)
    }

    fn live_bytes(&self) -> usize {
        self.meter.live_bytes.load(Ordering::Relaxed)
    }

    fn derived(&self) -> usize {
        self.meter.derived.load(Ordering::Relaxed)
    }
}

// SAFETY: Blocks come from `Global`, we only meter them.
unsafe impl Allocator for MeteredAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let granted = self
            .meter
            .remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |remaining| {
                remaining.checked_sub(1)
            });

        if granted.is_err() {
            return Err(AllocError::new(layout));
        }

        let ptr = Global.allocate(layout)?;

        self.meter.live_blocks.fetch_add(1, Ordering::Relaxed);
        self.meter
            .live_bytes
            .fetch_add(layout.size(), Ordering::Relaxed);

        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.meter.live_blocks.fetch_sub(1, Ordering::Relaxed);
        self.meter
            .live_bytes
            .fetch_sub(layout.size(), Ordering::Relaxed);

        // SAFETY: Forwarding the caller's guarantees, the block came from `Global`.
        unsafe {
            Global.deallocate(ptr, layout);
        }
    }

    fn for_copy(&self) -> Self {
        self.meter.derived.fetch_add(1, Ordering::Relaxed);
        self.clone()
    }
}

#[derive(Debug, PartialEq)]
struct Unavailable;

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unavailable")
    }
}

impl error::Error for Unavailable {}

/// A seat whose copy fails if it is marked as taken. Every live seat is counted.
#[derive(Debug)]
struct Seat {
    number: u32,
    taken: bool,
    live: Arc<AtomicUsize>,
}

impl Seat {
    fn new(number: u32, taken: bool, live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::Relaxed);

        Self {
            number,
            taken,
            live: Arc::clone(live),
        }
    }
}

impl TryClone for Seat {
    type Error = Unavailable;

    fn try_clone(&self) -> Result<Self, Unavailable> {
        if self.taken {
            return Err(Unavailable);
        }

        Ok(Self::new(self.number, self.taken, &self.live))
    }
}

impl Clone for Seat {
    fn clone(&self) -> Self {
        assert!(!self.taken, "seat {} is taken", self.number);

        Self::new(self.number, self.taken, &self.live)
    }
}

impl Drop for Seat {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}

fn seats(taken: &[bool], live: &Arc<AtomicUsize>) -> DoublingVec<Seat, MeteredAllocator> {
    let mut vec = DoublingVec::new_in(MeteredAllocator::new());

    for (number, &taken) in (1..).zip(taken) {
        vec.push(Seat::new(number, taken, live)).unwrap();
    }

    vec
}

#[test]
fn append_and_index() {
    let mut vec = DoublingVec::new();

    vec.push(1).unwrap();
    vec.push(2).unwrap();
    vec.push(3).unwrap();

    assert_eq!(vec.len(), 3);
    assert!(vec.capacity() >= 3);
    assert_eq!(vec[1], 2);
}

#[test]
fn copy_is_independent_of_later_appends() {
    let mut vec = DoublingVec::new();

    for word in ["one", "two", "three"] {
        vec.push(word.to_string()).unwrap();
    }

    let copy = vec.clone();
    vec.push("four".to_string()).unwrap();

    assert_eq!(vec.len(), 4);
    assert_eq!(copy.len(), 3);
    assert_eq!(copy[2], "three");
}

#[test]
fn move_assignment_replaces_contents() {
    let mut source = DoublingVec::new();
    source.push(1).unwrap();
    source.push(2).unwrap();

    let mut target = DoublingVec::new();
    target.push(99).unwrap();

    target.move_from(&mut source);

    assert_eq!(target.len(), 2);
    assert_eq!(target[0], 1);
    assert_eq!(target[1], 2);
    assert_eq!(source.len(), 0);
    assert_eq!(source.capacity(), 0);
}

#[test]
fn failed_copy_keeps_original_and_leaks_nothing() {
    let live = Arc::new(AtomicUsize::new(0));
    let vec = seats(&[false, false, true], &live);
    let allocator = vec.allocator().clone();

    let error = vec.try_clone().unwrap_err();

    assert!(matches!(
        error,
        Error::ItemCopy {
            index: 2,
            source: Unavailable
        }
    ));

    // Only the original seats and the original block are alive.
    assert_eq!(live.load(Ordering::Relaxed), 3);
    assert_eq!(allocator.live_blocks(), 1);

    assert_eq!(vec.len(), 3);
    assert_eq!(vec[0].number, 1);
    assert_eq!(vec[1].number, 2);
    assert_eq!(vec[2].number, 3);
}

#[test]
fn panicking_copy_keeps_original_and_leaks_nothing() {
    let live = Arc::new(AtomicUsize::new(0));
    let vec = seats(&[false, true, false], &live);
    let allocator = vec.allocator().clone();

    let result = panic::catch_unwind(AssertUnwindSafe(|| vec.clone()));

    assert!(result.is_err());
    assert_eq!(live.load(Ordering::Relaxed), 3);
    assert_eq!(allocator.live_blocks(), 1);
    assert_eq!(vec.len(), 3);
}

#[test]
fn failed_copy_assignment_keeps_target() {
    let live = Arc::new(AtomicUsize::new(0));
    let mut target = seats(&[false], &live);
    let source = seats(&[false, true], &live);

    let result = target.try_clone_from(&source);

    assert!(matches!(result, Err(Error::ItemCopy { index: 1, .. })));
    assert_eq!(target.len(), 1);
    assert_eq!(target[0].number, 1);
    assert_eq!(live.load(Ordering::Relaxed), 3);
}

#[test]
fn copy_assignment_drops_previous_contents() {
    let live = Arc::new(AtomicUsize::new(0));
    let mut target = seats(&[false, false, false], &live);
    let source = seats(&[false], &live);

    target.try_clone_from(&source).unwrap();

    assert_eq!(target.len(), 1);
    assert_eq!(live.load(Ordering::Relaxed), 2);
}

#[test]
fn refused_growth_keeps_items_and_storage() {
    let mut vec = DoublingVec::new_in(MeteredAllocator::new());

    for value in 0..4_u64 {
        vec.push(value).unwrap();
    }

    vec.allocator().allow(0);

    let error = vec.push(4).unwrap_err();

    assert!(matches!(error, Error::Allocation(_)));
    assert_eq!(vec.as_slice(), &[0, 1, 2, 3]);
    assert_eq!(vec.capacity(), 4);
    assert_eq!(vec.allocator().live_bytes(), 4 * size_of::<u64>());
}

#[test]
fn refused_push_hands_item_back_for_retry() {
    let allocator = MeteredAllocator::with_allowance(0);
    let mut vec = DoublingVec::new_in(allocator.clone());

    let error = vec.try_push("precious".to_string()).unwrap_err();

    assert!(matches!(error.error(), Error::Allocation(_)));
    assert_eq!(vec.len(), 0);
    assert_eq!(vec.capacity(), 0);

    allocator.allow(1);

    let (item, _) = error.into_parts();
    vec.try_push(item).unwrap();

    assert_eq!(vec[0], "precious");
}

#[test]
fn refused_copy_storage_is_error() {
    let mut vec = DoublingVec::new_in(MeteredAllocator::new());
    vec.push("kept".to_string()).unwrap();

    vec.allocator().allow(0);

    let result = vec.try_clone();

    assert!(matches!(result, Err(Error::Allocation(_))));
    assert_eq!(vec[0], "kept");
}

#[test]
fn copies_use_derived_strategy() {
    let allocator = MeteredAllocator::new();
    let mut vec = DoublingVec::new_in(allocator.clone());

    for value in 0..5_u32 {
        vec.push(value).unwrap();
    }

    let copy = vec.clone();

    assert_eq!(allocator.derived(), 1);
    assert_eq!(allocator.live_blocks(), 2);
    assert_eq!(copy.capacity(), 5);
    assert_eq!(allocator.live_bytes(), (8 + 5) * size_of::<u32>());

    drop(copy);
    drop(vec);

    assert_eq!(allocator.live_blocks(), 0);
}

#[test]
fn borrowed_strategy_is_shared() {
    let allocator = MeteredAllocator::new();

    let mut first = DoublingVec::new_in(&allocator);
    let mut second = DoublingVec::new_in(&allocator);

    first.push(1_u8).unwrap();
    second.push(2_u8).unwrap();

    assert_eq!(allocator.live_blocks(), 2);

    let copy = first.try_clone().unwrap();

    // Borrowed strategies hand out the same reference rather than deriving a new strategy.
    assert_eq!(allocator.derived(), 0);
    assert_eq!(allocator.live_blocks(), 3);

    drop(copy);
    drop(first);
    drop(second);

    assert_eq!(allocator.live_blocks(), 0);
}

#[test]
fn clear_then_refill_reuses_storage() {
    let allocator = MeteredAllocator::new();
    let mut vec = DoublingVec::new_in(allocator.clone());

    for value in 0..8_u32 {
        vec.push(value).unwrap();
    }

    vec.clear();
    allocator.allow(0);

    for value in 0..8_u32 {
        vec.push(value).unwrap();
    }

    assert_eq!(vec.len(), 8);
    assert_eq!(vec.capacity(), 8);
}

#[test]
fn push_copy_leaves_original_usable() {
    let live = Arc::new(AtomicUsize::new(0));
    let mut vec = DoublingVec::new();

    let seat = Seat::new(7, false, &live);
    vec.push_copy(&seat).unwrap();
    vec.push_copy(&seat).unwrap();

    assert_eq!(vec.len(), 2);
    assert_eq!(vec[1].number, 7);
    assert_eq!(live.load(Ordering::Relaxed), 3);

    let taken = Seat::new(8, true, &live);
    let result = vec.push_copy(&taken);

    assert!(matches!(result, Err(Error::ItemCopy { index: 2, .. })));
    assert_eq!(vec.len(), 2);
}

#[test]
fn swap_exchanges_strategies() {
    let first_allocator = MeteredAllocator::new();
    let second_allocator = MeteredAllocator::new();

    let mut first = DoublingVec::new_in(first_allocator.clone());
    first.push(1_u32).unwrap();

    let mut second = DoublingVec::new_in(second_allocator.clone());
    second.push(2_u32).unwrap();
    second.push(3_u32).unwrap();

    first.swap(&mut second);

    assert_eq!(first.as_slice(), &[2, 3]);
    assert_eq!(second.as_slice(), &[1]);

    drop(first);

    assert_eq!(second_allocator.live_blocks(), 0);
    assert_eq!(first_allocator.live_blocks(), 1);
}

#[test]
fn builder_with_custom_strategy() {
    let allocator = MeteredAllocator::with_allowance(1);

    let mut vec = DoublingVec::<u16>::builder()
        .allocator(allocator.clone())
        .initial_capacity(3)
        .build()
        .unwrap();

    for value in 0..3 {
        vec.push(value).unwrap();
    }

    // The single allowed allocation went to the initial storage.
    assert!(matches!(vec.push(3), Err(Error::Allocation(_))));
    assert_eq!(vec.len(), 3);
}

#[cfg_attr(miri, ignore)]
#[test]
fn vector_moves_between_threads() {
    let mut vec = DoublingVec::new_in(MeteredAllocator::new());

    for value in 0..100_u64 {
        vec.push(value).unwrap();
    }

    let allocator = vec.allocator().clone();

    let sum = thread::spawn(move || vec.as_slice().iter().sum::<u64>())
        .join()
        .unwrap();

    assert_eq!(sum, 4950);
    assert_eq!(allocator.live_blocks(), 0);
}
