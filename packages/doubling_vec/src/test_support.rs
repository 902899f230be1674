//! Allocation strategies and item types that let unit tests observe the storage engine.

use std::alloc::Layout;
use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

use thiserror::Error;

use crate::{AllocError, Allocator, Global, TryClone};

#[derive(Debug, Default)]
struct TrackingState {
    live_blocks: Cell<usize>,
    total_allocations: Cell<usize>,
    copies: Cell<usize>,

    /// How many more allocations may succeed. `None` means unlimited.
    budget: Cell<Option<usize>>,
}

/// Counts blocks and can be told to refuse allocations once a budget runs out.
///
/// Copies made via `for_copy()` share the counters, so a test sees every block a vector
/// and its copies acquire.
#[derive(Clone, Debug, Default)]
pub(crate) struct TrackingAllocator {
    state: Rc<TrackingState>,
}

impl TrackingAllocator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_budget(allocations: usize) -> Self {
        let allocator = Self::new();
        allocator.set_budget(Some(allocations));
        allocator
    }

    pub(crate) fn set_budget(&self, allocations: Option<usize>) {
        self.state.budget.set(allocations);
    }

    pub(crate) fn live_blocks(&self) -> usize {
        self.state.live_blocks.get()
    }

    pub(crate) fn total_allocations(&self) -> usize {
        self.state.total_allocations.get()
    }

    pub(crate) fn copies(&self) -> usize {
        self.state.copies.get()
    }
}

// SAFETY: All blocks come from `Global`, we only add bookkeeping.
unsafe impl Allocator for TrackingAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        match self.state.budget.get() {
            Some(0) => return Err(AllocError::new(layout)),
            Some(remaining) => self.state.budget.set(Some(remaining - 1)),
            None => {}
        }

        let ptr = Global.allocate(layout)?;

        self.state.live_blocks.set(self.state.live_blocks.get() + 1);
        self.state
            .total_allocations
            .set(self.state.total_allocations.get() + 1);

        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.state.live_blocks.set(self.state.live_blocks.get() - 1);

        // SAFETY: Forwarding the caller's guarantees, the block came from `Global`.
        unsafe {
            Global.deallocate(ptr, layout);
        }
    }

    fn for_copy(&self) -> Self {
        self.state.copies.set(self.state.copies.get() + 1);
        self.clone()
    }
}

/// Counts how many times any item sharing the counter has been dropped.
#[derive(Debug)]
pub(crate) struct DropCounted {
    pub(crate) value: u32,
    pub(crate) drops: Rc<Cell<usize>>,
}

impl DropCounted {
    pub(crate) fn new(value: u32, drops: &Rc<Cell<usize>>) -> Self {
        Self {
            value,
            drops: Rc::clone(drops),
        }
    }
}

impl Drop for DropCounted {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
#[error("refusing to copy {0}")]
pub(crate) struct CopyRefused(pub(crate) u32);

/// An item whose copy fails for the value 3 (with an error from `try_clone()` and with a panic
/// from `clone()`). Moving it never fails.
#[derive(Debug)]
pub(crate) struct FailOnThree {
    pub(crate) value: u32,
    pub(crate) drops: Rc<Cell<usize>>,
}

impl FailOnThree {
    pub(crate) fn new(value: u32, drops: &Rc<Cell<usize>>) -> Self {
        Self {
            value,
            drops: Rc::clone(drops),
        }
    }
}

impl TryClone for FailOnThree {
    type Error = CopyRefused;

    fn try_clone(&self) -> Result<Self, CopyRefused> {
        if self.value == 3 {
            return Err(CopyRefused(self.value));
        }

        Ok(Self::new(self.value, &self.drops))
    }
}

impl Clone for FailOnThree {
    fn clone(&self) -> Self {
        assert!(self.value != 3, "refusing to copy {}", self.value);

        Self::new(self.value, &self.drops)
    }
}

impl Drop for FailOnThree {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}
