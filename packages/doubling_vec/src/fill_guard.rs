use std::any::type_name;
use std::mem;
use std::ptr;

use tracing::debug;

use crate::{Allocator, RawBuffer};

/// Fills the slots of a fresh buffer front to back and drops whatever it has filled if it is
/// abandoned before [`finish()`][Self::finish] is called.
///
/// This is what makes copying all-or-nothing: if producing item *k* fails (by error or by panic),
/// the guard drops items `[0, k)` and the buffer, which the caller owns, releases the block.
pub(crate) struct FillGuard<'b, T, A: Allocator> {
    buffer: &'b mut RawBuffer<T, A>,

    /// Number of leading slots that hold initialized items.
    filled: usize,
}

impl<'b, T, A: Allocator> FillGuard<'b, T, A> {
    pub(crate) fn new(buffer: &'b mut RawBuffer<T, A>) -> Self {
        Self { buffer, filled: 0 }
    }

    /// # Panics
    ///
    /// Panics if the buffer has no room for the item. Callers size the buffer up front.
    pub(crate) fn push(&mut self, item: T) {
        let slot = self.buffer.slot_ptr(self.filled);

        // SAFETY: The slot is within the block and not yet initialized because we fill strictly
        // front to back.
        unsafe {
            slot.write(item);
        }

        self.filled = self
            .filled
            .checked_add(1)
            .expect("guarded by slot bounds check above");
    }

    /// Keeps the filled items and returns how many there are.
    ///
    /// From here on the caller is responsible for dropping them.
    #[must_use]
    pub(crate) fn finish(self) -> usize {
        let filled = self.filled;
        mem::forget(self);
        filled
    }
}

impl<T, A: Allocator> Drop for FillGuard<'_, T, A> {
    fn drop(&mut self) {
        debug!(
            filled = self.filled,
            capacity = self.buffer.capacity(),
            item_type = type_name::<T>(),
            "abandoning partially filled buffer"
        );

        // SAFETY: Exactly the first `filled` slots were initialized by `push()` and nothing else
        // refers to them.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                self.buffer.as_ptr(),
                self.filled,
            ));
        }
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
    use std::convert::Infallible;
    use std::rc::Rc;

    use super::*;
    use crate::Global;
    use crate::test_support::DropCounted;

    #[test]
    fn abandoned_fill_drops_filled_items() {
        let drops = Rc::new(Cell::new(0));
        let mut buffer =
            RawBuffer::<DropCounted, _>::with_capacity_in::<Infallible>(4, Global).unwrap();

        {
            let mut fill = FillGuard::new(&mut buffer);
            fill.push(DropCounted::new(1, &drops));
            fill.push(DropCounted::new(2, &drops));
        }

        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn finished_fill_keeps_items() {
        let drops = Rc::new(Cell::new(0));
        let mut buffer =
            RawBuffer::<DropCounted, _>::with_capacity_in::<Infallible>(2, Global).unwrap();

        let mut fill = FillGuard::new(&mut buffer);
        fill.push(DropCounted::new(1, &drops));
        fill.push(DropCounted::new(2, &drops));

        assert_eq!(fill.finish(), 2);
        assert_eq!(drops.get(), 0);

        unsafe {
            assert_eq!(buffer.slot_ptr(1).as_ref().value, 2);
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(buffer.as_ptr(), 2));
        }

        assert_eq!(drops.get(), 2);
    }

    #[test]
    fn empty_fill_is_noop() {
        let mut buffer = RawBuffer::<u32, _>::with_capacity_in::<Infallible>(0, Global).unwrap();

        let fill = FillGuard::new(&mut buffer);
        assert_eq!(fill.finish(), 0);
    }

    #[test]
    #[should_panic]
    fn overfill_panics() {
        let mut buffer = RawBuffer::<u32, _>::with_capacity_in::<Infallible>(1, Global).unwrap();

        let mut fill = FillGuard::new(&mut buffer);
        fill.push(1);
        fill.push(2);
    }
}
