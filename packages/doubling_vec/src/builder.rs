use std::any::type_name;
use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;

use crate::{Allocator, DoublingVec, Global, RawBuffer, Result};

/// Builder for creating an instance of [`DoublingVec`].
///
/// You only need to use this builder if you want to customize the vector configuration.
/// The default configuration used by [`DoublingVec::new()`][1] is sufficient for most use cases.
///
/// # Examples
///
/// ```
/// use doubling_vec::{DoublingVec, Global};
///
/// let numbers = DoublingVec::<u32>::builder()
///     .allocator(Global)
///     .initial_capacity(16)
///     .build()
///     .unwrap();
///
/// assert_eq!(numbers.capacity(), 16);
/// assert!(numbers.is_empty());
/// ```
///
/// [1]: DoublingVec::new
#[must_use]
pub struct DoublingVecBuilder<T, A = Global> {
    allocator: A,
    initial_capacity: usize,

    _item: PhantomData<T>,
}

impl<T, A: fmt::Debug> fmt::Debug for DoublingVecBuilder<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("allocator", &self.allocator)
            .field("initial_capacity", &self.initial_capacity)
            .finish()
    }
}

impl<T> DoublingVecBuilder<T, Global> {
    pub(crate) fn new() -> Self {
        Self {
            allocator: Global,
            initial_capacity: 0,
            _item: PhantomData,
        }
    }
}

impl<T, A: Allocator> DoublingVecBuilder<T, A> {
    /// Sets the allocation strategy that will provide the memory blocks of the vector.
    ///
    /// # Examples
    ///
    /// ```
    /// use doubling_vec::{DoublingVec, Global};
    ///
    /// let strategy = Global;
    ///
    /// // Strategies can also be borrowed, sharing them between several vectors.
    /// let numbers = DoublingVec::<u32>::builder()
    ///     .allocator(&strategy)
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn allocator<B: Allocator>(self, allocator: B) -> DoublingVecBuilder<T, B> {
        DoublingVecBuilder {
            allocator,
            initial_capacity: self.initial_capacity,
            _item: PhantomData,
        }
    }

    /// Sets the number of slots to acquire when the vector is built.
    ///
    /// The default is zero, in which case no memory is acquired until the first item is added.
    /// Growth always doubles the current capacity, so this also shapes all future capacities.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Builds the vector with the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial capacity cannot be acquired from the allocation strategy
    /// or does not fit in the address space.
    pub fn build(self) -> Result<DoublingVec<T, A>> {
        let buffer =
            RawBuffer::with_capacity_in::<Infallible>(self.initial_capacity, self.allocator)?;

        Ok(DoublingVec::from_buffer(buffer))
    }
}
