use std::alloc::{Layout, handle_alloc_error};
use std::convert::Infallible;
use std::error;
use std::fmt;

use thiserror::Error;

/// An [allocation strategy][crate::Allocator] could not provide a memory block.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error(
    "failed to allocate {} bytes aligned to {}",
    .layout.size(),
    .layout.align()
)]
pub struct AllocError {
    layout: Layout,
}

impl AllocError {
    /// Creates an error describing a failed request for a block with the given layout.
    #[must_use]
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// The layout of the request that could not be satisfied.
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }
}

/// Errors that can occur when a [`DoublingVec`][crate::DoublingVec] acquires storage or copies
/// items.
///
/// The type parameter is the error type of the item copy operation. Operations that never copy
/// items use the default of [`Infallible`].
///
/// Whenever an operation returns one of these errors, the vector it was called on is left exactly
/// as it was before the call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error<E = Infallible> {
    /// The allocation strategy could not provide a block for the storage.
    #[error(transparent)]
    Allocation(#[from] AllocError),

    /// The requested capacity does not fit in the address space.
    #[error("capacity overflow: the requested number of items cannot be addressed")]
    CapacityOverflow,

    /// Copying one of the items failed.
    #[error("failed to copy the item at index {index}")]
    ItemCopy {
        /// Index the copy was meant to occupy.
        ///
        /// When copying a whole vector, this is the index of the source item whose copy failed
        /// and any copies made before it have been dropped again. When appending a copy, this is
        /// the length of the vector, whose items are left as they were.
        index: usize,

        /// The error returned by the item's copy operation.
        #[source]
        source: E,
    },
}

/// An item could not be added to a [`DoublingVec`][crate::DoublingVec].
///
/// Returned by [`DoublingVec::try_push()`][crate::DoublingVec::try_push], this hands the item
/// back to the caller, who may retry once more memory is available.
pub struct PushError<T> {
    item: T,
    error: Error,
}

impl<T> PushError<T> {
    pub(crate) fn new(item: T, error: Error) -> Self {
        Self { item, error }
    }

    /// The reason the item could not be added.
    #[must_use]
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// Takes back the item that could not be added.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.item
    }

    /// Splits the error into the item that could not be added and the reason.
    #[must_use]
    pub fn into_parts(self) -> (T, Error) {
        (self.item, self.error)
    }
}

// Items need not implement `Debug`.
impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to add item: {}", self.error)
    }
}

impl<T> error::Error for PushError<T> {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.error)
    }
}

/// A specialized `Result` type for storage operations, returning the crate's [`Error`] type as
/// the error value.
pub(crate) type Result<T, E = Infallible> = std::result::Result<T, Error<E>>;

/// Turns a storage error from an operation that cannot fail to copy into the conventional
/// `Vec`-style panic, for APIs such as [`Clone`] that have no way to report errors.
pub(crate) fn raise(error: Error) -> ! {
    match error {
        Error::Allocation(error) => handle_alloc_error(error.layout()),
        Error::CapacityOverflow => panic!("capacity overflow"),
        Error::ItemCopy { source, .. } => match source {},
    }
}
