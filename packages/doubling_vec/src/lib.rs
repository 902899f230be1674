#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A contiguous growable vector with pluggable allocation strategies that never leaves a
//! half-finished state behind when copying or growing fails.
//!
//! This crate provides [`DoublingVec`], a sequence of items stored in a single memory block that
//! doubles in size whenever it runs out of room. The block comes from an [`Allocator`] - by
//! default the [`Global`] Rust allocator - which may be swapped for a custom, possibly stateful,
//! strategy.
//!
//! # Key Features
//!
//! - **Amortized O(1) append**: capacity goes 0 -> 1 -> 2 -> 4 -> ..., acquired lazily on the
//!   first append.
//! - **Fallible operations**: running out of memory is reported as an [`Error`] instead of
//!   aborting the process, and copying items can fail gracefully via [`TryClone`]. An item that
//!   could not be added is handed back by [`try_push()`](DoublingVec::try_push).
//! - **All-or-nothing growth and copies**: a failed growth keeps the existing storage and items, a
//!   failed copy drops the partial copy and releases its storage. The vector you called the
//!   operation on is left exactly as it was.
//! - **Cheap moves**: [`take()`](DoublingVec::take), [`move_from()`](DoublingVec::move_from) and
//!   [`swap()`](DoublingVec::swap) transfer storage without touching items and cannot fail.
//! - **Capacity retention**: [`clear()`](DoublingVec::clear) drops items but keeps the storage.
//!
//! # Examples
//!
//! ## Basic usage
//!
//! ```rust
//! use doubling_vec::DoublingVec;
//!
//! let mut numbers = DoublingVec::new();
//!
//! for value in 1..=3 {
//!     numbers.push(value)?;
//! }
//!
//! assert_eq!(numbers.len(), 3);
//! assert_eq!(numbers[1], 2);
//! assert_eq!(numbers.capacity(), 4);
//! # Ok::<(), doubling_vec::Error>(())
//! ```
//!
//! ## Moving contents between vectors
//!
//! ```rust
//! use doubling_vec::DoublingVec;
//!
//! let mut source = DoublingVec::new();
//! source.push(1)?;
//! source.push(2)?;
//!
//! let mut target = DoublingVec::new();
//! target.push(99)?;
//!
//! target.move_from(&mut source);
//!
//! assert_eq!(target.as_slice(), &[1, 2]);
//! assert_eq!(source.len(), 0);
//! assert_eq!(source.capacity(), 0);
//! # Ok::<(), doubling_vec::Error>(())
//! ```
//!
//! ## Copies that can fail
//!
//! ```rust
//! use doubling_vec::{DoublingVec, Error};
//!
//! let mut words = DoublingVec::new();
//! words.push("one".to_string())?;
//! words.push("two".to_string())?;
//!
//! // `String` copies never fail but storage for the copy may still be unavailable,
//! // which `try_clone()` reports instead of aborting.
//! let copy = words.try_clone()?;
//!
//! assert_eq!(copy.len(), 2);
//! assert_eq!(copy.capacity(), 2);
//! # Ok::<(), Error>(())
//! ```
//!
//! # Thread safety
//!
//! The vector has no internal synchronization. It can be moved between threads and shared
//! immutably between threads if its items and allocation strategy allow it, as with `Vec`.

mod allocator;
mod builder;
mod doubling_vec;
mod error;
mod fill_guard;
mod raw_buffer;
#[cfg(test)]
mod test_support;
mod try_clone;

pub use allocator::*;
pub use builder::*;
pub use doubling_vec::*;
pub use error::*;
pub(crate) use fill_guard::*;
pub(crate) use raw_buffer::*;
pub use try_clone::*;
