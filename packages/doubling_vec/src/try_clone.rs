use std::convert::Infallible;

/// A copy operation that reports failure as an error instead of panicking.
///
/// This is the copy form used by [`DoublingVec::push_copy()`][crate::DoublingVec::push_copy] and
/// [`DoublingVec::try_clone()`][crate::DoublingVec::try_clone]. Types whose copy can never fail
/// use [`Infallible`] as the error type.
///
/// # Examples
///
/// ```
/// use doubling_vec::{DoublingVec, Error, TryClone};
///
/// #[derive(Debug)]
/// struct Ticket(u32);
///
/// #[derive(Debug)]
/// struct SoldOut;
///
/// impl std::fmt::Display for SoldOut {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         f.write_str("sold out")
///     }
/// }
///
/// impl std::error::Error for SoldOut {}
///
/// impl TryClone for Ticket {
///     type Error = SoldOut;
///
///     fn try_clone(&self) -> Result<Self, SoldOut> {
///         if self.0 >= 100 {
///             return Err(SoldOut);
///         }
///
///         Ok(Self(self.0))
///     }
/// }
///
/// let mut tickets = DoublingVec::new();
/// tickets.push(Ticket(1)).unwrap();
/// tickets.push(Ticket(100)).unwrap();
///
/// let error = tickets.try_clone().unwrap_err();
/// assert!(matches!(error, Error::ItemCopy { index: 1, .. }));
///
/// // The original is untouched.
/// assert_eq!(tickets.len(), 2);
/// ```
pub trait TryClone: Sized {
    /// The error returned when the copy fails.
    type Error;

    /// Creates an independent copy of `self`.
    ///
    /// # Errors
    ///
    /// Returns the type's error if the copy cannot be made. `self` is not modified either way.
    fn try_clone(&self) -> Result<Self, Self::Error>;
}

macro_rules! impl_try_clone_for_copy {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TryClone for $ty {
                type Error = Infallible;

                fn try_clone(&self) -> Result<Self, Infallible> {
                    Ok(*self)
                }
            }
        )*
    };
}

impl_try_clone_for_copy!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    &'static str,
);

impl TryClone for String {
    type Error = Infallible;

    fn try_clone(&self) -> Result<Self, Infallible> {
        Ok(self.clone())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn primitives_copy() {
        assert_eq!(42_u32.try_clone(), Ok(42));
        assert_eq!('x'.try_clone(), Ok('x'));
        assert_eq!("text".try_clone(), Ok("text"));
    }

    #[test]
    fn string_copies_independently() {
        let original = "hello".to_string();
        let mut copy = original.try_clone().unwrap();

        copy.push_str(" world");

        assert_eq!(original, "hello");
        assert_eq!(copy, "hello world");
    }
}
