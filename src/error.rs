use std::{alloc::Layout, fmt};

use thiserror::Error;

/// The ways a `Shrc<T>` operation can fail.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The allocator could not provide memory for a value or a reference count.
    #[error("memory allocation of {size} bytes (align {align}) failed")]
    AllocExhausted { size: usize, align: usize },

    /// The handle is empty, so there is nothing to access.
    #[error("null reference: the handle is empty")]
    NullReference,
}

impl Error {
    #[cold]
    pub(crate) fn alloc_exhausted(layout: Layout) -> Self {
        Error::AllocExhausted {
            size: layout.size(),
            align: layout.align(),
        }
    }

    #[cold]
    pub(crate) fn null_reference() -> Self {
        Error::NullReference
    }
}

/// Returned by [`Shrc::try_from_box`](crate::Shrc::try_from_box) when the reference count could not be
/// allocated. The allocation passed in was never taken over and can be recovered with [`TryFromBoxError::into_box`].
/// ```
/// use shrc::Shrc;
///
/// let boxed = Box::new(5);
/// match Shrc::try_from_box(boxed) {
///     Ok(shrc) => assert_eq!(*shrc, 5),
///     Err(err) => assert_eq!(*err.into_box(), 5),
/// }
/// ```
pub struct TryFromBoxError<T: ?Sized> {
    error: Error,
    boxed: Box<T>,
}

impl<T: ?Sized> TryFromBoxError<T> {
    #[cold]
    pub(crate) fn new(error: Error, boxed: Box<T>) -> Self {
        TryFromBoxError { error, boxed }
    }

    /// The underlying failure.
    pub fn error(&self) -> Error {
        self.error
    }

    /// Give the untouched allocation back to the caller.
    pub fn into_box(self) -> Box<T> {
        self.boxed
    }
}

impl<T: ?Sized> fmt::Debug for TryFromBoxError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TryFromBoxError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T: ?Sized> fmt::Display for TryFromBoxError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T: ?Sized> std::error::Error for TryFromBoxError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<T: ?Sized> From<TryFromBoxError<T>> for Error {
    fn from(value: TryFromBoxError<T>) -> Self {
        value.error
    }
}
