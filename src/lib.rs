//! `Shrc<T>` is a heap-allocated smart pointer that lets several handles own one value within a single thread.
//! `Shrc<T>` stands for: SHared Reference Counted.
//! It provides shared ownership similar to `Rc<T>`, with three differences:
//!
//! - A handle can be empty. Accessing an empty handle is reported as [`Error::NullReference`].
//! - Allocation is fallible. [`Shrc::try_new`], [`Shrc::try_from_box`], [`Shrc::try_adopt`] and [`Shrc::unshare`]
//!   return [`Error::AllocExhausted`] instead of aborting, and leave nothing half-built or leaked.
//! - Copy-on-write is an explicit call. [`Shrc::unshare`] gives a handle its own deep copy of a shared value.
//!
//! The value and its reference count live in two separate allocations, so an existing `Box<T>` can be taken over
//! without moving the value.
//!
//! ```
//! use shrc::Shrc;
//!
//! let h1 = Shrc::new(5);
//! let mut h2 = h1.clone();
//! assert_eq!(Shrc::ref_count(&h2), 2);
//!
//! Shrc::unshare(&mut h2).unwrap();
//! *Shrc::get_mut(&mut h2).unwrap() += 1;
//! assert_eq!((*h1, *h2), (5, 6));
//! ```
//!
//! The library logs through the [`log`] facade and never installs a logger itself.

mod alloc;
pub mod error;
pub mod shrc;
pub use crate::error::Error;
pub use crate::error::TryFromBoxError;
pub use crate::shrc::Shrc;
