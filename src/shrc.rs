use std::{
    cell::Cell,
    fmt::{Debug, Display, Pointer},
    hash::{Hash, Hasher},
    marker::PhantomData,
    ops::Deref,
    ptr::NonNull,
};

use crate::alloc::try_box;
use crate::error::{Error, TryFromBoxError};

const MAX_REFCOUNT: usize = (isize::MAX) as usize;

/// One value/count pair. Every live `Share` owned by a `Shrc` accounts for exactly one unit of `*count`.
struct Share<T: ?Sized> {
    value: NonNull<T>,
    count: NonNull<Cell<usize>>,
}

impl<T: ?Sized> Clone for Share<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Share<T> {}

impl<T: ?Sized> Share<T> {
    #[inline]
    fn from_boxes(value: Box<T>, count: Box<Cell<usize>>) -> Self {
        Share {
            value: NonNull::from(Box::leak(value)),
            count: NonNull::from(Box::leak(count)),
        }
    }

    #[inline]
    fn count(&self) -> &Cell<usize> {
        unsafe { self.count.as_ref() }
    }

    /// Take one more share of this pair.
    #[inline]
    fn acquire(self) -> Self {
        let count = self.count();
        if count.get() >= MAX_REFCOUNT {
            panic!("Overflow of maximum reference count.");
        }
        count.set(count.get() + 1);
        self
    }

    /// Give one share back. The last one frees the count and the value.
    ///
    /// # Safety
    /// `self` must be a share the caller owns, and it must not be used afterwards.
    #[inline]
    unsafe fn release(self) {
        let count = self.count();
        if count.get() == 1 {
            drop(Box::from_raw(self.count.as_ptr()));
            drop(Box::from_raw(self.value.as_ptr()));
        } else {
            count.set(count.get() - 1);
        }
    }
}

/// `Shrc` is a heap-allocated smart pointer that gives several handles shared ownership of one value.
/// `Shrc` stands for: SHared Reference Counted.
/// Each handle is either empty or shares a value and a reference count with every other handle cloned from it.
/// The value is dropped and both allocations are freed when the last sharing handle goes away.
///
/// ## Clone behavior
/// Cloning a `Shrc<T>` never copies `T`. The new handle points to the same value and the shared count is incremented.
/// Cloning an empty handle gives another empty handle.
///
/// To get a private copy of a shared value, call [`Shrc::unshare`] (or [`Shrc::make_mut`]). Copy-on-write is always
/// explicit; nothing splits a value behind the caller's back.
///
/// ## Drop behavior
/// Dropping a handle decrements the shared count. If it was the last handle, the value and the count are freed
/// instead. Dropping an empty handle does nothing.
///
/// ## Fallible allocation
/// The `try_` constructors and [`Shrc::unshare`] report [`Error::AllocExhausted`] instead of aborting when the
/// allocator runs dry. A failed operation never leaves a handle half-built and never leaks.
///
/// ## [`Deref`] behavior
/// `Shrc<T>` automatically dereferences to `&T`, which allows method calls and member access of `T`.
/// Dereferencing an empty handle panics with the [`Error::NullReference`] message; use [`Shrc::get`] to get the
/// error as a value. [`DerefMut`](std::ops::DerefMut) is not implemented because other handles may be reading the
/// same value. See [`Shrc::get_mut`], [`Shrc::make_mut`] and [`Shrc::get_mut_unchecked`].
/// To prevent name clashes, `Shrc<T>`'s functions are associated.
///
/// ## Threads
/// The count is a plain integer. `Shrc<T>` is neither [`Send`] nor [`Sync`].
///
/// ## Examples
/// ```
/// use shrc::Shrc;
///
/// let h1 = Shrc::new(5);
/// let mut h2 = h1.clone();
/// assert_eq!(Shrc::ref_count(&h1), 2);
///
/// assert!(Shrc::unshare(&mut h2).unwrap());
/// *Shrc::get_mut(&mut h2).unwrap() = 6;
/// assert_eq!((*h1, *h2), (5, 6));
/// assert_eq!(Shrc::ref_count(&h1), 1);
/// ```
pub struct Shrc<T: ?Sized> {
    share: Option<Share<T>>,
    _marker: PhantomData<T>,
}

impl<T: ?Sized> Shrc<T> {
    /// Creates an empty handle. It owns nothing and its reference count is 0.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let shrc = Shrc::<i32>::empty();
    /// assert_eq!(Shrc::ref_count(&shrc), 0);
    /// assert!(Shrc::get(&shrc).is_err());
    /// ```
    #[inline]
    pub const fn empty() -> Self {
        Shrc {
            share: None,
            _marker: PhantomData,
        }
    }

    #[inline]
    fn from_share(share: Share<T>) -> Self {
        Shrc {
            share: Some(share),
            _marker: PhantomData,
        }
    }

    /// Takes over an existing allocation with a reference count of 1.
    /// If the count cannot be allocated, nothing is taken over and the error hands the allocation back.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let shrc: Shrc<str> = Shrc::try_from_box(Box::from("data")).unwrap();
    /// assert_eq!(&*shrc, "data");
    /// assert_eq!(Shrc::ref_count(&shrc), 1);
    /// ```
    pub fn try_from_box(boxed: Box<T>) -> Result<Self, TryFromBoxError<T>> {
        match try_box(Cell::new(1)) {
            Ok(count) => Ok(Shrc::from_share(Share::from_boxes(boxed, count))),
            Err(err) => Err(TryFromBoxError::new(err, boxed)),
        }
    }

    /// Takes over an allocation with a reference count of 1.
    /// Unlike [`Shrc::try_from_box`], the allocation is freed if the count cannot be allocated.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let shrc = Shrc::try_adopt(Box::new(vec![1, 2, 3])).unwrap();
    /// assert_eq!(shrc.len(), 3);
    /// ```
    pub fn try_adopt(boxed: Box<T>) -> Result<Self, Error> {
        Shrc::try_from_box(boxed).map_err(Error::from)
    }

    /// Return the number of handles sharing this handle's value, or 0 if it is empty.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let shrc = Shrc::new(100);
    /// let shrc2 = shrc.clone();
    /// assert_eq!(Shrc::ref_count(&shrc), 2);
    /// drop(shrc2);
    /// assert_eq!(Shrc::ref_count(&shrc), 1);
    /// ```
    #[inline]
    pub fn ref_count(this: &Self) -> usize {
        this.share.as_ref().map_or(0, |share| share.count().get())
    }

    /// Checks whether the handle owns nothing. Same as `Shrc::ref_count(this) == 0`.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let mut shrc = Shrc::new(100);
    /// assert!(!Shrc::is_empty(&shrc));
    /// Shrc::reset(&mut shrc);
    /// assert!(Shrc::is_empty(&shrc));
    /// ```
    #[inline]
    pub fn is_empty(this: &Self) -> bool {
        this.share.is_none()
    }

    /// Checks whether two handles share the same value. Two empty handles count as sharing.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let shrc1 = Shrc::new(100);
    /// let shrc2 = shrc1.clone();
    /// assert!(Shrc::ptr_eq(&shrc1, &shrc2));
    /// assert!(!Shrc::ptr_eq(&shrc1, &Shrc::new(100)));
    /// ```
    #[inline]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        // The count cell is never zero-sized, so its address identifies the pair.
        this.share.map(|share| share.count) == other.share.map(|share| share.count)
    }

    /// Gets the address of the shared value, or [`None`] if the handle is empty.
    #[inline]
    pub fn as_ptr(this: &Self) -> Option<NonNull<T>> {
        this.share.map(|share| share.value)
    }

    /// Get an immutable reference to the value, or [`Error::NullReference`] if the handle is empty.
    /// ```
    /// use shrc::{Error, Shrc};
    ///
    /// assert_eq!(Shrc::get(&Shrc::new(1)), Ok(&1));
    /// assert_eq!(Shrc::get(&Shrc::<i32>::empty()), Err(Error::NullReference));
    /// ```
    #[inline]
    pub fn get(this: &Self) -> Result<&T, Error> {
        match &this.share {
            Some(share) => Ok(unsafe { share.value.as_ref() }),
            None => Err(Error::null_reference()),
        }
    }

    /// Get a &mut reference to the value if this is the only handle sharing it.
    /// Otherwise (or if the handle is empty), return [`None`] because mutating would be visible through other handles.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let mut shrc = Shrc::new(100);
    /// *Shrc::get_mut(&mut shrc).unwrap() = 300;
    /// assert_eq!(*shrc, 300);
    ///
    /// let _other = shrc.clone();
    /// assert!(Shrc::get_mut(&mut shrc).is_none());
    /// ```
    #[inline]
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        let share = this.share?;
        if share.count().get() != 1 {
            return None;
        }
        Some(unsafe { &mut *share.value.as_ptr() })
    }

    /// Get a &mut reference to the value even if other handles share it. Writes are seen by every sharing handle.
    /// Returns [`Error::NullReference`] if the handle is empty.
    ///
    /// # Safety
    /// No other reference into the value, obtained through any handle, may be alive while the returned one is.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let mut shrc = Shrc::new(100);
    /// let other = shrc.clone();
    /// *unsafe { Shrc::get_mut_unchecked(&mut shrc) }.unwrap() = 200;
    /// assert_eq!(*other, 200);
    /// ```
    #[inline]
    pub unsafe fn get_mut_unchecked(this: &mut Self) -> Result<&mut T, Error> {
        match this.share {
            Some(share) => Ok(&mut *share.value.as_ptr()),
            None => Err(Error::null_reference()),
        }
    }

    /// Move the share out of `this`, leaving it empty. The reference count does not change.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let mut shrc = Shrc::new(100);
    /// let moved = Shrc::take(&mut shrc);
    /// assert!(Shrc::is_empty(&shrc));
    /// assert_eq!(Shrc::ref_count(&moved), 1);
    /// ```
    #[inline]
    pub fn take(this: &mut Self) -> Self {
        Shrc {
            share: this.share.take(),
            _marker: PhantomData,
        }
    }

    /// Release `this`'s current share, then steal `source`'s, leaving `source` empty.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let old = Shrc::new(1);
    /// let mut dest = old.clone();
    /// let mut source = Shrc::new(2);
    /// Shrc::assign_take(&mut dest, &mut source);
    /// assert_eq!(*dest, 2);
    /// assert!(Shrc::is_empty(&source));
    /// assert_eq!(Shrc::ref_count(&old), 1);
    /// ```
    #[inline]
    pub fn assign_take(this: &mut Self, source: &mut Self) {
        Shrc::reset(this);
        this.share = source.share.take();
    }

    /// Release this handle's share now and leave it empty.
    #[inline]
    pub fn reset(this: &mut Self) {
        if let Some(share) = this.share.take() {
            unsafe { share.release() };
        }
    }
}

impl<T> Shrc<T> {
    /// Creates a new `Shrc<T>` from the provided data, with a reference count of 1.
    /// Allocation failure is handled like [`Box::new`]; see [`Shrc::try_new`] for a fallible version.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let shrc = Shrc::new(100);
    /// assert_eq!(*shrc, 100);
    /// ```
    #[inline]
    pub fn new(value: T) -> Self {
        Shrc::from_share(Share::from_boxes(Box::new(value), Box::new(Cell::new(1))))
    }

    /// Creates a new `Shrc<T>` from the provided data, returning [`Error::AllocExhausted`] if either the value or
    /// the count cannot be allocated. Nothing is leaked on failure.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let shrc = Shrc::try_new(100).unwrap();
    /// assert_eq!(Shrc::ref_count(&shrc), 1);
    /// ```
    pub fn try_new(value: T) -> Result<Self, Error> {
        Shrc::try_adopt(try_box(value)?)
    }

    /// Returns the inner value if this is the only handle sharing it.
    /// Otherwise, an [`Err`] is returned with the same `Shrc` that was passed in. Empty handles are also returned.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let shrc = Shrc::new(3);
    /// assert_eq!(Shrc::try_unwrap(shrc), Ok(3));
    ///
    /// let shrc = Shrc::new(4);
    /// let _other = shrc.clone();
    /// assert_eq!(*Shrc::try_unwrap(shrc).unwrap_err(), 4);
    /// ```
    pub fn try_unwrap(this: Self) -> Result<T, Self> {
        let share = this.share;
        let share = match share {
            Some(share) if share.count().get() == 1 => share,
            _ => return Err(this),
        };
        core::mem::forget(this);

        unsafe {
            drop(Box::from_raw(share.count.as_ptr()));
            Ok(*Box::from_raw(share.value.as_ptr()))
        }
    }

    /// Returns the inner value if this is the only handle sharing it.
    /// Otherwise, the handle is dropped and [`None`] is returned.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let x = Shrc::new(3);
    /// let y = x.clone();
    /// assert_eq!(Shrc::into_inner(x), None);
    /// assert_eq!(Shrc::into_inner(y), Some(3));
    /// ```
    #[inline]
    pub fn into_inner(this: Self) -> Option<T> {
        Shrc::try_unwrap(this).ok()
    }
}

impl<T: Clone> Shrc<T> {
    /// Split this handle off into a private deep copy of its value.
    ///
    /// If the handle is empty or already the only one sharing its value, nothing happens and `Ok(false)` is
    /// returned. Otherwise the value is cloned into a new allocation with its own count of 1, this handle's old
    /// share is released and `Ok(true)` is returned.
    ///
    /// Both new allocations are made before the old share is released, so on [`Error::AllocExhausted`] the handle
    /// still shares the original value and every count is unchanged.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let h1 = Shrc::new(5);
    /// let mut h2 = h1.clone();
    /// assert_eq!(Shrc::unshare(&mut h2), Ok(true));
    /// assert_eq!((Shrc::ref_count(&h1), Shrc::ref_count(&h2)), (1, 1));
    /// assert_eq!(Shrc::unshare(&mut h2), Ok(false));
    /// ```
    pub fn unshare(this: &mut Self) -> Result<bool, Error> {
        let share = match this.share {
            Some(share) if share.count().get() > 1 => share,
            _ => return Ok(false),
        };

        let value = try_box(unsafe { share.value.as_ref() }.clone())?;
        let count = try_box(Cell::new(1))?;
        log::trace!(
            "unsharing {} from {} handles",
            core::any::type_name::<T>(),
            share.count().get()
        );

        this.share = Some(Share::from_boxes(value, count));
        unsafe { share.release() };
        Ok(true)
    }

    /// Get a &mut reference to a value only this handle owns, calling [`Shrc::unshare`] first if it is shared.
    /// Returns [`Error::NullReference`] on an empty handle and [`Error::AllocExhausted`] if the split fails.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let original = Shrc::new(vec![1, 2, 3]);
    /// let mut copy = original.clone();
    /// Shrc::make_mut(&mut copy).unwrap().push(4);
    /// assert_eq!(original.len(), 3);
    /// assert_eq!(copy.len(), 4);
    /// ```
    pub fn make_mut(this: &mut Self) -> Result<&mut T, Error> {
        Shrc::unshare(this)?;
        match this.share {
            Some(share) => Ok(unsafe { &mut *share.value.as_ptr() }),
            None => Err(Error::null_reference()),
        }
    }

    /// If this is the only handle, unwrap the value. Otherwise, clone the value and return the clone.
    /// Returns [`Error::NullReference`] for an empty handle.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let inner = String::from("Shrc");
    /// let ptr = inner.as_ptr();
    ///
    /// let shrc = Shrc::new(inner);
    /// let shrc2 = shrc.clone();
    /// let inner = Shrc::unwrap_or_clone(shrc).unwrap();
    /// assert!(!std::ptr::eq(ptr, inner.as_ptr()));
    ///
    /// let inner = Shrc::unwrap_or_clone(shrc2).unwrap();
    /// assert!(std::ptr::eq(ptr, inner.as_ptr()));
    /// ```
    #[inline]
    pub fn unwrap_or_clone(this: Self) -> Result<T, Error> {
        Shrc::try_unwrap(this).or_else(|shrc| Shrc::get(&shrc).cloned())
    }
}

impl<T: ?Sized> Deref for Shrc<T> {
    type Target = T;

    /// Get an immutable reference to the value.
    ///
    /// # Panics
    /// If the handle is empty.
    /// ```should_panic
    /// use shrc::Shrc;
    ///
    /// let shrc = Shrc::<i32>::empty();
    /// let value: i32 = *shrc;
    /// ```
    #[inline]
    fn deref(&self) -> &Self::Target {
        match Shrc::get(self) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T: ?Sized> Drop for Shrc<T> {
    #[inline]
    fn drop(&mut self) {
        Shrc::reset(self);
    }
}

impl<T: ?Sized> Clone for Shrc<T> {
    /// Clone a `Shrc<T>` (increment the shared count).
    /// It will panic if the count overflows.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let shrc = Shrc::new(100);
    /// let shrc2 = shrc.clone();
    /// assert_eq!(Shrc::ref_count(&shrc), Shrc::ref_count(&shrc2));
    /// assert_eq!(Shrc::as_ptr(&shrc), Shrc::as_ptr(&shrc2));
    /// ```
    #[inline]
    fn clone(&self) -> Self {
        Shrc {
            share: self.share.map(Share::acquire),
            _marker: PhantomData,
        }
    }

    /// Make `self` share `source`'s value, releasing whatever `self` shared before.
    /// Nothing changes if the two already share the same value.
    #[inline]
    fn clone_from(&mut self, source: &Self) {
        if !Shrc::ptr_eq(self, source) {
            *self = source.clone();
        }
    }
}

impl<T: ?Sized> Default for Shrc<T> {
    /// An empty handle, same as [`Shrc::empty`].
    #[inline]
    fn default() -> Self {
        Shrc::empty()
    }
}

impl<T: ?Sized + Display> Display for Shrc<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match Shrc::get(self) {
            Ok(value) => Display::fmt(value, f),
            Err(_) => f.write_str("<empty>"),
        }
    }
}

impl<T: ?Sized + Debug> Debug for Shrc<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match Shrc::get(self) {
            Ok(value) => Debug::fmt(value, f),
            Err(_) => f.write_str("Shrc(<empty>)"),
        }
    }
}

impl<T: ?Sized> Pointer for Shrc<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match Shrc::as_ptr(self) {
            Some(ptr) => Pointer::fmt(&ptr, f),
            None => Pointer::fmt(&core::ptr::null::<()>(), f),
        }
    }
}

impl<T> From<T> for Shrc<T> {
    /// Create a new `Shrc<T>` from the provided data. This is equivalent to calling `Shrc::new` on the same data.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let shrc = Shrc::from(100);
    /// assert_eq!(*shrc, 100);
    /// ```
    fn from(value: T) -> Self {
        Shrc::new(value)
    }
}

impl<T: ?Sized> From<Box<T>> for Shrc<T> {
    /// Take over a boxed value, which may be unsized.
    /// ```
    /// use shrc::Shrc;
    ///
    /// let shrc: Shrc<[i32]> = Shrc::from(vec![1, 2, 3].into_boxed_slice());
    /// assert_eq!(&*shrc, &[1, 2, 3]);
    /// ```
    fn from(value: Box<T>) -> Self {
        Shrc::from_share(Share::from_boxes(value, Box::new(Cell::new(1))))
    }
}

impl<T: ?Sized + Hash> Hash for Shrc<T> {
    /// Pass the value (or its absence) to the provided hasher.
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        Shrc::get(self).ok().hash(state);
    }
}

impl<T: ?Sized + PartialEq> PartialEq for Shrc<T> {
    /// Equality by value, even if the values are in different allocations. An empty handle only equals another
    /// empty handle.
    /// ```
    /// use shrc::Shrc;
    ///
    /// assert!(Shrc::from(100) == Shrc::from(100));
    /// assert!(Shrc::from(100) != Shrc::empty());
    /// ```
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Shrc::get(self).ok() == Shrc::get(other).ok()
    }
}

impl<T: ?Sized + Eq> Eq for Shrc<T> {}

impl<T: ?Sized + PartialOrd> PartialOrd for Shrc<T> {
    /// Compares the values. An empty handle is less than any non-empty one.
    /// ```
    /// use shrc::Shrc;
    /// use std::cmp::Ordering;
    ///
    /// assert_eq!(Some(Ordering::Less), Shrc::from(100).partial_cmp(&Shrc::from(200)));
    /// assert!(Shrc::empty() < Shrc::from(0));
    /// ```
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Shrc::get(self).ok().partial_cmp(&Shrc::get(other).ok())
    }
}

impl<T: ?Sized + Ord> Ord for Shrc<T> {
    #[inline]
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        Shrc::get(self).ok().cmp(&Shrc::get(other).ok())
    }
}

impl<T: ?Sized> Unpin for Shrc<T> {}
