use std::{
    alloc::{alloc, Layout},
    ptr::{self, NonNull},
};

use crate::error::Error;

/// Move `value` into a fresh heap allocation, reporting exhaustion instead of aborting.
///
/// The memory comes from the global allocator with `Layout::new::<T>()`, so the result is an ordinary
/// `Box<T>` and is freed like one. Zero-sized values never touch the allocator and cannot fail.
pub(crate) fn try_box<T>(value: T) -> Result<Box<T>, Error> {
    let layout = Layout::new::<T>();
    if layout.size() == 0 {
        return Ok(Box::new(value));
    }

    let raw = if failpoint::should_fail() {
        ptr::null_mut()
    } else {
        unsafe { alloc(layout) }
    };

    match NonNull::new(raw.cast::<T>()) {
        Some(ptr) => {
            failpoint::record();
            unsafe {
                ptr.as_ptr().write(value);
                Ok(Box::from_raw(ptr.as_ptr()))
            }
        }
        None => {
            log::debug!(
                "allocation of {} bytes for {} failed",
                layout.size(),
                core::any::type_name::<T>()
            );
            Err(Error::alloc_exhausted(layout))
        }
    }
}

#[cfg(not(test))]
mod failpoint {
    #[inline(always)]
    pub(super) fn should_fail() -> bool {
        false
    }

    #[inline(always)]
    pub(super) fn record() {}
}

/// Per-thread switch that makes [`try_box`] report exhaustion, so failure paths can be tested deterministically.
#[cfg(test)]
pub(crate) mod failpoint {
    use std::cell::Cell;

    thread_local! {
        static REMAINING: Cell<Option<usize>> = const { Cell::new(None) };
        static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
    }

    /// Clears the failpoint when dropped.
    pub(crate) struct FailGuard;

    impl Drop for FailGuard {
        fn drop(&mut self) {
            REMAINING.with(|r| r.set(None));
        }
    }

    /// Let `n` more allocations on this thread succeed, then fail every one after until the guard is dropped.
    pub(crate) fn fail_after(n: usize) -> FailGuard {
        REMAINING.with(|r| r.set(Some(n)));
        FailGuard
    }

    /// Number of successful fallible allocations made on this thread so far.
    pub(crate) fn allocations() -> usize {
        ALLOCATIONS.with(Cell::get)
    }

    pub(super) fn should_fail() -> bool {
        REMAINING.with(|r| match r.get() {
            Some(0) => true,
            Some(n) => {
                r.set(Some(n - 1));
                false
            }
            None => false,
        })
    }

    pub(super) fn record() {
        ALLOCATIONS.with(|a| a.set(a.get() + 1));
    }
}
