//! Transactional cells.

use std::fmt;
use std::sync::atomic;

use conc::{Atomic, Guard};

/// A single-slot container updated by optimistic transactions.
///
/// The cell always holds a value. Reading it hands out a guard to the current value, which
/// remains valid (and unchanged) regardless of what is stored afterwards.
pub struct AtomicCell<T: 'static> {
    /// The current value, never `None`.
    inner: Atomic<T>,
}

impl<T: 'static> AtomicCell<T> {
    /// Create a new cell holding `init`.
    pub fn new(init: T) -> AtomicCell<T> {
        AtomicCell {
            inner: Atomic::new(Some(Box::new(init))),
        }
    }

    /// Get the current value.
    pub fn get(&self) -> Guard<T> {
        match self.inner.load(atomic::Ordering::Acquire) {
            Some(guard) => guard,
            None => unreachable!("Empty cell."),
        }
    }

    /// Update the value.
    ///
    /// This applies `f` to a snapshot of the current value. If `f` returns `None`, the value is
    /// left as is. Otherwise, the result is stored, provided that no other thread has stored
    /// anything since the snapshot was taken. If another thread did, `f` is reevaluated on the
    /// newer value, so it can run several times and should be free of side effects.
    ///
    /// The number of attempts lost to other threads is returned.
    pub fn transact<F>(&self, f: F) -> usize
    where
        F: Fn(&T) -> Option<T>,
    {
        let mut retries = 0;

        loop {
            // The snapshot is guarded until the CAS is done, so its address can't be reused in
            // between.
            let snapshot = self.get();

            let new = match f(&snapshot) {
                Some(new) => Box::new(new),
                None => return retries,
            };

            if self
                .inner
                .compare_and_store(Some(snapshot.as_ptr()), Some(new), atomic::Ordering::Release)
                .is_ok()
            {
                return retries;
            }

            retries += 1;
        }
    }
}

impl<T: 'static + Default> Default for AtomicCell<T> {
    fn default() -> AtomicCell<T> {
        AtomicCell::new(T::default())
    }
}

impl<T: 'static + fmt::Debug> fmt::Debug for AtomicCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("AtomicCell").field(&*self.get()).finish()
    }
}
