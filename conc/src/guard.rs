//! RAII guards for hazards.

use std::fmt;
use std::ops;
use std::sync::atomic::{self, Ordering};

use crate::{hazard, local};

#[cfg(debug_assertions)]
use std::cell::Cell;
#[cfg(debug_assertions)]
thread_local! {
    /// Number of guards the current thread is creating.
    static CURRENT_CREATING: Cell<usize> = Cell::new(0);
}

/// Assert (in debug mode) that this thread is not inside a guard constructor.
///
/// Call this from anything that can collect. A collection inside a guard constructor would spin
/// forever on the constructor's own blocked hazard.
pub fn debug_assert_no_create() {
    #[cfg(debug_assertions)]
    {
        let creating = CURRENT_CREATING.try_with(Cell::get).unwrap_or(0);
        assert_eq!(creating, 0, "Collecting inside a guard constructor.");
    }
}

/// A handle keeping an object alive.
///
/// As long as the guard exists, the object it was created from is not destroyed, even if it has
/// been unlinked and queued as garbage in the meantime.
#[must_use = "Creating a guard costs a hazard; drop it or use a method that returns no guard."]
pub struct Guard<T: 'static + ?Sized> {
    /// The hazard protecting the object.
    hazard: hazard::Writer,
    /// The guarded reference.
    ///
    /// After `map`, this may point into the protected object rather than at it.
    pointer: &'static T,
}

impl<T: ?Sized> Guard<T> {
    /// Failably create a new guard.
    ///
    /// This is `Guard::new()` with a closure that can abort the creation.
    pub fn try_new<F, E>(ptr: F) -> Result<Guard<T>, E>
    where
        F: FnOnce() -> Result<&'static T, E>,
    {
        #[cfg(debug_assertions)]
        CURRENT_CREATING.with(|x| x.set(x.get() + 1));

        let hazard = local::get_hazard();

        // The blocked state must be visible before the pointer is read.
        atomic::fence(Ordering::SeqCst);

        // No collection can pass the blocked hazard, so the pointer read here cannot be freed
        // before it is protected.
        let res = ptr();

        #[cfg(debug_assertions)]
        CURRENT_CREATING.with(|x| x.set(x.get() - 1));

        match res {
            Ok(pointer) => {
                hazard.protect(pointer as *const T as *const u8);

                Ok(Guard { hazard, pointer })
            }
            Err(err) => {
                hazard.free();

                Err(err)
            }
        }
    }

    /// Create a new guard.
    ///
    /// The closure reads the pointer to guard. While it runs, no garbage collection can complete,
    /// which makes it safe to load from an atomic pointer.
    ///
    /// # Important
    ///
    /// The closure must not cause a garbage collection. It would spin forever on the blocked
    /// hazard of this very constructor (in debug mode, it panics instead).
    pub fn new<F>(ptr: F) -> Guard<T>
    where
        F: FnOnce() -> &'static T,
    {
        match Guard::try_new::<_, ()>(|| Ok(ptr())) {
            Ok(guard) => guard,
            Err(()) => unreachable!(),
        }
    }

    /// Conditionally create a new guard.
    ///
    /// This is `try_new` with `Option` instead of `Result`.
    pub fn maybe_new<F>(ptr: F) -> Option<Guard<T>>
    where
        F: FnOnce() -> Option<&'static T>,
    {
        Guard::try_new(|| ptr().ok_or(())).ok()
    }

    /// Narrow the guard to something owned by the guarded object.
    ///
    /// The hazard keeps protecting the original object, so the new reference lives exactly as
    /// long as its owner.
    pub fn map<U: 'static + ?Sized, F>(self, f: F) -> Guard<U>
    where
        F: FnOnce(&T) -> &U,
    {
        Guard {
            pointer: f(self.pointer),
            hazard: self.hazard,
        }
    }

    /// Failably narrow the guard.
    pub fn try_map<U: 'static + ?Sized, E, F>(self, f: F) -> Result<Guard<U>, E>
    where
        F: FnOnce(&T) -> Result<&U, E>,
    {
        Ok(Guard {
            pointer: f(self.pointer)?,
            hazard: self.hazard,
        })
    }

    /// Conditionally narrow the guard.
    ///
    /// If the closure returns `None`, the guard is dropped.
    pub fn maybe_map<U: 'static + ?Sized, F>(self, f: F) -> Option<Guard<U>>
    where
        F: FnOnce(&T) -> Option<&U>,
    {
        self.try_map(|x| f(x).ok_or(())).ok()
    }

    /// Get the raw pointer of this guard.
    pub fn as_ptr(&self) -> *const T {
        self.pointer
    }
}

impl<T: ?Sized> ops::Deref for Guard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.pointer
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Guard<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Guard").field(&self.pointer).finish()
    }
}
