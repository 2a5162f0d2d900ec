//! # `conc` — hazard-pointer-based memory reclamation
//!
//! Lock-free structures replace shared pointers with compare-and-swap, which leaves one question
//! open: when is it safe to free the value that was just swapped out? Another thread may have
//! loaded the old pointer a moment before the swap and still be reading through it.
//!
//! This crate answers it with hazard pointers. A reader announces the object it is about to use
//! in a "hazard"; a writer that unlinks an object hands it over as "garbage"; a collection cycle
//! destroys the garbage that no hazard announces.
//!
//! ## Overview
//!
//! - `Atomic<T>`, an atomic optional owning pointer. Loading it yields a `Guard<T>`.
//! - `Guard<T>`, an RAII handle keeping the guarded object alive.
//! - `add_garbage_box()` for queuing the destruction of an unlinked box.
//! - `gc()` and `try_gc()` for collecting on demand.
//! - `settings` for tuning the collector per thread.
//!
//! ## Design
//!
//! Both hazards and garbage are cached thread-locally to keep the hot path free of shared
//! writes. Garbage is exported to the global queue in batches, and each export "ticks" the
//! collector, which runs a collection with a configurable probability.
//!
//! A guard is created by first putting a hazard in the *blocked* state, then reading the
//! pointer, and finally storing the read pointer in the hazard. A collector that meets a blocked
//! hazard waits until it is resolved, so there is no window in which a freshly read pointer is
//! unprotected.

#[macro_use]
extern crate lazy_static;

mod atomic;
mod garbage;
mod global;
mod guard;
mod hazard;
mod local;
mod mpsc;
pub mod settings;

pub use crate::atomic::Atomic;
pub use crate::guard::Guard;

use crate::garbage::Garbage;

/// Attempt to collect garbage.
///
/// The garbage of the current thread is exported to the global queue, after which a collection
/// runs, unless another thread is collecting already. In that case `Err(())` is returned.
///
/// Garbage still cached in other threads is not affected.
///
/// # Panic
///
/// A panicking destructor aborts the process.
pub fn try_gc() -> Result<(), ()> {
    local::export_garbage();
    global::try_gc()
}

/// Collect garbage.
///
/// Like `try_gc()`, but if another thread is collecting, this blocks until it can collect
/// itself. Use it when destructors with observable effects must have run, e.g. in tests.
pub fn gc() {
    local::export_garbage();
    while let Err(()) = global::try_gc() {}
}

/// Queue a heap-allocated `Box<T>`, given by its raw pointer, for destruction.
///
/// The box is dropped at some point after every guard protecting it is gone.
///
/// # Safety
///
/// `ptr` must originate from `Box::into_raw`, must not be queued twice, and must already be
/// unreachable from shared structures, such that no new guard to it can be created.
pub unsafe fn add_garbage_box<T: Send>(ptr: *const T) {
    local::add_garbage(Garbage::new_box(ptr));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn try_gc_collects() {
        let opt = Atomic::new(Some(Box::new(1)));
        opt.store(Some(Box::new(2)), Ordering::Release);

        // Other tests may be collecting at the same time.
        while try_gc().is_err() {}
        assert_eq!(*opt.load(Ordering::Acquire).unwrap(), 2);
    }
}
