//! Hazards.
//!
//! A hazard is a heap-allocated atomic pointer announcing which object a thread is using. It has
//! two ends: the `Writer`, owned by the thread using it (usually inside a `Guard`), and the
//! `Reader`, registered in the global state where the collector scans it.
//!
//! Only the reader end may deallocate the hazard, and only after the writer end has marked it
//! dead.

use std::sync::atomic::{AtomicPtr, Ordering};
use std::{mem, thread};

use crate::local;

/// The address of this marks the blocked state.
static BLOCKED: u8 = 0;
/// The address of this marks the free state.
static FREE: u8 = 1;
/// The address of this marks the dead state.
static DEAD: u8 = 2;

/// Turn one of the state markers into a storable pointer.
fn marker(state: &'static u8) -> *mut u8 {
    state as *const u8 as *mut u8
}

/// The observable state of a hazard.
///
/// The blocked state is not part of this, as readers wait until it is left.
#[derive(PartialEq, Debug)]
pub enum State {
    /// Nothing is protected.
    Free,
    /// The writer end is gone; the hazard can be deallocated.
    Dead,
    /// The object at this address must not be destroyed.
    Protect(*const u8),
}

/// Create a new hazard, starting in the blocked state.
pub fn create() -> (Writer, Reader) {
    let ptr: &'static AtomicPtr<u8> = Box::leak(Box::new(AtomicPtr::new(marker(&BLOCKED))));

    (Writer { ptr }, Reader { ptr })
}

/// The collector's end of a hazard.
pub struct Reader {
    ptr: &'static AtomicPtr<u8>,
}

impl Reader {
    /// Read the state, spinning while the hazard is blocked.
    ///
    /// In debug mode, this panics after an absurd number of spins, as the hazard is then most
    /// likely blocked forever.
    pub fn get(&self) -> State {
        let mut spins = 0u64;

        loop {
            let ptr = self.ptr.load(Ordering::SeqCst) as *const u8;

            if ptr == &BLOCKED as *const u8 {
                spins += 1;
                debug_assert!(spins < 100_000_000, "Hazard blocked for 100 million spins.");

                std::hint::spin_loop();
            } else if ptr == &FREE as *const u8 {
                return State::Free;
            } else if ptr == &DEAD as *const u8 {
                return State::Dead;
            } else {
                return State::Protect(ptr);
            }
        }
    }

    /// Deallocate the hazard.
    ///
    /// # Safety
    ///
    /// The writer end must be dead (see `Writer::kill`). This is checked in debug mode only.
    pub unsafe fn destroy(self) {
        debug_assert!(self.get() == State::Dead, "Prematurely freeing an active hazard.");

        drop(Box::from_raw(self.ptr as *const AtomicPtr<u8> as *mut AtomicPtr<u8>));
    }
}

/// The owning thread's end of a hazard.
///
/// Dropping it returns the hazard to the thread-local cache.
#[derive(Debug)]
pub struct Writer {
    ptr: &'static AtomicPtr<u8>,
}

impl Writer {
    /// Is the hazard blocked?
    pub fn is_blocked(&self) -> bool {
        self.ptr.load(Ordering::SeqCst) as *const u8 == &BLOCKED as *const u8
    }

    /// Block the hazard, stalling any collector scanning it.
    pub fn block(&self) {
        self.ptr.store(marker(&BLOCKED), Ordering::SeqCst);
    }

    /// Release whatever the hazard protects.
    pub fn free(&self) {
        self.ptr.store(marker(&FREE), Ordering::SeqCst);
    }

    /// Protect the object at `ptr`.
    pub fn protect(&self, ptr: *const u8) {
        self.ptr.store(ptr as *mut u8, Ordering::SeqCst);
    }

    /// Mark the hazard dead, handing it to the collector for deallocation.
    pub fn kill(self) {
        self.ptr.store(marker(&DEAD), Ordering::SeqCst);
        mem::forget(self);
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if thread::panicking() {
            // While unwinding, the thread-local cache may be mid-borrow or gone, and a blocked
            // hazard left behind would stall every collector. Kill it instead.
            self.ptr.store(marker(&DEAD), Ordering::SeqCst);
        } else {
            local::free_hazard(Writer { ptr: self.ptr });
        }
    }
}
