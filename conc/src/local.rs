//! The thread-local state.

use std::cell::RefCell;
use std::mem;

use crate::garbage::Garbage;
use crate::{global, guard, hazard, settings};

thread_local! {
    /// The state of this thread.
    static STATE: RefCell<State> = RefCell::new(State::default());
}

/// Queue garbage in the current thread.
///
/// Once enough garbage has accumulated, it is exported to the global state and the collector
/// ticks.
pub fn add_garbage(garbage: Garbage) {
    // Ticking can collect, which must not happen inside a guard constructor.
    guard::debug_assert_no_create();

    debug_assert!(!garbage.ptr().is_null(), "Queuing a null pointer as garbage.");

    let mut garbage = Some(garbage);
    let exported = STATE.try_with(|s| match garbage.take() {
        Some(garbage) => s.borrow_mut().add_garbage(garbage),
        None => false,
    });

    match exported {
        // The borrow is released before ticking, as destructors run by the collector may queue
        // garbage themselves.
        Ok(true) => global::tick(),
        Ok(false) => (),
        // The thread is being torn down; go directly to the global state.
        Err(_) => {
            if let Some(garbage) = garbage {
                global::export_garbage(vec![garbage]);
            }
        }
    }
}

/// Get a hazard in the blocked state.
///
/// This pops from the thread-local cache when possible and registers a new hazard otherwise. It
/// does not fence.
pub fn get_hazard() -> hazard::Writer {
    STATE
        .try_with(|s| s.borrow_mut().get_hazard())
        .unwrap_or_else(|_| global::create_hazard())
}

/// Return a hazard to the thread-local cache.
///
/// The hazard must not be blocked, as the cache may leave it untouched for a long time.
pub fn free_hazard(hazard: hazard::Writer) {
    guard::debug_assert_no_create();

    debug_assert!(!hazard.is_blocked(), "Freeing a blocked hazard.");

    // `try_with` consumes the closure, so the hazard is parked in an `Option` to get it back if
    // the thread-local state is gone.
    let mut hazard = Some(hazard);
    let cached = STATE.try_with(|s| {
        if let Some(hazard) = hazard.take() {
            s.borrow_mut().free_hazard(hazard);
        }
    });

    if cached.is_err() {
        if let Some(hazard) = hazard {
            hazard.kill();
        }
    }
}

/// Export the garbage of this thread to the global state, and tick.
pub fn export_garbage() {
    guard::debug_assert_no_create();

    if STATE.try_with(|s| s.borrow_mut().export_garbage()).is_ok() {
        global::tick();
    }
}

/// A thread-local state.
#[derive(Default)]
struct State {
    /// Garbage waiting to be exported.
    garbage: Vec<Garbage>,
    /// Cached hazards ready for reuse.
    ///
    /// Releasing a hazard does not free it; it keeps protecting its last object until the
    /// amount of such hazards exceeds `max_non_free_hazards`.
    available_hazards: Vec<hazard::Writer>,
    /// Every hazard in `available_hazards` before this index is free.
    available_hazards_free_before: usize,
}

impl State {
    fn non_free_hazards(&self) -> usize {
        self.available_hazards.len() - self.available_hazards_free_before
    }

    fn get_hazard(&mut self) -> hazard::Writer {
        if let Some(hazard) = self.available_hazards.pop() {
            if self.available_hazards_free_before > self.available_hazards.len() {
                self.available_hazards_free_before = self.available_hazards.len();
            }

            hazard.block();
            hazard
        } else {
            global::create_hazard()
        }
    }

    fn free_hazard(&mut self, hazard: hazard::Writer) {
        self.available_hazards.push(hazard);

        if self.non_free_hazards() > settings::get().max_non_free_hazards {
            for hazard in &self.available_hazards[self.available_hazards_free_before..] {
                hazard.free();
            }

            self.available_hazards_free_before = self.available_hazards.len();
        }
    }

    /// Queue garbage, returning `true` if this exported it.
    fn add_garbage(&mut self, garbage: Garbage) -> bool {
        self.garbage.push(garbage);

        if self.garbage.len() > settings::get().max_garbage_before_export {
            self.export_garbage();
            true
        } else {
            false
        }
    }

    fn export_garbage(&mut self) {
        global::export_garbage(mem::take(&mut self.garbage));
    }
}

impl Drop for State {
    fn drop(&mut self) {
        // No ticking here: collecting could run destructors touching thread-locals which are
        // already gone.
        self.export_garbage();

        for hazard in self.available_hazards.drain(..) {
            hazard.kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{ptr, thread};

    #[test]
    fn hazards_are_reused() {
        thread::spawn(|| {
            let h = get_hazard();
            h.free();
            free_hazard(h);

            STATE.with(|s| assert_eq!(s.borrow().available_hazards.len(), 1));
            let h = get_hazard();
            assert!(h.is_blocked());
            STATE.with(|s| assert!(s.borrow().available_hazards.is_empty()));
            h.kill();
        })
        .join()
        .unwrap();
    }

    #[test]
    fn non_free_hazards_are_freed_in_bulk() {
        thread::spawn(|| {
            let limit = settings::get().max_non_free_hazards;
            let x = 0u8;

            let hazards: Vec<_> = (0..=limit).map(|_| get_hazard()).collect();
            for h in hazards {
                h.protect(&x);
                free_hazard(h);
            }

            STATE.with(|s| {
                let s = s.borrow();
                assert_eq!(s.non_free_hazards(), 0);
                assert_eq!(s.available_hazards_free_before, limit + 1);
            });
        })
        .join()
        .unwrap();
    }

    #[cfg(debug_assertions)]
    #[should_panic]
    #[test]
    fn debug_free_blocked() {
        let (writer, reader) = hazard::create();
        mem::forget(reader);

        free_hazard(writer);
    }

    #[cfg(debug_assertions)]
    #[should_panic]
    #[test]
    fn debug_add_null_garbage() {
        add_garbage(unsafe { Garbage::new_box(ptr::null::<u8>()) });
    }
}
