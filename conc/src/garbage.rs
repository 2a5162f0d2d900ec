//! Objects awaiting destruction.

use std::mem;

/// An unlinked object to be destroyed once no hazard protects it.
pub struct Garbage {
    /// The address of the object.
    ///
    /// This is what hazards are compared against.
    ptr: *const u8,
    /// The destructor, called with `self.ptr`.
    dtor: unsafe fn(*const u8),
}

impl Garbage {
    /// Create a garbage item from an address and a destructor.
    #[cfg(test)]
    pub fn new(ptr: *const u8, dtor: fn(*const u8)) -> Garbage {
        Garbage { ptr, dtor }
    }

    /// Create a garbage item dropping and deallocating a box.
    ///
    /// # Safety
    ///
    /// `item` must come from `Box::into_raw` and must not be freed by anything else.
    pub unsafe fn new_box<T>(item: *const T) -> Garbage {
        unsafe fn drop_box<T>(ptr: *const u8) {
            drop(Box::from_raw(ptr as *mut T));
        }

        Garbage {
            ptr: item as *const u8,
            dtor: drop_box::<T>,
        }
    }

    /// The address of the object.
    pub fn ptr(&self) -> *const u8 {
        self.ptr
    }

    /// Run the destructor.
    ///
    /// Destruction happens deep inside the collector, usually on an unrelated thread. Unwinding
    /// from there would leave the collector state half-processed, so a panicking destructor
    /// aborts instead (through a double panic).
    pub fn destroy(self) {
        struct AbortOnUnwind;

        impl Drop for AbortOnUnwind {
            fn drop(&mut self) {
                panic!("A destructor panicked during garbage collection.");
            }
        }

        let bomb = AbortOnUnwind;
        unsafe { (self.dtor)(self.ptr) }
        mem::forget(bomb);
    }
}

// The raw pointer is only ever dereferenced by the destructor, and garbage is only created from
// values that may be dropped on any thread.
unsafe impl Send for Garbage {}
