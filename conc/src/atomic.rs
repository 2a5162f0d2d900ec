//! Concurrent, atomic options.

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{self, AtomicPtr};

use crate::garbage::Garbage;
use crate::guard::Guard;
use crate::local;

/// A concurrently readable and updatable optional box.
///
/// Loading yields a `Guard<T>`, which stays valid no matter what other threads store in the
/// meantime. Values replaced or left behind at drop are destroyed by the collector once no guard
/// refers to them anymore.
pub struct Atomic<T: 'static> {
    inner: AtomicPtr<T>,
    /// The `Atomic` owns a `T`, which can be dropped on any thread and read from many.
    _marker: PhantomData<*const T>,
}

unsafe impl<T: 'static + Send + Sync> Send for Atomic<T> {}
unsafe impl<T: 'static + Send + Sync> Sync for Atomic<T> {}

impl<T: 'static> Default for Atomic<T> {
    fn default() -> Atomic<T> {
        Atomic::new(None)
    }
}

impl<T: 'static> Atomic<T> {
    /// Create a new concurrent option.
    pub fn new(init: Option<Box<T>>) -> Atomic<T> {
        Atomic {
            inner: AtomicPtr::new(init.map_or(ptr::null_mut(), Box::into_raw)),
            _marker: PhantomData,
        }
    }

    /// Get a guarded reference to the current content.
    pub fn load(&self, ordering: atomic::Ordering) -> Option<Guard<T>> {
        Guard::maybe_new(|| unsafe { self.inner.load(ordering).as_ref() })
    }

    /// Store a new value, queuing the old one for destruction.
    pub fn store(&self, new: Option<Box<T>>, ordering: atomic::Ordering) {
        let new = new.map_or(ptr::null_mut(), Box::into_raw);
        let old = self.inner.swap(new, ordering);

        if !old.is_null() {
            local::add_garbage(unsafe { Garbage::new_box(old) });
        }
    }

    /// Store a new value, returning a guard to the old one.
    ///
    /// This is more expensive than `store`, as it creates a guard.
    pub fn swap(&self, new: Option<Box<T>>, ordering: atomic::Ordering) -> Option<Guard<T>> {
        let new = new.map_or(ptr::null_mut(), Box::into_raw);

        // The guard must exist before the old value is queued, or it could be freed in between.
        let old = Guard::maybe_new(|| unsafe { self.inner.swap(new, ordering).as_ref() });

        if let Some(ref old) = old {
            local::add_garbage(unsafe { Garbage::new_box(old.as_ptr()) });
        }

        old
    }

    /// Store `new` if the current value is `old`.
    ///
    /// `old` is compared by address; `None` stands for the empty state. On success, the replaced
    /// value is queued for destruction. On failure, `new` is handed back.
    ///
    /// To rule out the ABA problem, `old` should come from a guard which is still alive, so that
    /// its address cannot be reused in the meantime.
    pub fn compare_and_store(
        &self,
        old: Option<*const T>,
        new: Option<Box<T>>,
        ordering: atomic::Ordering,
    ) -> Result<(), Option<Box<T>>> {
        let old = old.unwrap_or(ptr::null()) as *mut T;
        let new = new.map_or(ptr::null_mut(), Box::into_raw);

        match self
            .inner
            .compare_exchange(old, new, ordering, atomic::Ordering::Relaxed)
        {
            Ok(old) => {
                if !old.is_null() {
                    local::add_garbage(unsafe { Garbage::new_box(old) });
                }

                Ok(())
            }
            Err(_) => Err(if new.is_null() {
                None
            } else {
                // The CAS failed, so `new` was never published and is still ours.
                Some(unsafe { Box::from_raw(new) })
            }),
        }
    }

    /// Take the content out, given exclusive access.
    pub fn into_inner(mut self) -> Option<Box<T>> {
        let ptr = *self.inner.get_mut();
        *self.inner.get_mut() = ptr::null_mut();

        if ptr.is_null() {
            None
        } else {
            // Guards can only be created through `&self`, and `self` is owned here, so no guard
            // to the value exists.
            Some(unsafe { Box::from_raw(ptr) })
        }
    }
}

impl<T: 'static> Drop for Atomic<T> {
    fn drop(&mut self) {
        let ptr = *self.inner.get_mut();

        if !ptr.is_null() {
            // Guards loaded earlier may outlive the option, so the value goes through the
            // collector rather than being dropped here.
            local::add_garbage(unsafe { Garbage::new_box(ptr) });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::thread;

    struct Basic;

    impl Drop for Basic {
        fn drop(&mut self) {
            basic();
        }
    }

    thread_local! {
        static BASIC: Basic = Basic;
    }

    fn basic() {
        let opt = Atomic::default();
        assert!(opt.load(Ordering::Relaxed).is_none());
        assert!(opt.swap(None, Ordering::Relaxed).is_none());
        assert!(opt.load(Ordering::Relaxed).is_none());
        assert!(opt.swap(Some(Box::new(42)), Ordering::Relaxed).is_none());
        assert_eq!(*opt.load(Ordering::Relaxed).unwrap(), 42);
        assert_eq!(*opt.swap(Some(Box::new(43)), Ordering::Relaxed).unwrap(), 42);
        assert_eq!(*opt.load(Ordering::Relaxed).unwrap(), 43);
    }

    #[test]
    fn basic_properties() {
        basic()
    }

    #[test]
    fn cas() {
        let bx1 = Box::new(1usize);
        let ptr1 = &*bx1 as *const usize;
        let bx2 = Box::new(1usize);
        let ptr2 = &*bx2 as *const usize;

        let opt = Atomic::new(Some(bx1));
        let back = opt
            .compare_and_store(Some(ptr2), Some(Box::new(5)), Ordering::AcqRel)
            .unwrap_err();
        assert_eq!(*back.unwrap(), 5);
        assert_eq!(ptr1, opt.load(Ordering::Acquire).unwrap().as_ptr());

        assert!(opt.compare_and_store(None, None, Ordering::AcqRel).is_err());
        assert_eq!(ptr1, opt.load(Ordering::Acquire).unwrap().as_ptr());

        opt.compare_and_store(Some(ptr1), None, Ordering::AcqRel).unwrap();
        assert!(opt.load(Ordering::Acquire).is_none());

        opt.compare_and_store(None, Some(bx2), Ordering::AcqRel).unwrap();
        assert_eq!(ptr2, opt.load(Ordering::Acquire).unwrap().as_ptr());

        // To check that collection doesn't segfault or something.
        crate::gc();
        crate::gc();
    }

    #[test]
    fn into_inner() {
        let opt = Atomic::new(Some(Box::new(3)));
        assert_eq!(*opt.into_inner().unwrap(), 3);
        assert!(Atomic::<u8>::default().into_inner().is_none());
    }

    #[test]
    fn guard_survives_store() {
        let opt = Atomic::new(Some(Box::new(String::from("old"))));
        let old = opt.load(Ordering::Acquire).unwrap();

        opt.store(Some(Box::new(String::from("new"))), Ordering::Release);
        crate::gc();

        assert_eq!(&*old, "old");
        assert_eq!(&*opt.load(Ordering::Acquire).unwrap(), "new");
    }

    #[test]
    fn spam() {
        let opt = Arc::new(Atomic::default());

        let mut j = Vec::new();
        for _ in 0..16 {
            let opt = opt.clone();
            j.push(thread::spawn(move || {
                for i in 0..100_001 {
                    let _ = opt.load(Ordering::Acquire);
                    opt.store(Some(Box::new(i)), Ordering::Release);
                }
            }))
        }

        crate::gc();

        for i in j {
            i.join().unwrap();
        }

        assert_eq!(*opt.load(Ordering::Acquire).unwrap(), 100_000);
    }

    #[test]
    fn tls() {
        thread::spawn(|| BASIC.with(|_| {})).join().unwrap();
        thread::spawn(|| BASIC.with(|_| {})).join().unwrap();
        thread::spawn(|| BASIC.with(|_| {})).join().unwrap();
        thread::spawn(|| BASIC.with(|_| {})).join().unwrap();
    }
}
