//! Destructor accounting.
//!
//! This lives in its own test binary: hazards cached by unrelated tests of the same process
//! could otherwise hold on to some of the garbage counted here.

extern crate conc;

use conc::Atomic;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Clone)]
struct Dropper {
    d: Arc<AtomicUsize>,
}

impl Drop for Dropper {
    fn drop(&mut self) {
        self.d.fetch_add(1, Ordering::Relaxed);
    }
}

#[test]
fn every_value_is_dropped_once() {
    let drops = Arc::new(AtomicUsize::default());
    let opt = Arc::new(Atomic::new(None));

    let d = Dropper { d: drops.clone() };

    let mut j = Vec::new();
    for _ in 0..16 {
        let d = d.clone();
        let opt = opt.clone();

        j.push(thread::spawn(move || {
            for _ in 0..10_000 {
                let _ = opt.load(Ordering::Acquire);
                opt.store(Some(Box::new(d.clone())), Ordering::Release);
            }
        }))
    }

    for i in j {
        i.join().unwrap();
    }

    opt.store(None, Ordering::Release);
    drop(d);

    // The worker threads exported their garbage and killed their hazards when exiting, and the
    // main thread never created a guard.
    conc::gc();

    // The 16 are for the `d` clones moved into the workers, the 1 for `d` itself.
    assert_eq!(drops.load(Ordering::Relaxed), 16 * 10_000 + 16 + 1);
}

#[test]
fn dropping_the_option_releases_its_value() {
    let drops = Arc::new(AtomicUsize::default());

    thread::spawn({
        let drops = drops.clone();
        move || {
            let opt = Atomic::new(Some(Box::new(Dropper { d: drops })));
            drop(opt);
        }
    })
    .join()
    .unwrap();

    conc::gc();
    assert_eq!(drops.load(Ordering::Relaxed), 1);
}

#[test]
fn garbage_box_is_dropped() {
    let drops = Arc::new(AtomicUsize::default());
    let ptr = Box::into_raw(Box::new(Dropper { d: drops.clone() }));

    unsafe { conc::add_garbage_box(ptr) };
    conc::gc();

    assert_eq!(drops.load(Ordering::Relaxed), 1);
}
