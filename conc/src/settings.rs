//! Settings and presets.

use std::cell::Cell;

thread_local! {
    /// The settings for the current thread.
    static LOCAL_SETTINGS: Cell<Settings> = Cell::new(Settings::default());
}

/// Settings for the collector, as seen from one thread.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Settings {
    /// The probability of collecting when ticking.
    ///
    /// Every tick draws a random `usize` and collects if it is below this. `0` is never, `!0` is
    /// nearly always.
    pub gc_probability: usize,
    /// The maximal amount of thread-local garbage before it is exported to the global queue.
    pub max_garbage_before_export: usize,
    /// The maximal amount of cached hazards still protecting their last object.
    ///
    /// Cached hazards are not freed on release, to save a store. When this many pile up, they
    /// are all freed, unblocking collection of what they protect.
    pub max_non_free_hazards: usize,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            gc_probability: (!0) / 128,
            max_garbage_before_export: 64,
            max_non_free_hazards: 16,
        }
    }
}

impl Settings {
    /// Preset for low memory, high CPU usage.
    pub fn low_memory() -> Settings {
        Settings {
            gc_probability: (!0) / 32,
            max_garbage_before_export: 16,
            max_non_free_hazards: 4,
        }
    }

    /// Preset for high memory, low CPU usage.
    pub fn low_cpu() -> Settings {
        Settings {
            gc_probability: (!0) / 256,
            max_garbage_before_export: 128,
            max_non_free_hazards: 32,
        }
    }

    /// Never collect automatically from this thread.
    ///
    /// Garbage is still exported, and collected by other threads or by `conc::gc()`.
    pub fn disable_automatic_gc(&mut self) {
        self.gc_probability = 0;
    }

    /// Never export garbage automatically from this thread.
    ///
    /// Garbage stays cached until `conc::gc()`, `conc::try_gc()` or thread exit.
    pub fn disable_automatic_export(&mut self) {
        self.max_garbage_before_export = !0;
    }
}

/// Get the settings of the current thread.
///
/// During thread teardown, the defaults are returned.
pub fn get() -> Settings {
    LOCAL_SETTINGS.try_with(Cell::get).unwrap_or_default()
}

/// Set the settings of the current thread.
///
/// This does not affect other threads; call it at the start of every thread that should use
/// `settings`.
pub fn set_local(settings: Settings) {
    LOCAL_SETTINGS.with(|x| x.set(settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::garbage::Garbage;
    use crate::local;
    use std::thread;

    #[test]
    fn set_get() {
        thread::spawn(|| {
            set_local(Settings {
                max_garbage_before_export: 22,
                ..Default::default()
            });
            assert_eq!(get().max_garbage_before_export, 22);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn default() {
        thread::spawn(|| {
            assert_eq!(get(), Settings::default());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn disable_automatic_export() {
        thread::spawn(|| {
            fn dtor(x: *const u8) {
                unsafe {
                    *(x as *mut u8) = 1;
                }
            }

            let mut settings = get();
            settings.disable_automatic_export();
            set_local(settings);

            let boxes: Vec<Box<u8>> = (0..1000).map(|_| Box::new(0)).collect();
            for b in &boxes {
                local::add_garbage(Garbage::new(&**b, dtor));
            }

            // Nothing left the thread, so nothing can have been destroyed.
            assert!(boxes.iter().all(|b| **b == 0));

            crate::gc();
            assert!(boxes.iter().all(|b| **b == 1));
        })
        .join()
        .unwrap();
    }

    #[test]
    fn compare_presets() {
        let low = Settings::low_memory();
        let high = Settings::low_cpu();

        assert!(low.gc_probability > high.gc_probability);
        assert!(high.max_garbage_before_export > low.max_garbage_before_export);
        assert!(high.max_non_free_hazards > low.max_non_free_hazards);
    }
}
