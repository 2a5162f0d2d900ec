//! The global state.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::mem;
use std::panic;
use std::sync::atomic::{self, Ordering};

use crate::garbage::Garbage;
use crate::{hazard, mpsc, settings};

lazy_static! {
    /// The state shared between all threads.
    static ref STATE: State = State::new();
}

/// Create a hazard registered in the global state, returning its writer end.
pub fn create_hazard() -> hazard::Writer {
    STATE.create_hazard()
}

/// Queue garbage for the next collection.
///
/// This never collects by itself.
pub fn export_garbage(garbage: Vec<Garbage>) {
    STATE.export_garbage(garbage)
}

/// Collect, unless another thread is collecting already, in which case `Err(())` is returned.
pub fn try_gc() -> Result<(), ()> {
    STATE.try_gc()
}

/// Tick the clock, collecting with the probability given by the current settings.
pub fn tick() {
    if rand::random::<usize>() < settings::get().gc_probability {
        let _ = try_gc();
    }
}

/// A message to the collector.
enum Message {
    /// A batch of garbage.
    Garbage(Vec<Garbage>),
    /// A newly created hazard.
    NewHazard(hazard::Reader),
}

/// The global state.
///
/// Producers only touch the channel. Everything the collector needs lives in the `Garbo`, behind
/// a lock which is only ever try-locked by collectors.
struct State {
    chan: mpsc::Sender<Message>,
    garbo: Mutex<Garbo>,
}

impl State {
    fn new() -> State {
        let (send, recv) = mpsc::channel();

        State {
            chan: send,
            garbo: Mutex::new(Garbo {
                chan: recv,
                garbage: Vec::new(),
                hazards: Vec::new(),
            }),
        }
    }

    fn create_hazard(&self) -> hazard::Writer {
        let (writer, reader) = hazard::create();
        self.chan.send(Message::NewHazard(reader));

        writer
    }

    fn export_garbage(&self, garbage: Vec<Garbage>) {
        if !garbage.is_empty() {
            self.chan.send(Message::Garbage(garbage));
        }
    }

    fn try_gc(&self) -> Result<(), ()> {
        if let Some(mut garbo) = self.garbo.try_lock() {
            garbo.gc();

            Ok(())
        } else {
            Err(())
        }
    }
}

impl panic::RefUnwindSafe for State {}

/// The collecting part of the state.
struct Garbo {
    /// The receiving end of the state's channel.
    chan: mpsc::Receiver<Message>,
    /// Garbage which survived earlier collections.
    garbage: Vec<Garbage>,
    /// Every registered hazard which is not dead.
    hazards: Vec<hazard::Reader>,
}

impl Garbo {
    fn handle(&mut self, msg: Message) {
        match msg {
            Message::Garbage(mut garbage) => self.garbage.append(&mut garbage),
            Message::NewHazard(hazard) => self.hazards.push(hazard),
        }
    }

    /// Receive pending messages, then destroy all garbage not protected by a hazard.
    fn gc(&mut self) {
        for msg in self.chan.recv_all() {
            self.handle(msg);
        }

        // Hazards must be scanned strictly after the garbage was received.
        atomic::fence(Ordering::SeqCst);

        let mut active = HashSet::with_capacity(self.hazards.len());
        for hazard in mem::take(&mut self.hazards) {
            match hazard.get() {
                hazard::State::Dead => unsafe { hazard.destroy() },
                hazard::State::Free => self.hazards.push(hazard),
                hazard::State::Protect(ptr) => {
                    active.insert(ptr);
                    self.hazards.push(hazard);
                }
            }
        }

        let (keep, collect): (Vec<_>, Vec<_>) = mem::take(&mut self.garbage)
            .into_iter()
            .partition(|garbage| active.contains(&garbage.ptr()));
        self.garbage = keep;

        for garbage in collect {
            garbage.destroy();
        }
    }
}

impl Drop for Garbo {
    fn drop(&mut self) {
        self.gc();
    }
}
