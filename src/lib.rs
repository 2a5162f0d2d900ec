//! A lock-free concurrent hash map built from copy-on-write parts.
//!
//! The map is composed of three smaller structures, which are usable on their own:
//!
//! - `AtomicCell`, a slot holding an immutable value, updated by optimistic transactions which
//!   retry when another thread got there first.
//! - `Directory`, an append-only linked list which threads can insert into without locking.
//! - `PersistentSequence`, an immutable vector whose updates return new versions sharing most of
//!   their structure with the old one.
//!
//! `ConcurrentMap` keeps a directory of buckets, each a cell holding a persistent sequence of
//! key-value pairs. Reads load the current sequence of a bucket and never wait. Writes build a new
//! sequence and publish it through the cell of the bucket.
//!
//! Superseded values are reclaimed by the `conc` crate, through hazard pointers. A guard returned
//! from a read keeps the version it was read from alive.

#[macro_use]
extern crate slog;
#[macro_use]
extern crate quick_error;

pub mod cell;
pub mod directory;
mod error;
pub mod map;
pub mod sequence;
mod settings;

#[cfg(test)]
mod tests;

pub use crate::cell::AtomicCell;
pub use crate::directory::Directory;
pub use crate::error::Error;
pub use crate::map::ConcurrentMap;
pub use crate::sequence::PersistentSequence;
pub use crate::settings::Settings;
pub use conc::Guard;
