//! The concurrent map.

use std::borrow::Borrow;
use std::cell::Cell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;
use std::sync::Arc;

use conc::Guard;
use seahash::SeaHasher;

use crate::{AtomicCell, Directory, Error, PersistentSequence, Settings};

/// A key-value pair.
///
/// Pairs are shared between the versions of a bucket, so a replaced value stays readable for as
/// long as some version refers to it.
struct Pair<K, V> {
    key: K,
    value: V,
}

/// The content of a bucket.
type Entries<K, V> = PersistentSequence<Arc<Pair<K, V>>>;

/// A bucket.
///
/// Keys are unique within a bucket, and keep their position when their value is replaced.
struct Bucket<K: 'static, V: 'static> {
    entries: AtomicCell<Entries<K, V>>,
}

impl<K: 'static, V: 'static> Bucket<K, V> {
    fn new() -> Bucket<K, V> {
        Bucket {
            entries: AtomicCell::new(PersistentSequence::new()),
        }
    }
}

/// A lock-free concurrent hash map.
///
/// Keys are hashed into a fixed set of buckets. Each bucket holds an immutable sequence of pairs
/// in a transactional cell: readers load the current sequence and never wait, and writers build a
/// new sequence and publish it, retrying if another writer to the same bucket came first.
///
/// There is no removal. Values read from the map stay valid after they are overwritten, as the
/// guard returned by `get` keeps the version they were read from alive.
pub struct ConcurrentMap<K: 'static, V: 'static> {
    /// The buckets.
    ///
    /// These are all inserted at construction.
    buckets: Directory<Bucket<K, V>>,
    /// The SeaHash seeds of this map.
    seed: [u64; 4],
    /// The logger.
    logger: slog::Logger,
}

impl<K: 'static, V: 'static> ConcurrentMap<K, V> {
    /// Create an empty map with a single bucket.
    pub fn new() -> ConcurrentMap<K, V> {
        match ConcurrentMap::with_settings(Settings::default()) {
            Ok(map) => map,
            Err(_) => unreachable!(),
        }
    }

    /// Create an empty map with the given settings.
    ///
    /// This fails if `settings.buckets` is zero.
    pub fn with_settings(settings: Settings) -> Result<ConcurrentMap<K, V>, Error> {
        if settings.buckets == 0 {
            return Err(Error::NoBuckets);
        }

        debug!(settings.logger, "creating map"; "buckets" => settings.buckets);

        let buckets = Directory::new();
        for _ in 0..settings.buckets {
            buckets.insert(Bucket::new());
        }

        Ok(ConcurrentMap {
            buckets,
            seed: settings.seed.unwrap_or_else(rand::random),
            logger: settings.logger,
        })
    }

    /// The number of buckets.
    ///
    /// This is fixed at construction. The map does not count its pairs.
    pub fn buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Call `f` on every pair.
    ///
    /// Buckets are read one at a time, each at the moment it is visited, so writes happening
    /// meanwhile may or may not be seen.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for bucket in &self.buckets {
            let entries = bucket.entries.get();
            for pair in entries.iter() {
                f(&pair.key, &pair.value);
            }
        }
    }

    /// Hash a key with the seeds of this map.
    fn hash<Q: ?Sized + Hash>(&self, key: &Q) -> u64 {
        let [k1, k2, k3, k4] = self.seed;
        let mut hasher = SeaHasher::with_seeds(k1, k2, k3, k4);
        key.hash(&mut hasher);
        hasher.finish()
    }

    /// Find the index of the bucket of some key.
    pub(crate) fn bucket_index<Q: ?Sized + Hash>(&self, key: &Q) -> usize {
        (self.hash(key) % self.buckets.len() as u64) as usize
    }

    /// Find the bucket of some key.
    fn bucket<Q: ?Sized + Hash>(&self, key: &Q) -> (usize, &Bucket<K, V>) {
        let index = self.bucket_index(key);
        match self.buckets.get(index) {
            Some(bucket) => (index, bucket),
            None => unreachable!("Bucket index past the end of the directory."),
        }
    }
}

impl<K: 'static + Hash + Eq, V: 'static> ConcurrentMap<K, V> {
    /// Associate `value` with `key`.
    ///
    /// If the key is already present, its value is replaced in place. Concurrent writes to the
    /// same bucket are linearized.
    pub fn set(&self, key: K, value: V) {
        let (index, bucket) = self.bucket(&key);
        let pair = Arc::new(Pair { key, value });
        // Outcome of the last attempt, for logging.
        let replaced = Cell::new(false);

        let retries = bucket.entries.transact(|entries| {
            let position = entries.iter().position(|x| x.key == pair.key);
            replaced.set(position.is_some());

            Some(match position {
                Some(i) => match entries.set(i, pair.clone()) {
                    Ok(entries) => entries,
                    Err(_) => unreachable!(),
                },
                None => entries.push(pair.clone()),
            })
        });

        trace!(self.logger, "set key"; "bucket" => index, "replaced" => replaced.get());
        if retries > 0 {
            trace!(self.logger, "bucket was contended"; "bucket" => index, "retries" => retries);
        }
    }

    /// Get the value of `key`.
    ///
    /// The returned guard keeps the value alive (and unchanged), even if it is overwritten in the
    /// meantime.
    pub fn get<Q: ?Sized>(&self, key: &Q) -> Option<Guard<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        let (_, bucket) = self.bucket(key);
        bucket.entries.get().maybe_map(|entries| {
            entries
                .iter()
                .find(|x| Borrow::<Q>::borrow(&x.key) == key)
                .map(|x| &x.value)
        })
    }

    /// Does the map contain `key`?
    pub fn contains_key<Q: ?Sized>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq,
    {
        let (_, bucket) = self.bucket(key);
        bucket.entries.get().iter().any(|x| Borrow::<Q>::borrow(&x.key) == key)
    }
}

impl<K: 'static + Clone, V: 'static + Clone> ConcurrentMap<K, V> {
    /// Iterate over clones of the pairs.
    ///
    /// Like `for_each`, this reads one bucket at a time and takes no snapshot of the whole map.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: self.buckets.iter(),
            entries: None,
            index: 0,
        }
    }
}

impl<K: 'static, V: 'static> Default for ConcurrentMap<K, V> {
    fn default() -> ConcurrentMap<K, V> {
        ConcurrentMap::new()
    }
}

impl<K: 'static + Hash + Eq, V: 'static> FromIterator<(K, V)> for ConcurrentMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> ConcurrentMap<K, V> {
        let map = ConcurrentMap::new();
        for (key, value) in iter {
            map.set(key, value);
        }

        map
    }
}

impl<'a, K: 'static + Hash + Eq, V: 'static> Extend<(K, V)> for &'a ConcurrentMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

impl<K: 'static + fmt::Debug, V: 'static + fmt::Debug> fmt::Debug for ConcurrentMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut map = f.debug_map();
        self.for_each(|key, value| {
            map.entry(key, value);
        });

        map.finish()
    }
}

/// An iterator over the pairs of a map.
pub struct Iter<'a, K: 'static, V: 'static> {
    /// The buckets not yet visited.
    buckets: crate::directory::Iter<'a, Bucket<K, V>>,
    /// The entries of the bucket being visited.
    entries: Option<Guard<Entries<K, V>>>,
    /// The index of the next pair in `entries`.
    index: usize,
}

impl<'a, K: 'static + Clone, V: 'static + Clone> Iterator for Iter<'a, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        loop {
            if let Some(ref entries) = self.entries {
                if let Some(pair) = entries.get(self.index) {
                    self.index += 1;
                    return Some((pair.key.clone(), pair.value.clone()));
                }
            }

            let bucket = self.buckets.next()?;
            self.entries = Some(bucket.entries.get());
            self.index = 0;
        }
    }
}
