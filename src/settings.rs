//! Map configuration.

use std::fmt;

/// Construction-time settings of a `ConcurrentMap`.
///
/// None of these can change after the map is built; in particular, the bucket directory never
/// grows.
#[derive(Clone)]
pub struct Settings {
    /// The number of buckets.
    ///
    /// Writes to different buckets never contend, while writes to the same bucket retry against
    /// each other. The default is a single bucket.
    pub buckets: usize,
    /// The four SeaHash seeds keys are hashed with.
    ///
    /// `None` draws fresh seeds from the thread RNG. Fixed seeds make bucket placement
    /// reproducible, but hashes must still never be compared across maps or persisted.
    pub seed: Option<[u64; 4]>,
    /// The logger of the map.
    pub logger: slog::Logger,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            buckets: 1,
            seed: None,
            logger: slog::Logger::root(slog::Discard, o!()),
        }
    }
}

impl Settings {
    /// Settings for a map sharded over `buckets` buckets.
    pub fn sharded(buckets: usize) -> Settings {
        Settings {
            buckets,
            ..Settings::default()
        }
    }

    /// Use the given logger.
    pub fn with_logger(mut self, logger: slog::Logger) -> Settings {
        self.logger = logger;
        self
    }

    /// Use fixed hash seeds.
    pub fn with_seed(mut self, seed: [u64; 4]) -> Settings {
        self.seed = Some(seed);
        self
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Settings")
            .field("buckets", &self.buckets)
            .field("seed", &self.seed)
            .finish()
    }
}
