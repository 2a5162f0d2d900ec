//! Errors.

quick_error! {
    /// A `cowmap` error.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Error {
        /// An index past the end of a sequence.
        OutOfBounds { index: usize, len: usize } {
            display("Index {} is out of bounds for a sequence of length {}.", index, len)
        }
        /// A map was configured without buckets.
        ///
        /// Every key must hash to some bucket, so at least one is needed.
        NoBuckets {
            display("A map needs at least one bucket.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            Error::OutOfBounds { index: 4, len: 2 }.to_string(),
            "Index 4 is out of bounds for a sequence of length 2."
        );
        assert_eq!(Error::NoBuckets.to_string(), "A map needs at least one bucket.");
    }

    #[test]
    fn is_std_error() {
        fn assert_error<E: std::error::Error + Send + Sync + 'static>(_: E) {}

        assert_error(Error::NoBuckets);
    }
}
