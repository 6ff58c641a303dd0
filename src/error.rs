//! Error types for the `sparse-cells` crate

/// Errors reported by [`SparseMemoryTable`](crate::SparseMemoryTable) operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// `remove` was called for a location that has no materialized cell.
    #[error("no cell materialized at location {location:#x}")]
    NotFound {
        /// The location that was looked up.
        location: u64,
    },

    /// A bucket chain holds a cell that breaks the reachability invariants.
    ///
    /// Every cell must live in the bucket its location hashes to, and each
    /// location may be materialized at most once.
    #[error("bucket {bucket} is corrupted at location {location:#x}: {reason}")]
    Corrupted {
        /// Index of the bucket whose chain holds the offending cell.
        bucket: usize,
        /// Location stored in the offending cell.
        location: u64,
        /// What is wrong with the cell.
        reason: Corruption,
    },

    /// The tracked cell count disagrees with the number of reachable cells.
    #[error("table records {recorded} cells but {reachable} are reachable")]
    LengthMismatch {
        /// Count maintained by insert/remove.
        recorded: usize,
        /// Count found by walking every chain.
        reachable: usize,
    },

    /// The table configuration cannot be used.
    #[error("invalid table configuration: {0}")]
    InvalidConfig(&'static str),

    /// Writing a range dump failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The kind of chain corruption found by [`SparseMemoryTable::verify`](crate::SparseMemoryTable::verify).
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Corruption {
    /// The cell's location hashes to a different bucket.
    #[error("cell belongs in bucket {expected}")]
    Misplaced {
        /// The bucket the location hashes to.
        expected: usize,
    },

    /// Another cell for the same location was already reached.
    #[error("location is materialized more than once")]
    Duplicate,
}

/// Result type for table operations.
pub type Result<T> = std::result::Result<T, Error>;
