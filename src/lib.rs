//! # sparse-cells
//!
//! A sparse, address-indexed memory cell store. Maps 64-bit locations to
//! 32-bit values so an interpreter or simulator can address a space far
//! larger than any dense array, paying only for the locations it touches.
//! Untouched locations read as `0`.
//!
//! Storage is a fixed array of buckets; each bucket is a singly linked chain
//! of cells whose locations share `location % bucket_count`.
//!
//! ## Example
//!
//! ```rust
//! use sparse_cells::SparseMemoryTable;
//!
//! let mut mem = SparseMemoryTable::new();
//! mem.insert(10, 5);
//! mem.insert(42, 7);
//! mem.insert(10, 9);
//!
//! assert_eq!(mem.lookup(10), 9);
//! assert_eq!(mem.lookup(42), 7);
//! assert_eq!(mem.lookup(11), 0);
//! assert_eq!(mem.remove(42).unwrap(), 7);
//! assert!(mem.remove(42).is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cell;
mod error;

use std::collections::HashSet;
use std::fmt;
use std::io::Write;

use tracing::{debug, error, trace};

use cell::{Bucket, Node};

pub use cell::CellMut;
pub use error::{Corruption, Error, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Number of buckets in a default table.
pub const BUCKET_COUNT: usize = 32;

/// The value read from any location without a materialized cell.
pub const DEFAULT_VALUE: u32 = 0;

/// Canonical bucket selection for a default table: `location % BUCKET_COUNT`.
#[inline]
pub const fn bucket_index(location: u64) -> usize {
    hash_location(location, BUCKET_COUNT)
}

#[inline]
const fn hash_location(location: u64, bucket_count: usize) -> usize {
    (location % bucket_count as u64) as usize
}

/// Configuration for a [`SparseMemoryTable`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of bucket chains. Fixed for the lifetime of the table.
    pub bucket_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket_count: BUCKET_COUNT,
        }
    }
}

impl Config {
    fn validate(&self) -> Result<()> {
        if self.bucket_count == 0 {
            return Err(Error::InvalidConfig("bucket_count must be at least 1"));
        }
        Ok(())
    }
}

/// Aggregate load information for a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableStats {
    /// Number of materialized cells.
    pub cells: usize,
    /// Number of bucket chains.
    pub buckets: usize,
    /// Buckets holding at least one cell.
    pub occupied_buckets: usize,
    /// Length of the longest chain.
    pub longest_chain: usize,
    /// Approximate heap bytes, see [`SparseMemoryTable::memory_usage`].
    pub memory_bytes: usize,
}

// =============================================================================
// Table
// =============================================================================

/// A sparse memory: fixed bucket chains of `(location, value)` cells.
///
/// Reads never allocate; only [`insert`](Self::insert) and
/// [`ensure_range`](Self::ensure_range) materialize cells.
pub struct SparseMemoryTable {
    buckets: Box<[Bucket]>,
    len: usize,
}

impl SparseMemoryTable {
    /// Create an empty table with [`BUCKET_COUNT`] buckets.
    pub fn new() -> Self {
        Self::with_buckets(BUCKET_COUNT)
    }

    /// Create an empty table with the given configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_buckets(config.bucket_count))
    }

    fn with_buckets(bucket_count: usize) -> Self {
        debug!(buckets = bucket_count, "sparse memory table initialized");
        Self {
            buckets: (0..bucket_count).map(|_| Bucket::new()).collect(),
            len: 0,
        }
    }

    #[inline]
    fn bucket_of(&self, location: u64) -> usize {
        hash_location(location, self.buckets.len())
    }

    /// Number of materialized cells.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no location is materialized.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of bucket chains.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Materialize `location` holding `value`.
    ///
    /// An existing cell is overwritten in place; otherwise a new cell is
    /// appended to the tail of the location's bucket. Returns a handle to
    /// the cell.
    pub fn insert(&mut self, location: u64, value: u32) -> CellMut<'_> {
        let idx = self.bucket_of(location);
        let (cell, created) = self.buckets[idx].upsert(location, value);
        if created {
            self.len += 1;
            trace!(location, value, bucket = idx, "cell materialized");
        }
        cell
    }

    /// Read `location`, returning [`DEFAULT_VALUE`] if it was never materialized.
    pub fn lookup(&self, location: u64) -> u32 {
        self.get(location).unwrap_or(DEFAULT_VALUE)
    }

    /// Read `location` only if it is materialized.
    ///
    /// Unlike [`lookup`](Self::lookup) this tells an absent location apart
    /// from one explicitly holding zero.
    pub fn get(&self, location: u64) -> Option<u32> {
        self.buckets[self.bucket_of(location)]
            .find(location)
            .map(Node::value)
    }

    /// True if `location` has a materialized cell.
    pub fn contains(&self, location: u64) -> bool {
        self.get(location).is_some()
    }

    /// Release the cell for `location` and return the value it held.
    ///
    /// Fails with [`Error::NotFound`] if `location` is not materialized.
    pub fn remove(&mut self, location: u64) -> Result<u32> {
        let idx = self.bucket_of(location);
        match self.buckets[idx].unlink(location) {
            Some(value) => {
                self.len -= 1;
                trace!(location, bucket = idx, "cell removed");
                Ok(value)
            }
            None => {
                debug!(location, bucket = idx, "remove of absent location");
                Err(Error::NotFound { location })
            }
        }
    }

    /// Read `location` and reset it to zero.
    ///
    /// A materialized cell keeps its slot and now holds zero. An absent
    /// location reads as zero and stays absent.
    pub fn take(&mut self, location: u64) -> u32 {
        let idx = self.bucket_of(location);
        self.buckets[idx]
            .find_mut(location)
            .map_or(DEFAULT_VALUE, |mut cell| cell.set(DEFAULT_VALUE))
    }

    /// Materialize an explicit zero cell at every location in
    /// `[location, location + length)` that currently reads as zero.
    ///
    /// Locations wrap at `u64::MAX`. Returns the number of cells created.
    pub fn ensure_range(&mut self, location: u64, length: u64) -> usize {
        let before = self.len;
        for offset in 0..length {
            let at = location.wrapping_add(offset);
            if self.lookup(at) == DEFAULT_VALUE {
                self.insert(at, DEFAULT_VALUE);
            }
        }
        let created = self.len - before;
        debug!(location, length, created, "range materialized");
        created
    }

    /// Render `length` consecutive values starting at `location`, each
    /// followed by a space, with a trailing newline.
    ///
    /// Reads through [`lookup`](Self::lookup), so nothing is materialized.
    pub fn dump_range(&self, location: u64, length: u64) -> String {
        let mut out = String::new();
        for offset in 0..length {
            out.push_str(&self.lookup(location.wrapping_add(offset)).to_string());
            out.push(' ');
        }
        out.push('\n');
        out
    }

    /// Write the [`dump_range`](Self::dump_range) rendering to `out`.
    pub fn write_range<W: Write>(&self, out: &mut W, location: u64, length: u64) -> Result<()> {
        for offset in 0..length {
            write!(out, "{} ", self.lookup(location.wrapping_add(offset)))?;
        }
        writeln!(out)?;
        Ok(())
    }

    /// Release every cell and leave the table empty.
    ///
    /// The table stays usable afterwards; [`init`](Self::init) is not required
    /// but is harmless. Returns the number of cells released.
    pub fn teardown(&mut self) -> usize {
        let bucket_count = self.buckets.len();
        let mut released = 0;
        for (idx, bucket) in self.buckets.iter_mut().enumerate() {
            released += bucket.release(|node| {
                let expected = hash_location(node.location(), bucket_count);
                if expected != idx {
                    error!(
                        bucket = idx,
                        expected,
                        location = node.location(),
                        "misplaced cell released during teardown"
                    );
                    debug_assert_eq!(expected, idx, "misplaced cell in bucket chain");
                }
            });
        }
        if released != self.len {
            error!(recorded = self.len, released, "cell count drifted before teardown");
            debug_assert_eq!(released, self.len, "cell count drifted before teardown");
        }
        self.len = 0;
        debug!(released, "sparse memory table torn down");
        released
    }

    /// Reset the table to empty, releasing any cells it still owns.
    pub fn init(&mut self) {
        self.teardown();
    }

    /// Walk every chain and check the reachability invariants: each cell is
    /// in the bucket its location hashes to, no location appears twice, and
    /// the reachable count matches [`len`](Self::len).
    pub fn verify(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.len);
        for (idx, bucket) in self.buckets.iter().enumerate() {
            for cell in bucket.cells() {
                let location = cell.location();
                let expected = self.bucket_of(location);
                if expected != idx {
                    return Err(Error::Corrupted {
                        bucket: idx,
                        location,
                        reason: Corruption::Misplaced { expected },
                    });
                }
                if !seen.insert(location) {
                    return Err(Error::Corrupted {
                        bucket: idx,
                        location,
                        reason: Corruption::Duplicate,
                    });
                }
            }
        }
        if seen.len() != self.len {
            return Err(Error::LengthMismatch {
                recorded: self.len,
                reachable: seen.len(),
            });
        }
        Ok(())
    }

    /// Approximate heap bytes held: the bucket array plus one boxed cell per
    /// materialized location.
    pub fn memory_usage(&self) -> usize {
        self.buckets.len() * std::mem::size_of::<Bucket>() + self.len * std::mem::size_of::<Node>()
    }

    /// Aggregate load information.
    pub fn stats(&self) -> TableStats {
        let mut stats = TableStats {
            cells: self.len,
            buckets: self.buckets.len(),
            memory_bytes: self.memory_usage(),
            ..TableStats::default()
        };
        for bucket in self.buckets.iter().filter(|b| !b.is_empty()) {
            stats.occupied_buckets += 1;
            stats.longest_chain = stats.longest_chain.max(bucket.cells().count());
        }
        stats
    }
}

impl Default for SparseMemoryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SparseMemoryTable {
    fn clone(&self) -> Self {
        Self {
            buckets: self.buckets.clone(),
            len: self.len,
        }
    }
}

impl fmt::Debug for SparseMemoryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseMemoryTable")
            .field("len", &self.len)
            .field("buckets", &self.buckets.len())
            .finish()
    }
}


#[cfg(test)]
mod proptests;
