//! Error types shared by the allocators and containers.
//!
//! Allocation failures are ordinary values: every fallible path returns
//! [`AllocError`] to the immediate caller and nothing retries internally.
//! Precondition violations (zero-sized pools, out-of-bounds slice indexing)
//! panic instead and have no type here.

use thiserror::Error;

/// The allocator could not satisfy a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// No depth level of a multipool serves blocks of exactly this size.
    #[error("no size class serves {size}-byte blocks")]
    NoSizeClass {
        /// Requested size in bytes.
        size: usize,
    },
    /// The free list for the matching size class is empty.
    #[error("size class of {size} bytes is exhausted")]
    Exhausted {
        /// Block size of the exhausted class.
        size: usize,
    },
    /// The requested alignment exceeds what the allocator guarantees.
    #[error("alignment {align} exceeds the supported maximum of {max}")]
    UnsupportedAlignment {
        /// Requested alignment.
        align: usize,
        /// Largest alignment the allocator hands out.
        max: usize,
    },
    /// The underlying system allocator returned null.
    #[error("system allocator failed to provide {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes.
        size: usize,
    },
    /// A requested capacity does not fit in the address space.
    #[error("capacity overflow")]
    CapacityOverflow,
}

/// A bounds-checked accessor was given an index past the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("index {index} out of range for length {len}")]
pub struct OutOfRange {
    /// The rejected index.
    pub index: usize,
    /// Length of the container at the time of the access.
    pub len: usize,
}

/// A multipool configuration was rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A parameter that must be nonzero was zero.
    #[error("`{0}` must be nonzero")]
    Zero(&'static str),
    /// The deepest level would serve zero-byte blocks.
    #[error("block size {block_size} cannot be halved {halvings} times")]
    DepthTooLarge {
        /// Configured base block size.
        block_size: usize,
        /// Number of halvings the deepest level needs.
        halvings: usize,
    },
    /// The pools do not fit in the address space.
    #[error("pool layout overflows the address space")]
    Overflow,
    /// The configuration text could not be parsed.
    #[error("malformed multipool configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// See [`AllocError`].
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// See [`OutOfRange`].
    #[error(transparent)]
    OutOfRange(#[from] OutOfRange),
    /// See [`ConfigError`].
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

/// Panics with the "bad allocation" message used by the infallible container APIs.
#[cold]
#[inline(never)]
#[track_caller]
pub(crate) fn bad_alloc(err: AllocError) -> ! {
    panic!("bad allocation: {err}")
}
