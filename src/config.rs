//! Construction parameters for [`MultipoolAllocator`](crate::alloc::MultipoolAllocator).

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Shape of a multipool: `pool_depth` levels where level `i` holds
/// `block_count << i` blocks of `block_size >> i` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MultipoolConfig {
    /// Number of blocks at depth 0.
    pub block_count: usize,
    /// Block size in bytes at depth 0.
    pub block_size: usize,
    /// Number of size classes.
    pub pool_depth: usize,
}

impl MultipoolConfig {
    /// Bundles the three parameters without validating them.
    pub const fn new(block_count: usize, block_size: usize, pool_depth: usize) -> Self {
        Self {
            block_count,
            block_size,
            pool_depth,
        }
    }

    /// Parses a JSON object such as
    /// `{"block_count": 4, "block_size": 64, "pool_depth": 1}` and validates it.
    ///
    /// # Errors
    /// [`ConfigError::Parse`] for malformed text, otherwise whatever
    /// [`validate`](Self::validate) reports.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every parameter is nonzero and that the deepest class
    /// still has a nonzero block size.
    ///
    /// # Errors
    /// [`ConfigError::Zero`] or [`ConfigError::DepthTooLarge`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_count == 0 {
            return Err(ConfigError::Zero("block_count"));
        }
        if self.block_size == 0 {
            return Err(ConfigError::Zero("block_size"));
        }
        if self.pool_depth == 0 {
            return Err(ConfigError::Zero("pool_depth"));
        }
        let halvings = self.pool_depth - 1;
        let smallest = u32::try_from(halvings)
            .ok()
            .and_then(|shift| self.block_size.checked_shr(shift))
            .unwrap_or(0);
        if smallest == 0 {
            return Err(ConfigError::DepthTooLarge {
                block_size: self.block_size,
                halvings,
            });
        }
        Ok(())
    }

    /// Block size served at `depth`.
    #[inline]
    pub const fn class_size(&self, depth: usize) -> usize {
        self.block_size >> depth
    }

    /// Number of blocks carved for `depth`, or `None` on overflow.
    #[inline]
    pub fn class_count(&self, depth: usize) -> Option<usize> {
        let factor = 1usize.checked_shl(u32::try_from(depth).ok()?)?;
        self.block_count.checked_mul(factor)
    }
}
