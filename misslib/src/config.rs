use serde::Deserialize;

use crate::error::SimError;

/// Width of a trace address in bits. Trace records are fixed 32-bit words
pub const ADDRESS_BITS: u32 = 32;

/// A configuration for a single cache, usually resulting from parsing JSON
///
/// Numeric fields are validated when deriving a [`Geometry`], not on
/// deserialisation, so a bad config is reported with the offending field
/// rather than a serde error
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub num_sets: u32,
    pub block_size: u32,
    pub ways: u32,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub output: OutputMode,
    /// Seed for the random replacement policy. Absent means seeded from the
    /// operating system; fixed seeds make runs reproducible
    #[serde(default)]
    pub seed: Option<u64>,
}

/// The replacement policy - random, lru, or fifo. Defaults to random.
///
/// The single-letter aliases are the codes the original command line tool
/// accepted
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub enum PolicyConfig {
    #[serde(alias = "R", alias = "random")]
    Random,
    #[serde(alias = "L", alias = "lru")]
    LeastRecentlyUsed,
    #[serde(alias = "F", alias = "fifo")]
    FirstInFirstOut,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::Random
    }
}

/// How the final report is rendered - a multi-line human-readable report or
/// a single comma-separated record. Defaults to verbose.
///
/// The numeric aliases mirror the original tool's output flag
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub enum OutputMode {
    #[serde(alias = "0", alias = "verbose")]
    Verbose,
    #[serde(alias = "1", alias = "compact")]
    Compact,
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Verbose
    }
}

/// The validated cache geometry, with the derived bit widths used to split
/// an address into tag, index, and offset
///
/// Constructing a `Geometry` is the validation step: every simulator is built
/// from one, so an invalid configuration can never reach the access loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub num_sets: u32,
    pub block_size: u32,
    pub ways: u32,
    pub offset_bits: u32,
    pub index_bits: u32,
    pub tag_bits: u32,
}

impl Geometry {
    /// Derives the geometry from a configuration, failing fast on invalid
    /// inputs
    ///
    /// # Arguments
    ///
    /// * `config`: The raw configuration
    ///
    /// returns: Result<Geometry, SimError>
    pub fn from_config(config: &CacheConfig) -> Result<Self, SimError> {
        if config.num_sets == 0 || !config.num_sets.is_power_of_two() {
            return Err(SimError::config(
                "num_sets",
                format!("must be a power of two >= 1, got {}", config.num_sets),
            ));
        }
        if config.block_size == 0 || !config.block_size.is_power_of_two() {
            return Err(SimError::config(
                "block_size",
                format!("must be a power of two >= 1, got {}", config.block_size),
            ));
        }
        if config.ways == 0 {
            return Err(SimError::config("ways", "must be at least 1"));
        }
        let offset_bits = config.block_size.trailing_zeros();
        let index_bits = config.num_sets.trailing_zeros();
        if offset_bits + index_bits > ADDRESS_BITS {
            return Err(SimError::config(
                "num_sets",
                format!(
                    "offset bits ({offset_bits}) plus index bits ({index_bits}) exceed the {ADDRESS_BITS}-bit address width"
                ),
            ));
        }
        Ok(Self {
            num_sets: config.num_sets,
            block_size: config.block_size,
            ways: config.ways,
            offset_bits,
            index_bits,
            tag_bits: ADDRESS_BITS - offset_bits - index_bits,
        })
    }

    /// Total line capacity of the whole cache
    pub fn total_lines(&self) -> u64 {
        self.num_sets as u64 * self.ways as u64
    }
}
