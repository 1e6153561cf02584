use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::Geometry;
use crate::replacement_policies::{FirstInFirstOut, LeastRecentlyUsed, Random, ReplacementPolicy};

/// Splits an address into its tag and set index for a given geometry
///
/// `index` is the mid-order bits above the block offset, already shifted so
/// it can be used directly as an index into a collection of sets. `tag` is
/// everything above the index. A fully associative geometry (one set, zero
/// index bits) yields index 0 for every address
///
/// Purely functional, any 32-bit input is valid
///
/// # Arguments
///
/// * `address`: The probed address
/// * `geometry`: The validated cache geometry
///
/// returns: (u32, u32)
pub fn decode(address: u32, geometry: &Geometry) -> (u32, u32) {
    let index = (address >> geometry.offset_bits) & ((1u32 << geometry.index_bits) - 1);
    let tag_shift = geometry.offset_bits + geometry.index_bits;
    // A geometry may legally consume all 32 bits, leaving an empty tag
    let tag = if tag_shift >= u32::BITS {
        0
    } else {
        address >> tag_shift
    };
    (tag, index)
}

/// The classification of a single memory access
///
/// A closed enumeration so the counter updater and the formatters must match
/// exhaustively; a new outcome cannot silently fall through unhandled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessOutcome {
    Hit,
    CompulsoryMiss,
    ConflictMiss,
    CapacityMiss,
}

impl AccessOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, AccessOutcome::Hit)
    }
}

impl fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AccessOutcome::Hit => "Hit",
            AccessOutcome::CompulsoryMiss => "Compulsory miss",
            AccessOutcome::ConflictMiss => "Conflict miss",
            AccessOutcome::CapacityMiss => "Capacity miss",
        };
        f.write_str(label)
    }
}

/// The four outcome counters for a run. Monotonically non-decreasing; exactly
/// one of them is incremented per input address
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub hits: u64,
    pub compulsory_misses: u64,
    pub capacity_misses: u64,
    pub conflict_misses: u64,
}

impl Counters {
    pub fn record(&mut self, outcome: AccessOutcome) {
        match outcome {
            AccessOutcome::Hit => self.hits += 1,
            AccessOutcome::CompulsoryMiss => self.compulsory_misses += 1,
            AccessOutcome::CapacityMiss => self.capacity_misses += 1,
            AccessOutcome::ConflictMiss => self.conflict_misses += 1,
        }
    }

    pub fn total_misses(&self) -> u64 {
        self.compulsory_misses + self.capacity_misses + self.conflict_misses
    }

    pub fn total_accesses(&self) -> u64 {
        self.hits + self.total_misses()
    }
}

/// A single cache line: the tag of the resident block, or `None` until the
/// line is first filled by a compulsory miss
#[derive(Debug, Clone, Default)]
pub struct CacheLine {
    tag: Option<u32>,
}

impl CacheLine {
    pub fn is_valid(&self) -> bool {
        self.tag.is_some()
    }

    fn fill(&mut self, tag: u32) {
        self.tag = Some(tag);
    }
}

/// One associative set: exactly `ways` lines, addressed by way index
#[derive(Debug, Clone)]
pub struct CacheSet {
    lines: Vec<CacheLine>,
}

impl CacheSet {
    fn new(ways: u32) -> Self {
        Self {
            lines: vec![CacheLine::default(); ways as usize],
        }
    }

    fn find(&self, tag: u32) -> Option<u32> {
        self.lines
            .iter()
            .position(|line| line.tag == Some(tag))
            .map(|way| way as u32)
    }

    fn first_invalid(&self) -> Option<u32> {
        self.lines
            .iter()
            .position(|line| !line.is_valid())
            .map(|way| way as u32)
    }

    fn valid_lines(&self) -> u64 {
        self.lines.iter().filter(|line| line.is_valid()).count() as u64
    }

    /// Classifies one probe against this set and applies its side effects
    ///
    /// The rule is evaluated strictly in this order: hit, then fill of the
    /// lowest invalid way (compulsory miss), then eviction. An eviction is a
    /// capacity miss when the whole cache is already full and a conflict miss
    /// otherwise, which is why whole-cache fullness is an input here rather
    /// than derived from the set
    ///
    /// # Arguments
    ///
    /// * `index`: This set's index, passed through to the policy bookkeeping
    /// * `tag`: The probe tag
    /// * `cache_is_full`: Whether every line in the whole cache is valid
    /// * `policy`: The replacement policy consulted on eviction
    ///
    /// returns: AccessOutcome
    fn access<R: ReplacementPolicy>(
        &mut self,
        index: u32,
        tag: u32,
        cache_is_full: bool,
        policy: &mut R,
    ) -> AccessOutcome {
        if let Some(way) = self.find(tag) {
            policy.update_on_access(index, way);
            return AccessOutcome::Hit;
        }
        if let Some(way) = self.first_invalid() {
            self.lines[way as usize].fill(tag);
            policy.update_on_fill(index, way);
            return AccessOutcome::CompulsoryMiss;
        }
        let way = policy.victim(index);
        self.lines[way as usize].fill(tag);
        policy.update_on_fill(index, way);
        if cache_is_full {
            AccessOutcome::CapacityMiss
        } else {
            AccessOutcome::ConflictMiss
        }
    }
}

/// A generic trait for miss-classifying caches
///
/// Technically not required as we're using static dispatch to speed things up
/// instead of dyn Cache, but this gives flexibility for the future with no
/// overhead
pub trait CacheTrait {
    /// Converts an address into a tag and a set index, per the cache geometry
    fn decode(&self, address: u32) -> (u32, u32);

    /// Probes the cache with one address and classifies the access
    ///
    /// On every outcome other than a hit the probed set is mutated: a miss
    /// fills an invalid line or overwrites the policy's victim, and the
    /// relevant counter is incremented
    ///
    /// # Arguments
    ///
    /// * `address`: The probed address
    ///
    /// returns: AccessOutcome
    fn access(&mut self, address: u32) -> AccessOutcome;

    /// Gets the outcome counters accumulated so far
    fn counters(&self) -> &Counters;

    /// Gets the validated geometry this cache was built from
    fn geometry(&self) -> &Geometry;

    /// Gets the number of lines currently holding a block, bounded by the
    /// total line capacity. Useful for analysing cache performance or
    /// debugging
    fn occupied_lines(&self) -> u64;
}

/// A generic cache implementation, parameterised by a replacement policy
///
/// The general approach here is to have one solid implementation which is
/// easy to maintain and expand with more replacement policies without
/// compromising too much on performance
///
/// To facilitate this we rely on Rust's monomorphisation and the inlining of
/// the replacement policy functions, which should be close to on par with
/// writing specialised implementations for each policy
pub struct Cache<R: ReplacementPolicy> {
    geometry: Geometry,
    sets: Vec<CacheSet>,
    occupied_lines: u64,
    counters: Counters,
    replacement_policy: R,
}

impl<R: ReplacementPolicy> Cache<R> {
    pub fn new(geometry: Geometry, policy: R) -> Self {
        Self {
            sets: vec![CacheSet::new(geometry.ways); geometry.num_sets as usize],
            occupied_lines: 0,
            counters: Counters::default(),
            replacement_policy: policy,
            geometry,
        }
    }
}

impl<R: ReplacementPolicy> CacheTrait for Cache<R> {
    fn decode(&self, address: u32) -> (u32, u32) {
        decode(address, &self.geometry)
    }

    fn access(&mut self, address: u32) -> AccessOutcome {
        let (tag, index) = self.decode(address);
        let cache_is_full = self.occupied_lines == self.geometry.total_lines();
        let outcome = self.sets[index as usize].access(
            index,
            tag,
            cache_is_full,
            &mut self.replacement_policy,
        );
        // Only a compulsory miss claims a previously invalid line
        if outcome == AccessOutcome::CompulsoryMiss {
            self.occupied_lines += 1;
        }
        self.counters.record(outcome);
        outcome
    }

    fn counters(&self) -> &Counters {
        &self.counters
    }

    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    fn occupied_lines(&self) -> u64 {
        debug_assert_eq!(
            self.occupied_lines,
            self.sets.iter().map(CacheSet::valid_lines).sum::<u64>()
        );
        self.occupied_lines
    }
}

/// Enum for the three policy instantiations provided by the library
///
/// Using trait objects in Rust reduces boilerplate, but it is surprisingly
/// slow, as this is completely opaque to the compiler
///
/// For most cases this isn't an issue, but for our use case we would be
/// de-referencing for each record in the input trace, which imposes
/// significant overhead
///
/// It's much faster to explicitly branch on all implementations, as the
/// compiler can reason about the concrete types, perform function inlining
/// etc
pub enum GenericCache {
    Random(Cache<Random>),
    LeastRecentlyUsed(Cache<LeastRecentlyUsed>),
    FirstInFirstOut(Cache<FirstInFirstOut>),
}

impl From<Cache<Random>> for GenericCache {
    fn from(value: Cache<Random>) -> Self {
        Self::Random(value)
    }
}

impl From<Cache<LeastRecentlyUsed>> for GenericCache {
    fn from(value: Cache<LeastRecentlyUsed>) -> Self {
        Self::LeastRecentlyUsed(value)
    }
}

impl From<Cache<FirstInFirstOut>> for GenericCache {
    fn from(value: Cache<FirstInFirstOut>) -> Self {
        Self::FirstInFirstOut(value)
    }
}

impl CacheTrait for GenericCache {
    fn decode(&self, address: u32) -> (u32, u32) {
        match self {
            GenericCache::Random(c) => c.decode(address),
            GenericCache::LeastRecentlyUsed(c) => c.decode(address),
            GenericCache::FirstInFirstOut(c) => c.decode(address),
        }
    }

    fn access(&mut self, address: u32) -> AccessOutcome {
        match self {
            GenericCache::Random(c) => c.access(address),
            GenericCache::LeastRecentlyUsed(c) => c.access(address),
            GenericCache::FirstInFirstOut(c) => c.access(address),
        }
    }

    fn counters(&self) -> &Counters {
        match self {
            GenericCache::Random(c) => c.counters(),
            GenericCache::LeastRecentlyUsed(c) => c.counters(),
            GenericCache::FirstInFirstOut(c) => c.counters(),
        }
    }

    fn geometry(&self) -> &Geometry {
        match self {
            GenericCache::Random(c) => c.geometry(),
            GenericCache::LeastRecentlyUsed(c) => c.geometry(),
            GenericCache::FirstInFirstOut(c) => c.geometry(),
        }
    }

    fn occupied_lines(&self) -> u64 {
        match self {
            GenericCache::Random(c) => c.occupied_lines(),
            GenericCache::LeastRecentlyUsed(c) => c.occupied_lines(),
            GenericCache::FirstInFirstOut(c) => c.occupied_lines(),
        }
    }
}
