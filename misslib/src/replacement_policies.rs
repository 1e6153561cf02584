use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// A generic trait for implementing new replacement policies. Can be used to
/// parameterise a Cache.
pub trait ReplacementPolicy {
    /// Updates the policy when a probe hits a resident way
    ///
    /// Not applicable for some policies, a default which does nothing is
    /// provided
    ///
    /// # Arguments
    ///
    /// * `set`: The set index of the hit
    /// * `way`: The way within the set which was hit
    ///
    /// returns: ()
    fn update_on_access(&mut self, _set: u32, _way: u32) {}

    /// Updates the policy when a way is filled, either into an invalid line
    /// or over an evicted one
    fn update_on_fill(&mut self, _set: u32, _way: u32) {}

    /// Picks the way to evict from a full set
    ///
    /// Never fails for a well-formed set: `ways == 0` is rejected at
    /// configuration time, so every order structure holds at least one way
    fn victim(&mut self, set: u32) -> u32;
}

/// Uniform random replacement
///
/// Keeps no per-set state; every victim is drawn fresh from the generator.
/// A fixed seed makes a run reproducible, which the tests rely on
pub struct Random {
    ways: u32,
    rng: SmallRng,
}

impl Random {
    pub fn new(ways: u32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Self { ways, rng }
    }
}

impl ReplacementPolicy for Random {
    fn victim(&mut self, _set: u32) -> u32 {
        self.rng.random_range(0..self.ways)
    }
}

/// Least recently used replacement
///
/// Each set keeps an explicit order of its way indices, most recently used
/// first. Hits and fills both move the touched way to the front; the victim
/// is the back of the order. Associativity is small, so the linear scans are
/// cheap and easy to audit
pub struct LeastRecentlyUsed {
    order: Vec<Vec<u32>>,
}

impl LeastRecentlyUsed {
    pub fn new(num_sets: u32, ways: u32) -> Self {
        Self {
            order: (0..num_sets).map(|_| (0..ways).collect()).collect(),
        }
    }

    fn touch(&mut self, set: u32, way: u32) {
        let order = &mut self.order[set as usize];
        if let Some(pos) = order.iter().position(|&w| w == way) {
            order.remove(pos);
        }
        order.insert(0, way);
    }
}

impl ReplacementPolicy for LeastRecentlyUsed {
    fn update_on_access(&mut self, set: u32, way: u32) {
        self.touch(set, way);
    }

    fn update_on_fill(&mut self, set: u32, way: u32) {
        self.touch(set, way);
    }

    fn victim(&mut self, set: u32) -> u32 {
        let order = &self.order[set as usize];
        order[order.len() - 1]
    }
}

/// First in, first out replacement
///
/// Each set keeps the fill order of its ways, oldest first. Hits never
/// reorder the queue; a fill removes any stale entry for the way before
/// pushing it to the back, so the queue always holds each way exactly once
pub struct FirstInFirstOut {
    order: Vec<Vec<u32>>,
}

impl FirstInFirstOut {
    pub fn new(num_sets: u32, ways: u32) -> Self {
        Self {
            order: (0..num_sets).map(|_| (0..ways).collect()).collect(),
        }
    }
}

impl ReplacementPolicy for FirstInFirstOut {
    fn update_on_fill(&mut self, set: u32, way: u32) {
        let order = &mut self.order[set as usize];
        order.retain(|&w| w != way);
        order.push(way);
    }

    fn victim(&mut self, set: u32) -> u32 {
        self.order[set as usize][0]
    }
}
