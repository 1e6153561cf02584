use std::io::Write;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::cache::{Cache, CacheTrait, Counters, GenericCache};
use crate::config::{CacheConfig, Geometry, OutputMode, PolicyConfig};
use crate::error::SimError;
use crate::replacement_policies::{FirstInFirstOut, LeastRecentlyUsed, Random};
use crate::stats::Statistics;

/// The simulator drives a cache over a trace of addresses and collects the
/// aggregate results
///
/// It supports calling simulate multiple times against the same cache state,
/// and will update the time taken to simulate and the results accordingly
pub struct Simulator {
    cache: GenericCache,
    simulation_time: Duration,
    log: Option<Box<dyn Write>>,
    log_error: Option<SimError>,
}

/// The result of a run: the raw counters plus the derived statistics. Can be
/// serialised for snapshot comparisons in tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub counters: Counters,
    pub statistics: Statistics,
}

impl Report {
    pub fn render(&self, mode: OutputMode) -> String {
        self.statistics.render(mode)
    }
}

impl Simulator {
    /// Creates a new simulator for a given configuration
    ///
    /// The geometry is validated here, so an invalid configuration fails
    /// before any address is processed
    ///
    /// # Arguments
    ///
    /// * `config`: A cache configuration, usually resulting from parsing JSON
    ///
    /// returns: Result<Simulator, SimError>
    pub fn new(config: &CacheConfig) -> Result<Self, SimError> {
        let geometry = Geometry::from_config(config)?;
        Ok(Self {
            cache: Self::config_to_cache(geometry, config),
            simulation_time: Duration::new(0, 0),
            log: None,
            log_error: None,
        })
    }

    /// Attaches a debug log sink which receives one textual record per access
    /// with fields `address, tag, index, outcome`
    ///
    /// The sink is optional and best effort: a write failure is recorded and
    /// disables further logging, but never aborts the simulation
    pub fn set_log_sink(&mut self, sink: Box<dyn Write>) {
        self.log = Some(sink);
    }

    /// The error that disabled the log sink mid-run, if any
    pub fn log_error(&self) -> Option<&SimError> {
        self.log_error.as_ref()
    }

    /// Replays a trace to exhaustion and returns the aggregate report
    ///
    /// Addresses are classified strictly in input order, as the replacement
    /// state and the occupancy counter are path-dependent. A source error
    /// aborts the run; no partial statistics are reported for a failed trace
    ///
    /// # Arguments
    ///
    /// * `addresses`: The trace, as produced by e.g. [`crate::io::AddressTrace`]
    ///
    /// returns: Result<Report, SimError>
    pub fn simulate<I>(&mut self, addresses: I) -> Result<Report, SimError>
    where
        I: IntoIterator<Item = Result<u32, SimError>>,
    {
        let start = Instant::now();
        for address in addresses {
            let address = address?;
            let (tag, index) = self.cache.decode(address);
            let outcome = self.cache.access(address);
            if let Some(sink) = &mut self.log {
                if let Err(e) = writeln!(sink, "{address:#010x}, {tag}, {index}, {outcome}") {
                    // Log output degrades, simulation correctness does not
                    self.log_error = Some(SimError::LogSink {
                        records_written: self.cache.counters().total_accesses() - 1,
                        source: e,
                    });
                    self.log = None;
                }
            }
        }
        self.simulation_time += start.elapsed();
        Ok(self.report())
    }

    /// The report over everything simulated so far
    pub fn report(&self) -> Report {
        let counters = self.cache.counters().clone();
        let statistics = Statistics::from_counters(&counters);
        Report {
            counters,
            statistics,
        }
    }

    /// Gets the wall-clock execution time for processing
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    /// Gets the number of lines which have never been filled. Useful for
    /// analysing cache performance or debugging
    pub fn get_uninitialised_line_count(&self) -> u64 {
        self.cache.geometry().total_lines() - self.cache.occupied_lines()
    }

    /// Creates a new cache from a validated geometry and the configured
    /// policy
    fn config_to_cache(geometry: Geometry, config: &CacheConfig) -> GenericCache {
        match config.policy {
            PolicyConfig::Random => {
                GenericCache::from(Cache::new(geometry, Random::new(geometry.ways, config.seed)))
            }
            PolicyConfig::LeastRecentlyUsed => GenericCache::from(Cache::new(
                geometry,
                LeastRecentlyUsed::new(geometry.num_sets, geometry.ways),
            )),
            PolicyConfig::FirstInFirstOut => GenericCache::from(Cache::new(
                geometry,
                FirstInFirstOut::new(geometry.num_sets, geometry.ways),
            )),
        }
    }
}
