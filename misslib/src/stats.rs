use serde::{Deserialize, Serialize};

use crate::cache::Counters;
use crate::config::OutputMode;

/// Number of decimal places kept by every derived rate within one run
const RATE_PRECISION: i32 = 4;

/// Derived statistics over the final counters of a run
///
/// All rates are rounded to [`RATE_PRECISION`] decimal places. A run with no
/// accesses reports a hit rate of 0 (and therefore a miss rate of 1); a run
/// with no misses reports all per-category miss rates as 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_accesses: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub compulsory_miss_rate: f64,
    pub capacity_miss_rate: f64,
    pub conflict_miss_rate: f64,
}

impl Statistics {
    pub fn from_counters(counters: &Counters) -> Self {
        let total_accesses = counters.total_accesses();
        let total_misses = counters.total_misses();
        let hit_rate = if total_accesses == 0 {
            0.0
        } else {
            round_rate(counters.hits as f64 / total_accesses as f64)
        };
        let miss_rate = round_rate(1.0 - hit_rate);
        let (compulsory_miss_rate, capacity_miss_rate, conflict_miss_rate) = if total_misses == 0 {
            (0.0, 0.0, 0.0)
        } else {
            (
                round_rate(counters.compulsory_misses as f64 / total_misses as f64),
                round_rate(counters.capacity_misses as f64 / total_misses as f64),
                round_rate(counters.conflict_misses as f64 / total_misses as f64),
            )
        };
        Self {
            total_accesses,
            hit_rate,
            miss_rate,
            compulsory_miss_rate,
            capacity_miss_rate,
            conflict_miss_rate,
        }
    }

    /// Renders the statistics in the chosen output mode
    pub fn render(&self, mode: OutputMode) -> String {
        match mode {
            OutputMode::Verbose => self.render_verbose(),
            OutputMode::Compact => self.render_compact(),
        }
    }

    fn render_verbose(&self) -> String {
        format!(
            "Total accesses: {}\n\
             Hit rate: {:.2}%\n\
             Miss rate: {:.2}%\n\
             Compulsory miss rate: {:.2}%\n\
             Capacity miss rate: {:.2}%\n\
             Conflict miss rate: {:.2}%",
            self.total_accesses,
            self.hit_rate * 100.0,
            self.miss_rate * 100.0,
            self.compulsory_miss_rate * 100.0,
            self.capacity_miss_rate * 100.0,
            self.conflict_miss_rate * 100.0,
        )
    }

    // Fixed field order: total accesses, hit rate, miss rate, compulsory,
    // capacity, conflict
    fn render_compact(&self) -> String {
        format!(
            "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
            self.total_accesses,
            self.hit_rate,
            self.miss_rate,
            self.compulsory_miss_rate,
            self.capacity_miss_rate,
            self.conflict_miss_rate,
        )
    }
}

fn round_rate(value: f64) -> f64 {
    let scale = 10f64.powi(RATE_PRECISION);
    (value * scale).round() / scale
}
