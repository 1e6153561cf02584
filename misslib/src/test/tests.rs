use std::cell::RefCell;
use std::io::{self, Cursor, Write};
use std::rc::Rc;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::cache::{decode, AccessOutcome, Cache, CacheTrait, Counters};
use crate::config::{CacheConfig, Geometry, OutputMode, PolicyConfig};
use crate::error::SimError;
use crate::io::AddressTrace;
use crate::replacement_policies::{FirstInFirstOut, LeastRecentlyUsed, Random};
use crate::simulator::{Report, Simulator};
use crate::stats::Statistics;

use AccessOutcome::{CapacityMiss, CompulsoryMiss, ConflictMiss, Hit};

fn config(num_sets: u32, block_size: u32, ways: u32, policy: PolicyConfig) -> CacheConfig {
    CacheConfig {
        num_sets,
        block_size,
        ways,
        policy,
        output: OutputMode::Compact,
        seed: Some(42),
    }
}

fn run(config: &CacheConfig, addresses: &[u32]) -> Report {
    let mut simulator = Simulator::new(config).unwrap();
    simulator.simulate(addresses.iter().map(|&a| Ok(a))).unwrap()
}

fn outcomes<C: CacheTrait>(cache: &mut C, addresses: &[u32]) -> Vec<AccessOutcome> {
    addresses.iter().map(|&a| cache.access(a)).collect()
}

#[test]
fn decode_splits_tag_and_index() {
    // 256 sets of 4 byte blocks: 2 offset bits, 8 index bits
    let geometry = Geometry::from_config(&config(256, 4, 1, PolicyConfig::Random)).unwrap();
    assert_eq!(geometry.offset_bits, 2);
    assert_eq!(geometry.index_bits, 8);
    assert_eq!(geometry.tag_bits, 22);
    let address = 0xABCD_1234u32;
    let (tag, index) = decode(address, &geometry);
    assert_eq!(index, (address >> 2) & 0xFF);
    assert_eq!(tag, address >> 10);
}

#[test]
fn decode_fully_associative_yields_index_zero() {
    let geometry = Geometry::from_config(&config(1, 4, 8, PolicyConfig::Random)).unwrap();
    assert_eq!(geometry.index_bits, 0);
    for address in [0u32, 4, 0xFFFF_FFFF, 0x8000_0000] {
        let (tag, index) = decode(address, &geometry);
        assert_eq!(index, 0);
        assert_eq!(tag, address >> 2);
    }
}

#[test]
fn decode_with_no_tag_bits() {
    // 2 offset bits + 30 index bits consume the full address width
    let geometry = Geometry::from_config(&config(1 << 30, 4, 1, PolicyConfig::Random)).unwrap();
    assert_eq!(geometry.tag_bits, 0);
    let (tag, index) = decode(0xFFFF_FFFF, &geometry);
    assert_eq!(tag, 0);
    assert_eq!(index, 0x3FFF_FFFF);
}

#[test]
fn config_validation_rejects_bad_geometry() {
    let cases = [
        (config(3, 4, 1, PolicyConfig::Random), "num_sets"),
        (config(0, 4, 1, PolicyConfig::Random), "num_sets"),
        (config(4, 12, 1, PolicyConfig::Random), "block_size"),
        (config(4, 0, 1, PolicyConfig::Random), "block_size"),
        (config(4, 4, 0, PolicyConfig::Random), "ways"),
        // 3 offset bits + 30 index bits exceed the 32-bit address width
        (config(1 << 30, 8, 1, PolicyConfig::Random), "num_sets"),
    ];
    for (bad, expected_field) in cases {
        match Geometry::from_config(&bad) {
            Err(SimError::Config { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected a config error for {bad:?}, got {other:?}"),
        }
    }
}

#[test]
fn config_parses_original_policy_codes() {
    let parsed: CacheConfig = serde_json::from_str(
        r#"{"num_sets": 256, "block_size": 4, "ways": 2, "policy": "L", "output": "1"}"#,
    )
    .unwrap();
    assert_eq!(parsed.policy, PolicyConfig::LeastRecentlyUsed);
    assert_eq!(parsed.output, OutputMode::Compact);
    assert_eq!(parsed.seed, None);

    let defaults: CacheConfig =
        serde_json::from_str(r#"{"num_sets": 1, "block_size": 4, "ways": 1}"#).unwrap();
    assert_eq!(defaults.policy, PolicyConfig::Random);
    assert_eq!(defaults.output, OutputMode::Verbose);
}

#[test]
fn first_access_is_compulsory_and_repeat_is_hit() {
    let geometry = Geometry::from_config(&config(4, 4, 2, PolicyConfig::LeastRecentlyUsed)).unwrap();
    let mut cache = Cache::new(geometry, LeastRecentlyUsed::new(4, 2));
    assert_eq!(cache.access(0x40), CompulsoryMiss);
    assert_eq!(cache.access(0x40), Hit);
    assert_eq!(cache.access(0x40), Hit);
}

#[test]
fn single_line_cache_hand_traced() {
    // One set, one way, 4 byte blocks: offset_bits = 2, index_bits = 0.
    // [0, 4, 0] decodes to tags [0, 1, 0], all in set 0. The first access
    // fills the only line (compulsory); once that line is valid the whole
    // cache is at capacity, so both following misses are capacity misses.
    let geometry = Geometry::from_config(&config(1, 4, 1, PolicyConfig::Random)).unwrap();
    let mut cache = Cache::new(geometry, Random::new(1, Some(42)));
    assert_eq!(
        outcomes(&mut cache, &[0, 4, 0]),
        vec![CompulsoryMiss, CapacityMiss, CapacityMiss]
    );
    let expected = Counters {
        hits: 0,
        compulsory_misses: 1,
        capacity_misses: 2,
        conflict_misses: 0,
    };
    assert_eq!(*cache.counters(), expected);
    assert_eq!(cache.counters().total_accesses(), 3);
}

#[test]
fn conflict_requires_free_capacity_elsewhere() {
    // Two direct-mapped sets. Set 0 fills and collides while set 1 is still
    // empty (conflict), then collides again once the whole cache is full
    // (capacity).
    let geometry = Geometry::from_config(&config(2, 4, 1, PolicyConfig::FirstInFirstOut)).unwrap();
    let mut cache = Cache::new(geometry, FirstInFirstOut::new(2, 1));
    // Addresses decode as (tag, index): 0 -> (0, 0), 8 -> (1, 0),
    // 4 -> (0, 1), 16 -> (2, 0)
    assert_eq!(
        outcomes(&mut cache, &[0, 8, 4, 16]),
        vec![CompulsoryMiss, ConflictMiss, CompulsoryMiss, CapacityMiss]
    );
}

#[test]
fn lru_evicts_least_recently_touched_not_insertion_order() {
    // 4 sets, 2 ways. All addresses map to set 0; tags are address >> 4.
    let geometry =
        Geometry::from_config(&config(4, 4, 2, PolicyConfig::LeastRecentlyUsed)).unwrap();
    let mut cache = Cache::new(geometry, LeastRecentlyUsed::new(4, 2));
    let t0 = 0x00;
    let t1 = 0x10;
    let t2 = 0x20;
    // After the hit on t0, t1 is least recently used, so t2 must evict t1
    // even though t0 was inserted first. t0 keeps hitting until a further
    // distinct tag pushes it out.
    assert_eq!(
        outcomes(&mut cache, &[t0, t1, t0, t2, t0, t1]),
        vec![
            CompulsoryMiss,
            CompulsoryMiss,
            Hit,
            ConflictMiss,
            Hit,
            ConflictMiss,
        ]
    );
}

#[test]
fn lru_keeps_resident_tags_until_ways_exceeded() {
    // With 2 ways, re-accessing the first tag after exactly 2 distinct fills
    // must still hit; only a 3rd distinct tag can evict it.
    let geometry =
        Geometry::from_config(&config(1, 4, 2, PolicyConfig::LeastRecentlyUsed)).unwrap();
    let mut cache = Cache::new(geometry, LeastRecentlyUsed::new(1, 2));
    assert_eq!(cache.access(0x0), CompulsoryMiss);
    assert_eq!(cache.access(0x4), CompulsoryMiss);
    assert_eq!(cache.access(0x0), Hit);
    // 0x8 evicts 0x4 (least recently used), not 0x0
    assert_eq!(cache.access(0x8), CapacityMiss);
    assert_eq!(cache.access(0x0), Hit);
    assert_eq!(cache.access(0x4), CapacityMiss);
}

#[test]
fn fifo_evicts_in_fill_order_despite_hits() {
    let geometry =
        Geometry::from_config(&config(1, 4, 2, PolicyConfig::FirstInFirstOut)).unwrap();
    let mut cache = Cache::new(geometry, FirstInFirstOut::new(1, 2));
    let t0 = 0x0;
    let t1 = 0x4;
    let t2 = 0x8;
    // Hits on t0 must not protect it: t2 still evicts t0, the oldest fill.
    // The next eviction takes t1, preserving the original fill order.
    assert_eq!(
        outcomes(&mut cache, &[t0, t1, t0, t0, t2, t0, t2]),
        vec![
            CompulsoryMiss,
            CompulsoryMiss,
            Hit,
            Hit,
            CapacityMiss,
            CapacityMiss,
            Hit,
        ]
    );
}

#[test]
fn counters_always_sum_to_total_accesses() {
    let mut rng = SmallRng::seed_from_u64(3);
    let trace: Vec<u32> = (0..10_000).map(|_| rng.random_range(0..1u32 << 16)).collect();
    for policy in [
        PolicyConfig::Random,
        PolicyConfig::LeastRecentlyUsed,
        PolicyConfig::FirstInFirstOut,
    ] {
        let report = run(&config(16, 16, 2, policy), &trace);
        let c = &report.counters;
        assert_eq!(c.total_accesses(), 10_000);
        assert_eq!(
            c.hits + c.compulsory_misses + c.capacity_misses + c.conflict_misses,
            10_000
        );
        let s = &report.statistics;
        assert!((s.hit_rate + s.miss_rate - 1.0).abs() < 1e-9);
    }
}

#[test]
fn repeat_runs_are_deterministic() {
    let mut rng = SmallRng::seed_from_u64(5);
    let trace: Vec<u32> = (0..5_000).map(|_| rng.random_range(0..1u32 << 14)).collect();
    for policy in [
        PolicyConfig::LeastRecentlyUsed,
        PolicyConfig::FirstInFirstOut,
        // Random is deterministic too when the seed is fixed
        PolicyConfig::Random,
    ] {
        let cfg = config(8, 8, 4, policy);
        assert_eq!(run(&cfg, &trace), run(&cfg, &trace));
    }
}

#[test]
fn statistics_of_an_empty_run() {
    let stats = Statistics::from_counters(&Counters::default());
    assert_eq!(stats.total_accesses, 0);
    assert_eq!(stats.hit_rate, 0.0);
    assert_eq!(stats.miss_rate, 1.0);
    assert_eq!(stats.compulsory_miss_rate, 0.0);
    assert_eq!(stats.capacity_miss_rate, 0.0);
    assert_eq!(stats.conflict_miss_rate, 0.0);
}

#[test]
fn rendering_modes() {
    let counters = Counters {
        hits: 95,
        compulsory_misses: 1,
        capacity_misses: 2,
        conflict_misses: 2,
    };
    let stats = Statistics::from_counters(&counters);
    assert_eq!(
        stats.render(OutputMode::Compact),
        "100, 0.9500, 0.0500, 0.2000, 0.4000, 0.4000"
    );
    let verbose = stats.render(OutputMode::Verbose);
    assert!(verbose.starts_with("Total accesses: 100\n"));
    assert!(verbose.contains("Hit rate: 95.00%"));
    assert!(verbose.contains("Compulsory miss rate: 20.00%"));
    assert!(verbose.ends_with("Conflict miss rate: 40.00%"));
}

#[test]
fn trace_reader_parses_big_endian_records() {
    let bytes = [
        0x00, 0x00, 0x00, 0x01, //
        0x00, 0x00, 0x01, 0x00, //
        0xDE, 0xAD, 0xBE, 0xEF,
    ];
    let trace = AddressTrace::new(Cursor::new(bytes));
    let addresses: Vec<u32> = trace.map(Result::unwrap).collect();
    assert_eq!(addresses, vec![1, 256, 0xDEAD_BEEF]);
}

#[test]
fn trace_reader_reports_truncated_record() {
    let bytes = [0x00, 0x00, 0x00, 0x01, 0xFF, 0xFF];
    let mut trace = AddressTrace::new(Cursor::new(bytes));
    assert_eq!(trace.next().unwrap().unwrap(), 1);
    match trace.next() {
        Some(Err(SimError::Source { records_read, .. })) => assert_eq!(records_read, 1),
        other => panic!("expected a source error, got {other:?}"),
    }
}

#[test]
fn source_error_aborts_with_no_report() {
    let cfg = config(4, 4, 1, PolicyConfig::FirstInFirstOut);
    let mut simulator = Simulator::new(&cfg).unwrap();
    let failing = vec![
        Ok(0u32),
        Err(SimError::Source {
            records_read: 1,
            source: io::Error::new(io::ErrorKind::UnexpectedEof, "truncated"),
        }),
    ];
    assert!(simulator.simulate(failing).is_err());
}

/// A log sink the test can inspect after the simulator is done with it
#[derive(Clone)]
struct SharedSink(Rc<RefCell<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct FailingSink;

impl Write for FailingSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "sink closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn log_sink_receives_one_record_per_access() {
    let cfg = config(1, 4, 1, PolicyConfig::FirstInFirstOut);
    let mut simulator = Simulator::new(&cfg).unwrap();
    let sink = SharedSink(Rc::new(RefCell::new(Vec::new())));
    simulator.set_log_sink(Box::new(sink.clone()));
    simulator.simulate([0u32, 4, 0].map(Ok)).unwrap();
    let logged = String::from_utf8(sink.0.borrow().clone()).unwrap();
    let lines: Vec<&str> = logged.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "0x00000000, 0, 0, Compulsory miss");
    assert_eq!(lines[1], "0x00000004, 1, 0, Capacity miss");
    assert_eq!(lines[2], "0x00000000, 0, 0, Capacity miss");
    assert!(simulator.log_error().is_none());
}

#[test]
fn log_sink_failure_does_not_abort_the_run() {
    let cfg = config(1, 4, 1, PolicyConfig::FirstInFirstOut);
    let mut simulator = Simulator::new(&cfg).unwrap();
    simulator.set_log_sink(Box::new(FailingSink));
    let report = simulator.simulate([0u32, 4, 0].map(Ok)).unwrap();
    assert_eq!(report.counters.total_accesses(), 3);
    match simulator.log_error() {
        Some(SimError::LogSink {
            records_written, ..
        }) => assert_eq!(*records_written, 0),
        other => panic!("expected a log sink error, got {other:?}"),
    }
}

#[test]
fn uninitialised_lines_track_occupancy() {
    let cfg = config(4, 4, 2, PolicyConfig::LeastRecentlyUsed);
    let mut simulator = Simulator::new(&cfg).unwrap();
    assert_eq!(simulator.get_uninitialised_line_count(), 8);
    // Three compulsory fills into three distinct sets
    simulator.simulate([0x0u32, 0x4, 0x8].map(Ok)).unwrap();
    assert_eq!(simulator.get_uninitialised_line_count(), 5);
}
