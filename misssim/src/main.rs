use std::fs::File;
use std::io::BufReader;
use std::time::Instant;

use clap::Parser;
use misslib::config::CacheConfig;
use misslib::io::{get_reader, AddressTrace};
use misslib::simulator::Simulator;

#[cfg(debug_assertions)]
const DEBUG_DEFAULT: bool = true;

#[cfg(not(debug_assertions))]
const DEBUG_DEFAULT: bool = false;

#[derive(Parser, Debug)]
#[command(about = String::from("Set-associative cache simulator with miss classification"))]
struct Args {
    /// Path to the JSON cache configuration
    config: String,
    /// Path to the binary address trace (4 byte big-endian records)
    trace: String,

    #[arg(short, long)]
    performance: bool,

    #[arg(short, long, default_value_t = DEBUG_DEFAULT)]
    debug: bool,
}

fn main() -> Result<(), String> {
    let start = Instant::now();
    let args = Args::parse();
    let config_file = File::open(&args.config)
        .map_err(|e| format!("Couldn't open the config file at path {}: {e}", args.config))?;
    let config: CacheConfig = serde_json::from_reader(BufReader::new(config_file))
        .map_err(|e| format!("Couldn't parse the config file: {e}"))?;
    let mut simulator = Simulator::new(&config).map_err(|e| e.to_string())?;
    if args.debug {
        #[cfg(debug_assertions)]
        println!("Running the debug binary, debug mode is enabled by default. If benchmarking, do not use this binary, re-compile with the --release argument when using cargo run");
        println!("Parsed input configuration: {config:?}");
        simulator.set_log_sink(Box::new(std::io::stderr()));
    }
    let trace_file = File::open(&args.trace)
        .map_err(|e| format!("Couldn't open the trace file at path {}: {e}", args.trace))?;
    let trace_reader = get_reader(trace_file).map_err(|e| e.to_string())?;
    let report = simulator
        .simulate(AddressTrace::new(trace_reader))
        .map_err(|e| e.to_string())?;
    println!("{}", report.render(config.output));
    if args.performance {
        let end = Instant::now();
        let simulation_time = simulator.get_execution_time();
        let total_time = end - start;
        println!("Simulation time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!("Total execution time (includes initial parsing, configuration, and output): {}s", total_time.as_nanos() as f64 / 1e9)
    }
    if args.debug {
        if let Some(e) = simulator.log_error() {
            eprintln!("{e}");
        }
        println!(
            "Uninitialised cache lines: {}",
            simulator.get_uninitialised_line_count()
        )
    }
    Ok(())
}
