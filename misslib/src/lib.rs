//! # MissLib
//!
//! Misslib is a library for simulating a set-associative cache against a
//! trace of memory addresses
//!
//! Every access is classified as a hit or as one of three miss categories
//! (compulsory, capacity, conflict), and the simulator aggregates the counts
//! into hit/miss rates at the end of the run
//!
//! The cache implementation is generic over a replacement policy, so new
//! policies can be added without touching the classification logic

/// Contains the implementation of the cache, the access outcome
/// classification, and a utility enum for the existing policy instantiations
pub mod cache;

/// Contains definitions for the JSON configuration format and the validated
/// cache geometry derived from it
pub mod config;

/// Contains the error taxonomy for configuration, trace source, and log sink
/// failures
pub mod error;

/// Contains the trace reader for fixed-width binary address records
pub mod io;

/// Contains the provided replacement policies, with a trait for implementing
/// custom replacement policies
pub mod replacement_policies;

/// Contains the simulator used to replay a trace against a configured cache
pub mod simulator;

/// Contains the derived statistics and the output rendering
pub mod stats;

#[cfg(test)]
mod test;
