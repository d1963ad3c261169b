//! Fetch-performance benchmarks for container-image tools.
//!
//! The harness times an external fetch binary against a fresh tmpfs
//! workspace, aggregates per-case statistics, ranks the cases, and can
//! publish the results to a collector service (see [`collector`]).

pub mod collector;
pub mod config;
pub mod error;
pub mod process;
pub mod publish;
pub mod report;
pub mod runner;
pub mod schema;
pub mod stager;
pub mod stats;
pub mod workspace;

pub use error::{BenchError, Result};
