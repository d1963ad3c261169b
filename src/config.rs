//! Session and collector configuration, read from flags or the environment.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::Args;

use crate::collector::RetentionPolicy;
use crate::error::{BenchError, Result};
use crate::runner::{FetchProfile, PassFailurePolicy, TestCase};

#[derive(Debug, Clone, Args)]
pub struct SessionConfig {
    /// Artifacts to fetch and benchmark
    #[arg(long, env = "ACIS", value_delimiter = ',', required = true)]
    pub acis: Vec<String>,

    /// Trusted binary used for staging and as the baseline
    #[arg(long, env = "RKT_OFFICIAL", default_value = "/usr/bin/rkt")]
    pub reference_binary: PathBuf,

    /// Binary under test
    #[arg(long, env = "RKT_PATCHED")]
    pub patched_binary: PathBuf,

    /// Collector endpoint; publishing is skipped when unset
    #[arg(long, env = "RESULT_URL")]
    pub result_url: Option<String>,

    /// Mount point for the per-case tmpfs
    #[arg(long, env = "BENCH_WORKSPACE", default_value = "./var-lib-rkt")]
    pub workspace: PathBuf,

    /// tmpfs size limit
    #[arg(long, env = "BENCH_WORKSPACE_SIZE", default_value = "20G")]
    pub workspace_size: String,

    /// Where exported artifacts are kept between cases
    #[arg(long, env = "BENCH_ARTIFACT_CACHE", default_value = "./acis")]
    pub artifact_cache: PathBuf,

    /// Timed passes per test case
    #[arg(long, env = "BENCH_ITERATIONS", default_value_t = 10)]
    pub iterations: usize,

    /// Environment variable carrying the concurrency hint
    #[arg(long, env = "BENCH_CONCURRENCY_VAR", default_value = "GOMAXPROCS")]
    pub concurrency_var: String,

    /// Pull policy for timed fetches
    #[arg(long, default_value = "never")]
    pub pull_policy: String,

    /// Abort a test case when any timed fetch exits non-zero
    #[arg(long)]
    pub strict: bool,
}

impl SessionConfig {
    /// Check every precondition a session depends on.
    pub fn validate(&self) -> Result<()> {
        for binary in [&self.reference_binary, &self.patched_binary] {
            if !binary.is_file() {
                return Err(BenchError::MissingBinary(binary.clone()));
            }
        }
        if !self.workspace.is_dir() {
            return Err(BenchError::MissingWorkspace(self.workspace.clone()));
        }
        if self.artifacts().is_empty() {
            return Err(BenchError::NoArtifacts);
        }
        Ok(())
    }

    /// Configured artifacts with blanks dropped.
    pub fn artifacts(&self) -> Vec<String> {
        self.acis
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn fetch_profile(&self) -> FetchProfile {
        let pull_policy = Some(self.pull_policy.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        FetchProfile {
            pull_policy,
            concurrency_var: self.concurrency_var.clone(),
        }
    }

    pub fn pass_failure_policy(&self) -> PassFailurePolicy {
        if self.strict {
            PassFailurePolicy::Strict
        } else {
            PassFailurePolicy::Tolerate
        }
    }

    /// The reference suite: the official binary, then the patched binary
    /// with a single thread and with every available core.
    pub fn test_cases(&self) -> Result<Vec<TestCase>> {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Ok(vec![
            TestCase::new("test_official", &self.reference_binary, 1, self.iterations)?,
            TestCase::new("test_patch_gomaxprocs_1", &self.patched_binary, 1, self.iterations)?,
            TestCase::new("test_patch_gomaxprocs_max", &self.patched_binary, cores, self.iterations)?,
        ])
    }
}

#[derive(Debug, Clone, Args)]
pub struct CollectorConfig {
    /// Address to listen on
    #[arg(long, env = "COLLECTOR_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Directory holding the result cache file
    #[arg(long, env = "COLLECTOR_CACHE_DIR", default_value = "/tmp/fetch-bench-collector")]
    pub cache_dir: PathBuf,

    /// Keep only the newest N batches, N >= 1 (default: keep everything)
    #[arg(long)]
    pub keep_last: Option<NonZeroUsize>,
}

impl CollectorConfig {
    pub fn retention(&self) -> RetentionPolicy {
        match self.keep_last {
            Some(n) => RetentionPolicy::KeepLast(n),
            None => RetentionPolicy::Unbounded,
        }
    }
}
