//! Error types for a benchmark session.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::stats::StatsError;

/// Convenience alias used throughout the harness.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Everything that can stop a benchmark session or a single test case.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("binary not found or not a regular file: {0}")]
    MissingBinary(PathBuf),

    #[error("workspace directory does not exist: {0}")]
    MissingWorkspace(PathBuf),

    #[error("no artifacts configured (set ACIS to a comma-separated list)")]
    NoArtifacts,

    #[error("failed to {step} artifact '{artifact}' (exit code {code:?})")]
    Stage {
        artifact: String,
        step: &'static str,
        code: Option<i32>,
    },

    #[error("failed to mount workspace at {path}: {detail}")]
    Mount { path: PathBuf, detail: String },

    #[error("failed to unmount workspace at {path}: {detail}")]
    Unmount { path: PathBuf, detail: String },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid test case '{name}': {reason}")]
    InvalidTestCase { name: String, reason: String },

    #[error("test case '{0}' is already registered in this session")]
    DuplicateTestCase(String),

    #[error("test case '{case}': fetch of '{command}' exited with code {code:?}")]
    FailedPass {
        case: String,
        command: String,
        code: Option<i32>,
    },

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error(transparent)]
    Io(#[from] io::Error),
}
