//! Shared fixtures: sample datasets and fakes for the external collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Deserialize;

use fetch_benchmarks::error::{BenchError, Result};
use fetch_benchmarks::process::{Clock, Invocation, ProcessRunner};
use fetch_benchmarks::workspace::{MountFacility, UnmountOutcome};

// =============================================================================
// Sample dataset
// =============================================================================

pub fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
}

#[derive(Deserialize)]
pub struct SampleDataset {
    pub cases: Vec<SampleCase>,
}

#[derive(Deserialize)]
pub struct SampleCase {
    pub name: String,
    pub samples: Vec<f64>,
    pub expected: ExpectedStats,
}

#[derive(Deserialize)]
pub struct ExpectedStats {
    pub total: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub average: f64,
    pub median: f64,
    pub deviation: f64,
}

pub fn load_sample_dataset() -> SampleDataset {
    let path = data_dir().join("samples.json");
    let content = std::fs::read_to_string(&path).expect("failed to read samples.json");
    serde_json::from_str(&content).expect("failed to parse samples.json")
}

pub fn assert_close(actual: f64, expected: f64, what: &str) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "{}: expected {}, got {}",
        what,
        expected,
        actual
    );
}

// =============================================================================
// Mount facility
// =============================================================================

#[derive(Default)]
pub struct MountState {
    /// Live mounts at the path (tmpfs mounts stack).
    pub depth: usize,
    pub mounts: usize,
    pub unmounts: usize,
    pub fail_mount: bool,
    pub fail_unmount: bool,
}

/// In-process stand-in for tmpfs: mounting empties the directory.
#[derive(Clone, Default)]
pub struct FakeMount {
    pub state: Arc<Mutex<MountState>>,
}

impl FakeMount {
    pub fn depth(&self) -> usize {
        self.state.lock().unwrap().depth
    }

    pub fn mounts(&self) -> usize {
        self.state.lock().unwrap().mounts
    }

    pub fn set_fail_mount(&self, fail: bool) {
        self.state.lock().unwrap().fail_mount = fail;
    }

    pub fn set_fail_unmount(&self, fail: bool) {
        self.state.lock().unwrap().fail_unmount = fail;
    }
}

impl MountFacility for FakeMount {
    fn mount_tmpfs(&self, path: &Path, _size: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_mount {
            return Err(BenchError::Mount {
                path: path.to_path_buf(),
                detail: "permission denied".into(),
            });
        }
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(entry.path())?;
            } else {
                std::fs::remove_file(entry.path())?;
            }
        }
        state.depth += 1;
        state.mounts += 1;
        Ok(())
    }

    fn unmount(&self, path: &Path) -> Result<UnmountOutcome> {
        let mut state = self.state.lock().unwrap();
        if state.fail_unmount {
            return Err(BenchError::Unmount {
                path: path.to_path_buf(),
                detail: "target is busy".into(),
            });
        }
        if state.depth == 0 {
            return Ok(UnmountOutcome::NotMounted);
        }
        state.depth -= 1;
        state.unmounts += 1;
        Ok(UnmountOutcome::Unmounted)
    }
}

// =============================================================================
// Process runner
// =============================================================================

type ExitRule = Box<dyn Fn(&Invocation) -> Option<i32> + Send>;

/// Records every invocation. `export` writes its target file so staging can
/// copy it; exit codes come from the rule (default: always 0).
#[derive(Clone)]
pub struct ScriptedProcess {
    pub calls: Arc<Mutex<Vec<Invocation>>>,
    rule: Arc<Mutex<ExitRule>>,
}

impl Default for ScriptedProcess {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            rule: Arc::new(Mutex::new(Box::new(|_| Some(0)))),
        }
    }
}

impl ScriptedProcess {
    pub fn with_rule(rule: impl Fn(&Invocation) -> Option<i32> + Send + 'static) -> Self {
        let process = Self::default();
        *process.rule.lock().unwrap() = Box::new(rule);
        process
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl ProcessRunner for ScriptedProcess {
    fn run(&self, invocation: &Invocation) -> Result<Option<i32>> {
        self.calls.lock().unwrap().push(invocation.clone());
        let code = (self.rule.lock().unwrap())(invocation);
        if code == Some(0) && has_arg(invocation, "export") {
            if let Some(target) = invocation.args.last() {
                std::fs::write(target, b"aci-bytes")?;
            }
        }
        Ok(code)
    }
}

pub fn has_arg(invocation: &Invocation, arg: &str) -> bool {
    invocation.args.iter().any(|a| a == arg)
}

/// `fetch` invocations are the timed ones; staging fetches use a remote name.
pub fn is_timed_fetch(invocation: &Invocation) -> bool {
    has_arg(invocation, "fetch")
        && invocation
            .args
            .last()
            .map(|a| a.to_string_lossy().ends_with(".aci"))
            .unwrap_or(false)
}

pub fn is_gc(invocation: &Invocation) -> bool {
    has_arg(invocation, "gc")
}

// =============================================================================
// Clock
// =============================================================================

/// Hands out scripted timestamps, one per `now()` call.
pub struct ScriptedClock {
    ticks: Mutex<VecDeque<f64>>,
}

impl ScriptedClock {
    /// Timestamps that make consecutive passes take exactly `samples`.
    pub fn from_samples(samples: &[f64]) -> Self {
        let ticks = samples
            .iter()
            .enumerate()
            .flat_map(|(i, s)| {
                let start = 100.0 * i as f64;
                [start, start + s]
            })
            .collect();
        Self {
            ticks: Mutex::new(ticks),
        }
    }
}

impl ScriptedClock {
    pub fn from_ticks(ticks: &[f64]) -> Self {
        Self {
            ticks: Mutex::new(ticks.iter().copied().collect()),
        }
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> f64 {
        self.ticks
            .lock()
            .unwrap()
            .pop_front()
            .expect("clock ran out of scripted ticks")
    }
}
