//! Timed fetch passes and the sequential session that drives them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::{BenchError, Result};
use crate::process::{Clock, Invocation, ProcessRunner};
use crate::schema::BenchmarkResult;
use crate::stager::{dir_flag, ArtifactStager};
use crate::stats::summarize;
use crate::workspace::{IsolatedWorkspace, MountFacility};

/// One benchmark scenario. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    name: String,
    binary: PathBuf,
    concurrency: usize,
    iterations: usize,
}

impl TestCase {
    pub fn new(
        name: impl Into<String>,
        binary: impl Into<PathBuf>,
        concurrency: usize,
        iterations: usize,
    ) -> Result<Self> {
        let name = name.into();
        let reason = if name.trim().is_empty() {
            Some("name must not be empty")
        } else if concurrency == 0 {
            Some("concurrency must be at least 1")
        } else if iterations == 0 {
            Some("iterations must be at least 1")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(BenchError::InvalidTestCase {
                name,
                reason: reason.to_string(),
            });
        }
        Ok(Self {
            name,
            binary: binary.into(),
            concurrency,
            iterations,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

/// What to do when a fetch exits non-zero inside a timed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassFailurePolicy {
    /// Keep the pass time and count the failure.
    #[default]
    Tolerate,
    /// Abort the test case.
    Strict,
}

/// Fixed shape of the timed fetch command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchProfile {
    /// Passed as `--pull-policy=<value>` when set.
    pub pull_policy: Option<String>,
    /// Environment variable carrying the concurrency hint.
    pub concurrency_var: String,
}

impl Default for FetchProfile {
    fn default() -> Self {
        Self {
            pull_policy: Some("never".to_string()),
            concurrency_var: "GOMAXPROCS".to_string(),
        }
    }
}

/// Times passes of one binary against the staged artifacts.
pub struct BenchmarkRunner<'a, P, C> {
    process: &'a P,
    clock: &'a C,
    profile: &'a FetchProfile,
    policy: PassFailurePolicy,
}

impl<'a, P: ProcessRunner, C: Clock> BenchmarkRunner<'a, P, C> {
    pub fn new(process: &'a P, clock: &'a C, profile: &'a FetchProfile, policy: PassFailurePolicy) -> Self {
        Self {
            process,
            clock,
            profile,
            policy,
        }
    }

    /// Run `case.iterations()` passes and aggregate their wall-clock times.
    ///
    /// A pass fetches every staged artifact once; the timer spans the whole
    /// pass. Garbage collection after each pass is not timed.
    pub fn run(&self, case: &TestCase, stager: &ArtifactStager) -> Result<BenchmarkResult> {
        let commands = self.fetch_commands(case, stager);
        let mut samples = Vec::with_capacity(case.iterations);
        let mut failed_commands = 0u32;

        for pass in 0..case.iterations {
            let before = self.clock.now();
            for command in &commands {
                let code = self.process.run(command)?;
                if code == Some(0) {
                    continue;
                }
                failed_commands += 1;
                match self.policy {
                    PassFailurePolicy::Strict => {
                        return Err(BenchError::FailedPass {
                            case: case.name.clone(),
                            command: command.to_string(),
                            code,
                        });
                    }
                    PassFailurePolicy::Tolerate => {
                        warn!(case = %case.name, pass, ?code, command = %command, "fetch failed, keeping pass time");
                    }
                }
            }
            samples.push(self.clock.now() - before);
            self.collect_garbage(&case.binary, stager.workspace())?;
        }

        let mut result = summarize(&case.name, &samples)?;
        result.failed_commands = failed_commands;
        Ok(result)
    }

    /// Generic and image-store GC with no grace period. Exit codes are
    /// logged, never fatal.
    pub fn collect_garbage(&self, binary: &Path, store: &Path) -> Result<()> {
        for subcommand in [&["gc"][..], &["image", "gc"][..]] {
            let gc = Invocation::new(binary)
                .arg(dir_flag(store))
                .args(subcommand.iter().copied())
                .arg("--grace-period=0s");
            let code = self.process.run(&gc)?;
            if code != Some(0) {
                warn!(?code, command = %gc, "garbage collection failed");
            }
        }
        Ok(())
    }

    fn fetch_commands(&self, case: &TestCase, stager: &ArtifactStager) -> Vec<Invocation> {
        stager
            .staged()
            .iter()
            .map(|artifact| {
                let mut command = Invocation::new(&case.binary)
                    .arg(dir_flag(stager.workspace()))
                    .args(["fetch", "--insecure-options=all"]);
                if let Some(policy) = &self.profile.pull_policy {
                    command = command.arg(format!("--pull-policy={}", policy));
                }
                command
                    .arg(&artifact.destination)
                    .env(&self.profile.concurrency_var, case.concurrency.to_string())
            })
            .collect()
    }
}

/// A test case that did not produce a result.
#[derive(Debug)]
pub struct CaseFailure {
    pub name: String,
    pub error: BenchError,
}

/// Everything a session produced, in registration order.
#[derive(Debug, Default)]
pub struct SessionOutcome {
    pub results: Vec<BenchmarkResult>,
    pub failures: Vec<CaseFailure>,
}

/// Runs registered test cases strictly in order, one workspace at a time.
pub struct Session<M, P, C> {
    workspace: IsolatedWorkspace<M>,
    stager: ArtifactStager,
    process: P,
    clock: C,
    profile: FetchProfile,
    policy: PassFailurePolicy,
    cases: Vec<TestCase>,
    names: HashSet<String>,
}

impl<M: MountFacility, P: ProcessRunner, C: Clock> Session<M, P, C> {
    pub fn new(workspace: IsolatedWorkspace<M>, stager: ArtifactStager, process: P, clock: C) -> Self {
        Self {
            workspace,
            stager,
            process,
            clock,
            profile: FetchProfile::default(),
            policy: PassFailurePolicy::default(),
            cases: Vec::new(),
            names: HashSet::new(),
        }
    }

    pub fn with_profile(mut self, profile: FetchProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_policy(mut self, policy: PassFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Queue a test case. Names must be unique within the session.
    pub fn register(&mut self, case: TestCase) -> Result<()> {
        if !self.names.insert(case.name.clone()) {
            return Err(BenchError::DuplicateTestCase(case.name));
        }
        self.cases.push(case);
        Ok(())
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Clear a crashed run's mount and stage every artifact.
    pub fn prepare(&mut self, identifiers: &[String]) -> Result<()> {
        self.workspace.clear_stale()?;
        self.stager.stage(&self.process, identifiers)
    }

    /// Run one case inside its own freshly mounted workspace.
    ///
    /// The workspace is released on every exit path; on success an unmount
    /// failure fails the case.
    pub fn run_case(&mut self, case: &TestCase) -> Result<BenchmarkResult> {
        let guard = self.workspace.acquire()?;
        self.stager.prepare_iteration()?;

        let runner = BenchmarkRunner::new(&self.process, &self.clock, &self.profile, self.policy);
        let store = guard.path().to_path_buf();
        runner.collect_garbage(&case.binary, &store)?;
        let result = runner.run(case, &self.stager)?;
        runner.collect_garbage(&case.binary, &store)?;

        guard.release()?;
        Ok(result)
    }

    /// Run every registered case. A failing case is recorded and the session
    /// moves on, so partial results are never discarded.
    pub fn run_all(mut self, mut on_result: impl FnMut(&TestCase, &BenchmarkResult)) -> SessionOutcome {
        let cases = std::mem::take(&mut self.cases);
        let mut outcome = SessionOutcome::default();

        for case in &cases {
            info!(case = %case.name, iterations = case.iterations, concurrency = case.concurrency, "running test case");
            match self.run_case(case) {
                Ok(result) => {
                    on_result(case, &result);
                    outcome.results.push(result);
                }
                Err(e) => {
                    error!(case = %case.name, error = %e, "test case failed");
                    outcome.failures.push(CaseFailure {
                        name: case.name.clone(),
                        error: e,
                    });
                }
            }
        }
        outcome
    }
}
