//! Pre-fetches artifacts once per session so timed passes stay offline.
//!
//! Each artifact is fetched with the trusted reference binary, exported to
//! `<cache>/<index>.aci`, and copied into the workspace before every test
//! case. Timed fetches then import byte-identical local files.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{BenchError, Result};
use crate::process::{Invocation, ProcessRunner};

/// `--dir=<store>` flag pointing the tool at the workspace store.
pub fn dir_flag(store: &Path) -> OsString {
    let mut flag = OsString::from("--dir=");
    flag.push(store);
    flag
}

/// One exported artifact and where it lands inside the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedArtifact {
    pub identifier: String,
    /// Stable copy outside the workspace.
    pub source: PathBuf,
    /// Fresh copy inside the workspace, the target of timed fetches.
    pub destination: PathBuf,
}

pub struct ArtifactStager {
    reference_binary: PathBuf,
    workspace: PathBuf,
    cache_dir: PathBuf,
    staged: Vec<StagedArtifact>,
}

impl ArtifactStager {
    pub fn new(
        reference_binary: impl Into<PathBuf>,
        workspace: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            reference_binary: reference_binary.into(),
            workspace: workspace.into(),
            cache_dir: cache_dir.into(),
            staged: Vec::new(),
        }
    }

    /// Fetch and export every artifact with the reference binary.
    ///
    /// Any failure is fatal for the session; nothing is retried.
    pub fn stage<P: ProcessRunner>(&mut self, process: &P, identifiers: &[String]) -> Result<()> {
        if identifiers.is_empty() {
            return Err(BenchError::NoArtifacts);
        }
        fs::create_dir_all(&self.cache_dir)?;

        for (i, identifier) in identifiers.iter().enumerate() {
            let file_name = format!("{}.aci", i);
            let source = self.cache_dir.join(&file_name);
            let destination = self.workspace.join(&file_name);

            info!(artifact = %identifier, "fetching with reference binary");
            let fetch = Invocation::new(&self.reference_binary)
                .arg(dir_flag(&self.workspace))
                .args(["fetch", "--insecure-options=all"])
                .arg(identifier)
                .verbose();
            expect_success(process, &fetch, identifier, "fetch")?;

            let export = Invocation::new(&self.reference_binary)
                .arg(dir_flag(&self.workspace))
                .args(["image", "export", "--overwrite"])
                .arg(identifier)
                .arg(&source);
            expect_success(process, &export, identifier, "export")?;

            debug!(artifact = %identifier, source = %source.display(), "artifact staged");
            self.staged.push(StagedArtifact {
                identifier: identifier.clone(),
                source,
                destination,
            });
        }
        Ok(())
    }

    /// Copy every staged artifact into the (freshly mounted) workspace.
    pub fn prepare_iteration(&self) -> Result<()> {
        for artifact in &self.staged {
            fs::copy(&artifact.source, &artifact.destination)?;
        }
        Ok(())
    }

    pub fn staged(&self) -> &[StagedArtifact] {
        &self.staged
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }
}

fn expect_success<P: ProcessRunner>(
    process: &P,
    invocation: &Invocation,
    identifier: &str,
    step: &'static str,
) -> Result<()> {
    match process.run(invocation)? {
        Some(0) => Ok(()),
        code => Err(BenchError::Stage {
            artifact: identifier.to_string(),
            step,
            code,
        }),
    }
}
