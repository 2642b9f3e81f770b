// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request-scoped temporary artifacts.
//
// Every artifact path is unique per acquisition (timestamp, process id,
// process-wide counter, and a random UUID fragment), and is created
// exclusively so two concurrent requests can never share one. Artifacts are
// removed when released or dropped, whichever comes first; deletion failures
// are logged and never propagated.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{BlattwerkError, Result};

/// Prefix shared by every artifact name, so orphans are easy to find.
pub const ARTIFACT_PREFIX: &str = "blattwerk";

const MAX_CREATE_ATTEMPTS: u32 = 8;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Hands out unique temporary files and directories under one root.
#[derive(Debug, Clone)]
pub struct TempArtifactStore {
    root: PathBuf,
}

impl TempArtifactStore {
    /// Store rooted at `root`. The directory is created on first acquisition.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at the OS temp directory.
    pub fn system() -> Self {
        Self::new(std::env::temp_dir())
    }

    /// Store rooted at `config.temp_dir`, falling back to the OS temp dir.
    pub fn from_config(config: &PipelineConfig) -> Self {
        match &config.temp_dir {
            Some(dir) => Self::new(dir.clone()),
            None => Self::system(),
        }
    }

    /// Acquire a fresh, empty file whose name ends in `suggested_ext`.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn acquire(&self, suggested_ext: &str) -> Result<TempArtifact> {
        self.ensure_root()?;
        let ext = sanitize_extension(suggested_ext);

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let path = self.root.join(unique_name(&ext));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    debug!(path = %path.display(), "temp file acquired");
                    return Ok(TempArtifact::new(path, ArtifactKind::File));
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(collision_error(&self.root))
    }

    /// Acquire a fresh, empty directory (e.g. for multi-file tool output).
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn acquire_dir(&self) -> Result<TempArtifact> {
        self.ensure_root()?;

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let path = self.root.join(unique_name(""));
            match std::fs::create_dir(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "temp directory acquired");
                    return Ok(TempArtifact::new(path, ArtifactKind::Directory));
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            }
        }

        Err(collision_error(&self.root))
    }

    /// Release an artifact now rather than at end of scope.
    pub fn release(&self, mut artifact: TempArtifact) {
        artifact.release();
    }

    fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }
}

impl Default for TempArtifactStore {
    fn default() -> Self {
        Self::system()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArtifactKind {
    File,
    Directory,
}

/// A temporary path owned by exactly one request.
///
/// Removed on [`release`](TempArtifact::release) or on drop. Releasing twice,
/// or releasing a path someone else already deleted, is a no-op.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    kind: ArtifactKind,
    released: bool,
}

impl TempArtifact {
    fn new(path: PathBuf, kind: ArtifactKind) -> Self {
        Self {
            path,
            kind,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ArtifactKind::Directory
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Delete the artifact. Idempotent; failures are logged only.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let outcome = match self.kind {
            ArtifactKind::File => std::fs::remove_file(&self.path),
            ArtifactKind::Directory => std::fs::remove_dir_all(&self.path),
        };

        match outcome {
            Ok(()) => debug!(path = %self.path.display(), "temp artifact released"),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "temp artifact already gone")
            }
            Err(err) => warn!(
                path = %self.path.display(),
                error = %err,
                "failed to delete temp artifact"
            ),
        }
    }
}

impl AsRef<Path> for TempArtifact {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        self.release();
    }
}

fn unique_name(ext: &str) -> String {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%3f");
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let nonce = Uuid::new_v4().simple().to_string();
    let mut name = format!(
        "{ARTIFACT_PREFIX}-{stamp}-{}-{sequence}-{}",
        std::process::id(),
        &nonce[..12]
    );
    if !ext.is_empty() {
        name.push('.');
        name.push_str(ext);
    }
    name
}

fn sanitize_extension(ext: &str) -> String {
    ext.trim_start_matches('.')
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(16)
        .collect()
}

fn collision_error(root: &Path) -> BlattwerkError {
    BlattwerkError::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("could not create a unique temp artifact in {}", root.display()),
    ))
}
