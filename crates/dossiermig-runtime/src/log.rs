//! Newline-delimited append logs kept in memory for constant time lookups.
//!
//! # Design
//!
//! - Each log is read once at start; afterwards the file is only appended to.
//! - Blank lines and surrounding whitespace are ignored on load.
//! - The file handle is opened lazily so a read-only run never creates it.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{RuntimeError, RuntimeResult};

/// SHA-256 hex digest used as the idempotency key for a descriptor source.
#[must_use]
pub fn idempotency_key(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whether recorded keys are persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogMode {
    /// New keys are appended to the file.
    #[default]
    Append,
    /// New keys are kept in memory only.
    ReadOnly,
}

#[derive(Debug)]
struct LineFile {
    path: PathBuf,
    mode: LogMode,
    handle: Option<File>,
}

impl LineFile {
    async fn load(path: PathBuf, mode: LogMode) -> RuntimeResult<(Self, Vec<String>)> {
        let lines = match fs::read_to_string(&path).await {
            Ok(contents) => contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(RuntimeError::io("log.load", path, err)),
        };
        Ok((
            Self {
                path,
                mode,
                handle: None,
            },
            lines,
        ))
    }

    async fn append(&mut self, line: &str) -> RuntimeResult<()> {
        if self.mode == LogMode::ReadOnly {
            return Ok(());
        }
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => self.open().await?,
        };
        let handle = self.handle.insert(handle);
        handle
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|err| RuntimeError::io("log.append", &self.path, err))?;
        handle
            .flush()
            .await
            .map_err(|err| RuntimeError::io("log.flush", &self.path, err))
    }

    async fn open(&self) -> RuntimeResult<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| RuntimeError::io("log.create_dir", parent, err))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| RuntimeError::io("log.open", &self.path, err))
    }
}

/// Set of descriptors already handed to the orchestrator in this or a previous run.
#[derive(Debug)]
pub struct IdempotencyLog {
    keys: HashSet<String>,
    file: LineFile,
}

impl IdempotencyLog {
    /// Load the log at `path`; a missing file means an empty log.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the file exists but cannot be read.
    pub async fn open(path: impl Into<PathBuf>, mode: LogMode) -> RuntimeResult<Self> {
        let (file, lines) = LineFile::load(path.into(), mode).await?;
        let keys: HashSet<String> = lines.into_iter().collect();
        if !keys.is_empty() {
            info!(
                path = %file.path.display(),
                entries = keys.len(),
                "resuming from idempotency log"
            );
        }
        Ok(Self { keys, file })
    }

    /// Whether the key has been recorded.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Record a key, appending it to the file when it is new.
    ///
    /// Returns `true` when the key was not known before.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the append fails; the key is then not recorded.
    pub async fn record(&mut self, key: String) -> RuntimeResult<bool> {
        if self.keys.contains(&key) {
            return Ok(false);
        }
        self.file.append(&key).await?;
        debug!(key = %key, "idempotency key recorded");
        self.keys.insert(key);
        Ok(true)
    }

    /// Number of known keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no key is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Backing file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file.path
    }
}

/// Customer numbers that could not be resolved at the destination.
#[derive(Debug)]
pub struct UnmappableLog {
    seen: HashSet<String>,
    file: LineFile,
}

impl UnmappableLog {
    /// Load the log at `path`; a missing file means an empty log.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the file exists but cannot be read.
    pub async fn open(path: impl Into<PathBuf>) -> RuntimeResult<Self> {
        let (file, lines) = LineFile::load(path.into(), LogMode::Append).await?;
        Ok(Self {
            seen: lines.into_iter().collect(),
            file,
        })
    }

    /// Append a customer number unless it is already listed.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the append fails.
    pub async fn record(&mut self, number: &str) -> RuntimeResult<bool> {
        if self.seen.contains(number) {
            return Ok(false);
        }
        self.file.append(number).await?;
        self.seen.insert(number.to_string());
        Ok(true)
    }

    /// Number of distinct customer numbers listed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
