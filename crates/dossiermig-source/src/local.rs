//! Local disk source provider backed by `walkdir`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dossiermig_core::{DescriptorStream, FileDescriptor, SourceError, SourceProvider, SourceResult};
use futures_util::StreamExt;
use futures_util::stream;
use tracing::{debug, trace};
use walkdir::{DirEntry, WalkDir};

const IGNORED_NAMES: [&str; 2] = ["Thumbs.db", ".DS_Store"];
const LOCK_PREFIXES: [&str; 2] = ["~$", ".~"];

/// Whether a file name is operating-system clutter or an office lock file.
#[must_use]
pub fn is_ignored_name(name: &str) -> bool {
    IGNORED_NAMES.iter().any(|ignored| name.ends_with(ignored))
        || LOCK_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Source that walks a directory tree on the local filesystem.
///
/// Entries are yielded in file-name order so repeated runs see the same sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSource;

impl LocalSource {
    /// Construct the provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn created_at(entry: &DirEntry) -> Option<DateTime<Utc>> {
    let metadata = entry
        .metadata()
        .inspect_err(|err| debug!(path = %entry.path().display(), error = %err, "metadata unavailable"))
        .ok()?;
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

fn describe(root: &Path, entry: &DirEntry) -> FileDescriptor {
    let parent = entry.path().parent().unwrap_or(root);
    let relative = parent.strip_prefix(root).unwrap_or_else(|_| Path::new(""));
    let descriptor = FileDescriptor::new(
        entry.file_name().to_string_lossy(),
        slash_path(parent),
        slash_path(relative),
    );
    match created_at(entry) {
        Some(at) => descriptor.with_created_at(at),
        None => descriptor,
    }
}

#[async_trait]
impl SourceProvider for LocalSource {
    fn traverse<'a>(&'a self, root: &'a str) -> SourceResult<DescriptorStream<'a>> {
        let root_path = PathBuf::from(root);
        if !root_path.is_dir() {
            return Err(SourceError::InvalidRoot {
                path: root_path,
                reason: "root is not a directory",
            });
        }

        let walker = WalkDir::new(&root_path)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();
        let entries = walker.filter_map(move |entry| match entry {
            Err(err) => Some(Err(SourceError::backend("source.walk", err))),
            Ok(entry) if !entry.file_type().is_file() => None,
            Ok(entry) => {
                let name = entry.file_name().to_string_lossy();
                if is_ignored_name(&name) {
                    trace!(path = %entry.path().display(), "ignored system file");
                    return None;
                }
                Some(Ok(describe(&root_path, &entry)))
            }
        });
        Ok(stream::iter(entries).boxed())
    }

    async fn content(&self, file: &FileDescriptor) -> SourceResult<Vec<u8>> {
        let path = PathBuf::from(file.absolute_file_path());
        tokio::fs::read(&path)
            .await
            .map_err(|err| SourceError::io("source.read", path, err))
    }
}
