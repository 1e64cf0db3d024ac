//! Migration domain types shared across the workspace.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel destination value meaning "do not migrate".
pub const SKIP_SENTINEL: &str = "-";

/// A single file as reported by a source provider.
///
/// Descriptors are immutable once produced; downstream stages only borrow them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Bare file name.
    pub filename: String,
    /// Directory containing the file, in the source's own notation.
    pub absolute_path: String,
    /// Directory portion relative to the traversal root, `/` separated, no outer slashes.
    pub relative_path: String,
    /// Identifier assigned by a remote source, when the source has one.
    pub remote_id: Option<String>,
    /// Creation time reported by the source.
    pub created_at: Option<DateTime<Utc>>,
    /// Year tracked by the source.
    pub year: Option<u16>,
    /// Period tracked by the source.
    pub period: Option<String>,
    /// Parent item identifier tracked by the source.
    pub parent_id: Option<String>,
}

impl FileDescriptor {
    /// Build a descriptor, normalizing the relative directory to `/` separators.
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        absolute_path: impl Into<String>,
        relative_path: impl AsRef<str>,
    ) -> Self {
        Self {
            filename: filename.into(),
            absolute_path: absolute_path.into(),
            relative_path: normalize_relative(relative_path.as_ref()),
            remote_id: None,
            created_at: None,
            year: None,
            period: None,
            parent_id: None,
        }
    }

    /// Attach a remote identifier.
    #[must_use]
    pub fn with_remote_id(mut self, id: impl Into<String>) -> Self {
        self.remote_id = Some(id.into());
        self
    }

    /// Attach a creation timestamp.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Attach a source-tracked year.
    #[must_use]
    pub const fn with_year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    /// Attach a source-tracked period.
    #[must_use]
    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }

    /// Attach a parent identifier.
    #[must_use]
    pub fn with_parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Relative directory joined with the filename.
    #[must_use]
    pub fn relative_file_path(&self) -> String {
        if self.relative_path.is_empty() {
            self.filename.clone()
        } else {
            format!("{}/{}", self.relative_path, self.filename)
        }
    }

    /// Absolute directory joined with the filename.
    #[must_use]
    pub fn absolute_file_path(&self) -> String {
        let base = self.absolute_path.trim_end_matches(['/', '\\']);
        if base.is_empty() {
            self.filename.clone()
        } else {
            format!("{base}/{}", self.filename)
        }
    }

    /// Value hashed into the idempotency log.
    #[must_use]
    pub fn idempotency_source(&self) -> String {
        self.remote_id
            .clone()
            .unwrap_or_else(|| self.absolute_file_path())
    }
}

fn normalize_relative(raw: &str) -> String {
    raw.replace('\\', "/").trim_matches('/').to_string()
}

/// Destination folder chosen for an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestDir {
    /// Symbolic `/` separated destination path.
    Path(String),
    /// The item must not be migrated.
    Skip,
}

impl DestDir {
    /// Interpret a configured destination value, honouring the `-` sentinel.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed == SKIP_SENTINEL {
            Self::Skip
        } else {
            Self::Path(trimmed.to_string())
        }
    }

    /// Whether this is the skip sentinel.
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }

    /// Path value when not skipped.
    #[must_use]
    pub fn as_path(&self) -> Option<&str> {
        match self {
            Self::Path(path) => Some(path),
            Self::Skip => None,
        }
    }
}

impl fmt::Display for DestDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.write_str(path),
            Self::Skip => f.write_str(SKIP_SENTINEL),
        }
    }
}

/// Mutable record filled in by the mutator pipeline for one descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationItem {
    /// Normalized customer number.
    pub customer_number: Option<String>,
    /// Filename sent to the destination; mutators may rewrite it.
    pub filename: String,
    /// Original descriptor filename, never rewritten.
    pub source_filename: String,
    /// Fiscal year of the document.
    pub year: Option<u16>,
    /// Period token such as `q1` or `m3`.
    pub period: Option<String>,
    /// Relative source directory used for destination mapping.
    pub relative_source_dir: Option<String>,
    /// Destination folder or the skip sentinel.
    pub dest_dir: Option<DestDir>,
    /// Resolved destination directory identifier.
    pub dest_dir_id: Option<String>,
    /// Resolved destination customer identifier.
    pub customer_id: Option<String>,
    /// Parent item identifier carried from the source.
    pub parent_id: Option<String>,
}

impl MigrationItem {
    /// Seed an item from the descriptor it will describe.
    #[must_use]
    pub fn from_descriptor(file: &FileDescriptor) -> Self {
        Self {
            filename: file.filename.clone(),
            source_filename: file.filename.clone(),
            parent_id: file.parent_id.clone(),
            ..Self::default()
        }
    }

    /// Whether the item carries everything delivery needs.
    #[must_use]
    pub fn is_deliverable(&self) -> bool {
        self.customer_id.is_some()
            && self.dest_dir_id.is_some()
            && matches!(self.dest_dir, Some(DestDir::Path(_)))
    }
}

/// Raw directory record returned by the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// Directory identifier.
    pub id: String,
    /// Parent directory identifier, `None` at the root.
    pub parent_id: Option<String>,
    /// Display name of the directory.
    pub name: String,
    /// Whether the directory has no children.
    #[serde(default)]
    pub is_leaf: bool,
}

/// Raw customer record returned by the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// Customer identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Customer number as stored remotely.
    pub number: Option<String>,
    /// Customer kind such as `business` or `person`.
    pub kind: Option<String>,
}

/// Customer accepted into the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Normalized customer number.
    pub number: String,
}

/// Trim whitespace and strip leading zeros from a customer number.
#[must_use]
pub fn normalize_customer_number(raw: &str) -> String {
    raw.trim().trim_start_matches('0').to_string()
}

/// Canonical form of a destination directory path used for lookups.
#[must_use]
pub fn normalize_directory_path(raw: &str) -> String {
    raw.trim().trim_matches('/').to_lowercase()
}

/// Key used to decide when the delivery engine must drain and pause.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PacingKey {
    /// Destination customer identifier.
    pub customer_id: String,
    /// Destination directory identifier.
    pub directory_id: String,
}

impl PacingKey {
    /// Build a pacing key.
    #[must_use]
    pub fn new(customer_id: impl Into<String>, directory_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            directory_id: directory_id.into(),
        }
    }
}

/// Fully resolved upload sent to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Destination customer identifier.
    pub customer_id: String,
    /// Destination directory identifier.
    pub directory_id: String,
    /// Filename shown at the destination.
    pub name: String,
    /// Fiscal year.
    pub year: Option<u16>,
    /// Period token.
    pub period: Option<String>,
    /// Creation time of the source file.
    pub created_at: Option<DateTime<Utc>>,
    /// Parent item identifier.
    pub parent_id: Option<String>,
    /// File content.
    pub content: Vec<u8>,
}

impl UploadRequest {
    /// Pacing key of this request.
    #[must_use]
    pub fn pacing_key(&self) -> PacingKey {
        PacingKey::new(self.customer_id.clone(), self.directory_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_file_path_joins_with_slash() {
        let file = FileDescriptor::new("invoice.pdf", "/share/10 - Acme/2023", "10 - Acme\\2023/");
        assert_eq!(file.relative_path, "10 - Acme/2023");
        assert_eq!(file.relative_file_path(), "10 - Acme/2023/invoice.pdf");

        let top = FileDescriptor::new("readme.txt", "/share", "");
        assert_eq!(top.relative_file_path(), "readme.txt");
    }

    #[test]
    fn idempotency_source_prefers_remote_id() {
        let local = FileDescriptor::new("a.pdf", "/share/x/", "x");
        assert_eq!(local.idempotency_source(), "/share/x/a.pdf");

        let remote = local.with_remote_id("abc-123");
        assert_eq!(remote.idempotency_source(), "abc-123");
    }

    #[test]
    fn dest_dir_parses_skip_sentinel() {
        assert_eq!(DestDir::parse(" - "), DestDir::Skip);
        assert_eq!(
            DestDir::parse("Boekhouding/2023"),
            DestDir::Path("Boekhouding/2023".into())
        );
        assert_eq!(DestDir::Skip.to_string(), "-");
    }

    #[test]
    fn customer_numbers_lose_whitespace_and_leading_zeros() {
        assert_eq!(normalize_customer_number(" 0010 "), "10");
        assert_eq!(normalize_customer_number("10"), "10");
        assert_eq!(normalize_customer_number("000"), "");
    }

    #[test]
    fn deliverable_requires_all_coordinates() {
        let mut item = MigrationItem::from_descriptor(&FileDescriptor::new("a.pdf", "/x", ""));
        assert_eq!(item.source_filename, "a.pdf");
        assert!(!item.is_deliverable());

        item.customer_id = Some("C1".into());
        item.dest_dir_id = Some("D9".into());
        item.dest_dir = Some(DestDir::Skip);
        assert!(!item.is_deliverable());

        item.dest_dir = Some(DestDir::Path("facturen".into()));
        assert!(item.is_deliverable());
    }
}
