//! Source traversal filtered through the idempotency log.
//!
//! The traversal never records a key on its own. The consumer commits each
//! yielded key once the item is settled, so anything still in flight when a
//! run stops is traversed again by the next run.

use dossiermig_core::{DescriptorStream, FileDescriptor, SourceError, SourceProvider};
use futures_util::StreamExt;
use tracing::debug;

use crate::error::{RuntimeError, RuntimeResult};
use crate::log::{IdempotencyLog, idempotency_key};

/// One step of a resumable traversal.
#[derive(Debug)]
pub enum TraversalEntry {
    /// A descriptor not seen in any previous run.
    File {
        /// The descriptor.
        file: FileDescriptor,
        /// Key to hand to [`ResumableTraversal::commit`] once the item is settled.
        key: String,
    },
    /// The source failed to produce one entry; the traversal continues.
    Failed(SourceError),
}

/// Lazy descriptor sequence that skips already processed entries.
pub struct ResumableTraversal<'a> {
    stream: DescriptorStream<'a>,
    log: IdempotencyLog,
    skipped: usize,
}

impl<'a> ResumableTraversal<'a> {
    /// Start traversing `root` on `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Source`] when the provider cannot list the root.
    pub fn start<P>(provider: &'a P, root: &'a str, log: IdempotencyLog) -> RuntimeResult<Self>
    where
        P: SourceProvider + ?Sized,
    {
        let stream = provider
            .traverse(root)
            .map_err(|source| RuntimeError::Source {
                root: root.to_string(),
                source,
            })?;
        Ok(Self {
            stream,
            log,
            skipped: 0,
        })
    }

    /// Pull the next entry whose key is not in the log.
    pub async fn next_entry(&mut self) -> Option<TraversalEntry> {
        while let Some(result) = self.stream.next().await {
            let file = match result {
                Ok(file) => file,
                Err(err) => return Some(TraversalEntry::Failed(err)),
            };
            let key = idempotency_key(&file.idempotency_source());
            if self.log.contains(&key) {
                self.skipped += 1;
                debug!(file = %file.relative_file_path(), "already processed");
                continue;
            }
            return Some(TraversalEntry::File { file, key });
        }
        None
    }

    /// Mark a yielded entry as processed.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the key cannot be appended to the log.
    pub async fn commit(&mut self, key: String) -> RuntimeResult<()> {
        self.log.record(key).await.map(|_| ())
    }

    /// Entries skipped because the log already held their key.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Hand back the log.
    #[must_use]
    pub fn finish(self) -> IdempotencyLog {
        self.log
    }
}
