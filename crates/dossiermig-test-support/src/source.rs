//! In-memory source provider.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dossiermig_core::{DescriptorStream, FileDescriptor, SourceError, SourceProvider, SourceResult};
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
enum Entry {
    File {
        descriptor: FileDescriptor,
        content: Option<Vec<u8>>,
    },
    Failure(String),
}

/// Source that yields a fixed list of descriptors in insertion order.
#[derive(Debug, Default)]
pub struct MemorySource {
    entries: Vec<Entry>,
    traversals: AtomicUsize,
    fetched: RwLock<Vec<String>>,
}

impl MemorySource {
    /// Empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a readable file.
    #[must_use]
    pub fn with_file(mut self, descriptor: FileDescriptor, content: impl Into<Vec<u8>>) -> Self {
        self.entries.push(Entry::File {
            descriptor,
            content: Some(content.into()),
        });
        self
    }

    /// Add a file whose content fetch fails.
    #[must_use]
    pub fn with_unreadable(mut self, descriptor: FileDescriptor) -> Self {
        self.entries.push(Entry::File {
            descriptor,
            content: None,
        });
        self
    }

    /// Add a listing entry that fails.
    #[must_use]
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.entries.push(Entry::Failure(message.into()));
        self
    }

    /// Number of traversals started.
    #[must_use]
    pub fn traversals(&self) -> usize {
        self.traversals.load(Ordering::SeqCst)
    }

    /// Absolute file paths whose content was requested, in order.
    pub async fn fetched(&self) -> Vec<String> {
        self.fetched.read().await.clone()
    }
}

#[async_trait]
impl SourceProvider for MemorySource {
    fn traverse<'a>(&'a self, _root: &'a str) -> SourceResult<DescriptorStream<'a>> {
        self.traversals.fetch_add(1, Ordering::SeqCst);
        let items = self.entries.iter().map(|entry| match entry {
            Entry::File { descriptor, .. } => Ok(descriptor.clone()),
            Entry::Failure(message) => Err(SourceError::backend(
                "memory.traverse",
                message.clone(),
            )),
        });
        Ok(stream::iter(items).boxed())
    }

    async fn content(&self, file: &FileDescriptor) -> SourceResult<Vec<u8>> {
        let key = file.absolute_file_path();
        self.fetched.write().await.push(key.clone());
        self.entries
            .iter()
            .find_map(|entry| match entry {
                Entry::File {
                    descriptor,
                    content,
                } if descriptor.absolute_file_path() == key => Some(content.clone()),
                _ => None,
            })
            .flatten()
            .ok_or_else(|| SourceError::backend("memory.content", format!("unreadable: {key}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn yields_entries_in_order_and_serves_content() -> anyhow::Result<()> {
        let source = MemorySource::new()
            .with_file(FileDescriptor::new("a.pdf", "/root/x", "x"), b"A".to_vec())
            .with_failure("boom")
            .with_unreadable(FileDescriptor::new("b.pdf", "/root/x", "x"));

        let entries: Vec<_> = source.traverse("/root")?.collect().await;
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_ok());
        assert!(entries[1].is_err());
        assert_eq!(source.traversals(), 1);

        let a = FileDescriptor::new("a.pdf", "/root/x", "x");
        assert_eq!(source.content(&a).await?, b"A".to_vec());
        let b = FileDescriptor::new("b.pdf", "/root/x", "x");
        assert!(source.content(&b).await.is_err());
        assert_eq!(source.fetched().await, vec!["/root/x/a.pdf", "/root/x/b.pdf"]);
        Ok(())
    }
}
