//! Adapter traits implemented by source and destination stores.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::{DestinationResult, SourceResult};
use crate::model::{CustomerRecord, DirectoryNode, FileDescriptor, UploadRequest};

/// Lazy stream of descriptors; each element may fail on its own.
pub type DescriptorStream<'a> = BoxStream<'a, SourceResult<FileDescriptor>>;

/// Store that files are migrated from.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Start a lazy, restartable listing under `root`.
    ///
    /// An error here means the root itself cannot be listed. Errors for single
    /// entries are yielded through the stream and do not end it.
    fn traverse<'a>(&'a self, root: &'a str) -> SourceResult<DescriptorStream<'a>>;

    /// Fetch the content of a previously listed file.
    async fn content(&self, file: &FileDescriptor) -> SourceResult<Vec<u8>>;
}

/// Read side of the destination document-management system.
#[async_trait]
pub trait DestinationApi: Send + Sync {
    /// List the directory tree, globally or for one customer.
    async fn list_directories(&self, customer_id: Option<&str>)
    -> DestinationResult<Vec<DirectoryNode>>;

    /// List every customer.
    async fn list_customers(&self) -> DestinationResult<Vec<CustomerRecord>>;

    /// Whether an item named `filename` already exists for the customer.
    async fn item_exists(&self, customer_id: &str, filename: &str) -> DestinationResult<bool>;
}

/// Write side of the destination: creates one item per call.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Create the item described by `request`.
    async fn upload(&self, request: &UploadRequest) -> DestinationResult<()>;
}
