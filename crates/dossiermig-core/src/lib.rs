//! Shared migration domain types, source/destination contracts, and the destination index.
//!
//! # Design
//!
//! - Keep the data model free of transport details so every adapter shares one vocabulary.
//! - Source and destination stores are reached only through the async traits in [`service`].
//! - The [`index::DestinationIndex`] owns the per-run caches of remote directories and customers.
#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

// Layout: model/ (descriptors, items, requests), service/ (adapter traits),
// index/ (directory and customer caches), error.rs.

pub mod error;
pub mod index;
pub mod model;
pub mod service;

pub use error::{
    CoreError, CoreResult, DestinationError, DestinationResult, SourceError, SourceResult,
};
pub use index::{CustomerIndex, DestinationIndex, DirectoryEntry, DirectoryIndex, DirectoryScope};
pub use model::{
    Customer, CustomerRecord, DestDir, DirectoryNode, FileDescriptor, MigrationItem, PacingKey,
    UploadRequest, normalize_customer_number, normalize_directory_path,
};
pub use service::{DescriptorStream, DestinationApi, SourceProvider, UploadTransport};
