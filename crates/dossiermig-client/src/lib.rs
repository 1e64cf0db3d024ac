//! HTTP client for the destination document-management API.
//!
//! [`DestinationClient`] implements both the read side
//! ([`dossiermig_core::DestinationApi`]) and the multipart upload side
//! ([`dossiermig_core::UploadTransport`]) over one shared `reqwest` client.
//! [`DestinationSource`] reads a tenant's stored items back as a migration source.
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

// Layout: client.rs (requests + trait impls), source.rs (tenant as source), wire.rs (response payloads), error.rs.

pub mod client;
pub mod error;
pub mod source;
mod wire;

pub use client::{ClientSettings, DestinationClient};
pub use source::{DestinationSource, MISSING_DIRECTORY};
pub use error::{ClientError, ClientResult};
