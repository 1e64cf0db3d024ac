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

//! Shared fakes used by unit tests across the workspace.
//! Layout: source.rs (in-memory source provider), destination.rs (recording destination and transport).

pub mod destination;
pub mod source;

pub use destination::RecordingDestination;
pub use source::MemorySource;
