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
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Durable state that lets a migration resume across restarts.
//!
//! The idempotency log records every descriptor handed to the orchestrator;
//! the resumable traversal filters a source stream through it.

pub mod error;
pub mod log;
pub mod traversal;

pub use error::{RuntimeError, RuntimeResult};
pub use log::{IdempotencyLog, LogMode, UnmappableLog, idempotency_key};
pub use traversal::{ResumableTraversal, TraversalEntry};
