//! Batch delivery of resolved uploads to the destination.
//!
//! # Design
//!
//! - Requests are buffered and sent in rounds of at most `max_concurrency` in flight.
//! - A round always completes before its outcomes are acted on; failures requeue into the next buffer.
//! - The first request for a (customer, directory) pair drains everything and pauses, so the
//!   destination creates the folder once before parallel uploads reach it.
//! - Credential rejections are never retried and end the run after the round.
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

pub mod engine;
pub mod error;

pub use engine::{AbandonedUpload, DeliveryConfig, DeliveryEngine, DeliveryReport, RequestState};
pub use error::{DeliveryError, DeliveryResult};
