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

//! Dossier migration application wiring.
//!
//! Layout: `bootstrap.rs` (profile, logging, mode dispatch), `orchestrator.rs` (per-item migration flow).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application error type.
pub mod error;
/// Migration orchestrator.
pub mod orchestrator;

mod dedup;

pub use bootstrap::{build_pipeline, generate_mapping, migrate, run_app};
pub use error::{AppError, AppResult};
pub use orchestrator::{Migrator, MigratorDeps, MigratorSettings, RunSummary};
