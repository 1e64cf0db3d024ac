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

//! Run profile model, JSON profile and environment loading, and validation.
//!
//! Layout: `model.rs` (typed run profile), `defaults.rs` (default values),
//! `loader.rs` (profile file + environment), `validate.rs` (profile checks).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    Credentials, ENV_ACCESS_TOKEN, ENV_BASE_URL, ENV_PROFILE, ENV_SOURCE_ACCESS_TOKEN,
    ENV_SOURCE_BASE_URL, ENV_SOURCE_TENANT, ENV_TENANT, load_profile, parse_profile,
    profile_path_from,
};
pub use model::{
    DedupMode, DeliverySettings, DirRule, LoggingSettings, MappingTemplateSettings, MutatorSpec,
    RunMode, RunProfile, SourceKind, StateSettings,
};
pub use validate::validate_profile;
