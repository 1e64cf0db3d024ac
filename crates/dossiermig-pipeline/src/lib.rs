//! Transformation of file descriptors into destination-bound migration items.
//!
//! # Design
//!
//! - Mutators are pure steps run in a fixed order; each may abandon the item.
//! - Routine abandonment is a value ([`Step::Abandon`]); misconfiguration is an `Err`.
//! - Mapping templates are compiled once when the table is loaded.
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

// Layout: mutator/ (step trait, pipeline, concrete mutators), mapping/ (table,
// resolver, template generator), slug.rs, tokens.rs (year and period scanners).

pub mod error;
pub mod mapping;
pub mod mutator;
pub mod slug;
pub mod tokens;

pub use error::{PipelineError, PipelineResult};
pub use mapping::{
    GeneratorSummary, MappingEntry, MappingResolver, MappingTable, MappingTemplateGenerator,
    TemplateOutcome, fill_destination,
};
pub use mutator::{
    AbandonReason, CustomerAndRelativePath, CustomerNumberByPattern, DestDirFromMapping,
    DestDirFromRules, MapCustomerNumbers, Mutator, PeriodFromDescriptor, PeriodFromSourcePath,
    Pipeline, Step, YearFromDescriptor, YearFromFilename, YearFromSourcePath,
};
pub use slug::slugify;
