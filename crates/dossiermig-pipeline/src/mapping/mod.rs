//! Template table that maps relative source directories onto destination folders.
//!
//! # Design
//!
//! - Source templates are literal prefixes with `{year}`, `{quarter}` and `{month}` holes.
//! - Matching is a case-insensitive prefix match on segment boundaries; first entry wins.
//! - Destination templates are trimmed and lower-cased; holes are filled from the item.

mod generator;
pub mod table;

use std::path::Path;

use dossiermig_core::DestDir;
use regex::{Regex, RegexBuilder};

use crate::error::{PipelineError, PipelineResult};

pub use generator::{GeneratorSummary, MappingTemplateGenerator, TemplateOutcome};

const YEAR_PLACEHOLDER: &str = "{year}";
const QUARTER_PLACEHOLDER: &str = "{quarter}";
const MONTH_PLACEHOLDER: &str = "{month}";

/// One row of a mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    /// Source directory template.
    pub source: String,
    /// Destination directory template, or `-` to skip.
    pub destination: String,
}

/// Ordered source → destination templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    entries: Vec<MappingEntry>,
}

impl MappingTable {
    /// Build a table from ordered pairs.
    #[must_use]
    pub fn from_pairs<I, S, D>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, D)>,
        S: Into<String>,
        D: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(source, destination)| MappingEntry {
                    source: source.into(),
                    destination: destination.into(),
                })
                .collect(),
        }
    }

    /// Load a `;` separated table file.
    ///
    /// # Errors
    ///
    /// Returns IO and parse failures from the table loader.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        Ok(Self::from_pairs(table::load_pairs(path)?))
    }

    /// Entries in table order.
    #[must_use]
    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
struct CompiledEntry {
    pattern: Regex,
    destination: String,
}

/// Mapping table with every source template compiled.
#[derive(Debug)]
pub struct MappingResolver {
    entries: Vec<CompiledEntry>,
}

impl MappingResolver {
    /// Compile every source template of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidPattern`] when a template produces an invalid expression.
    pub fn compile(table: &MappingTable) -> PipelineResult<Self> {
        let entries = table
            .entries()
            .iter()
            .map(|entry| {
                let source = source_pattern(&entry.source);
                let pattern = RegexBuilder::new(&source)
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| PipelineError::invalid_pattern("mapping.source", &source, err))?;
                Ok(CompiledEntry {
                    pattern,
                    destination: entry.destination.trim().trim_matches('/').to_lowercase(),
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Destination template of the first entry whose source template prefixes `relative_path`.
    #[must_use]
    pub fn resolve(&self, relative_path: &str) -> Option<&str> {
        let path = format!("{}/", relative_path.trim().trim_matches('/'));
        self.entries
            .iter()
            .find(|entry| entry.pattern.is_match(&path))
            .map(|entry| entry.destination.as_str())
    }

    /// Number of compiled entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry was compiled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn source_pattern(template: &str) -> String {
    let normalized = format!("{}/", template.trim().trim_matches('/').to_lowercase());
    let escaped = regex::escape(&normalized)
        .replace(&regex::escape(YEAR_PLACEHOLDER), r"\d{4}")
        .replace(&regex::escape(QUARTER_PLACEHOLDER), r"Q\d")
        .replace(&regex::escape(MONTH_PLACEHOLDER), r"\b(?:0?[1-9]|1[0-2])\b");
    format!("^{escaped}")
}

/// Fill destination holes from the item's year and period.
///
/// # Errors
///
/// Returns the name of the first placeholder that has no value.
pub fn fill_destination(
    template: &str,
    year: Option<u16>,
    period: Option<&str>,
) -> Result<DestDir, &'static str> {
    let mut filled = template.to_string();
    if filled.contains(YEAR_PLACEHOLDER) {
        let year = year.ok_or("year")?;
        filled = filled.replace(YEAR_PLACEHOLDER, &year.to_string());
    }
    if filled.contains(QUARTER_PLACEHOLDER) {
        let quarter = period
            .filter(|period| period.starts_with('q'))
            .ok_or("quarter")?;
        filled = filled.replace(QUARTER_PLACEHOLDER, quarter);
    }
    if filled.contains(MONTH_PLACEHOLDER) {
        let month = period
            .and_then(|period| period.strip_prefix('m'))
            .ok_or("month")?;
        filled = filled.replace(MONTH_PLACEHOLDER, month);
    }
    Ok(DestDir::parse(&filled))
}
