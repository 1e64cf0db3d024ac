//! Steps that derive or rewrite the customer number.

use std::collections::HashMap;
use std::path::Path;

use dossiermig_core::{FileDescriptor, MigrationItem, normalize_customer_number};
use regex::Regex;
use tracing::warn;

use super::{AbandonReason, Mutator, Step, compile, compile_customer_pattern};
use crate::error::PipelineResult;
use crate::mapping::table;

/// Extracts customer number and relative directory from the relative file path
/// using the `number`, `relativePath` and `name` named groups.
#[derive(Debug)]
pub struct CustomerAndRelativePath {
    pattern: Regex,
}

impl CustomerAndRelativePath {
    /// Compile and validate the pattern.
    ///
    /// # Errors
    ///
    /// Fails when the pattern does not compile or lacks a required group.
    pub fn new(pattern: &str) -> PipelineResult<Self> {
        Ok(Self {
            pattern: compile_customer_pattern(pattern)?,
        })
    }
}

impl Mutator for CustomerAndRelativePath {
    fn name(&self) -> &'static str {
        "customer_and_relative_path"
    }

    fn apply(&self, file: &FileDescriptor, mut item: MigrationItem) -> PipelineResult<Step> {
        let path = file.relative_file_path();
        let Some(captures) = self.pattern.captures(&path) else {
            return Ok(not_found(self.name()));
        };
        let number = captures
            .name("number")
            .map(|m| normalize_customer_number(m.as_str()))
            .unwrap_or_default();
        if number.is_empty() {
            return Ok(not_found(self.name()));
        }
        item.customer_number = Some(number);
        item.relative_source_dir = captures
            .name("relativePath")
            .map(|m| m.as_str().trim_matches('/').to_string());
        Ok(Step::Continue(item))
    }
}

/// Takes the last participating capture group of a pattern applied to the absolute file path.
#[derive(Debug)]
pub struct CustomerNumberByPattern {
    pattern: Regex,
}

impl CustomerNumberByPattern {
    /// Compile the pattern.
    ///
    /// # Errors
    ///
    /// Fails when the pattern does not compile.
    pub fn new(pattern: &str) -> PipelineResult<Self> {
        Ok(Self {
            pattern: compile("customer_number_pattern", pattern)?,
        })
    }
}

impl Mutator for CustomerNumberByPattern {
    fn name(&self) -> &'static str {
        "customer_number_by_pattern"
    }

    fn apply(&self, file: &FileDescriptor, mut item: MigrationItem) -> PipelineResult<Step> {
        let path = file.absolute_file_path();
        let Some(captures) = self.pattern.captures(&path) else {
            return Ok(not_found(self.name()));
        };
        let number = captures
            .iter()
            .flatten()
            .last()
            .map(|m| normalize_customer_number(m.as_str()))
            .unwrap_or_default();
        if number.is_empty() {
            return Ok(not_found(self.name()));
        }
        item.customer_number = Some(number);
        Ok(Step::Continue(item))
    }
}

/// Replaces the customer number through a two-column lookup table.
#[derive(Debug, Default)]
pub struct MapCustomerNumbers {
    table: HashMap<String, String>,
}

impl MapCustomerNumbers {
    /// Build from `(source number, destination number)` pairs; the first row for a number wins.
    #[must_use]
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut table = HashMap::new();
        for (source, destination) in pairs {
            let source = normalize_customer_number(&source);
            let destination = normalize_customer_number(&destination);
            if source.is_empty() || destination.is_empty() {
                continue;
            }
            if table.contains_key(&source) {
                warn!(customer = %source, "duplicate customer number mapping ignored");
                continue;
            }
            table.insert(source, destination);
        }
        Self { table }
    }

    /// Load the lookup table from a `;` separated file.
    ///
    /// # Errors
    ///
    /// Returns IO and parse failures from the table loader.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        Ok(Self::from_pairs(table::load_pairs(path)?))
    }

    /// Number of mapped customers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Mutator for MapCustomerNumbers {
    fn name(&self) -> &'static str {
        "map_customer_numbers"
    }

    fn apply(&self, _file: &FileDescriptor, mut item: MigrationItem) -> PipelineResult<Step> {
        let mapped = item
            .customer_number
            .as_deref()
            .and_then(|number| self.table.get(number))
            .cloned();
        match mapped {
            Some(number) => {
                item.customer_number = Some(number);
                Ok(Step::Continue(item))
            }
            None => Ok(not_found(self.name())),
        }
    }
}

const fn not_found(mutator: &'static str) -> Step {
    Step::Abandon(AbandonReason::CustomerNotFound { mutator })
}
