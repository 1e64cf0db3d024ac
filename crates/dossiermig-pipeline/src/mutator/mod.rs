//! Ordered transformation steps from a descriptor to a migration item.

mod calendar;
mod customer;
mod destination;

use std::fmt;

use dossiermig_core::{FileDescriptor, MigrationItem};
use regex::Regex;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

pub use calendar::{
    PeriodFromDescriptor, PeriodFromSourcePath, YearFromDescriptor, YearFromFilename,
    YearFromSourcePath,
};
pub use customer::{CustomerAndRelativePath, CustomerNumberByPattern, MapCustomerNumbers};
pub use destination::{DestDirFromMapping, DestDirFromRules};

const REQUIRED_GROUPS: [&str; 3] = ["number", "relativePath", "name"];

/// Why an item left the pipeline early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbandonReason {
    /// No destination customer number could be derived.
    CustomerNotFound {
        /// Mutator that gave up.
        mutator: &'static str,
    },
    /// A destination template needs a value the item does not carry.
    MissingPlaceholderValue {
        /// Placeholder name without braces.
        placeholder: &'static str,
    },
}

impl AbandonReason {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CustomerNotFound { .. } => "customer_not_found",
            Self::MissingPlaceholderValue { .. } => "missing_placeholder_value",
        }
    }
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CustomerNotFound { mutator } => write!(f, "customer not found ({mutator})"),
            Self::MissingPlaceholderValue { placeholder } => {
                write!(f, "no value for destination placeholder {{{placeholder}}}")
            }
        }
    }
}

/// Outcome of one mutator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Continue with the updated item.
    Continue(MigrationItem),
    /// Drop the item; the run goes on.
    Abandon(AbandonReason),
}

/// One transformation step.
pub trait Mutator: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Transform `item`, which was built from `file`.
    ///
    /// # Errors
    ///
    /// Returns an error for faults that must stop the run.
    fn apply(&self, file: &FileDescriptor, item: MigrationItem) -> PipelineResult<Step>;
}

/// Mutators applied in insertion order.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn Mutator>>,
}

impl Pipeline {
    /// Empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    #[must_use]
    pub fn with(mut self, step: impl Mutator + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Append a boxed step.
    pub fn push(&mut self, step: Box<dyn Mutator>) {
        self.steps.push(step);
    }

    /// Names of the configured steps in order.
    #[must_use]
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no step is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Build an item from `file` and run every step over it.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error raised by a step.
    pub fn run(&self, file: &FileDescriptor) -> PipelineResult<Step> {
        let mut item = MigrationItem::from_descriptor(file);
        for step in &self.steps {
            match step.apply(file, item)? {
                Step::Continue(next) => item = next,
                Step::Abandon(reason) => {
                    debug!(mutator = step.name(), reason = %reason, "item abandoned");
                    return Ok(Step::Abandon(reason));
                }
            }
        }
        Ok(Step::Continue(item))
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.step_names())
            .finish()
    }
}

pub(crate) fn compile(field: &'static str, pattern: &str) -> PipelineResult<Regex> {
    Regex::new(pattern).map_err(|err| PipelineError::invalid_pattern(field, pattern, err))
}

/// Compile a customer pattern and require the `number`, `relativePath` and `name` groups.
pub(crate) fn compile_customer_pattern(pattern: &str) -> PipelineResult<Regex> {
    let regex = compile("customer_pattern", pattern)?;
    for group in REQUIRED_GROUPS {
        if !regex.capture_names().flatten().any(|name| name == group) {
            return Err(PipelineError::MissingGroup {
                pattern: pattern.to_string(),
                group,
            });
        }
    }
    Ok(regex)
}

pub(crate) fn require_relative_dir<'a>(
    mutator: &'static str,
    file: &FileDescriptor,
    item: &'a MigrationItem,
) -> PipelineResult<&'a str> {
    item.relative_source_dir
        .as_deref()
        .filter(|dir| !dir.is_empty())
        .ok_or_else(|| PipelineError::MissingRelativeSourceDir {
            mutator,
            file: file.relative_file_path(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rename(&'static str);

    impl Mutator for Rename {
        fn name(&self) -> &'static str {
            "rename"
        }

        fn apply(&self, _file: &FileDescriptor, mut item: MigrationItem) -> PipelineResult<Step> {
            item.filename = format!("{}{}", self.0, item.filename);
            Ok(Step::Continue(item))
        }
    }

    struct GiveUp;

    impl Mutator for GiveUp {
        fn name(&self) -> &'static str {
            "give_up"
        }

        fn apply(&self, _file: &FileDescriptor, _item: MigrationItem) -> PipelineResult<Step> {
            Ok(Step::Abandon(AbandonReason::CustomerNotFound { mutator: "give_up" }))
        }
    }

    #[test]
    fn steps_run_in_order() -> PipelineResult<()> {
        let pipeline = Pipeline::new().with(Rename("a-")).with(Rename("b-"));
        let file = FileDescriptor::new("x.pdf", "/s", "");
        match pipeline.run(&file)? {
            Step::Continue(item) => {
                assert_eq!(item.filename, "b-a-x.pdf");
                assert_eq!(item.source_filename, "x.pdf");
            }
            Step::Abandon(reason) => panic!("unexpected abandon: {reason}"),
        }
        Ok(())
    }

    #[test]
    fn abandon_short_circuits() -> PipelineResult<()> {
        let pipeline = Pipeline::new().with(GiveUp).with(Rename("never-"));
        let file = FileDescriptor::new("x.pdf", "/s", "");
        assert_eq!(
            pipeline.run(&file)?,
            Step::Abandon(AbandonReason::CustomerNotFound { mutator: "give_up" })
        );
        assert_eq!(pipeline.step_names(), vec!["give_up", "rename"]);
        Ok(())
    }

    #[test]
    fn customer_patterns_need_all_groups() {
        let err = compile_customer_pattern(r"(?P<number>\d+)/(?P<relativePath>.*)").err();
        assert!(matches!(
            err,
            Some(PipelineError::MissingGroup { group: "name", .. })
        ));
        let err = compile_customer_pattern(r"(?P<number>\d+").err();
        assert!(matches!(err, Some(PipelineError::InvalidPattern { .. })));
        assert!(
            compile_customer_pattern(r"(?<number>\d+) - (?<name>[^/]+)/(?<relativePath>.*)")
                .is_ok()
        );
    }
}
