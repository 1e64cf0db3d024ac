//! Steps that choose the destination folder.

use dossiermig_core::{DestDir, FileDescriptor, MigrationItem};
use regex::Regex;

use super::{AbandonReason, Mutator, Step, compile, require_relative_dir};
use crate::error::PipelineResult;
use crate::mapping::{MappingResolver, MappingTable, fill_destination};
use crate::slug::slugify;

/// Resolves the destination folder through the mapping table.
///
/// When nothing matches and a fallback folder is configured, the item goes to
/// the fallback and its filename is prefixed with a slug of the source directory.
#[derive(Debug)]
pub struct DestDirFromMapping {
    resolver: MappingResolver,
    fallback: Option<String>,
}

impl DestDirFromMapping {
    /// Compile `table`; `fallback` is used when no entry matches.
    ///
    /// # Errors
    ///
    /// Returns template compilation failures.
    pub fn new(table: &MappingTable, fallback: Option<String>) -> PipelineResult<Self> {
        Ok(Self {
            resolver: MappingResolver::compile(table)?,
            fallback: fallback.filter(|dir| !dir.trim().is_empty()),
        })
    }
}

impl Mutator for DestDirFromMapping {
    fn name(&self) -> &'static str {
        "dest_dir_from_mapping"
    }

    fn apply(&self, file: &FileDescriptor, mut item: MigrationItem) -> PipelineResult<Step> {
        if item.customer_number.as_deref().is_none_or(str::is_empty) {
            return Ok(Step::Abandon(AbandonReason::CustomerNotFound {
                mutator: self.name(),
            }));
        }
        let relative = require_relative_dir(self.name(), file, &item)?;

        if let Some(template) = self.resolver.resolve(relative) {
            return match fill_destination(template, item.year, item.period.as_deref()) {
                Ok(dest) => {
                    item.dest_dir = Some(dest);
                    Ok(Step::Continue(item))
                }
                Err(placeholder) => Ok(Step::Abandon(AbandonReason::MissingPlaceholderValue {
                    placeholder,
                })),
            };
        }

        if let Some(fallback) = &self.fallback {
            item.dest_dir = Some(DestDir::parse(fallback));
            item.filename = format!("{}-{}", slugify(&file.relative_path), item.filename);
        }
        Ok(Step::Continue(item))
    }
}

/// Ordered regex rules on the relative source directory; the first match sets the folder.
#[derive(Debug)]
pub struct DestDirFromRules {
    rules: Vec<(Regex, DestDir)>,
}

impl DestDirFromRules {
    /// Compile `(pattern, destination)` rules; a destination of `-` skips the item.
    ///
    /// # Errors
    ///
    /// Returns the first pattern that fails to compile.
    pub fn new<I, P, D>(rules: I) -> PipelineResult<Self>
    where
        I: IntoIterator<Item = (P, D)>,
        P: AsRef<str>,
        D: AsRef<str>,
    {
        let rules = rules
            .into_iter()
            .map(|(pattern, dest)| {
                Ok((
                    compile("dest_dir_rule", pattern.as_ref())?,
                    DestDir::parse(dest.as_ref()),
                ))
            })
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(Self { rules })
    }
}

impl Mutator for DestDirFromRules {
    fn name(&self) -> &'static str {
        "dest_dir_from_rules"
    }

    fn apply(&self, file: &FileDescriptor, mut item: MigrationItem) -> PipelineResult<Step> {
        let relative = require_relative_dir(self.name(), file, &item)?;
        let matched = self
            .rules
            .iter()
            .find(|(pattern, _)| pattern.is_match(relative))
            .map(|(_, dest)| dest.clone());
        if let Some(dest) = matched {
            item.dest_dir = Some(dest);
        }
        Ok(Step::Continue(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    fn item_for(file: &FileDescriptor, number: Option<&str>, relative: Option<&str>) -> MigrationItem {
        let mut item = MigrationItem::from_descriptor(file);
        item.customer_number = number.map(str::to_string);
        item.relative_source_dir = relative.map(str::to_string);
        item
    }

    fn acme() -> FileDescriptor {
        FileDescriptor::new("invoice.pdf", "/share/10 - Acme/2023", "10 - Acme/2023")
    }

    #[test]
    fn mapping_sets_filled_destination() -> PipelineResult<()> {
        let table = MappingTable::from_pairs([("2023/", "Finance/{year}")]);
        let step = DestDirFromMapping::new(&table, None)?;
        let file = acme();
        let mut item = item_for(&file, Some("10"), Some("2023/invoice.pdf"));
        item.year = Some(2023);
        match step.apply(&file, item)? {
            Step::Continue(item) => {
                assert_eq!(item.dest_dir, Some(DestDir::Path("finance/2023".into())));
                assert_eq!(item.filename, "invoice.pdf");
            }
            Step::Abandon(reason) => panic!("unexpected abandon: {reason}"),
        }
        Ok(())
    }

    #[test]
    fn missing_year_abandons_the_item() -> PipelineResult<()> {
        let table = MappingTable::from_pairs([("{year}", "Finance/{year}")]);
        let step = DestDirFromMapping::new(&table, None)?;
        let file = acme();
        let item = item_for(&file, Some("10"), Some("2023/invoice.pdf"));
        assert_eq!(
            step.apply(&file, item)?,
            Step::Abandon(AbandonReason::MissingPlaceholderValue { placeholder: "year" })
        );
        Ok(())
    }

    #[test]
    fn fallback_prefixes_filename_with_slug() -> PipelineResult<()> {
        let table = MappingTable::from_pairs([("Facturen", "Finance")]);
        let step = DestDirFromMapping::new(&table, Some("Overig".into()))?;
        let file = acme();
        let item = item_for(&file, Some("10"), Some("2023/invoice.pdf"));
        let Step::Continue(item) = step.apply(&file, item)? else {
            panic!("expected item");
        };
        assert_eq!(item.dest_dir, Some(DestDir::Path("Overig".into())));
        assert_eq!(item.filename, "10-acme-2023-invoice.pdf");
        assert_eq!(item.source_filename, "invoice.pdf");
        Ok(())
    }

    #[test]
    fn no_match_without_fallback_leaves_destination_unset() -> PipelineResult<()> {
        let step = DestDirFromMapping::new(&MappingTable::default(), None)?;
        let file = acme();
        let item = item_for(&file, Some("10"), Some("2023/invoice.pdf"));
        let Step::Continue(item) = step.apply(&file, item)? else {
            panic!("expected item");
        };
        assert_eq!(item.dest_dir, None);
        Ok(())
    }

    #[test]
    fn mapping_preconditions() -> PipelineResult<()> {
        let step = DestDirFromMapping::new(&MappingTable::default(), None)?;
        let file = acme();
        assert!(matches!(
            step.apply(&file, item_for(&file, None, Some("2023")))?,
            Step::Abandon(AbandonReason::CustomerNotFound { .. })
        ));
        assert!(matches!(
            step.apply(&file, item_for(&file, Some("10"), None)),
            Err(PipelineError::MissingRelativeSourceDir { .. })
        ));
        Ok(())
    }

    #[test]
    fn rules_pick_first_match_and_honour_skip() -> PipelineResult<()> {
        let step = DestDirFromRules::new([
            (r"(?i)^prive", "-"),
            (r"(?i)factu", "Finance/Facturen"),
            (r".*", "Overig"),
        ])?;
        let file = acme();

        let Step::Continue(item) = step.apply(&file, item_for(&file, None, Some("Prive/x.pdf")))?
        else {
            panic!("expected item");
        };
        assert_eq!(item.dest_dir, Some(DestDir::Skip));

        let Step::Continue(item) =
            step.apply(&file, item_for(&file, None, Some("2023/Facturen/a.pdf")))?
        else {
            panic!("expected item");
        };
        assert_eq!(item.dest_dir, Some(DestDir::Path("Finance/Facturen".into())));

        assert!(step.apply(&file, item_for(&file, None, None)).is_err());
        Ok(())
    }
}
