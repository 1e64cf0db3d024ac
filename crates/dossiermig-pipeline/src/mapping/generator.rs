//! Produces a draft mapping table from the directories present in a source.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;

use dossiermig_core::{FileDescriptor, SourceProvider, normalize_customer_number};
use futures_util::StreamExt;
use regex::Regex;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::mutator::compile_customer_pattern;
use crate::tokens::find_year_span;

/// Result of deriving a template for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateOutcome {
    /// Directory template for the file.
    Template(String),
    /// The customer pattern did not match or captured no number.
    Unmatched,
    /// The customer is on the deny-list.
    Denied(String),
    /// The file sits directly in the customer directory.
    NoDirectory,
}

/// Counters reported after a generation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorSummary {
    /// Files inspected.
    pub files: usize,
    /// Templates appended to the output file.
    pub written: usize,
    /// Files that yielded no template.
    pub skipped: usize,
}

/// Turns relative directories into `{year}` templates, one line per distinct directory.
#[derive(Debug)]
pub struct MappingTemplateGenerator {
    pattern: Regex,
    deny: HashSet<String>,
}

impl MappingTemplateGenerator {
    /// Build a generator from the customer pattern and the deny-list.
    ///
    /// # Errors
    ///
    /// Returns pattern compilation and named group validation failures.
    pub fn new<I>(pattern: &str, deny: I) -> PipelineResult<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Ok(Self {
            pattern: compile_customer_pattern(pattern)?,
            deny: deny
                .into_iter()
                .map(|number| normalize_customer_number(number.as_ref()))
                .collect(),
        })
    }

    /// Template for one file: the captured relative directory with its first year replaced.
    #[must_use]
    pub fn template_for(&self, file: &FileDescriptor) -> TemplateOutcome {
        let path = file.relative_file_path();
        let Some(captures) = self.pattern.captures(&path) else {
            return TemplateOutcome::Unmatched;
        };
        let number = captures
            .name("number")
            .map(|m| normalize_customer_number(m.as_str()))
            .unwrap_or_default();
        if number.is_empty() {
            return TemplateOutcome::Unmatched;
        }
        if self.deny.contains(&number) {
            return TemplateOutcome::Denied(number);
        }

        let relative = captures.name("relativePath").map_or("", |m| m.as_str());
        let directory = relative
            .trim_matches('/')
            .rsplit_once('/')
            .map_or("", |(dir, _)| dir);
        let template = match find_year_span(directory) {
            Some((start, _)) => format!(
                "{}{{year}}{}",
                &directory[..start],
                &directory[start + 4..]
            ),
            None => directory.to_string(),
        };
        let template = template.trim_matches('/');
        if template.is_empty() {
            TemplateOutcome::NoDirectory
        } else {
            TemplateOutcome::Template(template.to_string())
        }
    }

    /// Traverse `root` and append every new template to `output`.
    ///
    /// Lines already present in `output` are not written again.
    ///
    /// # Errors
    ///
    /// Returns IO failures on the output file and traversal start failures.
    /// Errors for single source entries are logged and skipped.
    pub async fn generate<P>(
        &self,
        provider: &P,
        root: &str,
        output: &Path,
    ) -> PipelineResult<GeneratorSummary>
    where
        P: SourceProvider + ?Sized,
    {
        let mut known: HashSet<String> = match fs::read_to_string(output).await {
            Ok(text) => text.lines().map(|line| line.trim().to_string()).collect(),
            Err(err) if err.kind() == ErrorKind::NotFound => HashSet::new(),
            Err(err) => return Err(PipelineError::io("mapping.read_templates", output, err)),
        };
        let mut sink = OpenOptions::new()
            .create(true)
            .append(true)
            .open(output)
            .await
            .map_err(|err| PipelineError::io("mapping.open_templates", output, err))?;

        let mut summary = GeneratorSummary::default();
        let mut stream = provider
            .traverse(root)
            .map_err(|source| PipelineError::Source { source })?;

        while let Some(entry) = stream.next().await {
            let file = match entry {
                Ok(file) => file,
                Err(err) => {
                    warn!(error = %err, "source entry failed");
                    continue;
                }
            };
            summary.files += 1;
            match self.template_for(&file) {
                TemplateOutcome::Template(template) => {
                    if known.insert(template.clone()) {
                        sink.write_all(format!("{template}\n").as_bytes())
                            .await
                            .map_err(|err| PipelineError::io("mapping.write_template", output, err))?;
                        summary.written += 1;
                        info!(template = %template, "mapping template added");
                    }
                }
                TemplateOutcome::Denied(number) => {
                    summary.skipped += 1;
                    debug!(customer = %number, "deny-listed customer skipped");
                }
                TemplateOutcome::Unmatched => {
                    summary.skipped += 1;
                    warn!(file = %file.relative_file_path(), "customer pattern not matched");
                }
                TemplateOutcome::NoDirectory => summary.skipped += 1,
            }
        }
        sink.flush()
            .await
            .map_err(|err| PipelineError::io("mapping.flush_templates", output, err))?;
        Ok(summary)
    }
}
