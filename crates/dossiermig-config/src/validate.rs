//! Profile checks run before anything touches the source or destination.

use regex::Regex;
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{MutatorSpec, RunMode, RunProfile};

const CUSTOMER_GROUPS: [&str; 3] = ["number", "relativePath", "name"];
const LOG_FORMATS: [&str; 2] = ["json", "pretty"];

/// Reject profiles that cannot run.
///
/// Overlapping allow and deny lists are accepted with a warning; the deny-list
/// is applied after the allow-list.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] naming the first offending field.
pub fn validate_profile(profile: &RunProfile) -> ConfigResult<()> {
    if profile.source_root.trim().is_empty() {
        return Err(ConfigError::invalid(
            "source",
            "source_root",
            "must not be empty",
            None,
        ));
    }
    if profile.delivery.max_concurrency == 0 {
        return Err(ConfigError::invalid(
            "delivery",
            "max_concurrency",
            "must be greater than zero",
            Some("0".to_string()),
        ));
    }
    if profile.delivery.max_attempts == 0 {
        return Err(ConfigError::invalid(
            "delivery",
            "max_attempts",
            "must be greater than zero",
            Some("0".to_string()),
        ));
    }
    if profile.state.processed_log.trim().is_empty() {
        return Err(ConfigError::invalid(
            "state",
            "processed_log",
            "must not be empty",
            None,
        ));
    }
    if profile.state.unmappable_log.trim().is_empty() {
        return Err(ConfigError::invalid(
            "state",
            "unmappable_log",
            "must not be empty",
            None,
        ));
    }
    if let Some(format) = &profile.logging.format
        && !LOG_FORMATS.contains(&format.trim().to_ascii_lowercase().as_str())
    {
        return Err(ConfigError::invalid(
            "logging",
            "format",
            "must be json or pretty",
            Some(format.clone()),
        ));
    }

    for step in &profile.mutators {
        validate_step(step)?;
    }

    if let Some(pattern) = &profile.mapping_template.pattern {
        customer_pattern("mapping_template", pattern)?;
    }
    if profile.mode == RunMode::GenerateMapping && profile.template_pattern().is_none() {
        return Err(ConfigError::invalid(
            "mapping_template",
            "pattern",
            "generate-mapping needs a customer pattern",
            None,
        ));
    }

    let overlap: Vec<&String> = profile
        .allow_list
        .iter()
        .filter(|number| profile.deny_list.contains(number))
        .collect();
    if !overlap.is_empty() {
        warn!(numbers = ?overlap, "customers on both allow and deny list will be skipped");
    }
    Ok(())
}

fn validate_step(step: &MutatorSpec) -> ConfigResult<()> {
    match step {
        MutatorSpec::CustomerAndRelativePath { pattern } => {
            customer_pattern("mutators", pattern)?;
        }
        MutatorSpec::CustomerNumberByPattern { pattern } => {
            compile("mutators", pattern)?;
        }
        MutatorSpec::DestDirFromRules { rules } => {
            for rule in rules {
                compile("mutators", &rule.pattern)?;
            }
        }
        MutatorSpec::DestDirFromMapping { table, .. } | MutatorSpec::MapCustomerNumbers { table } => {
            if table.as_os_str().is_empty() {
                return Err(ConfigError::invalid(
                    "mutators",
                    "table",
                    "must not be empty",
                    None,
                ));
            }
        }
        MutatorSpec::YearFromSourcePath
        | MutatorSpec::YearFromFilename
        | MutatorSpec::PeriodFromSourcePath
        | MutatorSpec::YearFromDescriptor
        | MutatorSpec::PeriodFromDescriptor => {}
    }
    Ok(())
}

fn compile(section: &'static str, pattern: &str) -> ConfigResult<Regex> {
    Regex::new(pattern).map_err(|_| {
        ConfigError::invalid(
            section,
            "pattern",
            "regex does not compile",
            Some(pattern.to_string()),
        )
    })
}

fn customer_pattern(section: &'static str, pattern: &str) -> ConfigResult<()> {
    let regex = compile(section, pattern)?;
    let names: Vec<&str> = regex.capture_names().flatten().collect();
    if CUSTOMER_GROUPS.iter().all(|group| names.contains(group)) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            section,
            "pattern",
            "needs number, relativePath and name groups",
            Some(pattern.to_string()),
        ))
    }
}
