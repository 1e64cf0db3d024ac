//! Typed run profile.
//!
//! # Design
//! - Pure data carriers deserialized from the JSON profile.
//! - Every field has a default so a profile only states what differs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use dossiermig_core::DirectoryScope;
use serde::{Deserialize, Serialize};

use crate::defaults;

/// What a run does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Traverse, transform, and deliver.
    #[default]
    Migrate,
    /// Write destination mapping templates for the source tree.
    GenerateMapping,
}

impl RunMode {
    /// Name as written in the profile.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Migrate => "migrate",
            Self::GenerateMapping => "generate-mapping",
        }
    }
}

/// Where migrated files are read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Walk a local or mounted directory tree rooted at `source_root`.
    #[default]
    Local,
    /// Read stored items from a destination tenant; `source_root` lists
    /// customer numbers, or `*` for all of them.
    Destination,
}

/// How already-delivered documents are suppressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    /// No suppression beyond the idempotency log.
    #[default]
    Off,
    /// Ask the destination whether the customer already holds the filename.
    Remote,
    /// Suppress repeats of the same customer and filename within one run.
    Run,
}

/// One `pattern -> destination` rule for [`MutatorSpec::DestDirFromRules`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirRule {
    /// Regex matched against the relative source directory.
    pub pattern: String,
    /// Destination folder, or `-` to skip.
    pub dest: String,
}

/// Declarative form of one mutator step, in pipeline order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutatorSpec {
    /// Customer number and relative directory from named groups.
    CustomerAndRelativePath {
        /// Regex with `number`, `relativePath` and `name` groups.
        pattern: String,
    },
    /// Customer number from the last participating group.
    CustomerNumberByPattern {
        /// Regex matched against the absolute file path.
        pattern: String,
    },
    /// Year token from the relative source directory.
    YearFromSourcePath,
    /// Year token from the filename.
    YearFromFilename,
    /// Quarter or month token from the relative source directory.
    PeriodFromSourcePath,
    /// Year tracked by the source.
    YearFromDescriptor,
    /// Period tracked by the source.
    PeriodFromDescriptor,
    /// Destination folder from a mapping table.
    DestDirFromMapping {
        /// `;` separated `source;destination` table.
        table: PathBuf,
        /// Folder used when no template matches.
        #[serde(default)]
        fallback: Option<String>,
    },
    /// Destination folder from ordered regex rules.
    DestDirFromRules {
        /// Rules tried in order.
        rules: Vec<DirRule>,
    },
    /// Customer number replaced through a two-column table.
    MapCustomerNumbers {
        /// `;` separated `source;destination` table.
        table: PathBuf,
    },
}

impl MutatorSpec {
    /// Stable identifier matching the serialized `kind`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CustomerAndRelativePath { .. } => "customer_and_relative_path",
            Self::CustomerNumberByPattern { .. } => "customer_number_by_pattern",
            Self::YearFromSourcePath => "year_from_source_path",
            Self::YearFromFilename => "year_from_filename",
            Self::PeriodFromSourcePath => "period_from_source_path",
            Self::YearFromDescriptor => "year_from_descriptor",
            Self::PeriodFromDescriptor => "period_from_descriptor",
            Self::DestDirFromMapping { .. } => "dest_dir_from_mapping",
            Self::DestDirFromRules { .. } => "dest_dir_from_rules",
            Self::MapCustomerNumbers { .. } => "map_customer_numbers",
        }
    }
}

/// Delivery engine limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    /// Uploads dispatched per round.
    pub max_concurrency: usize,
    /// Attempts per upload.
    pub max_attempts: u32,
    /// Pause in seconds after the first upload to a new customer/directory pair.
    pub pacing_secs: u64,
}

impl DeliverySettings {
    /// Pacing interval as a duration.
    #[must_use]
    pub const fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            max_concurrency: defaults::MAX_CONCURRENCY,
            max_attempts: defaults::MAX_ATTEMPTS,
            pacing_secs: defaults::PACING_SECS,
        }
    }
}

/// Location of the files that survive between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    /// Directory holding the state files.
    pub dir: PathBuf,
    /// Idempotency log file name.
    pub processed_log: String,
    /// Unmappable customer log file name.
    pub unmappable_log: String,
}

impl StateSettings {
    /// Full path of the idempotency log.
    #[must_use]
    pub fn processed_log_path(&self) -> PathBuf {
        self.dir.join(&self.processed_log)
    }

    /// Full path of the unmappable customer log.
    #[must_use]
    pub fn unmappable_log_path(&self) -> PathBuf {
        self.dir.join(&self.unmappable_log)
    }
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(defaults::STATE_DIR),
            processed_log: defaults::PROCESSED_LOG.to_string(),
            unmappable_log: defaults::UNMAPPABLE_LOG.to_string(),
        }
    }
}

/// Settings for the `generate-mapping` mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingTemplateSettings {
    /// Customer pattern; falls back to the first `customer_and_relative_path` step.
    pub pattern: Option<String>,
    /// File the templates are appended to.
    pub output: PathBuf,
}

impl Default for MappingTemplateSettings {
    fn default() -> Self {
        Self {
            pattern: None,
            output: PathBuf::from(defaults::MAPPING_TEMPLATE_OUTPUT),
        }
    }
}

/// Log output settings; `RUST_LOG` still wins over `level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Fallback filter directive.
    pub level: String,
    /// `json` or `pretty`; inferred from the build profile when absent.
    pub format: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            format: None,
        }
    }
}

/// Everything a run needs apart from credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunProfile {
    /// Run mode.
    pub mode: RunMode,
    /// Source provider.
    pub source: SourceKind,
    /// Traversal root handed to the source provider.
    pub source_root: String,
    /// Customer numbers allowed through; empty allows everyone.
    pub allow_list: Vec<String>,
    /// Customer numbers never migrated.
    pub deny_list: Vec<String>,
    /// Stop before fetching content and uploading.
    pub dry_run: bool,
    /// Duplicate suppression mode.
    pub dedup: DedupMode,
    /// Whether destination directories are global or per customer.
    pub directory_scope: DirectoryScope,
    /// Delivery engine limits.
    pub delivery: DeliverySettings,
    /// State file locations.
    pub state: StateSettings,
    /// Mutator steps in order.
    pub mutators: Vec<MutatorSpec>,
    /// Template generator settings.
    pub mapping_template: MappingTemplateSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl Default for RunProfile {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            source: SourceKind::default(),
            source_root: String::new(),
            allow_list: Vec::new(),
            deny_list: Vec::new(),
            dry_run: true,
            dedup: DedupMode::default(),
            directory_scope: DirectoryScope::default(),
            delivery: DeliverySettings::default(),
            state: StateSettings::default(),
            mutators: Vec::new(),
            mapping_template: MappingTemplateSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl RunProfile {
    /// Pattern used by the template generator, if any is configured.
    #[must_use]
    pub fn template_pattern(&self) -> Option<&str> {
        self.mapping_template.pattern.as_deref().or_else(|| {
            self.mutators.iter().find_map(|step| match step {
                MutatorSpec::CustomerAndRelativePath { pattern } => Some(pattern.as_str()),
                _ => None,
            })
        })
    }

    /// Resolve relative table paths in mutator steps against `base`.
    pub fn resolve_tables(&mut self, base: &Path) {
        for step in &mut self.mutators {
            match step {
                MutatorSpec::DestDirFromMapping { table, .. }
                | MutatorSpec::MapCustomerNumbers { table } => {
                    if table.is_relative() {
                        *table = base.join(&*table);
                    }
                }
                _ => {}
            }
        }
    }
}
