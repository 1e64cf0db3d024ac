//! Default values applied when a profile leaves a field out.

/// Uploads dispatched per delivery round.
pub const MAX_CONCURRENCY: usize = 3;
/// Attempts per upload before it is abandoned.
pub const MAX_ATTEMPTS: u32 = 3;
/// Pause after the first upload to a new customer/directory pair.
pub const PACING_SECS: u64 = 3;
/// Directory holding the run's state files.
pub const STATE_DIR: &str = ".";
/// Idempotency log file name.
pub const PROCESSED_LOG: &str = "processed_items.log";
/// Unmappable customer log file name.
pub const UNMAPPABLE_LOG: &str = "unmappable_customers.log";
/// Output file of the mapping template generator.
pub const MAPPING_TEMPLATE_OUTPUT: &str = "mapping_template.csv";
/// Profile path used when `DOSSIERMIG_PROFILE` is unset.
pub const PROFILE_PATH: &str = "dossiermig.json";
/// Log level used when neither `RUST_LOG` nor the profile sets one.
pub const LOG_LEVEL: &str = "info";
