//! Process bootstrap: profile, logging, collaborators, and mode dispatch.
//!
//! # Design
//! - Profile and credentials are loaded once at startup.
//! - Each mode builds only what it needs; `generate-mapping` never talks to the destination.
//! - The binary entry point stays thin; everything here is testable with in-memory fakes.

use std::sync::Arc;

use dossiermig_client::{ClientSettings, DestinationClient, DestinationSource};
use dossiermig_config::{
    Credentials, MutatorSpec, RunMode, RunProfile, SourceKind, load_profile, profile_path_from,
};
use dossiermig_core::{DestinationApi, SourceProvider, UploadTransport};
use dossiermig_delivery::{DeliveryConfig, DeliveryEngine};
use dossiermig_pipeline::{
    CustomerAndRelativePath, CustomerNumberByPattern, DestDirFromMapping, DestDirFromRules,
    GeneratorSummary, MapCustomerNumbers, MappingTable, MappingTemplateGenerator, Mutator,
    PeriodFromDescriptor, PeriodFromSourcePath, Pipeline, PipelineError, YearFromDescriptor,
    YearFromFilename, YearFromSourcePath,
};
use dossiermig_runtime::{IdempotencyLog, LogMode, UnmappableLog};
use dossiermig_source::LocalSource;
use dossiermig_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics, init_logging};
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::orchestrator::{Migrator, MigratorDeps, MigratorSettings, RunSummary};

/// Build the mutator pipeline described by the profile, in order.
///
/// # Errors
///
/// Returns pattern compilation failures and mapping table load failures.
pub fn build_pipeline(specs: &[MutatorSpec]) -> AppResult<Pipeline> {
    let mut pipeline = Pipeline::new();
    for spec in specs {
        pipeline.push(build_step(spec).map_err(|err| AppError::pipeline("pipeline.build", err))?);
    }
    info!(steps = ?pipeline.step_names(), "pipeline assembled");
    Ok(pipeline)
}

fn build_step(spec: &MutatorSpec) -> Result<Box<dyn Mutator>, PipelineError> {
    let step: Box<dyn Mutator> = match spec {
        MutatorSpec::CustomerAndRelativePath { pattern } => {
            Box::new(CustomerAndRelativePath::new(pattern)?)
        }
        MutatorSpec::CustomerNumberByPattern { pattern } => {
            Box::new(CustomerNumberByPattern::new(pattern)?)
        }
        MutatorSpec::YearFromSourcePath => Box::new(YearFromSourcePath),
        MutatorSpec::YearFromFilename => Box::new(YearFromFilename),
        MutatorSpec::PeriodFromSourcePath => Box::new(PeriodFromSourcePath),
        MutatorSpec::YearFromDescriptor => Box::new(YearFromDescriptor),
        MutatorSpec::PeriodFromDescriptor => Box::new(PeriodFromDescriptor),
        MutatorSpec::DestDirFromMapping { table, fallback } => {
            let table = MappingTable::load(table)?;
            Box::new(DestDirFromMapping::new(&table, fallback.clone())?)
        }
        MutatorSpec::DestDirFromRules { rules } => Box::new(DestDirFromRules::new(
            rules
                .iter()
                .map(|rule| (rule.pattern.as_str(), rule.dest.as_str())),
        )?),
        MutatorSpec::MapCustomerNumbers { table } => Box::new(MapCustomerNumbers::load(table)?),
    };
    Ok(step)
}

/// Append mapping templates for every directory under the source root.
///
/// # Errors
///
/// Returns an error when no customer pattern is configured, the pattern is
/// invalid, or the output file cannot be written.
pub async fn generate_mapping<S>(profile: &RunProfile, source: &S) -> AppResult<GeneratorSummary>
where
    S: SourceProvider + ?Sized,
{
    let pattern = profile.template_pattern().ok_or_else(|| {
        AppError::config(
            "mapping.pattern",
            dossiermig_config::ConfigError::InvalidField {
                section: "mapping_template",
                field: "pattern",
                reason: "no customer pattern configured",
                value: None,
            },
        )
    })?;
    let generator = MappingTemplateGenerator::new(pattern, &profile.deny_list)
        .map_err(|err| AppError::pipeline("mapping.generator", err))?;
    let output = &profile.mapping_template.output;
    let summary = generator
        .generate(source, &profile.source_root, output)
        .await
        .map_err(|err| AppError::pipeline("mapping.generate", err))?;
    info!(
        output = %output.display(),
        files = summary.files,
        written = summary.written,
        skipped = summary.skipped,
        "mapping templates generated"
    );
    Ok(summary)
}

/// Run a migration against the given source and destination.
///
/// # Errors
///
/// Returns any fatal run error; see [`Migrator::run`].
pub async fn migrate<S, D>(
    profile: &RunProfile,
    source: Arc<S>,
    destination: Arc<D>,
    metrics: Metrics,
) -> AppResult<RunSummary>
where
    S: SourceProvider + ?Sized,
    D: DestinationApi + UploadTransport + ?Sized,
{
    let pipeline = build_pipeline(&profile.mutators)?;
    let mode = if profile.dry_run {
        LogMode::ReadOnly
    } else {
        LogMode::Append
    };
    let log = IdempotencyLog::open(profile.state.processed_log_path(), mode)
        .await
        .map_err(|err| AppError::runtime("state.processed_log", err))?;
    let unmappable = UnmappableLog::open(profile.state.unmappable_log_path())
        .await
        .map_err(|err| AppError::runtime("state.unmappable_log", err))?;

    let config = DeliveryConfig {
        max_concurrency: profile.delivery.max_concurrency,
        max_attempts: profile.delivery.max_attempts,
        pacing: profile.delivery.pacing(),
    };
    let delivery = DeliveryEngine::new(Arc::clone(&destination), config)
        .map_err(|err| AppError::delivery("delivery.new", err))?
        .with_metrics(metrics.clone());

    let deps = MigratorDeps {
        source,
        api: destination,
        delivery,
        unmappable,
        metrics,
    };
    Migrator::new(deps, pipeline, MigratorSettings::from_profile(profile))
        .run(log)
        .await
}

/// Entry point used by the binary.
///
/// # Errors
///
/// Returns profile, credential, telemetry, and run failures.
pub async fn run_app() -> AppResult<()> {
    let lookup = |variable: &str| std::env::var(variable).ok();
    let profile_path = profile_path_from(lookup);
    let profile =
        load_profile(&profile_path).map_err(|err| AppError::config("profile.load", err))?;

    let logging = LoggingConfig {
        level: &profile.logging.level,
        format: LogFormat::parse(profile.logging.format.as_deref()),
        build_sha: option_env!("DOSSIERMIG_BUILD_SHA").unwrap_or("dev"),
    };
    init_logging(&logging).map_err(|source| AppError::Telemetry {
        operation: "telemetry.init",
        source,
    })?;
    let run_id = uuid::Uuid::new_v4().to_string();
    let _context = GlobalContextGuard::new(run_id, profile.mode.as_str());
    info!(profile = %profile_path.display(), mode = profile.mode.as_str(), "starting");

    let result = dispatch(&profile).await;
    if let Err(err) = &result {
        error!(
            error = %err,
            unauthorized = err.is_unauthorized(),
            "run failed"
        );
    }
    result
}

/// Source provider named by the profile.
///
/// `lookup` maps an environment variable name to its value.
///
/// # Errors
///
/// Returns credential and client setup failures for the destination source.
pub fn select_source<F>(profile: &RunProfile, lookup: F) -> AppResult<Arc<dyn SourceProvider>>
where
    F: Fn(&str) -> Option<String>,
{
    match profile.source {
        SourceKind::Local => Ok(Arc::new(LocalSource::new())),
        SourceKind::Destination => {
            let credentials = Credentials::source_from_lookup(lookup)
                .map_err(|err| AppError::config("credentials.source", err))?;
            info!(tenant = %credentials.tenant, "reading from destination tenant");
            Ok(Arc::new(DestinationSource::new(connect(credentials)?)))
        }
    }
}

fn connect(credentials: Credentials) -> AppResult<DestinationClient> {
    let settings = ClientSettings::new(
        credentials.base_url,
        credentials.access_token,
        credentials.tenant,
    );
    DestinationClient::new(&settings).map_err(|source| AppError::Client {
        operation: "client.new",
        source,
    })
}

async fn dispatch(profile: &RunProfile) -> AppResult<()> {
    let source = select_source(profile, |variable| std::env::var(variable).ok())?;
    match profile.mode {
        RunMode::GenerateMapping => {
            generate_mapping(profile, &*source).await?;
        }
        RunMode::Migrate => {
            let credentials =
                Credentials::from_env().map_err(|err| AppError::config("credentials.env", err))?;
            let client = connect(credentials)?;
            let metrics = Metrics::new().map_err(|source| AppError::Telemetry {
                operation: "metrics.new",
                source,
            })?;
            let summary = migrate(profile, source, Arc::new(client), metrics.clone()).await?;
            info!(?summary, "run summary");
            match metrics.render() {
                Ok(rendered) => info!(metrics = %rendered, "run metrics"),
                Err(err) => error!(error = %err, "metrics rendering failed"),
            }
        }
    }
    Ok(())
}
