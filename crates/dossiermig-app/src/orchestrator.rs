//! Migration orchestrator: traversal, pipeline, filters, resolution, and delivery.
//!
//! Per item the order is fixed: pipeline, allow-list, deny-list, skip sentinel,
//! destination directory present, customer id, dedup, directory id, dry-run stop,
//! content fetch, submit. Routine skips are counted; everything else ends the run.
//!
//! An item's idempotency key is committed once the item is settled: skipped and
//! dry-run items at once, uploads when the engine reports them fulfilled or
//! abandoned. Uploads still buffered when a run aborts are traversed again.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dossiermig_config::{DedupMode, RunProfile};
use dossiermig_core::{
    DestDir, DestinationApi, DestinationIndex, DirectoryScope, FileDescriptor, SourceProvider,
    UploadRequest, UploadTransport, normalize_customer_number,
};
use dossiermig_delivery::{DeliveryEngine, DeliveryReport};
use dossiermig_pipeline::{Pipeline, Step};
use dossiermig_runtime::{IdempotencyLog, ResumableTraversal, TraversalEntry, UnmappableLog};
use dossiermig_telemetry::Metrics;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dedup::DedupPolicy;
use crate::error::{AppError, AppResult};

/// Filters and switches that shape one migration run.
#[derive(Debug, Clone, Default)]
pub struct MigratorSettings {
    /// Traversal root.
    pub source_root: String,
    /// Normalized customer numbers allowed through; empty allows everyone.
    pub allow_list: HashSet<String>,
    /// Normalized customer numbers never migrated.
    pub deny_list: HashSet<String>,
    /// Stop each item before its content is fetched.
    pub dry_run: bool,
    /// Duplicate suppression mode.
    pub dedup: DedupMode,
    /// Destination directory scope.
    pub directory_scope: DirectoryScope,
}

impl MigratorSettings {
    /// Settings taken from a run profile, customer numbers normalized.
    #[must_use]
    pub fn from_profile(profile: &RunProfile) -> Self {
        let normalize = |numbers: &[String]| {
            numbers
                .iter()
                .map(|number| normalize_customer_number(number))
                .filter(|number| !number.is_empty())
                .collect()
        };
        Self {
            source_root: profile.source_root.clone(),
            allow_list: normalize(&profile.allow_list),
            deny_list: normalize(&profile.deny_list),
            dry_run: profile.dry_run,
            dedup: profile.dedup,
            directory_scope: profile.directory_scope,
        }
    }
}

/// Collaborators owned by a [`Migrator`].
pub struct MigratorDeps<S: ?Sized, A: ?Sized, T: ?Sized> {
    /// Where files come from.
    pub source: Arc<S>,
    /// Read side of the destination.
    pub api: Arc<A>,
    /// Upload engine over the write side of the destination.
    pub delivery: DeliveryEngine<T>,
    /// Log of customer numbers the destination does not know.
    pub unmappable: UnmappableLog,
    /// Run counters.
    pub metrics: Metrics,
}

/// Totals reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Descriptors that entered the pipeline.
    pub seen: usize,
    /// Descriptors skipped because an earlier run processed them.
    pub resumed: usize,
    /// Items dropped by a filter or a routine failure.
    pub skipped: usize,
    /// Items that stopped at the dry-run point.
    pub dry_run: usize,
    /// Items handed to the delivery engine.
    pub submitted: usize,
    /// Uploads accepted by the destination.
    pub delivered: usize,
    /// Failed attempts that were retried.
    pub retried: usize,
    /// Uploads given up after the last attempt.
    pub abandoned: usize,
    /// Source entries that could not be listed.
    pub source_failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Submitted(Uuid),
    DryRun,
    Skipped(&'static str),
}

/// Drives one migration run from traversal to the final delivery report.
pub struct Migrator<S: ?Sized, A: ?Sized, T: ?Sized> {
    source: Arc<S>,
    api: Arc<A>,
    delivery: DeliveryEngine<T>,
    unmappable: UnmappableLog,
    metrics: Metrics,
    pipeline: Pipeline,
    index: DestinationIndex,
    dedup: DedupPolicy,
    settings: MigratorSettings,
}

impl<S, A, T> Migrator<S, A, T>
where
    S: SourceProvider + ?Sized,
    A: DestinationApi + ?Sized,
    T: UploadTransport + ?Sized,
{
    /// Assemble a migrator.
    #[must_use]
    pub fn new(deps: MigratorDeps<S, A, T>, pipeline: Pipeline, settings: MigratorSettings) -> Self {
        Self {
            source: deps.source,
            api: deps.api,
            delivery: deps.delivery,
            unmappable: deps.unmappable,
            metrics: deps.metrics,
            pipeline,
            index: DestinationIndex::new(settings.directory_scope),
            dedup: DedupPolicy::new(settings.dedup),
            settings,
        }
    }

    /// Run the migration to completion.
    ///
    /// The idempotency log is handed to the traversal. Keys of settled items are
    /// committed even when the run ends with an error.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: index loading, pipeline faults, missing or
    /// unknown destination directories, state log IO, and credential rejections.
    pub async fn run(mut self, log: IdempotencyLog) -> AppResult<RunSummary> {
        self.index
            .preload(&*self.api)
            .await
            .map_err(|err| AppError::index("index.preload", err))?;

        let source = Arc::clone(&self.source);
        let root = self.settings.source_root.clone();
        let mut traversal = ResumableTraversal::start(&*source, &root, log)
            .map_err(|err| AppError::runtime("traversal.start", err))?;
        info!(
            root = %root,
            dry_run = self.settings.dry_run,
            steps = ?self.pipeline.step_names(),
            "migration started"
        );

        let mut summary = RunSummary::default();
        let mut in_flight = HashMap::new();
        let driven = self
            .drive(&mut traversal, &mut in_flight, &mut summary)
            .await;
        let committed = self.commit_settled(&mut traversal, &mut in_flight).await;
        let report = driven?;
        committed?;
        summary.resumed = traversal.skipped();

        summary.delivered = report.fulfilled;
        summary.retried = report.retried;
        summary.abandoned = report.abandoned.len();
        info!(
            seen = summary.seen,
            resumed = summary.resumed,
            skipped = summary.skipped,
            dry_run = summary.dry_run,
            delivered = summary.delivered,
            retried = summary.retried,
            abandoned = summary.abandoned,
            source_failures = summary.source_failures,
            unmappable = self.unmappable.len(),
            "migration finished"
        );
        Ok(summary)
    }

    async fn drive(
        &mut self,
        traversal: &mut ResumableTraversal<'_>,
        in_flight: &mut HashMap<Uuid, String>,
        summary: &mut RunSummary,
    ) -> AppResult<DeliveryReport> {
        while let Some(entry) = traversal.next_entry().await {
            let (file, key) = match entry {
                TraversalEntry::File { file, key } => (file, key),
                TraversalEntry::Failed(err) => {
                    warn!(error = %err, "source entry failed");
                    summary.source_failures += 1;
                    continue;
                }
            };
            summary.seen += 1;
            self.metrics.inc_item_seen();

            match self.process(&file).await? {
                Disposition::Submitted(id) => {
                    summary.submitted += 1;
                    in_flight.insert(id, key);
                    self.commit_settled(traversal, in_flight).await?;
                }
                Disposition::DryRun => {
                    summary.dry_run += 1;
                    commit(traversal, key).await?;
                }
                Disposition::Skipped(reason) => {
                    summary.skipped += 1;
                    self.metrics.inc_item_skipped(reason);
                    debug!(file = %file.relative_file_path(), reason, "item skipped");
                    commit(traversal, key).await?;
                }
            }
        }

        self.delivery
            .finalize()
            .await
            .map_err(|err| AppError::delivery("delivery.finalize", err))
    }

    async fn commit_settled(
        &mut self,
        traversal: &mut ResumableTraversal<'_>,
        in_flight: &mut HashMap<Uuid, String>,
    ) -> AppResult<()> {
        for id in self.delivery.take_settled() {
            if let Some(key) = in_flight.remove(&id) {
                commit(traversal, key).await?;
            }
        }
        Ok(())
    }

    async fn process(&mut self, file: &FileDescriptor) -> AppResult<Disposition> {
        let path = file.relative_file_path();
        let mut item = match self
            .pipeline
            .run(file)
            .map_err(|err| AppError::pipeline("pipeline.run", err))?
        {
            Step::Continue(item) => item,
            Step::Abandon(reason) => {
                info!(file = %path, reason = %reason, "item abandoned by pipeline");
                return Ok(Disposition::Skipped(reason.label()));
            }
        };

        let number = item.customer_number.clone().unwrap_or_default();
        if !self.settings.allow_list.is_empty() && !self.settings.allow_list.contains(&number) {
            return Ok(Disposition::Skipped("not_allowed"));
        }
        if self.settings.deny_list.contains(&number) {
            return Ok(Disposition::Skipped("denied"));
        }

        let dest_path = match &item.dest_dir {
            Some(DestDir::Skip) => return Ok(Disposition::Skipped("skip_sentinel")),
            Some(DestDir::Path(dest)) => dest.clone(),
            None => return Err(AppError::MissingDestination { file: path }),
        };

        if number.is_empty() {
            return Ok(Disposition::Skipped("customer_not_found"));
        }
        let customer = self
            .index
            .customer(&*self.api, &number)
            .await
            .map_err(|err| AppError::index("index.customer", err))?
            .map(|customer| customer.id.clone());
        let Some(customer_id) = customer else {
            let first = self
                .unmappable
                .record(&number)
                .await
                .map_err(|err| AppError::runtime("unmappable.record", err))?;
            if first {
                warn!(customer = %number, file = %path, "customer number unknown at destination");
            }
            return Ok(Disposition::Skipped("unmappable_customer"));
        };

        if self
            .dedup
            .is_duplicate(&*self.api, &customer_id, &item.filename)
            .await
            .map_err(|source| AppError::Destination {
                operation: "dedup.item_exists",
                source,
            })?
        {
            info!(file = %path, customer_id = %customer_id, "already present at destination");
            return Ok(Disposition::Skipped("duplicate"));
        }

        let directory = self
            .index
            .directory(&*self.api, &customer_id, &dest_path)
            .await
            .map_err(|err| AppError::index("index.directory", err))?
            .map(|entry| entry.id.clone());
        let Some(directory_id) = directory else {
            return Err(AppError::UnknownDirectory {
                file: path,
                customer_id,
                path: dest_path,
            });
        };
        item.customer_id = Some(customer_id.clone());
        item.dest_dir_id = Some(directory_id.clone());
        if !item.is_deliverable() {
            return Err(AppError::MissingDestination { file: path });
        }

        if self.settings.dry_run {
            info!(
                file = %path,
                customer_id = %customer_id,
                directory = %dest_path,
                directory_id = %directory_id,
                name = %item.filename,
                year = ?item.year,
                period = ?item.period,
                "dry run: item would be uploaded"
            );
            self.dedup.remember(&customer_id, &item.filename);
            return Ok(Disposition::DryRun);
        }

        let content = match self.source.content(file).await {
            Ok(content) => content,
            Err(err) => {
                warn!(file = %path, error = %err, "content unreadable");
                return Ok(Disposition::Skipped("unreadable_content"));
            }
        };
        if content.is_empty() {
            warn!(file = %path, "content empty");
            return Ok(Disposition::Skipped("empty_content"));
        }

        let request = UploadRequest {
            customer_id: customer_id.clone(),
            directory_id,
            name: item.filename.clone(),
            year: item.year,
            period: item.period.clone(),
            created_at: file.created_at,
            parent_id: item.parent_id.clone(),
            content,
        };
        let id = self
            .delivery
            .submit(request)
            .await
            .map_err(|err| AppError::delivery("delivery.submit", err))?;
        self.dedup.remember(&customer_id, &item.filename);
        info!(file = %path, customer_id = %customer_id, directory = %dest_path, "item queued");
        Ok(Disposition::Submitted(id))
    }
}

async fn commit(traversal: &mut ResumableTraversal<'_>, key: String) -> AppResult<()> {
    traversal
        .commit(key)
        .await
        .map_err(|err| AppError::runtime("traversal.commit", err))
}
