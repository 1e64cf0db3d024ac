//! Delivery engine state machine.
//!
//! Request lifecycle: `Pending → Dispatched → Fulfilled | Rejected`; a rejected
//! request returns to `Pending` while it has attempts left, otherwise it is `Abandoned`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dossiermig_core::{DestinationError, PacingKey, UploadRequest, UploadTransport};
use dossiermig_telemetry::{Metrics, UploadOutcome};
use futures_util::{StreamExt, stream};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DeliveryError, DeliveryResult};

/// Engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Uploads in flight at once, and the buffer size that triggers a round.
    pub max_concurrency: usize,
    /// Attempts per request, first try included.
    pub max_attempts: u32,
    /// Pause after the first upload to a new (customer, directory) pair.
    pub pacing: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            max_attempts: 3,
            pacing: Duration::from_secs(3),
        }
    }
}

/// Lifecycle state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Buffered, waiting for a round.
    Pending,
    /// Sent in the current round.
    Dispatched,
    /// Accepted by the destination.
    Fulfilled,
    /// Failed in the last round.
    Rejected,
    /// Failed its last attempt.
    Abandoned,
}

#[derive(Debug)]
struct PendingRequest {
    id: Uuid,
    request: UploadRequest,
    attempts: u32,
    state: RequestState,
}

/// Upload that was given up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbandonedUpload {
    /// Request identifier.
    pub id: Uuid,
    /// Filename of the upload.
    pub name: String,
    /// Destination customer identifier.
    pub customer_id: String,
    /// Destination directory identifier.
    pub directory_id: String,
    /// Attempts made.
    pub attempts: u32,
    /// Display form of the last failure.
    pub last_error: String,
}

/// Totals for everything delivered since the engine was created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Uploads accepted.
    pub fulfilled: usize,
    /// Failed attempts that were requeued.
    pub retried: usize,
    /// Uploads given up.
    pub abandoned: Vec<AbandonedUpload>,
    /// Rounds dispatched.
    pub rounds: usize,
}

/// Buffers uploads and sends them in bounded concurrent rounds.
pub struct DeliveryEngine<T: ?Sized> {
    transport: Arc<T>,
    config: DeliveryConfig,
    buffer: Vec<PendingRequest>,
    paced: HashSet<PacingKey>,
    report: DeliveryReport,
    settled: Vec<Uuid>,
    metrics: Option<Metrics>,
}

impl<T> DeliveryEngine<T>
where
    T: UploadTransport + ?Sized,
{
    /// Create an engine over `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::InvalidConfig`] when concurrency or attempts are zero.
    pub fn new(transport: Arc<T>, config: DeliveryConfig) -> DeliveryResult<Self> {
        if config.max_concurrency == 0 {
            return Err(DeliveryError::InvalidConfig {
                field: "max_concurrency",
                reason: "must be at least 1",
            });
        }
        if config.max_attempts == 0 {
            return Err(DeliveryError::InvalidConfig {
                field: "max_attempts",
                reason: "must be at least 1",
            });
        }
        Ok(Self {
            transport,
            config,
            buffer: Vec::with_capacity(config.max_concurrency),
            paced: HashSet::new(),
            report: DeliveryReport::default(),
            settled: Vec::new(),
            metrics: None,
        })
    }

    /// Record upload outcomes on `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Settings in use.
    #[must_use]
    pub const fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Requests waiting for the next round.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Take the ids of requests that reached a final state since the last call.
    ///
    /// Fulfilled and abandoned requests are settled; requests still buffered, or
    /// rejected for credentials, are not.
    pub fn take_settled(&mut self) -> Vec<Uuid> {
        std::mem::take(&mut self.settled)
    }

    /// Buffer `request`, dispatching when the buffer is full or the pacing pair is new.
    ///
    /// Returns the request id.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Unauthorized`] once a round containing a
    /// credential rejection has completed.
    pub async fn submit(&mut self, request: UploadRequest) -> DeliveryResult<Uuid> {
        let id = Uuid::new_v4();
        let first_for_pair = self.paced.insert(request.pacing_key());
        self.buffer.push(PendingRequest {
            id,
            request,
            attempts: 0,
            state: RequestState::Pending,
        });

        if first_for_pair {
            self.drain().await?;
            if !self.config.pacing.is_zero() {
                info!(
                    pause_ms = u64::try_from(self.config.pacing.as_millis()).unwrap_or(u64::MAX),
                    "first upload to directory; pausing"
                );
                tokio::time::sleep(self.config.pacing).await;
            }
        } else if self.buffer.len() >= self.config.max_concurrency {
            self.round().await?;
        }
        Ok(id)
    }

    /// Run rounds until nothing is pending and return the totals.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Unauthorized`] as for [`DeliveryEngine::submit`].
    pub async fn finalize(&mut self) -> DeliveryResult<DeliveryReport> {
        self.drain().await?;
        Ok(self.report.clone())
    }

    async fn drain(&mut self) -> DeliveryResult<()> {
        while !self.buffer.is_empty() {
            self.round().await?;
        }
        Ok(())
    }

    async fn round(&mut self) -> DeliveryResult<()> {
        let batch = std::mem::take(&mut self.buffer);
        if batch.is_empty() {
            return Ok(());
        }
        self.report.rounds += 1;
        let transport = Arc::clone(&self.transport);
        let outcomes: Vec<(PendingRequest, Result<(), DestinationError>)> = stream::iter(batch)
            .map(|mut pending| {
                let transport = Arc::clone(&transport);
                async move {
                    pending.state = RequestState::Dispatched;
                    pending.attempts += 1;
                    let result = transport.upload(&pending.request).await;
                    (pending, result)
                }
            })
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await;

        let mut unauthorized = None;
        for (mut pending, result) in outcomes {
            match result {
                Ok(()) => {
                    pending.state = RequestState::Fulfilled;
                    self.report.fulfilled += 1;
                    self.settled.push(pending.id);
                    self.record(UploadOutcome::Fulfilled);
                    info!(
                        request_id = %pending.id,
                        file = %pending.request.name,
                        attempt = pending.attempts,
                        state = ?pending.state,
                        "upload completed"
                    );
                }
                Err(err) if err.is_unauthorized() => {
                    pending.state = RequestState::Rejected;
                    if unauthorized.is_none() {
                        unauthorized = Some((pending, err));
                    }
                }
                Err(err) => self.reject(pending, &err),
            }
        }

        if let Some((pending, source)) = unauthorized {
            return Err(DeliveryError::Unauthorized {
                request_id: pending.id,
                name: pending.request.name,
                source,
            });
        }
        Ok(())
    }

    fn reject(&mut self, mut pending: PendingRequest, err: &DestinationError) {
        pending.state = RequestState::Rejected;
        if pending.attempts < self.config.max_attempts {
            warn!(
                request_id = %pending.id,
                file = %pending.request.name,
                attempt = pending.attempts,
                error = %err,
                "upload failed; requeued"
            );
            pending.state = RequestState::Pending;
            self.report.retried += 1;
            self.record(UploadOutcome::Retried);
            self.buffer.push(pending);
        } else {
            pending.state = RequestState::Abandoned;
            warn!(
                request_id = %pending.id,
                file = %pending.request.name,
                attempts = pending.attempts,
                state = ?pending.state,
                error = %err,
                "upload abandoned"
            );
            self.record(UploadOutcome::Abandoned);
            self.settled.push(pending.id);
            self.report.abandoned.push(AbandonedUpload {
                id: pending.id,
                name: pending.request.name,
                customer_id: pending.request.customer_id,
                directory_id: pending.request.directory_id,
                attempts: pending.attempts,
                last_error: err.to_string(),
            });
        }
    }

    fn record(&self, outcome: UploadOutcome) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_upload(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossiermig_test_support::RecordingDestination;
    use std::time::Instant;

    fn request(name: &str, customer: &str, directory: &str) -> UploadRequest {
        UploadRequest {
            customer_id: customer.into(),
            directory_id: directory.into(),
            name: name.into(),
            year: Some(2023),
            period: None,
            created_at: None,
            parent_id: None,
            content: name.as_bytes().to_vec(),
        }
    }

    fn config(max_concurrency: usize, max_attempts: u32) -> DeliveryConfig {
        DeliveryConfig {
            max_concurrency,
            max_attempts,
            pacing: Duration::ZERO,
        }
    }

    #[test]
    fn zero_limits_are_rejected() {
        let transport = Arc::new(RecordingDestination::new());
        assert!(matches!(
            DeliveryEngine::new(Arc::clone(&transport), config(0, 3)),
            Err(DeliveryError::InvalidConfig {
                field: "max_concurrency",
                ..
            })
        ));
        assert!(matches!(
            DeliveryEngine::new(transport, config(3, 0)),
            Err(DeliveryError::InvalidConfig {
                field: "max_attempts",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn in_flight_uploads_never_exceed_the_limit() -> anyhow::Result<()> {
        let transport =
            Arc::new(RecordingDestination::new().with_upload_delay(Duration::from_millis(15)));
        let mut engine = DeliveryEngine::new(Arc::clone(&transport), config(3, 3))?;
        for index in 0..8 {
            engine
                .submit(request(&format!("{index}.pdf"), "C1", "D1"))
                .await?;
        }
        let report = engine.finalize().await?;

        assert_eq!(report.fulfilled, 8);
        assert!(transport.max_in_flight() <= 3);
        assert!(transport.max_in_flight() >= 2);
        assert_eq!(transport.uploads().await.len(), 8);
        Ok(())
    }

    #[tokio::test]
    async fn buffer_is_held_until_full() -> anyhow::Result<()> {
        let transport = Arc::new(RecordingDestination::new());
        let mut engine = DeliveryEngine::new(Arc::clone(&transport), config(3, 3))?;

        engine.submit(request("a.pdf", "C1", "D1")).await?;
        assert_eq!(transport.attempts().await.len(), 1);
        engine.submit(request("b.pdf", "C1", "D1")).await?;
        engine.submit(request("c.pdf", "C1", "D1")).await?;
        assert_eq!(engine.pending(), 2);
        assert_eq!(transport.attempts().await.len(), 1);
        engine.submit(request("d.pdf", "C1", "D1")).await?;
        assert_eq!(engine.pending(), 0);
        assert_eq!(transport.attempts().await.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn failures_retry_until_success() -> anyhow::Result<()> {
        let transport = Arc::new(RecordingDestination::new().failing("flaky.pdf", 2));
        let metrics = Metrics::new()?;
        let mut engine = DeliveryEngine::new(Arc::clone(&transport), config(3, 3))?
            .with_metrics(metrics.clone());

        engine.submit(request("flaky.pdf", "C1", "D1")).await?;
        let report = engine.finalize().await?;

        assert_eq!(report.fulfilled, 1);
        assert_eq!(report.retried, 2);
        assert!(report.abandoned.is_empty());
        assert_eq!(transport.attempts().await, vec!["flaky.pdf"; 3]);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.uploads_fulfilled, 1);
        assert_eq!(snapshot.uploads_retried, 2);
        Ok(())
    }

    #[tokio::test]
    async fn exhausted_requests_are_abandoned_without_stopping() -> anyhow::Result<()> {
        let transport = Arc::new(RecordingDestination::new().failing("broken.pdf", 10));
        let mut engine = DeliveryEngine::new(Arc::clone(&transport), config(2, 3))?;

        engine.submit(request("broken.pdf", "C1", "D1")).await?;
        engine.submit(request("fine.pdf", "C1", "D1")).await?;
        let report = engine.finalize().await?;

        assert_eq!(report.fulfilled, 1);
        assert_eq!(report.abandoned.len(), 1);
        let abandoned = &report.abandoned[0];
        assert_eq!(abandoned.name, "broken.pdf");
        assert_eq!(abandoned.attempts, 3);
        assert_eq!(
            transport
                .attempts()
                .await
                .iter()
                .filter(|name| name.as_str() == "broken.pdf")
                .count(),
            3
        );
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_surfaces_after_the_round() -> anyhow::Result<()> {
        let transport = Arc::new(RecordingDestination::new().unauthorized_for("denied.pdf"));
        let mut engine = DeliveryEngine::new(Arc::clone(&transport), config(3, 3))?;

        engine.submit(request("first.pdf", "C1", "D1")).await?;
        engine.submit(request("denied.pdf", "C1", "D1")).await?;
        engine.submit(request("other.pdf", "C1", "D1")).await?;
        let err = engine.submit(request("last.pdf", "C1", "D1")).await.err();

        match err {
            Some(DeliveryError::Unauthorized { name, .. }) => assert_eq!(name, "denied.pdf"),
            other => panic!("expected unauthorized, got {other:?}"),
        }
        let delivered: Vec<String> = transport
            .uploads()
            .await
            .into_iter()
            .map(|upload| upload.name)
            .collect();
        assert!(delivered.contains(&"other.pdf".to_string()));
        assert!(delivered.contains(&"last.pdf".to_string()));
        assert_eq!(
            transport
                .attempts()
                .await
                .iter()
                .filter(|name| name.as_str() == "denied.pdf")
                .count(),
            1
        );
        Ok(())
    }

    #[tokio::test]
    async fn settled_ids_cover_fulfilled_and_abandoned_only() -> anyhow::Result<()> {
        let transport = Arc::new(RecordingDestination::new().failing("broken.pdf", 10));
        let mut engine = DeliveryEngine::new(Arc::clone(&transport), config(3, 1))?;

        let first = engine.submit(request("first.pdf", "C1", "D1")).await?;
        let broken = engine.submit(request("broken.pdf", "C1", "D1")).await?;
        let buffered = engine.submit(request("later.pdf", "C1", "D1")).await?;
        assert_eq!(engine.take_settled(), vec![first]);
        assert_eq!(engine.pending(), 2);

        engine.finalize().await?;
        let mut settled = engine.take_settled();
        settled.sort();
        let mut expected = vec![broken, buffered];
        expected.sort();
        assert_eq!(settled, expected);
        assert!(engine.take_settled().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_requests_are_not_settled() -> anyhow::Result<()> {
        let transport = Arc::new(RecordingDestination::new().unauthorized_for("denied.pdf"));
        let mut engine = DeliveryEngine::new(Arc::clone(&transport), config(3, 3))?;

        let first = engine.submit(request("first.pdf", "C1", "D1")).await?;
        let denied = engine.submit(request("denied.pdf", "C1", "D1")).await?;
        assert!(engine.finalize().await.is_err());

        let settled = engine.take_settled();
        assert!(settled.contains(&first));
        assert!(!settled.contains(&denied));
        Ok(())
    }

    #[tokio::test]
    async fn new_pairs_drain_and_pause() -> anyhow::Result<()> {
        let transport = Arc::new(RecordingDestination::new());
        let pacing = Duration::from_millis(40);
        let mut engine = DeliveryEngine::new(
            Arc::clone(&transport),
            DeliveryConfig {
                max_concurrency: 5,
                max_attempts: 3,
                pacing,
            },
        )?;

        let started = Instant::now();
        engine.submit(request("a.pdf", "C1", "D1")).await?;
        assert!(started.elapsed() >= pacing);
        assert_eq!(transport.uploads().await.len(), 1);

        engine.submit(request("b.pdf", "C1", "D1")).await?;
        assert_eq!(engine.pending(), 1);

        engine.submit(request("c.pdf", "C1", "D2")).await?;
        assert_eq!(engine.pending(), 0);
        assert_eq!(transport.uploads().await.len(), 3);

        let report = engine.finalize().await?;
        assert_eq!(report.fulfilled, 3);
        Ok(())
    }
}
