//! Duplicate suppression applied after the customer is resolved.

use std::collections::HashSet;

use dossiermig_config::DedupMode;
use dossiermig_core::{DestinationApi, DestinationResult};

/// Decides whether an item was already delivered.
#[derive(Debug, Default)]
pub(crate) struct DedupPolicy {
    mode: DedupMode,
    delivered: HashSet<(String, String)>,
}

impl DedupPolicy {
    pub(crate) fn new(mode: DedupMode) -> Self {
        Self {
            mode,
            delivered: HashSet::new(),
        }
    }

    /// Whether `filename` should be suppressed for `customer_id`.
    pub(crate) async fn is_duplicate<A>(
        &self,
        api: &A,
        customer_id: &str,
        filename: &str,
    ) -> DestinationResult<bool>
    where
        A: DestinationApi + ?Sized,
    {
        match self.mode {
            DedupMode::Off => Ok(false),
            DedupMode::Remote => api.item_exists(customer_id, filename).await,
            DedupMode::Run => Ok(self
                .delivered
                .contains(&(customer_id.to_string(), filename.to_string()))),
        }
    }

    /// Note an item handed to delivery.
    pub(crate) fn remember(&mut self, customer_id: &str, filename: &str) {
        if self.mode == DedupMode::Run {
            self.delivered
                .insert((customer_id.to_string(), filename.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossiermig_test_support::RecordingDestination;

    #[tokio::test]
    async fn off_never_asks_the_destination() -> anyhow::Result<()> {
        let api = RecordingDestination::new().with_existing_item("C1", "a.pdf");
        let policy = DedupPolicy::new(DedupMode::Off);
        assert!(!policy.is_duplicate(&api, "C1", "a.pdf").await?);
        assert!(api.existence_checks().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn remote_consults_existence_check() -> anyhow::Result<()> {
        let api = RecordingDestination::new().with_existing_item("C1", "a.pdf");
        let policy = DedupPolicy::new(DedupMode::Remote);
        assert!(policy.is_duplicate(&api, "C1", "a.pdf").await?);
        assert!(!policy.is_duplicate(&api, "C1", "b.pdf").await?);
        assert_eq!(api.existence_checks().await.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn run_mode_suppresses_repeats_only() -> anyhow::Result<()> {
        let api = RecordingDestination::new();
        let mut policy = DedupPolicy::new(DedupMode::Run);
        assert!(!policy.is_duplicate(&api, "C1", "a.pdf").await?);
        policy.remember("C1", "a.pdf");
        assert!(policy.is_duplicate(&api, "C1", "a.pdf").await?);
        assert!(!policy.is_duplicate(&api, "C2", "a.pdf").await?);
        assert!(api.existence_checks().await.is_empty());
        Ok(())
    }
}
