//! Recording destination that implements both the read API and the upload transport.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dossiermig_core::{
    CustomerRecord, DestinationApi, DestinationError, DestinationResult, DirectoryNode,
    UploadRequest, UploadTransport,
};
use tokio::sync::RwLock;

/// Destination fake with scripted failures and recorded calls.
#[derive(Debug, Default)]
pub struct RecordingDestination {
    directories: Vec<DirectoryNode>,
    customers: Vec<CustomerRecord>,
    existing: HashSet<(String, String)>,
    unauthorized: HashSet<String>,
    failures: RwLock<HashMap<String, usize>>,
    upload_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    attempts: RwLock<Vec<String>>,
    uploads: RwLock<Vec<UploadRequest>>,
    directory_listings: RwLock<Vec<Option<String>>>,
    existence_checks: RwLock<Vec<(String, String)>>,
}

impl RecordingDestination {
    /// Empty destination.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory record.
    #[must_use]
    pub fn with_directory(mut self, id: &str, parent_id: Option<&str>, name: &str) -> Self {
        self.directories.push(DirectoryNode {
            id: id.to_string(),
            parent_id: parent_id.map(str::to_string),
            name: name.to_string(),
            is_leaf: false,
        });
        self
    }

    /// Add a business customer.
    #[must_use]
    pub fn with_customer(mut self, id: &str, number: &str) -> Self {
        self.customers.push(CustomerRecord {
            id: id.to_string(),
            name: format!("Customer {number}"),
            number: Some(number.to_string()),
            kind: Some("business".to_string()),
        });
        self
    }

    /// Mark an item as already present remotely.
    #[must_use]
    pub fn with_existing_item(mut self, customer_id: &str, filename: &str) -> Self {
        self.existing
            .insert((customer_id.to_string(), filename.to_string()));
        self
    }

    /// Reject uploads named `name` with a server error `times` times.
    #[must_use]
    pub fn failing(mut self, name: &str, times: usize) -> Self {
        self.failures.get_mut().insert(name.to_string(), times);
        self
    }

    /// Reject uploads named `name` with an authorization error.
    #[must_use]
    pub fn unauthorized_for(mut self, name: &str) -> Self {
        self.unauthorized.insert(name.to_string());
        self
    }

    /// Hold every upload for `delay` so concurrency can be observed.
    #[must_use]
    pub const fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = delay;
        self
    }

    /// Successfully delivered uploads, in completion order.
    pub async fn uploads(&self) -> Vec<UploadRequest> {
        self.uploads.read().await.clone()
    }

    /// Names of every upload attempt, in dispatch order.
    pub async fn attempts(&self) -> Vec<String> {
        self.attempts.read().await.clone()
    }

    /// Customer scopes of every directory listing call.
    pub async fn directory_listings(&self) -> Vec<Option<String>> {
        self.directory_listings.read().await.clone()
    }

    /// `(customer id, filename)` pairs checked for existence.
    pub async fn existence_checks(&self) -> Vec<(String, String)> {
        self.existence_checks.read().await.clone()
    }

    /// Highest number of uploads observed in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DestinationApi for RecordingDestination {
    async fn list_directories(
        &self,
        customer_id: Option<&str>,
    ) -> DestinationResult<Vec<DirectoryNode>> {
        self.directory_listings
            .write()
            .await
            .push(customer_id.map(str::to_string));
        Ok(self.directories.clone())
    }

    async fn list_customers(&self) -> DestinationResult<Vec<CustomerRecord>> {
        Ok(self.customers.clone())
    }

    async fn item_exists(&self, customer_id: &str, filename: &str) -> DestinationResult<bool> {
        let key = (customer_id.to_string(), filename.to_string());
        self.existence_checks.write().await.push(key.clone());
        Ok(self.existing.contains(&key))
    }
}

#[async_trait]
impl UploadTransport for RecordingDestination {
    async fn upload(&self, request: &UploadRequest) -> DestinationResult<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.attempts.write().await.push(request.name.clone());
        if !self.upload_delay.is_zero() {
            tokio::time::sleep(self.upload_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.unauthorized.contains(&request.name) {
            return Err(DestinationError::Unauthorized {
                operation: "items.create",
                status: 401,
            });
        }
        {
            let mut failures = self.failures.write().await;
            if let Some(remaining) = failures.get_mut(&request.name)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(DestinationError::Status {
                    operation: "items.create",
                    status: 500,
                    body: None,
                });
            }
        }
        self.uploads.write().await.push(request.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> UploadRequest {
        UploadRequest {
            customer_id: "C1".into(),
            directory_id: "D1".into(),
            name: name.into(),
            year: None,
            period: None,
            created_at: None,
            parent_id: None,
            content: b"x".to_vec(),
        }
    }

    #[tokio::test]
    async fn scripted_failures_run_out() -> anyhow::Result<()> {
        let destination = RecordingDestination::new().failing("a.pdf", 1);
        assert!(destination.upload(&request("a.pdf")).await.is_err());
        destination.upload(&request("a.pdf")).await?;
        assert_eq!(destination.attempts().await, vec!["a.pdf", "a.pdf"]);
        assert_eq!(destination.uploads().await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_names_always_fail() {
        let destination = RecordingDestination::new().unauthorized_for("x.pdf");
        let err = destination.upload(&request("x.pdf")).await.err();
        assert!(err.is_some_and(|err| err.is_unauthorized()));
    }
}
