//! Source provider that reads stored items back out of a destination tenant.
//!
//! Items are listed per customer through the item search endpoint and laid out
//! as `"{number} - {name}/{directory path}"`, so the same pipeline steps work
//! for tenant-to-tenant moves as for file shares.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use dossiermig_core::{
    CustomerRecord, DescriptorStream, DestinationApi, DirectoryNode, FileDescriptor,
    SourceError, SourceProvider, SourceResult, normalize_customer_number,
};
use futures_util::{StreamExt, stream};
use tracing::{debug, info, warn};

use crate::client::DestinationClient;
use crate::wire::{WireId, WireSourceItem};

/// Directory segment used when an item points at an unknown directory.
pub const MISSING_DIRECTORY: &str = "directory_not_found";

const ITEM_PAGE_SIZE: u32 = 100;

/// [`SourceProvider`] over a [`DestinationClient`].
///
/// The traversal root selects customers: empty or `*` lists every customer,
/// otherwise a comma separated list of customer numbers.
#[derive(Debug, Clone)]
pub struct DestinationSource {
    client: DestinationClient,
}

impl DestinationSource {
    /// Read items through `client`.
    #[must_use]
    pub const fn new(client: DestinationClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceProvider for DestinationSource {
    fn traverse<'a>(&'a self, root: &'a str) -> SourceResult<DescriptorStream<'a>> {
        let walk = Walk::new(&self.client, wanted_numbers(root));
        Ok(stream::unfold(walk, |mut walk| async move {
            let entry = walk.next().await?;
            Some((entry, walk))
        })
        .boxed())
    }

    async fn content(&self, file: &FileDescriptor) -> SourceResult<Vec<u8>> {
        let Some(id) = file.remote_id.as_deref() else {
            return Err(SourceError::backend(
                "source.download",
                "descriptor has no remote id",
            ));
        };
        self.client
            .get_bytes("source.download", &format!("dossier_items/{id}/download"), &[])
            .await
            .map_err(|err| SourceError::backend("source.download", err))
    }
}

fn wanted_numbers(root: &str) -> HashSet<String> {
    root.split(',')
        .map(str::trim)
        .filter(|number| *number != "*")
        .map(normalize_customer_number)
        .filter(|number| !number.is_empty())
        .collect()
}

struct Cursor {
    customer: CustomerRecord,
    number: String,
    page: u32,
}

struct Walk<'a> {
    client: &'a DestinationClient,
    wanted: HashSet<String>,
    directories: Option<HashMap<String, String>>,
    customers: VecDeque<(CustomerRecord, String)>,
    cursor: Option<Cursor>,
    ready: VecDeque<FileDescriptor>,
}

impl<'a> Walk<'a> {
    const fn new(client: &'a DestinationClient, wanted: HashSet<String>) -> Self {
        Self {
            client,
            wanted,
            directories: None,
            customers: VecDeque::new(),
            cursor: None,
            ready: VecDeque::new(),
        }
    }

    async fn next(&mut self) -> Option<SourceResult<FileDescriptor>> {
        loop {
            if let Some(file) = self.ready.pop_front() {
                return Some(Ok(file));
            }
            if self.directories.is_none() {
                let loaded = self.load().await;
                if let Err(err) = loaded {
                    self.directories = Some(HashMap::new());
                    return Some(Err(err));
                }
                continue;
            }
            let cursor = match self.cursor.take() {
                Some(cursor) => cursor,
                None => {
                    let (customer, number) = self.customers.pop_front()?;
                    Cursor {
                        customer,
                        number,
                        page: 1,
                    }
                }
            };
            match self.fetch(&cursor).await {
                Ok((items, more)) => {
                    let directories = self.directories.as_ref();
                    for item in items {
                        self.ready
                            .push_back(describe(&cursor, directories, item));
                    }
                    if more {
                        self.cursor = Some(Cursor {
                            page: cursor.page + 1,
                            ..cursor
                        });
                    }
                }
                Err(err) => {
                    warn!(
                        customer = %cursor.number,
                        page = cursor.page,
                        error = %err,
                        "item listing failed"
                    );
                    return Some(Err(err));
                }
            }
        }
    }

    async fn load(&mut self) -> SourceResult<()> {
        let nodes = self
            .client
            .list_directories(None)
            .await
            .map_err(|err| SourceError::backend("source.directories", err))?;
        let directories = directory_paths(&nodes);
        let records = self
            .client
            .list_customers()
            .await
            .map_err(|err| SourceError::backend("source.customers", err))?;
        for record in records {
            let Some(number) = record.number.as_deref().map(normalize_customer_number) else {
                continue;
            };
            if number.is_empty() || (!self.wanted.is_empty() && !self.wanted.contains(&number)) {
                continue;
            }
            self.customers.push_back((record, number));
        }
        info!(
            directories = directories.len(),
            customers = self.customers.len(),
            "source tenant loaded"
        );
        self.directories = Some(directories);
        Ok(())
    }

    async fn fetch(&self, cursor: &Cursor) -> SourceResult<(Vec<WireSourceItem>, bool)> {
        let envelope = self
            .client
            .get_page::<WireSourceItem>(
                "source.items",
                "search/dossier_items",
                &[
                    ("customer_id", cursor.customer.id.clone()),
                    ("page", cursor.page.to_string()),
                    ("limit", ITEM_PAGE_SIZE.to_string()),
                    ("orderBy", "created_at".to_string()),
                    ("sortedBy", "desc".to_string()),
                ],
            )
            .await
            .map_err(|err| SourceError::backend("source.items", err))?;
        let more = envelope.has_next() && !envelope.data.is_empty();
        debug!(
            customer = %cursor.number,
            page = cursor.page,
            items = envelope.data.len(),
            "source items listed"
        );
        Ok((envelope.data, more))
    }
}

fn describe(
    cursor: &Cursor,
    directories: Option<&HashMap<String, String>>,
    item: WireSourceItem,
) -> FileDescriptor {
    let id = item.id.into_string();
    let directory = item
        .dossier_directory_id
        .map(WireId::into_string)
        .and_then(|directory_id| directories.and_then(|paths| paths.get(&directory_id)))
        .map_or(MISSING_DIRECTORY, String::as_str);
    let relative = format!(
        "{} - {}/{directory}",
        cursor.number,
        cursor.customer.name.trim()
    );
    let filename = item
        .original_filename
        .or(item.name)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| id.clone());

    let mut file = FileDescriptor::new(filename, relative.clone(), relative).with_remote_id(id);
    if let Some(created_at) = item.created_at.as_deref().and_then(parse_timestamp) {
        file = file.with_created_at(created_at);
    }
    if let Some(year) = item
        .year
        .map(WireId::into_string)
        .and_then(|year| year.trim().parse::<u16>().ok())
    {
        file = file.with_year(year);
    }
    if let Some(period) = item.period.filter(|period| !period.trim().is_empty()) {
        file = file.with_period(period);
    }
    if let Some(parent) = item.parent_id {
        file = file.with_parent_id(parent.into_string());
    }
    file
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|at| at.and_utc())
        })
        .ok()
}

/// Directory id to `/` joined path, display case kept.
fn directory_paths(nodes: &[DirectoryNode]) -> HashMap<String, String> {
    let by_id: HashMap<&str, &DirectoryNode> =
        nodes.iter().map(|node| (node.id.as_str(), node)).collect();
    nodes
        .iter()
        .map(|node| {
            let mut names = vec![node.name.trim()];
            let mut visited = HashSet::from([node.id.as_str()]);
            let mut parent = node.parent_id.as_deref().filter(|id| !id.is_empty());
            while let Some(id) = parent {
                if !visited.insert(id) {
                    break;
                }
                let Some(next) = by_id.get(id) else {
                    break;
                };
                names.push(next.name.trim());
                parent = next.parent_id.as_deref().filter(|id| !id.is_empty());
            }
            names.reverse();
            (node.id.clone(), names.join("/"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientSettings;
    use anyhow::Result;
    use futures_util::TryStreamExt;
    use httpmock::MockServer;
    use httpmock::prelude::*;
    use serde_json::json;

    fn source_for(server: &MockServer) -> Result<DestinationSource> {
        let settings = ClientSettings::new(server.base_url(), "source-token", "old-tenant");
        Ok(DestinationSource::new(DestinationClient::new(&settings)?))
    }

    fn tenant(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET).path("/dossier_directories");
            then.status(200).json_body(json!({"data": [
                {"id": 1, "parent_id": null, "name": "Finance"},
                {"id": 9, "parent_id": 1, "name": "2023"}
            ]}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/customers");
            then.status(200).json_body(json!({"data": [
                {"id": "C1", "name": "Acme", "number": "0010", "type": "business"},
                {"id": "C2", "name": "Globex", "number": "11", "type": "business"},
                {"id": "C3", "name": "Nameless", "number": null}
            ]}));
        });
    }

    #[tokio::test]
    async fn items_are_listed_per_customer_with_directory_paths() -> Result<()> {
        let server = MockServer::start_async().await;
        tenant(&server);
        let acme_first = server.mock(|when, then| {
            when.method(GET)
                .path("/search/dossier_items")
                .query_param("customer_id", "C1")
                .query_param("page", "1")
                .query_param("limit", "100")
                .query_param("orderBy", "created_at")
                .query_param("sortedBy", "desc")
                .header("authorization", "Bearer source-token");
            then.status(200).json_body(json!({
                "data": [{
                    "id": 41,
                    "original_filename": "invoice.pdf",
                    "name": "Invoice",
                    "dossier_directory_id": 9,
                    "created_at": "2023-03-01 12:00:00",
                    "year": 2023,
                    "period": "q1"
                }],
                "meta": {"pagination": {"links": {"next": "page=2"}}}
            }));
        });
        let acme_second = server.mock(|when, then| {
            when.method(GET)
                .path("/search/dossier_items")
                .query_param("customer_id", "C1")
                .query_param("page", "2");
            then.status(200).json_body(json!({
                "data": [{"id": 42, "original_filename": "lost.pdf", "dossier_directory_id": 77}],
                "meta": {"pagination": {"links": []}}
            }));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/search/dossier_items")
                .query_param("customer_id", "C2");
            then.status(200).json_body(json!({"data": []}));
        });

        let source = source_for(&server)?;
        let files: Vec<FileDescriptor> = source.traverse("")?.try_collect().await?;
        acme_first.assert();
        acme_second.assert();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].filename, "invoice.pdf");
        assert_eq!(files[0].relative_path, "10 - Acme/Finance/2023");
        assert_eq!(files[0].remote_id.as_deref(), Some("41"));
        assert_eq!(files[0].year, Some(2023));
        assert_eq!(files[0].period.as_deref(), Some("q1"));
        assert_eq!(
            files[0].created_at.map(|at| at.timestamp()),
            Some(1_677_672_000)
        );
        assert_eq!(files[0].idempotency_source(), "41");
        assert_eq!(files[1].relative_path, "10 - Acme/directory_not_found");
        Ok(())
    }

    #[tokio::test]
    async fn root_limits_the_customers_listed() -> Result<()> {
        let server = MockServer::start_async().await;
        tenant(&server);
        let acme = server.mock(|when, then| {
            when.method(GET)
                .path("/search/dossier_items")
                .query_param("customer_id", "C1");
            then.status(200).json_body(json!({"data": []}));
        });
        let globex = server.mock(|when, then| {
            when.method(GET)
                .path("/search/dossier_items")
                .query_param("customer_id", "C2");
            then.status(200)
                .json_body(json!({"data": [{"id": "G1", "original_filename": "deed.pdf"}]}));
        });

        let source = source_for(&server)?;
        let files: Vec<FileDescriptor> = source.traverse(" 011 ")?.try_collect().await?;
        acme.assert_calls(0);
        globex.assert();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "11 - Globex/directory_not_found");
        Ok(())
    }

    #[tokio::test]
    async fn failed_customer_listing_is_yielded_and_walk_continues() -> Result<()> {
        let server = MockServer::start_async().await;
        tenant(&server);
        server.mock(|when, then| {
            when.method(GET)
                .path("/search/dossier_items")
                .query_param("customer_id", "C1");
            then.status(500).body("down");
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/search/dossier_items")
                .query_param("customer_id", "C2");
            then.status(200)
                .json_body(json!({"data": [{"id": "G1", "original_filename": "deed.pdf"}]}));
        });

        let source = source_for(&server)?;
        let entries: Vec<SourceResult<FileDescriptor>> = source.traverse("")?.collect().await;
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0], Err(SourceError::Backend { operation: "source.items", .. })));
        assert!(entries[1].is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn content_downloads_by_remote_id() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/dossier_items/41/download");
            then.status(200).body("%PDF-1.7");
        });

        let source = source_for(&server)?;
        let file = FileDescriptor::new("invoice.pdf", "10 - Acme", "10 - Acme").with_remote_id("41");
        assert_eq!(source.content(&file).await?, b"%PDF-1.7".to_vec());
        mock.assert();

        let local = FileDescriptor::new("invoice.pdf", "/share", "");
        assert!(source.content(&local).await.is_err());
        Ok(())
    }

    #[test]
    fn directory_paths_keep_case_and_survive_cycles() {
        let node = |id: &str, parent: Option<&str>, name: &str| DirectoryNode {
            id: id.to_string(),
            parent_id: parent.map(str::to_string),
            name: name.to_string(),
            is_leaf: false,
        };
        let paths = directory_paths(&[
            node("1", None, "Finance"),
            node("9", Some("1"), "2023"),
            node("5", Some("6"), "Loop"),
            node("6", Some("5"), "Back"),
        ]);
        assert_eq!(paths["9"], "Finance/2023");
        assert_eq!(paths["5"], "Back/Loop");
    }

    #[test]
    fn timestamps_accept_both_formats() {
        assert!(parse_timestamp("2023-03-01T12:00:00+00:00").is_some());
        assert!(parse_timestamp("2023-03-01 12:00:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
