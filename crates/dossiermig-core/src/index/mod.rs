//! Per-run caches of the destination directory tree and customer table.
//!
//! # Design
//!
//! - Directory records arrive flat; paths are derived by walking parent links.
//! - Walks stop on cycles and dangling parents instead of failing the load.
//! - Each listing is fetched at most once per run (once per customer when scoped).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::model::{
    Customer, CustomerRecord, DirectoryNode, normalize_customer_number, normalize_directory_path,
};
use crate::service::DestinationApi;

const ACCEPTED_KINDS: [&str; 2] = ["business", "person"];

/// How the destination exposes its directory tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryScope {
    /// One tree shared by every customer.
    #[default]
    Global,
    /// A separate tree per customer, fetched on first use.
    PerCustomer,
}

/// Directory with its derived path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Directory identifier.
    pub id: String,
    /// Parent directory identifier.
    pub parent_id: Option<String>,
    /// Display name.
    pub name: String,
    /// Lower-cased `/` separated path from the root.
    pub path: String,
    /// Whether the directory has no children.
    pub is_leaf: bool,
}

/// Path keyed view of one directory listing.
#[derive(Debug, Clone, Default)]
pub struct DirectoryIndex {
    by_path: HashMap<String, DirectoryEntry>,
}

impl DirectoryIndex {
    /// Flatten a directory listing into a path index.
    #[must_use]
    pub fn build(nodes: Vec<DirectoryNode>) -> Self {
        let by_id: HashMap<&str, &DirectoryNode> =
            nodes.iter().map(|node| (node.id.as_str(), node)).collect();
        let mut by_path: HashMap<String, DirectoryEntry> = HashMap::with_capacity(nodes.len());

        for node in &nodes {
            let path = derive_path(node, &by_id);
            if let Some(existing) = by_path.get(&path) {
                warn!(
                    path = %path,
                    kept = %existing.id,
                    ignored = %node.id,
                    "duplicate destination directory path"
                );
                continue;
            }
            by_path.insert(
                path.clone(),
                DirectoryEntry {
                    id: node.id.clone(),
                    parent_id: parent_of(node).map(str::to_string),
                    name: node.name.clone(),
                    path,
                    is_leaf: node.is_leaf,
                },
            );
        }

        Self { by_path }
    }

    /// Look up a directory by path; case and outer slashes are ignored.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&DirectoryEntry> {
        self.by_path.get(&normalize_directory_path(path))
    }

    /// Number of indexed directories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

fn parent_of(node: &DirectoryNode) -> Option<&str> {
    node.parent_id.as_deref().filter(|id| !id.is_empty())
}

fn derive_path(node: &DirectoryNode, by_id: &HashMap<&str, &DirectoryNode>) -> String {
    let mut names = vec![node.name.as_str()];
    let mut visited = HashSet::from([node.id.as_str()]);
    let mut parent = parent_of(node);

    while let Some(id) = parent {
        if !visited.insert(id) {
            debug!(directory = %node.id, "directory parent cycle");
            break;
        }
        let Some(next) = by_id.get(id) else {
            break;
        };
        names.push(next.name.as_str());
        parent = parent_of(next);
    }

    names.reverse();
    normalize_directory_path(&names.join("/"))
}

/// Number keyed view of the destination customers.
#[derive(Debug, Clone, Default)]
pub struct CustomerIndex {
    by_number: HashMap<String, Customer>,
}

impl CustomerIndex {
    /// Build the index, dropping records without a usable number or with a foreign kind.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateCustomerNumber`] when two accepted records
    /// normalize to the same number.
    pub fn build(records: Vec<CustomerRecord>) -> CoreResult<Self> {
        let mut by_number: HashMap<String, Customer> = HashMap::with_capacity(records.len());

        for record in records {
            let Some(raw) = record.number.as_deref() else {
                continue;
            };
            let number = normalize_customer_number(raw);
            if number.is_empty() {
                continue;
            }
            if let Some(kind) = record.kind.as_deref()
                && !ACCEPTED_KINDS
                    .iter()
                    .any(|accepted| kind.eq_ignore_ascii_case(accepted))
            {
                continue;
            }
            if let Some(existing) = by_number.get(&number) {
                return Err(CoreError::DuplicateCustomerNumber {
                    number,
                    existing_id: existing.id.clone(),
                    conflicting_id: record.id,
                });
            }
            by_number.insert(
                number.clone(),
                Customer {
                    id: record.id,
                    name: record.name,
                    number,
                },
            );
        }

        Ok(Self { by_number })
    }

    /// Look up a customer by number; the number is normalized first.
    #[must_use]
    pub fn get(&self, number: &str) -> Option<&Customer> {
        self.by_number.get(&normalize_customer_number(number))
    }

    /// Number of indexed customers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }
}

/// Lazily loaded directory and customer caches for one run.
#[derive(Debug, Default)]
pub struct DestinationIndex {
    scope: DirectoryScope,
    customers: Option<CustomerIndex>,
    global: Option<DirectoryIndex>,
    scoped: HashMap<String, DirectoryIndex>,
}

impl DestinationIndex {
    /// Create an empty index for the given directory scope.
    #[must_use]
    pub fn new(scope: DirectoryScope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    /// Fetch every listing that does not depend on a customer.
    ///
    /// # Errors
    ///
    /// Propagates destination failures and duplicate customer numbers.
    pub async fn preload<A>(&mut self, api: &A) -> CoreResult<()>
    where
        A: DestinationApi + ?Sized,
    {
        self.customer_index(api).await?;
        if self.scope == DirectoryScope::Global {
            self.global_directories(api).await?;
        }
        Ok(())
    }

    /// Resolve a customer number to the destination customer.
    ///
    /// # Errors
    ///
    /// Propagates failures from the first customer listing.
    pub async fn customer<A>(&mut self, api: &A, number: &str) -> CoreResult<Option<&Customer>>
    where
        A: DestinationApi + ?Sized,
    {
        let index = self.customer_index(api).await?;
        Ok(index.get(number))
    }

    /// Resolve a directory path for a customer.
    ///
    /// # Errors
    ///
    /// Propagates failures from the first directory listing in scope.
    pub async fn directory<A>(
        &mut self,
        api: &A,
        customer_id: &str,
        path: &str,
    ) -> CoreResult<Option<&DirectoryEntry>>
    where
        A: DestinationApi + ?Sized,
    {
        match self.scope {
            DirectoryScope::Global => {
                let index = self.global_directories(api).await?;
                Ok(index.get(path))
            }
            DirectoryScope::PerCustomer => {
                if !self.scoped.contains_key(customer_id) {
                    let nodes = api
                        .list_directories(Some(customer_id))
                        .await
                        .map_err(|source| CoreError::destination("index.load_directories", source))?;
                    let index = DirectoryIndex::build(nodes);
                    info!(
                        customer_id = %customer_id,
                        directories = index.len(),
                        "customer directory index loaded"
                    );
                    self.scoped.insert(customer_id.to_string(), index);
                }
                Ok(self
                    .scoped
                    .get(customer_id)
                    .and_then(|index| index.get(path)))
            }
        }
    }

    async fn customer_index<A>(&mut self, api: &A) -> CoreResult<&mut CustomerIndex>
    where
        A: DestinationApi + ?Sized,
    {
        let index = match self.customers.take() {
            Some(index) => index,
            None => {
                let records = api
                    .list_customers()
                    .await
                    .map_err(|source| CoreError::destination("index.load_customers", source))?;
                let index = CustomerIndex::build(records)?;
                info!(customers = index.len(), "customer index loaded");
                index
            }
        };
        Ok(self.customers.insert(index))
    }

    async fn global_directories<A>(&mut self, api: &A) -> CoreResult<&mut DirectoryIndex>
    where
        A: DestinationApi + ?Sized,
    {
        let index = match self.global.take() {
            Some(index) => index,
            None => {
                let nodes = api
                    .list_directories(None)
                    .await
                    .map_err(|source| CoreError::destination("index.load_directories", source))?;
                let index = DirectoryIndex::build(nodes);
                info!(directories = index.len(), "directory index loaded");
                index
            }
        };
        Ok(self.global.insert(index))
    }
}
