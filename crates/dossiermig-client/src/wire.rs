//! Response payloads returned by the destination API.

use dossiermig_core::{CustomerRecord, DirectoryNode};
use serde::Deserialize;
use serde_json::Value;

/// Every list endpoint wraps its rows in a `data` array.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default = "Vec::new")]
    pub(crate) data: Vec<T>,
    #[serde(default)]
    meta: Option<Meta>,
}

impl<T> Envelope<T> {
    /// Whether `meta.pagination.links.next` points at another page.
    pub(crate) fn has_next(&self) -> bool {
        self.meta
            .as_ref()
            .and_then(|meta| meta.pagination.as_ref())
            .and_then(|pagination| pagination.links.get("next"))
            .is_some_and(|next| !next.is_null())
    }
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    pagination: Option<Pagination>,
}

// `links` is an object on middle pages and an empty array on the last one.
#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    links: Value,
}

/// Identifiers arrive as numbers from some tenants and as strings from others.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireId {
    Text(String),
    Number(i64),
}

impl WireId {
    pub(crate) fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDirectory {
    id: WireId,
    #[serde(default)]
    parent_id: Option<WireId>,
    name: String,
    #[serde(default)]
    is_leaf: bool,
}

impl From<WireDirectory> for DirectoryNode {
    fn from(value: WireDirectory) -> Self {
        Self {
            id: value.id.into_string(),
            parent_id: value.parent_id.map(WireId::into_string),
            name: value.name,
            is_leaf: value.is_leaf,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireCustomer {
    id: WireId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    number: Option<WireId>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl From<WireCustomer> for CustomerRecord {
    fn from(value: WireCustomer) -> Self {
        Self {
            id: value.id.into_string(),
            name: value.name,
            number: value.number.map(WireId::into_string),
            kind: value.kind,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireItem {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    original_filename: Option<String>,
}

impl WireItem {
    /// Whether the stored item carries `filename` as its name or original name.
    pub(crate) fn matches(&self, filename: &str) -> bool {
        [self.name.as_deref(), self.original_filename.as_deref()]
            .into_iter()
            .flatten()
            .any(|candidate| candidate.eq_ignore_ascii_case(filename))
    }
}

/// Stored item as returned by the item search endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct WireSourceItem {
    pub(crate) id: WireId,
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) original_filename: Option<String>,
    #[serde(default)]
    pub(crate) dossier_directory_id: Option<WireId>,
    #[serde(default)]
    pub(crate) created_at: Option<String>,
    #[serde(default)]
    pub(crate) year: Option<WireId>,
    #[serde(default)]
    pub(crate) period: Option<String>,
    #[serde(default)]
    pub(crate) parent_id: Option<WireId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_textual_ids_deserialize() -> Result<(), serde_json::Error> {
        let envelope: Envelope<WireDirectory> = serde_json::from_str(
            r#"{"data":[{"id":7,"parent_id":null,"name":"Root"},{"id":"8","parent_id":7,"name":"Tax","is_leaf":true}]}"#,
        )?;
        let nodes: Vec<DirectoryNode> = envelope.data.into_iter().map(Into::into).collect();
        assert_eq!(nodes[0].id, "7");
        assert_eq!(nodes[0].parent_id, None);
        assert_eq!(nodes[1].parent_id.as_deref(), Some("7"));
        assert!(nodes[1].is_leaf);
        Ok(())
    }

    #[test]
    fn customer_type_maps_to_kind() -> Result<(), serde_json::Error> {
        let mut envelope: Envelope<WireCustomer> = serde_json::from_str(
            r#"{"data":[{"id":1,"name":"Acme","number":"0010","type":"business"}]}"#,
        )?;
        let record = CustomerRecord::from(envelope.data.remove(0));
        assert_eq!(record.number.as_deref(), Some("0010"));
        assert_eq!(record.kind.as_deref(), Some("business"));
        Ok(())
    }

    #[test]
    fn missing_data_is_an_empty_list() -> Result<(), serde_json::Error> {
        let envelope: Envelope<WireItem> = serde_json::from_str("{}")?;
        assert!(envelope.data.is_empty());
        Ok(())
    }

    #[test]
    fn next_link_marks_more_pages() -> Result<(), serde_json::Error> {
        let middle: Envelope<WireItem> = serde_json::from_str(
            r#"{"data":[],"meta":{"pagination":{"links":{"next":"https://api.test/customers?page=2"}}}}"#,
        )?;
        assert!(middle.has_next());

        let last: Envelope<WireItem> =
            serde_json::from_str(r#"{"data":[],"meta":{"pagination":{"links":[]}}}"#)?;
        assert!(!last.has_next());

        let unpaged: Envelope<WireItem> = serde_json::from_str(r#"{"data":[],"meta":null}"#)?;
        assert!(!unpaged.has_next());
        Ok(())
    }

    #[test]
    fn source_item_tolerates_sparse_rows() -> Result<(), serde_json::Error> {
        let mut envelope: Envelope<WireSourceItem> = serde_json::from_str(
            r#"{"data":[{"id":41,"original_filename":"scan.pdf","year":"2022","dossier_directory_id":null}]}"#,
        )?;
        let item = envelope.data.remove(0);
        assert_eq!(item.id.into_string(), "41");
        assert_eq!(item.year.map(WireId::into_string).as_deref(), Some("2022"));
        assert!(item.dossier_directory_id.is_none());
        assert!(item.created_at.is_none());
        Ok(())
    }

    #[test]
    fn item_matches_name_or_original_filename() {
        let item = WireItem {
            name: Some("Invoice.pdf".to_string()),
            original_filename: None,
        };
        assert!(item.matches("invoice.pdf"));
        let item = WireItem {
            name: None,
            original_filename: Some("scan.pdf".to_string()),
        };
        assert!(item.matches("scan.pdf"));
        assert!(!item.matches("other.pdf"));
    }
}
