//! Destination API client and multipart upload transport.

use std::time::Duration;

use async_trait::async_trait;
use dossiermig_core::{
    CustomerRecord, DestinationApi, DestinationError, DestinationResult, DirectoryNode,
    UploadRequest, UploadTransport,
};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::wire::{Envelope, WireCustomer, WireDirectory, WireItem};

const HEADER_TENANT: &str = "x-tenant";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_DIRECTORY_LIMIT: u32 = 1000;
const DEFAULT_CUSTOMER_LIMIT: u32 = 10_000;

/// Connection settings for [`DestinationClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Base URL of the API, e.g. `https://api.example.test/v1`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub access_token: String,
    /// Tenant sent in the `X-Tenant` header.
    pub tenant: String,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// Connection establishment timeout.
    pub connect_timeout: Duration,
    /// Page size used when listing directories.
    pub directory_limit: u32,
    /// Page size used when listing customers.
    pub customer_limit: u32,
}

impl ClientSettings {
    /// Settings with default timeouts and listing limits.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        tenant: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
            tenant: tenant.into(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            directory_limit: DEFAULT_DIRECTORY_LIMIT,
            customer_limit: DEFAULT_CUSTOMER_LIMIT,
        }
    }
}

/// `reqwest` backed implementation of the destination traits.
#[derive(Debug, Clone)]
pub struct DestinationClient {
    http: Client,
    base: String,
    directory_limit: u32,
    customer_limit: u32,
}

impl DestinationClient {
    /// Build a client with authentication headers baked into every request.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when a setting is blank, the base URL does not
    /// parse, a header value contains invalid characters, or the HTTP client
    /// cannot be constructed.
    pub fn new(settings: &ClientSettings) -> ClientResult<Self> {
        let base_url = require("base_url", &settings.base_url)?;
        let token = require("access_token", &settings.access_token)?;
        let tenant = require("tenant", &settings.tenant)?;

        Url::parse(base_url).map_err(|_| {
            ClientError::invalid(
                "base_url",
                "base url must be absolute",
                Some(base_url.to_string()),
            )
        })?;

        let mut default_headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            ClientError::invalid("access_token", "token contains invalid characters", None)
        })?;
        default_headers.insert(AUTHORIZATION, bearer);
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let tenant_value = HeaderValue::from_str(tenant).map_err(|_| {
            ClientError::invalid(
                "tenant",
                "tenant contains invalid characters",
                Some(tenant.to_string()),
            )
        })?;
        default_headers.insert(HEADER_TENANT, tenant_value);

        let http = Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|source| ClientError::Build { source })?;

        Ok(Self {
            http,
            base: base_url.trim_end_matches('/').to_string(),
            directory_limit: settings.directory_limit,
            customer_limit: settings.customer_limit,
        })
    }

    fn endpoint(&self, operation: &'static str, path: &str) -> DestinationResult<Url> {
        let raw = format!("{}/{}", self.base, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|_| DestinationError::Payload {
            operation,
            reason: "endpoint url invalid",
            value: Some(raw),
        })
    }

    pub(crate) async fn get_page<W>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> DestinationResult<Envelope<W>>
    where
        W: DeserializeOwned,
    {
        let bytes = self.get_bytes(operation, path, query).await?;
        serde_json::from_slice(&bytes).map_err(|_| DestinationError::Payload {
            operation,
            reason: "response body is not the expected json",
            value: Some(String::from_utf8_lossy(&bytes).chars().take(256).collect()),
        })
    }

    pub(crate) async fn get_bytes(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> DestinationResult<Vec<u8>> {
        let url = self.endpoint(operation, path)?;
        debug!(operation, url = %url, "destination request");
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|err| DestinationError::transport(operation, err))?;
        let response = check_status(operation, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| DestinationError::transport(operation, err))?;
        Ok(bytes.to_vec())
    }

    /// Every row of a paged listing, following `meta.pagination.links.next`.
    async fn get_all<T, W>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> DestinationResult<Vec<T>>
    where
        W: DeserializeOwned,
        T: From<W>,
    {
        let mut rows = Vec::new();
        let mut page: u32 = 1;
        loop {
            let mut paged = query.to_vec();
            paged.push(("page", page.to_string()));
            let envelope = self.get_page::<W>(operation, path, &paged).await?;
            let more = envelope.has_next() && !envelope.data.is_empty();
            rows.extend(envelope.data.into_iter().map(T::from));
            if !more {
                return Ok(rows);
            }
            page += 1;
            debug!(operation, page, rows = rows.len(), "following next page");
        }
    }
}

fn require<'a>(field: &'static str, value: &'a str) -> ClientResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ClientError::MissingSetting { field })
    } else {
        Ok(trimmed)
    }
}

/// Map 401/403 to `Unauthorized` and every other non-success status to `Status`.
async fn check_status(operation: &'static str, response: Response) -> DestinationResult<Response> {
    let status = response.status();
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(DestinationError::Unauthorized {
            operation,
            status: status.as_u16(),
        });
    }
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .ok()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());
    Err(DestinationError::Status {
        operation,
        status: status.as_u16(),
        body,
    })
}

fn upload_fields(request: &UploadRequest) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("customer_id", request.customer_id.clone()),
        ("dossier_directory_id", request.directory_id.clone()),
        ("name", request.name.clone()),
        (
            "year",
            request.year.map(|year| year.to_string()).unwrap_or_default(),
        ),
        ("period", request.period.clone().unwrap_or_default()),
        (
            "created_at",
            request
                .created_at
                .map(|at| at.timestamp().to_string())
                .unwrap_or_default(),
        ),
        ("suppress_async", "1".to_string()),
    ];
    if let Some(parent) = &request.parent_id {
        fields.push(("parent_id", parent.clone()));
    }
    fields
}

fn upload_form(request: &UploadRequest) -> Form {
    let resource = Part::bytes(request.content.clone()).file_name(request.name.clone());
    upload_fields(request)
        .into_iter()
        .fold(Form::new().part("resource", resource), |form, (name, value)| {
            form.text(name, value)
        })
}

#[async_trait]
impl DestinationApi for DestinationClient {
    async fn list_directories(
        &self,
        customer_id: Option<&str>,
    ) -> DestinationResult<Vec<DirectoryNode>> {
        let path = customer_id.map_or_else(
            || "dossier_directories".to_string(),
            |id| format!("customers/{id}/dossier_directories"),
        );
        self.get_all::<DirectoryNode, WireDirectory>(
            "directories.list",
            &path,
            &[("limit", self.directory_limit.to_string())],
        )
        .await
    }

    async fn list_customers(&self) -> DestinationResult<Vec<CustomerRecord>> {
        self.get_all::<CustomerRecord, WireCustomer>(
            "customers.list",
            "customers",
            &[
                ("all", "1".to_string()),
                ("limit", self.customer_limit.to_string()),
            ],
        )
        .await
    }

    async fn item_exists(&self, customer_id: &str, filename: &str) -> DestinationResult<bool> {
        let items = self
            .get_page::<WireItem>(
                "items.search",
                "search/dossier_items",
                &[
                    ("customer_id", customer_id.to_string()),
                    ("name", filename.to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(items.data.iter().any(|item| item.matches(filename)))
    }
}

#[async_trait]
impl UploadTransport for DestinationClient {
    async fn upload(&self, request: &UploadRequest) -> DestinationResult<()> {
        const OPERATION: &str = "items.create";
        let url = self.endpoint(OPERATION, "dossier_items")?;
        let response = self
            .http
            .post(url)
            .multipart(upload_form(request))
            .send()
            .await
            .map_err(|err| DestinationError::transport(OPERATION, err))?;
        check_status(OPERATION, response).await?;
        debug!(
            customer = %request.customer_id,
            directory = %request.directory_id,
            name = %request.name,
            "item created"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::{TimeZone, Utc};
    use httpmock::MockServer;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> Result<DestinationClient> {
        let settings = ClientSettings::new(server.base_url(), "secret-token", "acme");
        Ok(DestinationClient::new(&settings)?)
    }

    fn sample_request() -> UploadRequest {
        UploadRequest {
            customer_id: "C1".to_string(),
            directory_id: "D9".to_string(),
            name: "invoice.pdf".to_string(),
            year: Some(2023),
            period: Some("q1".to_string()),
            created_at: Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).single(),
            parent_id: None,
            content: b"%PDF".to_vec(),
        }
    }

    #[test]
    fn blank_settings_are_rejected() {
        let err = DestinationClient::new(&ClientSettings::new("http://localhost", " ", "acme"))
            .err();
        assert!(matches!(
            err,
            Some(ClientError::MissingSetting {
                field: "access_token"
            })
        ));

        let err =
            DestinationClient::new(&ClientSettings::new("not a url", "token", "acme")).err();
        assert!(matches!(
            err,
            Some(ClientError::InvalidSetting {
                field: "base_url",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn list_directories_sends_auth_headers() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/dossier_directories")
                .query_param("limit", "1000")
                .header("authorization", "Bearer secret-token")
                .header("x-tenant", "acme")
                .header("accept", "application/json");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "data": [
                        {"id": 1, "parent_id": null, "name": "Root", "is_leaf": false},
                        {"id": 9, "parent_id": 1, "name": "Belastingen", "is_leaf": true}
                    ]
                }));
        });

        let nodes = client_for(&server)?.list_directories(None).await?;
        mock.assert();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].id, "9");
        assert_eq!(nodes[1].parent_id.as_deref(), Some("1"));
        Ok(())
    }

    #[tokio::test]
    async fn customer_scoped_directories_use_customer_path() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/customers/C1/dossier_directories");
            then.status(200).json_body(json!({"data": []}));
        });

        let nodes = client_for(&server)?.list_directories(Some("C1")).await?;
        mock.assert();
        assert!(nodes.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn list_customers_requests_all() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/customers")
                .query_param("all", "1")
                .query_param("limit", "10000");
            then.status(200).json_body(json!({
                "data": [{"id": "C1", "name": "Acme", "number": "0010", "type": "business"}]
            }));
        });

        let customers = client_for(&server)?.list_customers().await?;
        mock.assert();
        assert_eq!(customers[0].number.as_deref(), Some("0010"));
        Ok(())
    }

    #[tokio::test]
    async fn listings_follow_next_page_links() -> Result<()> {
        let server = MockServer::start_async().await;
        let first = server.mock(|when, then| {
            when.method(GET).path("/customers").query_param("page", "1");
            then.status(200).json_body(json!({
                "data": [{"id": "C1", "name": "Acme", "number": "10", "type": "business"}],
                "meta": {"pagination": {"current_page": 1, "links": {
                    "next": format!("{}/customers?page=2", server.base_url())
                }}}
            }));
        });
        let second = server.mock(|when, then| {
            when.method(GET).path("/customers").query_param("page", "2");
            then.status(200).json_body(json!({
                "data": [{"id": "C2", "name": "Globex", "number": "11", "type": "person"}],
                "meta": {"pagination": {"current_page": 2, "links": []}}
            }));
        });

        let customers = client_for(&server)?.list_customers().await?;
        first.assert();
        second.assert();
        let ids: Vec<&str> = customers.iter().map(|customer| customer.id.as_str()).collect();
        assert_eq!(ids, vec!["C1", "C2"]);
        Ok(())
    }

    #[tokio::test]
    async fn empty_page_ends_the_listing() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/dossier_directories").query_param("page", "1");
            then.status(200).json_body(json!({
                "data": [],
                "meta": {"pagination": {"links": {"next": "ignored"}}}
            }));
        });

        let nodes = client_for(&server)?.list_directories(None).await?;
        assert!(nodes.is_empty());
        mock.assert_calls(1);
        Ok(())
    }

    #[tokio::test]
    async fn forbidden_maps_to_unauthorized() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/customers");
            then.status(403);
        });

        let err = client_for(&server)?.list_customers().await.err();
        assert!(err.as_ref().is_some_and(DestinationError::is_unauthorized));
        Ok(())
    }

    #[tokio::test]
    async fn server_errors_keep_status_and_body() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/dossier_items");
            then.status(500).body("boom");
        });

        let err = client_for(&server)?.upload(&sample_request()).await.err();
        match err {
            Some(DestinationError::Status { status, body, .. }) => {
                assert_eq!(status, 500);
                assert_eq!(body.as_deref(), Some("boom"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn upload_posts_multipart_form() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/dossier_items")
                .header("authorization", "Bearer secret-token");
            then.status(201).json_body(json!({"data": {"id": "I1"}}));
        });

        client_for(&server)?.upload(&sample_request()).await?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn item_exists_checks_returned_names() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/search/dossier_items")
                .query_param("customer_id", "C1")
                .query_param("name", "invoice.pdf")
                .query_param("limit", "1");
            then.status(200)
                .json_body(json!({"data": [{"id": 3, "name": "invoice.pdf"}]}));
        });

        let client = client_for(&server)?;
        assert!(client.item_exists("C1", "invoice.pdf").await?);
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn malformed_payload_is_reported() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/dossier_directories");
            then.status(200).body("<html>");
        });

        let err = client_for(&server)?.list_directories(None).await.err();
        assert!(matches!(err, Some(DestinationError::Payload { .. })));
        Ok(())
    }

    #[test]
    fn form_fields_carry_upload_metadata() {
        let mut request = sample_request();
        let fields = upload_fields(&request);
        let value = |name: &str| {
            fields
                .iter()
                .find(|(field, _)| *field == name)
                .map(|(_, value)| value.clone())
        };
        assert_eq!(value("dossier_directory_id").as_deref(), Some("D9"));
        assert_eq!(value("year").as_deref(), Some("2023"));
        assert_eq!(value("created_at").as_deref(), Some("1677672000"));
        assert_eq!(value("suppress_async").as_deref(), Some("1"));
        assert_eq!(value("parent_id"), None);

        request.parent_id = Some("P1".to_string());
        assert!(
            upload_fields(&request)
                .iter()
                .any(|(field, value)| *field == "parent_id" && value == "P1")
        );
    }
}
