//! Thin REST client for the document endpoints the stores need.

use std::fmt;
use std::sync::Arc;

use ecoearn_core::ports::StoreError;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::value::{Document, Fields, Value};

/// Public REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

const PAGE_SIZE: &str = "300";

/// Connection settings for one Firestore database.
#[derive(Clone)]
pub struct FirestoreConfig {
    /// Cloud project id.
    pub project_id: String,
    /// Database id, `(default)` unless the project uses named databases.
    pub database: String,
    /// Web API key sent as the `key` query parameter.
    pub api_key: Option<String>,
    /// OAuth or ID token sent as a bearer token.
    pub bearer_token: Option<String>,
    /// REST root, overridable for the emulator and tests.
    pub base_url: String,
}

impl FirestoreConfig {
    /// Settings for `project_id` on the public endpoint, without credentials.
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: String::from("(default)"),
            api_key: None,
            bearer_token: None,
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }
}

impl fmt::Debug for FirestoreConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FirestoreConfig")
            .field("project_id", &self.project_id)
            .field("database", &self.database)
            .field("api_key", &self.api_key.as_ref().map(|_key| "<redacted>"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_token| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Write precondition on a PATCH.
#[derive(Debug, Clone)]
pub(crate) enum Precondition {
    /// The document must already exist.
    Exists,
    /// The document must not have changed since this update time.
    UpdatedAt(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct WriteBody<'fields> {
    fields: &'fields Fields,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunQueryBody<'query> {
    structured_query: StructuredQuery<'query>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StructuredQuery<'query> {
    from: [CollectionSelector<'query>; 1],
    #[serde(rename = "where")]
    filter: Filter<'query>,
    order_by: [Order<'query>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionSelector<'query> {
    collection_id: &'query str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Filter<'query> {
    field_filter: FieldFilter<'query>,
}

#[derive(Debug, Serialize)]
struct FieldFilter<'query> {
    field: FieldReference<'query>,
    op: &'static str,
    value: &'query Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldReference<'query> {
    field_path: &'query str,
}

#[derive(Debug, Serialize)]
struct Order<'query> {
    field: FieldReference<'query>,
    direction: &'static str,
}

/// One element of a `runQuery` response stream; the first may only carry `readTime`.
#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    document: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Shared HTTP client bound to one database.
#[derive(Debug, Clone)]
pub(crate) struct FirestoreClient {
    http: Client,
    config: Arc<FirestoreConfig>,
}

impl FirestoreClient {
    pub(crate) fn new(http: Client, config: FirestoreConfig) -> Self {
        Self {
            http,
            config: Arc::new(config),
        }
    }

    pub(crate) fn project_id(&self) -> &str {
        &self.config.project_id
    }

    fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.config.base_url.trim_end_matches('/'),
            self.config.project_id,
            self.config.database,
        )
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{collection}", self.documents_root())
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{id}", self.collection_url(collection))
    }

    fn authorize(&self, mut req: RequestBuilder) -> RequestBuilder {
        if let Some(key) = &self.config.api_key {
            req = req.query(&[("key", key)]);
        }
        if let Some(token) = &self.config.bearer_token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Fetch one document, `None` on 404.
    pub(crate) async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        let req = self.authorize(self.http.get(self.document_url(collection, id)));
        match fetch_json::<Document>(req).await {
            Ok(document) => Ok(Some(document)),
            Err(StoreError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Every document of `collection`, following page tokens.
    pub(crate) async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .http
                .get(self.collection_url(collection))
                .query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token)]);
            }

            let page = fetch_json::<ListResponse>(self.authorize(req)).await?;
            documents.extend(page.documents);

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(collection, count = documents.len(), "listed documents");
        Ok(documents)
    }

    /// Documents of `collection` whose `field` equals `value`, ascending by `order_by`.
    ///
    /// Filtering on one field and ordering by another needs a composite index
    /// on the collection.
    pub(crate) async fn run_query(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
        order_by: &str,
    ) -> Result<Vec<Document>, StoreError> {
        let body = RunQueryBody {
            structured_query: StructuredQuery {
                from: [CollectionSelector {
                    collection_id: collection,
                }],
                filter: Filter {
                    field_filter: FieldFilter {
                        field: FieldReference { field_path: field },
                        op: "EQUAL",
                        value,
                    },
                },
                order_by: [Order {
                    field: FieldReference {
                        field_path: order_by,
                    },
                    direction: "ASCENDING",
                }],
            },
        };
        let req = self
            .http
            .post(format!("{}:runQuery", self.documents_root()))
            .json(&body);

        let results = fetch_json::<Vec<QueryResult>>(self.authorize(req)).await?;
        let documents: Vec<Document> = results
            .into_iter()
            .filter_map(|result| result.document)
            .collect();
        debug!(collection, field, count = documents.len(), "queried documents");
        Ok(documents)
    }

    /// Create a document. With `id = None` the server assigns one.
    pub(crate) async fn create(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: &Fields,
    ) -> Result<Document, StoreError> {
        let mut req = self
            .http
            .post(self.collection_url(collection))
            .json(&WriteBody { fields });
        if let Some(id) = id {
            req = req.query(&[("documentId", id)]);
        }
        fetch_json(self.authorize(req)).await
    }

    /// Overwrite the named fields of an existing document.
    pub(crate) async fn patch(
        &self,
        collection: &str,
        id: &str,
        fields: &Fields,
        precondition: Precondition,
    ) -> Result<Document, StoreError> {
        let mut req = self
            .http
            .patch(self.document_url(collection, id))
            .json(&WriteBody { fields });
        for path in fields.keys() {
            req = req.query(&[("updateMask.fieldPaths", path)]);
        }
        req = match &precondition {
            Precondition::Exists => req.query(&[("currentDocument.exists", "true")]),
            Precondition::UpdatedAt(at) => req.query(&[("currentDocument.updateTime", at)]),
        };
        fetch_json(self.authorize(req)).await
    }
}

// Send the request and decode JSON, mapping Firestore error envelopes.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, StoreError> {
    let response = req.send().await?;
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(StoreError::from);
    }

    let body = response.text().await.unwrap_or_default();
    Err(rejection(status, &body))
}

fn rejection(status: StatusCode, body: &str) -> StoreError {
    let (code, message) = serde_json::from_str::<ErrorEnvelope>(body).map_or_else(
        |_unparsed| (String::new(), body.trim().to_owned()),
        |envelope| (envelope.error.status, envelope.error.message),
    );

    match (status, code.as_str()) {
        (StatusCode::NOT_FOUND, _) | (_, "NOT_FOUND") => StoreError::NotFound,
        (StatusCode::CONFLICT, _) | (_, "ALREADY_EXISTS" | "ABORTED" | "FAILED_PRECONDITION") => {
            StoreError::Conflict
        }
        _ => StoreError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}
