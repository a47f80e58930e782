//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts},
    params::Refresh,
    BulkParts, DeleteByQueryParts, OpenSearch, SearchParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::queries::{build_scan_page_query, build_type_query, FETCH_PAGE_SIZE};
use crate::types::{BulkIndexSummary, BulkItemError, IndexDocument};

/// OpenSearch client implementation.
///
/// # Example
///
/// ```ignore
/// let client = OpenSearchClient::new("http://localhost:9200").await?;
/// let deleted = client.delete_by_query("reference_data", "language").await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, "Created OpenSearch client");

        Ok(Self { client })
    }

    /// Build the newline-delimited bulk body: one action line, one source line per document.
    fn bulk_body(index: &str, documents: &[IndexDocument]) -> Vec<JsonBody<Value>> {
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);
        for doc in documents {
            body.push(json!({"index": {"_index": index, "_id": doc.id}}).into());
            body.push(doc.body.clone().into());
        }
        body
    }

    /// Turn a bulk API response into a summary of per-item outcomes.
    fn parse_bulk_response(response: &Value, total: usize) -> BulkIndexSummary {
        let has_errors = response
            .get("errors")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if !has_errors {
            return BulkIndexSummary::all_succeeded(total);
        }

        let errors: Vec<BulkItemError> = response
            .get("items")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let action = item.get("index")?;
                        let error = action.get("error")?;
                        Some(BulkItemError {
                            id: action
                                .get("_id")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            reason: error
                                .get("reason")
                                .and_then(Value::as_str)
                                .map(str::to_string)
                                .unwrap_or_else(|| error.to_string()),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let failed = errors.len();
        BulkIndexSummary {
            total,
            succeeded: total.saturating_sub(failed),
            failed,
            errors,
        }
    }

    /// Extract `(sources, last_sort_values)` from one search response page.
    fn parse_hits(response: &Value) -> Result<(Vec<Value>, Option<Value>), SearchIndexError> {
        let hits = response
            .get("hits")
            .and_then(|h| h.get("hits"))
            .and_then(Value::as_array)
            .ok_or_else(|| SearchIndexError::parse("search response has no hits array"))?;

        let sources = hits
            .iter()
            .filter_map(|hit| hit.get("_source").cloned())
            .collect();
        let last_sort = hits.last().and_then(|hit| hit.get("sort").cloned());

        Ok((sources, last_sort))
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchClient {
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(SearchIndexError::index_management(format!(
                "Unexpected status {} checking index {}",
                status, index
            ))),
        }
    }

    #[instrument(skip(self, schema))]
    async fn create_index(&self, index: &str, schema: &Value) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(schema.clone())
            .send()
            .await
            .map_err(|e| SearchIndexError::index_management(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Index creation failed");
            return Err(SearchIndexError::index_management(format!(
                "Creating index {} failed with status {}: {}",
                index, status, error_body
            )));
        }

        info!(index = %index, "Created index");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_index(&self, index: &str) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchIndexError::index_management(e.to_string()))?;

        let status = response.status_code();

        // 404 is acceptable - the index may not exist yet
        if !status.is_success() && status.as_u16() != 404 {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Index deletion failed");
            return Err(SearchIndexError::index_management(format!(
                "Deleting index {} failed with status {}: {}",
                index, status, error_body
            )));
        }

        info!(index = %index, "Deleted index");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_by_query(&self, index: &str, data_type: &str) -> Result<u64, SearchIndexError> {
        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[index]))
            .refresh(true)
            .body(build_type_query(data_type))
            .send()
            .await
            .map_err(|e| SearchIndexError::delete(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Delete by query failed");
            return Err(SearchIndexError::delete(format!(
                "Delete by query failed with status {}: {}",
                status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        let deleted = body.get("deleted").and_then(Value::as_u64).unwrap_or(0);

        debug!(index = %index, data_type = %data_type, deleted, "Deleted documents by type");
        Ok(deleted)
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn bulk_index(
        &self,
        index: &str,
        documents: &[IndexDocument],
    ) -> Result<BulkIndexSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BulkIndexSummary::default());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(index))
            .refresh(Refresh::WaitFor)
            .body(Self::bulk_body(index, documents))
            .send()
            .await
            .map_err(|e| SearchIndexError::bulk_operation(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(SearchIndexError::bulk_operation(format!(
                "Bulk request failed with status {}: {}",
                status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let summary = Self::parse_bulk_response(&body, documents.len());
        debug!(
            index = %index,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk request completed"
        );
        Ok(summary)
    }

    #[instrument(skip(self))]
    async fn fetch_all(&self, index: &str) -> Result<Vec<Value>, SearchIndexError> {
        let mut documents = Vec::new();
        let mut search_after: Option<Value> = None;

        loop {
            let response = self
                .client
                .search(SearchParts::Index(&[index]))
                .body(build_scan_page_query(FETCH_PAGE_SIZE, search_after.as_ref()))
                .send()
                .await
                .map_err(|e| SearchIndexError::query(e.to_string()))?;

            let status = response.status_code();
            if !status.is_success() {
                let error_body = response.text().await.unwrap_or_default();
                return Err(SearchIndexError::query(format!(
                    "Search on {} failed with status {}: {}",
                    index, status, error_body
                )));
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| SearchIndexError::parse(e.to_string()))?;

            let (page, last_sort) = Self::parse_hits(&body)?;
            let page_len = page.len();
            documents.extend(page);

            if page_len < FETCH_PAGE_SIZE || last_sort.is_none() {
                break;
            }
            search_after = last_sort;
        }

        debug!(index = %index, count = documents.len(), "Fetched all documents");
        Ok(documents)
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let health: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        let status = health
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        debug!(status = %status, "OpenSearch cluster status");
        Ok(status == "green" || status == "yellow")
    }
}
