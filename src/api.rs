use crate::error::ApiError;
use crate::transport::{endpoint, ApiRequest, Method, Transport};
use crate::types::{Detection, Envelope, Health, NewWatchlistEntry, Stats, WatchlistEntry};
use bytes::Bytes;
use log::warn;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Typed calls against the plate API.
#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(base: Url, transport: Arc<dyn Transport>) -> Self {
        ApiClient { base, transport }
    }

    pub fn image_url(&self, id: i64) -> Option<String> {
        let id = id.to_string();
        endpoint(&self.base, &["api", "image", id.as_str()])
            .ok()
            .map(String::from)
    }

    /// Sends the request and funnels both transport failures and non-2xx
    /// replies into `ApiError`.
    async fn fetch(&self, request: ApiRequest) -> Result<Bytes, ApiError> {
        let path = request.path();
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            let body = response.text();
            warn!("Fetch error {} {}: {}", path, response.status, body);
            return Err(ApiError::Protocol {
                status: response.status,
                body,
            });
        }
        Ok(response.body)
    }

    async fn fetch_envelope<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Envelope<T>, ApiError> {
        let body = self.fetch(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn stats(&self) -> Result<Stats, ApiError> {
        self.fetch_envelope::<Stats>(ApiRequest::new(Method::Get, &["api", "stats"]))
            .await?
            .into_data()
    }

    pub async fn today(&self) -> Result<Vec<Detection>, ApiError> {
        self.fetch_envelope::<Vec<Detection>>(ApiRequest::new(
            Method::Get,
            &["api", "stats", "today"],
        ))
        .await?
        .into_records()
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<Detection>, ApiError> {
        self.fetch_envelope::<Vec<Detection>>(
            ApiRequest::new(Method::Get, &["api", "plates", "recent"]).query("limit", limit),
        )
        .await?
        .into_records()
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Detection>, ApiError> {
        self.fetch_envelope::<Vec<Detection>>(
            ApiRequest::new(Method::Get, &["api", "plates", "search"]).query("q", query),
        )
        .await?
        .into_records()
    }

    pub async fn delete_detection(&self, id: i64, reason: &str) -> Result<String, ApiError> {
        self.fetch_envelope::<Value>(
            ApiRequest::new(Method::Delete, &["api", "plates", &id.to_string()])
                .query("reason", reason),
        )
        .await?
        .into_message("Deleted")
    }

    pub async fn image(&self, id: i64) -> Result<Bytes, ApiError> {
        self.fetch(ApiRequest::new(Method::Get, &["api", "image", &id.to_string()]))
            .await
    }

    pub async fn watchlist(&self) -> Result<Vec<WatchlistEntry>, ApiError> {
        self.fetch_envelope::<Vec<WatchlistEntry>>(ApiRequest::new(
            Method::Get,
            &["api", "watchlist"],
        ))
        .await?
        .into_records()
    }

    pub async fn add_watchlist(&self, entry: &NewWatchlistEntry) -> Result<String, ApiError> {
        let body = serde_json::to_value(entry)?;
        self.fetch_envelope::<Value>(
            ApiRequest::new(Method::Post, &["api", "watchlist"]).json(body),
        )
        .await?
        .into_message("Added")
    }

    pub async fn delete_watchlist(&self, plate_number: &str) -> Result<String, ApiError> {
        self.fetch_envelope::<Value>(ApiRequest::new(
            Method::Delete,
            &["api", "watchlist", plate_number],
        ))
        .await?
        .into_message("Removed")
    }

    pub async fn health(&self) -> Result<Health, ApiError> {
        let body = self
            .fetch(ApiRequest::new(Method::Get, &["api", "health"]))
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
