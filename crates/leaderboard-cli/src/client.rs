//! Typed HTTP client for the query API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use leaderboard_types::{
    ActivityResponse, DeadLettersResponse, EntityId, HealthResponse, RankResponse, StatsResponse,
    TopResponse,
};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for one query server.
#[derive(Debug, Clone)]
pub struct QueryClient {
    http: reqwest::Client,
    base_url: Url,
}

impl QueryClient {
    /// Client for the server at `base_url` (e.g. `http://localhost:8080`).
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute `http(s)` URL or the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid server URL {base_url:?}"))?;
        if base_url.cannot_be_a_base() {
            bail!("server URL {base_url} cannot carry a path");
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base_url })
    }

    /// `base_url` with `segments` appended, each percent-encoded so ids
    /// containing `/`, `?` or `#` stay one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("server URL {} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        debug!(%url, ?query, "GET");
        let response = self
            .http
            .get(url.clone())
            .query(query)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let message = body
                .get("error")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("no error message");
            bail!("{url} returned {status}: {message}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("invalid response body from {url}"))
    }

    /// `GET /health`. A draining server answers `503`, reported as an error.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn health(&self) -> Result<HealthResponse> {
        self.get_json(&["health"], &[]).await
    }

    /// `GET /api/rank/{entity_id}`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status, including
    /// an unranked entity.
    pub async fn rank(&self, entity_id: &EntityId) -> Result<RankResponse> {
        self.get_json(&["api", "rank", entity_id.as_str()], &[]).await
    }

    /// `GET /api/top?k=&offset=`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn top(&self, k: usize, offset: usize) -> Result<TopResponse> {
        self.get_json(
            &["api", "top"],
            &[("k", k.to_string()), ("offset", offset.to_string())],
        )
        .await
    }

    /// `GET /api/activity/top?k=`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn activity_top(&self, k: usize) -> Result<ActivityResponse> {
        self.get_json(&["api", "activity", "top"], &[("k", k.to_string())])
            .await
    }

    /// `GET /api/stats`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn stats(&self) -> Result<StatsResponse> {
        self.get_json(&["api", "stats"], &[]).await
    }

    /// `GET /api/dead-letters?limit=`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx status.
    pub async fn dead_letters(&self, limit: usize) -> Result<DeadLettersResponse> {
        self.get_json(&["api", "dead-letters"], &[("limit", limit.to_string())])
            .await
    }
}
