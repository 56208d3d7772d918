//! HTTP-backed implementations of the pluggable store interfaces.
//!
//! All calls retry with exponential backoff on transport errors and 5xx
//! responses; 4xx responses never retry. After exhaustion the failure
//! surfaces as a backend error and the fail-closed rules take over.

use async_trait::async_trait;
use planguard_carbon::{CarbonError, CarbonStore};
use planguard_catalog::{
    CatalogError, CatalogStore, IngestOutcome, RateQuery, ResolvedPricing, Snapshot,
    SnapshotIngest,
};
use planguard_policy::{PolicyError, PolicyEvaluator, PolicyRequest};
use planguard_types::PolicyVerdict;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use crate::retry::RetryPolicy;

/// Transport-level failure classification.
#[derive(Debug)]
enum TransportError {
    Status(StatusCode, String),
    Transport(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Status(status, body) => write!(f, "status {status}: {body}"),
            TransportError::Transport(message) => write!(f, "transport error: {message}"),
        }
    }
}

impl TransportError {
    fn is_retryable(&self) -> bool {
        match self {
            TransportError::Transport(_) => true,
            TransportError::Status(status, _) => status.is_server_error(),
        }
    }

    fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::Status(status, _) => Some(*status),
            TransportError::Transport(_) => None,
        }
    }
}

async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, TransportError> {
    let response = builder
        .send()
        .await
        .map_err(|e| TransportError::Transport(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(TransportError::Status(status, body));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| TransportError::Transport(e.to_string()))
}

fn bearer(builder: RequestBuilder, token: &Option<String>) -> RequestBuilder {
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// [`CatalogStore`] over a remote catalog service.
pub struct RemoteCatalogClient {
    base_url: String,
    token: Option<String>,
    client: Client,
    retry: RetryPolicy,
}

impl RemoteCatalogClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token,
            client: Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, path: String) -> Result<T, TransportError> {
        self.retry
            .run(
                || {
                    let builder =
                        bearer(self.client.get(format!("{}{path}", self.base_url)), &self.token);
                    send_json::<T>(builder)
                },
                TransportError::is_retryable,
            )
            .await
    }

    async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: String,
        body: &B,
    ) -> Result<T, TransportError> {
        self.retry
            .run(
                || {
                    let builder = bearer(
                        self.client.post(format!("{}{path}", self.base_url)).json(body),
                        &self.token,
                    );
                    send_json::<T>(builder)
                },
                TransportError::is_retryable,
            )
            .await
    }
}

#[async_trait]
impl CatalogStore for RemoteCatalogClient {
    async fn ingest(&self, payload: SnapshotIngest) -> Result<IngestOutcome, CatalogError> {
        self.post_json("/v1/snapshots".to_string(), &payload)
            .await
            .map_err(|e| CatalogError::Backend(e.to_string()))
    }

    async fn activate(&self, snapshot_id: Uuid) -> Result<(), CatalogError> {
        let _: serde_json::Value = self
            .post_json(
                format!("/v1/snapshots/{snapshot_id}/activate"),
                &serde_json::json!({}),
            )
            .await
            .map_err(|e| match e.status() {
                Some(StatusCode::NOT_FOUND) => CatalogError::SnapshotMissing(snapshot_id),
                _ => CatalogError::Backend(e.to_string()),
            })?;
        Ok(())
    }

    async fn snapshot(&self, snapshot_id: Uuid) -> Result<Option<Snapshot>, CatalogError> {
        match self
            .get_json::<Snapshot>(format!("/v1/snapshots/{snapshot_id}"))
            .await
        {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => Ok(None),
            Err(e) => Err(CatalogError::Backend(e.to_string())),
        }
    }

    async fn active_snapshot(
        &self,
        provider: &str,
        region: &str,
        alias: &str,
    ) -> Result<Option<Snapshot>, CatalogError> {
        match self
            .get_json::<Snapshot>(format!(
                "/v1/snapshots/active?provider={provider}&region={region}&alias={alias}"
            ))
            .await
        {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => Ok(None),
            Err(e) => Err(CatalogError::Backend(e.to_string())),
        }
    }

    async fn list_snapshots(
        &self,
        provider: &str,
        region: &str,
    ) -> Result<Vec<Snapshot>, CatalogError> {
        self.get_json(format!("/v1/snapshots?provider={provider}&region={region}"))
            .await
            .map_err(|e| CatalogError::Backend(e.to_string()))
    }

    async fn resolve(&self, query: &RateQuery) -> Result<ResolvedPricing, CatalogError> {
        self.post_json("/v1/rates/resolve".to_string(), query)
            .await
            .map_err(|e| match e.status() {
                Some(StatusCode::NOT_FOUND) => CatalogError::PriceNotFound(e.to_string()),
                _ => CatalogError::Backend(e.to_string()),
            })
    }
}

// ---------------------------------------------------------------------------
// Carbon
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct IntensityResponse {
    intensity_g_per_kwh: f64,
}

/// [`CarbonStore`] over a remote intensity service.
pub struct RemoteCarbonClient {
    base_url: String,
    client: Client,
    retry: RetryPolicy,
}

impl RemoteCarbonClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
            retry: RetryPolicy::default(),
        }
    }
}

#[async_trait]
impl CarbonStore for RemoteCarbonClient {
    async fn intensity(&self, provider: &str, region: &str) -> Result<f64, CarbonError> {
        let response: IntensityResponse = self
            .retry
            .run(
                || {
                    let builder = self.client.get(format!(
                        "{}/v1/intensity?provider={provider}&region={region}",
                        self.base_url
                    ));
                    send_json(builder)
                },
                TransportError::is_retryable,
            )
            .await
            .map_err(|e| CarbonError::Backend(e.to_string()))?;
        Ok(response.intensity_g_per_kwh)
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// [`PolicyEvaluator`] over a remote rule runtime.
pub struct RemotePolicyClient {
    base_url: String,
    client: Client,
    retry: RetryPolicy,
}

impl RemotePolicyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
            retry: RetryPolicy::default(),
        }
    }
}

#[async_trait]
impl PolicyEvaluator for RemotePolicyClient {
    async fn evaluate(&self, request: &PolicyRequest) -> Result<PolicyVerdict, PolicyError> {
        self.retry
            .run(
                || {
                    let builder = self
                        .client
                        .post(format!("{}/v1/evaluate", self.base_url))
                        .json(request);
                    send_json(builder)
                },
                TransportError::is_retryable,
            )
            .await
            .map_err(|e| PolicyError::Unreachable(e.to_string()))
    }
}
