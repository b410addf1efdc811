//! `OpenStack` HTTP client.
//!
//! Authenticates once against Keystone v3 with a password, keeps the token
//! and service catalog, and resolves each service's public endpoint from
//! the catalog.

use async_trait::async_trait;
use reqwest::{Client, Method, Url, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

use super::api::{CloudApi, CloudConnector};
use super::types::{CatalogEntry, Credentials};
use crate::error::{OpenStackError, Result, UndercloudError};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Header carrying the issued token.
const SUBJECT_TOKEN: &str = "X-Subject-Token";

/// Header carrying the token on every service request.
const AUTH_TOKEN: &str = "X-Auth-Token";

/// Request body.
#[derive(Debug, Clone)]
pub(crate) enum Body {
    /// No body.
    Empty,
    /// JSON document.
    Json(Value),
    /// Plain text.
    Text(String),
}

/// Authenticated `OpenStack` client.
#[derive(Debug, Clone)]
pub struct OpenStackClient {
    /// HTTP client.
    client: Client,
    /// Keystone token.
    token: String,
    /// Service catalog from the token.
    catalog: Vec<CatalogEntry>,
    /// Keystone v3 base URL.
    identity_url: String,
    /// Endpoint interface to use.
    interface: String,
    /// Workflow endpoint overriding the catalog.
    workflow_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
}

impl OpenStackClient {
    /// Authenticates and returns a client scoped to the credentials' project.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::AuthenticationFailed`] when Keystone rejects
    /// the credentials, or a network error after retries.
    pub async fn connect(credentials: &Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| OpenStackError::network(format!("Failed to create HTTP client: {e}")))?;
        let identity_url = identity_base(&credentials.auth_url);

        let (token, catalog) =
            with_retries(|| authenticate_once(&client, &identity_url, credentials)).await?;
        info!(
            "Authenticated to {identity_url} as {} ({} services in catalog)",
            credentials.username,
            catalog.len()
        );

        Ok(Self {
            client,
            token,
            catalog,
            identity_url,
            interface: "public".to_string(),
            workflow_url: None,
        })
    }

    /// Uses the given workflow endpoint instead of the catalog's.
    #[must_use]
    pub fn with_workflow_endpoint(mut self, url: impl Into<String>) -> Self {
        self.workflow_url = Some(url.into());
        self
    }

    /// Keystone v3 base URL.
    #[must_use]
    pub fn identity_url(&self) -> &str {
        &self.identity_url
    }

    /// Endpoint of a service type for the configured interface.
    ///
    /// # Errors
    ///
    /// Returns [`OpenStackError::ServiceNotInCatalog`] when absent.
    pub fn endpoint(&self, service_type: &str) -> Result<String> {
        if service_type == "workflowv2" {
            if let Some(url) = &self.workflow_url {
                return Ok(url.trim_end_matches('/').to_string());
            }
        }
        self.catalog
            .iter()
            .filter(|entry| entry.service_type == service_type)
            .flat_map(|entry| entry.endpoints.iter())
            .find(|endpoint| endpoint.interface == self.interface)
            .map(|endpoint| endpoint.url.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                OpenStackError::ServiceNotInCatalog {
                    service_type: service_type.to_string(),
                    interface: self.interface.clone(),
                }
                .into()
            })
    }

    /// Sends a request, retrying transient failures, and returns the body.
    pub(crate) async fn request(
        &self,
        method: Method,
        url: &str,
        body: Body,
        headers: &[(&'static str, &'static str)],
    ) -> Result<String> {
        with_retries(|| self.request_once(method.clone(), url, &body, headers)).await
    }

    /// Sends a single request.
    async fn request_once(
        &self,
        method: Method,
        url: &str,
        body: &Body,
        headers: &[(&'static str, &'static str)],
    ) -> Result<String> {
        trace!("{method} {url}");

        let mut builder = self
            .client
            .request(method.clone(), url)
            .header(AUTH_TOKEN, &self.token)
            .header(header::ACCEPT, "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder = match body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Text(text) => builder
                .header(header::CONTENT_TYPE, "text/plain")
                .body(text.clone()),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| OpenStackError::network(format!("Request failed: {e}")))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 | 403 => Err(OpenStackError::AuthenticationFailed {
                message: format!("{method} {url} was rejected with status {status}"),
            }
            .into()),
            404 => Err(OpenStackError::NotFound {
                resource: "Resource".to_string(),
                name: url.to_string(),
            }
            .into()),
            409 => Err(OpenStackError::Conflict { message: text }.into()),
            _ if !status.is_success() => {
                Err(OpenStackError::api_error(status.as_u16(), text).into())
            }
            _ => Ok(text),
        }
    }

    /// GET and decode a JSON document.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&'static str, &'static str)],
    ) -> Result<T> {
        let text = self.request(Method::GET, url, Body::Empty, headers).await?;
        parse(&text)
    }

    /// Sends a JSON body and decodes the JSON response.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Value,
    ) -> Result<T> {
        let text = self.request(method, url, Body::Json(body), &[]).await?;
        parse(&text)
    }
}

/// [`CloudConnector`] opening [`OpenStackClient`] sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenStackConnector;

#[async_trait]
impl CloudConnector for OpenStackConnector {
    async fn connect(
        &self,
        credentials: &Credentials,
        workflow_endpoint: Option<&str>,
    ) -> Result<Arc<dyn CloudApi>> {
        let mut client = OpenStackClient::connect(credentials).await?;
        if let Some(url) = workflow_endpoint.filter(|url| !url.is_empty()) {
            client = client.with_workflow_endpoint(url);
        }
        Ok(Arc::new(client))
    }
}

/// Keystone v3 base URL for an `auth_url` with or without a version suffix.
#[must_use]
pub fn identity_base(auth_url: &str) -> String {
    let trimmed = auth_url.trim_end_matches('/');
    if trimmed.ends_with("/v3") {
        trimmed.to_string()
    } else {
        let trimmed = trimmed.strip_suffix("/v2.0").unwrap_or(trimmed);
        format!("{trimmed}/v3")
    }
}

/// Appends a version segment unless the endpoint already carries it.
#[must_use]
pub fn versioned(url: &str, version: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    if trimmed.ends_with(&format!("/{version}")) {
        trimmed.to_string()
    } else {
        format!("{trimmed}/{version}")
    }
}

/// Adds query parameters to a URL.
///
/// # Errors
///
/// Returns [`OpenStackError::InvalidResponse`] if the URL does not parse.
pub fn with_query(url: &str, pairs: &[(&str, &str)]) -> Result<String> {
    let mut parsed = Url::parse(url)
        .map_err(|e| OpenStackError::invalid_response(format!("Invalid endpoint URL {url}: {e}")))?;
    {
        let mut query = parsed.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
    }
    Ok(parsed.to_string())
}

/// Decodes a JSON response body.
pub(crate) fn parse<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| {
        OpenStackError::invalid_response(format!("Failed to parse response: {e}")).into()
    })
}

/// Runs an operation up to [`MAX_RETRIES`] times while it fails with a
/// retryable error.
async fn with_retries<T, F, Fut>(mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            debug!("Retry attempt {attempt} of {MAX_RETRIES}");
            tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt))).await;
        }

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if e.is_retryable() {
                    last_error = Some(e);
                    continue;
                }
                return Err(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        UndercloudError::OpenStack(OpenStackError::NetworkError {
            message: String::from("Max retries exceeded"),
        })
    }))
}

async fn authenticate_once(
    client: &Client,
    identity_url: &str,
    credentials: &Credentials,
) -> Result<(String, Vec<CatalogEntry>)> {
    let body = json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": {
                    "user": {
                        "name": credentials.username,
                        "domain": {"name": "Default"},
                        "password": credentials.password,
                    }
                }
            },
            "scope": {
                "project": {
                    "name": credentials.project_name,
                    "domain": {"name": "Default"},
                }
            }
        }
    });

    let response = client
        .post(format!("{identity_url}/auth/tokens"))
        .json(&body)
        .send()
        .await
        .map_err(|e| OpenStackError::network(format!("Request failed: {e}")))?;
    let status = response.status();

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(OpenStackError::AuthenticationFailed {
            message: format!("Keystone rejected credentials for {}", credentials.username),
        }
        .into());
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(OpenStackError::api_error(status.as_u16(), body).into());
    }

    let token = response
        .headers()
        .get(SUBJECT_TOKEN)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| OpenStackError::invalid_response("No X-Subject-Token in response"))?;
    let text = response.text().await.unwrap_or_default();
    let parsed: TokenResponse = parse(&text)?;
    Ok((token, parsed.token.catalog))
}
