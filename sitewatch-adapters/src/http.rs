//! Live record source polling a JSON endpoint.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use sitewatch_adapters::http::HttpSource;
//! use sitewatch_engine::{NoopDispatcher, ScanSync};
//!
//! let source = HttpSource::builder()
//!     .endpoint("https://facility.example.com/api/scans/recent")
//!     .bearer_token("secret")
//!     .timeout(Duration::from_secs(8))
//!     .build()
//!     .expect("valid client");
//!
//! let sync = ScanSync::new(Arc::new(source), Arc::new(NoopDispatcher));
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sitewatch_engine::{FetchError, RecordSource};
use sitewatch_types::RawRecord;

use crate::wire::Payload;
use crate::AdapterError;

/// Fetches records with a `GET` on a JSON endpoint.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    endpoint: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpSource {
    /// Create a new builder for configuring the source.
    pub fn builder() -> HttpSourceBuilder {
        HttpSourceBuilder::default()
    }

    /// The polled endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch_payload(&self) -> Result<Payload, AdapterError> {
        let mut request = self.client.get(&self.endpoint);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AdapterError::Auth(format!(
                "API returned status {}",
                response.status()
            )));
        }

        if !response.status().is_success() {
            return Err(AdapterError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| AdapterError::Parse(e.to_string()))
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        let result = self.fetch_payload().await.and_then(Payload::into_records);
        result.map_err(|e| match e {
            AdapterError::Timeout => FetchError::Timeout(self.timeout),
            other => other.into(),
        })
    }

    fn description(&self) -> &str {
        &self.endpoint
    }
}

/// Builder for HttpSource.
#[derive(Debug, Default)]
pub struct HttpSourceBuilder {
    endpoint: Option<String>,
    token: Option<String>,
    timeout: Option<Duration>,
}

impl HttpSourceBuilder {
    /// Set the endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the request timeout (default: 10 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the source.
    pub fn build(self) -> Result<HttpSource, AdapterError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(10));
        let client = Client::builder().timeout(timeout).build()?;

        Ok(HttpSource {
            client,
            endpoint: self
                .endpoint
                .unwrap_or_else(|| "http://localhost:8080/api/records".to_string()),
            token: self.token,
            timeout,
        })
    }
}
