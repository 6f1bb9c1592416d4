//! HTTP client for the agent backend.
//!
//! Wraps the three endpoints the console uses: the streaming query, the
//! one-shot query and the health check.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt as _, TryStreamExt as _};
use optimus_core::ModelOption;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Result, StreamError};
use crate::session::{AgentTransport, ByteStream};

/// Body of a query request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentQueryRequest {
    /// The operator's question.
    pub query: String,
    /// Provider of the model to answer with (e.g., "openai").
    pub model_provider: String,
    /// Model name understood by the provider.
    pub model_name: String,
}

impl AgentQueryRequest {
    /// Build a request, rejecting queries that are empty after trimming.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::EmptyQuery` if `query` is blank.
    pub fn new(query: &str, model: &ModelOption) -> Result<Self> {
        let query = query.trim();
        if query.is_empty() {
            return Err(StreamError::EmptyQuery);
        }
        Ok(Self {
            query: query.to_string(),
            model_provider: model.provider.as_str().to_string(),
            model_name: model.model_name.to_string(),
        })
    }
}

/// Response of the one-shot query endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentQueryResponse {
    /// The agent's final answer.
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// Client for the agent REST API.
#[derive(Debug, Clone)]
pub struct AgentClient {
    client: Client,
    base_url: String,
}

impl AgentClient {
    /// Create a new agent client.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Config` if the API base is not an http(s) URL,
    /// or `StreamError::Http` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = config.base_url().to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(StreamError::Config(format!(
                "api base must be an http(s) URL, got {base_url:?}"
            )));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Turn a non-success response into a `Status` error carrying its body text.
    async fn handle_error(response: Response) -> StreamError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        warn!(status, "agent backend returned an error");
        StreamError::status(status, &body)
    }

    /// Start a streamed query and return the raw response body.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Status` for a non-success response,
    /// `StreamError::MissingBody` if the response declares an empty body, or
    /// `StreamError::Http` if the connection fails.
    pub async fn stream(&self, request: &AgentQueryRequest) -> Result<ByteStream> {
        let url = format!("{}/agent/stream", self.base_url);
        debug!(url = %url, model = %request.model_name, "opening agent stream");

        let response = self
            .client
            .post(&url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }
        if response.content_length() == Some(0) {
            return Err(StreamError::MissingBody);
        }

        Ok(response.bytes_stream().map_err(StreamError::from).boxed())
    }

    /// Run a query without streaming and return the final answer.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Status` for a non-success response,
    /// `StreamError::Parse` if the body is not a query response, or
    /// `StreamError::Http` if the connection fails.
    pub async fn query(&self, request: &AgentQueryRequest) -> Result<AgentQueryResponse> {
        let url = format!("{}/agent/query", self.base_url);

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| StreamError::Parse(e.to_string()))
    }

    /// Check the backend. Any failure counts as unreachable.
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);

        let response = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = response.status().as_u16(), "health check failed");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "health check failed");
                return false;
            }
        };

        match response.json::<HealthResponse>().await {
            Ok(body) => body.status == "ok",
            Err(e) => {
                warn!(error = %e, "health check returned an unexpected body");
                false
            }
        }
    }
}

#[async_trait]
impl AgentTransport for AgentClient {
    async fn open_stream(&self, request: &AgentQueryRequest) -> Result<ByteStream> {
        self.stream(request).await
    }
}

/// Transport that runs queries without streaming.
///
/// The answer is replayed to the session as a single `final_answer` record, so
/// the rest of the pipeline is unchanged.
#[derive(Debug, Clone)]
pub struct OneShotTransport {
    client: AgentClient,
}

impl OneShotTransport {
    /// Wrap a client.
    #[must_use]
    pub const fn new(client: AgentClient) -> Self {
        Self { client }
    }
}

/// Encode an answer as one complete `final_answer` record.
///
/// # Errors
///
/// Returns `StreamError::Parse` if the record cannot be serialized.
pub fn final_answer_record(content: &str) -> Result<Bytes> {
    let payload = serde_json::to_string(&crate::event::AgentEvent::FinalAnswer {
        content: content.to_string(),
    })
    .map_err(|e| StreamError::Parse(e.to_string()))?;
    Ok(Bytes::from(format!("data: {payload}\n\n")))
}

#[async_trait]
impl AgentTransport for OneShotTransport {
    async fn open_stream(&self, request: &AgentQueryRequest) -> Result<ByteStream> {
        let response = self.client.query(request).await?;
        let record = final_answer_record(&response.message)?;
        Ok(futures::stream::iter([Ok::<_, StreamError>(record)]).boxed())
    }
}
