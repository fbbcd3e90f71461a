//! HTTP client for the Vertex AI publisher-model endpoints.

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{ServerConfig, VertexConfig};
use crate::vertex::auth::{bearer, TokenSource};
use crate::vertex::types::{
    EmbeddingInstance, EmbeddingParameters, EmbeddingValues, GenerateContentRequest,
    GenerateContentResponse, PredictRequest, PredictResponse,
};
use crate::vertex::{GenerativeBackend, ResponseStream, VertexError};

/// Client for `{base}/v1/projects/{project}/locations/{location}/publishers/google/models/*`.
pub struct VertexClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    location: String,
    tokens: TokenSource,
}

impl VertexClient {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        project_id: String,
        location: String,
        tokens: TokenSource,
    ) -> Self {
        Self {
            http,
            base_url,
            project_id,
            location,
            tokens,
        }
    }

    /// Build a client from configuration.
    pub fn from_config(vertex: &VertexConfig, server: &ServerConfig) -> Result<Self, VertexError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(server.request_timeout_secs))
            .build()?;

        Ok(Self::new(
            http,
            vertex.endpoint(),
            vertex.project_id.clone(),
            vertex.location.clone(),
            TokenSource::from_config(vertex)?,
        ))
    }

    /// URL of a model method, e.g. `generateContent`.
    pub fn model_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{model}:{method}",
            self.base_url, self.project_id, self.location
        )
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        accept_sse: bool,
    ) -> Result<Response, VertexError> {
        let token = self.tokens.token().await?;

        let mut request = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, bearer(&token))
            .json(body);
        if accept_sse {
            request = request.header(reqwest::header::ACCEPT, "text/event-stream");
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {e}>"));
            warn!(url = %url, status = status.as_u16(), "Vertex AI request failed");
            return Err(VertexError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, VertexError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.post(url, body, false).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl GenerativeBackend for VertexClient {
    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, VertexError> {
        let url = self.model_url(model, "generateContent");
        debug!(url = %url, contents = request.contents.len(), "generateContent");
        self.post_json(&url, request).await
    }

    async fn stream_generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<ResponseStream, VertexError> {
        let url = format!("{}?alt=sse", self.model_url(model, "streamGenerateContent"));
        debug!(url = %url, contents = request.contents.len(), "streamGenerateContent");

        let response = self.post(&url, request, true).await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => {
                        let data = event.data.trim();
                        if data.is_empty() || data == "[DONE]" {
                            return None;
                        }
                        Some(
                            serde_json::from_str::<GenerateContentResponse>(data)
                                .map_err(VertexError::from),
                        )
                    }
                    Err(e) => Some(Err(VertexError::Stream(e.to_string()))),
                }
            });

        Ok(stream.boxed())
    }

    async fn embed(
        &self,
        model: &str,
        texts: &[String],
        dimensions: Option<u32>,
    ) -> Result<Vec<EmbeddingValues>, VertexError> {
        let url = self.model_url(model, "predict");
        let body = PredictRequest {
            instances: texts
                .iter()
                .map(|t| EmbeddingInstance { content: t.clone() })
                .collect(),
            parameters: dimensions.map(|d| EmbeddingParameters {
                output_dimensionality: d,
            }),
        };

        debug!(url = %url, inputs = texts.len(), "predict");
        let response: PredictResponse = self.post_json(&url, &body).await?;

        if response.predictions.len() != texts.len() {
            return Err(VertexError::Unexpected(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.predictions.len()
            )));
        }

        Ok(response
            .predictions
            .into_iter()
            .map(|p| p.embeddings)
            .collect())
    }
}
