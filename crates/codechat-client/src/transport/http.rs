use futures::StreamExt as _;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{
    AnalyzeResponse, AskAnswer, AskRequest, DeleteResponse, RepositoryRequest, error_detail,
};
use crate::errors::{ChatError, StreamFailure};
use crate::model::RepositoryId;

use super::config::ClientConfig;
use super::{AskBody, AskTransport, BodyShape, ByteStream};

/// reqwest-backed client for the analysis service.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Creates a transport from explicit client configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ChatError> {
        config.validate()?;
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a transport using `CODECHAT_API_URL`.
    pub fn from_env() -> Result<Self, ChatError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Asks the service to (re)index a repository. Fire-and-forget: the
    /// response only acknowledges that ingestion was queued.
    pub async fn analyze(
        &self,
        repo_id: impl Into<RepositoryId>,
    ) -> Result<AnalyzeResponse, ChatError> {
        let body = RepositoryRequest {
            repo_id: repo_id.into(),
        };
        debug!(repo_id = %body.repo_id, "requesting repository analysis");
        let request = self.client.post(self.config.url("/analyze")).json(&body);
        Ok(self.send_json(request).await?)
    }

    /// Deletes a repository and its indexed data on the service.
    pub async fn delete(
        &self,
        repo_id: impl Into<RepositoryId>,
    ) -> Result<DeleteResponse, ChatError> {
        let body = RepositoryRequest {
            repo_id: repo_id.into(),
        };
        debug!(repo_id = %body.repo_id, "requesting repository deletion");
        let request = self.client.delete(self.config.url("/delete")).json(&body);
        Ok(self.send_json(request).await?)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        mut request: reqwest::RequestBuilder,
    ) -> Result<T, StreamFailure> {
        if let Some(timeout) = self.config.timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|e| StreamFailure::transport(format!("request failed: {e}")))?;
        let response = ensure_success(response).await?;
        let text = response
            .text()
            .await
            .map_err(|e| StreamFailure::transport(format!("failed to read response: {e}")))?;
        serde_json::from_str(&text)
            .map_err(|e| StreamFailure::transport(format!("unexpected response body: {e}")))
    }
}

#[async_trait::async_trait]
impl AskTransport for HttpTransport {
    async fn ask(&self, request: AskRequest) -> Result<AskBody, StreamFailure> {
        debug!(repo_id = %request.repo_id, "sending question");
        let response = self
            .client
            .post(self.config.url("/ask"))
            .json(&request)
            .send()
            .await
            .map_err(|e| StreamFailure::transport(format!("ask request failed: {e}")))?;
        let response = ensure_success(response).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let shape = BodyShape::sniff(content_type.as_deref());
        debug!(content_type = ?content_type, shape = ?shape, "ask response accepted");

        match shape {
            BodyShape::EventStream => {
                let bytes: ByteStream = Box::pin(response.bytes_stream().map(|chunk| {
                    chunk.map_err(|e| StreamFailure::transport(format!("answer stream read failed: {e}")))
                }));
                Ok(AskBody::EventStream(bytes))
            }
            BodyShape::SingleAnswer => {
                let text = response
                    .text()
                    .await
                    .map_err(|e| StreamFailure::transport(format!("failed to read answer: {e}")))?;
                let answer: AskAnswer = serde_json::from_str(&text)
                    .map_err(|e| StreamFailure::transport(format!("unexpected answer body: {e}")))?;
                Ok(AskBody::SingleAnswer(answer))
            }
        }
    }
}

/// Turns a non-success response into a server failure carrying `detail`
/// when the body has one, else the status reason.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StreamFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_detail(&body).unwrap_or_else(|| {
        format!(
            "request failed with status {}",
            status.canonical_reason().unwrap_or(status.as_str())
        )
    });
    Err(StreamFailure::server(Some(status.as_u16()), message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_invalid_base_url() {
        let result = HttpTransport::new(ClientConfig::new("localhost:8000"));
        assert!(matches!(result, Err(ChatError::Config(msg)) if msg.contains("http://")));
    }

    #[test]
    fn new_keeps_config() {
        let transport = HttpTransport::new(ClientConfig::new("http://127.0.0.1:9"))
            .expect("transport");
        assert_eq!(transport.config().url("ask"), "http://127.0.0.1:9/ask");
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_failure() {
        // Port 9 (discard) is not expected to be listening on loopback.
        let transport = HttpTransport::new(ClientConfig::new("http://127.0.0.1:9"))
            .expect("transport");
        let result = transport.ask(AskRequest::new("r", "q")).await;
        assert!(matches!(result, Err(StreamFailure::Transport { .. })));
    }
}
