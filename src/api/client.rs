use super::logging::{debug_payload_enabled, emit_debug_payload};
use crate::config::Config;
use crate::error::{RequestError, StreamError};
use crate::util::{endpoint_url, is_local_endpoint_url};
use anyhow::Result;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
#[cfg(test)]
use std::sync::Arc;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

const ASK_PATH: &str = "ask";
const STREAM_ASK_PATH: &str = "ask/stream";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AskResponse {
    #[serde(default)]
    pub answer: Option<String>,
}

#[cfg(test)]
pub trait MockStreamProducer: Send + Sync {
    fn create_mock_stream(&self, question: &str) -> Result<ByteStream, RequestError>;

    fn create_mock_answer(&self, question: &str) -> Result<AskResponse, RequestError>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    ask_url: String,
    stream_url: String,
    #[cfg(test)]
    mock_stream_producer: Option<Arc<dyn MockStreamProducer>>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            ask_url: endpoint_url(&config.api_url, ASK_PATH),
            stream_url: endpoint_url(&config.api_url, STREAM_ASK_PATH),
            #[cfg(test)]
            mock_stream_producer: None,
        })
    }

    #[cfg(test)]
    pub fn new_mock(mock_producer: Arc<dyn MockStreamProducer>) -> Self {
        Self {
            http: reqwest::Client::new(),
            ask_url: "http://localhost:8000/ask".to_string(),
            stream_url: "http://localhost:8000/ask/stream".to_string(),
            mock_stream_producer: Some(mock_producer),
        }
    }

    pub fn ask_url(&self) -> &str {
        &self.ask_url
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    /// Whole-response request: one JSON answer for one question.
    pub async fn ask(&self, question: &str) -> Result<AskResponse, RequestError> {
        #[cfg(test)]
        {
            if let Some(producer) = &self.mock_stream_producer {
                return producer.create_mock_answer(question);
            }
        }

        let response = self.post(&self.ask_url, question).await?;
        response
            .json::<AskResponse>()
            .await
            .map_err(|error| RequestError::InvalidBody(error.to_string()))
    }

    /// Streaming request. The returned body is raw answer text with no framing.
    pub async fn open_stream(&self, question: &str) -> Result<ByteStream, RequestError> {
        #[cfg(test)]
        {
            if let Some(producer) = &self.mock_stream_producer {
                return producer.create_mock_stream(question);
            }
        }

        let response = self.post(&self.stream_url, question).await?;
        let stream = response
            .bytes_stream()
            .map(|item| item.map_err(|error| StreamError::Read(error.to_string())));
        Ok(Box::pin(stream))
    }

    async fn post(&self, url: &str, question: &str) -> Result<reqwest::Response, RequestError> {
        let payload = AskRequest {
            question: question.to_string(),
        };
        if debug_payload_enabled() {
            emit_debug_payload(url, &payload);
        }

        let response = self
            .http
            .post(url)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|error| map_api_request_error(error, url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RequestError::Status {
                status,
                body: body.trim().to_string(),
            });
        }
        Ok(response)
    }
}

fn map_api_request_error(error: reqwest::Error, request_url: &str) -> RequestError {
    if error.is_connect() && is_local_endpoint_url(request_url) {
        return RequestError::Connect {
            url: request_url.to_string(),
            message: format!("{error}. Start the local answer service or update ASK_API_URL."),
        };
    }
    if error.is_connect() {
        return RequestError::Connect {
            url: request_url.to_string(),
            message: error.to_string(),
        };
    }
    if error.is_timeout() {
        return RequestError::Timeout {
            url: request_url.to_string(),
            message: error.to_string(),
        };
    }
    RequestError::Other {
        url: request_url.to_string(),
        message: error.to_string(),
    }
}
