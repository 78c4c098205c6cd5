use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use folio_core::QuerySeq;
use folio_logging::{folio_debug, folio_warn};

use crate::types::{map_reqwest_error, EngineEvent, EventSink, FailureKind, FetchError};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/ask_stream";

#[derive(Debug, Clone)]
pub struct AnswerSettings {
    pub endpoint: String,
    /// Only connecting is bounded; an answer may stream for as long as it likes.
    pub connect_timeout: Duration,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Body of one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRequest {
    pub doc_id: String,
    pub question: String,
}

#[async_trait::async_trait]
pub trait AnswerClient: Send + Sync {
    /// Streams the response body to `sink` as `AnswerChunk` events and
    /// returns the byte count. Resolves with `FailureKind::Cancelled` as soon
    /// as `cancel` fires.
    async fn ask(
        &self,
        seq: QuerySeq,
        request: &AnswerRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<u64, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestAnswerClient {
    settings: AnswerSettings,
}

impl ReqwestAnswerClient {
    pub fn new(settings: AnswerSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self) -> Result<reqwest::Client, FetchError> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }
}

#[async_trait::async_trait]
impl AnswerClient for ReqwestAnswerClient {
    async fn ask(
        &self,
        seq: QuerySeq,
        request: &AnswerRequest,
        sink: &dyn EventSink,
        cancel: &CancellationToken,
    ) -> Result<u64, FetchError> {
        let endpoint = reqwest::Url::parse(&self.settings.endpoint)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let body = serde_json::to_vec(request)
            .map_err(|err| FetchError::new(FailureKind::ProcessingError, err.to_string()))?;
        let client = self.build_client()?;

        let pending = client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/x-ndjson")
            .body(body)
            .send();
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::cancelled()),
            response = pending => response.map_err(map_reqwest_error)?,
        };

        let status = response.status();
        if !status.is_success() {
            folio_warn!("answer request {} rejected: {}", seq, status);
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let mut received = 0_u64;
        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::cancelled()),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    received += chunk.len() as u64;
                    sink.emit(EngineEvent::AnswerChunk { seq, chunk });
                }
                Some(Err(err)) => return Err(map_reqwest_error(err)),
                None => break,
            }
        }
        folio_debug!("answer stream {} ended after {} bytes", seq, received);
        Ok(received)
    }
}
