//! Ollama `/api/generate` client.
//!
//! The backend answers with newline-delimited JSON: one object per line, each
//! optionally carrying a `response` fragment, the last one flagged `done`.
//! Fragments are concatenated in arrival order and the trimmed result is the reply.

use crate::providers::traits::Provider;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

const GENERATE_PATH: &str = "/api/generate";

/// Failures talking to the generation backend. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("response stream from {url} broke off")]
    Stream {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One line of the streamed generate response. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct GenerateChunk {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub done: bool,
}

/// `"done": null` reads as not done.
fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// Line-oriented decoder for newline-delimited JSON bodies.
///
/// Bytes are fed in as they arrive; complete lines are parsed and returned,
/// an unterminated tail is held back until more bytes (or [`finish`]) arrive.
/// Lines that are blank or fail to parse are dropped.
///
/// [`finish`]: NdjsonDecoder::finish
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buf: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes; returns the chunks from every line completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<GenerateChunk> {
        self.buf.extend_from_slice(bytes);

        let Some(last_newline) = self.buf.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.buf.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buf, rest);
        let mut chunks = Vec::new();
        for line in complete.split(|b| *b == b'\n') {
            chunks.extend(parse_line(line));
        }
        chunks
    }

    /// Flush the unterminated tail, if any, at end of stream.
    pub fn finish(&mut self) -> Option<GenerateChunk> {
        let tail = std::mem::take(&mut self.buf);
        parse_line(&tail)
    }
}

fn parse_line(line: &[u8]) -> Option<GenerateChunk> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<GenerateChunk>(line) {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            tracing::trace!(error = %e, "Skipping malformed generate line");
            None
        }
    }
}

/// Concatenates `response` fragments until a `done` chunk is seen.
#[derive(Debug, Default)]
struct ReplyAccumulator {
    text: String,
    done: bool,
}

impl ReplyAccumulator {
    /// Absorb chunks in order. Chunks after the first `done` are ignored.
    fn extend(&mut self, chunks: impl IntoIterator<Item = GenerateChunk>) {
        for chunk in chunks {
            if self.done {
                return;
            }
            if let Some(fragment) = chunk.response {
                self.text.push_str(&fragment);
            }
            self.done = chunk.done;
        }
    }

    fn into_reply(self) -> String {
        self.text.trim().to_string()
    }
}

/// Provider for a local Ollama server.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self::with_timeouts(base_url, model, Duration::from_secs(10), Duration::from_secs(300))
    }

    pub fn with_timeouts(
        base_url: &str,
        model: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: Client::builder()
                .timeout(request_timeout)
                .connect_timeout(connect_timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn generate_url(&self) -> String {
        if self.base_url.ends_with(GENERATE_PATH) {
            self.base_url.clone()
        } else {
            format!("{}{GENERATE_PATH}", self.base_url)
        }
    }

    async fn stream_generate(&self, prompt: &str) -> Result<String, InferenceError> {
        let url = self.generate_url();
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|source| InferenceError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            return Err(InferenceError::Status {
                url,
                status,
                body: super::truncate_error_body(&body),
            });
        }

        let mut decoder = NdjsonDecoder::new();
        let mut reply = ReplyAccumulator::default();
        let mut byte_stream = response.bytes_stream();

        while let Some(chunk_result) = byte_stream.next().await {
            let bytes = chunk_result.map_err(|source| InferenceError::Stream {
                url: url.clone(),
                source,
            })?;
            reply.extend(decoder.push(&bytes));
            if reply.done {
                break;
            }
        }

        if !reply.done {
            reply.extend(decoder.finish());
        }

        Ok(reply.into_reply())
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let reply = self.stream_generate(prompt).await?;
        tracing::debug!(model = %self.model, chars = reply.len(), "Generation finished");
        Ok(reply)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
