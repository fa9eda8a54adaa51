use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};
use std::time::Duration;
use tracing::debug;

use super::OllamaClient;
use crate::config::GenerationConfig;
use crate::generation::{GenerationError, LanguageModel, TokenSink};

/// Sampling and runtime options forwarded to `/api/generate`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerateOptions {
    pub num_ctx: u32,
    pub num_predict: u32,
    pub num_batch: u32,
    pub num_gpu: u32,
    pub temperature: f32,
}

impl From<&GenerationConfig> for GenerateOptions {
    #[inline]
    fn from(config: &GenerationConfig) -> Self {
        Self {
            num_ctx: config.context_window,
            num_predict: config.max_tokens,
            num_batch: config.batch_size,
            num_gpu: config.gpu_layers,
            temperature: config.temperature,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerateOptions,
}

/// One line of the NDJSON stream
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

/// Chat model served by Ollama, streamed token by token
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: OllamaClient,
    model: String,
    options: GenerateOptions,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(client: OllamaClient, config: &GenerationConfig) -> Self {
        Self {
            client: client.with_timeout(Duration::from_secs(config.timeout_secs)),
            model: config.model.clone(),
            options: GenerateOptions::from(config),
        }
    }

    #[inline]
    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }
}

impl LanguageModel for OllamaGenerator {
    #[inline]
    fn model_id(&self) -> &str {
        &self.model
    }

    #[inline]
    fn complete(&self, prompt: &str, sink: Option<&dyn TokenSink>) -> Result<String, GenerationError> {
        let url = self
            .client
            .endpoint("/api/generate")
            .map_err(|e| GenerationError::Model(format!("{:#}", e)))?;

        let request_json = serde_json::to_string(&GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
            options: &self.options,
        })
        .map_err(|e| GenerationError::Model(e.to_string()))?;

        debug!(
            "Requesting completion from {} ({} prompt chars)",
            self.model,
            prompt.len()
        );

        // Only establishing the stream is retried; tokens already handed to the
        // sink cannot be taken back
        let response = self
            .client
            .make_request_with_retry(|| {
                self.client
                    .agent()
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&request_json)
            })
            .map_err(|e| GenerationError::Model(format!("{:#}", e)))?;

        read_stream(response.into_body().into_reader(), sink)
    }
}

/// Collect a streamed completion, forwarding each fragment to `sink`
pub(crate) fn read_stream<R: Read>(
    reader: R,
    sink: Option<&dyn TokenSink>,
) -> Result<String, GenerationError> {
    let mut text = String::new();

    for line in BufReader::new(reader).lines() {
        let line = line.map_err(|e| GenerationError::Model(format!("Stream read failed: {}", e)))?;
        if line.trim().is_empty() {
            continue;
        }

        let chunk: GenerateChunk = serde_json::from_str(&line)
            .map_err(|e| GenerationError::Malformed(format!("{}: {:?}", e, line)))?;

        if let Some(message) = chunk.error {
            return Err(GenerationError::Malformed(message));
        }

        if !chunk.response.is_empty() {
            if let Some(sink) = sink {
                sink.on_token(&chunk.response);
            }
            text.push_str(&chunk.response);
        }

        if chunk.done {
            if let Some(sink) = sink {
                sink.on_complete();
            }
            debug!("Completion finished ({} chars)", text.len());
            return Ok(text);
        }
    }

    Err(GenerationError::Malformed(
        "stream ended before the model reported completion".to_string(),
    ))
}
