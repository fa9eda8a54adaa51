// Ollama HTTP client
// Shared transport for the embedding and generation models

pub mod embed;
pub mod generate;


use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::OllamaConfig;

pub use embed::OllamaEmbedder;
pub use generate::{GenerateOptions, OllamaGenerator};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    #[serde(default)]
    status: String,
    error: Option<String>,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            agent: build_agent(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(Some(timeout));
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Test the connection and make sure every model in `models` is present,
    /// pulling the missing ones when `pull_missing` is set
    #[inline]
    pub fn health_check(&self, models: &[&str], pull_missing: bool) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        self.ping().context("Server ping failed")?;

        for model in models {
            self.ensure_model(model, pull_missing)
                .with_context(|| format!("Model {} is not usable", model))?;
        }

        info!(
            "Health check passed for Ollama server at {} with models {:?}",
            self.base_url, models
        );
        Ok(())
    }

    /// Ping the Ollama server to check if it's responsive
    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self.endpoint("/api/tags")?;

        debug!("Pinging Ollama server at {}", url);

        self.make_request_with_retry(|| {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Failed to ping Ollama server")?;

        debug!("Server ping successful");
        Ok(())
    }

    /// List all available models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint("/api/tags")?;

        debug!("Fetching available models from {}", url);

        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .get(url.as_str())
                    .call()
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to fetch models")?;

        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Whether the server already has `model`. An untagged name matches its `latest` tag.
    #[inline]
    pub fn has_model(&self, model: &str) -> Result<bool> {
        let models = self.list_models().context("Failed to list models")?;
        Ok(models.iter().any(|m| model_matches(&m.name, model)))
    }

    /// Make sure `model` is available, downloading it if allowed
    #[inline]
    pub fn ensure_model(&self, model: &str, pull_missing: bool) -> Result<()> {
        debug!("Validating model: {}", model);

        if self.has_model(model)? {
            debug!("Model {} is available", model);
            return Ok(());
        }

        if !pull_missing {
            warn!("Model {} not found and pulling is disabled", model);
            return Err(anyhow::anyhow!(
                "Model '{}' is not available on {}",
                model,
                self.base_url
            ));
        }

        self.pull_model(model)
    }

    /// Download a model through `/api/pull`. Blocks until the pull finishes.
    #[inline]
    pub fn pull_model(&self, model: &str) -> Result<()> {
        let url = self.endpoint("/api/pull")?;
        let request_json = serde_json::to_string(&PullRequest {
            model,
            stream: false,
        })
        .context("Failed to serialize pull request")?;

        info!("Pulling model {} from {}", model, self.base_url);

        // Downloads can take far longer than a normal API call
        let agent = build_agent(None);
        let response_text = self
            .make_request_with_retry(|| {
                agent
                    .post(url.as_str())
                    .header("Content-Type", "application/json")
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .with_context(|| format!("Failed to pull model {}", model))?;

        let pull: PullResponse =
            serde_json::from_str(&response_text).context("Failed to parse pull response")?;

        if let Some(message) = pull.error {
            return Err(anyhow::anyhow!("Pulling {} failed: {}", model, message));
        }
        if pull.status != "success" {
            return Err(anyhow::anyhow!(
                "Pulling {} ended with status {:?}",
                model,
                pull.status
            ));
        }

        info!("Model {} pulled", model);
        Ok(())
    }

    /// POST a JSON body and decode the JSON reply
    pub(crate) fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize,
        T: serde::de::DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let request_json = serde_json::to_string(body)
            .with_context(|| format!("Failed to serialize request for {}", path))?;

        let response_text = self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        serde_json::from_str(&response_text)
            .with_context(|| format!("Failed to parse response from {}", path))
    }

    pub(crate) fn agent(&self) -> &ureq::Agent {
        &self.agent
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Failed to build URL for {}", path))
    }

    /// Run `request_fn` until it succeeds, retrying server and transport errors
    /// with exponential backoff. Client errors fail immediately.
    pub(crate) fn make_request_with_retry<T, F>(&self, mut request_fn: F) -> Result<T>
    where
        F: FnMut() -> Result<T, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow::anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        let delay = Duration::from_millis(delay_ms);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

fn build_agent(timeout: Option<Duration>) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(timeout)
        .build()
        .into()
}

fn model_matches(available: &str, wanted: &str) -> bool {
    available == wanted || (!wanted.contains(':') && available == format!("{}:latest", wanted))
}
