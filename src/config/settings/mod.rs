
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub mail: Option<MailConfig>,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used in activation links
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            public_url: "http://localhost:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorpusConfig {
    pub path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("assets/files/Constitution.pdf"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    /// Pull models that the server does not have yet instead of failing startup
    pub pull_missing_models: bool,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            pull_missing_models: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: u32,
    pub batch_size: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-minilm".to_string(),
            dimension: 384,
            batch_size: 16,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    /// Context window of the model in tokens; prompt plus answer must fit in it
    pub context_window: u32,
    pub max_tokens: u32,
    pub batch_size: u32,
    pub gpu_layers: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Number of generations allowed to run at the same time
    pub max_concurrent: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "llama2:7b-chat-q5_0".to_string(),
            context_window: 1024,
            max_tokens: 256,
            batch_size: 256,
            gpu_layers: 40,
            temperature: 0.8,
            timeout_secs: 300,
            max_concurrent: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackendKind {
    #[default]
    LanceDb,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    pub backend: IndexBackendKind,
    /// Table name inside the vector database
    pub namespace: String,
    pub top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackendKind::LanceDb,
            namespace: "llamaprac".to_string(),
            top_k: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub access_token_expire_minutes: u64,
    pub refresh_token_expire_days: u64,
    pub activation_token_expire_hours: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            access_token_expire_minutes: 60,
            refresh_token_expire_days: 7,
            activation_token_expire_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default = "default_starttls")]
    pub starttls: bool,
}

fn default_from_name() -> String {
    "Smart Lawyer".to_string()
}

const fn default_starttls() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid chunk size: {0} (must be between 50 and 8192)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    InvalidChunkOverlap(usize, usize),
    #[error("Max tokens ({0}) must be smaller than the context window ({1})")]
    InvalidContextWindow(u32, u32),
    #[error("Invalid top_k: {0} (must be at least 1)")]
    InvalidTopK(usize),
    #[error("Invalid concurrency limit: {0} (must be at least 1)")]
    InvalidConcurrency(u32),
    #[error("Invalid index namespace: {0:?}")]
    InvalidNamespace(String),
    #[error("Missing required setting: {0}")]
    MissingValue(&'static str),
    #[error("Invalid value for {key}: {value}")]
    InvalidEnvValue { key: &'static str, value: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Config {
    /// Load `config.toml` from `config_dir`, apply environment overrides and validate
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let mut config = Self::load_file(config_dir)?;
        config
            .apply_env_overrides(|key| std::env::var(key).ok())
            .context("Invalid environment override")?;
        config
            .validate()
            .context("Configuration validation failed")?;
        Ok(config)
    }

    /// Read `config.toml` without environment overrides or validation.
    /// A missing file yields the defaults.
    #[inline]
    pub fn load_file<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        Ok(config)
    }

    /// Default configuration directory for this user
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("smart-lawyer"))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Apply overrides from the environment. `lookup` returns the value of a variable.
    #[inline]
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("SMART_LAWYER_CORPUS") {
            self.corpus.path = PathBuf::from(path);
        }
        if let Some(host) = lookup("SMART_LAWYER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SMART_LAWYER_PORT") {
            self.server.port = parse_env("SMART_LAWYER_PORT", &port)?;
        }
        if let Some(host) = lookup("OLLAMA_HOST") {
            self.ollama.host = host;
        }
        if let Some(port) = lookup("OLLAMA_PORT") {
            self.ollama.port = parse_env("OLLAMA_PORT", &port)?;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(model) = lookup("GENERATION_MODEL") {
            self.generation.model = model;
        }
        if let Some(namespace) = lookup("INDEX_NAMESPACE") {
            self.index.namespace = namespace;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(minutes) = lookup("JWT_TOKEN_EXPIRE_MINUTES") {
            self.auth.access_token_expire_minutes = parse_env("JWT_TOKEN_EXPIRE_MINUTES", &minutes)?;
        }

        if let Some(server) = lookup("MAIL_SERVER") {
            let port = match lookup("MAIL_PORT") {
                Some(port) => parse_env("MAIL_PORT", &port)?,
                None => self.mail.as_ref().map_or(587, |mail| mail.port),
            };
            let existing = self.mail.take();
            let keep = |value: Option<String>, current: Option<&String>| {
                value.or_else(|| current.cloned()).unwrap_or_default()
            };
            self.mail = Some(MailConfig {
                server,
                port,
                username: keep(
                    lookup("MAIL_USERNAME"),
                    existing.as_ref().map(|m| &m.username),
                ),
                password: keep(
                    lookup("MAIL_PASSWORD"),
                    existing.as_ref().map(|m| &m.password),
                ),
                from: keep(lookup("MAIL_FROM"), existing.as_ref().map(|m| &m.from)),
                from_name: lookup("MAIL_FROM_NAME")
                    .or_else(|| existing.as_ref().map(|m| m.from_name.clone()))
                    .unwrap_or_else(default_from_name),
                starttls: existing.as_ref().is_none_or(|m| m.starttls),
            });
        }

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }
        Url::parse(&self.server.public_url)
            .map_err(|_| ConfigError::InvalidUrl(self.server.public_url.clone()))?;

        self.ollama.validate()?;
        self.embedding.validate()?;
        self.generation.validate()?;
        self.validate_chunking_config()?;

        if self.index.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.index.top_k));
        }
        if self.index.namespace.trim().is_empty()
            || !self
                .index
                .namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::InvalidNamespace(self.index.namespace.clone()));
        }

        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if !(50..=8192).contains(&config.chunk_size) {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::InvalidChunkOverlap(
                config.chunk_overlap,
                config.chunk_size,
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Get the path for the SQLite user database
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| self.get_base_dir().join("users.db"))
    }

    /// Get the path for the vector database directory
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvValue {
        key,
        value: value.to_string(),
    })
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        self.ollama_url()?;
        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(64..=4096).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        Ok(())
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if self.max_tokens >= self.context_window {
            return Err(ConfigError::InvalidContextWindow(
                self.max_tokens,
                self.context_window,
            ));
        }

        if self.max_concurrent == 0 {
            return Err(ConfigError::InvalidConcurrency(self.max_concurrent));
        }

        Ok(())
    }
}

impl AuthConfig {
    /// The signing secret; serving the API without one is a startup failure
    pub fn require_secret(&self) -> Result<&str, ConfigError> {
        self.jwt_secret
            .as_deref()
            .filter(|secret| !secret.trim().is_empty())
            .ok_or(ConfigError::MissingValue("auth.jwt_secret (JWT_SECRET)"))
    }
}
