// Configuration management module
// TOML settings file plus environment overrides

pub mod settings;


pub use settings::{
    AuthConfig, Config, ConfigError, CorpusConfig, DatabaseConfig, EmbeddingConfig,
    GenerationConfig, IndexBackendKind, IndexConfig, MailConfig, OllamaConfig, ServerConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
