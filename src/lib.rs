use thiserror::Error;

pub type Result<T> = std::result::Result<T, LawyerError>;

#[derive(Error, Debug)]
pub enum LawyerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Question answering error: {0}")]
    Qa(#[from] qa::QaError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub mod auth;
pub mod commands;
pub mod config;
pub mod database;
pub mod documents;
pub mod embeddings;
pub mod generation;
pub mod index;
pub mod ollama;
pub mod qa;
pub mod server;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_errors_keep_their_kind() {
        let config = LawyerError::from(config::ConfigError::DirectoryError);
        assert!(matches!(config, LawyerError::Config(_)));
        assert_eq!(
            config.to_string(),
            "Configuration error: Configuration directory not found or could not be created"
        );

        let qa = LawyerError::from(qa::QaError::NotReady);
        assert!(matches!(qa, LawyerError::Qa(qa::QaError::NotReady)));

        let other = LawyerError::from(anyhow::anyhow!("listener closed"));
        assert_eq!(other.to_string(), "listener closed");
    }
}
