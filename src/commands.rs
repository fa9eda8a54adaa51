use anyhow::Context;
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, get_config_dir};
use crate::generation::StdoutSink;
use crate::qa::{PipelineBuilder, QaEngine};
use crate::{Result, server};

/// Resolve the configuration directory: explicit flag, then the platform default
#[inline]
pub fn resolve_config_dir(config_dir: Option<PathBuf>) -> Result<PathBuf> {
    match config_dir {
        Some(dir) => Ok(dir),
        None => Ok(get_config_dir()?),
    }
}

/// Start the HTTP API
#[inline]
pub async fn serve(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    info!(
        "Starting Smart Lawyer API on {}:{}",
        config.server.host, config.server.port
    );
    server::serve(&config).await?;
    Ok(())
}

/// Build the QA engine and answer a single question, streaming to stdout
#[inline]
pub async fn ask(config_dir: &Path, query: &str) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!(
        "{} {}",
        style("Indexing").bold().cyan(),
        style(config.corpus.path.display()).dim()
    );

    let builder = PipelineBuilder::from_config(&config)?.with_sink(Arc::new(StdoutSink));
    let engine = QaEngine::new();
    engine.init(builder).await?;

    let answer = engine.run(query).await?;
    if !answer.is_available() {
        eprintln!(
            "{}",
            style("No answer could be produced for this question. See the log for details.")
                .red()
        );
    }

    Ok(())
}

/// Print the effective configuration with secrets redacted
#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Server:").bold().yellow());
    eprintln!("  Listen: {}:{}", style(&config.server.host).cyan(), style(config.server.port).cyan());
    eprintln!("  Public URL: {}", style(&config.server.public_url).cyan());

    eprintln!("{}", style("Corpus:").bold().yellow());
    eprintln!("  Path: {}", style(config.corpus.path.display()).cyan());
    eprintln!(
        "  Chunks: {} chars, {} overlap",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );

    eprintln!("{}", style("Ollama:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!(
        "  Embedding model: {} ({} dimensions)",
        style(&config.embedding.model).cyan(),
        style(config.embedding.dimension).cyan()
    );
    eprintln!(
        "  Language model: {} (context {}, max tokens {})",
        style(&config.generation.model).cyan(),
        style(config.generation.context_window).cyan(),
        style(config.generation.max_tokens).cyan()
    );

    eprintln!("{}", style("Index:").bold().yellow());
    eprintln!(
        "  Backend: {:?}, namespace {}, top {}",
        config.index.backend,
        style(&config.index.namespace).cyan(),
        style(config.index.top_k).cyan()
    );

    eprintln!("{}", style("Accounts:").bold().yellow());
    eprintln!(
        "  Database: {}",
        style(config.database_path().display()).cyan()
    );
    eprintln!(
        "  JWT secret: {}",
        redact(config.auth.jwt_secret.as_deref())
    );
    match &config.mail {
        Some(mail) => eprintln!(
            "  Mail: {}:{} as {} (password {})",
            style(&mail.server).cyan(),
            style(mail.port).cyan(),
            style(&mail.from).cyan(),
            redact(Some(mail.password.as_str()))
        ),
        None => eprintln!("  Mail: {}", style("not configured, links are logged").dim()),
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn redact(secret: Option<&str>) -> String {
    match secret {
        Some(value) if !value.is_empty() => style("********").green().to_string(),
        _ => style("not set").red().to_string(),
    }
}
