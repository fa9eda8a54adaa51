//! Answer generation
//!
//! A [`LanguageModel`] turns a prompt into text. [`StuffGenerator`] builds the
//! prompt by concatenating every retrieved chunk into a single call and can
//! stream tokens to a [`TokenSink`] as they arrive.

pub mod prompt;

#[cfg(test)]
mod tests;

use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

pub use prompt::{QA_INSTRUCTION, RenderedPrompt, StuffPrompt};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Prompt needs ~{required} tokens but only {budget} are available")]
    ContextOverflow { required: usize, budget: usize },
    #[error("Language model failed: {0}")]
    Model(String),
    #[error("Malformed model output: {0}")]
    Malformed(String),
}

/// Observer for generated tokens
pub trait TokenSink: Send + Sync {
    fn on_token(&self, token: &str);

    #[inline]
    fn on_complete(&self) {}
}

/// Writes tokens to standard output as they arrive
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl TokenSink for StdoutSink {
    #[inline]
    fn on_token(&self, token: &str) {
        let mut stdout = std::io::stdout().lock();
        if write!(stdout, "{}", token).and_then(|()| stdout.flush()).is_err() {
            debug!("Failed to write token to stdout");
        }
    }

    #[inline]
    fn on_complete(&self) {
        println!();
    }
}

/// A generative text model. Must be safe to call from several threads.
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;

    /// Complete `prompt`, forwarding tokens to `sink` if one is given, and
    /// return the full text
    fn complete(&self, prompt: &str, sink: Option<&dyn TokenSink>) -> Result<String, GenerationError>;
}

/// Answers a question from retrieved context using a single stuffed prompt
#[derive(Clone)]
pub struct StuffGenerator {
    model: Arc<dyn LanguageModel>,
    prompt: StuffPrompt,
    sink: Option<Arc<dyn TokenSink>>,
}

impl std::fmt::Debug for StuffGenerator {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StuffGenerator")
            .field("model", &self.model.model_id())
            .field("prompt", &self.prompt)
            .field("streaming", &self.sink.is_some())
            .finish()
    }
}

impl StuffGenerator {
    #[inline]
    pub fn new(model: Arc<dyn LanguageModel>, prompt: StuffPrompt) -> Self {
        Self {
            model,
            prompt,
            sink: None,
        }
    }

    #[inline]
    pub fn with_sink(mut self, sink: Arc<dyn TokenSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[inline]
    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    #[inline]
    pub fn prompt(&self) -> &StuffPrompt {
        &self.prompt
    }

    /// Generate an answer to `question` grounded in `chunks`, given in retrieval order
    #[inline]
    pub fn generate(&self, question: &str, chunks: &[String]) -> Result<String, GenerationError> {
        let rendered = self.prompt.render(question, chunks)?;

        if rendered.chunks_dropped > 0 {
            warn!(
                "Dropped {} of {} context chunks to fit the {} token budget",
                rendered.chunks_dropped,
                chunks.len(),
                self.prompt.budget()
            );
        }

        self.model.complete(&rendered.text, self.sink.as_deref())
    }
}
