use tracing::debug;

use super::GenerationError;
use crate::config::GenerationConfig;
use crate::embeddings::estimate_token_count;

/// Instruction that opens every question answering prompt
pub const QA_INSTRUCTION: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

const CONTEXT_SEPARATOR: &str = "\n\n";

/// A prompt ready to send, with a record of how much context made it in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub text: String,
    pub chunks_used: usize,
    pub chunks_dropped: usize,
    pub estimated_tokens: usize,
}

/// "Stuff" prompt builder with an explicit token budget.
///
/// The budget is the model context window minus the tokens reserved for the
/// answer. Context chunks are kept in retrieval order; those that do not fit
/// are dropped from the tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StuffPrompt {
    pub context_window: usize,
    pub max_tokens: usize,
}

impl From<&GenerationConfig> for StuffPrompt {
    #[inline]
    fn from(config: &GenerationConfig) -> Self {
        Self {
            context_window: config.context_window as usize,
            max_tokens: config.max_tokens as usize,
        }
    }
}

impl StuffPrompt {
    #[inline]
    pub fn new(context_window: usize, max_tokens: usize) -> Self {
        Self {
            context_window,
            max_tokens,
        }
    }

    /// Tokens available for the prompt itself
    #[inline]
    pub fn budget(&self) -> usize {
        self.context_window.saturating_sub(self.max_tokens)
    }

    #[inline]
    pub fn render(&self, question: &str, chunks: &[String]) -> Result<RenderedPrompt, GenerationError> {
        let budget = self.budget();

        let bare = fill(question, &[]);
        let bare_tokens = estimate_token_count(&bare);
        if bare_tokens > budget {
            return Err(GenerationError::ContextOverflow {
                required: bare_tokens,
                budget,
            });
        }

        let mut best = (bare, bare_tokens, 0);
        for used in 1..=chunks.len() {
            let text = fill(question, &chunks[..used]);
            let tokens = estimate_token_count(&text);
            if tokens > budget {
                break;
            }
            best = (text, tokens, used);
        }

        let (text, estimated_tokens, chunks_used) = best;
        debug!(
            "Rendered prompt with {}/{} chunks, ~{} of {} tokens",
            chunks_used,
            chunks.len(),
            estimated_tokens,
            budget
        );

        Ok(RenderedPrompt {
            text,
            chunks_used,
            chunks_dropped: chunks.len() - chunks_used,
            estimated_tokens,
        })
    }
}

fn fill(question: &str, chunks: &[String]) -> String {
    format!(
        "{}\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        QA_INSTRUCTION,
        chunks.join(CONTEXT_SEPARATOR),
        question
    )
}
