//! Question answering engine
//!
//! [`QaEngine`] owns the retrieval pipeline and guards it with an explicit
//! lifecycle. `init` loads, chunks, embeds and indexes the corpus exactly
//! once; only then does `run` accept questions. Per query failures never
//! escape `run`: they are logged and reported as an unavailable answer.

pub mod pipeline;


use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::documents::LoadError;
use crate::generation::GenerationError;

pub use pipeline::{CorpusSource, Pipeline, PipelineBuilder};

#[derive(Debug, Error)]
pub enum QaError {
    #[error("Invalid QA configuration: {0}")]
    Config(String),
    #[error("Failed to load corpus: {0}")]
    Load(#[from] LoadError),
    #[error("Corpus produced no chunks")]
    EmptyCorpus,
    #[error("Embedding model unavailable: {0}")]
    Embedding(String),
    #[error("Language model unavailable: {0}")]
    Model(String),
    #[error("Failed to build vector index: {0}")]
    Index(String),
    #[error("QA engine is not ready")]
    NotReady,
    #[error("QA engine is already initialized")]
    AlreadyInitialized,
    #[error("Retrieval failed: {0}")]
    Retrieval(String),
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),
}

impl QaError {
    /// Initialization failures are fatal; everything else concerns a single request
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Load(_)
                | Self::EmptyCorpus
                | Self::Embedding(_)
                | Self::Model(_)
                | Self::Index(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerOutcome {
    Answered,
    /// Retrieval or generation failed; the text is empty
    Unavailable,
}

/// Result of a question. An unavailable answer always has empty text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    pub outcome: AnswerOutcome,
}

impl Answer {
    #[inline]
    pub fn answered(text: String) -> Self {
        Self {
            text,
            outcome: AnswerOutcome::Answered,
        }
    }

    #[inline]
    pub fn unavailable() -> Self {
        Self {
            text: String::new(),
            outcome: AnswerOutcome::Unavailable,
        }
    }

    #[inline]
    pub fn is_available(&self) -> bool {
        self.outcome == AnswerOutcome::Answered
    }
}

/// Lifecycle of the engine
#[derive(Debug, Clone)]
pub enum QaState {
    Uninitialized,
    Initializing,
    Ready(Arc<Pipeline>),
    Failed(String),
}

/// Payload-free view of [`QaState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QaStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl From<&QaState> for QaStatus {
    #[inline]
    fn from(state: &QaState) -> Self {
        match state {
            QaState::Uninitialized => Self::Uninitialized,
            QaState::Initializing => Self::Initializing,
            QaState::Ready(_) => Self::Ready,
            QaState::Failed(_) => Self::Failed,
        }
    }
}

#[derive(Debug)]
pub struct QaEngine {
    state: RwLock<QaState>,
}

impl Default for QaEngine {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl QaEngine {
    #[inline]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(QaState::Uninitialized),
        }
    }

    #[inline]
    pub async fn status(&self) -> QaStatus {
        let state = self.state.read().await;
        QaStatus::from(&*state)
    }

    #[inline]
    pub async fn is_ready(&self) -> bool {
        self.status().await == QaStatus::Ready
    }

    /// The ready pipeline, if any
    #[inline]
    pub async fn pipeline(&self) -> Option<Arc<Pipeline>> {
        let state = self.state.read().await;
        if let QaState::Ready(pipeline) = &*state {
            Some(Arc::clone(pipeline))
        } else {
            None
        }
    }

    /// Build the pipeline and move to `Ready`. Can only succeed once; a failed
    /// attempt leaves the engine in `Failed` and refusing queries.
    #[inline]
    pub async fn init(&self, builder: PipelineBuilder) -> Result<(), QaError> {
        {
            let mut state = self.state.write().await;
            if !matches!(*state, QaState::Uninitialized) {
                warn!("Ignoring repeated QA engine initialization");
                return Err(QaError::AlreadyInitialized);
            }
            *state = QaState::Initializing;
        }

        info!("Initializing QA engine");
        let built = builder.build().await;

        let mut state = self.state.write().await;
        match built {
            Ok(pipeline) => {
                info!(
                    "QA engine ready: {} chunks indexed, embedding model {}, language model {}",
                    pipeline.chunk_count(),
                    pipeline.embedding_model(),
                    pipeline.language_model()
                );
                *state = QaState::Ready(Arc::new(pipeline));
                Ok(())
            }
            Err(e) => {
                error!("QA engine initialization failed: {}", e);
                *state = QaState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Answer `query`. Fails only when the engine is not ready.
    #[inline]
    pub async fn run(&self, query: &str) -> Result<Answer, QaError> {
        let pipeline = self.pipeline().await.ok_or(QaError::NotReady)?;

        match pipeline.answer(query).await {
            Ok(text) => Ok(Answer::answered(text)),
            Err(e) => {
                error!("Answer unavailable for query {:?}: {}", query, e);
                Ok(Answer::unavailable())
            }
        }
    }
}
