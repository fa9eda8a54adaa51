use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::QaError;
use crate::config::Config;
use crate::documents::{Page, load_pages};
use crate::embeddings::{Chunk, ChunkingConfig, Embedder, chunk_pages};
use crate::generation::{GenerationError, LanguageModel, StuffGenerator, StuffPrompt, TokenSink};
use crate::index::{IndexBackend, IndexEntry, SearchHit, VectorIndex, build_index};
use crate::ollama::{OllamaClient, OllamaEmbedder, OllamaGenerator};

const DEFAULT_TOP_K: usize = 4;

/// Where the corpus comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorpusSource {
    File(PathBuf),
    Pages(Vec<Page>),
}

impl From<PathBuf> for CorpusSource {
    #[inline]
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for CorpusSource {
    #[inline]
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

impl From<Vec<Page>> for CorpusSource {
    #[inline]
    fn from(pages: Vec<Page>) -> Self {
        Self::Pages(pages)
    }
}

/// Models that must be present on the Ollama server before building
#[derive(Debug, Clone)]
struct ModelCheck {
    client: OllamaClient,
    pull_missing: bool,
}

/// Everything needed to build a [`Pipeline`]
pub struct PipelineBuilder {
    corpus: CorpusSource,
    chunking: ChunkingConfig,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn LanguageModel>,
    prompt: StuffPrompt,
    backend: IndexBackend,
    top_k: usize,
    max_concurrent: usize,
    sink: Option<Arc<dyn TokenSink>>,
    model_check: Option<ModelCheck>,
}

impl std::fmt::Debug for PipelineBuilder {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("corpus", &self.corpus)
            .field("chunking", &self.chunking)
            .field("embedder", &self.embedder.model_id())
            .field("model", &self.model.model_id())
            .field("prompt", &self.prompt)
            .field("backend", &self.backend)
            .field("top_k", &self.top_k)
            .field("max_concurrent", &self.max_concurrent)
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    #[inline]
    pub fn new(
        corpus: impl Into<CorpusSource>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            corpus: corpus.into(),
            chunking: ChunkingConfig::default(),
            embedder,
            model,
            prompt: StuffPrompt::new(1024, 256),
            backend: IndexBackend::Memory,
            top_k: DEFAULT_TOP_K,
            max_concurrent: 1,
            sink: None,
            model_check: None,
        }
    }

    /// Ollama backed pipeline described by `config`
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self, QaError> {
        config
            .validate()
            .map_err(|e| QaError::Config(e.to_string()))?;

        let client =
            OllamaClient::new(&config.ollama).map_err(|e| QaError::Config(format!("{:#}", e)))?;
        let embedder = OllamaEmbedder::new(client.clone(), &config.embedding);
        let model = OllamaGenerator::new(client.clone(), &config.generation);

        Ok(Self::new(
            config.corpus.path.clone(),
            Arc::new(embedder),
            Arc::new(model),
        )
        .with_chunking(config.chunking.clone())
        .with_prompt(StuffPrompt::from(&config.generation))
        .with_backend(IndexBackend::from_config(config))
        .with_top_k(config.index.top_k)
        .with_max_concurrent(config.generation.max_concurrent as usize)
        .with_model_check(client, config.ollama.pull_missing_models))
    }

    #[inline]
    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    #[inline]
    pub fn with_prompt(mut self, prompt: StuffPrompt) -> Self {
        self.prompt = prompt;
        self
    }

    #[inline]
    pub fn with_backend(mut self, backend: IndexBackend) -> Self {
        self.backend = backend;
        self
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Stream generated tokens to `sink`
    #[inline]
    pub fn with_sink(mut self, sink: Arc<dyn TokenSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Verify (and optionally pull) both models on `client` before building
    #[inline]
    pub fn with_model_check(mut self, client: OllamaClient, pull_missing: bool) -> Self {
        self.model_check = Some(ModelCheck {
            client,
            pull_missing,
        });
        self
    }

    /// Run the one-time build: models, corpus, chunks, embeddings, index
    #[inline]
    pub async fn build(self) -> Result<Pipeline, QaError> {
        if self.top_k == 0 {
            return Err(QaError::Config("top_k must be at least 1".to_string()));
        }
        if self.max_concurrent == 0 {
            return Err(QaError::Config(
                "max_concurrent must be at least 1".to_string(),
            ));
        }

        if let Some(check) = self.model_check.clone() {
            self.check_models(check).await?;
        }

        let pages = match self.corpus {
            CorpusSource::Pages(ref pages) => pages.clone(),
            CorpusSource::File(ref path) => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || load_pages(&path))
                    .await
                    .map_err(|e| QaError::Config(format!("Corpus loader panicked: {}", e)))??
            }
        };

        let chunks = chunk_pages(&pages, &self.chunking);
        if chunks.is_empty() {
            return Err(QaError::EmptyCorpus);
        }
        info!(
            "Split {} pages into {} chunks ({} chars, {} overlap)",
            pages.len(),
            chunks.len(),
            self.chunking.chunk_size,
            self.chunking.chunk_overlap
        );

        let entries = self.embed_chunks(chunks).await?;
        let index = build_index(&self.backend, entries)
            .await
            .map_err(|e| QaError::Index(e.to_string()))?;

        let mut generator = StuffGenerator::new(self.model, self.prompt);
        if let Some(sink) = self.sink {
            generator = generator.with_sink(sink);
        }

        Ok(Pipeline {
            embedder: self.embedder,
            index,
            generator,
            top_k: self.top_k,
            generation_permits: Arc::new(Semaphore::new(self.max_concurrent)),
        })
    }

    async fn check_models(&self, check: ModelCheck) -> Result<(), QaError> {
        let embedding_model = self.embedder.model_id().to_string();
        let language_model = self.model.model_id().to_string();

        tokio::task::spawn_blocking(move || {
            check
                .client
                .ensure_model(&embedding_model, check.pull_missing)
                .map_err(|e| QaError::Embedding(format!("{:#}", e)))?;
            check
                .client
                .ensure_model(&language_model, check.pull_missing)
                .map_err(|e| QaError::Model(format!("{:#}", e)))
        })
        .await
        .map_err(|e| QaError::Model(format!("Model check panicked: {}", e)))?
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<IndexEntry>, QaError> {
        let embedder = Arc::clone(&self.embedder);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let expected = texts.len();

        let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| QaError::Embedding(format!("Embedding task panicked: {}", e)))?
            .map_err(|e| QaError::Embedding(format!("{:#}", e)))?;

        if vectors.len() != expected {
            return Err(QaError::Embedding(format!(
                "Expected {} embeddings, got {}",
                expected,
                vectors.len()
            )));
        }

        debug!("Embedded {} chunks", expected);

        Ok(chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry {
                vector,
                text: chunk.text,
                page: chunk.page,
            })
            .collect())
    }
}

/// The ready retrieval pipeline. Immutable; shared by every request.
pub struct Pipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    generator: StuffGenerator,
    top_k: usize,
    generation_permits: Arc<Semaphore>,
}

impl std::fmt::Debug for Pipeline {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("embedder", &self.embedder.model_id())
            .field("chunks", &self.index.len())
            .field("generator", &self.generator)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    #[inline]
    pub fn embedding_model(&self) -> &str {
        self.embedder.model_id()
    }

    #[inline]
    pub fn language_model(&self) -> &str {
        self.generator.model_id()
    }

    /// Embed `query` and fetch the `top_k` closest chunks
    #[inline]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchHit>, QaError> {
        let embedder = Arc::clone(&self.embedder);
        let text = query.to_string();

        let vector = tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|e| QaError::Retrieval(format!("Embedding task panicked: {}", e)))?
            .map_err(|e| QaError::Retrieval(format!("{:#}", e)))?;

        let hits = self
            .index
            .search(&vector, self.top_k)
            .await
            .map_err(|e| QaError::Retrieval(e.to_string()))?;

        debug!("Retrieved {} chunks for query", hits.len());
        Ok(hits)
    }

    /// Retrieve context for `query` and generate an answer from it
    #[inline]
    pub async fn answer(&self, query: &str) -> Result<String, QaError> {
        let hits = self.retrieve(query).await?;
        let chunks: Vec<String> = hits.into_iter().map(|hit| hit.text).collect();

        let _permit = self
            .generation_permits
            .acquire()
            .await
            .map_err(|e| GenerationError::Model(e.to_string()))?;

        let generator = self.generator.clone();
        let question = query.to_string();
        let text = tokio::task::spawn_blocking(move || generator.generate(&question, &chunks))
            .await
            .map_err(|e| GenerationError::Model(format!("Generation task panicked: {}", e)))??;

        Ok(text)
    }
}
