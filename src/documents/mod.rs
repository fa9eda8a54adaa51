//! Corpus document loading
//!
//! Reads a source document and yields its pages in source order. PDF text is
//! extracted page by page with `pdf-extract`. Plain text and markdown files
//! are read as-is, with form feed characters separating pages.


use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const PAGE_SEPARATOR: char = '\x0C';

/// A single physical page of the corpus document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number in the source document
    pub number: usize,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Document not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to extract text from PDF {path}: {message}")]
    Pdf { path: PathBuf, message: String },
    #[error("Document {0} is not valid UTF-8 text")]
    Encoding(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Pdf,
    Text,
}

impl DocumentFormat {
    fn from_path(path: &Path) -> Result<Self, LoadError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "txt" | "md" | "text" => Ok(Self::Text),
            other => Err(LoadError::UnsupportedFormat(if other.is_empty() {
                path.display().to_string()
            } else {
                format!(".{}", other)
            })),
        }
    }
}

/// Load a document and split it into pages.
///
/// Pages that contain only whitespace are dropped; the remaining pages keep
/// their original page numbers.
#[inline]
pub fn load_pages(path: &Path) -> Result<Vec<Page>, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }

    let format = DocumentFormat::from_path(path)?;
    debug!("Loading {:?} document from {}", format, path.display());

    let bytes = std::fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let pages = match format {
        DocumentFormat::Pdf => {
            let texts = pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| {
                LoadError::Pdf {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            })?;
            number_pages(texts)
        }
        DocumentFormat::Text => {
            let text =
                String::from_utf8(bytes).map_err(|_| LoadError::Encoding(path.to_path_buf()))?;
            split_pages(&text)
        }
    };

    info!("Loaded {} pages from {}", pages.len(), path.display());
    Ok(pages)
}

/// Split extracted text into pages on form feeds
#[inline]
pub fn split_pages(text: &str) -> Vec<Page> {
    number_pages(text.split(PAGE_SEPARATOR))
}

/// Number pages from 1 in source order, skipping blank ones
fn number_pages<I, S>(texts: I) -> Vec<Page>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    texts
        .into_iter()
        .enumerate()
        .filter_map(|(i, page)| {
            let trimmed = page.as_ref().trim();
            (!trimmed.is_empty()).then(|| Page {
                number: i + 1,
                text: trimmed.to_string(),
            })
        })
        .collect()
}
