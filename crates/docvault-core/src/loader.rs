//! Document loading.
//!
//! A [`DocumentLoader`] turns raw bytes into text blocks before
//! chunking. Format-specific loaders (PDF, DOCX, HTML, transcripts)
//! live outside this crate and are registered by the caller; only
//! the plain-text loader ships here as the reference implementation.

use crate::error::LoaderError;

/// Extracts an ordered sequence of text blocks from raw bytes.
pub trait DocumentLoader: Send + Sync {
    fn load(&self, bytes: &[u8]) -> Result<Vec<String>, LoaderError>;
}

/// Loader for UTF-8 plain text: the whole input is one block.
#[derive(Debug, Default)]
pub struct PlainTextLoader;

impl DocumentLoader for PlainTextLoader {
    fn load(&self, bytes: &[u8]) -> Result<Vec<String>, LoaderError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| LoaderError(format!("input is not valid UTF-8: {e}")))?;
        Ok(vec![text.to_string()])
    }
}
