//! Fixed-size character chunking with overlap.
//!
//! Windows of `chunk_size` chars advance by `chunk_size - overlap` until
//! the window start reaches the end of the text. The last window may be
//! shorter, and when it starts inside the previous window's overlap it
//! adds no new text. Sizes count chars, so multi-byte text never splits
//! a code point.

use civicbot_core::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Rejects configurations whose stride `chunk_size - overlap` is below 1.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, StoreError> {
        if chunk_size == 0 {
            return Err(StoreError::InvalidConfig("chunk size must be > 0".into()));
        }
        if overlap >= chunk_size {
            return Err(StoreError::InvalidConfig(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }

    pub fn chunk<'a>(&self, text: &'a str) -> Vec<&'a str> {
        // Byte offset of every char, plus the end of the text.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let len = bounds.len() - 1;

        if len <= self.chunk_size {
            return vec![text];
        }

        let mut chunks = Vec::with_capacity(len / self.stride() + 1);
        let mut start = 0;
        while start < len {
            let end = (start + self.chunk_size).min(len);
            chunks.push(&text[bounds[start]..bounds[end]]);
            start += self.stride();
        }
        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

/// One-shot form of [`Chunker::chunk`].
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>, StoreError> {
    let chunker = Chunker::new(chunk_size, overlap)?;
    Ok(chunker.chunk(text).into_iter().map(str::to_string).collect())
}
