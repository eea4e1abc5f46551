//! On-disk image of a tenant vector store.
//!
//! Two artifacts, always written together:
//! - `metadata.json`: JSON array of [`ChunkMetadata`], one per chunk
//! - `vectors.bin`: magic `CBV1`, u32 count, then per vector a u32 length
//!   followed by little-endian f32 values
//!
//! Positions in both artifacts correspond 1:1.

use serde::{Deserialize, Serialize};

const MAGIC: &[u8; 4] = b"CBV1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    #[serde(rename = "content", alias = "text")]
    pub text: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// A chunk and its vector. They are created, stored, and dropped together.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub metadata: ChunkMetadata,
    pub vector: Vec<f32>,
}

pub fn encode_metadata(chunks: &[IndexedChunk]) -> Result<Vec<u8>, String> {
    let metadata: Vec<&ChunkMetadata> = chunks.iter().map(|c| &c.metadata).collect();
    serde_json::to_vec(&metadata).map_err(|e| e.to_string())
}

pub fn encode_vectors(chunks: &[IndexedChunk]) -> Vec<u8> {
    let floats: usize = chunks.iter().map(|c| c.vector.len()).sum();
    let mut buf = Vec::with_capacity(8 + chunks.len() * 4 + floats * 4);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&(chunks.len() as u32).to_le_bytes());
    for chunk in chunks {
        buf.extend_from_slice(&(chunk.vector.len() as u32).to_le_bytes());
        buf.extend(chunk.vector.iter().flat_map(|f| f.to_le_bytes()));
    }
    buf
}

pub fn decode_vectors(bytes: &[u8]) -> Result<Vec<Vec<f32>>, String> {
    let mut reader = Reader { bytes, pos: 0 };
    if reader.take(4)? != MAGIC {
        return Err("bad magic".into());
    }
    let count = reader.u32()? as usize;
    let mut vectors = Vec::with_capacity(count.min(bytes.len() / 4));
    for _ in 0..count {
        let len = reader.u32()? as usize;
        let raw = reader.take(len.checked_mul(4).ok_or("vector length overflow")?)?;
        vectors.push(
            raw.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        );
    }
    if reader.pos != bytes.len() {
        return Err(format!("{} trailing bytes", bytes.len() - reader.pos));
    }
    Ok(vectors)
}

/// Rebuild the chunk list from both artifacts.
pub fn decode(metadata: &[u8], vectors: &[u8]) -> Result<Vec<IndexedChunk>, String> {
    let metadata: Vec<ChunkMetadata> =
        serde_json::from_slice(metadata).map_err(|e| format!("metadata: {e}"))?;
    let vectors = decode_vectors(vectors).map_err(|e| format!("vectors: {e}"))?;
    if metadata.len() != vectors.len() {
        return Err(format!(
            "{} metadata entries but {} vectors",
            metadata.len(),
            vectors.len()
        ));
    }
    Ok(metadata
        .into_iter()
        .zip(vectors)
        .map(|(metadata, vector)| IndexedChunk { metadata, vector })
        .collect())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(format!("truncated at byte {}", self.pos)),
        }
    }

    fn u32(&mut self) -> Result<u32, String> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}
