//! Per-tenant vector store.
//!
//! Chunks and their vectors live in one `Vec<IndexedChunk>`, so the two can
//! never drift apart. Mutations hold the write lock across the in-memory
//! change and the persistence write; searches share the read lock.
//! Embedding happens before any lock is taken.

use civicbot_config::RagConfig;
use civicbot_core::error::StoreError;
use civicbot_core::{BlobStore, EmbeddingOutcome, SearchResult, StoreArtifact, TenantDocument, TenantId};
use civicbot_providers::Embedder;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::chunker::Chunker;
use crate::image::{self, ChunkMetadata, IndexedChunk};
use crate::vector::{rank_by_similarity, select_diverse};

/// Separator between chunks when a document is reassembled.
pub const CHUNK_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy)]
pub struct StoreSettings {
    pub chunker: Chunker,
    /// Results returned when the caller does not ask for a specific count.
    pub top_k: usize,
    /// The diversity pass scans `top_k * scan_multiplier` candidates.
    pub scan_multiplier: usize,
}

impl StoreSettings {
    pub fn from_config(rag: &RagConfig) -> Result<Self, StoreError> {
        Ok(Self {
            chunker: Chunker::new(rag.chunk_size, rag.chunk_overlap)?,
            top_k: rag.top_k,
            scan_multiplier: rag.scan_multiplier.max(1),
        })
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            chunker: Chunker::default(),
            top_k: 5,
            scan_multiplier: 3,
        }
    }
}

/// What an ingest did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddReport {
    pub documents: usize,
    pub chunks: usize,
    /// Chunks embedded with the hash fallback instead of the service.
    pub fallback_chunks: usize,
    /// Chunks of earlier versions that were replaced.
    pub replaced_chunks: usize,
}

/// Search results plus how the query was embedded. `embedding` is `None`
/// when the store was empty and the query was never embedded.
#[derive(Debug, Clone)]
pub struct RankedSearch {
    pub results: Vec<SearchResult>,
    pub embedding: Option<EmbeddingOutcome>,
}

pub struct TenantVectorStore {
    tenant: TenantId,
    blobs: Arc<dyn BlobStore>,
    embedder: Arc<Embedder>,
    settings: StoreSettings,
    chunks: RwLock<Vec<IndexedChunk>>,
}

impl TenantVectorStore {
    /// Open a tenant's store, loading its persisted image.
    ///
    /// A missing, unreadable, or inconsistent image yields an empty store;
    /// re-ingesting documents rebuilds it.
    pub async fn open(
        tenant: TenantId,
        blobs: Arc<dyn BlobStore>,
        embedder: Arc<Embedder>,
        settings: StoreSettings,
    ) -> Self {
        let chunks = Self::load(&tenant, blobs.as_ref()).await;
        info!(tenant = %tenant, backend = blobs.name(), chunks = chunks.len(), "Vector store loaded");
        Self {
            tenant,
            blobs,
            embedder,
            settings,
            chunks: RwLock::new(chunks),
        }
    }

    async fn load(tenant: &TenantId, blobs: &dyn BlobStore) -> Vec<IndexedChunk> {
        let metadata = blobs.read(tenant, StoreArtifact::Metadata).await;
        let vectors = blobs.read(tenant, StoreArtifact::Vectors).await;

        match (metadata, vectors) {
            (Ok(Some(metadata)), Ok(Some(vectors))) => match image::decode(&metadata, &vectors) {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!(tenant = %tenant, error = %e, "Corrupt vector store image, starting empty");
                    Vec::new()
                }
            },
            (Ok(None), Ok(None)) => Vec::new(),
            (Err(e), _) | (_, Err(e)) => {
                warn!(tenant = %tenant, error = %e, "Unreadable vector store image, starting empty");
                Vec::new()
            }
            _ => {
                warn!(tenant = %tenant, "Vector store image is missing an artifact, starting empty");
                Vec::new()
            }
        }
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Index `content` under `filename`, replacing any previous version.
    ///
    /// On a persistence failure the in-memory store keeps the new content
    /// and the error is returned.
    pub async fn add_document(&self, filename: &str, content: &str) -> Result<AddReport, StoreError> {
        let (new_chunks, fallback_chunks) = self.embed_document(filename, content).await;
        let added = new_chunks.len();

        let mut chunks = self.chunks.write().await;
        let before = chunks.len();
        chunks.retain(|c| c.metadata.filename != filename);
        let replaced_chunks = before - chunks.len();
        chunks.extend(new_chunks);
        let result = self.persist(&chunks).await;
        drop(chunks);

        info!(
            tenant = %self.tenant,
            filename,
            chunks = added,
            replaced = replaced_chunks,
            "Document indexed"
        );
        if fallback_chunks > 0 {
            warn!(
                tenant = %self.tenant,
                filename,
                fallback_chunks,
                "Chunks embedded with hash fallback; search over them is not semantic"
            );
        }

        result.map(|()| AddReport {
            documents: 1,
            chunks: added,
            fallback_chunks,
            replaced_chunks,
        })
    }

    /// Remove every chunk of `filename`. Returns how many were removed;
    /// nothing is persisted when that is zero.
    pub async fn remove_document(&self, filename: &str) -> Result<usize, StoreError> {
        let mut chunks = self.chunks.write().await;
        let before = chunks.len();
        chunks.retain(|c| c.metadata.filename != filename);
        let removed = before - chunks.len();

        if removed == 0 {
            debug!(tenant = %self.tenant, filename, "Nothing to remove");
            return Ok(0);
        }

        self.persist(&chunks).await?;
        info!(tenant = %self.tenant, filename, chunks = removed, "Document removed");
        Ok(removed)
    }

    /// Rank stored chunks against `query`, preferring distinct filenames.
    ///
    /// Returns `min(top_k, chunk_count)` results ordered by similarity.
    pub async fn search(&self, query: &str, top_k: usize) -> RankedSearch {
        if top_k == 0 || self.chunks.read().await.is_empty() {
            return RankedSearch {
                results: Vec::new(),
                embedding: None,
            };
        }

        let query_embedding = self.embedder.embed(query).await;

        let chunks = self.chunks.read().await;
        let ranked = rank_by_similarity(
            &query_embedding.vector,
            chunks.iter().map(|c| c.vector.as_slice()),
        );
        let scan_window = top_k.saturating_mul(self.settings.scan_multiplier);
        let selected = select_diverse(
            &ranked,
            |position| chunks[position].metadata.filename.as_str(),
            top_k,
            scan_window,
        );

        let results: Vec<SearchResult> = selected
            .into_iter()
            .map(|(position, score)| {
                let metadata = &chunks[position].metadata;
                SearchResult {
                    filename: metadata.filename.clone(),
                    text: metadata.text.clone(),
                    score,
                    chunk_index: metadata.chunk_index,
                    total_chunks: metadata.total_chunks,
                }
            })
            .collect();

        debug!(
            tenant = %self.tenant,
            candidates = ranked.len(),
            results = results.len(),
            fallback = query_embedding.outcome.is_fallback(),
            "Vector search"
        );

        RankedSearch {
            results,
            embedding: Some(query_embedding.outcome),
        }
    }

    /// Search with the configured default `top_k`.
    pub async fn search_default(&self, query: &str) -> RankedSearch {
        self.search(query, self.settings.top_k).await
    }

    /// One document per filename, chunks joined in index order with
    /// [`CHUNK_SEPARATOR`]. Overlapping text appears twice; this is for
    /// export and inspection, not for search.
    pub async fn get_all_documents(&self) -> Vec<TenantDocument> {
        let chunks = self.chunks.read().await;
        let mut documents: Vec<(String, Vec<&ChunkMetadata>)> = Vec::new();
        for chunk in chunks.iter() {
            let metadata = &chunk.metadata;
            match documents.iter_mut().find(|(name, _)| *name == metadata.filename) {
                Some((_, parts)) => parts.push(metadata),
                None => documents.push((metadata.filename.clone(), vec![metadata])),
            }
        }

        documents
            .into_iter()
            .map(|(filename, mut parts)| {
                parts.sort_by_key(|m| m.chunk_index);
                let content = parts
                    .iter()
                    .map(|m| m.text.as_str())
                    .collect::<Vec<_>>()
                    .join(CHUNK_SEPARATOR);
                TenantDocument { filename, content }
            })
            .collect()
    }

    /// Distinct filenames in insertion order.
    pub async fn document_names(&self) -> Vec<String> {
        let chunks = self.chunks.read().await;
        let mut seen = HashSet::new();
        chunks
            .iter()
            .filter(|c| seen.insert(c.metadata.filename.as_str()))
            .map(|c| c.metadata.filename.clone())
            .collect()
    }

    pub async fn chunk_count(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn document_count(&self) -> usize {
        self.document_names().await.len()
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut chunks = self.chunks.write().await;
        let removed = chunks.len();
        chunks.clear();
        self.persist(&chunks).await?;
        info!(tenant = %self.tenant, chunks = removed, "Vector store cleared");
        Ok(())
    }

    /// Replace the whole store with `documents`, persisting once.
    ///
    /// Blank documents are skipped; a repeated filename keeps its last version.
    pub async fn reindex(&self, documents: &[TenantDocument]) -> Result<AddReport, StoreError> {
        let mut rebuilt: Vec<IndexedChunk> = Vec::new();
        let mut report = AddReport::default();

        for document in documents {
            if document.content.trim().is_empty() {
                debug!(tenant = %self.tenant, filename = %document.filename, "Skipping blank document");
                continue;
            }
            let before = rebuilt.len();
            rebuilt.retain(|c| c.metadata.filename != document.filename);
            if rebuilt.len() == before {
                report.documents += 1;
            }
            let (chunks, fallback) = self.embed_document(&document.filename, &document.content).await;
            report.fallback_chunks += fallback;
            rebuilt.extend(chunks);
        }
        report.chunks = rebuilt.len();

        let mut chunks = self.chunks.write().await;
        report.replaced_chunks = chunks.len();
        *chunks = rebuilt;
        self.persist(&chunks).await?;

        info!(
            tenant = %self.tenant,
            documents = report.documents,
            chunks = report.chunks,
            "Vector store reindexed"
        );
        Ok(report)
    }

    async fn embed_document(&self, filename: &str, content: &str) -> (Vec<IndexedChunk>, usize) {
        let texts = self.settings.chunker.chunk(content);
        let total_chunks = texts.len();
        let mut chunks = Vec::with_capacity(total_chunks);
        let mut fallback = 0;

        for (chunk_index, text) in texts.into_iter().enumerate() {
            let embedding = self.embedder.embed(text).await;
            if embedding.outcome.is_fallback() {
                fallback += 1;
            }
            chunks.push(IndexedChunk {
                metadata: ChunkMetadata {
                    filename: filename.to_string(),
                    text: text.to_string(),
                    chunk_index,
                    total_chunks,
                },
                vector: embedding.vector,
            });
        }
        (chunks, fallback)
    }

    async fn persist(&self, chunks: &[IndexedChunk]) -> Result<(), StoreError> {
        let metadata = image::encode_metadata(chunks).map_err(StoreError::Serialization)?;
        let vectors = image::encode_vectors(chunks);

        self.blobs
            .write_image(
                &self.tenant,
                &[
                    (StoreArtifact::Vectors, vectors.as_slice()),
                    (StoreArtifact::Metadata, metadata.as_slice()),
                ],
            )
            .await?;

        debug!(tenant = %self.tenant, chunks = chunks.len(), "Vector store persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{FileBlobStore, InMemoryBlobStore};
    use async_trait::async_trait;
    use civicbot_core::EmbeddingService;
    use civicbot_core::error::EmbeddingError;
    use std::time::Duration;

    /// Embeds by keyword presence so rankings are predictable.
    struct KeywordService;

    const KEYWORDS: [&str; 4] = ["tax", "hours", "permit", "school"];

    #[async_trait]
    impl EmbeddingService for KeywordService {
        fn name(&self) -> &str {
            "keywords"
        }

        fn model(&self) -> &str {
            "bag-of-keywords"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let lower = text.to_lowercase();
            Ok(KEYWORDS
                .iter()
                .map(|k| lower.matches(k).count() as f32)
                .collect())
        }
    }

    struct FailingBlobStore;

    #[async_trait]
    impl BlobStore for FailingBlobStore {
        fn name(&self) -> &str {
            "failing"
        }

        async fn read(&self, _: &TenantId, _: StoreArtifact) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(None)
        }

        async fn write(&self, _: &TenantId, _: StoreArtifact, _: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::Storage("disk full".into()))
        }
    }

    fn keyword_embedder() -> Arc<Embedder> {
        Arc::new(Embedder::new(Arc::new(KeywordService), Duration::from_secs(5)))
    }

    async fn open_with(blobs: Arc<dyn BlobStore>, embedder: Arc<Embedder>) -> TenantVectorStore {
        TenantVectorStore::open(TenantId::from("t1"), blobs, embedder, StoreSettings::default()).await
    }

    async fn fallback_store() -> TenantVectorStore {
        open_with(Arc::new(InMemoryBlobStore::new()), Arc::new(Embedder::fallback_only())).await
    }

    #[tokio::test]
    async fn clear_add_search_round_trip() {
        let store = fallback_store().await;
        store.clear().await.unwrap();
        store.add_document("a.txt", "hello world").await.unwrap();

        let search = store.search("hello", 1).await;
        assert_eq!(search.results.len(), 1);
        assert_eq!(search.results[0].filename, "a.txt");
        assert_eq!(search.results[0].text, "hello world");
        assert!(search.embedding.unwrap().is_fallback());
    }

    #[tokio::test]
    async fn empty_store_search_is_empty() {
        let store = fallback_store().await;
        let search = store.search("anything", 5).await;
        assert!(search.results.is_empty());
        assert!(search.embedding.is_none());
    }

    #[tokio::test]
    async fn re_adding_a_document_replaces_it() {
        let store = fallback_store().await;
        let content = "x".repeat(2500);
        store.add_document("f.txt", &content).await.unwrap();
        let once = store.get_all_documents().await;
        let count = store.chunk_count().await;

        let report = store.add_document("f.txt", &content).await.unwrap();
        assert_eq!(report.replaced_chunks, count);
        assert_eq!(store.chunk_count().await, count);
        assert_eq!(store.get_all_documents().await, once);
    }

    #[tokio::test]
    async fn chunks_carry_contiguous_indices() {
        let store = fallback_store().await;
        let report = store.add_document("long.txt", &"y".repeat(2500)).await.unwrap();
        assert_eq!(report.chunks, 4);

        let search = store.search("y", 10).await;
        let mut indices: Vec<usize> = search.results.iter().map(|r| r.chunk_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(search.results.iter().all(|r| r.total_chunks == 4));
    }

    #[tokio::test]
    async fn remove_keeps_order_of_the_rest() {
        let store = fallback_store().await;
        store.add_document("a.txt", "alpha").await.unwrap();
        store.add_document("b.txt", "beta").await.unwrap();
        store.add_document("c.txt", "gamma").await.unwrap();

        assert_eq!(store.remove_document("b.txt").await.unwrap(), 1);
        assert_eq!(store.remove_document("missing.txt").await.unwrap(), 0);
        assert_eq!(store.document_names().await, vec!["a.txt", "c.txt"]);
        assert_eq!(store.document_count().await, 2);
    }

    #[tokio::test]
    async fn ranking_follows_similarity() {
        let store = open_with(Arc::new(InMemoryBlobStore::new()), keyword_embedder()).await;
        store.add_document("taxes.txt", "tax tax tax").await.unwrap();
        store.add_document("hours.txt", "opening hours").await.unwrap();
        store.add_document("permits.txt", "building permit").await.unwrap();

        let search = store.search("what tax do I pay", 2).await;
        assert_eq!(search.results[0].filename, "taxes.txt");
        assert!((search.results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(
            search.embedding,
            Some(EmbeddingOutcome::Service { name: "keywords".into() })
        );
    }

    #[tokio::test]
    async fn soft_diversity_promotes_second_file() {
        let settings = StoreSettings {
            chunker: Chunker::new(20, 0).unwrap(),
            ..Default::default()
        };
        let store = TenantVectorStore::open(
            TenantId::from("t1"),
            Arc::new(InMemoryBlobStore::new()),
            keyword_embedder(),
            settings,
        )
        .await;

        // five strong "tax" chunks and five unrelated ones in a.txt; b.txt
        // ranks sixth, inside the 3 * 3 scan window
        let mut a: String = (0..5).map(|_| "tax tax tax tax tax ").collect();
        a.extend((0..5).map(|_| "permit permit permit"));
        store.add_document("a.txt", &a).await.unwrap();
        store.add_document("b.txt", "tax and school hours").await.unwrap();
        assert_eq!(store.chunk_count().await, 11);

        let search = store.search("tax", 3).await;
        let files: Vec<&str> = search.results.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(search.results.len(), 3);
        assert!(files.contains(&"b.txt"), "{files:?}");
        assert_eq!(files[0], "a.txt");
    }

    #[tokio::test]
    async fn repeats_allowed_when_one_file_only() {
        let settings = StoreSettings {
            chunker: Chunker::new(10, 0).unwrap(),
            ..Default::default()
        };
        let store = TenantVectorStore::open(
            TenantId::from("t1"),
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(Embedder::fallback_only()),
            settings,
        )
        .await;
        store.add_document("only.txt", &"z".repeat(100)).await.unwrap();

        let search = store.search("z", 5).await;
        assert_eq!(search.results.len(), 5);
        assert!(search.results.iter().all(|r| r.filename == "only.txt"));
    }

    #[tokio::test]
    async fn persists_and_reloads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let blobs: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(dir.path()));
        let embedder = Arc::new(Embedder::fallback_only());

        {
            let store = open_with(blobs.clone(), embedder.clone()).await;
            store.add_document("hcl.txt", "Hotărârea consiliului local").await.unwrap();
            store.add_document("tax.txt", "Taxe locale 2024").await.unwrap();
        }

        let reopened = open_with(blobs, embedder).await;
        assert_eq!(reopened.document_names().await, vec!["hcl.txt", "tax.txt"]);
        let search = reopened.search("Taxe locale 2024", 1).await;
        assert_eq!(search.results[0].filename, "tax.txt");
    }

    #[tokio::test]
    async fn failed_save_leaves_previous_image_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let blobs: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(dir.path()));
        let embedder = Arc::new(Embedder::fallback_only());

        {
            let store = open_with(blobs.clone(), embedder.clone()).await;
            store.add_document("hcl.txt", "Hotărârea consiliului local").await.unwrap();

            std::fs::create_dir(dir.path().join("t1").join("metadata.tmp")).unwrap();
            let result = store.add_document("tax.txt", "Taxe locale 2024").await;
            assert!(matches!(result, Err(StoreError::Storage(_))));
        }

        let reopened = open_with(blobs, embedder).await;
        assert_eq!(reopened.document_names().await, vec!["hcl.txt"]);
    }

    #[tokio::test]
    async fn corrupt_image_loads_empty() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let tenant = TenantId::from("t1");
        blobs.put(&tenant, StoreArtifact::Metadata, b"{not json".to_vec());
        blobs.put(&tenant, StoreArtifact::Vectors, b"garbage".to_vec());

        let store = open_with(blobs.clone(), Arc::new(Embedder::fallback_only())).await;
        assert_eq!(store.chunk_count().await, 0);

        store.add_document("a.txt", "rebuilt").await.unwrap();
        assert_eq!(store.chunk_count().await, 1);
    }

    #[tokio::test]
    async fn missing_artifact_loads_empty() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        blobs.put(&TenantId::from("t1"), StoreArtifact::Metadata, b"[]".to_vec());
        let store = open_with(blobs, Arc::new(Embedder::fallback_only())).await;
        assert_eq!(store.chunk_count().await, 0);
    }

    #[tokio::test]
    async fn persistence_failure_is_reported_but_memory_wins() {
        let store = open_with(Arc::new(FailingBlobStore), Arc::new(Embedder::fallback_only())).await;
        let result = store.add_document("a.txt", "content").await;
        assert!(matches!(result, Err(StoreError::Storage(_))));
        assert_eq!(store.chunk_count().await, 1);
    }

    #[tokio::test]
    async fn reassembles_documents_in_chunk_order() {
        let settings = StoreSettings {
            chunker: Chunker::new(4, 0).unwrap(),
            ..Default::default()
        };
        let store = TenantVectorStore::open(
            TenantId::from("t1"),
            Arc::new(InMemoryBlobStore::new()),
            Arc::new(Embedder::fallback_only()),
            settings,
        )
        .await;
        store.add_document("a.txt", "abcdefghij").await.unwrap();

        let docs = store.get_all_documents().await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "abcd\n\nefgh\n\nij");
    }

    #[tokio::test]
    async fn reindex_replaces_everything() {
        let store = fallback_store().await;
        store.add_document("old.txt", "stale").await.unwrap();

        let report = store
            .reindex(&[
                TenantDocument::new("a.txt", "first"),
                TenantDocument::new("blank.txt", "   \n"),
                TenantDocument::new("b.txt", "second"),
                TenantDocument::new("a.txt", "first, revised"),
            ])
            .await
            .unwrap();

        assert_eq!(report.documents, 2);
        assert_eq!(report.chunks, 2);
        assert_eq!(report.replaced_chunks, 1);
        assert_eq!(store.document_names().await, vec!["b.txt", "a.txt"]);
        let docs = store.get_all_documents().await;
        assert!(docs.iter().any(|d| d.content == "first, revised"));
    }

    #[tokio::test]
    async fn clear_empties_and_persists() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let store = open_with(blobs.clone(), Arc::new(Embedder::fallback_only())).await;
        store.add_document("a.txt", "x").await.unwrap();
        store.clear().await.unwrap();

        assert_eq!(store.chunk_count().await, 0);
        assert_eq!(
            blobs.get(&TenantId::from("t1"), StoreArtifact::Metadata),
            Some(b"[]".to_vec())
        );
    }
}
