//! Retrieval for the context section.
//!
//! Ranked search results are preferred. Without a query, or when search
//! finds nothing, the tenant's raw documents are used instead, and when the
//! store cannot be opened at all the section is left out. None of these
//! paths fail; the [`RetrievalOutcome`] records which one was taken.

use crate::context::assembler::{DropInfo, Rendered, SECTION_CONTEXT};
use civicbot_config::PromptConfig;
use civicbot_core::text::{char_len, truncate_chars};
use civicbot_core::{EmbeddingOutcome, SearchResult, TenantDocument, TenantId};
use civicbot_memory::VectorStoreRegistry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What fills the context section.
#[derive(Debug, Clone, Default)]
pub enum ContextSource {
    /// Search results, best first.
    Ranked(Vec<SearchResult>),
    /// Whole documents, in the order given.
    Documents(Vec<TenantDocument>),
    #[default]
    None,
}

/// Which retrieval path produced the context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrievalOutcome {
    Ranked {
        results: usize,
        embedding: EmbeddingOutcome,
    },
    /// Ranked search was skipped or found nothing.
    RawDocuments { documents: usize, reason: String },
    /// The store could not be opened and no documents were supplied.
    Unavailable { reason: String },
    /// Nothing to retrieve from.
    Empty,
}

#[derive(Debug, Clone)]
pub struct Retrieval {
    pub source: ContextSource,
    pub outcome: RetrievalOutcome,
}

impl Retrieval {
    pub fn none() -> Self {
        Self {
            source: ContextSource::None,
            outcome: RetrievalOutcome::Empty,
        }
    }

    /// Raw documents, blank ones dropped. Empty if none remain.
    pub fn from_documents(documents: Vec<TenantDocument>, reason: impl Into<String>) -> Self {
        let documents = non_blank(documents);
        if documents.is_empty() {
            return Self::none();
        }
        Self {
            outcome: RetrievalOutcome::RawDocuments {
                documents: documents.len(),
                reason: reason.into(),
            },
            source: ContextSource::Documents(documents),
        }
    }
}

fn non_blank(documents: Vec<TenantDocument>) -> Vec<TenantDocument> {
    documents
        .into_iter()
        .filter(|d| !d.content.trim().is_empty())
        .collect()
}

/// Find context for `query` in the tenant's store.
///
/// `documents` are the caller's raw documents for the no-results path;
/// when `None`, the store's own documents are reconstructed instead.
pub async fn retrieve(
    registry: &VectorStoreRegistry,
    tenant: &TenantId,
    query: Option<&str>,
    documents: Option<Vec<TenantDocument>>,
    top_k: usize,
) -> Retrieval {
    let supplied = documents.map(non_blank).filter(|d| !d.is_empty());

    let store = match registry.get_store(tenant).await {
        Ok(store) => store,
        Err(e) => {
            warn!(tenant = %tenant, error = %e, "Vector store unavailable");
            return match supplied {
                Some(docs) => Retrieval::from_documents(docs, format!("store unavailable: {e}")),
                None => Retrieval {
                    source: ContextSource::None,
                    outcome: RetrievalOutcome::Unavailable {
                        reason: e.to_string(),
                    },
                },
            };
        }
    };

    let reason = match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(query) => {
            let search = store.search(query, top_k).await;
            match (search.results.is_empty(), search.embedding) {
                (false, Some(embedding)) => {
                    if embedding.is_fallback() {
                        warn!(tenant = %tenant, "Ranking with fallback embeddings");
                    }
                    debug!(tenant = %tenant, results = search.results.len(), "Ranked context");
                    return Retrieval {
                        outcome: RetrievalOutcome::Ranked {
                            results: search.results.len(),
                            embedding,
                        },
                        source: ContextSource::Ranked(search.results),
                    };
                }
                _ => "no ranked results",
            }
        }
        None => "no query",
    };

    let documents = match supplied {
        Some(docs) => docs,
        None => store.get_all_documents().await,
    };
    let retrieval = Retrieval::from_documents(documents, reason);
    debug!(tenant = %tenant, reason, outcome = ?retrieval.outcome, "Raw document context");
    retrieval
}

/// `--- filename ---` blocks, each result cut to `result_chars`.
pub(crate) fn format_ranked(results: &[SearchResult], result_chars: usize) -> Rendered {
    let mut chars_cut = 0;
    let blocks: Vec<String> = results
        .iter()
        .map(|r| {
            let text = truncate_chars(&r.text, result_chars);
            chars_cut += char_len(&r.text) - char_len(text);
            format!("\n--- {} ---\n{}", r.filename, text)
        })
        .collect();

    let drops = if chars_cut > 0 {
        vec![DropInfo {
            section: SECTION_CONTEXT.into(),
            items_dropped: 0,
            chars_dropped: chars_cut,
            reason: format!("Results cut to {result_chars} chars"),
        }]
    } else {
        Vec::new()
    };

    Rendered {
        text: blocks.join("\n"),
        items_included: results.len(),
        items_total: results.len(),
        drops,
    }
}

/// Documents in order, each capped at `document_chars`, all together at
/// `documents_total_chars`. The last document is cut to fit; if fewer than
/// `min_fragment_chars` remain, it is left out instead.
pub(crate) fn format_documents(documents: &[TenantDocument], limits: &PromptConfig) -> Rendered {
    let mut text = String::new();
    let mut used = 0;
    let mut included = 0;
    let mut total = 0;
    let mut available_chars = 0;

    for doc in documents {
        let content = doc.content.trim();
        if content.is_empty() {
            continue;
        }
        total += 1;
        available_chars += char_len(content);

        let remaining = limits.documents_total_chars.saturating_sub(used);
        if included < total - 1 {
            // budget already exhausted by an earlier document
            continue;
        }

        let mut fragment = truncate_chars(content, limits.document_chars);
        if char_len(fragment) > remaining {
            if remaining == 0 || remaining < limits.min_fragment_chars {
                continue;
            }
            fragment = truncate_chars(content, remaining);
        }

        text.push_str(&format!("\n\n--- {} ---\n{}", doc.filename, fragment));
        used += char_len(fragment);
        included += 1;
    }

    let drops = if available_chars > used {
        vec![DropInfo {
            section: SECTION_CONTEXT.into(),
            items_dropped: total - included,
            chars_dropped: available_chars - used,
            reason: format!(
                "Documents capped at {} chars each, {} in total",
                limits.document_chars, limits.documents_total_chars
            ),
        }]
    } else {
        Vec::new()
    };

    Rendered {
        text,
        items_included: included,
        items_total: total,
        drops,
    }
}
