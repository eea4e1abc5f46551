//! `civicbot ingest | search | documents | remove | clear`: knowledge-base commands.

use super::{open_app, tenant_id};
use civicbot_agent::AppContext;
use civicbot_core::TenantDocument;
use civicbot_memory::AddReport;
use std::path::{Path, PathBuf};

pub async fn ingest(
    tenant: &str,
    files: &[PathBuf],
    reindex: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app().await?;
    let documents = read_documents(files).await?;
    let report = ingest_documents(&app, tenant, &documents, reindex).await?;

    println!(
        "📥 {} document(s), {} chunk(s) stored for tenant {tenant}",
        report.documents, report.chunks
    );
    if report.replaced_chunks > 0 {
        println!("   Replaced {} existing chunk(s)", report.replaced_chunks);
    }
    if report.fallback_chunks > 0 {
        println!(
            "   ⚠️  {} chunk(s) used hash fallback embeddings; search quality is degraded",
            report.fallback_chunks
        );
    }
    Ok(())
}

async fn read_documents(files: &[PathBuf]) -> Result<Vec<TenantDocument>, Box<dyn std::error::Error>> {
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        documents.push(TenantDocument::new(file_name(path)?, content));
    }
    Ok(documents)
}

fn file_name(path: &Path) -> Result<String, String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| format!("Not a file name: {}", path.display()))
}

/// Add `documents` one by one, or replace the whole store with them.
pub async fn ingest_documents(
    app: &AppContext,
    tenant: &str,
    documents: &[TenantDocument],
    reindex: bool,
) -> Result<AddReport, Box<dyn std::error::Error>> {
    let store = app.registry().get_store(&tenant_id(tenant)).await?;
    if reindex {
        return Ok(store.reindex(documents).await?);
    }

    let mut total = AddReport::default();
    for doc in documents {
        let report = store.add_document(&doc.filename, &doc.content).await?;
        total.documents += report.documents;
        total.chunks += report.chunks;
        total.fallback_chunks += report.fallback_chunks;
        total.replaced_chunks += report.replaced_chunks;
    }
    Ok(total)
}

pub async fn search(
    tenant: &str,
    query: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app().await?;
    let store = app.registry().get_store(&tenant_id(tenant)).await?;
    let top_k = top_k.unwrap_or(app.config().rag.top_k);
    let search = store.search(query, top_k).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&search.results)?);
        return Ok(());
    }

    println!("🔍 Searching tenant {tenant} for: \"{query}\"");
    if search.embedding.as_ref().is_some_and(|e| e.is_fallback()) {
        println!("   ⚠️  Embedding service unavailable; ranking uses hash fallback vectors");
    }
    println!();

    if search.results.is_empty() {
        println!("   No documents found.");
    }
    for (i, result) in search.results.iter().enumerate() {
        println!(
            "  {:>2}. [score: {:.3}] {} (chunk {}/{})",
            i + 1,
            result.score,
            result.filename,
            result.chunk_index + 1,
            result.total_chunks
        );
        let preview: String = result.text.chars().take(80).collect();
        println!("      {}", preview.replace('\n', " "));
    }
    Ok(())
}

pub async fn documents(tenant: &str, full: bool) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app().await?;
    let store = app.registry().get_store(&tenant_id(tenant)).await?;

    println!("📚 Tenant {tenant}");
    println!("   Documents: {}", store.document_count().await);
    println!("   Chunks:    {}", store.chunk_count().await);
    println!();

    if full {
        for doc in store.get_all_documents().await {
            println!("--- {} ---", doc.filename);
            println!("{}", doc.content);
            println!();
        }
    } else {
        for name in store.document_names().await {
            println!("  - {name}");
        }
    }
    Ok(())
}

pub async fn remove(tenant: &str, filename: &str) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app().await?;
    let store = app.registry().get_store(&tenant_id(tenant)).await?;
    let removed = store.remove_document(filename).await?;

    if removed == 0 {
        println!("   No document named {filename} for tenant {tenant}.");
    } else {
        println!("🗑️  Removed {filename} ({removed} chunk(s)).");
    }
    Ok(())
}

pub async fn clear(tenant: &str, confirm: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !confirm {
        println!("⚠️  This will delete ALL documents of tenant {tenant} permanently.");
        println!("   Run with --confirm to proceed:");
        println!("   civicbot clear {tenant} --confirm");
        return Ok(());
    }

    let app = open_app().await?;
    let store = app.registry().get_store(&tenant_id(tenant)).await?;
    store.clear().await?;
    println!("✅ Knowledge base of tenant {tenant} cleared.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_of_path() {
        assert_eq!(file_name(Path::new("/tmp/docs/taxe.txt")).unwrap(), "taxe.txt");
        assert!(file_name(Path::new("/")).is_err());
    }

    #[tokio::test]
    async fn reads_documents_under_their_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.txt");
        tokio::fs::write(&path, "Luni-Vineri 8-16").await.unwrap();

        let documents = read_documents(&[path]).await.unwrap();
        assert_eq!(documents, vec![TenantDocument::new("program.txt", "Luni-Vineri 8-16")]);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_documents(&[dir.path().join("nope.txt")]).await.is_err());
    }
}
