//! Storage for civicbot: per-tenant vector stores and message logs.
//!
//! - [`chunker`] and [`vector`] are pure functions over text and vectors.
//! - [`TenantVectorStore`] owns one tenant's chunks; [`VectorStoreRegistry`]
//!   hands out one instance per tenant.
//! - [`blob`] persists store images; [`sqlite`] and [`in_memory`] implement
//!   the message log.

pub mod blob;
pub mod chunker;
pub mod image;
pub mod in_memory;
pub mod registry;
pub mod store;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use blob::{FileBlobStore, InMemoryBlobStore};
pub use chunker::{Chunker, chunk_text};
pub use in_memory::InMemoryMessageLog;
pub use registry::VectorStoreRegistry;
pub use store::{AddReport, RankedSearch, StoreSettings, TenantVectorStore};
pub use vector::cosine_similarity;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteMessageLog;
