//! # civicbot core
//!
//! Domain types, collaborator traits, and error definitions for the civicbot
//! context-assembly subsystem. Nothing in here performs I/O: the embedding
//! service, the per-tenant blob storage, and the persistent message log are
//! traits that leaf crates implement.
//!
//! ## Layout
//!
//! - [`tenant`]: tenant, user, and conversation addressing
//! - [`message`]: conversation messages and roles
//! - [`document`]: tenant documents and search results
//! - [`embedding`], [`storage`], [`history`]: collaborator traits
//! - [`institution`], [`form`]: structured prompt metadata
//! - [`text`]: char-boundary-safe string helpers

pub mod document;
pub mod embedding;
pub mod error;
pub mod form;
pub mod history;
pub mod institution;
pub mod message;
pub mod storage;
pub mod tenant;
pub mod text;

// Re-export key types at crate root for ergonomics
pub use document::{SearchResult, TenantDocument};
pub use embedding::{EmbeddingOutcome, EmbeddingService};
pub use error::{EmbeddingError, Error, HistoryError, Result, StoreError};
pub use form::{FormContext, FormField, PageContext};
pub use history::MessageLog;
pub use institution::InstitutionProfile;
pub use message::{ConversationMessage, Role};
pub use storage::{BlobStore, StoreArtifact};
pub use tenant::{ConversationKey, SessionId, TenantId, UserId};
