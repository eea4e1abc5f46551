//! Per-turn context: conversation history and the assembled system prompt.
//!
//! # Prompt sections (in order)
//!
//! | Section | Source | Cap |
//! |---------|--------|-----|
//! | Base | Tenant configuration | None |
//! | Institution | [`InstitutionProfile`](civicbot_core::InstitutionProfile) | Services 20, fees 15, responsibilities 10 |
//! | Context | Ranked search results, or raw documents | 2000 per result; 5000 per document, 15000 total |
//! | General rules | Fixed | None |
//! | Uploaded document | File attached to the turn | 2000 |
//! | Form fields | Page context | 30 fields, 1500 chars (1000 for names only) |
//!
//! History is trimmed separately to `max_context_chars - context_reserve`.

pub mod assembler;
pub mod forms;
pub mod history;
mod institution;
pub mod retrieval;
pub mod token;

pub use assembler::{
    AssembledPrompt, AssemblyInput, AssemblyReport, DropInfo, PromptAssembler, SectionStats,
};
pub use history::{ConversationContextManager, MIN_KEPT_MESSAGES, trim_history};
pub use retrieval::{ContextSource, Retrieval, RetrievalOutcome, retrieve};
pub use token::estimate_tokens;
