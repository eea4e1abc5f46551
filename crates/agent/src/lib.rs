//! Per-turn context assembly for civicbot.
//!
//! For every chat turn the backend:
//!
//! 1. **Records** the user's message in the tenant's message log
//! 2. **Retrieves** relevant fragments from the tenant's vector store,
//!    falling back to raw documents when search has nothing to offer
//! 3. **Trims** the conversation history to the character budget
//! 4. **Assembles** one system message from the base prompt, institution
//!    metadata, retrieved context, the uploaded document and form fields
//!
//! The result is handed to the inference call, which lives outside this crate.

pub mod app;
pub mod context;

pub use app::{AppContext, PreparedTurn, TurnRequest};
pub use context::{
    AssembledPrompt, AssemblyInput, AssemblyReport, ContextSource, ConversationContextManager,
    DropInfo, PromptAssembler, Retrieval, RetrievalOutcome, SectionStats, estimate_tokens,
    retrieve, trim_history,
};
