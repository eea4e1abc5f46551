//! Prompt assembly: one bounded system message per turn.
//!
//! Sections are appended in a fixed order:
//!
//! 1. **Base prompt**: verbatim, never capped
//! 2. **Institution**: identity, contact, hours, capped service/fee/responsibility lists, policies
//! 3. **Context**: ranked search results, or raw documents under a total budget, plus usage instructions
//! 4. **General rules**: always present
//! 5. **Uploaded document**: the file attached to this turn, capped, with extraction instructions
//! 6. **Form fields**: the active form's fields, capped, with JSON-only instructions
//!
//! Each section has its own cap; caps are never shared between sections.
//! Assembly cannot fail: the worst case is the base prompt plus the rules.
//!
//! # Determinism
//!
//! Identical inputs always produce identical output. No random or
//! time-dependent logic is used during assembly.

use crate::context::forms::render_form;
use crate::context::institution::render_institution;
use crate::context::retrieval::{ContextSource, Retrieval, RetrievalOutcome, format_documents, format_ranked};
use crate::context::token;
use civicbot_config::PromptConfig;
use civicbot_core::text::{char_len, truncate_chars};
use civicbot_core::{FormContext, InstitutionProfile};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SECTION_BASE: &str = "base";
pub const SECTION_INSTITUTION: &str = "institution";
pub const SECTION_CONTEXT: &str = "context";
pub const SECTION_RULES: &str = "rules";
pub const SECTION_UPLOAD: &str = "upload";
pub const SECTION_FORM: &str = "form";

const DOCUMENT_INSTRUCTIONS: &str = "Use ONLY the information in the documents above to answer \
questions. These documents contain official, institution-specific information. If the answer is \
not in the documents, say explicitly that you do not have this information and direct the user \
to the official sources or to contact the institution directly.";

const GENERAL_RULES: &str = "\n\n=== GENERAL RULES ===\n\
- Always answer based on the official information and documents available.\n\
- If you do not know the answer, admit it and point the user to the right sources.\n\
- Do not invent information or data that is not in the official documents.\n\
- Be respectful, clear, and helpful in every answer.\n";

const UPLOAD_INSTRUCTIONS: &str =
    "Extract: names, addresses, dates, numbers. Fill in the fields based on this document.";

// ── Types ─────────────────────────────────────────────────────────────────

/// Everything the assembler needs for one turn.
pub struct AssemblyInput<'a> {
    /// The tenant's configured instructions.
    pub base_prompt: &'a str,
    pub institution: Option<&'a InstitutionProfile>,
    pub retrieval: &'a Retrieval,
    /// Text extracted from a file attached to this turn.
    pub upload: Option<&'a str>,
    pub form: Option<&'a FormContext>,
}

/// The system message and how it was built.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub text: String,
    pub report: AssemblyReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyReport {
    /// Included sections, in prompt order.
    pub sections: Vec<SectionStats>,
    pub drops: Vec<DropInfo>,
    pub retrieval: RetrievalOutcome,
    pub total_chars: usize,
    pub estimated_tokens: usize,
}

impl AssemblyReport {
    pub fn section(&self, name: &str) -> Option<&SectionStats> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn includes(&self, name: &str) -> bool {
        self.section(name).is_some()
    }
}

/// Statistics for a single prompt section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionStats {
    pub name: String,
    pub chars: usize,
    pub tokens: usize,
    /// Items rendered after capping (results, documents, fields, list entries).
    pub items_included: usize,
    pub items_total: usize,
}

/// Content left out of a section by its cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropInfo {
    pub section: String,
    /// Whole items omitted.
    pub items_dropped: usize,
    /// Chars omitted, counting both omitted items and cut items.
    pub chars_dropped: usize,
    pub reason: String,
}

/// A rendered section before it is placed in the prompt.
#[derive(Debug, Clone, Default)]
pub(crate) struct Rendered {
    pub text: String,
    pub items_included: usize,
    pub items_total: usize,
    pub drops: Vec<DropInfo>,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The prompt assembler. Stateless, so one instance serves every tenant.
#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    limits: PromptConfig,
}

impl PromptAssembler {
    pub fn new(limits: PromptConfig) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &PromptConfig {
        &self.limits
    }

    /// Build the system message from all sections.
    pub fn assemble(&self, input: &AssemblyInput<'_>) -> AssembledPrompt {
        let mut text = String::new();
        let mut sections = Vec::new();
        let mut drops = Vec::new();

        let mut place = |name: &str, rendered: Rendered| {
            sections.push(SectionStats {
                name: name.into(),
                chars: char_len(&rendered.text),
                tokens: token::estimate_tokens(&rendered.text),
                items_included: rendered.items_included,
                items_total: rendered.items_total,
            });
            drops.extend(rendered.drops);
            text.push_str(&rendered.text);
        };

        place(
            SECTION_BASE,
            Rendered {
                text: input.base_prompt.to_string(),
                items_included: 1,
                items_total: 1,
                drops: Vec::new(),
            },
        );

        if let Some(rendered) = input
            .institution
            .and_then(|profile| render_institution(profile, &self.limits))
        {
            place(SECTION_INSTITUTION, rendered);
        }

        if let Some(rendered) = self.render_context(&input.retrieval.source) {
            place(SECTION_CONTEXT, rendered);
        }

        place(
            SECTION_RULES,
            Rendered {
                text: GENERAL_RULES.to_string(),
                items_included: 1,
                items_total: 1,
                drops: Vec::new(),
            },
        );

        if let Some(rendered) = input.upload.and_then(|upload| self.render_upload(upload)) {
            place(SECTION_UPLOAD, rendered);
        }

        if let Some(form) = input.form {
            place(SECTION_FORM, render_form(form, &self.limits));
        }

        let total_chars = char_len(&text);
        let estimated_tokens = token::estimate_tokens(&text);
        debug!(
            sections = sections.len(),
            chars = total_chars,
            tokens = estimated_tokens,
            drops = drops.len(),
            "Prompt assembled"
        );

        AssembledPrompt {
            text,
            report: AssemblyReport {
                sections,
                drops,
                retrieval: input.retrieval.outcome.clone(),
                total_chars,
                estimated_tokens,
            },
        }
    }

    fn render_context(&self, source: &ContextSource) -> Option<Rendered> {
        let mut rendered = match source {
            ContextSource::Ranked(results) => format_ranked(results, self.limits.result_chars),
            ContextSource::Documents(documents) => format_documents(documents, &self.limits),
            ContextSource::None => return None,
        };
        if rendered.text.is_empty() {
            return None;
        }
        rendered.text = format!(
            "\n\n=== OFFICIAL DOCUMENTS AND INFORMATION ===\n{}\n\n=== DOCUMENT USAGE INSTRUCTIONS ===\n{}",
            rendered.text, DOCUMENT_INSTRUCTIONS
        );
        Some(rendered)
    }

    fn render_upload(&self, upload: &str) -> Option<Rendered> {
        if upload.trim().is_empty() {
            return None;
        }
        let limited = truncate_chars(upload, self.limits.upload_chars);
        let cut = char_len(upload) - char_len(limited);
        let drops = if cut > 0 {
            vec![DropInfo {
                section: SECTION_UPLOAD.into(),
                items_dropped: 0,
                chars_dropped: cut,
                reason: format!("Uploaded text cut to {} chars", self.limits.upload_chars),
            }]
        } else {
            Vec::new()
        };
        Some(Rendered {
            text: format!(
                "\n\n=== USER UPLOADED DOCUMENT ===\n{limited}\n\n{UPLOAD_INSTRUCTIONS}"
            ),
            items_included: 1,
            items_total: 1,
            drops,
        })
    }
}
