//! Form-field section: the fields of the form on the user's page, followed
//! by instructions to answer with JSON only.

use crate::context::assembler::{DropInfo, Rendered, SECTION_FORM};
use civicbot_config::PromptConfig;
use civicbot_core::text::{char_len, truncate_chars};
use civicbot_core::{FormContext, FormField};

pub const JSON_INSTRUCTIONS: &str = "JSON ONLY: reply with valid JSON and no other text. Keys: \
normalize field names (lowercase, no diacritics, spaces→_). SELECT fields: use only values from \
the listed options. REQUIRED (*): always fill in. Format: {\"key\":\"value\"} - pure JSON only.";

pub(crate) fn render_form(form: &FormContext, limits: &PromptConfig) -> Rendered {
    let (listed, total, cap) = match form {
        FormContext::Detailed(fields) => (
            fields
                .iter()
                .take(limits.form_fields)
                .map(|f| describe_field(f, limits.form_options))
                .collect::<Vec<_>>(),
            fields.len(),
            limits.form_chars,
        ),
        FormContext::Names(names) => (
            names.iter().take(limits.form_fields).cloned().collect(),
            names.len(),
            limits.form_simple_chars,
        ),
    };

    let joined = listed.join(", ");
    let fields = if char_len(&joined) > cap {
        format!("{}...", truncate_chars(&joined, cap))
    } else {
        joined.clone()
    };

    let mut drops = Vec::new();
    let chars_cut = char_len(&joined).saturating_sub(cap);
    if total > listed.len() || chars_cut > 0 {
        drops.push(DropInfo {
            section: SECTION_FORM.into(),
            items_dropped: total - listed.len(),
            chars_dropped: chars_cut,
            reason: format!("At most {} fields in {cap} chars", limits.form_fields),
        });
    }

    Rendered {
        text: format!("\n\n=== FORM FIELDS ===\n{fields}\n\n{JSON_INSTRUCTIONS}"),
        items_included: listed.len(),
        items_total: total,
        drops,
    }
}

/// `name [opt1, opt2...] *`: the first `max_options` options, `...` when
/// there are more, and `*` for required fields.
fn describe_field(field: &FormField, max_options: usize) -> String {
    let mut info = field.name.clone();
    if !field.options.is_empty() {
        let mut options = field
            .options
            .iter()
            .take(max_options)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if field.options.len() > max_options {
            options.push_str("...");
        }
        info.push_str(&format!(" [{options}]"));
    }
    if field.required {
        info.push_str(" *");
    }
    info
}
