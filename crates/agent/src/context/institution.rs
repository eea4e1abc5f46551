//! Institution section of the system prompt.

use crate::context::assembler::{DropInfo, Rendered, SECTION_INSTITUTION};
use civicbot_config::PromptConfig;
use civicbot_core::InstitutionProfile;
use civicbot_core::institution::{DetailLevel, Fee, ResponsePolicies, Tone};
use civicbot_core::text::char_len;

/// Render `profile`, or `None` when it carries nothing to say.
pub(crate) fn render_institution(
    profile: &InstitutionProfile,
    limits: &PromptConfig,
) -> Option<Rendered> {
    if *profile == InstitutionProfile::default() {
        return None;
    }

    let mut out = String::from("\n\n=== INSTITUTION ===\n");
    let mut rendered = Rendered::default();

    if let Some(name) = profile.name.as_deref().filter(|n| !n.trim().is_empty()) {
        out.push_str(&format!(
            "You are the digital assistant of the {} {}.\n",
            profile.kind.label(),
            name.trim()
        ));
    }

    let contact = profile.contact.lines();
    if !contact.is_empty() {
        out.push_str("\nContact details:\n");
        for (label, value) in contact {
            out.push_str(&format!("{label}: {value}\n"));
        }
    }

    if let Some(hours) = &profile.working_hours {
        let days = hours.days();
        if !days.is_empty() {
            out.push_str("\nWorking hours:\n");
            for (day, hours) in days {
                out.push_str(&format!("- {day}: {hours}\n"));
            }
        }
    }

    push_capped_list(
        &mut out,
        &mut rendered,
        "Available services",
        "services",
        &profile.services,
        limits.max_services,
        |s| s.clone(),
    );
    push_capped_list(
        &mut out,
        &mut rendered,
        "Fees and charges",
        "fees",
        &profile.fees,
        limits.max_fees,
        fee_line,
    );
    push_capped_list(
        &mut out,
        &mut rendered,
        "Main responsibilities",
        "responsibilities",
        &profile.responsibilities,
        limits.max_responsibilities,
        |r| r.clone(),
    );

    if let Some(policies) = profile.policies.as_ref().filter(|p| !p.is_empty()) {
        out.push_str("\nResponse policies:\n");
        push_policies(&mut out, policies);
    }

    rendered.text = out;
    Some(rendered)
}

/// `title:` followed by the first `max` items as `- item`, and an
/// `... and N more {noun}` line when the list is longer.
fn push_capped_list<T>(
    out: &mut String,
    rendered: &mut Rendered,
    title: &str,
    noun: &str,
    items: &[T],
    max: usize,
    line: impl Fn(&T) -> String,
) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("\n{title}:\n"));
    for item in items.iter().take(max) {
        out.push_str(&format!("- {}\n", line(item)));
    }

    let shown = items.len().min(max);
    rendered.items_included += shown;
    rendered.items_total += items.len();

    let hidden = items.len() - shown;
    if hidden > 0 {
        out.push_str(&format!("... and {hidden} more {noun}\n"));
        rendered.drops.push(DropInfo {
            section: SECTION_INSTITUTION.into(),
            items_dropped: hidden,
            chars_dropped: items[shown..].iter().map(|i| char_len(&line(i))).sum(),
            reason: format!("Only the first {max} {noun} are listed"),
        });
    }
}

fn fee_line(fee: &Fee) -> String {
    let mut line = format!("{}: {}", fee.service, fee.amount);
    if let Some(description) = fee.description.as_deref().filter(|d| !d.trim().is_empty()) {
        line.push_str(&format!(" ({description})"));
    }
    line
}

fn push_policies(out: &mut String, policies: &ResponsePolicies) {
    if let Some(tone) = &policies.tone {
        let sentence = match tone {
            Tone::Formal => "Use a formal, respectful tone and address people politely.",
            Tone::Simple => "Use a simple, accessible tone that anyone can understand.",
            Tone::Friendly => "Use a friendly, warm tone while staying professional.",
            Tone::Professional => "Use a clear, professional tone without excessive familiarity.",
            Tone::Other(custom) => custom.as_str(),
        };
        out.push_str(&format!("- Tone: {sentence}\n"));
    }

    if let Some(level) = &policies.detail_level {
        let sentence = match level {
            DetailLevel::Short => "Give concise, direct answers without excessive detail.",
            DetailLevel::Medium => {
                "Give balanced answers with the essential information and a few relevant details."
            }
            DetailLevel::Detailed => "Give detailed, complete answers with all relevant information.",
            DetailLevel::Other(custom) => custom.as_str(),
        };
        out.push_str(&format!("- Detail level: {sentence}\n"));
    }

    if let Some(code) = policies.language.as_deref().filter(|l| !l.trim().is_empty()) {
        out.push_str(&format!("- Language: {}\n", language_name(code)));
    }
}

fn language_name(code: &str) -> &str {
    match code.trim() {
        "ro" => "Romanian",
        "en" => "English",
        "hu" => "Hungarian",
        "de" => "German",
        other => other,
    }
}
