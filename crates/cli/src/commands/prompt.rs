//! `civicbot prompt`: run one turn's preparation and print what the model
//! would receive.

use super::{ConversationArgs, open_app};
use civicbot_agent::TurnRequest;
use civicbot_core::{InstitutionProfile, PageContext};
use std::path::{Path, PathBuf};

const DEFAULT_BASE_PROMPT: &str =
    "You are the digital assistant of a public institution. Answer clearly and politely.";

#[derive(Debug, Clone, Default, clap::Args)]
pub struct PromptInputs {
    /// Base instructions placed first in the system message
    #[arg(long)]
    pub base: Option<String>,

    /// Institution profile (JSON)
    #[arg(long)]
    pub institution: Option<PathBuf>,

    /// Text extracted from a file the user attached
    #[arg(long)]
    pub upload: Option<PathBuf>,

    /// Page context with form fields (JSON)
    #[arg(long)]
    pub page: Option<PathBuf>,
}

pub async fn run(
    tenant: &str,
    message: &str,
    conversation: &ConversationArgs,
    inputs: &PromptInputs,
    report: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app().await?;
    let request = build_request(tenant, message, conversation, inputs).await?;
    let turn = app.prepare_turn(request).await?;

    if report {
        println!("{}", serde_json::to_string_pretty(&turn.prompt.report)?);
        return Ok(());
    }

    for message in &turn.messages {
        println!("=== [{}] ===", message.role);
        println!("{}", message.content);
        println!();
    }
    println!(
        "({} chars, ~{} tokens in the system message)",
        turn.prompt.report.total_chars, turn.prompt.report.estimated_tokens
    );
    Ok(())
}

pub async fn build_request(
    tenant: &str,
    message: &str,
    conversation: &ConversationArgs,
    inputs: &PromptInputs,
) -> Result<TurnRequest, Box<dyn std::error::Error>> {
    let base = inputs.base.as_deref().unwrap_or(DEFAULT_BASE_PROMPT);
    let mut request = TurnRequest::new(conversation.key(tenant), message, base);
    request.user = conversation.user();

    if let Some(path) = &inputs.institution {
        let profile: InstitutionProfile = serde_json::from_str(&read(path).await?)?;
        request = request.with_institution(profile);
    }
    if let Some(path) = &inputs.upload {
        request = request.with_upload(read(path).await?);
    }
    if let Some(path) = &inputs.page {
        let page: PageContext = serde_json::from_str(&read(path).await?)?;
        request = request.with_page(page);
    }
    Ok(request)
}

async fn read(path: &Path) -> Result<String, String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_to_chat_and_base_prompt() {
        let request = build_request("12", "Salut", &ConversationArgs::default(), &PromptInputs::default())
            .await
            .unwrap();
        assert_eq!(request.base_prompt, DEFAULT_BASE_PROMPT);
        assert!(request.institution.is_none());
        assert!(request.page.is_none());
    }

    #[tokio::test]
    async fn reads_institution_and_page_files() {
        let dir = tempfile::tempdir().unwrap();
        let institution = dir.path().join("institution.json");
        let page = dir.path().join("page.json");
        tokio::fs::write(&institution, r#"{"name": "Dej", "type": "primarie"}"#)
            .await
            .unwrap();
        tokio::fs::write(&page, r#"{"has_form": true, "form_fields": ["nume"]}"#)
            .await
            .unwrap();

        let inputs = PromptInputs {
            institution: Some(institution),
            page: Some(page),
            ..Default::default()
        };
        let request = build_request("12", "Salut", &ConversationArgs::default(), &inputs)
            .await
            .unwrap();

        assert_eq!(request.institution.unwrap().name.as_deref(), Some("Dej"));
        assert!(request.page.unwrap().has_form);
    }

    #[tokio::test]
    async fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("page.json");
        tokio::fs::write(&page, "not json").await.unwrap();

        let inputs = PromptInputs {
            page: Some(page),
            ..Default::default()
        };
        assert!(
            build_request("12", "x", &ConversationArgs::default(), &inputs)
                .await
                .is_err()
        );
    }
}
