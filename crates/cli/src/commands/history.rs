//! `civicbot history`: show or clear one conversation.

use super::{ConversationArgs, open_app};

pub async fn run(
    tenant: &str,
    conversation: &ConversationArgs,
    clear: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = open_app().await?;
    let key = conversation.key(tenant);
    let user = conversation.user();

    if clear {
        app.conversations().clear(&key, user).await?;
        println!("🗑️  Cleared {key}");
        return Ok(());
    }

    let history = app.conversations().get_history(&key, user).await?;
    if history.is_empty() {
        println!("   No messages in {key}.");
        return Ok(());
    }

    let budget = app.conversations().budget();
    let chars: usize = history.iter().map(|m| m.char_len()).sum();
    println!("💬 {key}: {} message(s), {chars} chars (budget {budget})", history.len());
    println!();
    for message in &history {
        println!("[{}] {}", message.role, message.content);
    }
    Ok(())
}
