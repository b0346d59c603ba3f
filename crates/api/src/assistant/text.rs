use chrono::{DateTime, Utc};
use core::fmt::Write;
use db::Profile;

pub const USAGE: &str = "Please provide a message after !llm. Example: !llm Tell me a joke";
pub const PROCESSING: &str = "Processing your request...";
pub const NO_RESPONSE: &str = "No response generated. Please try again.";
pub const APOLOGY: &str = "Sorry, there was an error processing your request. Please try again later.";
pub const LOCAL_HINT: &str = " Make sure LM Studio is running and the API server is enabled.";
pub const NOT_CONFIGURED: &str = "The assistant is not configured on this bot.";
pub const NO_MEMORY: &str = "No stored information found for your user.";
pub const FORGOTTEN: &str = "Your stored information has been deleted.";
pub const FORGET_FAILED: &str = "Sorry, your stored information could not be deleted right now.";

/// Chat messages are capped at this many characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;
const PREVIEW_CHARS: usize = 100;

/// Cuts `text` to at most `max` characters.
pub fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn timestamp(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(|| String::from("unknown time"), |time| time.format("%Y-%m-%d %H:%M UTC").to_string())
}

/// What the model is told about the user before their prompt.
pub fn context(profile: &Profile) -> String {
    let mut text = String::new();
    if let Some(name) = &profile.username {
        let _ = writeln!(text, "User's name: {name}");
    }

    if !profile.facts.is_empty() {
        text.push_str("Facts about the user:\n");
        for fact in &profile.facts {
            let _ = writeln!(text, "- {fact}");
        }
    }

    if !profile.preferences.is_empty() {
        text.push_str("User preferences:\n");
        for (key, value) in &profile.preferences {
            let _ = writeln!(text, "- {key}: {value}");
        }
    }

    let recent = profile.recent(3);
    if !recent.is_empty() {
        text.push_str("Recent interactions:\n");
        for interaction in recent {
            let _ = writeln!(text, "- [{}] User: {}", timestamp(interaction.timestamp), interaction.message);
            let _ = writeln!(text, "  Bot: {}", interaction.response);
        }
    }

    text.trim_end().into()
}

/// The `!memory` report.
pub fn profile(profile: &Profile) -> String {
    let mut text = String::from("**Your Stored Information**\n\n**Basic Info**\n");
    let _ = writeln!(text, "Username: {}", profile.username.as_deref().unwrap_or("Not stored"));
    let _ = writeln!(text, "Last interaction: {}\n", timestamp(profile.last_interaction));

    text.push_str("**Stored Facts**\n");
    if profile.facts.is_empty() {
        text.push_str("No facts stored.\n");
    }
    for (i, fact) in profile.facts.iter().enumerate() {
        let _ = writeln!(text, "{}. {fact}", i + 1);
    }

    text.push_str("\n**Preferences**\n");
    if profile.preferences.is_empty() {
        text.push_str("No preferences stored.\n");
    }
    for (i, (key, value)) in profile.preferences.iter().enumerate() {
        let _ = writeln!(text, "{}. {key}: {value}", i + 1);
    }

    text.push_str("\n**Recent Interactions (last 3)**\n");
    let recent = profile.recent(3);
    if recent.is_empty() {
        text.push_str("No interactions stored.\n");
    }
    for (i, interaction) in recent.iter().enumerate() {
        let _ = writeln!(text, "**Interaction {} ({})**", i + 1, timestamp(interaction.timestamp));
        let _ = writeln!(text, "You: {}", interaction.message);
        let preview = truncate(&interaction.response, PREVIEW_CHARS);
        let ellipsis = if preview.len() < interaction.response.len() { "..." } else { "" };
        let _ = writeln!(text, "Bot: {preview}{ellipsis}\n");
    }

    text.push_str("To delete your stored information, use the command: `!memory delete`");
    text
}
