//! Flat-text prompt rendering.

use crate::sessions::Turn;
use std::fmt::Write;

const DEFAULT_SPEAKER: &str = "User";

/// Render prior turns plus the new message into one completion prompt.
///
/// Every turn becomes a `User:` line and a `Bot:` line, oldest first. The new
/// message is attributed to `user_name` (or `User` when absent or empty) and the
/// prompt ends with an empty `Bot: ` cue for the model to complete. Nothing is
/// escaped or truncated.
pub fn build_prompt(history: &[Turn], user_input: &str, user_name: Option<&str>) -> String {
    let mut prompt = String::new();
    for turn in history {
        let _ = write!(prompt, "User: {}\nBot: {}\n", turn.user, turn.bot);
    }

    let speaker = user_name
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_SPEAKER);
    let _ = write!(prompt, "{speaker}: {user_input}\nBot: ");
    prompt
}
