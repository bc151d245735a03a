//! Terminal presentation of turns, model tags and notices.

use std::io::{self, IsTerminal};

use owo_colors::OwoColorize;

use crate::fallback::conversation::{Role, Turn};

/// Whether to emit ANSI colours on stdout.
pub fn stdout_supports_color() -> bool {
    std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal()
}

/// Whether to emit ANSI colours on stderr.
pub fn stderr_supports_color() -> bool {
    std::env::var_os("NO_COLOR").is_none() && io::stderr().is_terminal()
}

/// Renders one turn as a `You:` / `Bot:` bubble, followed by the model tag
/// for assistant turns.
pub fn turn(turn: &Turn, color: bool) -> String {
    let speaker = match turn.role {
        Role::User => "You:",
        Role::Assistant => "Bot:",
    };
    let label = match (turn.role, color) {
        (_, false) => speaker.to_string(),
        (Role::User, true) => speaker.blue().bold().to_string(),
        (Role::Assistant, true) => speaker.green().bold().to_string(),
    };

    let mut rendered = format!("{label} {}", turn.content);
    if let Some(model) = &turn.model {
        rendered.push('\n');
        rendered.push_str(&model_tag(model, color));
    }
    rendered
}

pub fn model_tag(model: &str, color: bool) -> String {
    let tag = format!("Model: {model}");
    if color { tag.dimmed().to_string() } else { tag }
}

/// Notice shown when a model is skipped for lack of quota.
pub fn quota_toast(model: &str, color: bool) -> String {
    let text = format!("! {model} daily quota exhausted, switching...");
    if color { text.yellow().to_string() } else { text }
}

pub fn error(message: &str, color: bool) -> String {
    if color { message.red().to_string() } else { message.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_user_turn_has_no_tag() {
        assert_eq!(turn(&Turn::user("hello"), false), "You: hello");
    }

    #[test]
    fn plain_assistant_turn_shows_model() {
        let rendered = turn(&Turn::assistant("hi", "gemma2-9b-it"), false);
        assert_eq!(rendered, "Bot: hi\nModel: gemma2-9b-it");
    }

    #[test]
    fn colored_output_keeps_text() {
        let rendered = turn(&Turn::assistant("hi", "m"), true);
        assert!(rendered.contains("\u{1b}["));
        assert!(rendered.contains("hi"));
        assert!(rendered.contains("Model: m"));
    }

    #[test]
    fn toast_names_the_model() {
        assert_eq!(
            quota_toast("compound-beta", false),
            "! compound-beta daily quota exhausted, switching..."
        );
    }
}
