use std::sync::LazyLock;

use regex::Regex;

static THINK_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<think>.*?</think>").expect("think pattern is a valid regex")
});

/// Removes `<think>...</think>` reasoning blocks and trims the remainder.
pub fn strip_think_markup(text: &str) -> String {
    THINK_BLOCK.replace_all(text, "").trim().to_string()
}
