//! Text-to-speech model and voice catalog.

use std::fmt;
use std::str::FromStr;

/// Longest input accepted by the speech endpoint, in characters.
pub const MAX_INPUT_CHARS: usize = 10_000;

const ENGLISH_VOICES: &[&str] = &[
    "Arista-PlayAI",
    "Atlas-PlayAI",
    "Basil-PlayAI",
    "Briggs-PlayAI",
    "Calum-PlayAI",
    "Celeste-PlayAI",
    "Cheyenne-PlayAI",
    "Chip-PlayAI",
    "Cillian-PlayAI",
    "Deedee-PlayAI",
    "Fritz-PlayAI",
    "Gail-PlayAI",
    "Indigo-PlayAI",
    "Mamaw-PlayAI",
    "Mason-PlayAI",
    "Mikail-PlayAI",
    "Mitch-PlayAI",
    "Quinn-PlayAI",
    "Thunder-PlayAI",
];

const ARABIC_VOICES: &[&str] = &["Ahmad-PlayAI", "Amira-PlayAI", "Khalid-PlayAI", "Nasser-PlayAI"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    Arabic,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Arabic => "arabic",
        }
    }

    pub fn model(self) -> &'static str {
        match self {
            Self::English => "playai-tts",
            Self::Arabic => "playai-tts-arabic",
        }
    }

    pub fn voices(self) -> &'static [&'static str] {
        match self {
            Self::English => ENGLISH_VOICES,
            Self::Arabic => ARABIC_VOICES,
        }
    }

    /// Second voice in the list, which is what the picker preselects.
    pub fn default_voice(self) -> &'static str {
        self.voices()[1]
    }

    /// Resolves a voice name case-insensitively to its canonical spelling.
    pub fn voice(self, name: &str) -> Result<&'static str, String> {
        self.voices()
            .iter()
            .copied()
            .find(|voice| voice.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| {
                format!(
                    "Unknown {} voice '{}'. Supported values: {}.",
                    self.as_str(),
                    name,
                    self.voices().join(", ")
                )
            })
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "english" | "en" => Ok(Self::English),
            "arabic" | "ar" => Ok(Self::Arabic),
            _ => Err(format!(
                "Invalid language '{value}'. Supported values: english, arabic."
            )),
        }
    }
}

/// Trims the text and truncates it to [`MAX_INPUT_CHARS`] characters.
pub fn prepare_input(text: &str) -> Result<String, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("No text provided. Pass TEXT or pipe it on stdin.".to_string());
    }
    Ok(trimmed.chars().take(MAX_INPUT_CHARS).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn languages_map_to_their_models() {
        assert_eq!(Language::English.model(), "playai-tts");
        assert_eq!(Language::Arabic.model(), "playai-tts-arabic");
        assert_eq!("ar".parse::<Language>(), Ok(Language::Arabic));
        assert!("klingon".parse::<Language>().is_err());
    }

    #[test]
    fn default_voice_is_second_entry() {
        assert_eq!(Language::English.default_voice(), "Atlas-PlayAI");
        assert_eq!(Language::Arabic.default_voice(), "Amira-PlayAI");
    }

    #[test]
    fn voice_lookup_is_case_insensitive_and_language_scoped() {
        assert_eq!(Language::English.voice("celeste-playai"), Ok("Celeste-PlayAI"));
        let err = Language::English
            .voice("Khalid-PlayAI")
            .expect_err("arabic voice is not english");
        assert!(err.contains("Unknown english voice 'Khalid-PlayAI'"));
    }

    #[test]
    fn input_is_trimmed_and_truncated() {
        assert_eq!(prepare_input("  hi  "), Ok("hi".to_string()));
        let long = "é".repeat(MAX_INPUT_CHARS + 50);
        assert_eq!(
            prepare_input(&long).map(|text| text.chars().count()),
            Ok(MAX_INPUT_CHARS)
        );
        assert!(prepare_input("   ").is_err());
    }
}
