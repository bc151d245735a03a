use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::fallback::speech::Language;

pub const CONFIG_ENV: &str = "FC_CONFIG";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub models: Option<Vec<String>>,
    pub max_wait: Option<u64>,
    pub rate_limit_retries: Option<u32>,
    pub base_url: Option<String>,
    pub output: Option<String>,
    pub show_model: Option<bool>,
    pub language: Option<String>,
    pub voice: Option<String>,
}

impl ProfileConfig {
    /// Checks the values that the commands would otherwise reject at run time.
    pub fn validate(&self, name: &str) -> Result<(), String> {
        if let Some(models) = &self.models {
            if models.is_empty() {
                return Err(format!("Profile '{name}' has an empty models list."));
            }
            if models.iter().any(|model| model.trim().is_empty()) {
                return Err(format!("Profile '{name}' contains a blank model name."));
            }
        }

        if self.max_wait == Some(0) {
            return Err(format!("Profile '{name}' max_wait must be greater than zero."));
        }

        if let Some(output) = &self.output {
            if !matches!(output.as_str(), "text" | "json") {
                return Err(format!(
                    "Invalid profile output '{output}'. Supported values: text, json."
                ));
            }
        }

        let language = match &self.language {
            Some(raw) => raw.parse::<Language>().map_err(|_| {
                format!("Invalid profile language '{raw}'. Supported values: english, arabic.")
            })?,
            None => Language::default(),
        };
        if let Some(voice) = &self.voice {
            language.voice(voice)?;
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    profiles: Option<HashMap<String, ProfileConfig>>,
}

pub fn load_profile(name: &str) -> Result<ProfileConfig, String> {
    let path = config_path()?;
    let profiles = read_profiles(&path)?;

    let profile = profiles.get(name).cloned().ok_or_else(|| {
        format!(
            "Profile '{}' not found in config file '{}'.",
            name,
            path.display()
        )
    })?;
    profile.validate(name)?;
    Ok(profile)
}

/// Parses the config file and validates one profile, or all of them.
pub fn validate_config(profile: Option<&str>) -> Result<PathBuf, String> {
    let path = config_path()?;
    let profiles = read_profiles(&path)?;

    match profile {
        Some(name) => {
            let config = profiles.get(name).ok_or_else(|| {
                format!(
                    "Profile '{}' not found in config file '{}'.",
                    name,
                    path.display()
                )
            })?;
            config.validate(name)?;
        }
        None => {
            let mut names: Vec<_> = profiles.keys().collect();
            names.sort();
            for name in names {
                profiles[name].validate(name)?;
            }
        }
    }

    Ok(path)
}

fn read_profiles(path: &Path) -> Result<HashMap<String, ProfileConfig>, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read config file '{}': {err}", path.display()))?;

    let config: ConfigFile = toml::from_str(&raw)
        .map_err(|err| format!("Failed to parse config file '{}': {err}", path.display()))?;

    config.profiles.ok_or_else(|| {
        format!(
            "Config file '{}' does not contain a [profiles] section.",
            path.display()
        )
    })
}

pub fn config_path() -> Result<PathBuf, String> {
    if let Some(path) = non_empty_env(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    if let Some(xdg) = non_empty_env("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join("fallchat").join("config.toml"));
    }

    let home = non_empty_env("HOME").ok_or_else(|| {
        format!("Cannot resolve config path: set {CONFIG_ENV} or HOME/XDG_CONFIG_HOME.")
    })?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("fallchat")
        .join("config.toml"))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
