use std::env;
use std::time::Duration;

use clap::{Args, ValueEnum};
use tracing::debug;

use crate::config::{self, ProfileConfig};
use crate::fallback::dispatcher::{DispatchObserver, Dispatcher};
use crate::fallback::groq::{self, GroqClient};
use crate::fallback::vision::VISION_MODELS;
use crate::fallback::{DEFAULT_MAX_WAIT_SECS, FALLBACK_MODELS};
use crate::logging::{self, Verbosity};
use crate::render;

pub const MODELS_ENV: &str = "FC_MODELS";
pub const MAX_WAIT_ENV: &str = "FC_MAX_WAIT";
pub const RATE_LIMIT_RETRIES_ENV: &str = "FC_RATE_LIMIT_RETRIES";
pub const BASE_URL_ENV: &str = "FC_BASE_URL";
pub const OUTPUT_ENV: &str = "FC_OUTPUT";

/// Flags shared by every command that talks to the service.
#[derive(Debug, Args, Clone, Default)]
pub struct CommonArgs {
    /// Profile name from the config file
    #[arg(long, value_name = "NAME")]
    pub profile: Option<String>,
    /// API base URL (OpenAI-compatible)
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,
    /// Upper bound in seconds for one request and for one rate-limit wait
    #[arg(long, value_name = "SECS")]
    pub max_wait: Option<u64>,
    /// Log resolved settings and every attempt on stderr
    #[arg(short, long)]
    pub verbose: bool,
    /// Only print fatal errors on stderr
    #[arg(short, long)]
    pub quiet: bool,
}

impl CommonArgs {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }

    /// Installs logging and loads the selected profile, if any.
    pub fn init(&self) -> Result<ProfileConfig, String> {
        logging::init(self.verbosity());
        match &self.profile {
            Some(name) => config::load_profile(name),
            None => Ok(ProfileConfig::default()),
        }
    }

    pub fn resolve_base_url(&self, profile: &ProfileConfig) -> String {
        self.base_url
            .clone()
            .or_else(|| non_empty_env(BASE_URL_ENV))
            .or_else(|| profile.base_url.clone())
            .unwrap_or_else(|| groq::DEFAULT_BASE_URL.to_string())
    }

    pub fn resolve_max_wait(&self, profile: &ProfileConfig) -> Result<Duration, String> {
        let secs = match self.max_wait {
            Some(secs) => secs,
            None => match parse_env::<u64>(MAX_WAIT_ENV)? {
                Some(secs) => secs,
                None => profile.max_wait.unwrap_or(DEFAULT_MAX_WAIT_SECS),
            },
        };
        if secs == 0 {
            return Err("max wait must be greater than zero seconds.".to_string());
        }
        Ok(Duration::from_secs(secs))
    }
}

/// Flags for commands that dispatch completions.
#[derive(Debug, Args, Clone, Default)]
pub struct DispatchArgs {
    /// Candidate model, tried in the order given (repeatable)
    #[arg(short = 'm', long = "model", value_name = "MODEL")]
    pub models: Vec<String>,
    /// Delayed retries allowed on one rate-limited model before moving on
    /// (unbounded by default)
    #[arg(long, value_name = "N")]
    pub rate_limit_retries: Option<u32>,
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Fully resolved dispatch settings.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub models: Vec<String>,
    /// Whether the models came from the user rather than the built-in list.
    pub models_explicit: bool,
    pub max_wait: Duration,
    /// `None` keeps retrying a model for as long as it advertises a delay.
    pub rate_limit_retries: Option<u32>,
    pub base_url: String,
    pub profile: ProfileConfig,
}

impl DispatchSettings {
    /// Model list for a turn carrying an image.
    pub fn vision_models(&self) -> Vec<String> {
        if self.models_explicit {
            self.models.clone()
        } else {
            VISION_MODELS.iter().map(|model| model.to_string()).collect()
        }
    }
}

impl DispatchArgs {
    /// Resolves settings with precedence CLI > environment > profile > defaults.
    pub fn resolve(&self) -> Result<DispatchSettings, String> {
        let profile = self.common.init()?;

        let explicit = if !self.models.is_empty() {
            Some(clean_models(self.models.iter().map(String::as_str), "--model")?)
        } else if let Some(raw) = non_empty_env(MODELS_ENV) {
            Some(clean_models(raw.split(','), MODELS_ENV)?)
        } else {
            profile.models.clone()
        };
        let models_explicit = explicit.is_some();
        let models = explicit
            .unwrap_or_else(|| FALLBACK_MODELS.iter().map(|model| model.to_string()).collect());

        let rate_limit_retries = match self.rate_limit_retries {
            Some(retries) => Some(retries),
            None => parse_env::<u32>(RATE_LIMIT_RETRIES_ENV)?.or(profile.rate_limit_retries),
        };

        let settings = DispatchSettings {
            models,
            models_explicit,
            max_wait: self.common.resolve_max_wait(&profile)?,
            rate_limit_retries,
            base_url: self.common.resolve_base_url(&profile),
            profile,
        };

        debug!(
            api_key_present = groq::is_api_key_present(),
            models = ?settings.models,
            max_wait_secs = settings.max_wait.as_secs(),
            rate_limit_retries = ?settings.rate_limit_retries,
            base_url = %settings.base_url,
            "resolved dispatch settings"
        );
        Ok(settings)
    }
}

/// Builds a dispatcher against the configured endpoint.
pub fn build_dispatcher(
    settings: &DispatchSettings,
    client: GroqClient,
    observer: impl DispatchObserver + 'static,
) -> Dispatcher<GroqClient> {
    let dispatcher =
        Dispatcher::new(client.with_base_url(&settings.base_url)).with_observer(observer);
    match settings.rate_limit_retries {
        Some(retries) => dispatcher.with_rate_limit_retries(retries),
        None => dispatcher,
    }
}

pub fn groq_client() -> Result<GroqClient, String> {
    GroqClient::from_env().map_err(|err| err.to_string())
}

/// Prints a toast on stderr when a model runs out of quota.
#[derive(Debug, Clone, Copy)]
pub struct ToastObserver {
    quiet: bool,
    color: bool,
}

impl ToastObserver {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            quiet: verbosity == Verbosity::Quiet,
            color: render::stderr_supports_color(),
        }
    }
}

impl DispatchObserver for ToastObserver {
    fn quota_exhausted(&self, model: &str) {
        if !self.quiet {
            eprintln!("{}", render::quota_toast(model, self.color));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    Text,
    Json,
}

impl OutputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }

    fn parse(raw: &str, source: &str) -> Result<Self, String> {
        match raw.trim() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "Invalid {source} '{other}'. Supported values: text, json."
            )),
        }
    }

    /// `--json` > `--output` > environment > profile > text.
    pub fn resolve(
        json: bool,
        output: Option<OutputMode>,
        profile: &ProfileConfig,
    ) -> Result<Self, String> {
        if json {
            return Ok(Self::Json);
        }
        if let Some(output) = output {
            return Ok(output);
        }
        if let Some(raw) = non_empty_env(OUTPUT_ENV) {
            return Self::parse(&raw, OUTPUT_ENV);
        }
        match &profile.output {
            Some(raw) => Self::parse(raw, "profile output"),
            None => Ok(Self::Text),
        }
    }
}

fn clean_models<'a>(
    raw: impl Iterator<Item = &'a str>,
    source: &str,
) -> Result<Vec<String>, String> {
    let models: Vec<String> = raw
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .map(str::to_string)
        .collect();
    if models.is_empty() {
        return Err(format!("{source} does not name any model."));
    }
    Ok(models)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, String> {
    match non_empty_env(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("Invalid {key} '{raw}'. Expected a non-negative integer.")),
    }
}
