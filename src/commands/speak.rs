use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Args;
use serde_json::json;
use tracing::debug;

use crate::commands::options::{self, CommonArgs};
use crate::fallback::service::ServiceError;
use crate::fallback::speech::{self, Language};

#[derive(Debug, Args, Clone)]
pub struct SpeakArgs {
    /// Text to voice; read from stdin when omitted
    pub text: Option<String>,
    /// Voice language (english, arabic)
    #[arg(long, value_name = "LANG")]
    pub language: Option<Language>,
    /// Voice name for the chosen language
    #[arg(long, value_name = "VOICE")]
    pub voice: Option<String>,
    /// Output WAV file (default: tts_<unix-seconds>.wav)
    #[arg(short, long, value_name = "PATH")]
    pub out: Option<PathBuf>,
    /// Print the resolved request instead of sending it
    #[arg(long)]
    pub dry_run: bool,
    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn run(args: SpeakArgs) -> Result<(), String> {
    let profile = args.common.init()?;

    let language = match args.language {
        Some(language) => language,
        None => match &profile.language {
            Some(raw) => raw.parse()?,
            None => Language::default(),
        },
    };
    let voice = match args.voice.as_deref().or(profile.voice.as_deref()) {
        Some(name) => language.voice(name)?,
        None => language.default_voice(),
    };

    let input = speech::prepare_input(&read_text(args.text)?)?;
    let out = args.out.unwrap_or_else(default_output_path);
    let base_url = args.common.resolve_base_url(&profile);
    let max_wait = args.common.resolve_max_wait(&profile)?;

    if args.dry_run {
        let plan = json!({
            "dry_run": true,
            "endpoint": format!("{}/audio/speech", base_url.trim_end_matches('/')),
            "language": language.as_str(),
            "model": language.model(),
            "voice": voice,
            "chars": input.chars().count(),
            "out": out.display().to_string(),
        });
        println!("{plan}");
        return Ok(());
    }

    let client = options::groq_client()?.with_base_url(base_url);
    debug!(
        endpoint = %client.speech_url(),
        model = language.model(),
        voice,
        "sending speech request"
    );

    let audio = client
        .synthesize(language.model(), voice, &input, max_wait)
        .map_err(|err| match err {
            ServiceError::RateLimited { .. } => format!(
                "Daily TTS quota exhausted for {}; please try again tomorrow.",
                language.model()
            ),
            other => format!("Speech request failed: {other}"),
        })?;

    fs::write(&out, &audio)
        .map_err(|err| format!("Failed to write audio file '{}': {err}", out.display()))?;
    println!("{}", out.display());
    Ok(())
}

fn default_output_path() -> PathBuf {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    PathBuf::from(format!("tts_{secs}.wav"))
}

fn read_text(text: Option<String>) -> Result<String, String> {
    if let Some(text) = text {
        return Ok(text);
    }
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(String::new());
    }
    let mut buffer = String::new();
    stdin
        .lock()
        .read_to_string(&mut buffer)
        .map_err(|err| format!("Failed to read text from stdin: {err}"))?;
    Ok(buffer)
}
