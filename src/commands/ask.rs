use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::Args;
use serde_json::json;
use tracing::debug;

use crate::commands::options::{self, DispatchArgs, OutputMode, ToastObserver};
use crate::fallback::conversation::{Turn, to_messages};
use crate::fallback::vision::{self, VISION_MAX_COMPLETION_TOKENS};
use crate::render;

#[derive(Debug, Args, Clone)]
pub struct AskArgs {
    /// Prompt text; read from stdin when omitted
    pub prompt: Option<String>,
    #[command(flatten)]
    pub dispatch: DispatchArgs,
    /// Attach an image (jpg/jpeg/png) to the question
    #[arg(long, value_name = "PATH")]
    pub image: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum)]
    pub output: Option<OutputMode>,
    /// Shorthand for --output json
    #[arg(long)]
    pub json: bool,
    /// Print the model that answered on stderr
    #[arg(long)]
    pub show_model: bool,
    /// Print the resolved request instead of sending it
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: AskArgs) -> Result<(), String> {
    let settings = args.dispatch.resolve()?;
    let output = OutputMode::resolve(args.json, args.output, &settings.profile)?;
    let quiet = args.dispatch.common.quiet;
    let show_model = args.show_model || settings.profile.show_model.unwrap_or(false);

    let prompt = read_prompt(args.prompt)?;
    if prompt.is_empty() && args.image.is_none() {
        return Err("No prompt provided. Pass PROMPT or pipe it on stdin.".to_string());
    }

    let mut turn = Turn::user(prompt);
    let (models, max_completion_tokens) = match &args.image {
        Some(path) => {
            turn = turn.with_image(vision::image_data_url(path)?);
            (settings.vision_models(), Some(VISION_MAX_COMPLETION_TOKENS))
        }
        None => (settings.models.clone(), None),
    };
    let conversation = vec![turn];

    if args.dry_run {
        let plan = json!({
            "dry_run": true,
            "endpoint": format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            "models": models,
            "max_wait_secs": settings.max_wait.as_secs(),
            "rate_limit_retries": settings.rate_limit_retries,
            "max_completion_tokens": max_completion_tokens,
            "output": output.as_str(),
            "messages": to_messages(&conversation),
        });
        println!("{plan}");
        return Ok(());
    }

    let client = options::groq_client()?.with_max_completion_tokens(max_completion_tokens);
    let dispatcher = options::build_dispatcher(
        &settings,
        client,
        ToastObserver::new(args.dispatch.common.verbosity()),
    );

    debug!(endpoint = %dispatcher.service().chat_completions_url(), "sending question");
    let outcome = dispatcher
        .dispatch(&conversation, models.as_slice(), settings.max_wait)
        .map_err(|err| err.to_string())?;

    match output {
        OutputMode::Text => println!("{}", outcome.text),
        OutputMode::Json => println!(
            "{}",
            json!({ "text": outcome.text, "model": outcome.model_used })
        ),
    }
    if show_model && !quiet && output == OutputMode::Text {
        eprintln!(
            "{}",
            render::model_tag(&outcome.model_used, render::stderr_supports_color())
        );
    }

    Ok(())
}

/// The positional prompt wins; otherwise piped stdin is used.
fn read_prompt(prompt: Option<String>) -> Result<String, String> {
    if let Some(prompt) = prompt {
        return Ok(prompt.trim().to_string());
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(String::new());
    }

    let mut buffer = String::new();
    stdin
        .lock()
        .read_to_string(&mut buffer)
        .map_err(|err| format!("Failed to read prompt from stdin: {err}"))?;
    Ok(buffer.trim().to_string())
}
