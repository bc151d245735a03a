use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use tracing::debug;

use crate::commands::options::{self, DispatchArgs, ToastObserver};
use crate::fallback::conversation::{Conversation, Turn};
use crate::fallback::dispatcher::{DispatchError, Dispatcher};
use crate::fallback::service::CompletionService;
use crate::fallback::vision::{self, IMAGE_PLACEHOLDER};
use crate::render;

const SESSION_HELP: &str = "Type a message and press Enter. Commands: /image PATH [text], /reset, /exit.";

#[derive(Debug, Args, Clone)]
pub struct ChatArgs {
    #[command(flatten)]
    pub dispatch: DispatchArgs,
    /// Disable coloured output
    #[arg(long)]
    pub no_color: bool,
}

/// One parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Say { text: &'a str, image: Option<PathBuf> },
    Reset,
    Exit,
    Blank,
}

fn parse_input(line: &str) -> Result<Input<'_>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Blank);
    }
    let image_args = line
        .strip_prefix("/image")
        .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace));
    if let Some(rest) = image_args {
        let rest = rest.trim_start();
        let (path, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if path.is_empty() {
            return Err("Usage: /image PATH [text]".to_string());
        }
        return Ok(Input::Say {
            text: text.trim(),
            image: Some(PathBuf::from(path)),
        });
    }
    match line {
        "/reset" => Ok(Input::Reset),
        "/exit" | "/quit" => Ok(Input::Exit),
        _ if line.starts_with('/') => Err(format!("Unknown command '{line}'. {SESSION_HELP}")),
        _ => Ok(Input::Say { text: line, image: None }),
    }
}

/// In-memory conversation driven through a dispatcher.
pub struct ChatSession<'d, S> {
    dispatcher: &'d Dispatcher<S>,
    models: Vec<String>,
    vision_models: Vec<String>,
    max_wait: Duration,
    history: Conversation,
}

impl<'d, S: CompletionService> ChatSession<'d, S> {
    pub fn new(
        dispatcher: &'d Dispatcher<S>,
        models: Vec<String>,
        vision_models: Vec<String>,
        max_wait: Duration,
    ) -> Self {
        Self {
            dispatcher,
            models,
            vision_models,
            max_wait,
            history: Conversation::new(),
        }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Sends one user turn with the whole history and records the reply.
    ///
    /// On failure the user turn is dropped again so the history keeps
    /// alternating. The image payload is only sent with its own turn.
    pub fn send(&mut self, text: &str, image: Option<String>) -> Result<&Turn, DispatchError> {
        let has_image = image.is_some();
        let mut turn = Turn::user(text);
        if let Some(url) = image {
            turn = turn.with_image(url);
        }
        self.history.push(turn);

        let models = if has_image { &self.vision_models } else { &self.models };
        let result = self
            .dispatcher
            .dispatch(&self.history, models.as_slice(), self.max_wait);
        match result {
            Ok(outcome) => {
                if let Some(last) = self.history.last_mut() {
                    last.image = None;
                    if last.content.is_empty() {
                        last.content = IMAGE_PLACEHOLDER.to_string();
                    }
                }
                self.history
                    .push(Turn::assistant(outcome.text, outcome.model_used));
                Ok(&self.history[self.history.len() - 1])
            }
            Err(err) => {
                self.history.pop();
                Err(err)
            }
        }
    }
}

pub fn run(args: ChatArgs) -> Result<(), String> {
    let settings = args.dispatch.resolve()?;
    let color = !args.no_color && render::stdout_supports_color();
    let err_color = !args.no_color && render::stderr_supports_color();

    let dispatcher = options::build_dispatcher(
        &settings,
        options::groq_client()?,
        ToastObserver::new(args.dispatch.common.verbosity()),
    );
    let mut session = ChatSession::new(
        &dispatcher,
        settings.models.clone(),
        settings.vision_models(),
        settings.max_wait,
    );

    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    let mut stdout = io::stdout();
    if interactive {
        println!("{SESSION_HELP}");
    }

    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            print!("> ");
            stdout.flush().map_err(|err| err.to_string())?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.map_err(|err| format!("Failed to read from stdin: {err}"))?;

        let (text, image) = match parse_input(&line) {
            Ok(Input::Blank) => continue,
            Ok(Input::Exit) => break,
            Ok(Input::Reset) => {
                session.reset();
                debug!("conversation reset");
                continue;
            }
            Ok(Input::Say { text, image }) => (text.to_string(), image),
            Err(message) => {
                eprintln!("{}", render::error(&message, err_color));
                continue;
            }
        };

        let image = match image.map(|path| vision::image_data_url(&path)).transpose() {
            Ok(image) => image,
            Err(message) => {
                eprintln!("{}", render::error(&message, err_color));
                continue;
            }
        };

        if !interactive {
            let shown: &str = if text.is_empty() { IMAGE_PLACEHOLDER } else { &text };
            println!("{}", render::turn(&Turn::user(shown), color));
        }

        match session.send(&text, image) {
            Ok(reply) => println!("{}", render::turn(reply, color)),
            Err(err) => eprintln!("{}", render::error(&err.to_string(), err_color)),
        }
    }

    debug!(turns = session.history().len(), "chat session ended");
    Ok(())
}
