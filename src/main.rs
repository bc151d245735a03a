use std::io;
use std::process;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};
use fallchat::LONG_VERSION;
use fallchat::commands::ask::{self, AskArgs};
use fallchat::commands::chat::{self, ChatArgs};
use fallchat::commands::config::{self, ConfigArgs};
use fallchat::commands::speak::{self, SpeakArgs};

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  fallchat ask \"What is Rust's ownership model?\"\n  echo \"2+2?\" | fallchat ask --model gemma2-9b-it --model llama3-70b-8192\n  fallchat chat --profile fast\n  fallchat speak --language arabic --voice Amira-PlayAI \"marhaba\"\n  fallchat config check\n  fallchat completion bash > ~/.local/share/bash-completion/completions/fallchat";

const ASK_HELP_EXAMPLES: &str = "Examples:\n  fallchat ask \"2+2?\"\n  fallchat ask --model compound-beta --model gemma2-9b-it --max-wait 20 \"Explain retries\"\n  fallchat ask --image photo.jpg \"What is in this picture?\"\n  fallchat ask --dry-run --json \"Explain retries\"";

#[derive(Debug, Parser)]
#[command(
    name = "fallchat",
    about = "Chat with hosted LLMs, falling back across models on quota limits",
    version = LONG_VERSION,
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(
        about = "Ask one question, trying each model until one answers",
        version = LONG_VERSION,
        after_help = ASK_HELP_EXAMPLES
    )]
    Ask(AskArgs),
    #[command(about = "Start an interactive chat session")]
    Chat(ChatArgs),
    #[command(about = "Turn text into speech and save it as WAV")]
    Speak(SpeakArgs),
    #[command(about = "Manage local config")]
    Config(ConfigArgs),
    #[command(about = "Generate shell completion script")]
    Completion {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn print_completion(shell: CompletionShell) {
    let mut cmd = Cli::command();
    let out = &mut io::stdout();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "fallchat", out),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "fallchat", out),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "fallchat", out),
    }
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ask(args) => ask::run(args),
        Commands::Chat(args) => chat::run(args),
        Commands::Speak(args) => speak::run(args),
        Commands::Config(args) => config::run(args),
        Commands::Completion { shell } => {
            print_completion(shell);
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("{err}");
        process::exit(1);
    }
}
