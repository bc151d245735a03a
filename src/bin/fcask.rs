use std::process;

use clap::Parser;
use fallchat::LONG_VERSION;
use fallchat::commands::ask::{self, AskArgs};

#[derive(Debug, Parser)]
#[command(
    name = "fcask",
    about = "Ask one question, trying each model until one answers",
    version = LONG_VERSION
)]
struct Cli {
    #[command(flatten)]
    ask: AskArgs,
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    if let Err(err) = ask::run(cli.ask) {
        eprintln!("{err}");
        process::exit(1);
    }
}
