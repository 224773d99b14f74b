use std::process;

use aiagents::VERSION;
use aiagents::commands::chat::{self, ChatArgs};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "agent-chat",
    about = "Chat with an agent through an OpenAI-compatible API",
    version = VERSION
)]
struct Cli {
    #[command(flatten)]
    chat: ChatArgs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = chat::run(cli.chat).await {
        eprintln!("{err}");
        process::exit(1);
    }
}
