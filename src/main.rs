use std::io;
use std::iter;
use std::process;

use aiagents::VERSION;
use aiagents::bootstrap::{self, CHAT_COMMAND, Registry};
use aiagents::commands::chat::{self, ChatArgs};
use aiagents::commands::config::{self as config_command, ConfigArgs};
use aiagents::commands::{CommandError, list};
use aiagents::{config, logging};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells};

const ROOT_HELP_EXAMPLES: &str = "Examples:\n  aiagents config publish\n  aiagents chat \"Summarize the Rust ownership model\"\n  echo \"2+2?\" | aiagents chat --model gpt-4o-mini --json\n  aiagents completion bash > ~/.local/share/bash-completion/completions/aiagents";

const CHAT_HELP_EXAMPLES: &str = "Examples:\n  aiagents chat \"What is the capital of Portugal?\"\n  aiagents chat --profile precise --system \"Answer in one word\" \"2+2?\"\n  aiagents chat --model gpt-4o-mini --dry-run --json \"Explain retries\"";

#[derive(Debug, Parser)]
#[command(
    name = "aiagents",
    about = "Agent chat tools for OpenAI-compatible APIs",
    version = VERSION,
    after_help = ROOT_HELP_EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = CHAT_COMMAND.about, version = VERSION, after_help = CHAT_HELP_EXAMPLES)]
    Chat(ChatArgs),
    #[command(about = "Publish or check the config file")]
    Config(ConfigArgs),
    #[command(about = "List registered commands")]
    List,
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
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, "aiagents", &mut io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, "aiagents", &mut io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, "aiagents", &mut io::stdout()),
    }
}

fn boot() -> Registry {
    let mut registry = Registry::new();
    match config::config_path() {
        Ok(destination) => bootstrap::boot(&mut registry, destination, true),
        Err(_) => registry.register(iter::empty(), &[CHAT_COMMAND], true),
    }
    registry
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let (verbose, quiet) = match &cli.command {
        Commands::Chat(args) => (args.verbose, args.quiet),
        _ => (false, false),
    };
    logging::init(verbose, quiet);
    let registry = boot();

    let result: Result<(), CommandError> = match cli.command {
        Commands::Chat(args) => chat::run(args).await,
        Commands::Config(args) => config_command::run(args, &registry),
        Commands::List => {
            list::run(&registry);
            Ok(())
        }
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
