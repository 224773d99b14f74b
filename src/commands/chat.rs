use std::env;
use std::fs;
use std::io::{self, IsTerminal};
use std::path::Path;
use std::str::FromStr;

use clap::{Args, ValueEnum};
use owo_colors::{OwoColorize, Stream};
use serde_json::{Value, json};
use tracing::debug;

use crate::chat_models::openai::{DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL};
use crate::chat_models::{ChatModelResponse, ChatSettings, OpenAiChat, RetryPolicy};
use crate::commands::CommandError;
use crate::config::{self, ChatConfig, ConfigError, OutputMode};
use crate::logging;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<OutputFormat> for OutputMode {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => OutputMode::Text,
            OutputFormat::Json => OutputMode::Json,
        }
    }
}

#[derive(Debug, Args, Clone, Default)]
pub struct ChatArgs {
    /// Prompt text; read from stdin when omitted or `-`
    pub prompt: Option<String>,

    /// Profile from the config file to apply
    #[arg(long)]
    pub profile: Option<String>,

    #[arg(long)]
    pub model: Option<String>,

    /// System prompt sent before the user message
    #[arg(long)]
    pub system: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long)]
    pub temperature: Option<f64>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Retries for throttled, failed or timed-out requests
    #[arg(long)]
    pub retries: Option<u32>,

    /// Base backoff delay in milliseconds
    #[arg(long)]
    pub retry_delay: Option<u64>,

    #[arg(long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Shorthand for `--output json`
    #[arg(long)]
    pub json: bool,

    /// Print the request that would be sent and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Also write the JSON result to this file
    #[arg(long, value_name = "PATH")]
    pub save: Option<std::path::PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,

    /// Silence all diagnostics except fatal errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Settings for one run after CLI, environment and config are merged.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChat {
    pub settings: ChatSettings,
    pub api_key_env: String,
    pub output: OutputMode,
}

pub async fn run(args: ChatArgs) -> Result<(), CommandError> {
    logging::init(args.verbose, args.quiet);

    let prompt = read_prompt(args.prompt.as_deref())?;
    let file = config::load(args.profile.as_deref())?;
    let resolved = resolve(&args, file, |key| env::var(key).ok())?;

    debug!(
        model = %resolved.settings.model,
        endpoint = %resolved.settings.endpoint(),
        output = %resolved.output,
        api_key_present = api_key_present(&resolved.api_key_env),
        "resolved chat settings"
    );

    if args.dry_run {
        let document = dry_run_document(&resolved, &prompt);
        println!("{}", serde_json::to_string(&document)?);
        if let Some(path) = &args.save {
            save_json(path, &document)?;
        }
        return Ok(());
    }

    let client = OpenAiChat::from_env(&resolved.api_key_env, resolved.settings)?;
    let response = client.chat(&prompt).await;

    render(&response, resolved.output)?;
    if let Some(path) = &args.save {
        save_json(path, &serde_json::to_value(&response)?)?;
    }

    match response.error() {
        Some(error) => Err(CommandError::Response(error.to_string())),
        None => Ok(()),
    }
}

/// Merges settings with precedence CLI > environment > config layer.
pub fn resolve(
    args: &ChatArgs,
    file: ChatConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedChat, CommandError> {
    let env = |key: &str| env(key).map(|value| value.trim().to_string()).filter(|v| !v.is_empty());

    let model = args
        .model
        .clone()
        .or_else(|| env("AIAGENTS_MODEL"))
        .or(file.model)
        .ok_or(CommandError::NoModel)?;
    let base_url = args
        .base_url
        .clone()
        .or_else(|| env("AIAGENTS_BASE_URL"))
        .or(file.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let system = args
        .system
        .clone()
        .or_else(|| env("AIAGENTS_SYSTEM"))
        .or(file.system);

    let temperature = match args.temperature {
        Some(value) => Some(value),
        None => parse_env(&env, "AIAGENTS_TEMPERATURE", "a number")?,
    }
    .or(file.temperature);
    let max_tokens = match args.max_tokens {
        Some(value) => Some(value),
        None => parse_env(&env, "AIAGENTS_MAX_TOKENS", "a positive integer")?,
    }
    .or(file.max_tokens);
    let timeout_secs = match args.timeout {
        Some(value) => Some(value),
        None => parse_env(&env, "AIAGENTS_TIMEOUT", "seconds as an integer")?,
    }
    .or(file.timeout)
    .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let retries = match args.retries {
        Some(value) => Some(value),
        None => parse_env(&env, "AIAGENTS_RETRIES", "a non-negative integer")?,
    }
    .or(file.retries)
    .unwrap_or(0);
    let retry_delay_ms = match args.retry_delay {
        Some(value) => Some(value),
        None => parse_env(&env, "AIAGENTS_RETRY_DELAY", "milliseconds as an integer")?,
    }
    .or(file.retry_delay)
    .unwrap_or(DEFAULT_RETRY_DELAY_MS);

    let output = if args.json {
        OutputMode::Json
    } else if let Some(format) = args.output {
        format.into()
    } else if let Some(value) = env("AIAGENTS_OUTPUT") {
        OutputMode::from_str(&value).map_err(|value| CommandError::InvalidEnv {
            key: "AIAGENTS_OUTPUT",
            value,
            expected: "text or json",
        })?
    } else if let Some(value) = file.output {
        OutputMode::from_str(&value).map_err(|value| ConfigError::InvalidOutput {
            origin: "config".to_string(),
            value,
        })?
    } else {
        OutputMode::Text
    };

    Ok(ResolvedChat {
        settings: ChatSettings {
            model,
            base_url,
            system,
            temperature,
            max_tokens,
            retry: RetryPolicy {
                timeout_secs: (timeout_secs > 0).then_some(timeout_secs),
                retries,
                retry_delay_ms,
            },
        },
        api_key_env: file
            .api_key_env
            .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
        output,
    })
}

fn parse_env<T: FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    expected: &'static str,
) -> Result<Option<T>, CommandError> {
    env(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| CommandError::InvalidEnv {
                    key,
                    value,
                    expected,
                })
        })
        .transpose()
}

fn read_prompt(arg: Option<&str>) -> Result<String, CommandError> {
    let prompt = match arg {
        Some(prompt) if prompt != "-" => prompt.to_string(),
        _ => {
            let stdin = io::stdin();
            if stdin.is_terminal() {
                return Err(CommandError::NoPrompt);
            }
            io::read_to_string(stdin).map_err(CommandError::Stdin)?
        }
    };

    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(CommandError::NoPrompt);
    }
    Ok(prompt.to_string())
}

fn api_key_present(key_env: &str) -> bool {
    env::var(key_env)
        .ok()
        .is_some_and(|value| !value.trim().is_empty())
}

fn dry_run_document(resolved: &ResolvedChat, prompt: &str) -> Value {
    let settings = &resolved.settings;
    json!({
        "dry_run": true,
        "model": settings.model,
        "endpoint": settings.endpoint(),
        "api_key_env": resolved.api_key_env,
        "output": resolved.output.as_str(),
        "messages": settings.messages_for(prompt),
        "request": {
            "temperature": settings.temperature,
            "max_tokens": settings.max_tokens,
            "timeout_secs": settings.retry.timeout_secs,
            "retries": settings.retry.retries,
            "retry_delay_ms": settings.retry.retry_delay_ms,
        },
    })
}

fn render(response: &ChatModelResponse, output: OutputMode) -> Result<(), CommandError> {
    if output == OutputMode::Json {
        println!("{}", serde_json::to_string(response)?);
        return Ok(());
    }

    if !response.message().is_empty() {
        println!("{}", response.message());
    }
    for call in response.function_calls().unwrap_or_default() {
        let line = format!("→ {}", call.signature());
        println!(
            "{}",
            line.if_supports_color(Stream::Stdout, |text| text.cyan())
        );
    }
    Ok(())
}

fn save_json(path: &Path, value: &Value) -> Result<(), CommandError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| CommandError::CreateOutputDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let body = serde_json::to_string(value)?;
    fs::write(path, body).map_err(|source| CommandError::WriteOutput {
        path: path.to_path_buf(),
        source,
    })
}
