//! Console commands exposed by the `aiagents` binaries.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::bootstrap::PublishError;
use crate::chat_models::ChatError;
use crate::config::ConfigError;

pub mod chat;
pub mod config;
pub mod list;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("No prompt provided. Pass a prompt argument or pipe one on stdin.")]
    NoPrompt,

    #[error(
        "No model provided. Use --model, set AIAGENTS_MODEL, or run 'aiagents config publish'."
    )]
    NoModel,

    #[error("Invalid {key} '{value}'. Expected {expected}.")]
    InvalidEnv {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Failed to read prompt from stdin: {0}")]
    Stdin(#[source] io::Error),

    #[error("Failed to create output directory '{}': {source}", path.display())]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write output file '{}': {source}", path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Nothing to publish: the config path could not be resolved. Set AIAGENTS_CONFIG or HOME/XDG_CONFIG_HOME.")]
    NothingToPublish,

    #[error("{0}")]
    Response(String),
}
