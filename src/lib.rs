//! Agent chat against OpenAI-compatible APIs, packaged as a console
//! integration: a startup [`bootstrap`] registry, a publishable config file,
//! and the `chat` command.

pub mod bootstrap;
pub mod chat_models;
pub mod commands;
pub mod config;
pub mod logging;

/// Version string with build metadata, shared by every binary.
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit: ",
    env!("AIAGENTS_GIT_SHA"),
    ", built: ",
    env!("AIAGENTS_BUILD_TS"),
    ")"
);
