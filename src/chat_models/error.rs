use reqwest::StatusCode;
use thiserror::Error;

/// Failures of a single chat-completions call.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{key_env} is not set in the environment")]
    MissingApiKey { key_env: String },

    #[error("chat request failed after {attempts} attempt(s): {source}")]
    Request {
        #[source]
        source: reqwest::Error,
        attempts: u32,
    },

    #[error("chat API error {status}: {body}")]
    Api {
        status: StatusCode,
        body: String,
        attempts: u32,
    },

    #[error("failed to decode chat response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("chat response did not contain message content or function calls")]
    EmptyResponse,
}

impl ChatError {
    /// Number of HTTP attempts made before the failure, when any were made.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Request { attempts, .. } | Self::Api { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}
