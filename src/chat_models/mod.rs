//! Chat model integration.
//!
//! Holds the response value passed from the chat layer to console commands,
//! plus the OpenAI-compatible client that produces it.

pub mod error;
/// OpenAI-compatible chat-completions client.
pub mod openai;
/// Response value object and function-call descriptors.
pub mod response;
pub mod runtime;

pub use error::ChatError;
pub use openai::{ChatMessage, ChatSettings, OpenAiChat};
pub use response::{ChatModelResponse, FunctionCall, ResponseOptions};
pub use runtime::RetryPolicy;
