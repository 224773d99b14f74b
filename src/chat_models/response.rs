use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Function call requested by a chat model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Provider-generated call id, empty when the provider omits it.
    pub id: String,
    /// Function name.
    pub name: String,
    /// Decoded arguments payload.
    pub arguments: Value,
}

impl FunctionCall {
    /// Builds a call from its parts.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Renders the call as `name(arguments)` for terminal output.
    pub fn signature(&self) -> String {
        let arguments = match &self.arguments {
            Value::Null => String::new(),
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        };
        format!("{}({arguments})", self.name)
    }
}

/// Optional parts of a [`ChatModelResponse`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseOptions {
    pub function_calls: Option<Vec<FunctionCall>>,
    pub error: Option<String>,
    pub metadata: HashMap<String, Value>,
}

/// Reply produced by a chat model invocation.
///
/// Fields are fixed at construction. A populated `error` means the call did
/// not complete cleanly; `message` may still carry partial content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatModelResponse {
    message: String,
    function_calls: Option<Vec<FunctionCall>>,
    error: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

impl ChatModelResponse {
    /// Creates a response carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_options(message, ResponseOptions::default())
    }

    /// Creates a response with every field supplied explicitly.
    pub fn with_options(message: impl Into<String>, options: ResponseOptions) -> Self {
        let ResponseOptions {
            function_calls,
            error,
            metadata,
        } = options;
        Self {
            message: message.into(),
            function_calls,
            error,
            metadata,
        }
    }

    /// Creates an empty-message response describing a failed call.
    pub fn failed(error: impl Into<String>) -> Self {
        Self::with_options(
            "",
            ResponseOptions {
                error: Some(error.into()),
                ..ResponseOptions::default()
            },
        )
    }

    /// Replaces the metadata map, keeping every other field.
    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn function_calls(&self) -> Option<&[FunctionCall]> {
        self.function_calls.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Consumes the response and returns its fields.
    pub fn into_parts(self) -> (String, ResponseOptions) {
        (
            self.message,
            ResponseOptions {
                function_calls: self.function_calls,
                error: self.error,
                metadata: self.metadata,
            },
        )
    }
}
