use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

/// Failure of a single tool invocation.
///
/// The display text is what the assistant sees in the `error` field of the
/// tool output, so it is written for the end user.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Argumentos inválidos para {tool}: {reason}")]
    InvalidArguments { tool: &'static str, reason: String },
    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, input: Value) -> Result<Value, ToolError>;
}

/// Decodes a tool's argument object into its typed shape.
pub fn parse_arguments<T: DeserializeOwned>(tool: &'static str, input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input)
        .map_err(|error| ToolError::InvalidArguments { tool, reason: error.to_string() })
}

pub fn error_payload(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names = self.tools.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs the named tool and always yields a payload for the assistant.
    ///
    /// Unknown names and tool failures become `{"error": ...}` payloads.
    pub async fn dispatch(&self, name: &str, input: Value) -> Value {
        let Some(tool) = self.tools.get(name) else {
            warn!(event_name = "agent.tool.unknown", tool = name, "assistant requested an unregistered tool");
            return error_payload(format!("Ferramenta desconhecida: {name}"));
        };

        match tool.execute(input).await {
            Ok(output) => output,
            Err(error) => {
                warn!(event_name = "agent.tool.failed", tool = name, error = %error, "tool returned an error payload");
                error_payload(error.to_string())
            }
        }
    }
}
