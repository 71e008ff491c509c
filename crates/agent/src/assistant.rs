//! Hosted-assistant protocol: threads, messages, runs and tool outputs.

use async_trait::async_trait;
use lucia_core::domain::conversation::{RunId, RunStatus, ThreadId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("assistant request failed: {0}")]
    Transport(String),
    #[error("assistant API answered {status}: {message}")]
    Api { status: u16, message: String },
    #[error("could not decode assistant response: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub status: RunStatus,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<Value>,
}

impl Run {
    /// Tool calls the run is waiting on; empty unless it requires action.
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        self.required_action
            .as_ref()
            .map(|action| action.submit_tool_outputs.tool_calls.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RequiredAction {
    pub submit_tool_outputs: SubmitToolOutputs,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SubmitToolOutputs {
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON text exactly as produced by the model.
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub run_id: Option<RunId>,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

impl ThreadMessage {
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|part| match part {
            MessageContent::Text { text } => Some(text.value.as_str()),
            MessageContent::Other => None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TextContent {
    pub value: String,
}

#[async_trait]
pub trait AssistantService: Send + Sync {
    async fn create_thread(&self) -> Result<ThreadId, AssistantError>;

    async fn add_user_message(&self, thread_id: &ThreadId, content: &str)
        -> Result<(), AssistantError>;

    async fn create_run(&self, thread_id: &ThreadId, assistant_id: &str)
        -> Result<Run, AssistantError>;

    async fn get_run(&self, thread_id: &ThreadId, run_id: &RunId) -> Result<Run, AssistantError>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &ThreadId,
        run_id: &RunId,
        outputs: &[ToolOutput],
    ) -> Result<Run, AssistantError>;

    /// Messages of the thread in the order the service returns them.
    async fn list_messages(&self, thread_id: &ThreadId)
        -> Result<Vec<ThreadMessage>, AssistantError>;
}
