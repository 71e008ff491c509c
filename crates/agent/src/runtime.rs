//! One conversational turn against the hosted assistant.
//!
//! ```text
//! NoThread -> ThreadReady -> RunQueued -> RunInProgress <-> RunRequiresAction
//!                                             |
//!                      RunCompleted | RunFailed | Timeout
//! ```
//!
//! Polling sleeps through the injected [`PollClock`] and is bounded by a
//! mandatory deadline measured from run creation.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use lucia_core::config::AssistantConfig;
use lucia_core::domain::conversation::{RunStatus, ThreadId};
use lucia_core::errors::ApplicationError;
use serde_json::Value;
use tracing::{info, warn};

use crate::assistant::{AssistantError, AssistantService, Run, ToolCall, ToolOutput};
use crate::clock::PollClock;
use crate::tools::ToolRegistry;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSettings {
    pub assistant_id: String,
    pub poll_interval: Duration,
    pub deadline: Duration,
}

impl RunSettings {
    pub fn from_config(config: &AssistantConfig) -> Self {
        Self {
            assistant_id: config.assistant_id.clone(),
            poll_interval: config.poll_interval(),
            deadline: config.run_deadline(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReply {
    pub reply: String,
    pub thread_id: ThreadId,
}

/// Where a fetched run leaves the turn.
enum RunPhase {
    Pending,
    RequiresAction,
    Completed,
    Failed,
}

impl RunPhase {
    fn of(run: &Run) -> Self {
        match run.status {
            RunStatus::Completed => Self::Completed,
            RunStatus::RequiresAction => Self::RequiresAction,
            status if status.is_pending() => Self::Pending,
            _ => Self::Failed,
        }
    }
}

fn upstream(error: AssistantError) -> ApplicationError {
    ApplicationError::Upstream(error.to_string())
}

pub struct ConversationRuntime {
    assistant: Arc<dyn AssistantService>,
    tools: Arc<ToolRegistry>,
    clock: Arc<dyn PollClock>,
    settings: RunSettings,
}

impl ConversationRuntime {
    pub fn new(
        assistant: Arc<dyn AssistantService>,
        tools: Arc<ToolRegistry>,
        clock: Arc<dyn PollClock>,
        settings: RunSettings,
    ) -> Self {
        Self { assistant, tools, clock, settings }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Sends `message` on `thread_id` (or a new thread) and returns the assistant's reply.
    pub async fn handle_turn(
        &self,
        message: &str,
        thread_id: Option<ThreadId>,
    ) -> Result<TurnReply, ApplicationError> {
        let thread_id = match thread_id {
            Some(thread_id) => thread_id,
            None => {
                let thread_id = self.assistant.create_thread().await.map_err(upstream)?;
                info!(event_name = "agent.thread.created", thread_id = %thread_id, "created conversation thread");
                thread_id
            }
        };

        self.assistant.add_user_message(&thread_id, message).await.map_err(upstream)?;

        let started = self.clock.now();
        let mut run = self
            .assistant
            .create_run(&thread_id, &self.settings.assistant_id)
            .await
            .map_err(upstream)?;
        info!(
            event_name = "agent.run.created",
            thread_id = %thread_id,
            run_id = %run.id,
            status = %run.status,
            "assistant run started"
        );

        loop {
            let phase = RunPhase::of(&run);
            if matches!(phase, RunPhase::Pending | RunPhase::RequiresAction) {
                let elapsed = self.clock.now().saturating_duration_since(started);
                if elapsed >= self.settings.deadline {
                    warn!(
                        event_name = "agent.run.timeout",
                        thread_id = %thread_id,
                        run_id = %run.id,
                        elapsed_secs = elapsed.as_secs(),
                        "assistant run exceeded its deadline"
                    );
                    return Err(ApplicationError::Timeout { run_id: run.id, elapsed });
                }
            }

            match phase {
                RunPhase::Completed => {
                    let reply = self.final_reply(&thread_id, &run).await?;
                    info!(event_name = "agent.run.completed", thread_id = %thread_id, run_id = %run.id, "assistant run completed");
                    return Ok(TurnReply { reply, thread_id });
                }
                RunPhase::RequiresAction => {
                    let outputs = self.dispatch_tool_calls(run.pending_tool_calls()).await?;
                    info!(
                        event_name = "agent.run.tool_outputs_submitted",
                        thread_id = %thread_id,
                        run_id = %run.id,
                        outputs = outputs.len(),
                        "submitting tool outputs"
                    );
                    run = self
                        .assistant
                        .submit_tool_outputs(&thread_id, &run.id, &outputs)
                        .await
                        .map_err(upstream)?;
                }
                RunPhase::Pending => {
                    self.clock.sleep(self.settings.poll_interval).await;
                    run = self.assistant.get_run(&thread_id, &run.id).await.map_err(upstream)?;
                }
                RunPhase::Failed => {
                    warn!(
                        event_name = "agent.run.failed",
                        thread_id = %thread_id,
                        run_id = %run.id,
                        status = %run.status,
                        "assistant run ended without completing"
                    );
                    return Err(ApplicationError::RunFailedTerminal {
                        status: run.status,
                        last_error: run.last_error,
                    });
                }
            }
        }
    }

    /// Runs every pending call concurrently, keeping outputs in call order.
    ///
    /// All argument payloads are parsed first so malformed JSON aborts the turn
    /// before any tool has side effects.
    async fn dispatch_tool_calls(
        &self,
        calls: &[ToolCall],
    ) -> Result<Vec<ToolOutput>, ApplicationError> {
        let parsed = calls
            .iter()
            .map(|call| {
                serde_json::from_str::<Value>(&call.function.arguments)
                    .map(|arguments| (call, arguments))
                    .map_err(|error| ApplicationError::MalformedToolArguments {
                        tool_call_id: call.id.clone(),
                        reason: error.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let invocations = parsed.into_iter().map(|(call, arguments)| async move {
            info!(
                event_name = "agent.tool.dispatch",
                tool = %call.function.name,
                tool_call_id = %call.id,
                "dispatching tool call"
            );
            let output = self.tools.dispatch(&call.function.name, arguments).await;
            ToolOutput { tool_call_id: call.id.clone(), output: output.to_string() }
        });

        Ok(join_all(invocations).await)
    }

    /// Last assistant message of this run, in the order the service lists them.
    async fn final_reply(&self, thread_id: &ThreadId, run: &Run) -> Result<String, ApplicationError> {
        let messages = self.assistant.list_messages(thread_id).await.map_err(upstream)?;

        messages
            .iter()
            .filter(|message| message.role == "assistant" && message.run_id.as_ref() == Some(&run.id))
            .last()
            .and_then(|message| message.first_text())
            .map(str::to_string)
            .ok_or_else(|| ApplicationError::EmptyReply { run_id: run.id.clone() })
    }
}
