//! HTTP client for the OpenAI Assistants v2 API.

use std::time::Duration;

use async_trait::async_trait;
use lucia_core::config::AssistantConfig;
use lucia_core::domain::conversation::{RunId, ThreadId};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::assistant::{AssistantError, AssistantService, Run, ThreadMessage, ToolOutput};

const ASSISTANTS_BETA_HEADER: &str = "openai-beta";
const ASSISTANTS_BETA_VALUE: &str = "assistants=v2";

#[derive(Debug, Clone)]
pub struct OpenAiAssistantClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ThreadObject {
    id: ThreadId,
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<ThreadMessage>,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Serialize)]
struct ToolOutputsRequest<'a> {
    tool_outputs: &'a [ToolOutput],
}

impl OpenAiAssistantClient {
    /// Builds a client with bearer auth and the Assistants v2 beta header on every request.
    pub fn new(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", config.api_key.expose_secret());
        let mut auth = HeaderValue::from_str(&bearer)
            .map_err(|error| AssistantError::Transport(format!("invalid API key header: {error}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ASSISTANTS_BETA_HEADER, HeaderValue::from_static(ASSISTANTS_BETA_VALUE));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|error| {
                AssistantError::Transport(format!("failed to build HTTP client: {error}"))
            })?;

        Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AssistantError> {
        let response = request
            .send()
            .await
            .map_err(|error| AssistantError::Transport(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| AssistantError::Transport(format!("failed to read body: {error}")))?;
        debug!(event_name = "assistant.http.response", status = %status, "assistant API responded");

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|api_error| api_error.error.message)
                .unwrap_or(body);
            return Err(AssistantError::Api { status: status.as_u16(), message });
        }

        serde_json::from_str(&body).map_err(|error| AssistantError::Decode(error.to_string()))
    }
}

#[async_trait]
impl AssistantService for OpenAiAssistantClient {
    async fn create_thread(&self) -> Result<ThreadId, AssistantError> {
        let thread: ThreadObject =
            self.send(self.client.post(self.url("threads")).json(&json!({}))).await?;
        Ok(thread.id)
    }

    async fn add_user_message(
        &self,
        thread_id: &ThreadId,
        content: &str,
    ) -> Result<(), AssistantError> {
        let _: serde_json::Value = self
            .send(
                self.client
                    .post(self.url(&format!("threads/{thread_id}/messages")))
                    .json(&json!({ "role": "user", "content": content })),
            )
            .await?;
        Ok(())
    }

    async fn create_run(
        &self,
        thread_id: &ThreadId,
        assistant_id: &str,
    ) -> Result<Run, AssistantError> {
        self.send(
            self.client
                .post(self.url(&format!("threads/{thread_id}/runs")))
                .json(&json!({ "assistant_id": assistant_id })),
        )
        .await
    }

    async fn get_run(&self, thread_id: &ThreadId, run_id: &RunId) -> Result<Run, AssistantError> {
        self.send(self.client.get(self.url(&format!("threads/{thread_id}/runs/{run_id}")))).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &ThreadId,
        run_id: &RunId,
        outputs: &[ToolOutput],
    ) -> Result<Run, AssistantError> {
        self.send(
            self.client
                .post(self.url(&format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs")))
                .json(&ToolOutputsRequest { tool_outputs: outputs }),
        )
        .await
    }

    async fn list_messages(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<ThreadMessage>, AssistantError> {
        let list: MessageList =
            self.send(self.client.get(self.url(&format!("threads/{thread_id}/messages")))).await?;
        Ok(list.data)
    }
}
