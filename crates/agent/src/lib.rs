//! Assistant side of Lucia: the catalog tools the hosted assistant may call and
//! the runtime that drives one chat turn through threads, runs and tool rounds.
//!
//! The assistant only phrases answers. Prices, stock and lead hand-off come
//! from the catalog store and the lead webhook through [`tools::ToolRegistry`].

pub mod assistant;
pub mod catalog_tools;
pub mod clock;
pub mod leads;
pub mod openai;
pub mod runtime;
pub mod tools;

pub use assistant::{AssistantError, AssistantService};
pub use catalog_tools::catalog_registry;
pub use clock::{ManualClock, PollClock, TokioClock};
pub use leads::{LeadNotifier, WebhookLeadNotifier};
pub use openai::OpenAiAssistantClient;
pub use runtime::{ConversationRuntime, RunSettings, TurnReply};
pub use tools::{Tool, ToolError, ToolRegistry};
