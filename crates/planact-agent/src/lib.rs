//! Plan-and-Act planning runtime.
//!
//! The [`Planner`] asks a chat model to break a goal into numbered steps and
//! regenerates the plan when execution reports a failure.  [`State`] and
//! [`Memory`] carry one run; [`planner_node`] is the entry point an
//! orchestrator calls on every turn.
//!
//! ```text
//! ┌──────────────┐  State   ┌─────────────┐  messages  ┌────────────┐
//! │ orchestrator │─────────>│ planner_node│───────────>│ ChatModel  │
//! │              │<─────────│  (Planner)  │<───────────│ (LlmClient)│
//! └──────────────┘  Update  └─────────────┘  fenced    └────────────┘
//!                                              JSON
//! ```
//!
//! ## Modules
//!
//! - [`llm`] -- chat-model seam, HTTP client, and wire types.
//! - [`planner`] -- plan types, prompts, response parsing, replan heuristic.
//! - [`state`] -- run state, history, and the in-memory store.
//! - [`node`] -- the planner node.
//! - [`agent`] -- the agent capability trait.
//! - [`config`] -- TOML and environment configuration.
//! - [`error`] -- agent error types.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod node;
pub mod planner;
pub mod state;

pub use agent::Agent;
pub use config::{LlmSettings, PlanActConfig, ToolSettings};
pub use error::{AgentError, Result};
pub use llm::{
    ChatModel, ChatRequest, ChatResponse, LlmClient, LlmClientConfig, LlmProvider, LlmResponse,
    Message, Role,
};
pub use node::{PlannerNode, planner_node};
pub use planner::{
    Plan, PlanStep, Planner, REPLAN_KEYWORDS, create_planner, needs_replan, parse_plan_response,
};
pub use state::{HistoryEntry, Memory, PlannerUpdate, State};
