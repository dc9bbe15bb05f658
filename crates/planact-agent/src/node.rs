//! Planner node: the orchestration entry point.
//!
//! Looks at a [`State`] and decides whether to plan from scratch, replan, or
//! keep the current plan, returning the fields to write back as a
//! [`PlannerUpdate`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::Agent;
use crate::error::{AgentError, Result};
use crate::llm::{ChatModel, LlmClient};
use crate::planner::create_planner;
use crate::state::{PlannerUpdate, State};

/// Run one planning step against `state`.
///
/// - no plan (absent or empty): generate an initial plan for the goal;
/// - plan present and `needs_replan` set: replan from goal, plan, history,
///   and latest observation;
/// - otherwise: hand back the existing plan untouched.
///
/// `needs_replan` is always `false` in the result.  When `model` is `None`
/// the default remote client is built from the environment; if that fails
/// the call fails before any planning happens, whichever branch applies.
pub async fn planner_node(
    state: &State,
    model: Option<Arc<dyn ChatModel>>,
) -> Result<PlannerUpdate> {
    run_node(state, model, |key| std::env::var(key).ok()).await
}

async fn run_node(
    state: &State,
    model: Option<Arc<dyn ChatModel>>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PlannerUpdate> {
    let model = match model {
        Some(model) => model,
        None => default_model(lookup)?,
    };

    if state.has_plan() && !state.needs_replan {
        tracing::debug!("plan unchanged");
        return Ok(PlannerUpdate {
            plan: state.plan.clone().unwrap_or_default(),
            current_step_idx: None,
            needs_replan: false,
        });
    }

    let planner = create_planner(model);
    let goal = state.goal().ok_or(AgentError::MissingGoal)?;

    let plan = if state.has_plan() {
        let observation = state.observation.as_deref().unwrap_or_default();
        planner
            .replan(goal, &state.current_plan(), state.history(), observation)
            .await?
    } else {
        planner.generate_initial_plan(goal).await?
    };

    Ok(PlannerUpdate {
        plan: plan.steps,
        current_step_idx: Some(state.current_step_idx.unwrap_or(0)),
        needs_replan: false,
    })
}

fn default_model(lookup: impl Fn(&str) -> Option<String>) -> Result<Arc<dyn ChatModel>> {
    let client = LlmClient::from_env_with(lookup).map_err(|e| AgentError::ModelUnavailable {
        reason: e.to_string(),
    })?;
    tracing::info!(model = client.default_model(), "using default chat model");
    Ok(Arc::new(client))
}

/// [`planner_node`] packaged as an [`Agent`].
#[derive(Clone, Default)]
pub struct PlannerNode {
    model: Option<Arc<dyn ChatModel>>,
}

impl PlannerNode {
    /// A node bound to `model`.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model: Some(model) }
    }

    /// A node that builds the default remote client on every run.
    pub fn with_default_model() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for PlannerNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerNode")
            .field("has_model", &self.model.is_some())
            .finish()
    }
}

#[async_trait]
impl Agent for PlannerNode {
    type Input = State;
    type Output = PlannerUpdate;

    async fn run(&self, input: State) -> Result<PlannerUpdate> {
        planner_node(&input, self.model.clone()).await
    }
}
