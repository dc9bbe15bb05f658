//! Run state shared between planning and execution.
//!
//! [`State`] is the typed record for one agent run.  History is append-only;
//! every other field is replaced in place.  [`Memory`] owns the state for the
//! lifetime of a run and is the only way to grow the history.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgentError, Result};
use crate::planner::{Plan, PlanStep};

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One executed step and what came of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The step that was executed: a description string or a step mapping.
    pub step: Value,

    /// Free-text outcome.
    pub observation: String,

    /// Any additional keys recorded alongside the pair.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HistoryEntry {
    pub fn new(step: impl Into<Value>, observation: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            observation: observation.into(),
            extra: Map::new(),
        }
    }

    /// Record an extra key on the entry before it is appended.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The state of one agent run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    /// The user's goal.  Immutable once set.
    goal: Option<String>,

    /// The current plan, stored as its step list.
    pub plan: Option<Vec<PlanStep>>,

    /// Index of the step currently being executed.
    pub current_step_idx: Option<usize>,

    /// The latest observation reported by execution.
    pub observation: Option<String>,

    history: Vec<HistoryEntry>,

    /// Set by execution when the planner must regenerate the plan; cleared
    /// by the planner.
    pub needs_replan: bool,

    /// Every step has completed.
    pub finished: bool,
}

impl State {
    /// A fresh state for `goal`.
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: Some(goal.into()),
            ..Self::default()
        }
    }

    pub fn goal(&self) -> Option<&str> {
        self.goal.as_deref()
    }

    /// The recorded history, oldest first.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Whether a non-empty plan is stored.
    pub fn has_plan(&self) -> bool {
        self.plan.as_ref().is_some_and(|steps| !steps.is_empty())
    }

    /// The stored steps rebuilt into a [`Plan`].
    pub fn current_plan(&self) -> Plan {
        Plan::new(self.plan.clone().unwrap_or_default())
    }

    /// Replace plan, step index, and replan flag with a planner update.
    pub fn apply(&mut self, update: PlannerUpdate) {
        self.plan = Some(update.plan);
        if let Some(idx) = update.current_step_idx {
            self.current_step_idx = Some(idx);
        }
        self.needs_replan = update.needs_replan;
    }
}

/// The fields the planner node writes back into a [`State`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerUpdate {
    /// The plan to store.
    pub plan: Vec<PlanStep>,

    /// Set when a plan was (re)generated; `None` leaves the index untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step_idx: Option<usize>,

    /// Always `false` after the planner has run.
    pub needs_replan: bool,
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// In-memory store that owns the [`State`] of one run.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    state: State,
}

impl Memory {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with `state`.  The store owns it from here on.
    pub fn with_state(state: State) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Mutable access to the replace-in-place fields.  History and goal stay
    /// guarded by their own accessors.
    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    /// Consume the store and return the state.
    pub fn into_state(self) -> State {
        self.state
    }

    /// Set the goal.  Setting the same goal again is a no-op; a different
    /// goal is rejected.
    pub fn set_goal(&mut self, goal: impl Into<String>) -> Result<()> {
        let goal = goal.into();
        match &self.state.goal {
            Some(existing) if *existing != goal => Err(AgentError::GoalAlreadySet {
                existing: existing.clone(),
            }),
            _ => {
                self.state.goal = Some(goal);
                Ok(())
            }
        }
    }

    /// Clear everything, including goal and history.
    pub fn reset(&mut self) {
        self.state = State::default();
    }

    /// Append a `{step, observation}` entry.
    pub fn add_history(&mut self, step: impl Into<Value>, observation: impl Into<String>) {
        self.append_history(HistoryEntry::new(step, observation));
    }

    /// Append an arbitrary entry.
    pub fn append_history(&mut self, entry: HistoryEntry) {
        tracing::debug!(
            history_len = self.state.history.len() + 1,
            "history entry appended"
        );
        self.state.history.push(entry);
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.state.history
    }

    /// Observation of the most recent history entry.
    pub fn last_observation(&self) -> Option<&str> {
        self.state
            .history
            .last()
            .map(|entry| entry.observation.as_str())
    }

    /// Record a step outcome: append it to history, store it as the latest
    /// observation, and flag a replan if it reports a failure.
    pub fn record_observation(&mut self, step: impl Into<Value>, observation: impl Into<String>) {
        let observation = observation.into();
        self.state.needs_replan = crate::planner::needs_replan(&observation);
        self.state.observation = Some(observation.clone());
        self.add_history(step, observation);
    }

    /// Write a planner update back into the state.
    pub fn apply(&mut self, update: PlannerUpdate) {
        self.state.apply(update);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
