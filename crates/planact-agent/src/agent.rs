//! The agent capability trait.

use async_trait::async_trait;

use crate::error::Result;

/// Anything with a single asynchronous entry point.
///
/// Input and output types are left to each implementor; the planner node
/// takes a [`State`](crate::State) and returns a
/// [`PlannerUpdate`](crate::PlannerUpdate).
#[async_trait]
pub trait Agent: Send + Sync {
    type Input: Send;
    type Output;

    async fn run(&self, input: Self::Input) -> Result<Self::Output>;
}
