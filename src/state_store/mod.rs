//! Durable persistence for `WorkflowState`, keyed by `presentation_id`,
//! with optimistic-concurrency commits.

use async_trait::async_trait;

use crate::error::{WorkflowError, WorkflowResult};
use crate::ids::PresentationId;
use crate::model::WorkflowState;

mod sled_store;

pub use sled_store::SledStateStore;

/// Persists `WorkflowState` snapshots. A run's state is loaded once at
/// session open and committed at each successful step/barrier boundary;
/// `commit` enforces optimistic concurrency via `WorkflowState.version`.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, presentation_id: &PresentationId) -> WorkflowResult<Option<WorkflowState>>;

    /// Commits `state`, failing with `Conflict` if the stored version has
    /// moved on since `expected_version` was read.
    async fn commit(&self, state: &WorkflowState, expected_version: u64) -> WorkflowResult<()>;

    async fn delete(&self, presentation_id: &PresentationId) -> WorkflowResult<()>;
}

/// In-memory store used for tests and for co-located single-process
/// deployments where durability across restarts is not required.
#[derive(Default)]
pub struct InMemoryStateStore {
    states: dashmap::DashMap<PresentationId, WorkflowState>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, presentation_id: &PresentationId) -> WorkflowResult<Option<WorkflowState>> {
        Ok(self.states.get(presentation_id).map(|entry| entry.value().clone()))
    }

    async fn commit(&self, state: &WorkflowState, expected_version: u64) -> WorkflowResult<()> {
        if let Some(existing) = self.states.get(&state.presentation_id) {
            if existing.version != expected_version {
                return Err(WorkflowError::Conflict {
                    expected: expected_version,
                    found: existing.version,
                });
            }
        }
        self.states.insert(state.presentation_id.clone(), state.clone());
        Ok(())
    }

    async fn delete(&self, presentation_id: &PresentationId) -> WorkflowResult<()> {
        self.states.remove(presentation_id);
        Ok(())
    }
}
