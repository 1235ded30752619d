use async_trait::async_trait;

use crate::error::{WorkflowError, WorkflowResult};
use crate::ids::PresentationId;
use crate::model::WorkflowState;
use crate::state_store::StateStore;

/// `sled`-backed durable store. One key per `presentation_id`, value is
/// the JSON-serialized `WorkflowState`.
pub struct SledStateStore {
    tree: sled::Tree,
}

impl SledStateStore {
    pub fn open(db: &sled::Db) -> WorkflowResult<Self> {
        let tree = db
            .open_tree("workflow_state")
            .map_err(|err| WorkflowError::Internal(format!("failed to open state tree: {err}")))?;
        Ok(Self { tree })
    }
}

#[async_trait]
impl StateStore for SledStateStore {
    async fn load(&self, presentation_id: &PresentationId) -> WorkflowResult<Option<WorkflowState>> {
        let bytes = self
            .tree
            .get(presentation_id.as_str())
            .map_err(|err| WorkflowError::Internal(format!("state read failed: {err}")))?;
        match bytes {
            None => Ok(None),
            Some(bytes) => {
                let state = serde_json::from_slice(&bytes)
                    .map_err(|err| WorkflowError::Internal(format!("corrupt state record: {err}")))?;
                Ok(Some(state))
            }
        }
    }

    async fn commit(&self, state: &WorkflowState, expected_version: u64) -> WorkflowResult<()> {
        let key = state.presentation_id.as_str();
        let existing = self
            .tree
            .get(key)
            .map_err(|err| WorkflowError::Internal(format!("state read failed: {err}")))?;
        if let Some(bytes) = &existing {
            let current: WorkflowState = serde_json::from_slice(bytes)
                .map_err(|err| WorkflowError::Internal(format!("corrupt state record: {err}")))?;
            if current.version != expected_version {
                return Err(WorkflowError::Conflict {
                    expected: expected_version,
                    found: current.version,
                });
            }
        }
        let encoded = serde_json::to_vec(state)
            .map_err(|err| WorkflowError::Internal(format!("state encode failed: {err}")))?;
        self.tree
            .insert(key, encoded)
            .map_err(|err| WorkflowError::Internal(format!("state write failed: {err}")))?;
        Ok(())
    }

    async fn delete(&self, presentation_id: &PresentationId) -> WorkflowResult<()> {
        self.tree
            .remove(presentation_id.as_str())
            .map_err(|err| WorkflowError::Internal(format!("state delete failed: {err}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, SledStateStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let store = SledStateStore::open(&db).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn commit_then_load_round_trips() {
        let (_dir, store) = temp_store();
        let state = WorkflowState::new(PresentationId::new("p1"));
        store.commit(&state, 0).await.unwrap();
        let loaded = store.load(&PresentationId::new("p1")).await.unwrap().unwrap();
        assert_eq!(loaded.presentation_id, state.presentation_id);
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let (_dir, store) = temp_store();
        let mut state = WorkflowState::new(PresentationId::new("p1"));
        store.commit(&state, 0).await.unwrap();
        state.version = 1;
        store.commit(&state, 1).await.unwrap();

        let mut stale = state.clone();
        stale.version = 2;
        let err = store.commit(&stale, 0).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Conflict { .. }));
    }
}
