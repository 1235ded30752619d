//! Per-trace lifecycle: binds a workflow run to a `presentation_id`,
//! allocates token/wall-clock budget, and propagates a single
//! cancellation signal to every suspension point in the run.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::config::BudgetConfig;
use crate::error::{WorkflowError, WorkflowResult};
use crate::ids::{PresentationId, SessionId, TraceId};
use crate::model::WorkflowState;
use crate::state_store::StateStore;

/// A single cancellation flag, shared by clone, observed by any
/// suspension point (worker call, retrieval, store write).
#[derive(Clone)]
pub struct CancellationSignal {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationSignal {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns immediately if already cancelled, otherwise suspends until
    /// `cancel()` is called.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }

    pub fn check(&self) -> WorkflowResult<()> {
        if self.is_cancelled() {
            Err(WorkflowError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Token and wall-clock budget for one trace. Token spend is a lock-free
/// counter so concurrent `foreach` items can decrement it without a
/// mutex; wall-clock remaining is derived from a fixed start instant.
pub struct BudgetTracker {
    tokens_remaining: AtomicU64,
    started_at: Instant,
    max_wall_clock: Duration,
}

impl BudgetTracker {
    pub fn new(config: &BudgetConfig) -> Self {
        Self {
            tokens_remaining: AtomicU64::new(config.max_tokens_per_trace),
            started_at: Instant::now(),
            max_wall_clock: Duration::from_millis(config.max_ms_per_trace),
        }
    }

    pub fn tokens_remaining(&self) -> u64 {
        self.tokens_remaining.load(Ordering::SeqCst)
    }

    pub fn wall_clock_remaining(&self) -> Duration {
        self.max_wall_clock.saturating_sub(self.started_at.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.started_at.elapsed() >= self.max_wall_clock
    }

    /// Reserves `projected_tokens` against the remaining budget, failing
    /// with `BudgetExceeded` rather than going negative.
    pub fn reserve(&self, projected_tokens: u64) -> WorkflowResult<()> {
        if self.is_expired() {
            return Err(WorkflowError::BudgetExceeded("wall-clock budget exhausted".into()));
        }
        let mut current = self.tokens_remaining.load(Ordering::SeqCst);
        loop {
            if projected_tokens > current {
                return Err(WorkflowError::BudgetExceeded(format!(
                    "insufficient token budget: need {projected_tokens}, have {current}"
                )));
            }
            let next = current - projected_tokens;
            match self.tokens_remaining.compare_exchange(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => current = observed,
            }
        }
    }
}

/// A bound workflow run: the loaded state, a budget tracker, and a
/// cancellation signal shared with every task the run spawns.
pub struct Session {
    pub session_id: SessionId,
    pub trace_id: TraceId,
    pub presentation_id: PresentationId,
    pub state: WorkflowState,
    pub expected_version: u64,
    pub budget: BudgetTracker,
    pub cancellation: CancellationSignal,
}

impl Session {
    pub fn check_alive(&self) -> WorkflowResult<()> {
        self.cancellation.check()?;
        if self.budget.is_expired() {
            return Err(WorkflowError::BudgetExceeded("wall-clock budget exhausted".into()));
        }
        Ok(())
    }
}

/// Opens, commits and closes sessions against a `StateStore`.
pub struct SessionManager {
    store: Arc<dyn StateStore>,
    budget_config: BudgetConfig,
}

impl SessionManager {
    pub fn new(store: Arc<dyn StateStore>, budget_config: BudgetConfig) -> Self {
        Self { store, budget_config }
    }

    /// Loads existing state for `presentation_id`, creating a fresh one
    /// if absent, and binds it to a new session with full budget.
    pub async fn open(&self, presentation_id: PresentationId) -> WorkflowResult<Session> {
        let existing = self.store.load(&presentation_id).await?;
        let state = existing.unwrap_or_else(|| WorkflowState::new(presentation_id.clone()));
        let expected_version = state.version;

        Ok(Session {
            session_id: SessionId::generate(),
            trace_id: TraceId::generate(),
            presentation_id,
            state,
            expected_version,
            budget: BudgetTracker::new(&self.budget_config),
            cancellation: CancellationSignal::new(),
        })
    }

    /// Persists `state`, rejecting concurrent runs on the same
    /// presentation with a version conflict.
    pub async fn commit(&self, session: &mut Session, state: WorkflowState) -> WorkflowResult<()> {
        self.store.commit(&state, session.expected_version).await?;
        session.expected_version = state.version;
        session.state = state;
        Ok(())
    }

    pub async fn close(&self, _session: Session) -> WorkflowResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_store::InMemoryStateStore;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(InMemoryStateStore::new()), BudgetConfig::default())
    }

    #[tokio::test]
    async fn open_creates_fresh_state_when_absent() {
        let manager = manager();
        let session = manager.open(PresentationId::new("p1")).await.unwrap();
        assert_eq!(session.state.version, 0);
        assert_eq!(session.budget.tokens_remaining(), 180_000);
    }

    #[tokio::test]
    async fn commit_then_reopen_resumes_from_saved_state() {
        let manager = manager();
        let mut session = manager.open(PresentationId::new("p1")).await.unwrap();
        let mut next = session.state.clone();
        next.version += 1;
        manager.commit(&mut session, next).await.unwrap();

        let reopened = manager.open(PresentationId::new("p1")).await.unwrap();
        assert_eq!(reopened.state.version, 1);
    }

    #[tokio::test]
    async fn concurrent_commit_on_stale_version_conflicts() {
        let manager = manager();
        let mut session_a = manager.open(PresentationId::new("p1")).await.unwrap();
        let session_b = manager.open(PresentationId::new("p1")).await.unwrap();

        let mut state_a = session_a.state.clone();
        state_a.version += 1;
        manager.commit(&mut session_a, state_a).await.unwrap();

        let mut state_b = session_b.state.clone();
        state_b.version += 1;
        let result = manager.store.commit(&state_b, session_b.expected_version).await;
        assert!(result.is_err());
    }

    #[test]
    fn budget_reserve_rejects_when_insufficient() {
        let tracker = BudgetTracker::new(&BudgetConfig {
            max_tokens_per_trace: 100,
            max_ms_per_trace: 60_000,
        });
        assert!(tracker.reserve(60).is_ok());
        assert!(tracker.reserve(60).is_err());
        assert_eq!(tracker.tokens_remaining(), 40);
    }

    #[tokio::test]
    async fn cancellation_signal_wakes_waiters() {
        let signal = CancellationSignal::new();
        let waiter = signal.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        signal.cancel();
        handle.await.unwrap();
        assert!(signal.is_cancelled());
    }
}
