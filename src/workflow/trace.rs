use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::StepId;
use crate::worker::Usage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StepStarted,
    StepSucceeded,
    StepFailed,
    StepSkipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub step_id: StepId,
    pub worker: Option<String>,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trace {
    pub events: Vec<StepEvent>,
}

impl Trace {
    pub fn push(&mut self, event: StepEvent) {
        self.events.push(event);
    }

    pub fn total_tokens(&self) -> u64 {
        self.events
            .iter()
            .filter_map(|e| e.usage.as_ref())
            .map(|u| u.total_tokens)
            .sum()
    }
}
