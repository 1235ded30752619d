//! Structured per-step event log plus an in-memory rollup: per-worker
//! totals and percentile latencies. No remote sink is mandated.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ids::{StepId, TraceId};
use crate::worker::Usage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub trace_id: TraceId,
    pub step_id: StepId,
    pub worker: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepRecord {
    pub fn from_usage(
        trace_id: TraceId,
        step_id: StepId,
        worker: Option<String>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        usage: Option<&Usage>,
        status: StepStatus,
        error: Option<String>,
    ) -> Self {
        Self {
            trace_id,
            step_id,
            worker,
            started_at,
            duration_ms,
            prompt_tokens: usage.map(|u| u.prompt_tokens).unwrap_or_default(),
            completion_tokens: usage.map(|u| u.completion_tokens).unwrap_or_default(),
            cost: usage.and_then(|u| u.cost),
            status,
            error,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerTotals {
    pub call_count: u64,
    pub failure_count: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost: f64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
}

pub trait TelemetrySink: Send + Sync {
    fn record(&self, record: StepRecord);
    fn records(&self) -> Vec<StepRecord>;
    fn aggregate(&self) -> HashMap<String, WorkerTotals>;
}

/// Append-only in-memory sink. Production deployments would fan this
/// out to a durable log; this rollup is sufficient for a single run's
/// lifetime and for the `GET /health`/debug surfaces.
#[derive(Clone, Default)]
pub struct InMemoryTelemetrySink {
    records: Arc<Mutex<Vec<StepRecord>>>,
}

impl InMemoryTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TelemetrySink for InMemoryTelemetrySink {
    fn record(&self, record: StepRecord) {
        info!(
            step_id = %record.step_id,
            worker = ?record.worker,
            duration_ms = record.duration_ms,
            status = ?record.status,
            "step completed"
        );
        self.records.lock().push(record);
    }

    fn records(&self) -> Vec<StepRecord> {
        self.records.lock().clone()
    }

    fn aggregate(&self) -> HashMap<String, WorkerTotals> {
        let records = self.records.lock();
        let mut by_worker: HashMap<String, Vec<&StepRecord>> = HashMap::new();
        for record in records.iter() {
            let Some(worker) = &record.worker else { continue };
            by_worker.entry(worker.clone()).or_default().push(record);
        }

        by_worker
            .into_iter()
            .map(|(worker, records)| {
                let mut latencies: Vec<u64> = records.iter().map(|r| r.duration_ms).collect();
                latencies.sort_unstable();
                let totals = WorkerTotals {
                    call_count: records.len() as u64,
                    failure_count: records.iter().filter(|r| r.status == StepStatus::Failed).count() as u64,
                    prompt_tokens: records.iter().map(|r| r.prompt_tokens).sum(),
                    completion_tokens: records.iter().map(|r| r.completion_tokens).sum(),
                    cost: records.iter().filter_map(|r| r.cost).sum(),
                    p50_latency_ms: percentile(&latencies, 0.50),
                    p95_latency_ms: percentile(&latencies, 0.95),
                };
                (worker, totals)
            })
            .collect()
    }
}

fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(worker: &str, duration_ms: u64, status: StepStatus) -> StepRecord {
        StepRecord {
            trace_id: TraceId::generate(),
            step_id: StepId::generate(),
            worker: Some(worker.to_string()),
            started_at: Utc::now(),
            duration_ms,
            prompt_tokens: 10,
            completion_tokens: 5,
            cost: Some(0.01),
            status,
            error: None,
        }
    }

    #[test]
    fn aggregate_counts_calls_and_failures_per_worker() {
        let sink = InMemoryTelemetrySink::new();
        sink.record(record("outline", 100, StepStatus::Succeeded));
        sink.record(record("outline", 200, StepStatus::Failed));
        sink.record(record("write-slide", 50, StepStatus::Succeeded));

        let totals = sink.aggregate();
        assert_eq!(totals["outline"].call_count, 2);
        assert_eq!(totals["outline"].failure_count, 1);
        assert_eq!(totals["write-slide"].call_count, 1);
    }

    #[test]
    fn percentile_of_single_value_is_itself() {
        assert_eq!(percentile(&[42], 0.95), 42);
    }

    #[test]
    fn p50_of_sorted_series_is_the_median() {
        let totals_input = vec![10, 20, 30, 40, 50];
        assert_eq!(percentile(&totals_input, 0.50), 30);
    }
}
