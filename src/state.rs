use serde::Serialize;

use crate::ledger::RemovalOrigin;
use crate::operator::SuppressedNotice;
use crate::pool::DispatcherStatus;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// Nothing left to assign, hold or delete.
    Idle,
    DurationElapsed,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunMetadata {
    pub dispatchers: usize,
    pub handle_time: String,
    pub initial_busy_handle_time: String,
    pub seed: Option<u64>,
    pub tick_ms: u64,
    pub elapsed_ms: u64,
    pub stopped: StopReason,
}

#[derive(Clone, Debug, Serialize)]
pub struct DispatcherSummary {
    pub id: usize,
    pub status: DispatcherStatus,
    pub holding: Option<String>,
    pub current_calls_handled: u32,
    pub queue_items_handled: u32,
    pub busy_ms: u64,
    pub utilization_pct: f64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RunTotals {
    pub incoming_submitted: u64,
    pub incoming_enqueued: u64,
    pub suppressed_duplicates: u64,
    pub create_failures: u64,
    pub current_calls_handled: u64,
    pub queue_items_handled: u64,
    pub deletes_issued: u64,
    pub deletes_succeeded: u64,
    pub deletes_failed: u64,
    pub stale_completions: u64,
    pub operator_resolves: u64,
    pub operator_errors: u64,
    pub fetches_issued: u64,
    pub fetch_failures: u64,
    pub stale_fetches: u64,
    pub ticks: u64,
    pub gate_closed_ticks: u64,
    pub remaining_queue_items: usize,
    pub remaining_backlog: usize,
    pub ledger_claimed: usize,
    pub ledger_in_flight: usize,
    pub ledger_removed: usize,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TimelineEvent {
    CurrentCallStarted {
        dispatcher: usize,
        client_id: String,
        release_at_ms: u64,
    },
    QueueItemClaimed {
        dispatcher: usize,
        item: String,
        release_at_ms: u64,
    },
    Released {
        dispatcher: usize,
        call: String,
    },
    DeleteIssued {
        item: String,
        origin: RemovalOrigin,
    },
    Removed {
        item: String,
        origin: RemovalOrigin,
    },
    RemovalFailed {
        item: String,
        origin: RemovalOrigin,
        error: String,
    },
    OperatorSelected {
        item: String,
    },
    OperatorError {
        message: String,
    },
    FetchFailed {
        consecutive_failures: u32,
        retry_at_ms: u64,
    },
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: TimelineEvent,
}

#[derive(Clone, Debug, Serialize)]
pub struct SimulationResult {
    pub metadata: RunMetadata,
    pub dispatchers: Vec<DispatcherSummary>,
    pub totals: RunTotals,
    pub suppressed: Vec<SuppressedNotice>,
    pub operator_error: Option<String>,
    pub timeline: Vec<TimelineEntry>,
}
