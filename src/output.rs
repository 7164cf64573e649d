use std::fmt::Write;

use crate::duration::HandleTime;
use crate::models::SimConfig;
use crate::state::{SimulationResult, StopReason, TimelineEvent};

pub trait Formatter {
    fn write(&self, result: &SimulationResult) -> String;
}

pub struct HumanFormatter;
pub struct SummaryFormatter;
pub struct JsonFormatter;

impl Formatter for HumanFormatter {
    fn write(&self, result: &SimulationResult) -> String {
        let mut out = String::new();
        write_metadata(&mut out, result);
        let _ = writeln!(out, "Timeline:");
        for entry in &result.timeline {
            let _ = writeln!(
                out,
                "[{}] {}",
                format_clock(entry.at_ms),
                describe(&entry.event)
            );
        }
        write_dispatchers(&mut out, result);
        write_summary(&mut out, result);
        out
    }
}

impl Formatter for SummaryFormatter {
    fn write(&self, result: &SimulationResult) -> String {
        let mut out = String::new();
        write_metadata(&mut out, result);
        write_dispatchers(&mut out, result);
        write_summary(&mut out, result);
        out
    }
}

impl Formatter for JsonFormatter {
    fn write(&self, result: &SimulationResult) -> String {
        match serde_json::to_string_pretty(result) {
            Ok(json) => format!("{}\n", json),
            Err(err) => format!("{{\"error\":\"{}\"}}\n", err),
        }
    }
}

pub fn describe_config(config: &SimConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Dispatchers: {}", config.dispatchers);
    let _ = writeln!(out, "Incoming calls: {}", config.incoming_call_count());
    let _ = writeln!(
        out,
        "Handle time: {} ({})",
        config.handle_time,
        config.handle_time.describe()
    );
    let _ = writeln!(out, "Current calls: {}", config.current_call_count());
    let _ = writeln!(
        out,
        "Initial busy handle time: {} ({})",
        config.initial_busy_handle_time,
        config.initial_busy_handle_time.describe()
    );
    match config.seed {
        Some(seed) => {
            let _ = writeln!(out, "Seed: {}", seed);
        }
        None => {
            let _ = writeln!(out, "Seed: none");
        }
    }
    let _ = writeln!(out, "Tick: {}ms", config.tick_ms);
    let _ = writeln!(out, "Duration: {}ms", config.duration_ms);
    let _ = writeln!(out, "Stop when idle: {}", config.stop_when_idle);
    let _ = writeln!(
        out,
        "Remote: delete {}ms (failure rate {}), fetch {}ms (failure rate {})",
        config.remote.delete_latency_ms,
        config.remote.delete_failure_rate,
        config.remote.fetch_latency_ms,
        config.remote.fetch_failure_rate
    );
    let _ = writeln!(
        out,
        "Mirror: poll {}ms, max backoff {}ms",
        config.mirror.poll_interval_ms, config.mirror.max_backoff_ms
    );
    let _ = writeln!(out, "Operator actions: {}", config.operator.len());
    out
}

pub fn describe_handle_times() -> String {
    let mut out = String::new();
    for handle_time in HandleTime::ALL {
        let _ = writeln!(out, "{}: {}", handle_time, handle_time.describe());
    }
    out
}

fn write_metadata(out: &mut String, result: &SimulationResult) {
    let meta = &result.metadata;
    let _ = writeln!(out, "Metadata:");
    let _ = writeln!(out, "dispatchers: {}", meta.dispatchers);
    let _ = writeln!(out, "handle_time: {}", meta.handle_time);
    let _ = writeln!(
        out,
        "initial_busy_handle_time: {}",
        meta.initial_busy_handle_time
    );
    match meta.seed {
        Some(seed) => {
            let _ = writeln!(out, "seed: {}", seed);
        }
        None => {
            let _ = writeln!(out, "seed: none");
        }
    }
    let _ = writeln!(out, "elapsed_ms: {}", meta.elapsed_ms);
    let stopped = match meta.stopped {
        StopReason::Idle => "idle",
        StopReason::DurationElapsed => "duration elapsed",
    };
    let _ = writeln!(out, "stopped: {}", stopped);
}

fn write_dispatchers(out: &mut String, result: &SimulationResult) {
    let _ = writeln!(out, "Dispatchers:");
    for dispatcher in &result.dispatchers {
        let holding = dispatcher
            .holding
            .as_deref()
            .map(|id| format!(" on {}", id))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "dispatcher {}: {}{}, {} current calls, {} queue items (busy {}ms, {:.2}%)",
            dispatcher.id,
            dispatcher.status,
            holding,
            dispatcher.current_calls_handled,
            dispatcher.queue_items_handled,
            dispatcher.busy_ms,
            dispatcher.utilization_pct
        );
    }
}

fn write_summary(out: &mut String, result: &SimulationResult) {
    let totals = &result.totals;
    let _ = writeln!(out, "Summary:");
    let _ = writeln!(out, "queue items handled: {}", totals.queue_items_handled);
    let _ = writeln!(out, "current calls handled: {}", totals.current_calls_handled);
    let _ = writeln!(
        out,
        "incoming calls: {} submitted, {} enqueued, {} suppressed",
        totals.incoming_submitted, totals.incoming_enqueued, totals.suppressed_duplicates
    );
    let _ = writeln!(
        out,
        "deletes: {} issued, {} succeeded, {} failed, {} stale",
        totals.deletes_issued,
        totals.deletes_succeeded,
        totals.deletes_failed,
        totals.stale_completions
    );
    let _ = writeln!(out, "operator resolves: {}", totals.operator_resolves);
    let _ = writeln!(
        out,
        "fetches: {} issued, {} failed",
        totals.fetches_issued, totals.fetch_failures
    );
    let _ = writeln!(out, "remaining queue items: {}", totals.remaining_queue_items);
    let _ = writeln!(out, "remaining backlog: {}", totals.remaining_backlog);
    if let Some(error) = &result.operator_error {
        let _ = writeln!(out, "operator error: {}", error);
    }
}

fn format_clock(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}.{:03}", secs / 60, secs % 60, ms % 1000)
}

fn describe(event: &TimelineEvent) -> String {
    match event {
        TimelineEvent::CurrentCallStarted {
            dispatcher,
            client_id,
            release_at_ms,
        } => format!(
            "dispatcher {} took current call {} until {}",
            dispatcher,
            client_id,
            format_clock(*release_at_ms)
        ),
        TimelineEvent::QueueItemClaimed {
            dispatcher,
            item,
            release_at_ms,
        } => format!(
            "dispatcher {} claimed {} until {}",
            dispatcher,
            item,
            format_clock(*release_at_ms)
        ),
        TimelineEvent::Released { dispatcher, call } => {
            format!("dispatcher {} finished {}", dispatcher, call)
        }
        TimelineEvent::DeleteIssued { item, origin } => {
            format!("delete {} sent ({})", item, origin)
        }
        TimelineEvent::Removed { item, origin } => {
            format!("{} removed from queue ({})", item, origin)
        }
        TimelineEvent::RemovalFailed {
            item,
            origin,
            error,
        } => format!("delete {} failed ({}): {}", item, origin, error),
        TimelineEvent::OperatorSelected { item } => format!("operator selected {}", item),
        TimelineEvent::OperatorError { message } => format!("operator error: {}", message),
        TimelineEvent::FetchFailed {
            consecutive_failures,
            retry_at_ms,
        } => format!(
            "queue fetch failed ({} in a row), retry at {}",
            consecutive_failures,
            format_clock(*retry_at_ms)
        ),
    }
}
