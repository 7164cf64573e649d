use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::engine::{DispatchEngine, RemovalOutcome, ResolveStart};
use crate::error::Result;
use crate::events::{Event, EventQueue};
use crate::ledger::{RemovalOrigin, RemovalTicket};
use crate::mirror::{FetchOutcome, FetchTicket, QueueMirror};
use crate::models::{OperatorCommand, QueueItem, SimConfig};
use crate::operator::{OperatorConsole, SuppressedNotice};
use crate::remote::{InMemoryQueue, QueueService, RemoteError};
use crate::seeds;
use crate::state::{
    DispatcherSummary, RunMetadata, RunTotals, SimulationResult, StopReason, TimelineEntry,
    TimelineEvent,
};
use crate::ticker::{FixedPeriodTicker, TickSource};

// Keeps seed-data draws independent of the engine's duration draws.
const SEED_DATA_SALT: u64 = 0x5EED_DA7A;

/// Drives a [`DispatchEngine`] in virtual time against a queue service.
///
/// Ticks, mirror polls, delete replies, fetch replies and scripted operator
/// actions are events on one heap, handled one at a time.
pub struct Simulation<S: QueueService> {
    config: SimConfig,
    engine: DispatchEngine,
    service: S,
    mirror: QueueMirror,
    console: OperatorConsole,
    ticker: FixedPeriodTicker,
    events: EventQueue,
    rng: StdRng,
    now_ms: u64,
    scheduled_poll_ms: Option<u64>,
    started: bool,
    stopped: Option<StopReason>,
    totals: RunTotals,
    timeline: Vec<TimelineEntry>,
}

impl Simulation<InMemoryQueue> {
    pub fn in_memory(config: SimConfig) -> Result<Self> {
        let seed = config.seed.unwrap_or_else(rand::random);
        let service = InMemoryQueue::new(&config.remote, seed);
        Self::new(config, service)
    }
}

impl<S: QueueService> Simulation<S> {
    pub fn new(config: SimConfig, service: S) -> Result<Self> {
        let engine = DispatchEngine::new(config.clone())?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ SEED_DATA_SALT),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            mirror: QueueMirror::new(&config.mirror),
            config,
            engine,
            service,
            console: OperatorConsole::new(),
            ticker: FixedPeriodTicker::new(),
            events: EventQueue::new(),
            rng,
            now_ms: 0,
            scheduled_poll_ms: None,
            started: false,
            stopped: None,
            totals: RunTotals::default(),
            timeline: Vec::new(),
        })
    }

    pub fn engine(&self) -> &DispatchEngine {
        &self.engine
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn mirror(&self) -> &QueueMirror {
        &self.mirror
    }

    pub fn console(&self) -> &OperatorConsole {
        &self.console
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    /// Runs until the configured duration elapses or, with `stop_when_idle`,
    /// until there is no work left.
    pub fn run(&mut self) -> SimulationResult {
        self.advance_to(self.config.duration_ms);
        self.result()
    }

    /// Handles every event due at or before `until_ms`. Returns false once
    /// the run has stopped.
    pub fn advance_to(&mut self, until_ms: u64) -> bool {
        self.start();
        if self.stopped.is_some() {
            return false;
        }
        let limit = until_ms.min(self.config.duration_ms);

        while self
            .events
            .peek_time_ms()
            .is_some_and(|time_ms| time_ms <= limit)
        {
            let Some(scheduled) = self.events.pop() else {
                break;
            };
            self.now_ms = scheduled.time_ms;
            let is_tick = matches!(scheduled.event, Event::Tick);
            self.handle(scheduled.event);

            if is_tick && self.config.stop_when_idle && self.is_quiescent() {
                info!(at_ms = self.now_ms, "no work left, stopping");
                self.stop(StopReason::Idle);
                return false;
            }
        }

        self.now_ms = self.now_ms.max(limit);
        if limit >= self.config.duration_ms {
            self.stop(StopReason::DurationElapsed);
            return false;
        }
        true
    }

    fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        self.submit_incoming_calls();
        self.engine.initialize(self.now_ms);
        let initial: Vec<TimelineEvent> = self
            .engine
            .pool()
            .iter()
            .filter_map(|dispatcher| {
                let release_at_ms = dispatcher.release_at_ms()?;
                let client_id = dispatcher.held_item_id()?.to_string();
                Some(TimelineEvent::CurrentCallStarted {
                    dispatcher: dispatcher.id,
                    client_id,
                    release_at_ms,
                })
            })
            .collect();
        for event in initial {
            self.record(event);
        }

        self.ticker.start(self.config.tick_ms, self.now_ms);
        self.schedule_tick();
        self.schedule_poll(self.now_ms);
        for action in &self.config.operator {
            self.events
                .push(action.at_ms, Event::Operator(action.action.clone()));
        }
    }

    fn stop(&mut self, reason: StopReason) {
        self.ticker.stop();
        self.stopped = Some(reason);
    }

    fn submit_incoming_calls(&mut self) {
        let transcripts = seeds::incoming_transcripts(&self.config, &mut self.rng);
        let custom = !self.config.custom_incoming_calls.is_empty();

        for transcript in transcripts {
            self.totals.incoming_submitted += 1;
            let lines = seeds::timestamped_lines(&transcript, custom);
            match self.service.create_queue_item(&transcript, &lines) {
                Ok(outcome) if outcome.enqueued => {
                    self.totals.incoming_enqueued += 1;
                    debug!(item = %outcome.created_id, "incoming call enqueued");
                }
                Ok(outcome) => {
                    self.totals.suppressed_duplicates += 1;
                    let message = outcome
                        .notice
                        .unwrap_or_else(|| format!("call {} was not enqueued", outcome.created_id));
                    info!(item = %outcome.created_id, "incoming call suppressed as duplicate");
                    self.console.record_suppressed(SuppressedNotice {
                        id: outcome.created_id,
                        duplicate_of: outcome.duplicate_of,
                        message,
                        at_ms: self.now_ms,
                    });
                }
                Err(err) => {
                    self.totals.create_failures += 1;
                    warn!(error = %err, "failed to submit incoming call");
                }
            }
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::DeleteComplete { ticket } => self.on_delete_complete(ticket),
            Event::FetchComplete { ticket, result } => self.on_fetch_complete(ticket, result),
            Event::Operator(command) => self.on_operator(command),
            Event::MirrorPoll => self.on_mirror_poll(),
            Event::Tick => self.on_tick(),
        }
    }

    fn on_tick(&mut self) {
        let Some(at_ms) = self.ticker.poll(self.now_ms) else {
            self.schedule_tick();
            return;
        };

        let report = self
            .engine
            .tick(at_ms, self.mirror.items(), self.console.selected_id());
        if !report.gate_open {
            self.totals.gate_closed_ticks += 1;
        }

        for release in report.released {
            self.record(TimelineEvent::Released {
                dispatcher: release.dispatcher_id,
                call: release.held.id().to_string(),
            });
        }
        for assignment in report.backlog_assignments {
            self.record(TimelineEvent::CurrentCallStarted {
                dispatcher: assignment.dispatcher_id,
                client_id: assignment.held.id().to_string(),
                release_at_ms: assignment.release_at_ms,
            });
        }
        for assignment in report.queue_assignments {
            self.record(TimelineEvent::QueueItemClaimed {
                dispatcher: assignment.dispatcher_id,
                item: assignment.held.id().to_string(),
                release_at_ms: assignment.release_at_ms,
            });
        }
        for ticket in report.removals {
            self.issue_delete(ticket);
        }

        self.schedule_tick();
    }

    fn issue_delete(&mut self, ticket: RemovalTicket) {
        self.record(TimelineEvent::DeleteIssued {
            item: ticket.item_id.clone(),
            origin: ticket.origin,
        });
        let at_ms = self.now_ms + self.config.remote.delete_latency_ms;
        self.events.push(at_ms, Event::DeleteComplete { ticket });
    }

    fn on_delete_complete(&mut self, ticket: RemovalTicket) {
        let result = self.service.delete_queue_item(&ticket.item_id);
        match self.engine.complete_removal(&ticket, result) {
            RemovalOutcome::Removed { item_id, origin } => {
                self.console.invalidate_detail(&item_id);
                if origin == RemovalOrigin::Operator {
                    self.console.set_resolving(false);
                    if self.console.selected_id() == Some(item_id.as_str()) {
                        self.console.clear_selection();
                    }
                }
                self.mirror.request_refresh();
                self.schedule_poll(self.now_ms);
                self.record(TimelineEvent::Removed {
                    item: item_id,
                    origin,
                });
            }
            RemovalOutcome::Failed {
                item_id,
                origin,
                error,
            } => {
                if origin == RemovalOrigin::Operator {
                    let message = format!("Failed to resolve {}: {}", item_id, error);
                    self.console.set_resolving(false);
                    self.console.raise_error(message.clone());
                    self.totals.operator_errors += 1;
                    self.record(TimelineEvent::OperatorError { message });
                }
                self.record(TimelineEvent::RemovalFailed {
                    item: item_id,
                    origin,
                    error: error.to_string(),
                });
            }
            RemovalOutcome::Stale => {
                if ticket.origin == RemovalOrigin::Operator {
                    self.console.set_resolving(false);
                }
            }
        }
    }

    fn schedule_tick(&mut self) {
        if let Some(next_ms) = self.ticker.next_due_ms() {
            self.events.push(next_ms, Event::Tick);
        }
    }

    /// Keeps at most one live poll event, the earliest requested.
    fn schedule_poll(&mut self, at_ms: u64) {
        if self
            .scheduled_poll_ms
            .is_some_and(|scheduled| scheduled <= at_ms)
        {
            return;
        }
        self.scheduled_poll_ms = Some(at_ms);
        self.events.push(at_ms, Event::MirrorPoll);
    }

    fn on_mirror_poll(&mut self) {
        if self.scheduled_poll_ms != Some(self.now_ms) {
            return;
        }
        self.scheduled_poll_ms = None;
        if !self.mirror.is_visible() {
            debug!("dashboard hidden, polling paused");
            return;
        }

        if self.mirror.is_due(self.now_ms) {
            let ticket = self.mirror.begin_fetch(self.now_ms);
            self.totals.fetches_issued += 1;
            let result = self.service.list_queue();
            let at_ms = self.now_ms + self.config.remote.fetch_latency_ms;
            self.events.push(at_ms, Event::FetchComplete { ticket, result });
        }
        let next_ms = self.mirror.next_poll_ms().max(self.now_ms + 1);
        self.schedule_poll(next_ms);
    }

    fn on_fetch_complete(
        &mut self,
        ticket: FetchTicket,
        result: std::result::Result<Vec<QueueItem>, RemoteError>,
    ) {
        let error = result.as_ref().err().map(ToString::to_string);
        match self.mirror.apply_fetch(ticket, self.now_ms, result) {
            FetchOutcome::Applied { items } => {
                debug!(seq = ticket.seq, items, "queue mirror updated");
            }
            FetchOutcome::Failed {
                consecutive_failures,
                retry_at_ms,
            } => {
                self.totals.fetch_failures += 1;
                warn!(
                    error = error.as_deref().unwrap_or("unknown"),
                    consecutive_failures,
                    retry_at_ms,
                    "queue fetch failed, keeping last snapshot"
                );
                self.record(TimelineEvent::FetchFailed {
                    consecutive_failures,
                    retry_at_ms,
                });
            }
            FetchOutcome::Stale => {
                self.totals.stale_fetches += 1;
                debug!(seq = ticket.seq, "dropping out-of-order fetch result");
            }
        }
    }

    fn on_operator(&mut self, command: OperatorCommand) {
        debug!(?command, at_ms = self.now_ms, "operator action");
        match command {
            OperatorCommand::Select(position) => self.select(position),
            OperatorCommand::Resolve => self.resolve_selected(),
            OperatorCommand::ClearSelection => self.console.clear_selection(),
            OperatorCommand::DismissError => self.console.dismiss_error(),
            OperatorCommand::Hide => self.mirror.set_visible(false),
            OperatorCommand::Show => {
                self.mirror.set_visible(true);
                self.schedule_poll(self.now_ms);
            }
        }
    }

    fn select(&mut self, position: usize) {
        let picked = self
            .mirror
            .unclaimed_items(self.engine.ledger())
            .get(position)
            .map(|item| item.id.clone());
        let Some(id) = picked else {
            debug!(position, "nothing to select at position");
            return;
        };

        self.console.select(&id);
        if let Err(err) = self.console.load_detail(&id, &mut self.service) {
            warn!(item = %id, error = %err, "failed to load incident detail");
        }
        self.record(TimelineEvent::OperatorSelected { item: id });
    }

    fn resolve_selected(&mut self) {
        if self.console.is_resolving() {
            debug!("resolve already in progress");
            return;
        }
        let Some(id) = self.console.selected_id().map(str::to_string) else {
            debug!("resolve with nothing selected");
            return;
        };

        match self.engine.begin_resolve(&id) {
            ResolveStart::Issued(ticket) => {
                self.console.set_resolving(true);
                self.issue_delete(ticket);
            }
            ResolveStart::AlreadyHandled => {
                debug!(item = %id, "resolve ignored, removal already handled");
            }
        }
    }

    fn is_quiescent(&self) -> bool {
        let ledger = self.engine.ledger();
        self.engine.pool().iter().all(|dispatcher| dispatcher.is_idle())
            && self.engine.backlog().is_empty()
            && ledger.in_flight_count() == 0
            && self.mirror.is_loaded()
            && self.mirror.unclaimed_items(ledger).is_empty()
            && !self.console.is_resolving()
            && self
                .events
                .count_matching(|event| {
                    matches!(event, Event::DeleteComplete { .. } | Event::Operator(_))
                })
                == 0
    }

    fn record(&mut self, event: TimelineEvent) {
        self.timeline.push(TimelineEntry {
            at_ms: self.now_ms,
            event,
        });
    }

    pub fn result(&self) -> SimulationResult {
        let elapsed_ms = self.now_ms;
        let engine = self.engine.stats();
        let ledger = self.engine.ledger();

        let dispatchers: Vec<DispatcherSummary> = self
            .engine
            .pool()
            .iter()
            .map(|dispatcher| {
                let unfinished = dispatcher
                    .release_at_ms()
                    .map(|release_at| release_at.saturating_sub(elapsed_ms))
                    .unwrap_or(0);
                let busy_ms = dispatcher.busy_ms.saturating_sub(unfinished);
                let utilization_pct = if elapsed_ms == 0 {
                    0.0
                } else {
                    (busy_ms as f64 / elapsed_ms as f64 * 100.0).min(100.0)
                };
                DispatcherSummary {
                    id: dispatcher.id,
                    status: dispatcher.status(),
                    holding: dispatcher.held_item_id().map(str::to_string),
                    current_calls_handled: dispatcher.current_calls_handled,
                    queue_items_handled: dispatcher.queue_items_handled,
                    busy_ms,
                    utilization_pct: round_to(utilization_pct, 2),
                }
            })
            .collect();

        let totals = RunTotals {
            current_calls_handled: dispatchers
                .iter()
                .map(|d| u64::from(d.current_calls_handled))
                .sum(),
            queue_items_handled: dispatchers
                .iter()
                .map(|d| u64::from(d.queue_items_handled))
                .sum(),
            deletes_issued: engine.removals_issued,
            deletes_succeeded: engine.removals_succeeded,
            deletes_failed: engine.removals_failed,
            stale_completions: engine.stale_completions,
            operator_resolves: engine.operator_resolves,
            ticks: engine.ticks,
            remaining_queue_items: self
                .mirror
                .items()
                .iter()
                .filter(|item| !ledger.is_removed(&item.id))
                .count(),
            remaining_backlog: self.engine.backlog().len(),
            ledger_claimed: ledger.claimed_count(),
            ledger_in_flight: ledger.in_flight_count(),
            ledger_removed: ledger.removed_count(),
            ..self.totals.clone()
        };

        SimulationResult {
            metadata: RunMetadata {
                dispatchers: self.config.dispatchers,
                handle_time: self.config.handle_time.to_string(),
                initial_busy_handle_time: self.config.initial_busy_handle_time.to_string(),
                seed: self.config.seed,
                tick_ms: self.config.tick_ms,
                elapsed_ms,
                stopped: self.stopped.unwrap_or(StopReason::DurationElapsed),
            },
            dispatchers,
            totals,
            suppressed: self.console.suppressed().cloned().collect(),
            operator_error: self.console.error().map(str::to_string),
            timeline: self.timeline.clone(),
        }
    }
}

pub fn run_simulation(config: &SimConfig) -> Result<SimulationResult> {
    let mut simulation = Simulation::in_memory(config.clone())?;
    Ok(simulation.run())
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}
